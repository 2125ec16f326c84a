//! HTTP solver client
//!
//! Posts the deck as plain text and expects a JSON `SolveResult` back. A
//! non-2xx status carries the solver's message (convergence failure, parse
//! error) and is reported as-is.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{SolveResult, Solver, SolverError};

pub const DEFAULT_SOLVER_TIMEOUT_SECS: u64 = 30;

pub struct HttpSolver {
    client: Client,
    url: String,
}

impl HttpSolver {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_SOLVER_TIMEOUT_SECS))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Solver for HttpSolver {
    fn name(&self) -> &str {
        "http"
    }

    async fn solve(&self, deck: &str) -> Result<SolveResult, SolverError> {
        tracing::debug!("Posting {} byte deck to {}", deck.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(deck.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SolverError::ApiError { status, message });
        }

        let body = response.text().await?;
        let result: SolveResult =
            serde_json::from_str(&body).map_err(|e| SolverError::ParseError(e.to_string()))?;

        if let Some(error) = result.other.get("error").and_then(|e| e.as_str()) {
            return Err(SolverError::Failed(error.to_string()));
        }
        Ok(result)
    }
}
