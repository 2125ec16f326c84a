//! Sketchnet CLI - netlists and connectivity checks for circuit sketches.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use sketchnet::rules::Rule;
use sketchnet::{
    ControlCard, Issue, NetlistOptions, NetlistResult, RulesEngine, Severity, SketchnetCore,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "sketchnet")]
#[command(about = "Orthogonal circuit sketch to SPICE netlist tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Log normalization and resolution steps to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the netlist (and optional control cards) for a sketch
    Netlist {
        /// Path to a .sketch.json document
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Append a DC operating point analysis
        #[arg(long)]
        op: bool,

        /// Append a decade AC sweep
        #[arg(long, num_args = 3, value_names = ["POINTS", "START", "STOP"])]
        ac: Option<Vec<f64>>,

        /// Append a transient analysis
        #[arg(long, num_args = 2, value_names = ["STEP", "STOP"])]
        tran: Option<Vec<f64>>,

        /// Title comment for the netlist
        #[arg(long)]
        title: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: NetlistFormat,
    },

    /// Run connectivity rules on a sketch or every sketch in a directory
    Check {
        /// Path to a .sketch.json document or a directory
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if issues found at this severity or higher
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,

        /// Only run the named rule (repeatable)
        #[arg(long = "rule", value_name = "ID")]
        rules: Vec<String>,
    },

    /// List junction dots of the normalized sketch
    Junctions {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: NetlistFormat,
    },

    /// List available connectivity rules
    Rules {
        /// Show default severities
        #[arg(short = 'v', long)]
        details: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum NetlistFormat {
    Text,
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// GitHub Actions format
    Github,
    /// GitLab CI format
    Gitlab,
}

#[derive(Clone, ValueEnum)]
enum FailOnSeverity {
    Error,
    Warning,
    Info,
}

impl FailOnSeverity {
    fn threshold(&self) -> Severity {
        match self {
            FailOnSeverity::Error => Severity::Error,
            FailOnSeverity::Warning => Severity::Warning,
            FailOnSeverity::Info => Severity::Info,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(LevelFilter::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Netlist {
            file,
            op,
            ac,
            tran,
            title,
            format,
        } => handle_netlist(&file, op, ac, tran, title, format),
        Commands::Check {
            path,
            format,
            fail_on,
            rules,
        } => handle_check(&path, format, fail_on, rules),
        Commands::Junctions { file, format } => handle_junctions(&file, format),
        Commands::Rules { details } => {
            handle_rules(details);
            Ok(0)
        }
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

fn control_cards(
    op: bool,
    ac: Option<Vec<f64>>,
    tran: Option<Vec<f64>>,
) -> anyhow::Result<Vec<ControlCard>> {
    let mut cards = Vec::new();
    if op {
        cards.push(ControlCard::Op);
    }
    if let Some(values) = ac {
        let &[points, start, stop] = values.as_slice() else {
            bail!("--ac takes POINTS START STOP");
        };
        if points < 1.0 || points.fract() != 0.0 {
            bail!("--ac POINTS must be a positive integer, got {}", points);
        }
        if start <= 0.0 || stop <= start {
            bail!("--ac needs 0 < START < STOP");
        }
        cards.push(ControlCard::Ac {
            points: points as u32,
            start,
            stop,
        });
    }
    if let Some(values) = tran {
        let &[step, stop] = values.as_slice() else {
            bail!("--tran takes STEP STOP");
        };
        if step <= 0.0 || stop <= step {
            bail!("--tran needs 0 < STEP < STOP");
        }
        cards.push(ControlCard::Tran { step, stop });
    }
    Ok(cards)
}

fn handle_netlist(
    file: &Path,
    op: bool,
    ac: Option<Vec<f64>>,
    tran: Option<Vec<f64>>,
    title: Option<String>,
    format: NetlistFormat,
) -> anyhow::Result<i32> {
    let options = NetlistOptions {
        analyses: control_cards(op, ac, tran)?,
        title,
        ..NetlistOptions::default()
    };
    let result = SketchnetCore::netlist_file(file, options)
        .with_context(|| format!("failed to build netlist for {}", file.display()))?;

    match format {
        NetlistFormat::Text => {
            print!("{}", result.deck);
            for issue in result.issues.iter().filter(|i| i.severity <= Severity::Warning) {
                eprintln!("warning: {}", issue.message);
            }
        }
        NetlistFormat::Json => {
            let output = serde_json::json!({
                "file": result.file.display().to_string(),
                "deck": result.deck,
                "nodes": result.resolution.terminal_to_node,
                "node_count": result.resolution.node_count,
                "ground": result.resolution.ground,
                "issues": result.issues,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(0)
}

fn handle_check(
    path: &Path,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
    rules: Vec<String>,
) -> anyhow::Result<i32> {
    let results = if path.is_dir() {
        SketchnetCore::check_project(path, rules)?
    } else {
        vec![SketchnetCore::check_file(path, rules)?]
    };

    output_results(&results, &format)?;

    if let Some(severity) = fail_on {
        if results.iter().any(|r| r.fails_at(severity.threshold())) {
            return Ok(1);
        }
    }
    Ok(0)
}

fn output_results(results: &[NetlistResult], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Human => output_human(results),
        OutputFormat::Json => output_json(results)?,
        OutputFormat::Github => output_github(results),
        OutputFormat::Gitlab => output_gitlab(results)?,
    }
    Ok(())
}

fn print_group(label: &str, issues: &[&Issue]) {
    if issues.is_empty() {
        return;
    }
    println!("\n  {}:", label);
    for issue in issues {
        println!("    - {}", issue.message);
        if let Some(ref location) = issue.location {
            println!("      At: {}", location);
        }
        if let Some(ref suggestion) = issue.suggestion {
            println!("      Fix: {}", suggestion);
        }
    }
}

fn output_human(results: &[NetlistResult]) {
    for result in results {
        println!("\nFile: {}", result.file.display());
        println!("{}", "─".repeat(60));
        println!(
            "  {} nodes, {} devices",
            result.resolution.node_count,
            result.resolution.netlist.lines.len()
        );

        if result.total_issues() == 0 {
            println!("  No issues found");
            continue;
        }

        for (label, severity) in [
            ("ERROR", Severity::Error),
            ("WARNING", Severity::Warning),
            ("INFO", Severity::Info),
            ("SUGGESTION", Severity::Suggestion),
        ] {
            let group: Vec<&Issue> = result
                .issues
                .iter()
                .filter(|i| i.severity == severity)
                .collect();
            print_group(label, &group);
        }

        println!("\n  Summary:");
        println!("    Errors:      {}", result.stats.errors);
        println!("    Warnings:    {}", result.stats.warnings);
        println!("    Info:        {}", result.stats.info);
        println!("    Suggestions: {}", result.stats.suggestions);
    }
}

fn output_json(results: &[NetlistResult]) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "results": results.iter().map(|r| {
            serde_json::json!({
                "file": r.file.display().to_string(),
                "node_count": r.resolution.node_count,
                "issues": r.issues,
                "stats": r.stats,
            })
        }).collect::<Vec<_>>(),
        "summary": {
            "total_files": results.len(),
            "total_issues": results.iter().map(|r| r.total_issues()).sum::<usize>(),
            "errors": results.iter().map(|r| r.stats.errors).sum::<usize>(),
            "warnings": results.iter().map(|r| r.stats.warnings).sum::<usize>(),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn severity_to_github(issue: &Issue) -> &'static str {
    match issue.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info | Severity::Suggestion => "notice",
    }
}

fn output_github(results: &[NetlistResult]) {
    for result in results {
        for issue in &result.issues {
            println!(
                "::{} file={}::{}",
                severity_to_github(issue),
                result.file.display(),
                issue.message.replace('\n', " ")
            );
        }
    }
}

fn severity_to_gitlab(issue: &Issue) -> &'static str {
    match issue.severity {
        Severity::Error => "blocker",
        Severity::Warning => "major",
        Severity::Suggestion => "minor",
        Severity::Info => "info",
    }
}

fn output_gitlab(results: &[NetlistResult]) -> anyhow::Result<()> {
    let mut reports = Vec::new();
    for result in results {
        for issue in &result.issues {
            reports.push(serde_json::json!({
                "description": issue.message,
                "check_name": issue.rule_id,
                "fingerprint": issue.id,
                "severity": severity_to_gitlab(issue),
                "location": {
                    "path": result.file.display().to_string(),
                }
            }));
        }
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn handle_junctions(file: &Path, format: NetlistFormat) -> anyhow::Result<i32> {
    let report = SketchnetCore::junctions_file(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    match format {
        NetlistFormat::Text => {
            for point in &report.junctions {
                println!("{}", point);
            }
        }
        NetlistFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

fn handle_rules(details: bool) {
    println!("Available connectivity rules:\n");

    let engine = RulesEngine::with_default_rules();
    for rule in engine.rules() {
        println!("  {}", rule.id());
        println!("    {}", rule.name());
        if details {
            println!("    Default severity: {}", rule.severity().as_str());
        }
        println!();
    }
}
