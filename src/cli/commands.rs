//! CLI command definitions for agentforge.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use crate::llm::{Gateway, GatewayConfig};
use crate::metrics::{export_metrics, init_metrics};
use crate::notify::build_notifier;
use crate::pipeline::{FinalResult, PipelineConfig, PipelineError, RefinementPipeline};
use crate::storage::{open_store, ArtifactKind, SessionStore};

use super::parse::parse_command;

/// Plan, research, develop, write and assess a document until it converges.
#[derive(Parser, Debug)]
#[command(name = "agentforge")]
#[command(version)]
#[command(
    long_about = "agentforge drafts a document for a goal through a Research, Developer and Writer agent, scores it, and feeds hallucination findings back until the draft converges.\n\nBackends and keys are read from the environment (GROQ_API_KEY, GEMINI_API_KEY, OLLAMA_HOST, ...).\n\nExample usage:\n  agentforge run --goal \"Explain how tides work\"\n  agentforge run --command \"write a report on tides and send to ops@example.com\""
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Print Prometheus metrics after the command finishes.
    #[arg(long, global = true)]
    pub print_metrics: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for one or more goals.
    Run(RunArgs),

    /// Re-run Develop, Write and Assess for a stored session.
    Resume(ResumeArgs),

    /// Show a stored session and its latest artifacts.
    Session(SessionArgs),
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("input").required(true).args(["goal", "command"])))]
pub struct RunArgs {
    /// Goal to draft a document for. Repeat to run several goals concurrently.
    #[arg(short, long)]
    pub goal: Vec<String>,

    /// Command string naming a goal and an address, e.g. "summarise X and send to a@b.com".
    #[arg(short, long, conflicts_with = "goal")]
    pub command: Option<String>,

    /// Delivery target for the finished document.
    #[arg(long)]
    pub notify: Option<String>,

    /// Override the configured iteration cap.
    #[arg(short = 'n', long)]
    pub max_iterations: Option<u32>,

    /// Output JSON to stdout instead of a summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Session to resume.
    pub session_id: String,

    /// Output JSON to stdout instead of a summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Session to show.
    pub session_id: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access logging arguments before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.print_metrics {
        init_metrics()?;
    }

    match cli.command {
        Commands::Run(args) => run_pipeline_command(args).await?,
        Commands::Resume(args) => run_resume_command(args).await?,
        Commands::Session(args) => run_session_command(args).await?,
    }

    if cli.print_metrics {
        print!("{}", export_metrics());
    }
    Ok(())
}

async fn build_pipeline(config: PipelineConfig) -> anyhow::Result<RefinementPipeline> {
    let gateway = Gateway::from_config(GatewayConfig::from_env()?)?;
    let store = open_store(config.session_db_path.as_deref()).await?;
    let notifier = build_notifier(config.notify_enabled, config.notify_webhook_url.as_deref())?;
    Ok(RefinementPipeline::new(Arc::new(gateway), store, config).with_notifier(notifier))
}

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    let (goals, target) = match &args.command {
        Some(command) => {
            let parsed = parse_command(command)?;
            (vec![parsed.goal], Some(parsed.target))
        }
        None => (args.goal.clone(), args.notify.clone()),
    };

    let pipeline = build_pipeline(PipelineConfig::from_env()?).await?;
    info!(goals = goals.len(), "Running pipeline");

    let outcomes = pipeline
        .run_many(&goals, target.as_deref(), args.max_iterations)
        .await;
    let (results, failures) = split_outcomes(&goals, outcomes);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            print_summary(result);
        }
    }

    for (goal, err) in &failures {
        error!(goal = %goal, error = %err, "Pipeline run failed");
    }
    if !failures.is_empty() {
        anyhow::bail!("{} of {} runs failed", failures.len(), goals.len());
    }
    Ok(())
}

/// Separates finished runs from failed ones, keeping each failure's goal.
fn split_outcomes(
    goals: &[String],
    outcomes: Vec<Result<FinalResult, PipelineError>>,
) -> (Vec<FinalResult>, Vec<(String, PipelineError)>) {
    let mut results = Vec::new();
    let mut failures = Vec::new();
    for (goal, outcome) in goals.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(err) => failures.push((goal.clone(), err)),
        }
    }
    (results, failures)
}

async fn run_resume_command(args: ResumeArgs) -> anyhow::Result<()> {
    let pipeline = build_pipeline(PipelineConfig::from_env()?).await?;
    let result = pipeline.resume(&args.session_id).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

async fn run_session_command(args: SessionArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;
    let store = open_store(config.session_db_path.as_deref()).await?;
    print_session(store.as_ref(), &args.session_id).await
}

async fn print_session(store: &dyn SessionStore, session_id: &str) -> anyhow::Result<()> {
    let Some(record) = store.session(session_id).await? else {
        anyhow::bail!("Session '{}' not found", session_id);
    };

    let mut latest = serde_json::Map::new();
    for kind in ArtifactKind::ALL {
        if let Some(value) = store.latest_artifact(session_id, kind).await? {
            latest.insert(kind.to_string(), value);
        }
    }

    let output = serde_json::json!({
        "session": record,
        "latest_artifacts": latest,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_summary(result: &FinalResult) {
    println!("Session:     {}", result.session_id);
    println!("Goal:        {}", result.goal);
    println!("Termination: {}", result.termination);
    println!("Iterations:  {}", result.iteration_count);
    println!(
        "Confidence:  {} (hallucination risk {})",
        result.confidence.confidence_score, result.confidence.hallucination_risk_score
    );
    for issue in &result.confidence.hallucination_issues {
        println!("  - {}", issue);
    }
    if let Some(notification) = &result.notification {
        let status = if notification.ok { "sent" } else { "failed" };
        println!(
            "Delivery:    {} to {} ({})",
            status, notification.target, notification.detail
        );
    }
    println!();
    match &result.document {
        Some(document) => println!("{}", document),
        None => println!("(no document produced)"),
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySessionStore;

    #[test]
    fn test_run_with_goals() {
        let cli = Cli::try_parse_from([
            "agentforge",
            "run",
            "--goal",
            "explain tides",
            "--goal",
            "explain eclipses",
            "-n",
            "2",
            "--json",
        ])
        .expect("should parse");

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.goal, vec!["explain tides", "explain eclipses"]);
                assert_eq!(args.max_iterations, Some(2));
                assert!(args.json);
                assert!(args.command.is_none());
            }
            _ => panic!("expected run"),
        }
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(!cli.print_metrics);
    }

    #[test]
    fn test_run_requires_goal_or_command() {
        assert!(Cli::try_parse_from(["agentforge", "run"]).is_err());
        assert!(Cli::try_parse_from([
            "agentforge",
            "run",
            "--goal",
            "a",
            "--command",
            "b and send to a@b.com"
        ])
        .is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "agentforge",
            "resume",
            "abc-123",
            "--log-format",
            "json",
            "--print-metrics",
            "--log-level",
            "debug",
        ])
        .expect("should parse");
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.print_metrics);
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Resume(ResumeArgs { ref session_id, .. }) if session_id == "abc-123"));
    }

    #[test]
    fn test_split_outcomes_keeps_finished_runs() {
        use crate::agents::{ConfidenceReport, Plan};
        use crate::pipeline::Termination;

        let finished = FinalResult {
            session_id: "s-2".to_string(),
            goal: "explain eclipses".to_string(),
            plan: Plan::default_for("explain eclipses"),
            iteration_count: 1,
            research_output: None,
            developer_output: None,
            document: Some("Eclipses happen when...".to_string()),
            confidence: ConfidenceReport::fallback(),
            termination: Termination::Exhausted,
            notification: None,
        };
        let goals = vec!["explain tides".to_string(), "explain eclipses".to_string()];
        let outcomes = vec![
            Err(PipelineError::PlanNotFound("s-1".to_string())),
            Ok(finished.clone()),
        ];

        let (results, failures) = split_outcomes(&goals, outcomes);
        assert_eq!(results, vec![finished]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "explain tides");
    }

    #[tokio::test]
    async fn test_print_session_unknown_id() {
        let store = MemorySessionStore::new();
        let err = print_session(&store, "missing").await.unwrap_err();
        assert_eq!(err.to_string(), "Session 'missing' not found");
    }
}
