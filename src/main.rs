//! reviewloom: multi-stage AI pull request review CLI.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use reviewloom::config;
use reviewloom::diff;
use reviewloom::env;
use reviewloom::models;
use reviewloom::orchestrator;
use reviewloom::providers;
use reviewloom::service;
use reviewloom::stages;
use reviewloom::store;

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;

use cli::args::{Cli, Command, InputMode};
use config::Config;
use env::Env;
use models::request::decode_base64_field;
use models::{CategoryCounts, PrComment, ReviewRequest, SeverityCounts};
use orchestrator::{Orchestrator, OrchestratorOptions, policy_for};
use providers::rig::RigProvider;
use service::ReviewService;
use store::MemoryStore;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

/// Logs go to stderr so `--format json` output stays clean.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Review(args) => run_review(*args).await,
        Command::Stages(args) => run_stages(args).await,
        Command::Validate(args) => run_validate(args).await,
        Command::Locate(args) => run_locate(args).await,
        Command::Context(args) => run_context(args).await,
        Command::Delta(args) => run_delta(args),
    }
}

fn load_config() -> Result<Config> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    Config::load(Some(&cwd), &Env::real()).context("failed to load configuration")
}

/// List the stage graph in execution order.
async fn run_stages(args: cli::args::StagesArgs) -> Result<()> {
    let config = load_config()?;
    let dir = args
        .instructions_dir
        .or(config.pipeline.instructions_dir.clone());
    let graph = stages::load_graph(dir.as_deref())
        .await
        .context("failed to load stage graph")?;

    for stage in graph.topological_order() {
        println!(
            "  {}  {}  {}",
            stage.id.bold(),
            stage.role.to_string().cyan(),
            stage.description.dimmed(),
        );
        if !stage.depends_on.is_empty() {
            println!("         {}  {}", "after:".cyan(), stage.depends_on.join(", "));
        }
        if stage.tools {
            println!("         {}  line_number, line_context", "tools:".cyan());
        }
    }

    Ok(())
}

/// Validate a stage definition markdown file.
async fn run_validate(args: cli::args::ValidateArgs) -> Result<()> {
    match stages::validate_stage_file(&args.file).await {
        Ok(stage) => {
            println!(
                "  {} {}  {}",
                "✔".green().bold(),
                stage.id.bold(),
                stage.description.dimmed(),
            );
            println!("         {}  {}", "role:".cyan(), stage.role);
            if !stage.depends_on.is_empty() {
                println!("         {}  {}", "after:".cyan(), stage.depends_on.join(", "));
            }
            println!(
                "         {}  {} chars",
                "instructions:".cyan(),
                stage.instructions.chars().count()
            );
            Ok(())
        }
        Err(e) => {
            println!("  {} {}", "✖".red().bold(), args.file.display());
            bail!("{e}");
        }
    }
}

async fn run_locate(args: cli::args::LocateArgs) -> Result<()> {
    let config = load_config()?;
    let diff_text = diff::read_diff_file(&args.diff_file).await?;
    let threshold = args.threshold.unwrap_or(config.locator.fuzzy_threshold);
    let result = diff::LineLocator::new(&diff_text)
        .with_threshold(threshold)
        .locate(&args.snippet);
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        process::exit(1);
    }
    Ok(())
}

async fn run_context(args: cli::args::ContextArgs) -> Result<()> {
    let config = load_config()?;
    let diff_text = diff::read_diff_file(&args.diff_file).await?;
    let window = args.window.unwrap_or(config.locator.context_window);
    let lines = diff::context(&diff_text, &args.file, args.line, window);
    if lines.is_empty() {
        bail!("{}:{} is not part of the diff", args.file, args.line);
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn run_delta(args: cli::args::DeltaArgs) -> Result<()> {
    let config = load_config()?;
    let calculator = config.reputation.calculator();
    let counts = SeverityCounts {
        critical: args.critical,
        medium: args.medium,
        minor: args.minor,
        praise: args.praise,
    };
    let delta = calculator.compute_delta(&counts);
    let event = calculator.describe(&counts, &CategoryCounts::new(), delta, "review");
    println!("{} {delta:+}", "delta:".cyan());
    println!("{} {event}", "event:".cyan());
    Ok(())
}

async fn run_review(args: cli::args::ReviewArgs) -> Result<()> {
    let input_mode = args
        .validate_input()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut config = load_config()?;
    if let Some(policy) = args.policy {
        config.pipeline.policy = policy.into();
    }

    let request = build_request(&args, input_mode, config.reputation.default_score).await?;

    let instructions_dir = args
        .instructions_dir
        .clone()
        .or(config.pipeline.instructions_dir.clone());
    let graph = match stages::load_graph(instructions_dir.as_deref()).await {
        Ok(graph) => Some(graph),
        Err(e) => {
            tracing::error!(error = %e, "stage graph unavailable");
            None
        }
    };

    let provider = RigProvider::new(config.provider.clone())
        .context("failed to initialize inference provider")?;
    tracing::info!(
        provider = %config.provider.name,
        model = provider.model(),
        policy = %config.pipeline.policy,
        "starting review"
    );

    let orchestrator = Orchestrator::new(
        graph,
        Arc::new(provider),
        policy_for(config.pipeline.policy),
        OrchestratorOptions::from_config(&config),
    );
    let service = ReviewService::from_config(orchestrator, &config)
        .with_store(Arc::new(MemoryStore::new()));

    let report = service.run_review(&request).await;
    println!("{}", args.format.render(&report));

    if !report.result.is_success() {
        process::exit(1);
    }
    Ok(())
}

async fn build_request(
    args: &cli::args::ReviewArgs,
    input_mode: InputMode,
    default_score: i64,
) -> Result<ReviewRequest> {
    let raw_diff = match input_mode {
        InputMode::DiffFile(path) => diff::read_diff_file(&path).await?,
        InputMode::Stdin => diff::read_diff_stdin().await?,
    };
    let decode = |field: &'static str, value: String| -> Result<String> {
        if args.base64 {
            Ok(decode_base64_field(field, &value)?)
        } else {
            Ok(value)
        }
    };

    let mut builder = ReviewRequest::builder(decode("diff", raw_diff)?)
        .author(&args.author)
        .reputation(
            args.score.unwrap_or(default_score),
            args.parse_history().map_err(|e| anyhow::anyhow!("{e}"))?,
        );

    if let Some(ref id) = args.review_id {
        builder = builder.review_id(id);
    }
    if let Some(n) = args.pr_number {
        builder = builder.pr_number(n);
    }
    if let Some((owner, repo)) = args.owner_repo().map_err(|e| anyhow::anyhow!("{e}"))? {
        builder = builder.repository(owner, repo);
    }
    if let Some(ref title) = args.title {
        builder = builder.title(decode("title", title.clone())?);
    }
    if let Some(ref body) = args.body {
        builder = builder.body(decode("body", body.clone())?);
    }
    if let Some(ref path) = args.comments {
        builder = builder.comments(read_comments(path).await?);
    }
    if let Some(ref path) = args.readme {
        let readme = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        builder = builder.repository_description(readme);
    }

    Ok(builder.build())
}

async fn read_comments(path: &Path) -> Result<Vec<PrComment>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of comments", path.display()))
}
