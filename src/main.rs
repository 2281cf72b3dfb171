mod batch;
mod config;
mod pr;
mod report;
mod run;

use chrono::{DateTime, Local};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use report::FlagColumn;

/// PR Audit: reads a spreadsheet of GitHub Pull Request URLs and writes back
/// each PR's author, merge status, staleness, and external review comments.
#[derive(Parser, Debug)]
#[command(name = "pr-audit", version, about)]
struct Cli {
    /// Input .xlsx workbook; column A (from row 2) holds PR URLs.
    ///
    /// Falls back to `output.input` from the config file.
    input: Option<PathBuf>,

    /// Folder that receives the dated run folders
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Maximum number of PRs fetched at once
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Indicator written to the third appended column
    #[arg(long, value_enum, default_value_t = FlagColumn::Stale)]
    column: FlagColumn,

    /// Config file to use instead of ./.pr-audit.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verify the GitHub token against GET /user and exit
    #[arg(long)]
    check_token: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let started = Instant::now();
    let started_at = Local::now();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            report::print_failure(&*e);
            print_footer(&fallback_base_dir(&cli), started_at, started);
            return ExitCode::FAILURE;
        }
    };

    if cli.check_token {
        return match check_token(&config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                report::print_failure(&*e);
                ExitCode::FAILURE
            }
        };
    }

    let outcome = audit(&cli, &config, started_at).await;
    let exit = match &outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report::print_failure(&**e);
            ExitCode::FAILURE
        }
    };

    print_footer(&config.output.base_dir, started_at, started);
    exit
}

/// Report how many run folders exist for today and how long this run took.
fn print_footer(base_dir: &Path, started_at: DateTime<Local>, started: Instant) {
    let date_dir = run::date_dir(base_dir, started_at);
    report::print_footer(run::count_entries(&date_dir), started.elapsed());
}

/// Where run folders go when the config could not be loaded.
fn fallback_base_dir(cli: &Cli) -> PathBuf {
    cli.output_dir
        .clone()
        .unwrap_or_else(|| config::OutputConfig::default().base_dir)
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<config::Config, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    if let Some(dir) = &cli.output_dir {
        config.output.base_dir = dir.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.fetch.concurrency = concurrency;
    }
    if let Some(input) = &cli.input {
        config.output.input = Some(input.clone());
    }
    debug!(fetch = ?config.fetch, base_dir = %config.output.base_dir.display(), "loaded configuration");
    Ok(config)
}

async fn check_token(config: &config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = pr::GitHubClient::new(config)?;
    let user = client.authenticated_user().await?;
    println!("Token OK, authenticated as {}", user.login);
    Ok(())
}

async fn audit(
    cli: &Cli,
    config: &config::Config,
    started_at: DateTime<Local>,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = config.output.input.as_deref().ok_or(
        "No input workbook. Usage: pr-audit <INPUT.xlsx> or set output.input in .pr-audit.toml",
    )?;
    let _main_span = info_span!("pr_audit", input = %input.display()).entered();

    info!("reading input workbook");
    let sheet = report::InputSheet::read(input)?;
    let references = sheet.references();

    let client = pr::GitHubClient::new(config)?;
    let ctx = run::RunContext::create(&config.output.base_dir, config.output.keep_runs, started_at)?;
    info!(started_at = %ctx.started_at.format("%Y-%m-%d %H:%M:%S"), "run started");
    let settings = batch::BatchSettings::from_config(config);

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner} {msg} [{bar:40}] {percent:>3}% {pos}/{len} ({elapsed})",
        )?
        .progress_chars("=> "),
    );
    progress.set_message("Processing PRs...");
    progress.enable_steady_tick(Duration::from_millis(100));

    let outcome = batch::run(&client, &references, &settings, &ctx.log, &progress).await;
    progress.finish_and_clear();

    info!("writing result workbook");
    let result_path = ctx.result_path();
    report::write_results(&sheet, &outcome, cli.column, &result_path)?;

    let summary = outcome.summary();
    info!(total = summary.total, merged = summary.merged, stale = summary.stale, "done");
    report::print_summary(&summary, &ctx.output_dir);
    Ok(())
}
