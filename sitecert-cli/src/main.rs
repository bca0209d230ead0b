mod display;

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sitecert_core::colors::CatppuccinExt;
use sitecert_core::config::DEFAULT_SETTINGS_FILE;
use sitecert_core::output::{get_formatter, OutputFormat};
use sitecert_core::{parse_targets_from_list, CheckTarget, RunEvent, Settings};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use display::Spinner;

#[derive(Parser)]
#[command(name = "sitecert")]
#[command(about = "Website certificate checker - reports valid, invalid and expiring TLS certificates")]
#[command(version)]
struct Cli {
    /// Websites to check (hostnames or https:// URLs); takes precedence over settings
    targets: Vec<String>,

    /// Settings file with a "Websites" list [default: appsettings.json]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File containing websites: one per line, # for comments, or CSV (uses first column)
    #[arg(short, long)]
    list: Option<PathBuf>,

    /// Output format (human or json)
    #[arg(short, long, default_value = "human")]
    format: String,

    /// Flag certificates expiring within this many days
    #[arg(long)]
    horizon_days: Option<i64>,

    /// Connect and request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Exit immediately instead of waiting for Enter when errors were found
    #[arg(long)]
    no_pause: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let output_format: OutputFormat = cli.format.parse().unwrap_or_default();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(days) = cli.horizon_days {
        settings.expiry_horizon_days = days;
    }
    if let Some(secs) = cli.timeout {
        settings.timeout_seconds = secs;
    }
    settings.validate()?;

    let targets = resolve_targets(&cli, &settings)?;
    if targets.is_empty() {
        eprintln!(
            "{} No websites to check. Pass them as arguments, use --list, set SITECERT_WEBSITES or add a \"Websites\" list to {}",
            "Error:".ctp_red(),
            DEFAULT_SETTINGS_FILE
        );
        return Ok(ExitCode::from(2));
    }
    debug!(targets = targets.len(), "Resolved targets");

    let checker = settings.checker();
    let formatter = get_formatter(output_format);
    let show_spinner = output_format == OutputFormat::Human && std::io::stderr().is_terminal();

    if let Some(banner) = formatter.format_banner() {
        println!("{}", banner);
    }

    let mut spinner: Option<Spinner> = None;
    let summary = checker
        .run_with(&targets, |event| match event {
            RunEvent::Checking {
                index,
                total,
                target,
            } => {
                if let Some(line) = formatter.format_checking(target) {
                    println!("{}", line);
                }
                spinner = Some(Spinner::connecting(index, total, target, show_spinner));
            }
            RunEvent::Checked { report, .. } => {
                if let Some(spinner) = spinner.take() {
                    spinner.finish();
                }
                println!("{}", formatter.format_report(report));
            }
        })
        .await;

    println!("{}", formatter.format_summary(&summary));

    if !summary.has_failures() {
        return Ok(ExitCode::SUCCESS);
    }

    if !cli.no_pause && std::io::stdin().is_terminal() && std::io::stdout().is_terminal() {
        wait_for_enter()?;
    }

    Ok(ExitCode::FAILURE)
}

/// Command line targets win, then the list file, then settings.
fn resolve_targets(cli: &Cli, settings: &Settings) -> anyhow::Result<Vec<CheckTarget>> {
    if !cli.targets.is_empty() {
        return Ok(cli.targets.iter().map(CheckTarget::new).collect());
    }

    if let Some(ref path) = cli.list {
        let content = std::fs::read_to_string(path)?;
        return Ok(parse_targets_from_list(&content));
    }

    Ok(settings.targets())
}

fn wait_for_enter() -> anyhow::Result<()> {
    print!("Press Enter to exit");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
