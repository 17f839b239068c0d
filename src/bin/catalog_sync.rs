use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use catalog_sync::catalog::CatalogHttpClient;
use catalog_sync::config::{ConfigLoader, ConfigOverrides};
use catalog_sync::error::SyncError;
use catalog_sync::output::{JsonOutput, OutputMode, TextOutput};
use catalog_sync::sync::{CancelToken, ProgressSink, RunSummary, Synchronizer};

#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Incrementally download changed datasets from a remote catalog")]
#[command(version, author)]
struct Cli {
    /// JSON config file; flags and environment variables override it.
    #[arg(long, env = "CATALOG_SYNC_CONFIG")]
    config: Option<String>,

    #[arg(long, env = "CATALOG_SYNC_THEME")]
    theme: Option<String>,

    #[arg(long, env = "CATALOG_SYNC_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, env = "CATALOG_SYNC_OUTPUT_DIR")]
    output_dir: Option<Utf8PathBuf>,

    #[arg(long, env = "CATALOG_SYNC_CHECKPOINT")]
    checkpoint: Option<Utf8PathBuf>,

    #[arg(long, env = "CATALOG_SYNC_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(summary) if summary.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(4),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<SyncError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &SyncError) -> u8 {
    match error {
        SyncError::ConfigRead(_) | SyncError::ConfigParse(_) | SyncError::InvalidConfig(_) => 2,
        SyncError::CatalogUnavailable(_) => 3,
        SyncError::CheckpointCorrupt { .. } | SyncError::CheckpointWriteFailed { .. } => 5,
        SyncError::Cancelled { .. } => 130,
        _ => 1,
    }
}

fn run() -> miette::Result<RunSummary> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let overrides = ConfigOverrides {
        theme: cli.theme,
        catalog_endpoint: cli.endpoint,
        output_dir: cli.output_dir,
        checkpoint_path: cli.checkpoint,
        concurrency_limit: cli.concurrency,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)
        .map_err(miette::Report::new)?;

    let client = CatalogHttpClient::new(&config).map_err(miette::Report::new)?;
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, finishing in-flight datasets");
        handler_token.cancel();
    })
    .into_diagnostic()?;

    let theme = config.theme.clone();
    let synchronizer = Synchronizer::new(config, client).with_cancel_token(cancel);
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &TextOutput,
    };

    match synchronizer.run(&theme, sink) {
        Ok(summary) => {
            print_summary(&summary, output_mode)?;
            Ok(summary)
        }
        Err(error) => {
            if let Some(summary) = error.summary() {
                print_summary(summary, output_mode)?;
            }
            Err(miette::Report::new(error))
        }
    }
}

fn print_summary(summary: &RunSummary, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(summary).into_diagnostic(),
        OutputMode::Text => TextOutput::print_summary(summary).into_diagnostic(),
    }
}
