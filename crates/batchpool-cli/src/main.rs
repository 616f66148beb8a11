#![doc = include_str!("../README.md")]

mod cli;

use batchpool::{Dispatcher, RunSummary};
use clap::Parser;
use cli::config::{AppConfig, CliArgs};
use cli::prompt;
use cli::telemetry::init_telemetry;
use std::process::ExitCode;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Exit code used when the operator leaves the menu without starting a run.
const MENU_EXIT: u8 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    init_telemetry()?;

    let config = if args.interactive {
        let stdin = std::io::stdin();
        let collected = prompt::collect(stdin.lock(), std::io::stdout(), |settings| {
            AppConfig::try_from(args.clone().with_settings(settings))
        })?;
        match collected {
            Some(config) => config,
            None => return Ok(ExitCode::from(MENU_EXIT)),
        }
    } else {
        AppConfig::try_from(args)?
    };

    log_startup_info(&config);

    let runner = config.runner();
    let summary = Dispatcher::new(config.pipeline.clone(), runner)
        .run()
        .await?;

    Ok(exit_code(&summary, config.allow_failures))
}

fn log_startup_info(config: &AppConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting batch run with full config: {:#?}", config);
    } else {
        let pipeline = &config.pipeline;
        tracing::info!(
            "Processing [{}, {}) in batches of {} with {} workers",
            pipeline.starting_index(),
            pipeline.total_count(),
            pipeline.batch_size(),
            pipeline.worker_count()
        );
    }
}

fn exit_code(summary: &RunSummary, allow_failures: bool) -> ExitCode {
    if summary.all_succeeded() {
        return ExitCode::SUCCESS;
    }

    tracing::warn!(
        "{} of {} batches failed, {} never ran",
        summary.failed,
        summary.generated,
        summary.unattempted()
    );
    if allow_failures {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
