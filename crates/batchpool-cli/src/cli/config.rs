use anyhow::{Context, bail};
use batchpool::{CommandRunner, PipelineConfig};
use clap::Parser;
use core::time::Duration;

/// Job script run per batch when no command is given, through the platform
/// shell.
pub const DEFAULT_JOB: &str = "python_job.bat";

/// Size of the MNIST test set, the range the tool was first written for.
pub const DEFAULT_TOTAL_COUNT: u64 = 10_000;

/// Runtime configuration for the `batchpool` binary.
///
/// Every value can come from a flag or an environment variable (a `.env`
/// file is loaded first). With `--interactive`, the starting index, batch
/// size and worker count are asked for on the terminal instead.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "batchpool",
    version,
    about = "Split an index range into batches and run a job per batch on a pool of workers"
)]
pub struct CliArgs {
    /// First index of the range to process.
    ///
    /// Environment variable: `STARTING_INDEX`
    #[arg(long, env = "STARTING_INDEX", default_value_t = 0)]
    pub starting_index: u64,

    /// Number of indices handed to the job in one invocation.
    ///
    /// Required unless `--interactive` is set.
    ///
    /// Environment variable: `BATCH_SIZE`
    #[arg(long, env = "BATCH_SIZE", required_unless_present = "interactive")]
    pub batch_size: Option<u64>,

    /// Number of concurrent workers, each running at most one job at a time.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long = "workers", env = "NUM_WORKERS", default_value_t = num_cpus::get())]
    pub num_workers: usize,

    /// One past the last index of the range.
    ///
    /// Environment variable: `TOTAL_COUNT`
    #[arg(long, env = "TOTAL_COUNT", default_value_t = DEFAULT_TOTAL_COUNT)]
    pub total_count: u64,

    /// Batches buffered between the generator and the workers. Defaults to
    /// the number of workers.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Seconds a worker waits on an empty queue before it stops.
    ///
    /// Environment variable: `IDLE_TIMEOUT_SECS`
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 10)]
    pub idle_timeout_secs: u64,

    /// Seconds a single job may run before it is killed and counted as
    /// failed. Unbounded if unset.
    ///
    /// Environment variable: `BATCH_TIMEOUT_SECS`
    #[arg(long, env = "BATCH_TIMEOUT_SECS")]
    pub batch_timeout_secs: Option<u64>,

    /// Exit successfully even if some batches failed.
    #[arg(long, default_value_t = false)]
    pub allow_failures: bool,

    /// Ask for starting index, batch size and worker count on the terminal.
    #[arg(short, long, default_value_t = false)]
    pub interactive: bool,

    /// Program (and arguments) to run per batch. Defaults to
    /// `python_job.bat` through the platform shell.
    #[arg(last = true)]
    pub command: Vec<String>,
}

/// The three values the interactive prompt collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub starting_index: u64,
    pub batch_size: u64,
    pub num_workers: usize,
}

impl CliArgs {
    /// Replaces the prompted fields with `settings`.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.starting_index = settings.starting_index;
        self.batch_size = Some(settings.batch_size);
        self.num_workers = settings.num_workers;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub command: Vec<String>,
    pub allow_failures: bool,
}

impl AppConfig {
    /// Builds the runner for the configured job command.
    pub fn runner(&self) -> CommandRunner {
        match self.command.split_first() {
            Some((program, args)) => CommandRunner::new(program).args(args),
            None => CommandRunner::shell(DEFAULT_JOB),
        }
    }
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let Some(batch_size) = args.batch_size else {
            bail!("BATCH_SIZE is required");
        };

        if args.starting_index >= args.total_count {
            bail!(
                "STARTING_INDEX ({}) must be less than TOTAL_COUNT ({})",
                args.starting_index,
                args.total_count
            );
        }

        let mut builder = PipelineConfig::builder()
            .starting_index(args.starting_index)
            .batch_size(batch_size)
            .worker_count(args.num_workers)
            .total_count(args.total_count)
            .idle_timeout(Duration::from_secs(args.idle_timeout_secs))
            .batch_timeout(args.batch_timeout_secs.map(Duration::from_secs));
        if let Some(capacity) = args.queue_capacity {
            builder = builder.queue_capacity(capacity);
        }
        let pipeline = builder.build().context("invalid pipeline configuration")?;

        Ok(Self {
            pipeline,
            command: args.command,
            allow_failures: args.allow_failures,
        })
    }
}
