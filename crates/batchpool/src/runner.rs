//! The batch runner seam: whatever actually performs the work for a batch.
//!
//! A runner is invoked once per batch and reports `Ok(true)` on success,
//! `Ok(false)` when the job ran but reported failure, or an [`Error`] when it
//! could not be invoked at all. The worker treats both of the latter as a
//! failed batch.
//!
//! Two implementations are provided:
//!
//! - [`FnRunner`] adapts an async closure (in-process work, tests).
//! - [`CommandRunner`] spawns an external program per batch.

use crate::{Batch, Error, Result};
use core::future::Future;
use std::{ffi::OsString, process::Stdio};
use tokio::{io::AsyncWriteExt, process::Command};

/// Performs the work for one batch.
pub trait BatchRunner: Send + Sync + 'static {
    fn run_batch(
        &self,
        worker_index: usize,
        batch: Batch,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// A [`BatchRunner`] backed by an async closure.
pub struct FnRunner<F> {
    f: F,
}

impl<F> FnRunner<F> {
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> BatchRunner for FnRunner<F>
where
    F: Fn(usize, Batch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send,
{
    fn run_batch(
        &self,
        worker_index: usize,
        batch: Batch,
    ) -> impl Future<Output = Result<bool>> + Send {
        (self.f)(worker_index, batch)
    }
}

/// Runs an external program once per batch.
///
/// The child process receives:
///
/// - `CONSUMER_WORKER`: index of the worker running it.
/// - `BATCH_START` / `BATCH_COUNT`: the batch range.
/// - stdin: `"<start>,<count>"`, then EOF.
///
/// Its stdout is captured and logged. The batch succeeds iff the process
/// exits with status zero. The child is killed if the invoking future is
/// dropped, which is what happens when a per-batch timeout fires.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandRunner {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs `script` through the platform shell (`cmd /C` or `sh -c`).
    pub fn shell(script: impl Into<OsString>) -> Self {
        if cfg!(windows) {
            Self::new("cmd").arg("/C").arg(script)
        } else {
            Self::new("sh").arg("-c").arg(script)
        }
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    fn command(&self, worker_index: usize, batch: Batch) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("CONSUMER_WORKER", worker_index.to_string())
            .env("BATCH_START", batch.start_index().to_string())
            .env("BATCH_COUNT", batch.count().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

impl BatchRunner for CommandRunner {
    async fn run_batch(&self, worker_index: usize, batch: Batch) -> Result<bool> {
        let fail = |what: &str, e: std::io::Error| Error::Runner {
            worker_index,
            start_index: batch.start_index(),
            reason: format!("{what}: {e}"),
        };

        let mut child = self
            .command(worker_index, batch)
            .spawn()
            .map_err(|e| fail("failed to start external command", e))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = format!("{},{}", batch.start_index(), batch.count());
            // A child that exits without reading stdin is not an error here;
            // its exit status decides the outcome.
            if let Err(_e) = stdin.write_all(payload.as_bytes()).await {
                #[cfg(feature = "tracing")]
                tracing::debug!("[{worker_index}] stdin write to child failed: {_e}");
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| fail("failed to read output of external command", e))?;

        #[cfg(feature = "tracing")]
        {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                tracing::info!("[{worker_index}] {}", stdout.trim_end());
            }
            tracing::debug!("[{worker_index}] output len: {}", output.stdout.len());
        }

        Ok(output.status.success())
    }
}
