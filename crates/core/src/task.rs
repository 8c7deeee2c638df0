use std::process::Stdio;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::command::{RsyncCommand, RsyncOptions};
use crate::error::{Error, Result};
use crate::parse;
use crate::progress::{ProgressSink, TaskLog, TaskProgress};
use crate::scan::ProgressLineDecoder;

/// One rsync run: spawns the process, drains both output streams into
/// structured progress state and raw logs, and surfaces the exit status.
///
/// A task is single-use: construct, `run` once, then read the final
/// `progress`/`log` snapshots. Snapshots taken while the run is in flight
/// see the latest fully-written state (never a half-updated record), but
/// carry no ordering guarantee against lines still being parsed.
pub struct Task {
    command: RsyncCommand,
    progress: Arc<Mutex<TaskProgress>>,
    log: Arc<Mutex<TaskLog>>,
}

/// Per-run knobs for [`Task::run_with`].
#[derive(Default)]
pub struct RunOptions<'a> {
    pub progress: Option<&'a dyn ProgressSink>,
}

impl Task {
    /// Builds a task copying `source` to `destination`. Archive mode,
    /// `--partial` and `--human-readable` are always forced on; the parser
    /// depends on human-readable progress formatting.
    pub fn new(source: &str, destination: &str, mut options: RsyncOptions) -> Self {
        options.human_readable = true;
        options.partial = true;
        options.archive = true;

        Self {
            command: RsyncCommand::new(source, destination, &options),
            progress: Arc::new(Mutex::new(TaskProgress::default())),
            log: Arc::new(Mutex::new(TaskLog::default())),
        }
    }

    pub fn command(&self) -> &RsyncCommand {
        &self.command
    }

    /// The invocation as a shell-style string, for diagnostics.
    pub fn command_line(&self) -> String {
        self.command.to_string()
    }

    /// Snapshot of the latest parsed progress.
    pub fn progress(&self) -> TaskProgress {
        self.progress.lock().expect("progress mutex poisoned").clone()
    }

    /// Snapshot of the raw stdout/stderr captured so far.
    pub fn log(&self) -> TaskLog {
        self.log.lock().expect("log mutex poisoned").clone()
    }

    pub async fn run(&self) -> Result<()> {
        self.run_with(RunOptions::default()).await
    }

    /// Spawns rsync and drains it to completion.
    ///
    /// Both pipes are drained to EOF before the exit status is awaited; a
    /// child blocked writing into a full, unread pipe would otherwise never
    /// exit. Failure to obtain either pipe aborts before any drain starts.
    /// A non-success exit maps to [`Error::Exit`] after the drains finish,
    /// leaving whatever state and log accumulated up to that point intact.
    pub async fn run_with(&self, options: RunOptions<'_>) -> Result<()> {
        let mut child = Command::new(self.command.program())
            .args(self.command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.command.program().display().to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(Error::MissingPipe { stream: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(Error::MissingPipe { stream: "stderr" })?;

        debug!(event = "task.spawn", command = %self.command, "task.spawn");

        tokio::join!(
            drain_stdout(stdout, &self.progress, &self.log, options.progress),
            drain_stderr(stderr, &self.log),
        );
        debug!(event = "task.drain.finish", "task.drain.finish");

        let status = child.wait().await?;
        debug!(event = "task.exit", status = %status, "task.exit");

        if !status.success() {
            return Err(Error::Exit { status });
        }
        Ok(())
    }
}

/// Stdout drain: runs every matcher over each line, appends the raw line to
/// the stdout log and notifies the sink on change. Parse failures degrade
/// to zero/empty values; only stream EOF (or a broken pipe) ends the drain.
async fn drain_stdout<R: AsyncRead + Unpin>(
    reader: R,
    progress: &Mutex<TaskProgress>,
    log: &Mutex<TaskLog>,
    sink: Option<&dyn ProgressSink>,
) {
    let mut lines = FramedRead::new(reader, ProgressLineDecoder);
    while let Some(line) = lines.next().await {
        let Ok(line) = line else { break };

        let snapshot = {
            let mut progress = progress.lock().expect("progress mutex poisoned");
            parse::apply_line(&mut progress, &line).then(|| progress.clone())
        };

        {
            let mut log = log.lock().expect("log mutex poisoned");
            log.stdout.push_str(&line);
            log.stdout.push('\n');
        }

        if let (Some(sink), Some(snapshot)) = (sink, snapshot) {
            sink.on_progress(snapshot);
        }
    }
}

/// Stderr drain: raw log capture only, no structured extraction.
async fn drain_stderr<R: AsyncRead + Unpin>(reader: R, log: &Mutex<TaskLog>) {
    let mut lines = FramedRead::new(reader, ProgressLineDecoder);
    while let Some(line) = lines.next().await {
        let Ok(line) = line else { break };

        let mut log = log.lock().expect("log mutex poisoned");
        log.stderr.push_str(&line);
        log.stderr.push('\n');
    }
}
