use serde::{Deserialize, Serialize};

/// Latest parsed view of a running rsync transfer.
///
/// Every field holds the most recent value observed on stdout; fields are
/// overwritten as newer matching lines arrive, never accumulated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    /// Items rsync still has to check, from the last `-chk=` trailer.
    pub remain: u64,
    /// Items in the transfer, from the same trailer.
    pub total: u64,
    /// Completed fraction in `[0, 1]`, recomputed on every counter update.
    pub fraction: f64,
    /// Last human-readable rate token, e.g. `999.99kB/s`.
    pub speed: String,
    /// Exact byte count decoded from the last per-file progress line.
    pub transferred_bytes: u64,
    /// Percent column of the same line, `0..=100`.
    pub transferred_percent: u8,
    /// File currently being transferred.
    pub filename: String,
}

/// Raw output of one rsync run, both streams captured line by line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLog {
    pub stdout: String,
    pub stderr: String,
}

/// Receives a fresh snapshot after every stdout line that changed the state.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: TaskProgress);
}
