use std::process::ExitStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rsync {stream} pipe unavailable")]
    MissingPipe { stream: &'static str },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rsync exited with {status}")]
    Exit { status: ExitStatus },
}
