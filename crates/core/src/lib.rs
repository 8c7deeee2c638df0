mod command;
mod error;
mod parse;
mod progress;
mod scan;
mod task;

pub const APP_NAME: &str = "rsyncwatch";

pub use command::{RsyncCommand, RsyncOptions};
pub use error::{Error, Result};
pub use progress::{ProgressSink, TaskLog, TaskProgress};
pub use scan::ProgressLineDecoder;
pub use task::{RunOptions, Task};
