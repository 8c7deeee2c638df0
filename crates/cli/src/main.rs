use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rsyncwatch_core::{ProgressSink, RsyncOptions, RunOptions, Task, TaskProgress};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rsyncwatch")]
#[command(about = "Run rsync and watch its progress as structured state", long_about = None)]
struct Cli {
    source: String,
    destination: String,

    /// Emit NDJSON progress events instead of a live status line.
    #[arg(long)]
    json: bool,

    #[arg(short = 'n', long)]
    dry_run: bool,

    #[arg(long)]
    delete: bool,

    #[arg(short = 'z', long)]
    compress: bool,

    #[arg(short = 'c', long)]
    checksum: bool,

    /// Exclude pattern, repeatable.
    #[arg(long)]
    exclude: Vec<String>,

    /// I/O timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// rsync binary to run instead of `rsync` from PATH.
    #[arg(long)]
    rsync_path: Option<PathBuf>,
}

struct NdjsonProgressSink;

impl ProgressSink for NdjsonProgressSink {
    fn on_progress(&self, progress: TaskProgress) {
        let line = serde_json::json!({
            "type": "task.progress",
            "progress": progress,
        });
        println!("{line}");
    }
}

fn init_tracing() {
    let filter = std::env::var("RSYNCWATCH_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("rsyncwatch: {e}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> rsyncwatch_core::Result<()> {
    let options = RsyncOptions {
        verbose: true,
        progress: true,
        dry_run: cli.dry_run,
        delete: cli.delete,
        compress: cli.compress,
        checksum: cli.checksum,
        exclude: cli.exclude,
        timeout_secs: cli.timeout,
        rsync_path: cli.rsync_path,
        ..Default::default()
    };

    let task = Arc::new(Task::new(&cli.source, &cli.destination, options));
    tracing::debug!(event = "cli.invoke", command = %task.command_line(), "cli.invoke");

    if cli.json {
        let sink = NdjsonProgressSink;
        let result = task
            .run_with(RunOptions {
                progress: Some(&sink),
            })
            .await;

        let line = serde_json::json!({
            "type": "task.finish",
            "ok": result.is_ok(),
            "progress": task.progress(),
            "log": task.log(),
        });
        println!("{line}");
        return result;
    }

    let reporter = tokio::spawn({
        let task = task.clone();
        async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(200));
            loop {
                ticker.tick().await;
                render_status(&task.progress());
            }
        }
    });

    let result = task.run().await;
    reporter.abort();

    render_status(&task.progress());
    eprintln!();

    if result.is_err() {
        let stderr = task.log().stderr;
        if !stderr.is_empty() {
            eprint!("{stderr}");
        }
    }
    result
}

fn render_status(progress: &TaskProgress) {
    eprint!(
        "\r{:>3.0}% {:>12} {:<60}",
        progress.fraction * 100.0,
        progress.speed,
        progress.filename
    );
    let _ = std::io::stderr().flush();
}
