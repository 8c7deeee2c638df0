use std::fmt;
use std::path::{Path, PathBuf};

/// Flags forwarded to the rsync invocation. A practical subset of rsync's
/// surface; anything not covered here can go through `extra_args`.
#[derive(Debug, Clone, Default)]
pub struct RsyncOptions {
    pub archive: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub checksum: bool,
    pub recursive: bool,
    pub links: bool,
    pub perms: bool,
    pub times: bool,
    pub owner: bool,
    pub group: bool,
    pub dry_run: bool,
    pub compress: bool,
    pub delete: bool,
    pub partial: bool,
    /// `--progress`; required for the per-file progress lines the parser
    /// feeds on.
    pub progress: bool,
    pub human_readable: bool,
    /// Each entry becomes one `--exclude=<pattern>`.
    pub exclude: Vec<String>,
    /// I/O timeout in seconds, forwarded as `--timeout`.
    pub timeout_secs: Option<u64>,
    /// Binary to execute instead of `rsync` from `PATH`.
    pub rsync_path: Option<PathBuf>,
    /// Appended verbatim after all generated flags, before the paths.
    pub extra_args: Vec<String>,
}

/// A fully marshaled rsync invocation: program plus argv.
#[derive(Debug, Clone)]
pub struct RsyncCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl RsyncCommand {
    pub fn new(source: &str, destination: &str, options: &RsyncOptions) -> Self {
        let mut args = Vec::new();

        let short_flags = [
            (options.archive, "-a"),
            (options.verbose, "-v"),
            (options.quiet, "-q"),
            (options.checksum, "-c"),
            (options.recursive, "-r"),
            (options.links, "-l"),
            (options.perms, "-p"),
            (options.times, "-t"),
            (options.owner, "-o"),
            (options.group, "-g"),
            (options.dry_run, "-n"),
            (options.compress, "-z"),
        ];
        for (enabled, flag) in short_flags {
            if enabled {
                args.push(flag.to_string());
            }
        }

        if options.delete {
            args.push("--delete".to_string());
        }
        if options.partial {
            args.push("--partial".to_string());
        }
        if options.progress {
            args.push("--progress".to_string());
        }
        if options.human_readable {
            args.push("--human-readable".to_string());
        }
        for pattern in &options.exclude {
            args.push(format!("--exclude={pattern}"));
        }
        if let Some(secs) = options.timeout_secs {
            args.push(format!("--timeout={secs}"));
        }
        args.extend(options.extra_args.iter().cloned());

        args.push(source.to_string());
        args.push(destination.to_string());

        let program = options
            .rsync_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("rsync"));

        Self { program, args }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for RsyncCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
