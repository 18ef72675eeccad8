use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use clap::ArgMatches;
use log::LevelFilter;

use crate::error::{MagrefError, Result};

lazy_static! {
    static ref START_TIME: Instant = Instant::now();
}

/// Sends each formatted log line to stderr and, when set, a log file.
struct TeeWriter {
    log_file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        if let Some(f) = self.log_file.as_mut() {
            f.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        if let Some(f) = self.log_file.as_mut() {
            f.flush()?;
        }
        Ok(())
    }
}

/// `-v` gives debug output, `-q` errors only, otherwise info. RUST_LOG
/// directives are applied on top.
pub fn level_from_flags(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Start logging to stderr and, optionally, appending to `log_file`.
/// Lines look like `[00:01:05] INFO: message`, the time being elapsed since
/// startup.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    lazy_static::initialize(&START_TIME);
    let log_file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| MagrefError::io(parent, e))?;
            }
            Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| MagrefError::io(path, e))?,
            )
        }
        None => None,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder
        .format(|buf, record| {
            let elapsed = START_TIME.elapsed().as_secs();
            writeln!(
                buf,
                "[{:02}:{:02}:{:02}] {}: {}",
                elapsed / 3600,
                (elapsed % 3600) / 60,
                elapsed % 60,
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(TeeWriter { log_file })));
    builder.try_init().map_err(|e| {
        MagrefError::InvalidArgument(format!("Failed to initialise logging, has it been set up twice? {}", e))
    })
}

/// Set up logging from a subcommand's verbosity flags and `--log-file`,
/// then announce the program version.
pub fn init_logging_from_matches(matches: &ArgMatches, program_name: &str, version: &str) -> Result<()> {
    let level = level_from_flags(matches.get_flag("verbose"), matches.get_flag("quiet"));
    let log_file = matches.get_one::<String>("log-file").map(Path::new);
    init_logging(level, log_file)?;
    info!("{} version {}", program_name, version);
    Ok(())
}
