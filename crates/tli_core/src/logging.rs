//! Process logging for the `tli` binary.
//!
//! # Responsibility
//! - Write rolling log files under the per-user log directory.
//! - Mirror warnings and errors to stderr as `tli: WARN: <message>`.
//! - Record panics as a single sanitized event before the default hook runs.
//!
//! # Invariants
//! - At most one logger per process; asking again with the same settings is a
//!   no-op, asking with different settings is an error.
//! - Log events carry metadata only: no note bodies, no credentials.

use flexi_logger::{
    Cleanup, Criterion, DeferredNow, Duplicate, FileSpec, FlexiLoggerError, LogSpecification,
    Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable overriding the default log level.
pub const LOG_LEVEL_ENV_VAR: &str = "TLI_LOG";

const LOG_FILE_BASENAME: &str = "tli";
const ROTATE_AT_BYTES: u64 = 4 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 3;
const PANIC_SUMMARY_CHARS: usize = 120;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Logging bootstrap failure.
#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    RelativeDir(PathBuf),
    CreateDir { path: PathBuf, source: io::Error },
    Backend(FlexiLoggerError),
    /// A logger with different settings is already running.
    AlreadyActive(LogSettings),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(value) => write!(
                f,
                "unknown log level `{value}` (expected off|error|warn|info|debug|trace)"
            ),
            Self::RelativeDir(path) => {
                write!(f, "log directory must be absolute: {}", path.display())
            }
            Self::CreateDir { path, source } => {
                write!(f, "cannot create log directory {}: {source}", path.display())
            }
            Self::Backend(err) => write!(f, "cannot start logger: {err}"),
            Self::AlreadyActive(active) => write!(
                f,
                "logging already active at {} with level {}",
                active.dir.display(),
                active.level
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            Self::UnknownLevel(_) | Self::RelativeDir(_) | Self::AlreadyActive(_) => None,
        }
    }
}

/// Level and directory a logger is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub dir: PathBuf,
}

impl LogSettings {
    /// Parses `level` and checks that `dir` is absolute.
    pub fn new(level: &str, dir: impl Into<PathBuf>) -> Result<Self, LoggingError> {
        let dir = dir.into();
        if !dir.is_absolute() {
            return Err(LoggingError::RelativeDir(dir));
        }
        Ok(Self {
            level: parse_level(level)?,
            dir,
        })
    }

    /// Uses `TLI_LOG` when set, otherwise `debug` in debug builds and `info`
    /// in release builds.
    pub fn from_env(dir: &Path) -> Result<Self, LoggingError> {
        Self::with_override(std::env::var(LOG_LEVEL_ENV_VAR).ok(), dir)
    }

    fn with_override(level: Option<String>, dir: &Path) -> Result<Self, LoggingError> {
        match level.filter(|value| !value.trim().is_empty()) {
            Some(level) => Self::new(&level, dir),
            None => Self::new(default_level(), dir),
        }
    }
}

fn default_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(value: &str) -> Result<LevelFilter, LoggingError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("warning") {
        return Ok(LevelFilter::Warn);
    }
    LevelFilter::from_str(value).map_err(|_| LoggingError::UnknownLevel(value.to_string()))
}

/// Starts the process logger.
///
/// # Errors
/// - `LoggingError::AlreadyActive` when a logger with other settings runs.
/// - `LoggingError::CreateDir` / `LoggingError::Backend` when the log files
///   cannot be opened.
pub fn init_logging(settings: &LogSettings) -> Result<(), LoggingError> {
    let active = ACTIVE.get_or_try_init(|| start(settings))?;
    if active.settings != *settings {
        return Err(LoggingError::AlreadyActive(active.settings.clone()));
    }
    Ok(())
}

fn start(settings: &LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDir {
        path: settings.dir.clone(),
        source,
    })?;

    let handle = Logger::with(LogSpecification::builder().default(settings.level).build())
        .log_to_file(
            FileSpec::default()
                .directory(&settings.dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .duplicate_to_stderr(Duplicate::Warn)
        .format_for_stderr(stderr_format)
        .start()
        .map_err(LoggingError::Backend)?;

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let location = panic
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        error!(
            "event=panic module=logging status=error location={location} payload={}",
            panic_summary(panic.payload())
        );
        previous(panic);
    }));

    info!(
        "event=logging_init module=logging status=ok version={} level={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        settings.level,
        settings.dir.display()
    );
    Ok(ActiveLogger {
        settings: settings.clone(),
        _handle: handle,
    })
}

fn stderr_format(
    w: &mut dyn Write,
    _now: &mut DeferredNow,
    record: &log::Record,
) -> io::Result<()> {
    write!(w, "tli: {}: {}", record.level(), record.args())
}

// First line only, capped; panic text may echo user input.
fn panic_summary(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    let first_line = text.lines().next().unwrap_or_default();
    let mut summary: String = first_line.chars().take(PANIC_SUMMARY_CHARS).collect();
    if summary.len() < text.len() {
        summary.push_str("...");
    }
    summary
}
