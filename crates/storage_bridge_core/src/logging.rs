//! Rolling file log for the bridge host process.
//!
//! # Responsibility
//! - Start one `flexi_logger` file backend per process from `BridgeConfig`.
//! - Route panics into the log as single-line, length-capped summaries.
//!
//! # Invariants
//! - The first successful start wins; later starts must name the same level
//!   and directory or they are refused.
//! - Starting never panics.
//! - Panic payloads can echo script-supplied text, so they are flattened and
//!   capped before they are written.

use crate::config::{BridgeConfig, LogLevel};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "storage_bridge";
const ROTATE_AT_BYTES: u64 = 4 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 3;
const PANIC_SUMMARY_CHARS: usize = 160;

static ACTIVE_LOG: OnceCell<ActiveLog> = OnceCell::new();

struct ActiveLog {
    level: LogLevel,
    dir: PathBuf,
    _handle: LoggerHandle,
}

/// Starts file logging as described by `config`.
///
/// Returns `Ok(false)` without touching the logger when `log_dir` is unset.
pub fn init_logging_from_config(config: &BridgeConfig) -> Result<bool, String> {
    let Some(dir) = config.log_dir.as_deref() else {
        return Ok(false);
    };
    init_logging(config.log_level, dir)?;
    Ok(true)
}

/// Starts file logging at `level` under the absolute directory `dir`.
///
/// # Errors
/// - `dir` is relative or cannot be created.
/// - The backend fails to start.
/// - Logging already runs with a different level or directory.
pub fn init_logging(level: LogLevel, dir: &Path) -> Result<(), String> {
    if !dir.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{}`", dir.display()));
    }

    let active = ACTIVE_LOG.get_or_try_init(|| start_backend(level, dir))?;
    if active.dir != dir || active.level != level {
        return Err(format!(
            "logging already runs at `{}` in `{}`; refusing to switch to `{level}` in `{}`",
            active.level,
            active.dir.display(),
            dir.display()
        ));
    }
    Ok(())
}

/// Level and directory of the running log, if any.
pub fn logging_status() -> Option<(LogLevel, PathBuf)> {
    ACTIVE_LOG.get().map(|active| (active.level, active.dir.clone()))
}

fn start_backend(level: LogLevel, dir: &Path) -> Result<ActiveLog, String> {
    std::fs::create_dir_all(dir)
        .map_err(|err| format!("failed to create log directory `{}`: {err}", dir.display()))?;

    let handle = Logger::try_with_str(level.as_str())
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    // Runs at most once: the cell is filled as soon as this returns Ok.
    route_panics_to_log();
    info!(
        "event=bridge_start module=core status=ok platform={} version={} level={level}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION"),
    );

    Ok(ActiveLog {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

fn route_panics_to_log() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        error!(
            "event=panic_captured module=core status=error location={location} payload={}",
            panic_summary(info)
        );
        previous(info);
    }));
}

fn panic_summary(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    single_line(text, PANIC_SUMMARY_CHARS)
}

fn single_line(text: &str, max_chars: usize) -> String {
    let mut line = text
        .chars()
        .map(|ch| if matches!(ch, '\n' | '\r') { ' ' } else { ch })
        .take(max_chars)
        .collect::<String>();
    if text.chars().count() > max_chars {
        line.push_str("...");
    }
    line
}
