// src/logging.rs
//
// Timestamped stderr logging with an optional log file.

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Global log file handle. When `Some`, `tlog!` writes to both stderr and this file.
pub static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

const LOG_LINK_NAME: &str = "frametap.log";
const LOG_FILE_FORMAT: &str = "%Y%m%d-%H%M%S-frametap.log";

/// `HH:MM:SS.mmm` local time, the prefix of every log line.
pub fn timestamp() -> impl Display {
    chrono::Local::now().format("%H:%M:%S%.3f")
}

/// Stderr only. For messages emitted around changes to LOG_FILE, where
/// `tlog!` would re-lock it.
fn log_stderr(msg: impl Display) {
    eprintln!("{} [logging] {}", timestamp(), msg);
}

/// Start writing `tlog!` output to a new timestamped file in `log_dir`,
/// replacing any file already open. On Unix a `frametap.log` symlink is
/// pointed at it. Returns the path of the new log file.
pub fn init_file_logging(log_dir: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create log dir {}: {}", log_dir.display(), e))?;

    let filename = chrono::Local::now().format(LOG_FILE_FORMAT).to_string();
    let log_path = log_dir.join(&filename);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to open log file {}: {}", log_path.display(), e))?;

    #[cfg(unix)]
    update_latest_link(log_dir, &filename);

    let previous = LOG_FILE
        .lock()
        .map(|mut guard| guard.replace(file))
        .map_err(|_| "Log file lock poisoned".to_string())?;
    if previous.is_some() {
        log_stderr("Previous log file closed");
    }
    log_stderr(format_args!("File logging started: {}", log_path.display()));

    Ok(log_path)
}

#[cfg(unix)]
fn update_latest_link(log_dir: &Path, filename: &str) {
    let link_path = log_dir.join(LOG_LINK_NAME);
    let _ = std::fs::remove_file(&link_path);
    if let Err(e) = std::os::unix::fs::symlink(filename, &link_path) {
        log_stderr(format_args!("Failed to create {} symlink: {}", LOG_LINK_NAME, e));
    }
}

/// Stop file logging and close the log file.
pub fn stop_file_logging() {
    let closed = LOG_FILE
        .lock()
        .map(|mut guard| guard.take().is_some())
        .unwrap_or(false);
    if closed {
        log_stderr("File logging stopped");
    }
}

/// Timestamped logging macro.
/// Writes `<timestamp> <message>` to stderr, and to the log file while file
/// logging is enabled.
#[macro_export]
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let line = format!("{} {}", $crate::logging::timestamp(), format_args!($($arg)*));
        eprintln!("{}", line);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = writeln!(file, "{}", line);
            }
        }
    }};
}
