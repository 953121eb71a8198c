//! Session logger — writes all log output to a single file in the OS data directory.
//!
//! The file is truncated at each launch, so it only ever contains output from
//! the most-recent session and never grows unboundedly.
//!
//! Log location:
//!   Windows:  `%APPDATA%\OekakiBoard\oekaki-board.log`
//!   Linux:    `~/.local/share/OekakiBoard/oekaki-board.log`
//!   macOS:    `~/Library/Application Support/OekakiBoard/oekaki-board.log`
//!
//! Usage — anywhere in the crate use the `log_info!` / `log_warn!` / `log_err!`
//! macros, or call `crate::logger::write_line(...)` directly.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Write a line to the session log.  Silently ignores I/O errors so that
/// logging never crashes the widget.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Write a timestamped, level-tagged line to the session log.
pub fn write(level: &str, msg: &str) {
    write_line(&format!("[{}] [{}] {}", timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*))
    };
}

/// Initialise the session logger.  Must be called once before any logging.
///
/// * Creates (or truncates) the log file.
/// * Installs a panic hook that writes the panic message to the log before
///   propagating to the default handler.
pub fn init() {
    let path = app_data_dir().join("oekaki-board.log");

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            // Can't open log file — not fatal, just skip
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    }

    write_line(&format!(
        "=== oekaki-board session started (unix {}) ===",
        epoch_secs()
    ));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    // Mirror panic info to the log, then run the default handler
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
}

/// Per-app data directory (`<platform data dir>/OekakiBoard`). Shared with
/// the settings file.
pub(crate) fn app_data_dir() -> PathBuf {
    data_dir().join("OekakiBoard")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort: current working directory
    PathBuf::from(".")
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Simple HH:MM:SS-within-the-day timestamp (good enough for a session log —
/// no chrono dep).
fn timestamp() -> String {
    let secs = epoch_secs();
    format!(
        "{:02}:{:02}:{:02}",
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
