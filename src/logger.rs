//! Per-run log file for edits, uploads and pipeline calls.
//!
//! `init()` opens `<data dir>/Aichitect/aichitect.log`, replacing whatever the
//! previous run left there. Until it has been called (library use, unit
//! tests) the `log_info!` / `log_warn!` / `log_err!` macros write nothing.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::{Local, Utc};

struct SessionLog {
    path: PathBuf,
    file: Mutex<File>,
}

static SESSION_LOG: OnceLock<SessionLog> = OnceLock::new();

/// Where this run is logging to, once `init()` has succeeded.
pub fn log_path() -> Option<&'static Path> {
    SESSION_LOG.get().map(|log| log.path.as_path())
}

/// Appends one raw line. I/O errors are dropped.
pub fn write_line(line: &str) {
    if let Some(log) = SESSION_LOG.get()
        && let Ok(mut file) = log.file.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Appends `[HH:MM:SS.mmm] [LEVEL] msg`.
pub fn write(level: &str, msg: &str) {
    write_line(&format!("[{}] [{}] {}", Local::now().format("%H:%M:%S%.3f"), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Opens the run's log file and routes panics into it. Call once from `main`.
pub fn init() {
    let path = data_dir().join("Aichitect").join("aichitect.log");
    if let Err(e) = open(&path) {
        eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
        return;
    }

    write_line(&format!("=== Aichitect run started {} ===", Utc::now().to_rfc3339()));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write("PANIC", &info.to_string());
        prev(info);
    }));
}

fn open(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    // A second init() keeps the first file.
    let _ = SESSION_LOG.set(SessionLog {
        path: path.to_path_buf(),
        file: Mutex::new(file),
    });
    Ok(())
}

/// `%APPDATA%` on Windows, `~/Library/Application Support` on macOS,
/// `$XDG_DATA_HOME` or `~/.local/share` elsewhere.
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(appdata) = std::env::var("APPDATA") {
        return PathBuf::from(appdata);
    }
    #[cfg(target_os = "macos")]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join("Library").join("Application Support");
    }
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("."))
}
