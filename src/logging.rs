use chrono::Local;
use once_cell::sync::Lazy;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Global log file path protected by Mutex
///
/// When None, logs go to stdout.
pub static LOG_FILE: Lazy<Mutex<Option<String>>> = Lazy::new(|| Mutex::new(None));

/// Whether INFO lines are written at all
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Severity of a log line. PASS/WARN/FAIL mirror the report groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Level::Info => "INFO",
            Level::Pass => "PASS",
            Level::Warn => "WARN",
            Level::Fail => "FAIL",
        };
        f.write_str(tag)
    }
}

/// Logs an INFO message with timestamp to configured output
///
/// # Example
/// ```text
/// // log("Starting transfer").ok();
/// ```
pub fn log(message: &str) -> io::Result<()> {
    log_with_profile(Level::Info, message, None)
}

/// Logs a message with timestamp, level tag and optional profile name
///
/// INFO lines are dropped unless verbose mode is on.
///
/// # Example
/// ```text
/// // log_with_profile(Level::Fail, "Login failed", Some("vendor-a")).ok();
/// ```
pub fn log_with_profile(level: Level, message: &str, profile: Option<&str>) -> io::Result<()> {
    if level == Level::Info && !is_verbose() {
        return Ok(());
    }

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let log_message = match profile {
        Some(name) => format!("{} {} [{}] {}\n", timestamp, level, name, message),
        None => format!("{} {} {}\n", timestamp, level, message),
    };

    let guard = LOG_FILE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match &*guard {
        Some(log_file) => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            file.write_all(log_message.as_bytes())?;
        }
        None => {
            print!("{}", log_message);
        }
    }

    Ok(())
}

/// Sets the path for the log file
///
/// Subsequent calls to the log functions append to this file.
pub fn set_log_file<P: AsRef<Path>>(path: P) {
    let path_str = path.as_ref().to_string_lossy().into_owned();
    *LOG_FILE.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(path_str);
}

/// True while no log file is set and log lines go to stdout
pub fn logs_to_stdout() -> bool {
    LOG_FILE.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).is_none()
}

/// Turns INFO output on or off
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}
