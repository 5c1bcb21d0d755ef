use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;

/// Global shutdown flag (atomic bool)
///
/// Set to true when shutdown is requested via signal. The engine checks it
/// between profiles and between files.
pub static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Which signal triggered shutdown
///
/// Values: 0 = none, 1 = SIGINT, 2 = SIGTERM
pub static SIGNAL_TYPE: AtomicU8 = AtomicU8::new(0);

/// Checks if graceful shutdown has been requested
pub fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Asks the engine to stop after the file it is working on
pub fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Request shutdown with signal type for later logging
///
/// Only sets atomic flags; logging happens in the engine.
pub fn request_shutdown_with_signal(signal_type: u8) {
    SIGNAL_TYPE.store(signal_type, Ordering::SeqCst);
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Get the signal name that triggered shutdown, if any
pub fn signal_name() -> Option<&'static str> {
    match SIGNAL_TYPE.load(Ordering::SeqCst) {
        1 => Some("SIGINT"),
        2 => Some("SIGTERM"),
        _ => None,
    }
}

/// Starts a thread that turns SIGINT/SIGTERM into a shutdown request
///
/// # Errors
/// If the signal handlers cannot be registered
pub fn install_signal_handlers() -> io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let signal_type = match sig {
                SIGTERM => 2,
                _ => 1,
            };
            request_shutdown_with_signal(signal_type);
        }
    });

    Ok(())
}

/// Reset the shutdown flag (for testing purposes only)
#[cfg(test)]
pub fn reset_shutdown_for_tests() {
    SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
    SIGNAL_TYPE.store(0, Ordering::SeqCst);
}
