#![deny(missing_docs)]
//! Shared logging utilities for the batch review workspace.
//!
//! This crate provides the `review_*` logging macros used across the codebase,
//! a per-thread poll tick used to correlate log lines with the polling cycle
//! that produced them, and a minimal test initializer for the global logger.

use std::cell::Cell;

thread_local! {
    /// Thread-local storage for the current poll cycle number.
    static POLL_TICK: Cell<u64> = const { Cell::new(0) };
}

/// Sets the poll cycle number for the current thread.
/// The orchestrator calls this once per poll tick.
pub fn set_poll_tick(tick: u64) {
    POLL_TICK.with(|v| v.set(tick));
}

/// Retrieves the poll cycle number for the current thread.
/// Returns 0 before the first poll.
pub fn get_poll_tick() -> u64 {
    POLL_TICK.with(|v| v.get())
}

/// Logs a trace-level message tagged with the current poll tick.
#[macro_export]
macro_rules! review_trace {
    ($($arg:tt)*) => {{
        log::trace!("[tick {}] {}", $crate::get_poll_tick(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current poll tick.
#[macro_export]
macro_rules! review_info {
    ($($arg:tt)*) => {{
        log::info!("[tick {}] {}", $crate::get_poll_tick(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current poll tick.
#[macro_export]
macro_rules! review_debug {
    ($($arg:tt)*) => {{
        log::debug!("[tick {}] {}", $crate::get_poll_tick(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current poll tick.
#[macro_export]
macro_rules! review_warn {
    ($($arg:tt)*) => {{
        log::warn!("[tick {}] {}", $crate::get_poll_tick(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current poll tick.
#[macro_export]
macro_rules! review_error {
    ($($arg:tt)*) => {{
        log::error!("[tick {}] {}", $crate::get_poll_tick(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::{get_poll_tick, set_poll_tick};

    #[test]
    fn poll_tick_is_per_thread() {
        set_poll_tick(7);
        assert_eq!(get_poll_tick(), 7);
        let other = std::thread::spawn(get_poll_tick).join().unwrap();
        assert_eq!(other, 0);
    }
}
