// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Logging and Diagnostics
//!
//! Scheduler diagnostics are emitted through the `log` facade so the
//! embedding kernel decides where they go (serial port, framebuffer, or
//! a test logger on the host). Nothing is printed until a logger is
//! installed with `log::set_logger`.
//!
//! # Log levels
//!
//! - **Trace**: every context switch and queue operation
//! - **Debug**: thread creation, exit, reaping
//! - **Info**: boot milestones and statistics
//! - **Warning**: recoverable misuse
//! - **Error**: the message printed right before a fatal halt
//!
//! # Usage
//!
//! ```ignore
//! log_debug!("thread {} created at priority {}", tid, prio);
//! fatal!("thread block at {:#x} is corrupted", addr);
//! ```

/// Target string attached to every record from this crate
pub const LOG_TARGET: &str = "sched";

/// Log levels
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace-level logging (very verbose)
    Trace = 0,

    /// Debug-level logging (verbose)
    Debug = 1,

    /// Informational logging
    Info = 2,

    /// Warning-level logging
    Warning = 3,

    /// Error-level logging
    Error = 4,
}

impl LogLevel {
    /// Matching level of the `log` facade
    pub const fn to_log(self) -> log::Level {
        match self {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Print a formatted message at a specific log level
///
/// # Arguments
///
/// * `level` - Log level for this message
/// * `args` - Format arguments
#[inline]
pub fn log_print(level: LogLevel, args: core::fmt::Arguments) {
    log::log!(target: LOG_TARGET, level.to_log(), "{}", args);
}

/// Report an unrecoverable error and stop
///
/// On bare metal the panic handler halts the CPU. On the host the panic
/// unwinds so tests can observe it.
#[inline(never)]
#[cold]
#[track_caller]
pub fn log_fatal(args: core::fmt::Arguments) -> ! {
    let location = core::panic::Location::caller();
    log_print(LogLevel::Error, format_args!("{}: {}", location, args));
    panic!("{}", args);
}

/// Log a trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Trace, format_args!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Debug, format_args!($($arg)*))
    };
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Info, format_args!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Warning, format_args!($($arg)*))
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Error, format_args!($($arg)*))
    };
}

/// Halt on a broken kernel invariant
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_fatal(format_args!($($arg)*))
    };
}
