//! # Logging
//!
//! Unified logging macros for the kernel and the firmware:
//! - Target (`target_os = "none"`): forwards to `defmt`, transported over
//!   RTT by `defmt-rtt` in the firmware binary.
//! - Host: arguments are borrowed and dropped, nothing is formatted.
//!
//! Format strings use `defmt` syntax. Logging from the tick handler is
//! allowed; keep it to events that are rare (promotions, faults) or at
//! trace level.

/// Log an unrecoverable condition.
#[macro_export]
macro_rules! log_error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::error!($fmt $(, $arg)*);

        #[cfg(not(target_os = "none"))]
        { $( let _ = &$arg; )* }
    }};
}

/// Log a suspicious but survivable condition.
#[macro_export]
macro_rules! log_warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::warn!($fmt $(, $arg)*);

        #[cfg(not(target_os = "none"))]
        { $( let _ = &$arg; )* }
    }};
}

/// Log a lifecycle event.
#[macro_export]
macro_rules! log_info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::info!($fmt $(, $arg)*);

        #[cfg(not(target_os = "none"))]
        { $( let _ = &$arg; )* }
    }};
}

/// Log a debug message.
#[macro_export]
macro_rules! log_debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::debug!($fmt $(, $arg)*);

        #[cfg(not(target_os = "none"))]
        { $( let _ = &$arg; )* }
    }};
}

/// Log a per-switch trace message.
#[macro_export]
macro_rules! log_trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::trace!($fmt $(, $arg)*);

        #[cfg(not(target_os = "none"))]
        { $( let _ = &$arg; )* }
    }};
}
