//! Feature-selected logging macros.
//!
//! - `log-defmt`: forwards to `defmt` (binary logging over RTT)
//! - otherwise: every macro expands to nothing
//!
//! Never log from the tick interrupt; the scheduler's ISR path stays silent.

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { defmt::info!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}

#[cfg(not(feature = "log-defmt"))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "log-defmt"))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "log-defmt"))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "log-defmt"))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "log-defmt"))]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}
