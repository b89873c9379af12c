//! Logging shim.
//!
//! Library code is compiled for the STM32 target (defmt over RTT), for host
//! tools with `std` (tracing), and for plain host unit tests (nothing). These
//! macros pick the backend at compile time so call sites stay identical.
//! Format strings must use plain `{}` placeholders, which both backends
//! accept; arguments must implement `defmt::Format` and `Display`.

macro_rules! log_event {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        {
            ::defmt::$level!($($arg)*);
        }
        #[cfg(all(not(feature = "defmt"), feature = "std"))]
        {
            ::tracing::$level!($($arg)*);
        }
        #[cfg(all(not(feature = "defmt"), not(feature = "std")))]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => { log_event!(debug, $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { log_event!(info, $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { log_event!(warn, $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { log_event!(error, $($arg)*) };
}
