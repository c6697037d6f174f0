//! Logging macros which compile to nothing but argument evaluation unless the `logging` feature is enabled.

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        ::log::error!($($arg)*);

        #[cfg(not(feature = "logging"))]
        let _ = format_args!($($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        ::log::warn!($($arg)*);

        #[cfg(not(feature = "logging"))]
        let _ = format_args!($($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        ::log::info!($($arg)*);

        #[cfg(not(feature = "logging"))]
        let _ = format_args!($($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        ::log::debug!($($arg)*);

        #[cfg(not(feature = "logging"))]
        let _ = format_args!($($arg)*);
    }};
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        ::log::trace!($($arg)*);

        #[cfg(not(feature = "logging"))]
        let _ = format_args!($($arg)*);
    }};
}
