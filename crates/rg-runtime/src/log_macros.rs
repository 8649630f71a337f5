/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field so callers never spell the string
/// literal themselves. Domains in use: `sys` (lifecycle), `val` (validation
/// cycles), `svc` (count-service calls), `conf` (configuration).
///
/// # Usage
///
/// ```ignore
/// rg_info!(sys, groups = 4, "definition session started");
/// rg_warn!(svc, error = %e, "count call failed");
/// rg_debug!(val, generation = 7, "submission superseded");
/// ```
///
/// The domain is a bare identifier, converted to a `&str` by the macro.

// ---------------------------------------------------------------------------
// Core macro
// ---------------------------------------------------------------------------

/// Internal helper. Use `rg_error!` … `rg_trace!` instead.
#[doc(hidden)]
macro_rules! rg_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

// ---------------------------------------------------------------------------
// Per-level macros
// ---------------------------------------------------------------------------

#[allow(unused_macros)]
macro_rules! rg_error {
    ($domain:ident, $($rest:tt)*) => {
        rg_log!(error, $domain, $($rest)*)
    };
}

macro_rules! rg_warn {
    ($domain:ident, $($rest:tt)*) => {
        rg_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! rg_info {
    ($domain:ident, $($rest:tt)*) => {
        rg_log!(info, $domain, $($rest)*)
    };
}

macro_rules! rg_debug {
    ($domain:ident, $($rest:tt)*) => {
        rg_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! rg_trace {
    ($domain:ident, $($rest:tt)*) => {
        rg_log!(trace, $domain, $($rest)*)
    };
}
