//! Debug-only invariant checks.
//!
//! A code generator that continues past a broken invariant can emit or run
//! corrupt machine code, so a failed check never returns: it reports the
//! message and aborts the process. With diagnostics disabled (release builds
//! without the `debug-diagnostics` feature) every check compiles to nothing
//! and its condition is not evaluated.

use std::fmt;
use std::panic::Location;

/// Whether checks are compiled in.
pub const ENABLED: bool = cfg!(any(debug_assertions, feature = "debug-diagnostics"));

/// Abort with `message` unless `$cond` holds. No-op when diagnostics are
/// disabled.
#[macro_export]
macro_rules! jit_assert {
    ($cond:expr $(,)?) => {
        $crate::jit_assert!($cond, "{}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        if $crate::diag::ENABLED && !$cond {
            $crate::diag::fail(
                $crate::diag::Failure::Assertion,
                ::std::panic::Location::caller(),
                format_args!($($arg)+),
            );
        }
    };
}

/// Abort with `message`: control reached a state that must not exist.
/// No-op when diagnostics are disabled.
#[macro_export]
macro_rules! jit_unreachable {
    () => {
        $crate::jit_unreachable!("entered unreachable code")
    };
    ($($arg:tt)+) => {
        if $crate::diag::ENABLED {
            $crate::diag::fail(
                $crate::diag::Failure::Unreachable,
                ::std::panic::Location::caller(),
                format_args!($($arg)+),
            );
        }
    };
}

/// Kind of check that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Assertion,
    Unreachable,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Assertion => f.write_str("assertion failed"),
            Failure::Unreachable => f.write_str("should never be reached"),
        }
    }
}

/// Function form of [`jit_assert!`].
#[inline(always)]
#[track_caller]
pub fn assert(condition: bool, message: &str) {
    if ENABLED && !condition {
        fail(Failure::Assertion, Location::caller(), format_args!("{message}"));
    }
}

/// Function form of [`jit_unreachable!`].
#[inline(always)]
#[track_caller]
pub fn report_unreachable(message: &str) {
    if ENABLED {
        fail(Failure::Unreachable, Location::caller(), format_args!("{message}"));
    }
}

/// Report a failed check and abort. Does not unwind.
#[cold]
#[inline(never)]
pub fn fail(kind: Failure, location: &Location<'_>, message: fmt::Arguments<'_>) -> ! {
    if log::log_enabled!(log::Level::Error) {
        log::error!("{kind} at {location}: {message}");
    } else {
        eprintln!("{kind} at {location}: {message}");
    }
    std::process::abort()
}
