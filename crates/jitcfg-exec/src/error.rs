//! Error types for executable memory operations.

use jitcfg_target::{ArchFamily, TargetError};

/// Errors surfaced by allocation, protection changes, and cache sync.
///
/// None of these are retried internally.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The profile cannot be used (e.g. unsupported family).
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Zero-byte regions are rejected.
    #[error("cannot allocate an empty code region")]
    EmptyRegion,

    /// The platform refused to map memory.
    #[error("failed to map {size} bytes of code memory: {source}")]
    Map {
        size: usize,
        #[source]
        source: std::io::Error,
    },

    /// The platform refused a protection change.
    #[error("failed to make code region {to}: {source}")]
    Protect {
        to: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A write or sync range falls outside the region.
    #[error("range {start}..{end} is outside a {len}-byte code region")]
    OutOfBounds { start: usize, end: usize, len: usize },

    /// The region is in its executable phase.
    #[error("code region is executable; make it writable before writing")]
    NotWritable,

    /// The region is in its writable phase.
    #[error("code region is writable; make it executable before calling into it")]
    NotExecutable,

    /// A failed protection change left the region without a mapping.
    #[error("code region lost its mapping after a failed protection change")]
    Unmapped,

    /// The profile describes a different machine than the one running.
    #[error("profile targets {profile} but this host is {host}; generated code cannot run here")]
    ForeignTarget {
        profile: ArchFamily,
        host: ArchFamily,
    },

    /// A release did not match any outstanding allocation.
    #[error("released a {len}-byte code region this allocator does not account for")]
    UnknownRegion { len: usize },

    /// The host has no instruction-cache flush primitive.
    #[error("instruction cache synchronization unavailable: {detail}")]
    CacheSync { detail: String },
}

/// Result type for executable memory operations.
pub type Result<T> = std::result::Result<T, ExecError>;
