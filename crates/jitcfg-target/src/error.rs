//! Error types for target profile operations.

use std::path::PathBuf;

use crate::arch::ArchFamily;

/// Errors that can occur while resolving or reading a target profile.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// A derived fact was read from a profile whose family is unsupported.
    #[error("target architecture is unsupported: cannot read {fact}")]
    Unsupported {
        /// The fact that was requested.
        fact: &'static str,
    },

    /// A family name did not match any known family.
    #[error("unknown architecture family '{name}' (expected one of: {})", ArchFamily::NAMES.join(", "))]
    UnknownFamily {
        /// The name that failed to parse.
        name: String,
    },

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading/writing configuration files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file not found.
    #[error("config file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
