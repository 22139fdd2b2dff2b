//! Error types for scene-import

use std::fmt;
use std::io;
use thiserror::Error;

/// Where in the input a problem was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    /// Absolute byte offset into a binary source
    Offset(u64),
    /// One-based line number in a text source
    Line(usize),
    /// No position information available
    #[default]
    Unknown,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Offset(offset) => write!(f, "offset {offset:#X}"),
            Location::Line(line) => write!(f, "line {line}"),
            Location::Unknown => write!(f, "unknown position"),
        }
    }
}

/// Main error type for import operations
#[derive(Debug, Error)]
pub enum ImportError {
    /// IO error reported by the underlying source
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Format tag or file variant without a decoder
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Declared length or count exceeds the available input
    #[error("Truncated input at {location}: {context}")]
    TruncatedInput { location: Location, context: String },

    /// Magic number or version mismatch
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Framing error other than truncation (zero-length container, bad row)
    #[error("Malformed input at {location}: {reason}")]
    Malformed { location: Location, reason: String },

    /// Structure DNA block absent or unreadable
    #[error("Missing schema: {0}")]
    MissingSchema(String),

    /// A face references a vertex index or material that does not exist
    #[error("Unresolved reference at {location}: {reference}")]
    UnresolvedReference { location: Location, reference: String },
}

impl ImportError {
    /// Create a truncation error
    pub fn truncated(location: Location, context: impl Into<String>) -> Self {
        ImportError::TruncatedInput {
            location,
            context: context.into(),
        }
    }

    /// Create a framing error
    pub fn malformed(location: Location, reason: impl Into<String>) -> Self {
        ImportError::Malformed {
            location,
            reason: reason.into(),
        }
    }

    /// Create an unresolved reference error
    pub fn unresolved(location: Location, reference: impl Into<String>) -> Self {
        ImportError::UnresolvedReference {
            location,
            reference: reference.into(),
        }
    }

    /// Attach a location to an error raised without one.
    pub fn at(self, at: Location) -> Self {
        match self {
            ImportError::TruncatedInput {
                location: Location::Unknown,
                context,
            } => ImportError::TruncatedInput { location: at, context },
            ImportError::Malformed {
                location: Location::Unknown,
                reason,
            } => ImportError::Malformed { location: at, reason },
            ImportError::UnresolvedReference {
                location: Location::Unknown,
                reference,
            } => ImportError::UnresolvedReference { location: at, reference },
            other => other,
        }
    }

    /// Framing errors abort a decode even in failsafe mode.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ImportError::TruncatedInput { .. }
                | ImportError::MalformedHeader(_)
                | ImportError::Malformed { .. }
                | ImportError::MissingSchema(_)
                | ImportError::Io(_)
        )
    }

    /// Position attached to the error, if any
    pub fn location(&self) -> Location {
        match self {
            ImportError::TruncatedInput { location, .. }
            | ImportError::Malformed { location, .. }
            | ImportError::UnresolvedReference { location, .. } => *location,
            _ => Location::Unknown,
        }
    }
}

/// Result type alias for import operations
pub type Result<T> = std::result::Result<T, ImportError>;
