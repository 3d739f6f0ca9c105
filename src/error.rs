//! Error types for caption operations.

use crate::convert::CaptionFormat;
use thiserror::Error;

/// Result type for caption operations.
pub type Result<T> = std::result::Result<T, CaptionError>;

/// Errors that can occur while reading, writing or transforming captions.
#[derive(Debug, Error)]
pub enum CaptionError {
    /// The input is neither a recognized stream nor a usable string.
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    /// A codec's `detect` did not recognize the content. Soft by design:
    /// `open` downgrades this to an empty document, strict callers may
    /// propagate it.
    #[error("Content does not look like {format}")]
    DetectionMismatch {
        /// The format whose detection failed.
        format: CaptionFormat,
    },

    /// A malformed block aborted the whole read. No partial-document
    /// recovery is attempted.
    #[error("Malformed {format} block at line {line}: {message}")]
    MalformedBlock {
        /// The format being parsed.
        format: CaptionFormat,
        /// 1-based line number of the offending input line.
        line: usize,
        /// Description of what was wrong.
        message: String,
    },

    /// A time string could not be parsed.
    #[error("Invalid timestamp {token:?}: {message}")]
    InvalidTimestamp {
        /// The offending token.
        token: String,
        /// Description of the expected form.
        message: String,
    },

    /// A color value could not be parsed. Usually degraded to black at the
    /// style layer; surfaced only by the strict parser.
    #[error("Invalid color value: {0}")]
    InvalidColor(String),

    /// A JSON snapshot was missing the identifier sentinel or carried an
    /// incompatible version.
    #[error("Invalid caption snapshot: {reason}")]
    InvalidJsonSnapshot {
        /// Why the snapshot was rejected.
        reason: String,
    },

    /// The operation is not implemented for this format.
    #[error("{operation} is not supported for {format}")]
    UnsupportedOperation {
        /// The format the operation was attempted on.
        format: CaptionFormat,
        /// The operation name (`read`, `save`, `detect`).
        operation: String,
    },

    /// A frame-indexed format was used without a frame rate.
    #[error("{format} requires an explicit frame rate")]
    MissingFrameRate {
        /// The frame-indexed format.
        format: CaptionFormat,
    },

    /// Time subtraction would have gone negative.
    #[error("Time underflow")]
    TimeUnderflow,

    /// An underlying I/O failure, with the path it happened on.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file the operation touched.
        path: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl CaptionError {
    /// Create a malformed-block error.
    pub fn malformed_block(
        format: CaptionFormat,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedBlock {
            format,
            line,
            message: message.into(),
        }
    }

    /// Create an invalid-timestamp error naming the offending token.
    pub fn invalid_timestamp(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            token: token.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-snapshot error.
    pub fn invalid_snapshot(reason: impl Into<String>) -> Self {
        Self::InvalidJsonSnapshot {
            reason: reason.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(format: CaptionFormat, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            format,
            operation: operation.into(),
        }
    }

    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the soft detection mismatch callers may choose
    /// to ignore.
    #[must_use]
    pub fn is_detection_mismatch(&self) -> bool {
        matches!(self, Self::DetectionMismatch { .. })
    }
}
