//! Error types shared by every stage of the pipeline
use thiserror::Error;

/// Result alias using [`OrthoError`].
pub type Result<T> = std::result::Result<T, OrthoError>;

/// Errors surfaced by parsing, camera fitting and rendering.
///
/// Parse errors describe bad input data. The remaining variants are
/// configuration errors raised by the call that received the bad parameter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrthoError {
    /// The binary STL buffer ends before the data its header announces.
    #[error("truncated STL: expected at least {expected} bytes, found {actual}")]
    TruncatedStl {
        /// Bytes required by the header and triangle count.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// The text STL could not be read.
    #[error("malformed STL at line {line}: {reason}")]
    MalformedStl {
        /// 1-based line number of the offending input.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// Padding factors must lie in `[0, 0.5)`.
    #[error("padding factor {0} must be in [0, 0.5)")]
    InvalidPadding(f64),

    /// Images must have at least one pixel along both axes.
    #[error("image size {width}x{height} must be non-zero")]
    InvalidImageSize {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// The model bounds project to a window with no usable extent.
    #[error("model bounds project to an empty viewing window")]
    DegenerateBounds,
}

impl OrthoError {
    /// Create a malformed-input error.
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedStl {
            line,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the input bytes rather than by configuration.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::TruncatedStl { .. } | Self::MalformedStl { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrthoError::TruncatedStl {
            expected: 134,
            actual: 90,
        };
        assert!(format!("{err}").contains("134"));

        let err = OrthoError::malformed(7, "expected three coordinates");
        assert!(format!("{err}").contains("line 7"));
        assert!(format!("{err}").contains("three coordinates"));
    }

    #[test]
    fn test_parse_error_classification() {
        assert!(OrthoError::malformed(1, "x").is_parse_error());
        assert!(!OrthoError::InvalidPadding(0.5).is_parse_error());
        assert!(!OrthoError::DegenerateBounds.is_parse_error());
    }
}
