//! Geometry error types.

use thiserror::Error;

/// Errors that can occur in the geometry core.
///
/// Hot per-vertex paths are deliberately not covered here: stale-cache reads
/// and out-of-range channel indices are caller contract violations, checked
/// by `debug_assert!` only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// A vertex format outside the supported enumerated set was requested.
    #[error("unsupported vertex format: {uv_count} uv / {color_count} color channels")]
    UnsupportedFormat {
        /// Requested UV channel count.
        uv_count: u8,
        /// Requested color channel count.
        color_count: u8,
    },

    /// `update_from` was called on arrays with different vertex counts.
    #[error("vertex count mismatch: destination has {destination} vertices, source has {source_count}")]
    VertexCountMismatch {
        /// Vertex count of the destination array.
        destination: usize,
        /// Vertex count of the source array. Not named `source`: thiserror
        /// reserves that name for the error-source chain.
        source_count: usize,
    },

    /// A mesh builder slot failed validation during `finish`.
    #[error("invalid mesh builder slot {slot}: {reason}")]
    InvalidSlot {
        /// Index of the offending slot.
        slot: usize,
        /// Human-readable reason.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GeometryError::UnsupportedFormat {
            uv_count: 12,
            color_count: 0,
        };
        assert_eq!(
            err.to_string(),
            "unsupported vertex format: 12 uv / 0 color channels"
        );

        let err = GeometryError::VertexCountMismatch {
            destination: 3,
            source_count: 5,
        };
        assert!(err.to_string().contains("destination has 3"));
        assert!(err.to_string().contains("source has 5"));
    }
}
