//! Error types for the checked accumulator surface.
//!
//! The backward pass itself is infallible; these errors only come out of the
//! `try_*`/`merge`/`stack` helpers on [`JacobianMap`](crate::JacobianMap) and
//! out of collaborator-side checks.

use thiserror::Error;

use crate::jacobian_map::Key;

/// Errors reported by the checked accumulator operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdError {
    /// A contribution's shape disagrees with the block already accumulated
    /// under the same key.
    #[error("shape mismatch for key {key}: accumulated {expected:?}, contribution {actual:?}")]
    ShapeMismatch {
        key: Key,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A requested key never received a contribution.
    #[error("no contribution recorded for key {0}")]
    MissingVariable(Key),

    /// The number of per-component derivative blocks differs from the
    /// declared dimensionality of the function that produced them.
    #[error("expected {expected} per-component derivative blocks, got {actual}")]
    ComponentCount { expected: usize, actual: usize },
}

/// Check that a collaborator returned one derivative block per declared
/// component.
///
/// A violation aborts that function's contribution; it is never retried.
pub fn check_component_count(expected: usize, actual: usize) -> Result<(), AdError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AdError::ComponentCount { expected, actual })
    }
}
