//! MeshCouplingError: Unified error type for mesh-coupling public APIs
//!
//! Every fallible operation in the crate reports through this enum. Errors
//! raised while resolving or using a coupled patch carry the local patch name
//! and its owning region so the offending boundary can be located.

use thiserror::Error;

/// Unified error type for mesh-coupling operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshCouplingError {
    /// The coupling configuration of a patch is unusable.
    #[error("Configuration error for patch `{patch}` in region `{region}`: {reason}")]
    Config {
        patch: String,
        region: String,
        reason: String,
    },
    /// A region name did not resolve in the registry.
    #[error("Unknown region `{0}`")]
    UnknownRegion(String),
    /// A patch name did not resolve on the given region.
    #[error("Unknown patch `{patch}` in region `{region}`")]
    UnknownPatch { patch: String, region: String },
    /// The sampled target holds no elements on any process.
    #[error(
        "No {target} to sample for patch `{patch}` in region `{region}`: the target is empty on every process"
    )]
    EmptySampleTarget {
        patch: String,
        region: String,
        target: String,
    },
    /// Mesh arrays are inconsistent.
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
    /// Degenerate or unsupported geometry.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    /// A field handed to a distribution call has the wrong length.
    #[error("Field size mismatch: expected {expected} values, got {got}")]
    FieldSizeMismatch { expected: usize, got: usize },
    /// Transport failure while talking to a neighbor.
    #[error("Communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// A message arrived with an unexpected byte length.
    #[error("Buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
}

impl MeshCouplingError {
    /// Shorthand for a [`MeshCouplingError::Config`] error.
    pub fn config(patch: &str, region: &str, reason: impl Into<String>) -> Self {
        MeshCouplingError::Config {
            patch: patch.to_owned(),
            region: region.to_owned(),
            reason: reason.into(),
        }
    }
}
