#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-coupling
//!
//! mesh-coupling couples a boundary patch of one mesh region to the cells or
//! faces of another region (or of the same region), across process
//! boundaries, and moves per-face field data over that coupling in both
//! directions.
//!
//! ## Features
//! - Five sample modes: nearest cell, nearest patch face, area-weighted
//!   interpolation (AMI), direct patch-to-patch intersection and nearest
//!   boundary face of any patch
//! - Global nearest-element search with deterministic tie-breaking
//! - Reusable distribution maps with forward and reverse data movement
//! - Lazily built, atomically dropped derived state per coupled patch
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - serde-driven configuration records that round-trip through `write`
//!
//! ## Usage
//! Add `mesh-coupling` as a dependency in your `Cargo.toml` and enable
//! features as needed:
//!
//! ```toml
//! [dependencies]
//! mesh-coupling = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! ## Collective discipline
//! Building a coupling and distributing data are collective operations: every
//! process holding a piece of either region must make the same calls in the
//! same order. A process that does not participate stalls the others.
//!
//! ## Mesh changes
//! The engine does no dirty-tracking. After changing the geometry or topology
//! of either side, call [`MappedPatch::clear_out`](coupling::MappedPatch::clear_out)
//! on every affected patch; the next access rebuilds from scratch.

pub mod algs;
pub mod coupling;
pub mod geometry;
pub mod mesh;
pub mod mesh_error;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, RayonComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::coupling::ami::AmiInterpolator;
    pub use crate::coupling::config::{Offset, OffsetMode, SampleConfig, SampleDict, SampleMode};
    pub use crate::coupling::delta::{AddDelta, CopyDelta, Delta};
    pub use crate::coupling::distribution_map::DistributionMap;
    pub use crate::coupling::field::FieldValue;
    pub use crate::coupling::mapped_patch::MappedPatch;
    pub use crate::coupling::patch_to_patch::PatchToPatch;
    pub use crate::coupling::target::ResolvedTarget;
    pub use crate::geometry::surface::ProjectionSurface;
    pub use crate::geometry::vector::Vec3;
    pub use crate::mesh::{BlockMesh, Patch, PolyMesh, RegionRegistry, Side};
    pub use crate::mesh_error::MeshCouplingError;
}
