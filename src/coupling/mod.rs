//! Patch coupling: configuration, target resolution, global sample search,
//! distribution maps and the two non-conforming couplings.
//!
//! [`MappedPatch`](mapped_patch::MappedPatch) ties the pieces together and is
//! the type most callers need.

pub mod ami;
pub mod config;
pub mod delta;
pub mod distribution_map;
pub mod field;
pub mod mapped_patch;
pub mod patch_faces;
pub mod patch_to_patch;
pub mod sample_finder;
pub mod target;
pub mod weights;

pub use config::{Offset, OffsetMode, SampleConfig, SampleDict, SampleMode};
pub use mapped_patch::MappedPatch;
