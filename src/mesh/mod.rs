//! Face-addressed polyhedral meshes, a structured block generator and the
//! per-process region registry.

pub mod block;
pub mod poly_mesh;
pub mod registry;

pub use block::{BlockMesh, Side};
pub use poly_mesh::{Patch, PolyMesh};
pub use registry::RegionRegistry;
