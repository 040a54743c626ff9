//! Geometry utilities for mesh-coupling.
//!
//! Vector algebra, face polygons, projection surfaces and spatial search.

pub mod polygon;
pub mod search;
pub mod surface;
pub mod vector;
