//! Named regions known to one process.
//!
//! Coupled patches never hold references to each other or to the mesh on the
//! other side; every cross-region relation goes through a lookup here.

use crate::mesh::poly_mesh::{Patch, PolyMesh};
use crate::mesh_error::MeshCouplingError;

/// The regions (or region pieces) held by this process, by name.
#[derive(Clone, Debug, Default)]
pub struct RegionRegistry {
    regions: Vec<PolyMesh>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a region; names must be unique.
    pub fn insert(&mut self, mesh: PolyMesh) -> Result<(), MeshCouplingError> {
        if self.contains(mesh.name()) {
            return Err(MeshCouplingError::InvalidMesh(format!(
                "region `{}` is already registered",
                mesh.name()
            )));
        }
        self.regions.push(mesh);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, mesh: PolyMesh) -> Result<Self, MeshCouplingError> {
        self.insert(mesh)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.regions.iter().any(|m| m.name() == name)
    }

    pub fn get(&self, name: &str) -> Result<&PolyMesh, MeshCouplingError> {
        self.regions
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| MeshCouplingError::UnknownRegion(name.to_owned()))
    }

    /// Mutable access, for mesh changes; the caller must `clear_out` every
    /// coupled patch that samples the region afterwards.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut PolyMesh, MeshCouplingError> {
        self.regions
            .iter_mut()
            .find(|m| m.name() == name)
            .ok_or_else(|| MeshCouplingError::UnknownRegion(name.to_owned()))
    }

    /// Region and index of a named patch.
    pub fn get_patch(
        &self,
        region: &str,
        patch: &str,
    ) -> Result<(&PolyMesh, usize), MeshCouplingError> {
        let mesh = self.get(region)?;
        let index = mesh
            .find_patch(patch)
            .ok_or_else(|| MeshCouplingError::UnknownPatch {
                patch: patch.to_owned(),
                region: region.to_owned(),
            })?;
        Ok((mesh, index))
    }

    pub fn regions(&self) -> impl Iterator<Item = &PolyMesh> {
        self.regions.iter()
    }

    /// Every `(region, patch)` declaring membership of `group`, in
    /// registration then patch order.
    pub fn patches_in_group<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = (&'a PolyMesh, &'a Patch)> + 'a {
        self.regions.iter().flat_map(move |mesh| {
            mesh.patches()
                .iter()
                .filter(move |p| p.in_group(group))
                .map(move |p| (mesh, p))
        })
    }
}
