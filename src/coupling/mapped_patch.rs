//! `MappedPatch`: a boundary patch coupled to a target region.
//!
//! A mapped patch owns its configuration and its communicator. Everything it
//! derives from the meshes (the resolved target, the sample search, the
//! distribution map and, by mode, the AMI interpolator or the intersection
//! engine) is built lazily on first use and kept until [`clear_out`] drops it.
//! The meshes themselves are never stored: every call takes the
//! [`RegionRegistry`] and looks regions and patches up by name.
//!
//! All operations that build derived state, and both distribution
//! directions, are collective over the communicator.
//!
//! [`clear_out`]: MappedPatch::clear_out

use crate::algs::communicator::{CommTag, CommTags, Communicator};
use crate::algs::exchange::all_reduce_and;
use crate::coupling::ami::{AmiInterpolator, AmiOptions, calc_ami};
use crate::coupling::config::{Offset, OffsetMode, SampleConfig, SampleDict, SampleMode};
use crate::coupling::delta::{CopyDelta, Delta};
use crate::coupling::distribution_map::DistributionMap;
use crate::coupling::field::FieldValue;
use crate::coupling::patch_to_patch::{PatchToPatch, calc_patch_to_patch};
use crate::coupling::sample_finder::{SampleSet, SampleTarget, find_samples};
use crate::coupling::target::{ResolvedTarget, resolve_target};
use crate::geometry::surface::ProjectionSurface;
use crate::geometry::vector::{Vec3, add, normalized, scale};
use crate::mesh::poly_mesh::PolyMesh;
use crate::mesh::registry::RegionRegistry;
use crate::mesh_error::MeshCouplingError;
use bytemuck::Pod;
use log::{debug, warn};

const REVERSE_TAGS: CommTags = CommTags::from_base(CommTag::new(0xA400));

/// Everything derived from the meshes, present as a whole or not at all.
#[derive(Clone, Debug)]
struct DerivedState {
    samples: SampleSet,
    sample_indices: Vec<usize>,
    map: DistributionMap,
    ami: Option<AmiInterpolator>,
    patch_to_patch: Option<PatchToPatch>,
    surface: Option<ProjectionSurface>,
    /// Reverse distribution has defined semantics for this target.
    reverse_permitted: bool,
}

/// A patch coupled to the cells or faces of a target region.
#[derive(Debug)]
pub struct MappedPatch<C: Communicator> {
    region: String,
    patch: String,
    config: SampleConfig,
    comm: C,
    resolved: Option<ResolvedTarget>,
    derived: Option<DerivedState>,
}

impl<C: Communicator> MappedPatch<C> {
    /// Couple patch `patch` of region `region` as described by `config`.
    pub fn new(
        region: impl Into<String>,
        patch: impl Into<String>,
        config: SampleConfig,
        comm: C,
    ) -> Result<Self, MeshCouplingError> {
        let region = region.into();
        let patch = patch.into();
        config.validate(&region, &patch)?;
        Ok(Self {
            region,
            patch,
            config,
            comm,
            resolved: None,
            derived: None,
        })
    }

    /// Couple from a settings record.
    pub fn from_dict(
        region: impl Into<String>,
        patch: impl Into<String>,
        dict: &SampleDict,
        comm: C,
    ) -> Result<Self, MeshCouplingError> {
        let region = region.into();
        let patch = patch.into();
        let config = SampleConfig::from_dict(&region, &patch, dict)?;
        Self::new(region, patch, config, comm)
    }

    /// Couple to an explicitly named target without offset.
    pub fn with_target(
        region: impl Into<String>,
        patch: impl Into<String>,
        mode: SampleMode,
        sample_region: impl Into<String>,
        sample_patch: impl Into<String>,
        comm: C,
    ) -> Result<Self, MeshCouplingError> {
        let config = SampleConfig::new(mode).with_target(sample_region, sample_patch);
        Self::new(region, patch, config, comm)
    }

    /// Same configuration bound to another local patch; nothing derived is
    /// carried over.
    pub fn for_patch(
        &self,
        region: impl Into<String>,
        patch: impl Into<String>,
    ) -> Result<Self, MeshCouplingError>
    where
        C: Clone,
    {
        Self::new(region, patch, self.config.clone(), self.comm.clone())
    }

    /// Region owning this patch.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Name of this patch.
    pub fn patch(&self) -> &str {
        &self.patch
    }

    pub fn config(&self) -> &SampleConfig {
        &self.config
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn mode(&self) -> SampleMode {
        self.config.mode()
    }

    fn err(&self, reason: impl Into<String>) -> MeshCouplingError {
        MeshCouplingError::config(&self.patch, &self.region, reason)
    }

    /// Resolve (once) the target region and patch.
    pub fn target(&mut self, regions: &RegionRegistry) -> Result<&ResolvedTarget, MeshCouplingError> {
        let resolved = match self.resolved.take() {
            Some(r) => r,
            None => resolve_target(regions, &self.region, &self.patch, &self.config)?,
        };
        Ok(self.resolved.insert(resolved))
    }

    pub fn sample_region(&mut self, regions: &RegionRegistry) -> Result<&str, MeshCouplingError> {
        Ok(&self.target(regions)?.region)
    }

    /// Target patch name; fails when the mode has none and none was given.
    pub fn sample_patch(&mut self, regions: &RegionRegistry) -> Result<&str, MeshCouplingError> {
        self.target(regions)?;
        match &self.resolved {
            Some(t) if !t.patch.is_empty() => Ok(&t.patch),
            _ => Err(self.err(format!(
                "sampleMode `{}` has no samplePatch",
                self.config.mode()
            ))),
        }
    }

    pub fn same_region(&mut self, regions: &RegionRegistry) -> Result<bool, MeshCouplingError> {
        Ok(self.target(regions)?.is_same_region)
    }

    /// This process's piece of the target region.
    pub fn sample_mesh<'r>(
        &mut self,
        regions: &'r RegionRegistry,
    ) -> Result<&'r PolyMesh, MeshCouplingError> {
        let region = self.sample_region(regions)?.to_owned();
        regions.get(&region)
    }

    /// Target mesh and the index of the target patch in it.
    pub fn sample_poly_patch<'r>(
        &mut self,
        regions: &'r RegionRegistry,
    ) -> Result<(&'r PolyMesh, usize), MeshCouplingError> {
        let region = self.sample_region(regions)?.to_owned();
        let patch = self.sample_patch(regions)?.to_owned();
        regions.get_patch(&region, &patch)
    }

    /// The local mesh and local patch.
    pub fn local_patch<'r>(
        &self,
        regions: &'r RegionRegistry,
    ) -> Result<(&'r PolyMesh, usize), MeshCouplingError> {
        regions.get_patch(&self.region, &self.patch)
    }

    /// Face centres of the local patch displaced by the offset.
    pub fn sample_points(&self, regions: &RegionRegistry) -> Result<Vec<Vec3>, MeshCouplingError> {
        let (mesh, p) = self.local_patch(regions)?;
        let range = mesh.patch(p).range();
        let centres = &mesh.face_centres()[range.clone()];
        match self.config.offset() {
            OffsetMode::None => Ok(centres.to_vec()),
            OffsetMode::Normal(distance) => range
                .zip(centres)
                .map(|(f, &c)| -> Result<Vec3, MeshCouplingError> {
                    let n = normalized(mesh.face_areas()[f]).ok_or_else(|| {
                        MeshCouplingError::InvalidGeometry(format!(
                            "face {f} of patch `{}` in region `{}` has no normal",
                            self.patch, self.region
                        ))
                    })?;
                    Ok(add(c, scale(n, *distance)))
                })
                .collect(),
            OffsetMode::Direction(Offset::Uniform(v)) => {
                Ok(centres.iter().map(|&c| add(c, *v)).collect())
            }
            OffsetMode::Direction(Offset::PerFace(list)) => {
                if list.len() != centres.len() {
                    return Err(self.err(format!(
                        "per-face offset list has {} entries for {} faces",
                        list.len(),
                        centres.len()
                    )));
                }
                Ok(centres.iter().zip(list).map(|(&c, &v)| add(c, v)).collect())
            }
        }
    }

    /// Local size of the sampled storage: cells, boundary faces or target
    /// patch faces, by mode.
    pub fn sample_size(&mut self, regions: &RegionRegistry) -> Result<usize, MeshCouplingError> {
        Ok(match self.mode() {
            SampleMode::NearestCell => self.sample_mesh(regions)?.n_cells(),
            SampleMode::NearestFace => self.sample_mesh(regions)?.n_boundary_faces(),
            _ => {
                let (mesh, p) = self.sample_poly_patch(regions)?;
                mesh.patch(p).size()
            }
        })
    }

    /// Whether the target patch is itself coupling-aware.
    pub fn sample_is_mapped_patch(&mut self, regions: &RegionRegistry) -> Result<bool, MeshCouplingError> {
        Ok(self.sample_mapped_patch(regions)?.is_some())
    }

    /// Coupling configuration of the target patch, if it has one.
    pub fn sample_mapped_patch<'r>(
        &mut self,
        regions: &'r RegionRegistry,
    ) -> Result<Option<&'r SampleConfig>, MeshCouplingError> {
        if !self.mode().samples_patch() {
            return Ok(None);
        }
        let (mesh, p) = self.sample_poly_patch(regions)?;
        Ok(mesh.patch(p).coupling())
    }

    /// Build (once) everything derived from the meshes.
    fn state(
        &mut self,
        regions: &RegionRegistry,
    ) -> Result<(&C, &mut DerivedState), MeshCouplingError> {
        let state = match self.derived.take() {
            Some(s) => s,
            None => {
                let target = self.target(regions)?.clone();
                self.build(regions, &target)?
            }
        };
        let state = self.derived.insert(state);
        if let Some(p2p) = &mut state.patch_to_patch {
            if !p2p.is_valid() {
                let target = self.resolved.clone().ok_or_else(|| {
                    MeshCouplingError::config(&self.patch, &self.region, "target is not resolved")
                })?;
                let (src, sp) = regions.get_patch(&self.region, &self.patch)?;
                let (tgt, tp) = regions.get_patch(&target.region, &target.patch)?;
                *p2p = calc_patch_to_patch(&self.comm, src, sp, tgt, tp)?;
            }
        }
        Ok((&self.comm, state))
    }

    fn build(
        &self,
        regions: &RegionRegistry,
        target: &ResolvedTarget,
    ) -> Result<DerivedState, MeshCouplingError> {
        let mode = self.mode();
        let (local_mesh, local_patch) = self.local_patch(regions)?;
        let target_mesh = regions.get(&target.region)?;
        let target_patch = if mode.samples_patch() {
            Some(regions.get_patch(&target.region, &target.patch)?.1)
        } else {
            None
        };

        let points = self.sample_points(regions)?;
        let search_target = match (mode, target_patch) {
            (SampleMode::NearestCell, _) => SampleTarget::Cells(target_mesh),
            (SampleMode::NearestFace, _) => SampleTarget::BoundaryFaces(target_mesh),
            (_, Some(p)) => SampleTarget::PatchFaces(target_mesh, p),
            (_, None) => return Err(self.err("target patch is not resolved")),
        };
        let samples = find_samples(&self.comm, &points, search_target, &self.patch, &self.region)?;
        let map = DistributionMap::calc_mapping(
            &self.comm,
            &samples.owners(),
            search_target.local_size(),
        )?;

        let reverse_permitted = if mode == SampleMode::NearestFace {
            let all_coupled = samples.samples.iter().all(|s| s.coupled);
            all_reduce_and(&self.comm, REVERSE_TAGS, all_coupled)?
        } else {
            true
        };

        let mut ami = None;
        let mut patch_to_patch = None;
        let surface = self.config.surface().cloned();
        match (mode, target_patch) {
            (SampleMode::NearestPatchFaceAMI, Some(tp)) => {
                self.check_ami_counterpart(regions, target)?;
                let shift = match self.config.offset() {
                    OffsetMode::None => None,
                    OffsetMode::Direction(Offset::Uniform(v)) => Some(*v),
                    other => {
                        warn!(
                            "patch `{}` of region `{}`: offsetMode `{}` is ignored by area-weighted interpolation",
                            self.patch,
                            self.region,
                            other.name()
                        );
                        None
                    }
                };
                let options = AmiOptions {
                    surface: surface.clone(),
                    reverse: self.config.ami_reverse(),
                    shift,
                };
                ami = Some(calc_ami(
                    &self.comm,
                    local_mesh,
                    local_patch,
                    target_mesh,
                    tp,
                    &options,
                )?);
            }
            (SampleMode::PatchToPatch, Some(tp)) => {
                patch_to_patch = Some(calc_patch_to_patch(
                    &self.comm,
                    local_mesh,
                    local_patch,
                    target_mesh,
                    tp,
                )?);
            }
            _ => {}
        }

        debug!(
            "patch `{}` of region `{}`: built {} coupling to region `{}` ({} samples)",
            self.patch,
            self.region,
            mode,
            target.region,
            samples.len()
        );
        Ok(DerivedState {
            sample_indices: samples.indices(),
            samples,
            map,
            ami,
            patch_to_patch,
            surface,
            reverse_permitted,
        })
    }

    /// A coupling-aware AMI counterpart must be AMI too and point back here.
    fn check_ami_counterpart(
        &self,
        regions: &RegionRegistry,
        target: &ResolvedTarget,
    ) -> Result<(), MeshCouplingError> {
        let (mesh, p) = regions.get_patch(&target.region, &target.patch)?;
        let Some(other) = mesh.patch(p).coupling() else {
            return Ok(());
        };
        if other.mode() != SampleMode::NearestPatchFaceAMI {
            return Err(self.err(format!(
                "target patch `{}` of region `{}` is coupled with sampleMode `{}`, not `nearestPatchFaceAMI`",
                target.patch,
                target.region,
                other.mode()
            )));
        }
        let back = resolve_target(regions, &target.region, &target.patch, other)?;
        if back.region != self.region || back.patch != self.patch {
            return Err(self.err(format!(
                "target patch `{}` of region `{}` samples patch `{}` of region `{}` instead of this patch",
                target.patch, target.region, back.patch, back.region
            )));
        }
        Ok(())
    }

    /// Distribution map of the sample search.
    pub fn map(&mut self, regions: &RegionRegistry) -> Result<&DistributionMap, MeshCouplingError> {
        Ok(&self.state(regions)?.1.map)
    }

    /// Storage index of every value a push delivers here.
    pub fn map_indices(&mut self, regions: &RegionRegistry) -> Result<&[usize], MeshCouplingError> {
        Ok(self.state(regions)?.1.map.map_indices())
    }

    /// Per local face, the matched storage index on the owning process.
    pub fn sample_indices(&mut self, regions: &RegionRegistry) -> Result<&[usize], MeshCouplingError> {
        Ok(&self.state(regions)?.1.sample_indices)
    }

    /// Full search result.
    pub fn samples(&mut self, regions: &RegionRegistry) -> Result<&SampleSet, MeshCouplingError> {
        Ok(&self.state(regions)?.1.samples)
    }

    /// Area-weighted interpolator; only in `nearestPatchFaceAMI` mode.
    pub fn ami(&mut self, regions: &RegionRegistry) -> Result<&AmiInterpolator, MeshCouplingError> {
        if self.mode() != SampleMode::NearestPatchFaceAMI {
            return Err(self.err(format!(
                "no area-weighted interpolator in sampleMode `{}`",
                self.mode()
            )));
        }
        let (patch, region) = (self.patch.clone(), self.region.clone());
        self.state(regions)?
            .1
            .ami
            .as_ref()
            .ok_or_else(|| MeshCouplingError::config(&patch, &region, "interpolator missing"))
    }

    /// Intersection engine; only in `patchToPatch` mode.
    pub fn patch_to_patch(&mut self, regions: &RegionRegistry) -> Result<&PatchToPatch, MeshCouplingError> {
        if self.mode() != SampleMode::PatchToPatch {
            return Err(self.err(format!(
                "no patch-to-patch intersection in sampleMode `{}`",
                self.mode()
            )));
        }
        let (patch, region) = (self.patch.clone(), self.region.clone());
        self.state(regions)?
            .1
            .patch_to_patch
            .as_ref()
            .ok_or_else(|| MeshCouplingError::config(&patch, &region, "intersection missing"))
    }

    /// Projection surface used by the interpolator, once built.
    pub fn surface(&self) -> Option<&ProjectionSurface> {
        self.derived.as_ref().and_then(|s| s.surface.as_ref())
    }

    /// Whether derived state is currently held.
    pub fn is_built(&self) -> bool {
        self.derived.is_some()
    }

    /// Mark the intersection engine stale without touching anything else.
    pub fn invalidate_patch_to_patch(&mut self) {
        if let Some(p2p) = self.derived.as_mut().and_then(|s| s.patch_to_patch.as_mut()) {
            p2p.invalidate();
        }
    }

    /// Collective: move a field over the local patch faces to the target
    /// storage.
    ///
    /// Direct modes relocate values (unmatched target storage is zero, the
    /// last of several samples hitting one element wins); weighted modes
    /// accumulate target weight × value.
    pub fn distribute<T: FieldValue>(
        &mut self,
        regions: &RegionRegistry,
        values: &[T],
    ) -> Result<Vec<T>, MeshCouplingError> {
        let (comm, state) = self.state(regions)?;
        if let Some(ami) = &state.ami {
            return ami.coupling().distribute(comm, values);
        }
        if let Some(p2p) = &state.patch_to_patch {
            return p2p.coupling().distribute(comm, values);
        }
        state.map.distribute_with::<T, CopyDelta, C>(comm, values)
    }

    /// Collective: direct forward distribution with an explicit fuse rule.
    pub fn distribute_with<T, D>(
        &mut self,
        regions: &RegionRegistry,
        values: &[T],
    ) -> Result<Vec<T>, MeshCouplingError>
    where
        T: Pod,
        D: Delta<T>,
        D::Part: Pod,
    {
        if matches!(
            self.mode(),
            SampleMode::NearestPatchFaceAMI | SampleMode::PatchToPatch
        ) {
            return Err(self.err(format!(
                "sampleMode `{}` distributes by weights, not by a fuse rule",
                self.mode()
            )));
        }
        let (comm, state) = self.state(regions)?;
        state.map.distribute_with::<T, D, C>(comm, values)
    }

    /// Collective: move a field over the target storage back to the local
    /// patch faces.
    pub fn reverse_distribute<T: FieldValue>(
        &mut self,
        regions: &RegionRegistry,
        values: &[T],
    ) -> Result<Vec<T>, MeshCouplingError> {
        let (patch, region) = (self.patch.clone(), self.region.clone());
        let (comm, state) = self.state(regions)?;
        if !state.reverse_permitted {
            return Err(MeshCouplingError::config(
                &patch,
                &region,
                "reverse distribution in sampleMode `nearestFace` needs every matched face to lie on a coupled patch",
            ));
        }
        if let Some(ami) = &state.ami {
            return ami.coupling().reverse_distribute(comm, values);
        }
        if let Some(p2p) = &state.patch_to_patch {
            return p2p.coupling().reverse_distribute(comm, values);
        }
        state.map.reverse_distribute(comm, values)
    }

    /// Drop the resolved target and all derived state. Call after any change
    /// to the geometry or topology of either side.
    pub fn clear_out(&mut self) {
        self.resolved = None;
        self.derived = None;
    }

    /// Settings record reproducing this coupling.
    pub fn write(&self) -> SampleDict {
        self.config.to_dict()
    }
}

/// Mapped patch for a patch that carries its own coupling configuration.
pub fn mapped_patch_for<C: Communicator>(
    regions: &RegionRegistry,
    region: &str,
    patch: &str,
    comm: C,
) -> Result<MappedPatch<C>, MeshCouplingError> {
    let (mesh, p) = regions.get_patch(region, patch)?;
    let config = mesh
        .patch(p)
        .coupling()
        .cloned()
        .ok_or_else(|| MeshCouplingError::config(patch, region, "patch is not coupled"))?;
    MappedPatch::new(region, patch, config, comm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::mesh::block::{BlockMesh, Side};

    fn two_blocks() -> RegionRegistry {
        RegionRegistry::new()
            .with(BlockMesh::new("lower", [0.0; 3], [1.0; 3], [2, 2, 2]).build().unwrap())
            .unwrap()
            .with(
                BlockMesh::new("upper", [0.0, 0.0, 1.0], [1.0; 3], [2, 2, 2])
                    .build()
                    .unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn caches_are_built_lazily_and_dropped() {
        let regions = two_blocks();
        let mut mp = MappedPatch::with_target(
            "lower",
            "zMax",
            SampleMode::NearestPatchFace,
            "upper",
            "zMin",
            NoComm,
        )
        .unwrap();
        assert!(!mp.is_built());
        assert_eq!(mp.sample_indices(&regions).unwrap().len(), 4);
        assert!(mp.is_built());
        mp.clear_out();
        assert!(!mp.is_built());
    }

    #[test]
    fn wrong_mode_accessors_fail() {
        let regions = two_blocks();
        let mut mp =
            MappedPatch::with_target("lower", "zMax", SampleMode::NearestCell, "upper", "", NoComm)
                .unwrap();
        assert!(mp.ami(&regions).is_err());
        assert!(mp.patch_to_patch(&regions).is_err());
        assert!(mp.sample_patch(&regions).is_err());
        assert!(!mp.sample_is_mapped_patch(&regions).unwrap());
    }

    #[test]
    fn mapped_patch_from_mesh_coupling() {
        let cfg = SampleConfig::new(SampleMode::NearestPatchFace).with_target("upper", "zMin");
        let regions = RegionRegistry::new()
            .with(
                BlockMesh::new("lower", [0.0; 3], [1.0; 3], [1, 1, 1])
                    .with_coupling(Side::ZMax, cfg.clone())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let mp = mapped_patch_for(&regions, "lower", "zMax", NoComm).unwrap();
        assert_eq!(mp.config(), &cfg);
        assert!(mapped_patch_for(&regions, "lower", "zMin", NoComm).is_err());
    }
}
