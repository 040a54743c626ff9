//! Area-weighted interpolation between two non-conforming patches.
//!
//! The target patch is gathered to every process and optionally moved into
//! the source frame: translated back by a uniform offset, vertex order
//! reversed, and both sides projected onto a projection surface. A source
//! and a target face couple when their normals oppose; their weight is the
//! area of the target polygon, projected onto the source face plane and
//! clipped by the source polygon.

use crate::algs::communicator::Communicator;
use crate::coupling::patch_faces::PatchFaces;
use crate::coupling::sample_finder::GlobalIndex;
use crate::coupling::weights::{OverlapRecord, WeightedCoupling};
use crate::geometry::polygon::{
    AREA_TOL, PlaneFrame, centroid_2d, clip_convex, ensure_ccw, signed_area_2d,
};
use crate::geometry::search::BoxSearch;
use crate::geometry::surface::ProjectionSurface;
use crate::geometry::vector::{Vec3, dot, norm};
use crate::mesh::poly_mesh::PolyMesh;
use crate::mesh_error::MeshCouplingError;
use log::debug;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Options for building an [`AmiInterpolator`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AmiOptions {
    pub surface: Option<ProjectionSurface>,
    /// Treat the target faces as reversed.
    pub reverse: bool,
    /// Uniform offset from source to target; the target is moved back by it.
    pub shift: Option<Vec3>,
}

/// Area-weighted interpolation weights between a local source patch and a
/// (distributed) target patch.
#[derive(Clone, Debug, PartialEq)]
pub struct AmiInterpolator {
    coupling: WeightedCoupling,
    reverse: bool,
}

impl AmiInterpolator {
    /// Weights and addressing on both sides.
    pub fn coupling(&self) -> &WeightedCoupling {
        &self.coupling
    }

    /// Whether the target faces were treated as reversed.
    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn src_weights_sum(&self) -> &[f64] {
        self.coupling.src_weights_sum()
    }

    pub fn tgt_weights_sum(&self) -> &[f64] {
        self.coupling.tgt_weights_sum()
    }
}

/// Overlap of polygon `target` with the source face `source`, measured in the
/// source face plane. `None` when below the area tolerance.
pub fn projected_overlap(
    source: &[Vec3],
    source_centre: Vec3,
    source_area: Vec3,
    target: &[Vec3],
) -> Result<Option<(f64, Vec3)>, MeshCouplingError> {
    let frame = PlaneFrame::new(source_centre, source_area)?;
    let mut clip: Vec<[f64; 2]> = source.iter().map(|&p| frame.to_2d(p)).collect();
    ensure_ccw(&mut clip);
    let mut subject: Vec<[f64; 2]> = target.iter().map(|&p| frame.to_2d(p)).collect();
    ensure_ccw(&mut subject);
    let overlap = clip_convex(&subject, &clip);
    let area = signed_area_2d(&overlap).abs();
    if area <= AREA_TOL * norm(source_area) {
        return Ok(None);
    }
    Ok(Some((area, frame.to_3d(centroid_2d(&overlap)))))
}

/// Overlaps of every source face with the target faces it may touch.
fn overlaps(source: &PatchFaces, target: &PatchFaces) -> Result<Vec<OverlapRecord>, MeshCouplingError> {
    let search = BoxSearch::new(&target.search_boxes());
    let source_boxes = source.search_boxes();
    let per_face = |s: usize| -> Result<Vec<OverlapRecord>, MeshCouplingError> {
        let mut found = Vec::new();
        for t in search.overlapping(&source_boxes[s]) {
            if dot(source.areas()[s], target.areas()[t]) >= 0.0 {
                continue;
            }
            if let Some((area, centroid)) = projected_overlap(
                source.polygon(s),
                source.centres()[s],
                source.areas()[s],
                target.polygon(t),
            )? {
                found.push(OverlapRecord {
                    source: s,
                    target: t,
                    area,
                    centroid,
                });
            }
        }
        Ok(found)
    };
    #[cfg(feature = "rayon")]
    let nested: Vec<Vec<OverlapRecord>> = (0..source.len())
        .into_par_iter()
        .map(per_face)
        .collect::<Result<_, _>>()?;
    #[cfg(not(feature = "rayon"))]
    let nested: Vec<Vec<OverlapRecord>> = (0..source.len())
        .map(per_face)
        .collect::<Result<_, _>>()?;
    Ok(nested.into_iter().flatten().collect())
}

/// Collective: area-weighted interpolation from patch `source_patch` of
/// `source_mesh` to patch `target_patch` of `target_mesh` (this process's
/// piece of each).
pub fn calc_ami<C: Communicator>(
    comm: &C,
    source_mesh: &PolyMesh,
    source_patch: usize,
    target_mesh: &PolyMesh,
    target_patch: usize,
    options: &AmiOptions,
) -> Result<AmiInterpolator, MeshCouplingError> {
    let mut source = PatchFaces::local(source_mesh, source_patch)?;
    let source_index = GlobalIndex::new(source.len(), comm)?;
    let (mut target, target_index) = PatchFaces::gather(comm, target_mesh, target_patch)?;

    if let Some(shift) = options.shift {
        target = target.shifted_back(shift)?;
    }
    if options.reverse {
        target = target.reversed()?;
    }
    if let Some(surface) = &options.surface {
        source = source.projected(surface)?;
        target = target.projected(surface)?;
    }

    let records = overlaps(&source, &target)?;
    debug!(
        "rank {}: {} AMI overlaps between {} source and {} target faces",
        comm.rank(),
        records.len(),
        source.len(),
        target.len()
    );
    let coupling = WeightedCoupling::new(
        comm,
        records,
        &source.area_mags(),
        &source_index,
        &target.area_mags(),
        &target_index,
    )?;
    Ok(AmiInterpolator {
        coupling,
        reverse: options.reverse,
    })
}
