//! Direct geometric intersection of two arbitrary patches.
//!
//! No projection surface is used. Each face pair is split into triangles
//! fanned about the face centres and every triangle pair is intersected in
//! the plane bisecting the two face normals. Pairs are only intersected when
//! the faces are close along that normal relative to their size, so that
//! patches on opposite sides of a thin region do not couple.

use crate::algs::communicator::Communicator;
use crate::coupling::patch_faces::PatchFaces;
use crate::coupling::sample_finder::GlobalIndex;
use crate::coupling::weights::{OverlapRecord, WeightedCoupling};
use crate::geometry::polygon::{
    AREA_TOL, PlaneFrame, centroid_2d, clip_convex, ensure_ccw, fan_triangles, signed_area_2d,
};
use crate::geometry::search::BoxSearch;
use crate::geometry::vector::{Vec3, add, dot, norm, normalized, scale, sub};
use crate::mesh::poly_mesh::PolyMesh;
use crate::mesh_error::MeshCouplingError;
use log::debug;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Largest accepted face separation, as a fraction of the smaller face's
/// characteristic length.
pub const MAX_SEPARATION: f64 = 0.5;

/// Intersection weights between a local source patch and a (distributed)
/// target patch.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchToPatch {
    coupling: WeightedCoupling,
    valid: bool,
}

impl PatchToPatch {
    /// Weights, addressing and intersection records.
    pub fn coupling(&self) -> &WeightedCoupling {
        &self.coupling
    }

    /// Per-overlap area and centroid.
    pub fn records(&self) -> &[OverlapRecord] {
        self.coupling.records()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark the intersection stale; it is recomputed on next use.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// Plane in which two faces with unit normals `ns`, `nt` are intersected.
fn bisector(ns: Vec3, nt: Vec3) -> Option<Vec3> {
    if dot(ns, nt) < 0.0 {
        normalized(sub(ns, nt))
    } else {
        normalized(add(ns, nt))
    }
}

/// Intersection area and centroid of two faces, or `None` when they do not
/// intersect (or are too far apart).
pub fn intersect_faces(
    source: &[Vec3],
    source_centre: Vec3,
    source_area: Vec3,
    target: &[Vec3],
    target_centre: Vec3,
    target_area: Vec3,
) -> Result<Option<(f64, Vec3)>, MeshCouplingError> {
    let (Some(ns), Some(nt)) = (normalized(source_area), normalized(target_area)) else {
        return Ok(None);
    };
    let Some(n) = bisector(ns, nt) else {
        return Ok(None);
    };
    let length = norm(source_area).sqrt().min(norm(target_area).sqrt());
    if dot(sub(target_centre, source_centre), n).abs() > MAX_SEPARATION * length {
        return Ok(None);
    }

    let frame = PlaneFrame::new(scale(add(source_centre, target_centre), 0.5), n)?;
    let flat = |tri: &[Vec3; 3]| {
        let mut t: Vec<[f64; 2]> = tri.iter().map(|&p| frame.to_2d(p)).collect();
        ensure_ccw(&mut t);
        t
    };
    let source_tris: Vec<Vec<[f64; 2]>> = fan_triangles(source, source_centre).iter().map(flat).collect();
    let target_tris: Vec<Vec<[f64; 2]>> = fan_triangles(target, target_centre).iter().map(flat).collect();

    let mut area = 0.0;
    let mut moment = [0.0; 2];
    for s in &source_tris {
        for t in &target_tris {
            let piece = clip_convex(t, s);
            let a = signed_area_2d(&piece).abs();
            if a > 0.0 {
                let c = centroid_2d(&piece);
                area += a;
                moment[0] += a * c[0];
                moment[1] += a * c[1];
            }
        }
    }
    if area <= AREA_TOL * norm(source_area) {
        return Ok(None);
    }
    Ok(Some((area, frame.to_3d([moment[0] / area, moment[1] / area]))))
}

fn intersections(source: &PatchFaces, target: &PatchFaces) -> Result<Vec<OverlapRecord>, MeshCouplingError> {
    let search = BoxSearch::new(&target.search_boxes());
    let source_boxes = source.search_boxes();
    let per_face = |s: usize| -> Result<Vec<OverlapRecord>, MeshCouplingError> {
        let mut found = Vec::new();
        for t in search.overlapping(&source_boxes[s]) {
            if let Some((area, centroid)) = intersect_faces(
                source.polygon(s),
                source.centres()[s],
                source.areas()[s],
                target.polygon(t),
                target.centres()[t],
                target.areas()[t],
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

/// Collective: intersection weights from patch `source_patch` of
/// `source_mesh` to patch `target_patch` of `target_mesh`.
pub fn calc_patch_to_patch<C: Communicator>(
    comm: &C,
    source_mesh: &PolyMesh,
    source_patch: usize,
    target_mesh: &PolyMesh,
    target_patch: usize,
) -> Result<PatchToPatch, MeshCouplingError> {
    let source = PatchFaces::local(source_mesh, source_patch)?;
    let source_index = GlobalIndex::new(source.len(), comm)?;
    let (target, target_index) = PatchFaces::gather(comm, target_mesh, target_patch)?;

    let records = intersections(&source, &target)?;
    debug!(
        "rank {}: {} patch-to-patch intersections between {} source and {} target faces",
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
    Ok(PatchToPatch {
        coupling,
        valid: true,
    })
}
