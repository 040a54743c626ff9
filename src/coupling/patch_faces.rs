//! Face polygons of a patch, either local or gathered from every process.
//!
//! Overlap computations need to see the whole counterpart patch, so its faces
//! are gathered to every process in global order.

use crate::algs::communicator::{CommTag, CommTags, Communicator};
use crate::algs::exchange::all_gather;
use crate::algs::wire::{WireCount, WirePoint};
use crate::coupling::sample_finder::GlobalIndex;
use crate::geometry::polygon::{BoundBox, face_centre_and_area};
use crate::geometry::surface::ProjectionSurface;
use crate::geometry::vector::{Vec3, norm, sub};
use crate::mesh::poly_mesh::PolyMesh;
use crate::mesh_error::MeshCouplingError;

const COUNT_TAGS: CommTags = CommTags::from_base(CommTag::new(0xA300));
const POINT_TAGS: CommTags = CommTags::from_base(CommTag::new(0xA310));

/// Polygons of a set of patch faces with their centres and area vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchFaces {
    polygons: Vec<Vec<Vec3>>,
    centres: Vec<Vec3>,
    areas: Vec<Vec3>,
}

impl PatchFaces {
    /// Build from polygons, recomputing centres and area vectors.
    pub fn from_polygons(polygons: Vec<Vec<Vec3>>) -> Result<Self, MeshCouplingError> {
        let mut centres = Vec::with_capacity(polygons.len());
        let mut areas = Vec::with_capacity(polygons.len());
        for poly in &polygons {
            let (c, a) = face_centre_and_area(poly)?;
            centres.push(c);
            areas.push(a);
        }
        Ok(Self {
            polygons,
            centres,
            areas,
        })
    }

    /// Faces of patch `patch` held by this process.
    pub fn local(mesh: &PolyMesh, patch: usize) -> Result<Self, MeshCouplingError> {
        Self::from_polygons(mesh.patch(patch).range().map(|f| mesh.face_points(f)).collect())
    }

    /// Collective: faces of patch `patch` from every process, in global order.
    pub fn gather<C: Communicator>(
        comm: &C,
        mesh: &PolyMesh,
        patch: usize,
    ) -> Result<(Self, GlobalIndex), MeshCouplingError> {
        let range = mesh.patch(patch).range();
        let counts: Vec<WireCount> = range
            .clone()
            .map(|f| WireCount::new(mesh.faces()[f].len()))
            .collect();
        let points: Vec<WirePoint> = range
            .flat_map(|f| mesh.faces()[f].iter().map(|&v| WirePoint::of(mesh.points()[v])))
            .collect();
        let all_counts = all_gather(comm, COUNT_TAGS, &counts)?;
        let all_points = all_gather(comm, POINT_TAGS, &points)?;

        let index = GlobalIndex::from_sizes(all_counts.iter().map(Vec::len));
        let mut polygons = Vec::with_capacity(index.size());
        for (proc, (counts, points)) in all_counts.iter().zip(&all_points).enumerate() {
            let expected: usize = counts.iter().map(WireCount::get).sum();
            if expected != points.len() {
                return Err(MeshCouplingError::BufferSizeMismatch {
                    neighbor: proc,
                    expected,
                    got: points.len(),
                });
            }
            let mut at = 0;
            for c in counts {
                let n = c.get();
                polygons.push(points[at..at + n].iter().map(WirePoint::get).collect());
                at += n;
            }
        }
        Ok((Self::from_polygons(polygons)?, index))
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygon(&self, face: usize) -> &[Vec3] {
        &self.polygons[face]
    }

    pub fn centres(&self) -> &[Vec3] {
        &self.centres
    }

    /// Area vectors, following each polygon's vertex order.
    pub fn areas(&self) -> &[Vec3] {
        &self.areas
    }

    pub fn area_mags(&self) -> Vec<f64> {
        self.areas.iter().map(|a| norm(*a)).collect()
    }

    /// Bounding box of each face, grown by half its characteristic length.
    pub fn search_boxes(&self) -> Vec<BoundBox> {
        self.polygons
            .iter()
            .zip(&self.areas)
            .map(|(poly, a)| BoundBox::from_points(poly).inflated(0.5 * norm(*a).sqrt()))
            .collect()
    }

    /// Same faces with every vertex moved by `f`.
    pub fn map_points(&self, f: impl Fn(Vec3) -> Vec3) -> Result<Self, MeshCouplingError> {
        Self::from_polygons(
            self.polygons
                .iter()
                .map(|poly| poly.iter().map(|&p| f(p)).collect())
                .collect(),
        )
    }

    /// Same faces translated by `-shift`.
    pub fn shifted_back(&self, shift: Vec3) -> Result<Self, MeshCouplingError> {
        self.map_points(|p| sub(p, shift))
    }

    /// Same faces with vertex order (and so normals) reversed.
    pub fn reversed(&self) -> Result<Self, MeshCouplingError> {
        Self::from_polygons(
            self.polygons
                .iter()
                .map(|poly| poly.iter().rev().copied().collect())
                .collect(),
        )
    }

    /// Same faces projected onto `surface`.
    pub fn projected(&self, surface: &ProjectionSurface) -> Result<Self, MeshCouplingError> {
        self.map_points(|p| surface.project(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::mesh::block::BlockMesh;

    #[test]
    fn serial_gather_matches_local() {
        let mesh = BlockMesh::new("b", [0.0; 3], [1.0; 3], [2, 2, 1]).build().unwrap();
        let p = mesh.find_patch("zMax").unwrap();
        let local = PatchFaces::local(&mesh, p).unwrap();
        let (gathered, index) = PatchFaces::gather(&NoComm, &mesh, p).unwrap();
        assert_eq!(local, gathered);
        assert_eq!(index.size(), 4);
    }

    #[test]
    fn reversal_flips_normals() {
        let mesh = BlockMesh::new("b", [0.0; 3], [1.0; 3], [1, 1, 1]).build().unwrap();
        let faces = PatchFaces::local(&mesh, mesh.find_patch("zMax").unwrap()).unwrap();
        let rev = faces.reversed().unwrap();
        assert!((faces.areas()[0][2] - 1.0).abs() < 1e-12);
        assert!((rev.areas()[0][2] + 1.0).abs() < 1e-12);
    }
}
