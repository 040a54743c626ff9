//! Face-addressed polyhedral mesh of one region (or one process's piece of it).
//!
//! Faces are stored internal-first: faces `0..n_internal_faces()` have an
//! owner and a neighbour cell, with the area vector pointing from owner to
//! neighbour; the remaining boundary faces have an owner only, point out of the
//! domain and are grouped into contiguous [`Patch`]es.

use crate::coupling::config::SampleConfig;
use crate::geometry::polygon::{BoundBox, face_centre_and_area};
use crate::geometry::vector::{VSMALL, Vec3, add, average, dot, norm, scale, sub};
use crate::mesh_error::MeshCouplingError;

/// Named contiguous range of boundary faces.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    name: String,
    start: usize,
    size: usize,
    in_groups: Vec<String>,
    coupling: Option<SampleConfig>,
    /// Faces on a decomposition cut, shared with another process.
    processor: bool,
}

impl Patch {
    /// Patch covering faces `start..start + size` of the owning mesh.
    pub fn new(name: impl Into<String>, start: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            in_groups: Vec::new(),
            coupling: None,
            processor: false,
        }
    }

    /// Mark the patch as a decomposition cut rather than part of the domain
    /// boundary.
    pub fn as_processor(mut self) -> Self {
        self.processor = true;
        self
    }

    /// Declare membership of a couple group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.in_groups.push(group.into());
        self
    }

    /// Make the patch coupling-aware.
    pub fn with_coupling(mut self, config: SampleConfig) -> Self {
        self.coupling = Some(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Mesh face indices of this patch.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.size
    }

    pub fn in_groups(&self) -> &[String] {
        &self.in_groups
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.in_groups.iter().any(|g| g == group)
    }

    /// Coupling configuration, if this patch is itself a coupled patch.
    pub fn coupling(&self) -> Option<&SampleConfig> {
        self.coupling.as_ref()
    }

    pub fn is_coupled(&self) -> bool {
        self.coupling.is_some()
    }

    pub fn is_processor(&self) -> bool {
        self.processor
    }

    pub(crate) fn coupling_mut(&mut self) -> &mut Option<SampleConfig> {
        &mut self.coupling
    }
}

/// Polyhedral mesh with derived face and cell geometry.
#[derive(Clone, Debug)]
pub struct PolyMesh {
    name: String,
    points: Vec<Vec3>,
    faces: Vec<Vec<usize>>,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    n_cells: usize,
    patches: Vec<Patch>,
    face_centres: Vec<Vec3>,
    face_areas: Vec<Vec3>,
    cell_centres: Vec<Vec3>,
    cell_faces: Vec<Vec<usize>>,
}

impl PolyMesh {
    /// Build and validate a mesh, computing face and cell geometry.
    ///
    /// `neighbour` lists the neighbour cell of every internal face, so its
    /// length fixes the number of internal faces. Patches must cover the
    /// boundary faces contiguously and in order.
    pub fn new(
        name: impl Into<String>,
        points: Vec<Vec3>,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patches: Vec<Patch>,
    ) -> Result<Self, MeshCouplingError> {
        let name = name.into();
        if owner.len() != faces.len() {
            return Err(MeshCouplingError::InvalidMesh(format!(
                "region `{name}`: {} faces but {} owners",
                faces.len(),
                owner.len()
            )));
        }
        if neighbour.len() > faces.len() {
            return Err(MeshCouplingError::InvalidMesh(format!(
                "region `{name}`: more neighbours ({}) than faces ({})",
                neighbour.len(),
                faces.len()
            )));
        }
        let mut next = neighbour.len();
        for patch in &patches {
            if patch.start != next {
                return Err(MeshCouplingError::InvalidMesh(format!(
                    "region `{name}`: patch `{}` starts at face {} but face {next} is the next boundary face",
                    patch.name, patch.start
                )));
            }
            next += patch.size;
        }
        if next != faces.len() {
            return Err(MeshCouplingError::InvalidMesh(format!(
                "region `{name}`: patches cover faces up to {next} of {}",
                faces.len()
            )));
        }
        for (i, a) in patches.iter().enumerate() {
            if patches[..i].iter().any(|b| b.name == a.name) {
                return Err(MeshCouplingError::InvalidMesh(format!(
                    "region `{name}`: duplicate patch `{}`",
                    a.name
                )));
            }
        }

        let n_cells = owner
            .iter()
            .chain(neighbour.iter())
            .map(|&c| c + 1)
            .max()
            .unwrap_or(0);

        let mut face_centres = Vec::with_capacity(faces.len());
        let mut face_areas = Vec::with_capacity(faces.len());
        for (f, verts) in faces.iter().enumerate() {
            let mut poly = Vec::with_capacity(verts.len());
            for &v in verts {
                let p = points.get(v).ok_or_else(|| {
                    MeshCouplingError::InvalidMesh(format!(
                        "region `{name}`: face {f} references missing point {v}"
                    ))
                })?;
                poly.push(*p);
            }
            let (c, a) = face_centre_and_area(&poly)?;
            face_centres.push(c);
            face_areas.push(a);
        }

        let mut cell_faces = vec![Vec::new(); n_cells];
        for (f, &c) in owner.iter().enumerate() {
            cell_faces[c].push(f);
        }
        for (f, &c) in neighbour.iter().enumerate() {
            cell_faces[c].push(f);
        }

        let mut mesh = Self {
            name,
            points,
            faces,
            owner,
            neighbour,
            n_cells,
            patches,
            face_centres,
            face_areas,
            cell_centres: Vec::new(),
            cell_faces,
        };
        mesh.cell_centres = (0..n_cells).map(|c| mesh.compute_cell_centre(c)).collect();
        Ok(mesh)
    }

    /// Pyramid decomposition about the face-centre average.
    fn compute_cell_centre(&self, cell: usize) -> Vec3 {
        let faces = &self.cell_faces[cell];
        let fcs: Vec<Vec3> = faces.iter().map(|&f| self.face_centres[f]).collect();
        let estimate = average(&fcs);
        let mut sum_v = 0.0;
        let mut sum_vc = [0.0; 3];
        for &f in faces {
            let area = self.outward_area(cell, f);
            let fc = self.face_centres[f];
            let pyr_vol = dot(area, sub(fc, estimate)).abs() / 3.0;
            let pyr_c = add(scale(fc, 0.75), scale(estimate, 0.25));
            sum_v += pyr_vol;
            sum_vc = add(sum_vc, scale(pyr_c, pyr_vol));
        }
        if sum_v > VSMALL {
            scale(sum_vc, 1.0 / sum_v)
        } else {
            estimate
        }
    }

    /// Area vector of `face` oriented out of `cell`.
    pub fn outward_area(&self, cell: usize, face: usize) -> Vec3 {
        if self.owner[face] == cell {
            self.face_areas[face]
        } else {
            scale(self.face_areas[face], -1.0)
        }
    }

    /// Region name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    pub fn neighbour(&self) -> &[usize] {
        &self.neighbour
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    pub fn n_boundary_faces(&self) -> usize {
        self.faces.len() - self.neighbour.len()
    }

    pub fn face_centres(&self) -> &[Vec3] {
        &self.face_centres
    }

    pub fn face_areas(&self) -> &[Vec3] {
        &self.face_areas
    }

    pub fn cell_centres(&self) -> &[Vec3] {
        &self.cell_centres
    }

    pub fn cell_faces(&self, cell: usize) -> &[usize] {
        &self.cell_faces[cell]
    }

    /// Vertex coordinates of a face, in face order.
    pub fn face_points(&self, face: usize) -> Vec<Vec3> {
        self.faces[face].iter().map(|&v| self.points[v]).collect()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn patch(&self, index: usize) -> &Patch {
        &self.patches[index]
    }

    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// Patch holding boundary face `face` (mesh face index).
    pub fn which_patch(&self, face: usize) -> Option<usize> {
        self.patches.iter().position(|p| p.range().contains(&face))
    }

    /// Attach (or replace) the coupling configuration of a patch.
    pub fn set_patch_coupling(
        &mut self,
        patch: usize,
        config: Option<SampleConfig>,
    ) -> Result<(), MeshCouplingError> {
        let region = self.name.clone();
        let p = self.patches.get_mut(patch).ok_or_else(|| MeshCouplingError::UnknownPatch {
            patch: format!("#{patch}"),
            region,
        })?;
        *p.coupling_mut() = config;
        Ok(())
    }

    /// Bounding box of a cell's vertices.
    pub fn cell_bounds(&self, cell: usize) -> BoundBox {
        let pts: Vec<Vec3> = self.cell_faces[cell]
            .iter()
            .flat_map(|&f| self.faces[f].iter().map(|&v| self.points[v]))
            .collect();
        BoundBox::from_points(&pts)
    }

    /// Convex point-in-cell test: `p` lies on the inner side of every face
    /// plane of `cell` (boundary points count as inside).
    pub fn point_in_cell(&self, p: Vec3, cell: usize) -> bool {
        self.cell_faces[cell].iter().all(|&f| {
            let n = self.outward_area(cell, f);
            let mag = norm(n);
            // Signed distance against a tolerance scaled by the face size.
            dot(sub(p, self.face_centres[f]), n) <= 1e-9 * mag * mag.sqrt()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single unit cube cell, one patch per side.
    fn unit_cube() -> PolyMesh {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];
        let faces = vec![
            vec![0, 3, 2, 1], // z-
            vec![4, 5, 6, 7], // z+
            vec![0, 1, 5, 4], // y-
            vec![3, 7, 6, 2], // y+
            vec![0, 4, 7, 3], // x-
            vec![1, 2, 6, 5], // x+
        ];
        let patches = vec![Patch::new("walls", 0, 6)];
        PolyMesh::new("cube", points, faces, vec![0; 6], vec![], patches).unwrap()
    }

    #[test]
    fn cube_geometry() {
        let mesh = unit_cube();
        assert_eq!(mesh.n_cells(), 1);
        let c = mesh.cell_centres()[0];
        for d in 0..3 {
            assert!((c[d] - 0.5).abs() < 1e-12);
        }
        assert!((mesh.face_areas()[0][2] + 1.0).abs() < 1e-12);
        assert!(mesh.point_in_cell([0.2, 0.9, 0.5], 0));
        assert!(mesh.point_in_cell([1.0, 0.5, 0.5], 0));
        assert!(!mesh.point_in_cell([1.1, 0.5, 0.5], 0));
    }

    #[test]
    fn patches_must_cover_boundary() {
        let mesh = unit_cube();
        let err = PolyMesh::new(
            "broken",
            mesh.points().to_vec(),
            mesh.faces().to_vec(),
            vec![0; 6],
            vec![],
            vec![Patch::new("walls", 0, 5)],
        )
        .unwrap_err();
        assert!(matches!(err, MeshCouplingError::InvalidMesh(_)));
    }
}
