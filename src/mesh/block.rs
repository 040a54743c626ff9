//! Structured hexahedral block generator, optionally decomposed along x.
//!
//! Each of the six block sides becomes one boundary patch (`xMin`, `xMax`,
//! `yMin`, `yMax`, `zMin`, `zMax` unless renamed). A decomposed piece keeps
//! every side patch, possibly empty, and collects the faces on its cut planes
//! in an extra `procBoundary` patch, so that every piece of a region carries
//! the same named patches.

use crate::coupling::config::SampleConfig;
use crate::geometry::vector::Vec3;
use crate::mesh::poly_mesh::{Patch, PolyMesh};
use crate::mesh_error::MeshCouplingError;

/// Name of the patch holding faces on decomposition cut planes.
pub const PROC_BOUNDARY: &str = "procBoundary";

/// One side of an axis-aligned block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    XMin,
    XMax,
    YMin,
    YMax,
    ZMin,
    ZMax,
}

impl Side {
    pub const ALL: [Side; 6] = [
        Side::XMin,
        Side::XMax,
        Side::YMin,
        Side::YMax,
        Side::ZMin,
        Side::ZMax,
    ];

    /// Default patch name of this side.
    pub fn default_name(self) -> &'static str {
        match self {
            Side::XMin => "xMin",
            Side::XMax => "xMax",
            Side::YMin => "yMin",
            Side::YMax => "yMax",
            Side::ZMin => "zMin",
            Side::ZMax => "zMax",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug)]
struct SideDef {
    name: String,
    groups: Vec<String>,
    coupling: Option<SampleConfig>,
}

/// Builder for a box of `nx × ny × nz` hexahedra.
#[derive(Clone, Debug)]
pub struct BlockMesh {
    name: String,
    origin: Vec3,
    lengths: Vec3,
    cells: [usize; 3],
    sides: Vec<SideDef>,
}

impl BlockMesh {
    pub fn new(name: impl Into<String>, origin: Vec3, lengths: Vec3, cells: [usize; 3]) -> Self {
        let sides = Side::ALL
            .iter()
            .map(|s| SideDef {
                name: s.default_name().to_owned(),
                groups: Vec::new(),
                coupling: None,
            })
            .collect();
        Self {
            name: name.into(),
            origin,
            lengths,
            cells,
            sides,
        }
    }

    /// Rename the patch of one side.
    pub fn rename_side(mut self, side: Side, name: impl Into<String>) -> Self {
        self.sides[side.index()].name = name.into();
        self
    }

    /// Add a couple group to the patch of one side.
    pub fn with_group(mut self, side: Side, group: impl Into<String>) -> Self {
        self.sides[side.index()].groups.push(group.into());
        self
    }

    /// Make the patch of one side coupling-aware.
    pub fn with_coupling(mut self, side: Side, config: SampleConfig) -> Self {
        self.sides[side.index()].coupling = Some(config);
        self
    }

    /// The whole block as one mesh.
    pub fn build(&self) -> Result<PolyMesh, MeshCouplingError> {
        self.decompose_x(1, 0)
    }

    /// Piece `part` of `n_parts` slabs cut along x.
    pub fn decompose_x(&self, n_parts: usize, part: usize) -> Result<PolyMesh, MeshCouplingError> {
        let [nx, ny, nz] = self.cells;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(MeshCouplingError::InvalidMesh(format!(
                "block `{}` needs at least one cell per direction, got {:?}",
                self.name, self.cells
            )));
        }
        if n_parts == 0 || part >= n_parts || n_parts > nx {
            return Err(MeshCouplingError::InvalidMesh(format!(
                "block `{}`: cannot take part {part} of {n_parts} from {nx} x-cells",
                self.name
            )));
        }
        let i0 = part * nx / n_parts;
        let i1 = (part + 1) * nx / n_parts;
        let nxl = i1 - i0;

        let dx = [
            self.lengths[0] / nx as f64,
            self.lengths[1] / ny as f64,
            self.lengths[2] / nz as f64,
        ];
        let mut points = Vec::with_capacity((nxl + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in i0..=i1 {
                    points.push([
                        self.origin[0] + i as f64 * dx[0],
                        self.origin[1] + j as f64 * dx[1],
                        self.origin[2] + k as f64 * dx[2],
                    ]);
                }
            }
        }
        // Local point and cell ids; `i` is global.
        let pt = |i: usize, j: usize, k: usize| (i - i0) + (nxl + 1) * (j + (ny + 1) * k);
        let cell = |i: usize, j: usize, k: usize| (i - i0) + nxl * (j + ny * k);
        let x_face = |i, j, k| vec![pt(i, j, k), pt(i, j + 1, k), pt(i, j + 1, k + 1), pt(i, j, k + 1)];
        let y_face = |i, j, k| vec![pt(i, j, k), pt(i, j, k + 1), pt(i + 1, j, k + 1), pt(i + 1, j, k)];
        let z_face = |i, j, k| vec![pt(i, j, k), pt(i + 1, j, k), pt(i + 1, j + 1, k), pt(i, j + 1, k)];
        let flipped = |mut f: Vec<usize>| {
            f.reverse();
            f
        };

        let mut faces = Vec::new();
        let mut owner = Vec::new();
        let mut neighbour = Vec::new();
        for k in 0..nz {
            for j in 0..ny {
                for i in i0..i1 {
                    let c = cell(i, j, k);
                    if i + 1 < i1 {
                        faces.push(x_face(i + 1, j, k));
                        owner.push(c);
                        neighbour.push(cell(i + 1, j, k));
                    }
                    if j + 1 < ny {
                        faces.push(y_face(i, j + 1, k));
                        owner.push(c);
                        neighbour.push(cell(i, j + 1, k));
                    }
                    if k + 1 < nz {
                        faces.push(z_face(i, j, k + 1));
                        owner.push(c);
                        neighbour.push(cell(i, j, k + 1));
                    }
                }
            }
        }

        let mut patches = Vec::new();
        let mut push_patch = |side_def: Option<&SideDef>,
                              name: &str,
                              new_faces: Vec<(Vec<usize>, usize)>,
                              faces: &mut Vec<Vec<usize>>,
                              owner: &mut Vec<usize>| {
            let mut patch = Patch::new(name, faces.len(), new_faces.len());
            match side_def {
                Some(side_def) => {
                    for g in &side_def.groups {
                        patch = patch.with_group(g.clone());
                    }
                    if let Some(cfg) = &side_def.coupling {
                        patch = patch.with_coupling(cfg.clone());
                    }
                }
                None => patch = patch.as_processor(),
            }
            for (f, c) in new_faces {
                faces.push(f);
                owner.push(c);
            }
            patches.push(patch);
        };

        for side in Side::ALL {
            let mut side_faces = Vec::new();
            match side {
                Side::XMin if i0 == 0 => {
                    for k in 0..nz {
                        for j in 0..ny {
                            side_faces.push((flipped(x_face(0, j, k)), cell(0, j, k)));
                        }
                    }
                }
                Side::XMax if i1 == nx => {
                    for k in 0..nz {
                        for j in 0..ny {
                            side_faces.push((x_face(nx, j, k), cell(nx - 1, j, k)));
                        }
                    }
                }
                Side::YMin | Side::YMax => {
                    let (jf, jc) = if side == Side::YMin { (0, 0) } else { (ny, ny - 1) };
                    for k in 0..nz {
                        for i in i0..i1 {
                            let f = y_face(i, jf, k);
                            let f = if side == Side::YMin { flipped(f) } else { f };
                            side_faces.push((f, cell(i, jc, k)));
                        }
                    }
                }
                Side::ZMin | Side::ZMax => {
                    let (kf, kc) = if side == Side::ZMin { (0, 0) } else { (nz, nz - 1) };
                    for j in 0..ny {
                        for i in i0..i1 {
                            let f = z_face(i, j, kf);
                            let f = if side == Side::ZMin { flipped(f) } else { f };
                            side_faces.push((f, cell(i, j, kc)));
                        }
                    }
                }
                _ => {}
            }
            let side_def = &self.sides[side.index()];
            push_patch(Some(side_def), &side_def.name, side_faces, &mut faces, &mut owner);
        }

        if n_parts > 1 {
            let mut cut = Vec::new();
            for k in 0..nz {
                for j in 0..ny {
                    if i0 > 0 {
                        cut.push((flipped(x_face(i0, j, k)), cell(i0, j, k)));
                    }
                    if i1 < nx {
                        cut.push((x_face(i1, j, k), cell(i1 - 1, j, k)));
                    }
                }
            }
            push_patch(None, PROC_BOUNDARY, cut, &mut faces, &mut owner);
        }

        PolyMesh::new(self.name.clone(), points, faces, owner, neighbour, patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vector::normalized;

    #[test]
    fn side_normals_point_outward() {
        let mesh = BlockMesh::new("box", [0.0; 3], [1.0, 2.0, 3.0], [2, 3, 4])
            .build()
            .unwrap();
        assert_eq!(mesh.n_cells(), 24);
        let expect: [(Side, Vec3); 6] = [
            (Side::XMin, [-1.0, 0.0, 0.0]),
            (Side::XMax, [1.0, 0.0, 0.0]),
            (Side::YMin, [0.0, -1.0, 0.0]),
            (Side::YMax, [0.0, 1.0, 0.0]),
            (Side::ZMin, [0.0, 0.0, -1.0]),
            (Side::ZMax, [0.0, 0.0, 1.0]),
        ];
        for (side, n) in expect {
            let p = mesh.find_patch(side.default_name()).unwrap();
            for f in mesh.patch(p).range() {
                let unit = normalized(mesh.face_areas()[f]).unwrap();
                for d in 0..3 {
                    assert!((unit[d] - n[d]).abs() < 1e-12, "{side:?} face {f}");
                }
            }
        }
    }

    #[test]
    fn cells_are_convex_and_contain_centres() {
        let mesh = BlockMesh::new("box", [1.0, 0.0, 0.0], [1.0; 3], [3, 3, 3])
            .build()
            .unwrap();
        for c in 0..mesh.n_cells() {
            assert!(mesh.point_in_cell(mesh.cell_centres()[c], c));
        }
        assert!(!mesh.point_in_cell([0.5, 0.5, 0.5], 0));
    }

    #[test]
    fn decomposition_conserves_cells_and_patches() {
        let block = BlockMesh::new("box", [0.0; 3], [1.0; 3], [5, 2, 2]);
        let whole = block.build().unwrap();
        let mut total_cells = 0;
        let mut total_xmin = 0;
        for part in 0..3 {
            let piece = block.decompose_x(3, part).unwrap();
            total_cells += piece.n_cells();
            total_xmin += piece.patch(piece.find_patch("xMin").unwrap()).size();
            let cut = piece.find_patch(PROC_BOUNDARY).unwrap();
            assert!(piece.patch(cut).is_processor());
            assert_eq!(piece.patches().iter().filter(|p| p.is_processor()).count(), 1);
        }
        assert_eq!(total_cells, whole.n_cells());
        assert_eq!(total_xmin, 4);
    }

    #[test]
    fn too_many_parts_is_rejected() {
        let block = BlockMesh::new("box", [0.0; 3], [1.0; 3], [2, 1, 1]);
        assert!(block.decompose_x(3, 0).is_err());
    }
}
