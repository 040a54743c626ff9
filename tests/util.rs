#![allow(dead_code)]
use mesh_coupling::prelude::*;
use std::sync::Arc;

/// Unit cube block named `name` lifted to `z0`, with `cells` hexahedra.
pub fn unit_block(name: &str, z0: f64, cells: [usize; 3]) -> BlockMesh {
    BlockMesh::new(name, [0.0, 0.0, z0], [1.0; 3], cells)
}

/// `lower` (z in [0, 1]) under `upper` (z in [1, 2]), whole.
pub fn stacked(lower: [usize; 3], upper: [usize; 3]) -> RegionRegistry {
    registry([
        unit_block("lower", 0.0, lower).build().unwrap(),
        unit_block("upper", 1.0, upper).build().unwrap(),
    ])
}

/// Piece `part` of `n_parts` of both stacked blocks, cut along x.
pub fn stacked_piece(lower: [usize; 3], upper: [usize; 3], n_parts: usize, part: usize) -> RegionRegistry {
    registry([
        unit_block("lower", 0.0, lower).decompose_x(n_parts, part).unwrap(),
        unit_block("upper", 1.0, upper).decompose_x(n_parts, part).unwrap(),
    ])
}

pub fn registry(meshes: impl IntoIterator<Item = PolyMesh>) -> RegionRegistry {
    let mut reg = RegionRegistry::new();
    for m in meshes {
        reg.insert(m).unwrap();
    }
    reg
}

/// Face centres of a named patch.
pub fn patch_centres(regions: &RegionRegistry, region: &str, patch: &str) -> Vec<Vec3> {
    let (mesh, p) = regions.get_patch(region, patch).unwrap();
    mesh.face_centres()[mesh.patch(p).range()].to_vec()
}

/// Run `f` on every rank of a fresh in-process world, one thread per rank;
/// results come back in rank order.
pub fn run_ranks<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(RayonComm) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = RayonComm::world(n)
        .into_iter()
        .map(|comm| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || f(comm))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

pub fn assert_close(got: &[f64], want: &[f64], tol: f64) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        assert!((g - w).abs() <= tol, "entry {i}: got {g}, want {w}");
    }
}
