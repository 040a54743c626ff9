use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use mesh_coupling::coupling::distribution_map::DistributionMap;
use mesh_coupling::coupling::sample_finder::{SampleTarget, find_samples};
use mesh_coupling::prelude::*;

fn block(n: usize) -> PolyMesh {
    BlockMesh::new("block", [0.0; 3], [1.0; 3], [n, n, n])
        .build()
        .expect("block mesh")
}

/// Points on the top patch pulled half a cell into the block.
fn probe_points(mesh: &PolyMesh, n: usize) -> Vec<Vec3> {
    let p = mesh.find_patch("zMax").expect("zMax patch");
    let lift = 0.5 / n as f64;
    mesh.face_centres()[mesh.patch(p).range()]
        .iter()
        .map(|c| [c[0], c[1], c[2] - lift])
        .collect()
}

fn bench_sample_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_search");

    for &n in &[10usize, 20usize] {
        let mesh = block(n);
        let points = probe_points(&mesh, n);

        group.bench_with_input(BenchmarkId::new("nearest_cell", n), &n, |b, _| {
            b.iter(|| {
                let samples =
                    find_samples(&NoComm, &points, SampleTarget::Cells(&mesh), "zMax", "block")
                        .expect("search");
                black_box(samples);
            });
        });

        let samples = find_samples(&NoComm, &points, SampleTarget::Cells(&mesh), "zMax", "block")
            .expect("search");
        let owners = samples.owners();
        group.bench_with_input(BenchmarkId::new("calc_mapping", n), &n, |b, _| {
            b.iter(|| {
                let map = DistributionMap::calc_mapping(&NoComm, &owners, mesh.n_cells())
                    .expect("mapping");
                black_box(map);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sample_search);
criterion_main!(benches);
