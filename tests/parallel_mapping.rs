mod util;

use mesh_coupling::prelude::*;
use util::{assert_close, patch_centres, registry, run_ranks, stacked_piece, unit_block};

/// Two-piece stack whose upper slabs sit over the other rank's lower slab.
fn crossed(cells: [usize; 3], part: usize) -> RegionRegistry {
    registry([
        unit_block("lower", 0.0, cells).decompose_x(2, part).unwrap(),
        unit_block("upper", 1.0, cells).decompose_x(2, 1 - part).unwrap(),
    ])
}

fn xs(centres: &[Vec3]) -> Vec<f64> {
    centres.iter().map(|c| c[0]).collect()
}

#[test]
fn faces_find_their_partners_on_the_other_rank() {
    let results = run_ranks(2, |comm| {
        let rank = comm.rank();
        let regions = crossed([4, 4, 1], rank);
        let mut mp = MappedPatch::with_target(
            "lower",
            "zMax",
            SampleMode::NearestPatchFace,
            "upper",
            "zMin",
            comm,
        )
        .unwrap();
        let procs: Vec<usize> = mp
            .samples(&regions)
            .unwrap()
            .samples
            .iter()
            .map(|s| s.proc)
            .collect();

        let source = xs(&patch_centres(&regions, "lower", "zMax"));
        let there = mp.distribute(&regions, &source).unwrap();
        let back = mp.reverse_distribute(&regions, &there).unwrap();
        let target = xs(&patch_centres(&regions, "upper", "zMin"));
        (rank, procs, source, there, back, target)
    });
    for (rank, procs, source, there, back, target) in results {
        assert_eq!(procs, vec![1 - rank; 8]);
        assert_close(&there, &target, 1e-12);
        assert_eq!(back, source);
    }
}

#[test]
fn cells_sampled_across_ranks() {
    let results = run_ranks(2, |comm| {
        let regions = crossed([4, 4, 1], comm.rank());
        let cfg = SampleConfig::new(SampleMode::NearestCell)
            .with_target("upper", "")
            .with_offset(OffsetMode::Normal(0.5));
        let mut mp = MappedPatch::new("lower", "zMax", cfg, comm).unwrap();
        let mesh = regions.get("upper").unwrap();
        let cell_xs = xs(mesh.cell_centres());
        let back = mp.reverse_distribute(&regions, &cell_xs).unwrap();
        let fallback = mp.samples(&regions).unwrap().samples.iter().any(|s| s.fallback);
        (back, xs(&patch_centres(&regions, "lower", "zMax")), fallback)
    });
    for (back, want, fallback) in results {
        assert!(!fallback);
        assert_close(&back, &want, 1e-12);
    }
}

#[test]
fn distributed_ami_covers_both_sides() {
    let results = run_ranks(2, |comm| {
        let regions = stacked_piece([4, 4, 1], [3, 3, 1], 2, comm.rank());
        let mut mp = MappedPatch::with_target(
            "lower",
            "zMax",
            SampleMode::NearestPatchFaceAMI,
            "upper",
            "zMin",
            comm,
        )
        .unwrap();
        let interp = mp.ami(&regions).unwrap();
        let sums: Vec<f64> = interp
            .src_weights_sum()
            .iter()
            .chain(interp.tgt_weights_sum())
            .copied()
            .collect();
        let n_target = interp.tgt_weights_sum().len();
        let n_source = interp.src_weights_sum().len();
        let there = mp.distribute(&regions, &vec![4.0_f64; n_source]).unwrap();
        let back = mp.reverse_distribute(&regions, &vec![-2.0_f64; n_target]).unwrap();
        (sums, there, back)
    });
    let mut n_target = 0;
    for (sums, there, back) in results {
        assert_close(&sums, &vec![1.0; sums.len()], 1e-9);
        assert_close(&there, &vec![4.0; there.len()], 1e-12);
        assert_close(&back, &vec![-2.0; back.len()], 1e-12);
        n_target += there.len();
    }
    assert_eq!(n_target, 9);
}

#[test]
fn rebuilt_mapping_is_identical() {
    let results = run_ranks(2, |comm| {
        let regions = stacked_piece([4, 4, 1], [3, 3, 1], 2, comm.rank());
        let mut mp = MappedPatch::with_target(
            "lower",
            "zMax",
            SampleMode::NearestPatchFace,
            "upper",
            "zMin",
            comm,
        )
        .unwrap();
        let first = mp.samples(&regions).unwrap().clone();
        let first_map = mp.map(&regions).unwrap().clone();
        mp.clear_out();
        let second = mp.samples(&regions).unwrap().clone();
        let second_map = mp.map(&regions).unwrap().clone();
        first == second && first_map == second_map
    });
    assert_eq!(results, vec![true, true]);
}

/// Single-face `gauge` region whose sample point sits just past the x = 1
/// plane of the 2 x 1 x 1 `solid` region.
fn gauge_and_solid(solid_part: Option<usize>) -> RegionRegistry {
    let gauge = BlockMesh::new("gauge", [1.0, 0.2, -1.0], [0.1, 0.4, 1.0], [1, 1, 1]);
    let solid = BlockMesh::new("solid", [0.0; 3], [2.0, 1.0, 1.0], [2, 1, 1]);
    let solid = match solid_part {
        Some(part) => solid.decompose_x(2, part).unwrap(),
        None => solid.build().unwrap(),
    };
    registry([gauge.build().unwrap(), solid])
}

fn nearest_boundary_face<C: Communicator>(comm: C) -> MappedPatch<C> {
    let cfg = SampleConfig::new(SampleMode::NearestFace)
        .with_target("solid", "")
        .with_offset(OffsetMode::Direction(Offset::Uniform([0.0, 0.0, 0.45])));
    MappedPatch::new("gauge", "zMax", cfg, comm).unwrap()
}

/// Centres of the boundary faces of `region` that received a value.
fn hit_centres<C: Communicator>(
    regions: &RegionRegistry,
    mp: &mut MappedPatch<C>,
    region: &str,
    values: &[f64],
) -> Vec<Vec3> {
    let out = mp.distribute(regions, values).unwrap();
    let mesh = regions.get(region).unwrap();
    let n_internal = mesh.n_internal_faces();
    out.iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(b, _)| mesh.face_centres()[n_internal + b])
        .collect()
}

fn sorted(mut centres: Vec<Vec3>) -> Vec<Vec3> {
    centres.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])).then(a[2].total_cmp(&b[2])));
    centres
}

#[test]
fn nearest_boundary_face_ignores_decomposition_cuts() {
    let whole = gauge_and_solid(None);
    let mut serial = nearest_boundary_face(NoComm);
    let want = hit_centres(&whole, &mut serial, "solid", &[1.0]);
    assert_eq!(want.len(), 1);
    assert_close(&want[0], &[1.5, 0.0, 0.5], 1e-12);

    let results = run_ranks(2, |comm| {
        let regions = gauge_and_solid(Some(comm.rank()));
        let mut mp = nearest_boundary_face(comm);
        let procs: Vec<usize> = mp
            .samples(&regions)
            .unwrap()
            .samples
            .iter()
            .map(|s| s.proc)
            .collect();
        (procs, hit_centres(&regions, &mut mp, "solid", &[1.0]))
    });
    let mut hits = Vec::new();
    for (procs, centres) in results {
        assert_eq!(procs, vec![1]);
        hits.extend(centres);
    }
    assert_eq!(hits.len(), 1);
    assert_close(&hits[0], &want[0], 1e-12);
}

fn sampling_upper_boundary<C: Communicator>(comm: C) -> MappedPatch<C> {
    let cfg = SampleConfig::new(SampleMode::NearestFace)
        .with_target("upper", "")
        .with_offset(OffsetMode::Normal(0.1));
    MappedPatch::new("lower", "zMax", cfg, comm).unwrap()
}

#[test]
fn nearest_boundary_face_matches_serial_on_split_region() {
    let whole = util::stacked([4, 4, 1], [4, 4, 2]);
    let mut serial = sampling_upper_boundary(NoComm);
    let values: Vec<f64> = xs(&patch_centres(&whole, "lower", "zMax"));
    let want = sorted(hit_centres(&whole, &mut serial, "upper", &values));
    assert_eq!(want.len(), 16);

    let results = run_ranks(2, |comm| {
        let regions = stacked_piece([4, 4, 1], [4, 4, 2], 2, comm.rank());
        let mut mp = sampling_upper_boundary(comm);
        let values = xs(&patch_centres(&regions, "lower", "zMax"));
        hit_centres(&regions, &mut mp, "upper", &values)
    });
    let got = sorted(results.into_iter().flatten().collect());
    assert_eq!(got.len(), want.len());
    for (g, w) in got.iter().zip(&want) {
        assert_close(g, w, 1e-12);
    }
}

#[test]
fn distributed_patch_to_patch_preserves_uniform_fields() {
    let results = run_ranks(2, |comm| {
        let regions = stacked_piece([4, 4, 1], [3, 3, 1], 2, comm.rank());
        let mut mp = MappedPatch::with_target(
            "lower",
            "zMax",
            SampleMode::PatchToPatch,
            "upper",
            "zMin",
            comm,
        )
        .unwrap();
        let p2p = mp.patch_to_patch(&regions).unwrap();
        let sums: Vec<f64> = p2p
            .coupling()
            .src_weights_sum()
            .iter()
            .chain(p2p.coupling().tgt_weights_sum())
            .copied()
            .collect();
        let n_source = p2p.coupling().src_weights_sum().len();
        let there = mp.distribute(&regions, &vec![3.0_f64; n_source]).unwrap();
        (sums, there)
    });
    let mut n_target = 0;
    for (sums, there) in results {
        assert_close(&sums, &vec![1.0; sums.len()], 1e-9);
        assert_close(&there, &vec![3.0; there.len()], 1e-12);
        n_target += there.len();
    }
    assert_eq!(n_target, 9);
}
