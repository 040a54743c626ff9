//! Two-sided overlap weights over a [`DistributionMap`].
//!
//! Both non-conforming couplings reduce to a list of overlaps, each joining a
//! local source face to a global target face with an area. Every overlap is
//! one slot of the map. Source weights live with the source faces; target
//! weights are computed on the process owning the target face from the
//! overlap areas pushed to it, which also gives that process the transposed
//! addressing.

use crate::algs::communicator::Communicator;
use crate::algs::wire::WireIndex;
use crate::coupling::distribution_map::DistributionMap;
use crate::coupling::field::FieldValue;
use crate::coupling::sample_finder::GlobalIndex;
use crate::geometry::vector::{VSMALL, Vec3};
use crate::mesh_error::MeshCouplingError;
use log::{debug, warn};

/// Weight sums this close to one are normalised to exactly one.
pub const UNITY_TOL: f64 = 1e-9;

/// Intersection of one local source face with one target face.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OverlapRecord {
    /// Local face index on the source patch.
    pub source: usize,
    /// Global face index on the target patch.
    pub target: usize,
    /// Overlap area.
    pub area: f64,
    /// Overlap centroid.
    pub centroid: Vec3,
}

/// Weighted addressing on both sides of a non-conforming interface.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedCoupling {
    map: DistributionMap,
    records: Vec<OverlapRecord>,
    /// Slots of each source face.
    src_slots: Vec<Vec<usize>>,
    src_weights: Vec<Vec<f64>>,
    src_sum: Vec<f64>,
    /// Positions in push-delivery order, per local target face.
    tgt_slots: Vec<Vec<usize>>,
    /// Global source face of each target weight.
    tgt_sources: Vec<Vec<usize>>,
    tgt_weights: Vec<Vec<f64>>,
    tgt_sum: Vec<f64>,
}

/// Divide by the sum when it reaches (or rounds to) one.
fn normalise(weights: &mut [f64]) -> f64 {
    let sum: f64 = weights.iter().sum();
    if sum > 1.0 - UNITY_TOL {
        for w in weights.iter_mut() {
            *w /= sum;
        }
        1.0
    } else {
        sum
    }
}

impl WeightedCoupling {
    /// Collective: weights for `records`.
    ///
    /// `source_areas` are the local source face areas, `source_index` numbers
    /// the source faces globally; `target_areas` are indexed by global target
    /// face and `target_index` numbers them.
    pub fn new<C: Communicator>(
        comm: &C,
        records: Vec<OverlapRecord>,
        source_areas: &[f64],
        source_index: &GlobalIndex,
        target_areas: &[f64],
        target_index: &GlobalIndex,
    ) -> Result<Self, MeshCouplingError> {
        let me = comm.rank();
        let n_src = source_areas.len();
        let n_tgt = target_index.local_size(me);

        let owners: Vec<(usize, usize)> = records
            .iter()
            .map(|r| target_index.to_local(r.target))
            .collect();
        let map = DistributionMap::calc_mapping(comm, &owners, n_tgt)?;

        let mut src_slots = vec![Vec::new(); n_src];
        let mut src_weights = vec![Vec::new(); n_src];
        for (slot, r) in records.iter().enumerate() {
            let a = source_areas[r.source];
            src_slots[r.source].push(slot);
            src_weights[r.source].push(if a > VSMALL { r.area / a } else { 0.0 });
        }
        let src_sum: Vec<f64> = src_weights.iter_mut().map(|w| normalise(w)).collect();

        // target side: per slot, [overlap area, target area] and source id
        let payload: Vec<[f64; 2]> = records
            .iter()
            .map(|r| [r.area, target_areas[r.target]])
            .collect();
        let ids: Vec<WireIndex> = records
            .iter()
            .map(|r| WireIndex::of(source_index.to_global(me, r.source)))
            .collect();
        let arrived = map.push(comm, &payload)?;
        let arrived_ids = map.push(comm, &ids)?;

        let mut tgt_slots = vec![Vec::new(); n_tgt];
        let mut tgt_sources = vec![Vec::new(); n_tgt];
        let mut tgt_weights = vec![Vec::new(); n_tgt];
        for (k, ((&idx, [area, tgt_area]), id)) in map
            .map_indices()
            .iter()
            .zip(arrived)
            .zip(arrived_ids)
            .enumerate()
        {
            tgt_slots[idx].push(k);
            tgt_sources[idx].push(id.get());
            tgt_weights[idx].push(if tgt_area > VSMALL { area / tgt_area } else { 0.0 });
        }
        let tgt_sum: Vec<f64> = tgt_weights.iter_mut().map(|w| normalise(w)).collect();

        let partial = src_sum.iter().filter(|&&s| s < 1.0 - UNITY_TOL).count();
        if partial > 0 {
            warn!(
                "rank {me}: {partial} of {n_src} source faces are only partially covered by the target patch"
            );
        }
        debug!(
            "rank {me}: weighted coupling with {} overlaps, {} source and {} target faces",
            records.len(),
            n_src,
            n_tgt
        );
        Ok(Self {
            map,
            records,
            src_slots,
            src_weights,
            src_sum,
            tgt_slots,
            tgt_sources,
            tgt_weights,
            tgt_sum,
        })
    }

    /// Map with one slot per overlap.
    pub fn map(&self) -> &DistributionMap {
        &self.map
    }

    pub fn records(&self) -> &[OverlapRecord] {
        &self.records
    }

    /// Global target faces overlapping each source face.
    pub fn src_addressing(&self) -> Vec<Vec<usize>> {
        self.src_slots
            .iter()
            .map(|slots| slots.iter().map(|&s| self.records[s].target).collect())
            .collect()
    }

    pub fn src_weights(&self) -> &[Vec<f64>] {
        &self.src_weights
    }

    pub fn src_weights_sum(&self) -> &[f64] {
        &self.src_sum
    }

    /// Global source faces overlapping each local target face.
    pub fn tgt_addressing(&self) -> &[Vec<usize>] {
        &self.tgt_sources
    }

    pub fn tgt_weights(&self) -> &[Vec<f64>] {
        &self.tgt_weights
    }

    pub fn tgt_weights_sum(&self) -> &[f64] {
        &self.tgt_sum
    }

    /// Collective: target value = Σ target weight × source value.
    pub fn distribute<T: FieldValue, C: Communicator>(
        &self,
        comm: &C,
        source: &[T],
    ) -> Result<Vec<T>, MeshCouplingError> {
        if source.len() != self.src_slots.len() {
            return Err(MeshCouplingError::FieldSizeMismatch {
                expected: self.src_slots.len(),
                got: source.len(),
            });
        }
        let per_slot: Vec<T> = self.records.iter().map(|r| source[r.source]).collect();
        let arrived = self.map.push(comm, &per_slot)?;
        Ok(self
            .tgt_slots
            .iter()
            .zip(&self.tgt_weights)
            .map(|(slots, weights)| {
                let mut acc = T::zeroed();
                for (&k, &w) in slots.iter().zip(weights) {
                    acc.accumulate(arrived[k].scaled(w));
                }
                acc
            })
            .collect())
    }

    /// Collective: source value = Σ source weight × target value.
    pub fn reverse_distribute<T: FieldValue, C: Communicator>(
        &self,
        comm: &C,
        target: &[T],
    ) -> Result<Vec<T>, MeshCouplingError> {
        let per_slot = self.map.pull(comm, target)?;
        Ok(self
            .src_slots
            .iter()
            .zip(&self.src_weights)
            .map(|(slots, weights)| {
                let mut acc = T::zeroed();
                for (&s, &w) in slots.iter().zip(weights) {
                    acc.accumulate(per_slot[s].scaled(w));
                }
                acc
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    fn rec(source: usize, target: usize, area: f64) -> OverlapRecord {
        OverlapRecord {
            source,
            target,
            area,
            centroid: [0.0; 3],
        }
    }

    #[test]
    fn half_shifted_faces() {
        // two unit source faces over two unit target faces shifted by half
        let records = vec![rec(0, 0, 0.5), rec(1, 0, 0.5), rec(1, 1, 0.5)];
        let src = GlobalIndex::from_sizes([2]);
        let tgt = GlobalIndex::from_sizes([2]);
        let w = WeightedCoupling::new(&NoComm, records, &[1.0, 1.0], &src, &[1.0, 1.0], &tgt)
            .unwrap();
        assert_eq!(w.src_weights_sum(), &[0.5, 1.0]);
        assert_eq!(w.tgt_weights_sum(), &[1.0, 0.5]);
        assert_eq!(w.src_addressing(), vec![vec![0], vec![0, 1]]);
        assert_eq!(w.tgt_addressing(), &[vec![0, 1], vec![1]]);

        let fwd = w.distribute(&NoComm, &[2.0, 4.0]).unwrap();
        assert_eq!(fwd, vec![3.0, 2.0]);
        let back = w.reverse_distribute(&NoComm, &[2.0, 4.0]).unwrap();
        assert_eq!(back, vec![1.0, 3.0]);
    }

    #[test]
    fn sums_above_one_are_rescaled() {
        let records = vec![rec(0, 0, 0.7), rec(0, 1, 0.4)];
        let idx = GlobalIndex::from_sizes([2]);
        let w = WeightedCoupling::new(&NoComm, records, &[1.0, 1.0], &idx, &[1.0, 1.0], &idx)
            .unwrap();
        assert_eq!(w.src_weights_sum()[0], 1.0);
        let s: f64 = w.src_weights()[0].iter().sum();
        assert!((s - 1.0).abs() < 1e-15);
    }
}
