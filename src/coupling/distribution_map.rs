//! Reusable communication plan between local sample slots and the elements
//! that own them.
//!
//! A map is built from one `(process, storage index)` request per local slot.
//! Each process learns which of its own elements every other process asked
//! for (`serves`), so that afterwards values can be
//! - *pushed* from slots to element owners (forward distribution), or
//! - *pulled* from element owners back to the slots (reverse distribution),
//!
//! with one collective exchange each. The map is immutable; a mesh change
//! means building a new one.

use crate::algs::communicator::{CommTag, CommTags, Communicator};
use crate::algs::exchange::all_to_all;
use crate::algs::wire::WireIndex;
use crate::coupling::delta::{CopyDelta, Delta};
use crate::mesh_error::MeshCouplingError;
use bytemuck::Pod;
use log::debug;

const BUILD_TAGS: CommTags = CommTags::from_base(CommTag::new(0xA200));
const PUSH_TAGS: CommTags = CommTags::from_base(CommTag::new(0xA210));
const PULL_TAGS: CommTags = CommTags::from_base(CommTag::new(0xA220));

/// Send/receive schedule over a fixed set of slots and owned elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistributionMap {
    /// Number of local slots.
    n_slots: usize,
    /// Local storage size on the owning side.
    n_local: usize,
    /// `requests[p]`: local slots whose element lives on process `p`, in slot order.
    requests: Vec<Vec<usize>>,
    /// `serves[p]`: local elements requested by process `p`, in `p`'s slot order.
    serves: Vec<Vec<usize>>,
    /// `serves` flattened in requesting-rank order.
    map_indices: Vec<usize>,
}

impl DistributionMap {
    /// Collective: build the plan for `owners[slot] = (process, storage index)`.
    ///
    /// `n_local` is the size of this process's own element storage; requests
    /// arriving for indices beyond it are rejected.
    pub fn calc_mapping<C: Communicator>(
        comm: &C,
        owners: &[(usize, usize)],
        n_local: usize,
    ) -> Result<Self, MeshCouplingError> {
        let n_procs = comm.size();
        let mut requests = vec![Vec::new(); n_procs];
        let mut wanted: Vec<Vec<WireIndex>> = vec![Vec::new(); n_procs];
        for (slot, &(proc, index)) in owners.iter().enumerate() {
            if proc >= n_procs {
                return Err(MeshCouplingError::CommError {
                    neighbor: proc,
                    reason: format!("slot {slot} is owned by rank {proc} of {n_procs}"),
                });
            }
            requests[proc].push(slot);
            wanted[proc].push(WireIndex::of(index));
        }

        let incoming = all_to_all(comm, BUILD_TAGS, &wanted)?;
        let mut serves = Vec::with_capacity(n_procs);
        for (proc, list) in incoming.iter().enumerate() {
            let mut indices = Vec::with_capacity(list.len());
            for w in list {
                let index = w.get();
                if index >= n_local {
                    return Err(MeshCouplingError::InvalidGeometry(format!(
                        "rank {proc} requested element {index}, only {n_local} are stored here"
                    )));
                }
                indices.push(index);
            }
            serves.push(indices);
        }
        let map_indices: Vec<usize> = serves.iter().flatten().copied().collect();
        debug!(
            "rank {}: distribution map with {} slots, serving {} requests",
            comm.rank(),
            owners.len(),
            map_indices.len()
        );
        Ok(Self {
            n_slots: owners.len(),
            n_local,
            requests,
            serves,
            map_indices,
        })
    }

    pub fn n_slots(&self) -> usize {
        self.n_slots
    }

    pub fn n_local(&self) -> usize {
        self.n_local
    }

    /// Local slots owned by process `proc`.
    pub fn requests(&self, proc: usize) -> &[usize] {
        &self.requests[proc]
    }

    /// Local elements served to process `proc`.
    pub fn serves(&self, proc: usize) -> &[usize] {
        &self.serves[proc]
    }

    /// Storage index of every value delivered by [`push`](Self::push), in
    /// delivery order.
    pub fn map_indices(&self) -> &[usize] {
        &self.map_indices
    }

    /// Collective: send one value per slot to its owner. The result lists what
    /// arrived here, aligned with [`map_indices`](Self::map_indices).
    pub fn push<T: Pod, C: Communicator>(
        &self,
        comm: &C,
        values: &[T],
    ) -> Result<Vec<T>, MeshCouplingError> {
        check_len(self.n_slots, values.len())?;
        let send: Vec<Vec<T>> = self
            .requests
            .iter()
            .map(|slots| slots.iter().map(|&s| values[s]).collect())
            .collect();
        let received = all_to_all(comm, PUSH_TAGS, &send)?;
        let out: Vec<T> = received.into_iter().flatten().collect();
        check_len(self.map_indices.len(), out.len())?;
        Ok(out)
    }

    /// Collective: fetch, for every slot, the owner's value of its element.
    pub fn pull<T: Pod, C: Communicator>(
        &self,
        comm: &C,
        storage: &[T],
    ) -> Result<Vec<T>, MeshCouplingError> {
        check_len(self.n_local, storage.len())?;
        let send: Vec<Vec<T>> = self
            .serves
            .iter()
            .map(|elems| elems.iter().map(|&e| storage[e]).collect())
            .collect();
        let received = all_to_all(comm, PULL_TAGS, &send)?;
        let mut out = vec![T::zeroed(); self.n_slots];
        for (proc, values) in received.iter().enumerate() {
            let slots = &self.requests[proc];
            if values.len() != slots.len() {
                return Err(MeshCouplingError::BufferSizeMismatch {
                    neighbor: proc,
                    expected: slots.len(),
                    got: values.len(),
                });
            }
            for (&slot, &v) in slots.iter().zip(values) {
                out[slot] = v;
            }
        }
        Ok(out)
    }

    /// Collective forward distribution with copy semantics.
    pub fn distribute<T: Pod + Send, C: Communicator>(
        &self,
        comm: &C,
        values: &[T],
    ) -> Result<Vec<T>, MeshCouplingError> {
        self.distribute_with::<T, CopyDelta, C>(comm, values)
    }

    /// Collective forward distribution: every slot value is restricted,
    /// shipped to its owner and fused into a zero-initialised storage in
    /// (source rank, slot) order.
    pub fn distribute_with<T, D, C>(&self, comm: &C, values: &[T]) -> Result<Vec<T>, MeshCouplingError>
    where
        T: Pod,
        D: Delta<T>,
        D::Part: Pod,
        C: Communicator,
    {
        let parts: Vec<D::Part> = values.iter().map(D::restrict).collect();
        let arrived = self.push(comm, &parts)?;
        let mut out = vec![T::zeroed(); self.n_local];
        for (&idx, part) in self.map_indices.iter().zip(arrived) {
            D::fuse(&mut out[idx], part);
        }
        Ok(out)
    }

    /// Collective reverse distribution: the owner's value for every slot.
    pub fn reverse_distribute<T: Pod, C: Communicator>(
        &self,
        comm: &C,
        storage: &[T],
    ) -> Result<Vec<T>, MeshCouplingError> {
        self.pull(comm, storage)
    }
}

fn check_len(expected: usize, got: usize) -> Result<(), MeshCouplingError> {
    if expected == got {
        Ok(())
    } else {
        Err(MeshCouplingError::FieldSizeMismatch { expected, got })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, RayonComm};
    use crate::coupling::delta::AddDelta;
    use std::thread;

    #[test]
    fn serial_map_relocates() {
        let map = DistributionMap::calc_mapping(&NoComm, &[(0, 2), (0, 0), (0, 2)], 3).unwrap();
        assert_eq!(map.map_indices(), &[2, 0, 2]);
        let out = map.distribute(&NoComm, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(out, vec![2.0, 0.0, 3.0]);
        let summed = map
            .distribute_with::<f64, AddDelta, _>(&NoComm, &[1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(summed, vec![2.0, 0.0, 4.0]);
        let back = map.reverse_distribute(&NoComm, &[7.0, 8.0, 9.0]).unwrap();
        assert_eq!(back, vec![9.0, 7.0, 9.0]);
    }

    #[test]
    fn summed_delivery_ignores_request_order() {
        use rand::SeedableRng;
        use rand::rngs::SmallRng;
        use rand::seq::SliceRandom;

        let owners: Vec<(usize, usize)> = (0..40).map(|i| (0, i % 7)).collect();
        let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let map = DistributionMap::calc_mapping(&NoComm, &owners, 7).unwrap();
        let want = map
            .distribute_with::<f64, AddDelta, _>(&NoComm, &values)
            .unwrap();

        let mut order: Vec<usize> = (0..40).collect();
        order.shuffle(&mut SmallRng::seed_from_u64(7));
        let shuffled_owners: Vec<_> = order.iter().map(|&k| owners[k]).collect();
        let shuffled_values: Vec<_> = order.iter().map(|&k| values[k]).collect();
        let map = DistributionMap::calc_mapping(&NoComm, &shuffled_owners, 7).unwrap();
        let got = map
            .distribute_with::<f64, AddDelta, _>(&NoComm, &shuffled_values)
            .unwrap();
        assert_eq!(got, want);
    }

    #[test]
    fn out_of_range_request_fails() {
        let err = DistributionMap::calc_mapping(&NoComm, &[(0, 5)], 2).unwrap_err();
        assert!(matches!(err, MeshCouplingError::InvalidGeometry(_)));
    }

    #[test]
    fn two_rank_swap() {
        let handles: Vec<_> = RayonComm::world(2)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let me = comm.rank();
                    let other = 1 - me;
                    // two local slots, both owned by the other rank, reversed
                    let map = DistributionMap::calc_mapping(&comm, &[(other, 1), (other, 0)], 2)
                        .unwrap();
                    let base = 10.0 * me as f64;
                    let moved = map.distribute(&comm, &[base, base + 1.0]).unwrap();
                    let back = map.reverse_distribute(&comm, &moved).unwrap();
                    (me, moved, back)
                })
            })
            .collect();
        for h in handles {
            let (me, moved, back) = h.join().unwrap();
            let base = 10.0 * (1 - me) as f64;
            assert_eq!(moved, vec![base + 1.0, base]);
            assert_eq!(back, vec![10.0 * me as f64, 10.0 * me as f64 + 1.0]);
        }
    }
}
