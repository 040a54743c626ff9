//! Fixed, little-endian wire types for the sample search and patch gathers.
//!
//! Field payloads moved by a [`DistributionMap`](crate::coupling::distribution_map::DistributionMap)
//! travel as raw `Pod` values; the records here carry the search protocol itself.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Number of following records.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A storage index (u64) carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireIndex {
    pub idx_le: u64,
}

impl WireIndex {
    pub fn of(idx: usize) -> Self {
        Self {
            idx_le: (idx as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.idx_le) as usize
    }
}

/// A point in space, coordinates stored as little-endian IEEE bits.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WirePoint {
    pub xyz_le: [u64; 3],
}

impl WirePoint {
    pub fn of(p: [f64; 3]) -> Self {
        Self {
            xyz_le: [
                p[0].to_bits().to_le(),
                p[1].to_bits().to_le(),
                p[2].to_bits().to_le(),
            ],
        }
    }
    pub fn get(&self) -> [f64; 3] {
        [
            f64::from_bits(u64::from_le(self.xyz_le[0])),
            f64::from_bits(u64::from_le(self.xyz_le[1])),
            f64::from_bits(u64::from_le(self.xyz_le[2])),
        ]
    }
}

/// Best local candidate for one query point, answered by a target-holding rank.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHit {
    pub dist2_le: u64,
    pub global_le: u64,
    pub local_le: u64,
    pub priority_le: u32,
    pub flags_le: u32,
}

impl WireHit {
    /// A candidate was found on the answering rank.
    pub const FOUND: u32 = 1;
    /// The matched element lies on a coupling-aware patch.
    pub const COUPLED: u32 = 2;

    pub fn miss() -> Self {
        Self::zeroed()
    }

    pub fn new(dist2: f64, global: usize, local: usize, priority: u32, coupled: bool) -> Self {
        let flags = Self::FOUND | (if coupled { Self::COUPLED } else { 0 });
        Self {
            dist2_le: dist2.to_bits().to_le(),
            global_le: (global as u64).to_le(),
            local_le: (local as u64).to_le(),
            priority_le: priority.to_le(),
            flags_le: flags.to_le(),
        }
    }

    pub fn found(&self) -> bool {
        u32::from_le(self.flags_le) & Self::FOUND != 0
    }
    pub fn coupled(&self) -> bool {
        u32::from_le(self.flags_le) & Self::COUPLED != 0
    }
    pub fn dist2(&self) -> f64 {
        f64::from_bits(u64::from_le(self.dist2_le))
    }
    pub fn global(&self) -> usize {
        u64::from_le(self.global_le) as usize
    }
    pub fn local(&self) -> usize {
        u64::from_le(self.local_le) as usize
    }
    pub fn priority(&self) -> u32 {
        u32::from_le(self.priority_le)
    }
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireIndex>(), 8);
const_assert_eq!(size_of::<WirePoint>(), 24);
const_assert_eq!(size_of::<WireHit>(), 32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_hit() {
        let v = vec![WireHit::new(0.25, 17, 3, 1, true), WireHit::miss()];
        let bytes: Vec<u8> = cast_slice(&v).to_vec();
        let mut out = vec![WireHit::zeroed(); v.len()];
        cast_slice_mut(&mut out).copy_from_slice(&bytes);
        assert!(out[0].found());
        assert!(out[0].coupled());
        assert_eq!(out[0].dist2(), 0.25);
        assert_eq!((out[0].global(), out[0].local(), out[0].priority()), (17, 3, 1));
        assert!(!out[1].found());
    }

    #[test]
    fn point_bits_survive() {
        let p = [-1.5, 0.1, f64::MIN_POSITIVE];
        assert_eq!(WirePoint::of(p).get(), p);
    }
}
