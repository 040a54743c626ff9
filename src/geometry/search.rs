//! R-tree backed spatial queries: nearest point and box containment.
//!
//! Both indices report candidates by their position in the slice they were
//! built from. Results are deterministic: ties are broken towards the smallest
//! index.

use crate::geometry::polygon::BoundBox;
use crate::geometry::vector::Vec3;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree, RTreeObject};

type IndexedPoint = GeomWithData<Vec3, usize>;

/// Nearest-neighbour index over a point set.
pub struct PointSearch {
    tree: RTree<IndexedPoint>,
}

impl PointSearch {
    pub fn new(points: &[Vec3]) -> Self {
        let items = points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new(*p, i))
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Nearest indexed point to `p` as `(index, squared distance)`; among
    /// equidistant points the smallest index wins.
    pub fn nearest(&self, p: Vec3) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (item, d2) in self.tree.nearest_neighbor_iter_with_distance_2(&p) {
            match best {
                Some((_, best_d2)) if d2 > best_d2 => break,
                Some((best_idx, _)) if item.data >= best_idx => {}
                _ => best = Some((item.data, d2)),
            }
        }
        best
    }
}

/// Indexed axis-aligned box for the r-tree.
#[derive(Clone, Debug)]
struct IndexedBox {
    index: usize,
    bounds: BoundBox,
}

impl RTreeObject for IndexedBox {
    type Envelope = AABB<Vec3>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bounds.min, self.bounds.max)
    }
}

/// Box index answering containment and overlap queries.
pub struct BoxSearch {
    tree: RTree<IndexedBox>,
}

impl BoxSearch {
    pub fn new(boxes: &[BoundBox]) -> Self {
        let items = boxes
            .iter()
            .enumerate()
            .map(|(index, bounds)| IndexedBox {
                index,
                bounds: *bounds,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Indices of boxes containing `p`, ascending.
    pub fn containing(&self, p: Vec3) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point(p))
            .map(|b| b.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Indices of boxes overlapping `bounds`, ascending.
    pub fn overlapping(&self, bounds: &BoundBox) -> Vec<usize> {
        let query = AABB::from_corners(bounds.min, bounds.max);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|b| b.index)
            .collect();
        hits.sort_unstable();
        hits
    }
}
