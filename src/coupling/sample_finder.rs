//! Global nearest-element search.
//!
//! For every local sample point, find the process and local storage index of
//! the target element that owns it, considering the candidates of every
//! process. The search is collective:
//!
//! 1. local storage sizes are gathered into a [`GlobalIndex`];
//! 2. all sample points are gathered to every process;
//! 3. each process ranks its own best candidate for every point;
//! 4. candidates travel back to the process owning the point, which keeps the
//!    minimum of `(priority, distance², global index)`.

use crate::algs::communicator::{CommTag, CommTags, Communicator};
use crate::algs::exchange::{all_gather, all_to_all};
use crate::algs::wire::{WireCount, WireHit, WirePoint};
use crate::geometry::polygon::BoundBox;
use crate::geometry::search::{BoxSearch, PointSearch};
use crate::geometry::vector::{Vec3, distance_sqr};
use crate::mesh::poly_mesh::PolyMesh;
use crate::mesh_error::MeshCouplingError;
use log::{debug, warn};
use std::cmp::Ordering;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

const SIZE_TAGS: CommTags = CommTags::from_base(CommTag::new(0xA100));
const POINT_TAGS: CommTags = CommTags::from_base(CommTag::new(0xA110));
const HIT_TAGS: CommTags = CommTags::from_base(CommTag::new(0xA120));

/// Contiguous global numbering of per-process storage, in rank order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalIndex {
    offsets: Vec<usize>,
}

impl GlobalIndex {
    /// Collective: every process contributes its local size.
    pub fn new<C: Communicator>(local_size: usize, comm: &C) -> Result<Self, MeshCouplingError> {
        Self::with_tags(local_size, comm, SIZE_TAGS)
    }

    pub(crate) fn with_tags<C: Communicator>(
        local_size: usize,
        comm: &C,
        tags: CommTags,
    ) -> Result<Self, MeshCouplingError> {
        let sizes = all_gather(comm, tags, &[WireCount::new(local_size)])?;
        Ok(Self::from_sizes(
            sizes.iter().map(|s| s.first().map_or(0, WireCount::get)),
        ))
    }

    /// Numbering over known per-process sizes.
    pub fn from_sizes(sizes: impl IntoIterator<Item = usize>) -> Self {
        let mut offsets = vec![0];
        for s in sizes {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + s);
        }
        Self { offsets }
    }

    pub fn n_procs(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total size over all processes.
    pub fn size(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn local_size(&self, proc: usize) -> usize {
        self.offsets[proc + 1] - self.offsets[proc]
    }

    pub fn offset(&self, proc: usize) -> usize {
        self.offsets[proc]
    }

    pub fn to_global(&self, proc: usize, local: usize) -> usize {
        self.offsets[proc] + local
    }

    /// Process owning global index `global`.
    pub fn which_proc(&self, global: usize) -> usize {
        // first offset strictly above `global`, minus one
        self.offsets.partition_point(|&o| o <= global) - 1
    }

    pub fn to_local(&self, global: usize) -> (usize, usize) {
        let proc = self.which_proc(global);
        (proc, global - self.offsets[proc])
    }
}

/// Storage the samples are matched against.
#[derive(Copy, Clone, Debug)]
pub enum SampleTarget<'a> {
    /// Cells of a region.
    Cells(&'a PolyMesh),
    /// Every boundary face of a region, indexed from the first boundary face.
    BoundaryFaces(&'a PolyMesh),
    /// Faces of one patch, indexed from the patch start.
    PatchFaces(&'a PolyMesh, usize),
}

impl SampleTarget<'_> {
    /// Local storage size.
    pub fn local_size(&self) -> usize {
        match self {
            SampleTarget::Cells(m) => m.n_cells(),
            SampleTarget::BoundaryFaces(m) => m.n_boundary_faces(),
            SampleTarget::PatchFaces(m, p) => m.patch(*p).size(),
        }
    }

    fn describe(&self) -> String {
        match self {
            SampleTarget::Cells(m) => format!("cells in region `{}`", m.name()),
            SampleTarget::BoundaryFaces(m) => format!("boundary faces in region `{}`", m.name()),
            SampleTarget::PatchFaces(m, p) => format!(
                "faces on patch `{}` of region `{}`",
                m.patch(*p).name(),
                m.name()
            ),
        }
    }
}

/// Match of one sample point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sample {
    /// Process owning the matched element.
    pub proc: usize,
    /// Storage index of the element on `proc`.
    pub index: usize,
    /// Global index of the element.
    pub global: usize,
    /// Squared distance from the sample point to the element's centre.
    pub dist2: f64,
    /// The point lies in no cell and was given the nearest cell centre.
    pub fallback: bool,
    /// The matched boundary face lies on a coupling-aware patch.
    pub coupled: bool,
}

/// Result of a global search: one [`Sample`] per local sample point.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSet {
    pub samples: Vec<Sample>,
    pub global_index: GlobalIndex,
}

impl SampleSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Matched storage index on the owning process, per sample.
    pub fn indices(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.index).collect()
    }

    /// `(process, storage index)` per sample.
    pub fn owners(&self) -> Vec<(usize, usize)> {
        self.samples.iter().map(|s| (s.proc, s.index)).collect()
    }
}

/// Local candidate index over one kind of target storage.
enum LocalSearch<'a> {
    Cells {
        mesh: &'a PolyMesh,
        centres: PointSearch,
        boxes: BoxSearch,
    },
    Faces {
        mesh: &'a PolyMesh,
        /// Mesh face index of storage index 0.
        start: usize,
        /// Storage index of each search candidate.
        candidates: Vec<usize>,
        centres: PointSearch,
    },
}

impl<'a> LocalSearch<'a> {
    fn new(target: SampleTarget<'a>) -> Self {
        match target {
            SampleTarget::Cells(mesh) => {
                let boxes: Vec<BoundBox> = (0..mesh.n_cells())
                    .map(|c| {
                        let b = mesh.cell_bounds(c);
                        b.inflated(1e-9 * b.span())
                    })
                    .collect();
                LocalSearch::Cells {
                    mesh,
                    centres: PointSearch::new(mesh.cell_centres()),
                    boxes: BoxSearch::new(&boxes),
                }
            }
            SampleTarget::BoundaryFaces(mesh) => {
                // cut faces are interior to the region
                let start = mesh.n_internal_faces();
                let candidates: Vec<usize> = mesh
                    .patches()
                    .iter()
                    .filter(|p| !p.is_processor())
                    .flat_map(|p| p.range())
                    .map(|f| f - start)
                    .collect();
                let centres: Vec<Vec3> = candidates
                    .iter()
                    .map(|&b| mesh.face_centres()[start + b])
                    .collect();
                LocalSearch::Faces {
                    mesh,
                    start,
                    candidates,
                    centres: PointSearch::new(&centres),
                }
            }
            SampleTarget::PatchFaces(mesh, patch) => {
                let range = mesh.patch(patch).range();
                LocalSearch::Faces {
                    mesh,
                    start: range.start,
                    candidates: (0..range.len()).collect(),
                    centres: PointSearch::new(&mesh.face_centres()[range]),
                }
            }
        }
    }

    /// Best local candidate for `p`, ranked with the global index of `offset`.
    fn best(&self, p: Vec3, offset: usize) -> WireHit {
        match self {
            LocalSearch::Cells {
                mesh,
                centres,
                boxes,
            } => {
                let inside = boxes
                    .containing(p)
                    .into_iter()
                    .filter(|&c| mesh.point_in_cell(p, c))
                    .map(|c| (c, distance_sqr(p, mesh.cell_centres()[c])))
                    .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                if let Some((c, d2)) = inside {
                    return WireHit::new(d2, offset + c, c, 0, false);
                }
                match centres.nearest(p) {
                    Some((c, d2)) => WireHit::new(d2, offset + c, c, 1, false),
                    None => WireHit::miss(),
                }
            }
            LocalSearch::Faces {
                mesh,
                start,
                candidates,
                centres,
            } => match centres.nearest(p) {
                Some((k, d2)) => {
                    let i = candidates[k];
                    let coupled = mesh
                        .which_patch(start + i)
                        .is_some_and(|pi| mesh.patch(pi).is_coupled());
                    WireHit::new(d2, offset + i, i, 0, coupled)
                }
                None => WireHit::miss(),
            },
        }
    }
}

fn rank_hits(a: &WireHit, b: &WireHit) -> Ordering {
    a.priority()
        .cmp(&b.priority())
        .then(a.dist2().total_cmp(&b.dist2()))
        .then(a.global().cmp(&b.global()))
}

/// Collective search: match every point of `points` against `target`.
///
/// `patch` and `region` name the local coupled patch for error reporting.
pub fn find_samples<C: Communicator>(
    comm: &C,
    points: &[Vec3],
    target: SampleTarget<'_>,
    patch: &str,
    region: &str,
) -> Result<SampleSet, MeshCouplingError> {
    let me = comm.rank();
    let global_index = GlobalIndex::new(target.local_size(), comm)?;
    if global_index.size() == 0 {
        return Err(MeshCouplingError::EmptySampleTarget {
            patch: patch.to_owned(),
            region: region.to_owned(),
            target: target.describe(),
        });
    }

    let wire: Vec<WirePoint> = points.iter().map(|p| WirePoint::of(*p)).collect();
    let all_points = all_gather(comm, POINT_TAGS, &wire)?;

    let search = LocalSearch::new(target);
    let offset = global_index.offset(me);
    let replies: Vec<Vec<WireHit>> = all_points
        .iter()
        .map(|pts| {
            #[cfg(feature = "rayon")]
            let hits: Vec<WireHit> = pts.par_iter().map(|p| search.best(p.get(), offset)).collect();
            #[cfg(not(feature = "rayon"))]
            let hits: Vec<WireHit> = pts.iter().map(|p| search.best(p.get(), offset)).collect();
            hits
        })
        .collect();
    let candidates = all_to_all(comm, HIT_TAGS, &replies)?;

    let mut samples = Vec::with_capacity(points.len());
    for (i, point) in points.iter().enumerate() {
        let best = candidates
            .iter()
            .filter_map(|from| from.get(i))
            .filter(|h| h.found())
            .min_by(|a, b| rank_hits(a, b))
            .ok_or_else(|| {
                MeshCouplingError::InvalidGeometry(format!(
                    "no process matched sample point {point:?} of patch `{patch}` in region `{region}`"
                ))
            })?;
        let proc = global_index.which_proc(best.global());
        samples.push(Sample {
            proc,
            index: best.local(),
            global: best.global(),
            dist2: best.dist2(),
            fallback: best.priority() > 0,
            coupled: best.coupled(),
        });
    }

    let outside = samples.iter().filter(|s| s.fallback).count();
    if outside > 0 {
        warn!(
            "patch `{patch}` of region `{region}`: {outside} of {} sample points lie outside every cell of the target region; using the nearest cell centre",
            samples.len()
        );
    }
    debug!(
        "patch `{patch}` of region `{region}`: matched {} samples against {} {}",
        samples.len(),
        global_index.size(),
        target.describe()
    );
    Ok(SampleSet {
        samples,
        global_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::mesh::block::BlockMesh;

    #[test]
    fn global_index_lookup() {
        let g = GlobalIndex::from_sizes([3, 0, 2]);
        assert_eq!(g.size(), 5);
        assert_eq!(g.to_global(2, 1), 4);
        assert_eq!(g.to_local(3), (2, 0));
        assert_eq!(g.to_local(2), (0, 2));
        assert_eq!(g.local_size(1), 0);
    }

    #[test]
    fn cells_contain_points_or_fall_back() {
        let mesh = BlockMesh::new("box", [0.0; 3], [2.0, 1.0, 1.0], [2, 1, 1])
            .build()
            .unwrap();
        let set = find_samples(
            &NoComm,
            &[[1.5, 0.5, 0.5], [0.1, 0.9, 0.1], [5.0, 0.5, 0.5]],
            SampleTarget::Cells(&mesh),
            "p",
            "r",
        )
        .unwrap();
        assert_eq!(set.indices(), vec![1, 0, 1]);
        assert!(!set.samples[0].fallback);
        assert!(set.samples[2].fallback);
    }

    #[test]
    fn empty_target_is_reported() {
        let mesh = BlockMesh::new("box", [0.0; 3], [1.0; 3], [2, 1, 1])
            .decompose_x(2, 1)
            .unwrap();
        let xmin = mesh.find_patch("xMin").unwrap();
        let err = find_samples(
            &NoComm,
            &[[0.0; 3]],
            SampleTarget::PatchFaces(&mesh, xmin),
            "p",
            "r",
        )
        .unwrap_err();
        assert!(matches!(err, MeshCouplingError::EmptySampleTarget { .. }));
    }

    #[test]
    fn boundary_faces_skip_decomposition_cuts() {
        let piece = BlockMesh::new("box", [0.0; 3], [2.0, 1.0, 1.0], [2, 1, 1])
            .decompose_x(2, 0)
            .unwrap();
        let set = find_samples(
            &NoComm,
            &[[0.95, 0.5, 0.5]],
            SampleTarget::BoundaryFaces(&piece),
            "p",
            "r",
        )
        .unwrap();
        // storage stays indexed over every boundary face, cut included
        assert_eq!(set.global_index.size(), piece.n_boundary_faces());
        let face = piece.n_internal_faces() + set.indices()[0];
        let patch = piece.patch(piece.which_patch(face).unwrap());
        assert!(!patch.is_processor());
        assert_eq!(patch.name(), "yMin");
    }
}
