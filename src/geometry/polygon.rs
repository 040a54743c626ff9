//! Polygon geometry for mesh faces: centres and area vectors, local plane
//! frames, convex clipping and bounding boxes.
//!
//! Faces are arbitrary planar-ish polygons given as ordered vertex lists; the
//! right-hand rule over the vertex order defines the face normal.

use crate::geometry::vector::{
    VSMALL, Vec3, add, average, cross, dot, norm, normalized, scale, sub,
};
use crate::mesh_error::MeshCouplingError;

/// Relative tolerance below which clipped areas are discarded.
pub const AREA_TOL: f64 = 1e-12;

/// Centre and area vector of a polygon.
///
/// Triangles are evaluated directly. Larger polygons are split into triangles
/// about the vertex average; the centre is the area-weighted mean of the
/// triangle centroids and the area vector the sum of triangle area vectors.
pub fn face_centre_and_area(points: &[Vec3]) -> Result<(Vec3, Vec3), MeshCouplingError> {
    match points.len() {
        0..=2 => Err(MeshCouplingError::InvalidGeometry(format!(
            "face has {} vertices, at least 3 are required",
            points.len()
        ))),
        3 => {
            let centre = average(points);
            let area = scale(
                cross(sub(points[1], points[0]), sub(points[2], points[0])),
                0.5,
            );
            Ok((centre, area))
        }
        n => {
            let avg = average(points);
            let mut sum_n = [0.0; 3];
            let mut sum_a = 0.0;
            let mut sum_ac = [0.0; 3];
            for i in 0..n {
                let p = points[i];
                let q = points[(i + 1) % n];
                let c = scale(add(add(p, q), avg), 1.0 / 3.0);
                let tri_n = cross(sub(q, p), sub(avg, p));
                let a = norm(tri_n);
                sum_n = add(sum_n, tri_n);
                sum_a += a;
                sum_ac = add(sum_ac, scale(c, a));
            }
            let centre = if sum_a > VSMALL {
                scale(sum_ac, 1.0 / sum_a)
            } else {
                avg
            };
            Ok((centre, scale(sum_n, 0.5)))
        }
    }
}

/// Orthonormal frame `(u, v, n)` on a plane through `origin`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlaneFrame {
    pub origin: Vec3,
    pub u: Vec3,
    pub v: Vec3,
    pub normal: Vec3,
}

impl PlaneFrame {
    /// Frame with the given (not necessarily unit) normal; `u × v = n̂`.
    pub fn new(origin: Vec3, normal: Vec3) -> Result<Self, MeshCouplingError> {
        let n = normalized(normal).ok_or_else(|| {
            MeshCouplingError::InvalidGeometry("plane normal has zero length".into())
        })?;
        // Seed with the axis least aligned to the normal.
        let seed = if n[0].abs() <= n[1].abs() && n[0].abs() <= n[2].abs() {
            [1.0, 0.0, 0.0]
        } else if n[1].abs() <= n[2].abs() {
            [0.0, 1.0, 0.0]
        } else {
            [0.0, 0.0, 1.0]
        };
        let u = normalized(sub(seed, scale(n, dot(seed, n)))).ok_or_else(|| {
            MeshCouplingError::InvalidGeometry("degenerate plane frame".into())
        })?;
        let v = cross(n, u);
        Ok(Self {
            origin,
            u,
            v,
            normal: n,
        })
    }

    /// Orthogonal projection of `p` into plane coordinates.
    pub fn to_2d(&self, p: Vec3) -> [f64; 2] {
        let d = sub(p, self.origin);
        [dot(d, self.u), dot(d, self.v)]
    }

    /// Point on the plane with plane coordinates `q`.
    pub fn to_3d(&self, q: [f64; 2]) -> Vec3 {
        add(self.origin, add(scale(self.u, q[0]), scale(self.v, q[1])))
    }

    /// Signed height of `p` above the plane.
    pub fn height(&self, p: Vec3) -> f64 {
        dot(sub(p, self.origin), self.normal)
    }
}

/// Shoelace area, positive for counter-clockwise polygons.
pub fn signed_area_2d(poly: &[[f64; 2]]) -> f64 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        twice += a[0] * b[1] - b[0] * a[1];
    }
    0.5 * twice
}

/// Area centroid of a simple polygon (vertex mean when degenerate).
pub fn centroid_2d(poly: &[[f64; 2]]) -> [f64; 2] {
    let n = poly.len();
    let area = signed_area_2d(poly);
    if n == 0 {
        return [0.0; 2];
    }
    if area.abs() <= VSMALL {
        let s = poly
            .iter()
            .fold([0.0; 2], |acc, p| [acc[0] + p[0], acc[1] + p[1]]);
        return [s[0] / n as f64, s[1] / n as f64];
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let w = a[0] * b[1] - b[0] * a[1];
        cx += (a[0] + b[0]) * w;
        cy += (a[1] + b[1]) * w;
    }
    [cx / (6.0 * area), cy / (6.0 * area)]
}

/// Reorder in place so the polygon is counter-clockwise.
pub fn ensure_ccw(poly: &mut [[f64; 2]]) {
    if signed_area_2d(poly) < 0.0 {
        poly.reverse();
    }
}

/// Sutherland–Hodgman: clip `subject` against the convex, counter-clockwise
/// polygon `clip`. Returns the (possibly empty) intersection polygon.
pub fn clip_convex(subject: &[[f64; 2]], clip: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut output: Vec<[f64; 2]> = subject.to_vec();
    let m = clip.len();
    for i in 0..m {
        if output.is_empty() {
            break;
        }
        let a = clip[i];
        let b = clip[(i + 1) % m];
        let input = std::mem::take(&mut output);
        let side = |p: [f64; 2]| (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0]);
        let k = input.len();
        for j in 0..k {
            let cur = input[j];
            let prev = input[(j + k - 1) % k];
            let s_cur = side(cur);
            let s_prev = side(prev);
            if s_cur >= 0.0 {
                if s_prev < 0.0 {
                    output.push(edge_intersection(prev, cur, s_prev, s_cur));
                }
                output.push(cur);
            } else if s_prev >= 0.0 {
                output.push(edge_intersection(prev, cur, s_prev, s_cur));
            }
        }
    }
    output
}

fn edge_intersection(p: [f64; 2], q: [f64; 2], sp: f64, sq: f64) -> [f64; 2] {
    let t = sp / (sp - sq);
    [p[0] + t * (q[0] - p[0]), p[1] + t * (q[1] - p[1])]
}

/// Split a polygon into triangles fanned about `centre`.
pub fn fan_triangles(points: &[Vec3], centre: Vec3) -> Vec<[Vec3; 3]> {
    let n = points.len();
    (0..n)
        .map(|i| [points[i], points[(i + 1) % n], centre])
        .collect()
}

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundBox {
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for p in points {
            for d in 0..3 {
                min[d] = min[d].min(p[d]);
                max[d] = max[d].max(p[d]);
            }
        }
        Self { min, max }
    }

    /// Grow by `delta` in every direction.
    pub fn inflated(&self, delta: f64) -> Self {
        Self {
            min: [self.min[0] - delta, self.min[1] - delta, self.min[2] - delta],
            max: [self.max[0] + delta, self.max[1] + delta, self.max[2] + delta],
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        (0..3).all(|d| p[d] >= self.min[d] && p[d] <= self.max[d])
    }

    pub fn overlaps(&self, other: &BoundBox) -> bool {
        (0..3).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
    }

    pub fn span(&self) -> f64 {
        norm(sub(self.max, self.min))
    }
}
