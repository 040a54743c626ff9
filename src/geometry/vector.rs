//! Small `[f64; 3]` vector algebra used throughout the geometry code.

pub type Vec3 = [f64; 3];

/// Lengths below this are treated as zero.
pub const VSMALL: f64 = 1e-300;

#[inline]
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn mag_sqr(a: Vec3) -> f64 {
    dot(a, a)
}

#[inline]
pub fn norm(a: Vec3) -> f64 {
    mag_sqr(a).sqrt()
}

#[inline]
pub fn distance_sqr(a: Vec3, b: Vec3) -> f64 {
    mag_sqr(sub(a, b))
}

/// Unit vector along `a`, or `None` for a (near) zero vector.
pub fn normalized(a: Vec3) -> Option<Vec3> {
    let n = norm(a);
    if n > VSMALL { Some(scale(a, 1.0 / n)) } else { None }
}

/// Arithmetic mean of a point set.
pub fn average(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return [0.0; 3];
    }
    let sum = points.iter().fold([0.0; 3], |acc, p| add(acc, *p));
    scale(sum, 1.0 / points.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_follows_right_hand_rule() {
        assert_eq!(cross([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
        assert_eq!(cross([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(normalized([0.0; 3]).is_none());
        assert_eq!(normalized([0.0, 3.0, 0.0]), Some([0.0, 1.0, 0.0]));
    }
}
