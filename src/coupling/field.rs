//! Per-element payloads that can be moved and weighted across a coupling.

use bytemuck::Pod;

/// A value carried by a coupled field.
///
/// Direct couplings only need the value to travel as plain bytes. Weighted
/// couplings (area-weighted interpolation, face intersection) also scale and
/// sum values.
pub trait FieldValue: Pod + Send + Sync + 'static {
    /// The value multiplied by weight `w`.
    fn scaled(self, w: f64) -> Self;
    /// `self += other`.
    fn accumulate(&mut self, other: Self);
}

impl FieldValue for f64 {
    #[inline]
    fn scaled(self, w: f64) -> Self {
        self * w
    }
    #[inline]
    fn accumulate(&mut self, other: Self) {
        *self += other;
    }
}

impl FieldValue for f32 {
    #[inline]
    fn scaled(self, w: f64) -> Self {
        (f64::from(self) * w) as f32
    }
    #[inline]
    fn accumulate(&mut self, other: Self) {
        *self += other;
    }
}

impl<const N: usize> FieldValue for [f64; N] {
    #[inline]
    fn scaled(mut self, w: f64) -> Self {
        for x in &mut self {
            *x *= w;
        }
        self
    }
    #[inline]
    fn accumulate(&mut self, other: Self) {
        for (x, y) in self.iter_mut().zip(other) {
            *x += y;
        }
    }
}

impl<const N: usize> FieldValue for [f32; N] {
    #[inline]
    fn scaled(mut self, w: f64) -> Self {
        for x in &mut self {
            *x = (f64::from(*x) * w) as f32;
        }
        self
    }
    #[inline]
    fn accumulate(&mut self, other: Self) {
        for (x, y) in self.iter_mut().zip(other) {
            *x += y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_values_scale_componentwise() {
        let mut v = [1.0, -2.0, 4.0].scaled(0.5);
        assert_eq!(v, [0.5, -1.0, 2.0]);
        v.accumulate([1.0; 3]);
        assert_eq!(v, [1.5, 0.0, 3.0]);
    }
}
