//! Delta trait: rules for fusing data arriving at a target element

use crate::coupling::field::FieldValue;

/// *Delta* encapsulates restriction & fusion for a coupled value `V`.
pub trait Delta<V>: Sized {
    /// What travels for one sample (often identical to `V`).
    type Part: Send;

    /// Extract the part of `v` that is sent to the sample owner.
    fn restrict(v: &V) -> Self::Part;

    /// Merge an incoming part into the target value.
    fn fuse(local: &mut V, incoming: Self::Part);
}

/// Copy-overwrites-target. Several samples hitting one element leave the last
/// one in arrival order.
#[derive(Copy, Clone, Debug, Default)]
pub struct CopyDelta;

impl<V: Clone + Send> Delta<V> for CopyDelta {
    type Part = V;
    #[inline]
    fn restrict(v: &V) -> V {
        v.clone()
    }
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        *local = incoming;
    }
}

/// Sums every sample hitting an element.
#[derive(Copy, Clone, Debug, Default)]
pub struct AddDelta;

impl<V: FieldValue> Delta<V> for AddDelta {
    type Part = V;
    #[inline]
    fn restrict(v: &V) -> V {
        *v
    }
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        local.accumulate(incoming);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_overwrites_and_add_sums() {
        let mut v = 1.0_f64;
        <CopyDelta as Delta<f64>>::fuse(&mut v, 3.0);
        assert_eq!(v, 3.0);
        <AddDelta as Delta<f64>>::fuse(&mut v, 2.0);
        assert_eq!(v, 5.0);
    }
}
