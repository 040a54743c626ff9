//! Analytic projection surfaces for area-weighted interpolation.
//!
//! Both sides of a curved interface are snapped onto one of these before
//! overlap areas are computed, so that faces which do not quite touch still
//! see each other.

use crate::geometry::vector::{VSMALL, Vec3, add, dot, norm, normalized, scale, sub};
use crate::mesh_error::MeshCouplingError;
use serde::{Deserialize, Serialize};

/// Surface description as read from the `surface` sub-dictionary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", deny_unknown_fields)]
pub enum ProjectionSurface {
    Plane { point: Vec3, normal: Vec3 },
    Sphere { centre: Vec3, radius: f64 },
    Cylinder { point1: Vec3, point2: Vec3, radius: f64 },
}

impl ProjectionSurface {
    /// Reject degenerate descriptions before any projection happens.
    pub fn validate(&self) -> Result<(), MeshCouplingError> {
        match self {
            ProjectionSurface::Plane { normal, .. } if normalized(*normal).is_none() => Err(
                MeshCouplingError::InvalidGeometry("plane surface with zero normal".into()),
            ),
            ProjectionSurface::Sphere { radius, .. } | ProjectionSurface::Cylinder { radius, .. }
                if !(*radius > 0.0 && radius.is_finite()) =>
            {
                Err(MeshCouplingError::InvalidGeometry(format!(
                    "projection surface radius must be positive, got {radius}"
                )))
            }
            ProjectionSurface::Cylinder { point1, point2, .. }
                if normalized(sub(*point2, *point1)).is_none() =>
            {
                Err(MeshCouplingError::InvalidGeometry(
                    "cylinder surface with coincident axis points".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Nearest point on the surface. Points on a sphere centre or a cylinder
    /// axis have no unique nearest point and are returned unchanged.
    pub fn project(&self, p: Vec3) -> Vec3 {
        match self {
            ProjectionSurface::Plane { point, normal } => match normalized(*normal) {
                Some(n) => sub(p, scale(n, dot(sub(p, *point), n))),
                None => p,
            },
            ProjectionSurface::Sphere { centre, radius } => {
                let d = sub(p, *centre);
                let r = norm(d);
                if r > VSMALL {
                    add(*centre, scale(d, radius / r))
                } else {
                    p
                }
            }
            ProjectionSurface::Cylinder {
                point1,
                point2,
                radius,
            } => {
                let Some(axis) = normalized(sub(*point2, *point1)) else {
                    return p;
                };
                let foot = add(*point1, scale(axis, dot(sub(p, *point1), axis)));
                let radial = sub(p, foot);
                let r = norm(radial);
                if r > VSMALL {
                    add(foot, scale(radial, radius / r))
                } else {
                    p
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_projection_drops_normal_component() {
        let s = ProjectionSurface::Plane {
            point: [0.0, 0.0, 1.0],
            normal: [0.0, 0.0, 2.0],
        };
        assert_eq!(s.project([0.5, 0.25, 3.0]), [0.5, 0.25, 1.0]);
    }

    #[test]
    fn cylinder_projection_keeps_axial_position() {
        let s = ProjectionSurface::Cylinder {
            point1: [0.0; 3],
            point2: [0.0, 0.0, 1.0],
            radius: 2.0,
        };
        let q = s.project([1.0, 0.0, 5.0]);
        assert!((q[0] - 2.0).abs() < 1e-12 && q[1].abs() < 1e-12 && (q[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn sphere_rejects_negative_radius() {
        let s = ProjectionSurface::Sphere {
            centre: [0.0; 3],
            radius: -1.0,
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn cylinder_rejects_nan_radius() {
        let s = ProjectionSurface::Cylinder {
            point1: [0.0; 3],
            point2: [0.0, 0.0, 1.0],
            radius: f64::NAN,
        };
        assert!(s.validate().is_err());
    }
}
