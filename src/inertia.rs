use std::ops::{Add, AddAssign};

use na::{Isometry3, Matrix3, Point3, Vector3};

use crate::types::Float;

/// A spatial inertia, or inertia matrix, represents the mass distribution of a
/// rigid body.
/// A spatial inertia expressed in frame i is defined as:
/// I^i = | J         c_hat |
///       | c_hat^T     mI  |
/// where J is the mass moment of inertia, m is the total mass, and c is the
/// 'cross part', which is the center of mass position scaled by m.
///
/// !!! Warning
///     The __moment__ field of a __SpatialInertia__ is the moment of inertia
///     about the origin of its frame, not about the center of mass.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialInertia {
    pub moment: Matrix3<Float>,
    pub cross_part: Vector3<Float>,
    pub mass: Float,
}

impl SpatialInertia {
    pub fn new(moment: Matrix3<Float>, cross_part: Vector3<Float>, mass: Float) -> Self {
        SpatialInertia {
            moment,
            cross_part,
            mass,
        }
    }

    pub fn zero() -> Self {
        SpatialInertia {
            moment: Matrix3::zeros(),
            cross_part: Vector3::zeros(),
            mass: 0.,
        }
    }

    /// Build a spatial inertia from a mass located at `com` with rotational
    /// inertia `moment_com` taken about the center of mass.
    /// Parallel axis theorem: J = J_com + m * (|c|^2 I - c c^T)
    pub fn from_com(mass: Float, com: &Vector3<Float>, moment_com: &Matrix3<Float>) -> Self {
        let shift = mass * (com.norm_squared() * Matrix3::identity() - com * com.transpose());
        SpatialInertia {
            moment: moment_com + shift,
            cross_part: mass * com,
            mass,
        }
    }

    pub fn center_of_mass(&self) -> Point3<Float> {
        if self.mass == 0. {
            return Point3::origin();
        }
        Point3::from(self.cross_part / self.mass)
    }

    /// Transform the spatial inertia to be expressed in the destination frame
    /// of `iso`.
    pub fn transform(&self, iso: &Isometry3<Float>) -> SpatialInertia {
        let R = iso.rotation.to_rotation_matrix().into_inner();
        let p = iso.translation.vector;

        let J = self.moment;
        let mc = self.cross_part;
        let m = self.mass;

        let Rmc = R * mc;
        let mp = m * p;
        let X = Rmc * p.transpose();
        let Y = X + X.transpose() + mp * p.transpose();
        let Jnew = R * J * R.transpose() - Y + Y.trace() * Matrix3::identity();

        SpatialInertia {
            moment: Jnew,
            cross_part: Rmc + mp,
            mass: m,
        }
    }

    /// Multiply the spatial inertia with a spatial motion vector, giving the
    /// spatial momentum (or force):
    /// | J         c_hat | | w |   | Jw        + c_hat v |
    /// | c_hat^T   m     | | v | = | c_hat^T w + mv      |
    pub fn mul_motion(
        &self,
        w: &Vector3<Float>,
        v: &Vector3<Float>,
    ) -> (Vector3<Float>, Vector3<Float>) {
        let angular = self.moment * w + self.cross_part.cross(v);
        let linear = self.mass * v - self.cross_part.cross(w);
        (angular, linear)
    }
}

impl<'a, 'b> Add<&'b SpatialInertia> for &'a SpatialInertia {
    type Output = SpatialInertia;

    fn add(self, rhs: &SpatialInertia) -> SpatialInertia {
        SpatialInertia {
            moment: self.moment + rhs.moment,
            cross_part: self.cross_part + rhs.cross_part,
            mass: self.mass + rhs.mass,
        }
    }
}

impl<'b> AddAssign<&'b SpatialInertia> for SpatialInertia {
    fn add_assign(&mut self, rhs: &Self) {
        self.moment += rhs.moment;
        self.cross_part += rhs.cross_part;
        self.mass += rhs.mass;
    }
}

#[cfg(test)]
mod inertia_tests {
    use na::{vector, Translation3, UnitQuaternion};

    use crate::{assert_close, PI};

    use super::*;

    #[test]
    fn point_mass_moment_about_origin() {
        // Arrange
        let m = 2.0;
        let c = vector![0., 0., -3.];

        // Act
        let inertia = SpatialInertia::from_com(m, &c, &Matrix3::zeros());

        // Assert
        assert_close!(inertia.moment[(0, 0)], m * 9., 1e-12);
        assert_close!(inertia.moment[(1, 1)], m * 9., 1e-12);
        assert_close!(inertia.moment[(2, 2)], 0., 1e-12);
        assert_eq!(inertia.center_of_mass(), Point3::new(0., 0., -3.));
    }

    /// Moving a point mass must agree with building it directly at the new
    /// location.
    #[test]
    fn transform_matches_direct_construction() {
        // Arrange
        let m = 3.0;
        let c = vector![1., 0., 0.];
        let inertia = SpatialInertia::from_com(m, &c, &Matrix3::zeros());
        let iso = Isometry3::from_parts(
            Translation3::new(0., 2., 0.),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.),
        );

        // Act
        let moved = inertia.transform(&iso);

        // Assert
        let c_new = iso * Point3::from(c);
        let expected = SpatialInertia::from_com(m, &c_new.coords, &Matrix3::zeros());
        for (a, b) in moved.moment.iter().zip(expected.moment.iter()) {
            assert_close!(*a, *b, 1e-9);
        }
        assert_close!((moved.cross_part - expected.cross_part).norm(), 0., 1e-9);
    }

    #[test]
    fn add_accumulates_all_parts() {
        let a = SpatialInertia::from_com(1., &vector![1., 0., 0.], &Matrix3::identity());
        let b = SpatialInertia::from_com(2., &vector![0., 1., 0.], &Matrix3::identity());

        let mut sum = SpatialInertia::zero();
        sum += &a;
        sum += &b;

        assert_eq!(sum, &a + &b);
        assert_close!(sum.mass, 3., 1e-12);
        assert_close!(sum.center_of_mass().x, 1. / 3., 1e-12);
    }
}
