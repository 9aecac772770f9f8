use na::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};

use crate::types::Float;

/// Represents a prismatic (slide) joint between a body and its parent.
///
/// Note: axis is expressed in the frame of the body the joint belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJoint {
    pub axis: UnitVector3<Float>,
}

impl PrismaticJoint {
    pub fn new(axis: UnitVector3<Float>) -> Self {
        PrismaticJoint { axis }
    }

    /// Displacement of the body frame produced by moving q along the axis.
    pub fn displacement(&self, q: Float) -> Isometry3<Float> {
        Isometry3::from_parts(
            Translation3::from(self.axis.into_inner() * q),
            UnitQuaternion::identity(),
        )
    }

    /// Unit twist of the joint expressed in world frame: [0; axis]
    pub fn motion_subspace(&self, axis_world: &Vector3<Float>) -> (Vector3<Float>, Vector3<Float>) {
        (Vector3::zeros(), *axis_world)
    }
}

#[cfg(test)]
mod prismatic_tests {
    use na::{vector, Point3};

    use super::*;

    #[test]
    fn displacement_moves_along_axis() {
        let joint = PrismaticJoint::new(Vector3::x_axis());

        let p = joint.displacement(0.5) * Point3::origin();

        assert_eq!(p.coords, vector![0.5, 0., 0.]);
    }
}
