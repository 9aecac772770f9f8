use na::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};

use crate::types::Float;

/// Represents a revolute (hinge) joint between a body and its parent.
///
/// Note: anchor and axis are expressed in the frame of the body the joint
/// belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJoint {
    pub anchor: Vector3<Float>,
    pub axis: UnitVector3<Float>,
}

impl RevoluteJoint {
    pub fn new(anchor: Vector3<Float>, axis: UnitVector3<Float>) -> Self {
        RevoluteJoint { anchor, axis }
    }

    /// Displacement of the body frame produced by rotating q radians around
    /// the axis through the anchor.
    pub fn displacement(&self, q: Float) -> Isometry3<Float> {
        let to_anchor = Translation3::from(self.anchor);
        let from_anchor = Translation3::from(-self.anchor);
        let rotation = Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(&self.axis, q),
        );
        Isometry3::from_parts(to_anchor, UnitQuaternion::identity())
            * rotation
            * Isometry3::from_parts(from_anchor, UnitQuaternion::identity())
    }

    /// Unit twist of the joint expressed in world frame, about the world
    /// origin: [axis; anchor x axis]
    pub fn motion_subspace(
        &self,
        anchor_world: &Vector3<Float>,
        axis_world: &Vector3<Float>,
    ) -> (Vector3<Float>, Vector3<Float>) {
        (*axis_world, anchor_world.cross(axis_world))
    }
}

#[cfg(test)]
mod revolute_tests {
    use na::{vector, Point3};

    use crate::{assert_close, PI};

    use super::*;

    #[test]
    fn displacement_keeps_anchor_fixed() {
        // Arrange
        let joint = RevoluteJoint::new(vector![0., 0., 1.], Vector3::y_axis());

        // Act
        let iso = joint.displacement(PI / 2.);

        // Assert
        let anchor = iso * Point3::new(0., 0., 1.);
        assert_close!((anchor.coords - vector![0., 0., 1.]).norm(), 0., 1e-12);

        // A point one unit below the anchor swings to -x under +y rotation
        let tip = iso * Point3::new(0., 0., 0.);
        assert_close!(tip.x, -1., 1e-12);
        assert_close!(tip.z, 1., 1e-12);
    }

    #[test]
    fn motion_subspace_of_offset_hinge() {
        let joint = RevoluteJoint::new(Vector3::zeros(), Vector3::y_axis());

        let (angular, linear) = joint.motion_subspace(&vector![0., 0., 2.], &vector![0., 1., 0.]);

        assert_eq!(angular, vector![0., 1., 0.]);
        assert_eq!(linear, vector![-2., 0., 0.]);
    }
}
