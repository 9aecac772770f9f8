use na::{Isometry3, UnitVector3, Vector3};
use prismatic::PrismaticJoint;
use revolute::RevoluteJoint;

use crate::types::Float;

pub mod prismatic;
pub mod revolute;

#[derive(Debug, Clone, PartialEq)]
pub enum JointKind {
    RevoluteJoint(RevoluteJoint),
    PrismaticJoint(PrismaticJoint),
}

/// A single degree-of-freedom joint attached to a body. Joint i owns entry i of
/// the q and v vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub body: usize,
    pub kind: JointKind,
    pub damping: Float,
    pub armature: Float,
}

impl Joint {
    pub fn revolute(name: &str, body: usize, anchor: Vector3<Float>, axis: UnitVector3<Float>) -> Self {
        Joint {
            name: name.to_string(),
            body,
            kind: JointKind::RevoluteJoint(RevoluteJoint::new(anchor, axis)),
            damping: 0.,
            armature: 0.,
        }
    }

    pub fn prismatic(name: &str, body: usize, axis: UnitVector3<Float>) -> Self {
        Joint {
            name: name.to_string(),
            body,
            kind: JointKind::PrismaticJoint(PrismaticJoint::new(axis)),
            damping: 0.,
            armature: 0.,
        }
    }

    pub fn axis(&self) -> &UnitVector3<Float> {
        match &self.kind {
            JointKind::RevoluteJoint(joint) => &joint.axis,
            JointKind::PrismaticJoint(joint) => &joint.axis,
        }
    }

    /// Anchor point in body frame. Prismatic joints are anchored at the body
    /// origin.
    pub fn anchor(&self) -> Vector3<Float> {
        match &self.kind {
            JointKind::RevoluteJoint(joint) => joint.anchor,
            JointKind::PrismaticJoint(_) => Vector3::zeros(),
        }
    }

    pub fn displacement(&self, q: Float) -> Isometry3<Float> {
        match &self.kind {
            JointKind::RevoluteJoint(joint) => joint.displacement(q),
            JointKind::PrismaticJoint(joint) => joint.displacement(q),
        }
    }

    /// Unit twist (angular, linear) of the joint in world frame, given its
    /// world anchor and axis.
    pub fn motion_subspace(
        &self,
        anchor_world: &Vector3<Float>,
        axis_world: &Vector3<Float>,
    ) -> (Vector3<Float>, Vector3<Float>) {
        match &self.kind {
            JointKind::RevoluteJoint(joint) => joint.motion_subspace(anchor_world, axis_world),
            JointKind::PrismaticJoint(joint) => joint.motion_subspace(axis_world),
        }
    }

    pub fn is_revolute(&self) -> bool {
        matches!(self.kind, JointKind::RevoluteJoint(_))
    }
}
