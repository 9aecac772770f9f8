use na::{DVector, Isometry3, Vector3};

use crate::{
    integrators::Integrator,
    joint::Joint,
    kinematics::compute_kinematics,
    rigid_body::{RigidBody, Site},
    types::Float,
    GRAVITY,
};

/// Motor actuator: applies gear * ctrl as a generalized force on one joint.
#[derive(Debug, Clone, PartialEq)]
pub struct Actuator {
    pub name: String,
    pub joint: usize,
    pub gear: Float,
    pub ctrl_range: Option<(Float, Float)>, // Some when the control is limited
}

impl Actuator {
    /// Generalized force produced by control value `ctrl`.
    pub fn force(&self, ctrl: Float) -> Float {
        let ctrl = match self.ctrl_range {
            Some((lo, hi)) => ctrl.clamp(lo, hi),
            None => ctrl,
        };
        self.gear * ctrl
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimOptions {
    pub timestep: Float,
    pub gravity: Vector3<Float>,
    pub integrator: Integrator,
}

impl Default for SimOptions {
    fn default() -> Self {
        SimOptions {
            timestep: 0.002,
            gravity: Vector3::new(0., 0., -GRAVITY),
            integrator: Integrator::SemiImplicitEuler,
        }
    }
}

/// Immutable description of a mechanism: a tree of rigid bodies connected by
/// single degree-of-freedom joints. Body 0 is the world.
///
/// Bodies are stored so that every parent precedes its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub bodies: Vec<RigidBody>,
    pub joints: Vec<Joint>,
    pub sites: Vec<Site>,
    pub actuators: Vec<Actuator>,
    pub options: SimOptions,
}

impl Model {
    /// Model that holds only the world body.
    pub fn empty(name: &str) -> Self {
        Model {
            name: name.to_string(),
            bodies: vec![RigidBody::world()],
            joints: vec![],
            sites: vec![],
            actuators: vec![],
            options: SimOptions::default(),
        }
    }

    /// Number of position coordinates
    pub fn nq(&self) -> usize {
        self.joints.len()
    }

    /// Number of velocity coordinates
    pub fn nv(&self) -> usize {
        self.joints.len()
    }

    /// Number of actuators
    pub fn nu(&self) -> usize {
        self.actuators.len()
    }

    pub fn body_id(&self, name: &str) -> Option<usize> {
        self.bodies.iter().position(|b| b.name == name)
    }

    pub fn joint_id(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    pub fn site_id(&self, name: &str) -> Option<usize> {
        self.sites.iter().position(|s| s.name == name)
    }

    pub fn actuator_id(&self, name: &str) -> Option<usize> {
        self.actuators.iter().position(|a| a.name == name)
    }

    /// Returns whether `ancestor` is `body` or lies on its path to the world.
    pub fn is_ancestor(&self, ancestor: usize, body: usize) -> bool {
        let mut current = Some(body);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.bodies[id].parent;
        }
        false
    }

    /// Indices of the joints that move `body`, from the world outwards.
    pub fn supporting_joints(&self, body: usize) -> Vec<usize> {
        let mut chain = vec![];
        let mut current = Some(body);
        while let Some(id) = current {
            chain.push(id);
            current = self.bodies[id].parent;
        }
        chain
            .iter()
            .rev()
            .flat_map(|id| self.bodies[*id].joints.iter().cloned())
            .collect()
    }

    /// Allocate a state at q = 0, v = 0 with kinematics already computed.
    pub fn make_state(&self) -> MechanismState {
        let mut state = MechanismState {
            q: DVector::zeros(self.nq()),
            v: DVector::zeros(self.nv()),
            vdot: DVector::zeros(self.nv()),
            ctrl: DVector::zeros(self.nu()),
            time: 0.,
            bodies_to_world: vec![Isometry3::identity(); self.bodies.len()],
            joint_anchors: vec![Vector3::zeros(); self.joints.len()],
            joint_axes: vec![Vector3::zeros(); self.joints.len()],
            site_xpos: vec![Vector3::zeros(); self.sites.len()],
        };
        compute_kinematics(self, &mut state);
        state
    }
}

/// MechanismState stores the time-varying quantities of a mechanism, together
/// with the world-frame quantities derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct MechanismState {
    pub q: DVector<Float>,    // joint configuration vector
    pub v: DVector<Float>,    // joint velocity vector
    pub vdot: DVector<Float>, // joint acceleration of the last dynamics evaluation
    pub ctrl: DVector<Float>, // actuator controls
    pub time: Float,

    // Derived by forward kinematics
    pub bodies_to_world: Vec<Isometry3<Float>>,
    pub joint_anchors: Vec<Vector3<Float>>,
    pub joint_axes: Vec<Vector3<Float>>,
    pub site_xpos: Vec<Vector3<Float>>,
}

impl MechanismState {
    /// Set joint positions and velocities. Derived quantities are stale until
    /// the next kinematics pass.
    pub fn update(&mut self, q: &DVector<Float>, v: &DVector<Float>) {
        self.q.copy_from(q);
        self.v.copy_from(v);
    }

    /// Write actuator controls. Extra entries are ignored and missing entries
    /// are zeroed.
    pub fn set_ctrl(&mut self, ctrl: &DVector<Float>) {
        for (i, u) in self.ctrl.iter_mut().enumerate() {
            *u = ctrl.get(i).copied().unwrap_or(0.);
        }
    }
}

#[cfg(test)]
mod mechanism_tests {
    use na::dvector;

    use crate::mjcf::load_model_from_str;

    use super::*;

    const CHAIN: &str = r#"
<mujoco model="chain">
  <worldbody>
    <body name="a" pos="0 0 1">
      <joint name="j1" type="hinge" axis="0 1 0"/>
      <geom type="sphere" size="0.1"/>
      <body name="b" pos="0 0 -1">
        <joint name="j2" type="hinge" axis="0 1 0"/>
        <geom type="sphere" size="0.1"/>
        <site name="tip" pos="0 0 -1"/>
      </body>
    </body>
    <body name="c" pos="1 0 0">
      <joint name="j3" type="slide" axis="1 0 0"/>
      <geom type="sphere" size="0.1"/>
    </body>
  </worldbody>
  <actuator>
    <motor name="m1" joint="j1" gear="2" ctrlrange="-1 1"/>
  </actuator>
</mujoco>
"#;

    #[test]
    fn named_lookup() {
        let model = load_model_from_str(CHAIN).unwrap();

        assert_eq!(model.body_id("b"), Some(2));
        assert_eq!(model.joint_id("j3"), Some(2));
        assert_eq!(model.site_id("tip"), Some(0));
        assert_eq!(model.actuator_id("m1"), Some(0));
        assert_eq!(model.site_id("endeff"), None);
        assert_eq!((model.nq(), model.nv(), model.nu()), (3, 3, 1));
    }

    #[test]
    fn supporting_joints_follow_the_tree() {
        let model = load_model_from_str(CHAIN).unwrap();

        assert_eq!(model.supporting_joints(2), vec![0, 1]);
        assert_eq!(model.supporting_joints(3), vec![2]);
        assert!(model.is_ancestor(1, 2));
        assert!(!model.is_ancestor(3, 2));
    }

    #[test]
    fn actuator_force_respects_ctrl_range() {
        let model = load_model_from_str(CHAIN).unwrap();
        let motor = &model.actuators[0];

        assert_eq!(motor.force(0.5), 1.);
        assert_eq!(motor.force(5.), 2.);
        assert_eq!(motor.force(-5.), -2.);
    }

    #[test]
    fn set_ctrl_pads_and_truncates() {
        let model = load_model_from_str(CHAIN).unwrap();
        let mut state = model.make_state();

        state.set_ctrl(&dvector![3., 4.]);
        assert_eq!(state.ctrl, dvector![3.]);

        state.set_ctrl(&dvector![]);
        assert_eq!(state.ctrl, dvector![0.]);
    }
}
