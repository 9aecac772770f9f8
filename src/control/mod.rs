use na::{DVector, Vector3};

use crate::{
    mechanism::{MechanismState, Model},
    types::Float,
};

pub mod jacobian_ik;
pub mod pd;

/// What a control law asks the simulation to do for one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Write the actuator controls, then integrate the dynamics one timestep.
    Actuate(DVector<Float>),
    /// Add directly to the joint positions and recompute kinematics. Time
    /// does not advance.
    Displace(DVector<Float>),
}

/// A control law evaluated once per tick against the current state.
pub trait Controller {
    fn control(&mut self, model: &Model, state: &MechanismState) -> Command;

    /// World position the controller is currently steering towards, for
    /// display.
    fn target(&self) -> Option<Vector3<Float>> {
        None
    }
}
