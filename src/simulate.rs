use na::DVector;
use tracing::debug;

use crate::{
    control::{Command, Controller},
    dynamics::dynamics,
    integrators::integrate,
    kinematics::compute_kinematics,
    mechanism::{MechanismState, Model},
    types::Float,
};

/// Recompute the derived quantities of the state (body poses, site positions,
/// joint accelerations) without advancing time.
pub fn forward(model: &Model, state: &mut MechanismState) {
    compute_kinematics(model, state);
    state.vdot = dynamics(model, state);
}

/// Step the mechanism state forward by one model timestep, using the controls
/// currently stored in the state.
pub fn step(model: &Model, state: &mut MechanismState) {
    let dt = model.options.timestep;
    compute_kinematics(model, state);
    integrate(model, state, dt);
    state.time += dt;
    compute_kinematics(model, state);
}

/// A model, its state, and the control law that drives it.
pub struct Simulation {
    pub model: Model,
    pub state: MechanismState,
    pub controller: Box<dyn Controller>,
}

impl Simulation {
    pub fn new(model: Model, controller: Box<dyn Controller>) -> Self {
        let mut state = model.make_state();
        forward(&model, &mut state);
        Simulation {
            model,
            state,
            controller,
        }
    }

    /// Evaluate the control law once and apply its command.
    pub fn tick(&mut self) {
        match self.controller.control(&self.model, &self.state) {
            Command::Actuate(ctrl) => {
                self.state.set_ctrl(&ctrl);
                step(&self.model, &mut self.state);
            }
            Command::Displace(dq) => {
                // Kinematic update, dynamics bypassed
                for (q, delta) in self.state.q.iter_mut().zip(dq.iter()) {
                    *q += delta;
                }
                forward(&self.model, &mut self.state);
            }
        }
    }

    /// Set one joint position and refresh the derived quantities.
    pub fn set_position(&mut self, joint: usize, q: Float) {
        self.state.q[joint] = q;
        forward(&self.model, &mut self.state);
    }

    /// Position of the controller's current target, if it has one.
    pub fn target(&self) -> Option<na::Vector3<Float>> {
        self.controller.target()
    }
}

/// Run the simulation for the given number of ticks without rendering.
/// Returns the joint configurations, starting with the initial one.
pub fn simulate(sim: &mut Simulation, ticks: usize) -> Vec<DVector<Float>> {
    let mut qs = Vec::with_capacity(ticks + 1);
    qs.push(sim.state.q.clone());
    for _ in 0..ticks {
        sim.tick();
        qs.push(sim.state.q.clone());
    }
    debug!(ticks, time = sim.state.time, "headless run finished");
    qs
}
