use na::DVector;

use crate::{
    dynamics::dynamics,
    kinematics::compute_kinematics,
    mechanism::{MechanismState, Model},
    types::Float,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrator {
    SemiImplicitEuler,
    RungeKutta4,
}

/// Advance q and v of the state by dt. Kinematics of the state must be up to
/// date on entry; they are stale on return.
pub fn integrate(model: &Model, state: &mut MechanismState, dt: Float) {
    let (q, v) = match model.options.integrator {
        Integrator::SemiImplicitEuler => semi_implicit_euler(model, state, dt),
        Integrator::RungeKutta4 => runge_kutta_4(model, state, dt),
    };
    state.update(&q, &v);
}

/// Semi-Implicit Euler integration step:
///     v(k+1) = v(k) + dt * vdot
///     q(k+1) = q(k) + dt * v(k+1)
///
/// Note: this actually turns out to be energy conserving for Hamiltonian systems,
/// informally meaning systems that are not subject to velocity-dependent
/// forces. E.g. single pendulum
///
/// Ref: Drake Doc, https://drake.mit.edu/doxygen_cxx/classdrake_1_1systems_1_1_semi_explicit_euler_integrator.html
fn semi_implicit_euler(
    model: &Model,
    state: &mut MechanismState,
    dt: Float,
) -> (DVector<Float>, DVector<Float>) {
    let vdot = dynamics(model, state);
    let v = &state.v + &vdot * dt;
    let q = &state.q + &v * dt;
    state.vdot = vdot;
    (q, v)
}

/// Classic 4th-order Runge-Kutta on the first-order system (q, v).
fn runge_kutta_4(
    model: &Model,
    state: &mut MechanismState,
    dt: Float,
) -> (DVector<Float>, DVector<Float>) {
    let q0 = state.q.clone();
    let v0 = state.v.clone();

    let mut scratch = state.clone();
    let mut derivative = |q: &DVector<Float>, v: &DVector<Float>| {
        scratch.update(q, v);
        compute_kinematics(model, &mut scratch);
        dynamics(model, &scratch)
    };

    let k1_q = v0.clone();
    let k1_v = dynamics(model, state);

    let q2 = &q0 + &k1_q * (dt / 2.);
    let v2 = &v0 + &k1_v * (dt / 2.);
    let k2_q = v2.clone();
    let k2_v = derivative(&q2, &v2);

    let q3 = &q0 + &k2_q * (dt / 2.);
    let v3 = &v0 + &k2_v * (dt / 2.);
    let k3_q = v3.clone();
    let k3_v = derivative(&q3, &v3);

    let q4 = &q0 + &k3_q * dt;
    let v4 = &v0 + &k3_v * dt;
    let k4_q = v4.clone();
    let k4_v = derivative(&q4, &v4);

    let q = &q0 + (k1_q + k2_q * 2. + k3_q * 2. + k4_q) * (dt / 6.);
    let v = &v0 + (&k1_v + k2_v * 2. + k3_v * 2. + k4_v) * (dt / 6.);
    state.vdot = k1_v;
    (q, v)
}
