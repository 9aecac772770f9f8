use itertools::izip;
use na::{DMatrix, DVector, Vector3};
use tracing::warn;

use crate::{
    inertia::SpatialInertia,
    kinematics::compute_motion_subspaces,
    mechanism::{MechanismState, Model},
    types::Float,
};

type SpatialPair = (Vector3<Float>, Vector3<Float>);

/// Also known as spatial motion cross product
/// Reference: Chapter 2.9 Spatial Cross Products in "Robot Dynamics Algorithms" by Roy Featherstone
fn motion_cross(x: &SpatialPair, y: &SpatialPair) -> SpatialPair {
    let angular = x.0.cross(&y.0);
    let linear = x.0.cross(&y.1) + x.1.cross(&y.0);
    (angular, linear)
}

/// Spatial force cross product, the dual of `motion_cross`
fn force_cross(x: &SpatialPair, f: &SpatialPair) -> SpatialPair {
    let angular = x.0.cross(&f.0) + x.1.cross(&f.1);
    let linear = x.0.cross(&f.1);
    (angular, linear)
}

fn dot(x: &SpatialPair, y: &SpatialPair) -> Float {
    x.0.dot(&y.0) + x.1.dot(&y.1)
}

/// Compute the inertia of each body expressed in world frame.
pub fn compute_inertias(model: &Model, state: &MechanismState) -> Vec<SpatialInertia> {
    izip!(model.bodies.iter(), state.bodies_to_world.iter())
        .map(|(body, body_to_world)| body.inertia.transform(body_to_world))
        .collect()
}

/// Apply the recursive Newton-Euler algorithm to compute the generalized
/// forces that produce joint accelerations vdot at the current q and v, with
/// gravity included as a fictitious base acceleration:
///     τ = M(q) vdot + c(q, v)
///
/// Joint damping is not included.
/// Reference: Table 5.1 in "Robot Dynamics Algorithms" by Roy Featherstone
fn newton_euler(
    model: &Model,
    state: &MechanismState,
    vdot: &DVector<Float>,
    subspaces: &[SpatialPair],
    inertias: &[SpatialInertia],
) -> DVector<Float> {
    let nbodies = model.bodies.len();
    let zero: SpatialPair = (Vector3::zeros(), Vector3::zeros());
    let mut twists = vec![zero; nbodies];
    let mut accels = vec![zero; nbodies];
    let mut wrenches = vec![zero; nbodies];

    // Imagine the whole system is in an elevator accelerating against gravity.
    accels[0] = (Vector3::zeros(), -model.options.gravity);

    for (bodyid, body) in model.bodies.iter().enumerate() {
        let Some(parentid) = body.parent else {
            continue;
        };

        let mut twist = twists[parentid];
        let mut accel = accels[parentid];
        for jointid in body.joints.iter() {
            let S = &subspaces[*jointid];
            let joint_twist = (S.0 * state.v[*jointid], S.1 * state.v[*jointid]);
            let bias = motion_cross(&twist, &joint_twist);
            accel.0 += S.0 * vdot[*jointid] + bias.0;
            accel.1 += S.1 * vdot[*jointid] + bias.1;
            twist.0 += joint_twist.0;
            twist.1 += joint_twist.1;
        }

        let I = &inertias[bodyid];
        let momentum = I.mul_motion(&twist.0, &twist.1);
        let (ang, lin) = I.mul_motion(&accel.0, &accel.1);
        let gyro = force_cross(&twist, &momentum);
        wrenches[bodyid] = (ang + gyro.0, lin + gyro.1);

        twists[bodyid] = twist;
        accels[bodyid] = accel;
    }

    // Propagate wrenches from the leaves towards the root
    let mut tau = DVector::zeros(model.nv());
    for bodyid in (1..nbodies).rev() {
        let wrench = wrenches[bodyid];
        for jointid in model.bodies[bodyid].joints.iter() {
            tau[*jointid] = dot(&subspaces[*jointid], &wrench);
        }
        if let Some(parentid) = model.bodies[bodyid].parent {
            wrenches[parentid].0 += wrench.0;
            wrenches[parentid].1 += wrench.1;
        }
    }
    tau
}

/// Compute the 'dynamics bias term', i.e. the term
///     c(q, v)
/// in the unconstrained joint-space equations of motion
///     M(q) vdot + c(q, v) = τ
/// including gravity and joint damping.
pub fn dynamics_bias(
    model: &Model,
    state: &MechanismState,
    subspaces: &[SpatialPair],
    inertias: &[SpatialInertia],
) -> DVector<Float> {
    let zero_accel = DVector::zeros(model.nv());
    let mut bias = newton_euler(model, state, &zero_accel, subspaces, inertias);
    for (jointid, joint) in model.joints.iter().enumerate() {
        bias[jointid] += joint.damping * state.v[jointid];
    }
    bias
}

/// Compute the joint-space mass matrix (also known as the inertia matrix) of
/// the mechanism in the given state, i.e., the matrix M(q) in the unconstrained
/// joint-space equations of motion:
///     M(q) vdot + c(q, v) = τ
/// This method implements the composite rigid body algorithm. Joint armature
/// is added to the diagonal.
pub fn mass_matrix(
    model: &Model,
    subspaces: &[SpatialPair],
    inertias: &[SpatialInertia],
) -> DMatrix<Float> {
    let nv = model.nv();
    let mut mass_matrix = DMatrix::zeros(nv, nv);

    // Composite rigid body inertias, accumulated from the leaves
    let mut crb_inertias = inertias.to_vec();
    for bodyid in (1..model.bodies.len()).rev() {
        if let Some(parentid) = model.bodies[bodyid].parent {
            let child = crb_inertias[bodyid].clone();
            crb_inertias[parentid] += &child;
        }
    }

    for (bodyid, body) in model.bodies.iter().enumerate() {
        let Ic = &crb_inertias[bodyid];
        let supports = model.supporting_joints(bodyid);
        for i in body.joints.iter() {
            let Si = &subspaces[*i];
            let Fi = Ic.mul_motion(&Si.0, &Si.1);
            for j in supports.iter() {
                let value = dot(&Fi, &subspaces[*j]);
                mass_matrix[(*i, *j)] = value;
                mass_matrix[(*j, *i)] = value;
            }
        }
    }

    for (jointid, joint) in model.joints.iter().enumerate() {
        mass_matrix[(jointid, jointid)] += joint.armature;
    }
    mass_matrix
}

/// Generalized forces produced by the actuators at the current controls.
pub fn actuator_forces(model: &Model, state: &MechanismState) -> DVector<Float> {
    let mut tau = DVector::zeros(model.nv());
    for (actuator, ctrl) in izip!(model.actuators.iter(), state.ctrl.iter()) {
        tau[actuator.joint] += actuator.force(*ctrl);
    }
    tau
}

/// Solves the dynamics equation:
/// M(q) vdot = rhs
pub fn dynamics_solve(mass_matrix: &DMatrix<Float>, rhs: &DVector<Float>) -> DVector<Float> {
    if let Some(cholesky) = mass_matrix.clone().cholesky() {
        return cholesky.solve(rhs);
    }
    if let Some(vdot) = mass_matrix.clone().lu().solve(rhs) {
        return vdot;
    }
    warn!("singular mass matrix, joint accelerations set to zero");
    DVector::zeros(rhs.len())
}

/// Compute the joint acceleration vector vdot that satisfies the joint-space
/// equations of motion:
///     M(q)vdot + c(q, v) = τ
/// given the current q, v and actuator controls. Requires up-to-date
/// kinematics.
pub fn dynamics(model: &Model, state: &MechanismState) -> DVector<Float> {
    if model.nv() == 0 {
        return DVector::zeros(0);
    }
    let subspaces = compute_motion_subspaces(model, state);
    let inertias = compute_inertias(model, state);

    let bias = dynamics_bias(model, state, &subspaces, &inertias); // c(q, v)
    let mass_matrix = mass_matrix(model, &subspaces, &inertias);
    let tau = actuator_forces(model, state);

    dynamics_solve(&mass_matrix, &(tau - bias))
}

/// Do inverse dynamics, i.e. compute τ in the unconstrained joint-space
/// equations of motion
///     M(q) vdot + c(q, v) = τ
/// given joint acceleration vector vdot, with joint damping included.
pub fn inverse_dynamics(
    model: &Model,
    state: &MechanismState,
    vdot: &DVector<Float>,
) -> DVector<Float> {
    let subspaces = compute_motion_subspaces(model, state);
    let inertias = compute_inertias(model, state);
    let mut tau = newton_euler(model, state, vdot, &subspaces, &inertias);
    for (jointid, joint) in model.joints.iter().enumerate() {
        tau[jointid] += joint.damping * state.v[jointid];
    }
    tau
}
