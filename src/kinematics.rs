use na::{Matrix3xX, Point3, Vector3};

use crate::{
    mechanism::{MechanismState, Model},
    types::Float,
    util::colwise_cross,
};

/// A geometric Jacobian maps a vector of joint velocities to a twist.
#[derive(PartialEq, Debug, Clone)]
pub struct GeometricJacobian {
    pub angular: Matrix3xX<Float>,
    pub linear: Matrix3xX<Float>,
}

impl GeometricJacobian {
    pub fn zeros(ncols: usize) -> Self {
        GeometricJacobian {
            angular: Matrix3xX::zeros(ncols),
            linear: Matrix3xX::zeros(ncols),
        }
    }

    pub fn dim(&self) -> usize {
        self.angular.ncols()
    }
}

/// Recompute body poses, joint anchors/axes and site positions in world frame
/// from the joint configuration q.
pub fn compute_kinematics(model: &Model, state: &mut MechanismState) {
    for (bodyid, body) in model.bodies.iter().enumerate() {
        let Some(parentid) = body.parent else {
            continue; // world body stays at identity
        };

        let mut frame = state.bodies_to_world[parentid] * body.offset;
        for jointid in body.joints.iter() {
            let joint = &model.joints[*jointid];
            state.joint_anchors[*jointid] = (frame * Point3::from(joint.anchor())).coords;
            state.joint_axes[*jointid] = frame.rotation * joint.axis().into_inner();
            frame *= joint.displacement(state.q[*jointid]);
        }
        state.bodies_to_world[bodyid] = frame;
    }

    for (siteid, site) in model.sites.iter().enumerate() {
        state.site_xpos[siteid] = (state.bodies_to_world[site.body] * Point3::from(site.pos)).coords;
    }
}

/// Computes the motion subspace of each joint, expressed in world frame about
/// the world origin. Requires up-to-date kinematics.
pub fn compute_motion_subspaces(
    model: &Model,
    state: &MechanismState,
) -> Vec<(Vector3<Float>, Vector3<Float>)> {
    model
        .joints
        .iter()
        .enumerate()
        .map(|(jointid, joint)| {
            joint.motion_subspace(&state.joint_anchors[jointid], &state.joint_axes[jointid])
        })
        .collect()
}

/// Jacobian of a point rigidly attached to `body`, given in world frame.
/// Columns of joints that do not move the body are zero.
pub fn point_jacobian(
    model: &Model,
    state: &MechanismState,
    body: usize,
    point: &Vector3<Float>,
) -> GeometricJacobian {
    let mut jacobian = GeometricJacobian::zeros(model.nv());
    let subspaces = compute_motion_subspaces(model, state);
    for jointid in model.supporting_joints(body) {
        let (angular, linear) = &subspaces[jointid];
        jacobian.angular.set_column(jointid, angular);
        jacobian.linear.set_column(jointid, linear);
    }

    // Shift the reference point from the world origin to the point:
    // v_p = v_o + w x p
    jacobian.linear -= colwise_cross(point, &jacobian.angular);
    jacobian
}

/// Positional and rotational Jacobian of a site at the current configuration.
pub fn site_jacobian(model: &Model, state: &MechanismState, site: usize) -> GeometricJacobian {
    point_jacobian(model, state, model.sites[site].body, &state.site_xpos[site])
}

#[cfg(test)]
mod kinematics_tests {
    use na::{dvector, vector};

    use crate::{assert_close, mjcf::load_model_from_str, simulate::forward, PI};

    use super::*;

    const ARM: &str = r#"
<mujoco model="arm">
  <compiler angle="radian"/>
  <worldbody>
    <body name="upper" pos="0 0 1">
      <joint name="shoulder" type="hinge" axis="0 1 0"/>
      <geom type="capsule" fromto="0 0 0 0 0 0.5" size="0.05"/>
      <body name="lower" pos="0 0 0.5">
        <joint name="elbow" type="hinge" axis="0 1 0"/>
        <geom type="capsule" fromto="0 0 0 0 0 0.5" size="0.05"/>
        <site name="endeff" pos="0 0 0.5"/>
      </body>
    </body>
  </worldbody>
</mujoco>
"#;

    #[test]
    fn straight_arm_site_position() {
        let model = load_model_from_str(ARM).unwrap();
        let state = model.make_state();

        let site = model.site_id("endeff").unwrap();
        assert_close!((state.site_xpos[site] - vector![0., 0., 2.]).norm(), 0., 1e-12);
    }

    #[test]
    fn bent_arm_site_position() {
        // Arrange
        let model = load_model_from_str(ARM).unwrap();
        let mut state = model.make_state();
        state.update(&dvector![PI / 2., 0.], &dvector![0., 0.]);

        // Act
        forward(&model, &mut state);

        // Assert: +y rotation swings +z into +x
        let site = model.site_id("endeff").unwrap();
        assert_close!((state.site_xpos[site] - vector![1., 0., 1.]).norm(), 0., 1e-12);
    }

    #[test]
    fn site_jacobian_of_straight_arm() {
        let model = load_model_from_str(ARM).unwrap();
        let state = model.make_state();

        let jacobian = site_jacobian(&model, &state, 0);

        // d(site)/dq = axis x (site - anchor)
        assert_close!((jacobian.linear.column(0) - vector![1., 0., 0.]).norm(), 0., 1e-12);
        assert_close!((jacobian.linear.column(1) - vector![0.5, 0., 0.]).norm(), 0., 1e-12);
        assert_eq!(jacobian.angular.column(0), vector![0., 1., 0.]);
        assert_eq!(jacobian.angular.column(1), vector![0., 1., 0.]);
        assert_eq!(jacobian.dim(), 2);
    }

    /// Jacobian columns must match finite differences of the site position.
    #[test]
    fn site_jacobian_matches_finite_difference() {
        // Arrange
        let model = load_model_from_str(ARM).unwrap();
        let mut state = model.make_state();
        let q0 = dvector![0.3, -0.7];
        state.update(&q0, &dvector![0., 0.]);
        forward(&model, &mut state);
        let p0 = state.site_xpos[0];

        // Act
        let jacobian = site_jacobian(&model, &state, 0);

        // Assert
        let eps = 1e-7;
        for j in 0..2 {
            let mut q = q0.clone();
            q[j] += eps;
            state.update(&q, &dvector![0., 0.]);
            forward(&model, &mut state);
            let numeric = (state.site_xpos[0] - p0) / eps;
            assert_close!((numeric - jacobian.linear.column(j)).norm(), 0., 1e-5);
        }
    }
}
