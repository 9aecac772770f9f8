use na::{vector, DVector, Matrix3xX, Vector3};

use crate::{
    config::IkConfig,
    control::{Command, Controller},
    error::SetupError,
    kinematics::site_jacobian,
    mechanism::{MechanismState, Model},
    types::Float,
};

/// Circle in the X-Z plane (y = 0), parameterized by t.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleTrajectory {
    pub center_x: Float,
    pub center_z: Float,
    pub radius: Float,
}

impl CircleTrajectory {
    pub fn at(&self, t: Float) -> Vector3<Float> {
        vector![
            self.center_x + self.radius * t.cos(),
            0.,
            self.center_z + self.radius * t.sin()
        ]
    }
}

/// One Jacobian-transpose step restricted to the X-Z plane:
///     Δq_j = α (J[x, j] err_x + J[z, j] err_z)
pub fn jacobian_transpose_step(
    jacobian_linear: &Matrix3xX<Float>,
    error_x: Float,
    error_z: Float,
    alpha: Float,
) -> DVector<Float> {
    DVector::from_iterator(
        jacobian_linear.ncols(),
        jacobian_linear
            .column_iter()
            .map(|column| alpha * (column[0] * error_x + column[2] * error_z)),
    )
}

/// Moves a site along a circular path by displacing the joints directly.
/// Only the trajectory parameter is carried between ticks.
pub struct JacobianTransposeController {
    pub trajectory: CircleTrajectory,
    pub alpha: Float,
    pub time_increment: Float,
    site: usize,
    t: Float,
}

impl JacobianTransposeController {
    pub fn for_model(model: &Model, config: &IkConfig) -> Result<Self, SetupError> {
        let site = model
            .site_id(&config.site)
            .ok_or_else(|| SetupError::MissingSite(config.site.clone()))?;
        Ok(JacobianTransposeController {
            trajectory: CircleTrajectory {
                center_x: config.center_x,
                center_z: config.center_z,
                radius: config.radius,
            },
            alpha: config.alpha,
            time_increment: config.time_increment,
            site,
            t: 0.,
        })
    }

    pub fn site(&self) -> usize {
        self.site
    }

    pub fn t(&self) -> Float {
        self.t
    }
}

impl Controller for JacobianTransposeController {
    fn control(&mut self, model: &Model, state: &MechanismState) -> Command {
        self.t += self.time_increment;
        let target = self.trajectory.at(self.t);

        let error = target - state.site_xpos[self.site];
        let jacobian = site_jacobian(model, state, self.site);
        Command::Displace(jacobian_transpose_step(
            &jacobian.linear,
            error.x,
            error.z,
            self.alpha,
        ))
    }

    fn target(&self) -> Option<Vector3<Float>> {
        Some(self.trajectory.at(self.t))
    }
}

#[cfg(test)]
mod jacobian_ik_tests {
    use na::{dvector, Matrix3xX};
    use rand::Rng;

    use crate::{
        assert_close, assert_vec_close,
        mjcf::load_model_from_str,
        simulate::{simulate, Simulation},
        util::test_utils::random_float,
        TWO_PI,
    };

    use super::*;

    const CIRCLE: CircleTrajectory = CircleTrajectory {
        center_x: 0.45,
        center_z: 1.05,
        radius: 0.12,
    };

    const ARM: &str = r#"
<mujoco model="arm">
  <worldbody>
    <body name="upper" pos="0 0 1">
      <joint name="shoulder" axis="0 1 0"/>
      <geom type="capsule" fromto="0 0 0 0 0 0.4" size="0.03"/>
      <body name="lower" pos="0 0 0.4">
        <joint name="elbow" axis="0 1 0"/>
        <geom type="capsule" fromto="0 0 0 0 0 0.4" size="0.03"/>
        <site name="endeff" pos="0 0 0.4"/>
      </body>
    </body>
  </worldbody>
</mujoco>
"#;

    #[test]
    fn trajectory_is_periodic_and_on_circle() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let t = random_float(&mut rng, 50.);
            let p = CIRCLE.at(t);

            assert_vec_close!(&CIRCLE.at(t + TWO_PI), &p, 1e-12);
            assert_eq!(p.y, 0.);
            let radius = ((p.x - CIRCLE.center_x).powi(2) + (p.z - CIRCLE.center_z).powi(2)).sqrt();
            assert_close!(radius, CIRCLE.radius, 1e-12);
        }
    }

    #[test]
    fn single_joint_step() {
        let jacobian = Matrix3xX::from_column_slice(&[1., 0., 0.]);

        let dq = jacobian_transpose_step(&jacobian, 0.1, 0., 0.3);

        assert_close!(dq[0], 0.03, 1e-15);
    }

    #[test]
    fn step_ignores_y_row() {
        let jacobian = Matrix3xX::from_column_slice(&[0., 5., 0., 0., 7., 2.]);

        let dq = jacobian_transpose_step(&jacobian, 1., 1., 1.);

        assert_eq!(dq, dvector![0., 2.]);
    }

    #[test]
    fn step_is_linear_in_alpha() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let jacobian = Matrix3xX::from_fn(4, |_, _| random_float(&mut rng, 2.));
            let (ex, ez) = (random_float(&mut rng, 1.), random_float(&mut rng, 1.));
            let alpha = rng.random_range(0.01..1.);

            let single = jacobian_transpose_step(&jacobian, ex, ez, alpha);
            let double = jacobian_transpose_step(&jacobian, ex, ez, 2. * alpha);

            assert_vec_close!(&double, &(2. * &single), 1e-12);
        }
    }

    #[test]
    fn zero_alpha_never_moves() {
        let jacobian = Matrix3xX::from_element(3, 1e12);

        let dq = jacobian_transpose_step(&jacobian, 1e6, -1e6, 0.);

        assert_eq!(dq, DVector::zeros(3));
    }

    #[test]
    fn target_advances_before_use() {
        // Arrange
        let model = load_model_from_str(ARM).unwrap();
        let state = model.make_state();
        let mut controller =
            JacobianTransposeController::for_model(&model, &IkConfig::default()).unwrap();

        // Act
        controller.control(&model, &state);
        controller.control(&model, &state);

        // Assert
        assert_close!(controller.t(), 0.02, 1e-15);
        assert_eq!(controller.target(), Some(controller.trajectory.at(0.02)));
    }

    #[test]
    fn missing_site_is_a_setup_error() {
        let model = load_model_from_str(ARM).unwrap();
        let config = IkConfig {
            site: "gripper".to_string(),
            ..Default::default()
        };

        let result = JacobianTransposeController::for_model(&model, &config);

        assert!(matches!(result, Err(SetupError::MissingSite(name)) if name == "gripper"));
    }

    #[test]
    fn reaches_a_fixed_target() {
        // Arrange: zero radius pins the target to the circle center
        let model = load_model_from_str(ARM).unwrap();
        let config = IkConfig {
            center_x: 0.3,
            center_z: 1.3,
            radius: 0.,
            ..Default::default()
        };
        let controller = JacobianTransposeController::for_model(&model, &config).unwrap();
        let mut sim = Simulation::new(model, Box::new(controller));

        // Act
        simulate(&mut sim, 3000);

        // Assert
        let endeff = sim.state.site_xpos[0];
        assert_close!(endeff.x, 0.3, 1e-4);
        assert_close!(endeff.y, 0., 1e-12);
        assert_close!(endeff.z, 1.3, 1e-4);
        assert_eq!(sim.state.time, 0.);
    }

    #[test]
    fn tracks_the_default_circle() {
        // Arrange
        let model = load_model_from_str(ARM).unwrap();
        let config = IkConfig::default();
        let controller = JacobianTransposeController::for_model(&model, &config).unwrap();
        let mut sim = Simulation::new(model, Box::new(controller));

        // Act: settle for one lap, then measure over the next
        simulate(&mut sim, 700);
        let mut worst: Float = 0.;
        for _ in 0..700 {
            sim.tick();
            let target = sim.target().unwrap();
            worst = worst.max((target - sim.state.site_xpos[0]).norm());
        }

        // Assert
        assert!(worst < CIRCLE.radius, "tracking error {worst}");
    }
}
