use na::DVector;

use crate::{
    config::PdConfig,
    control::{Command, Controller},
    error::SetupError,
    mechanism::{MechanismState, Model},
    types::Float,
    PI, TWO_PI,
};

/// Wrap an angle into (-π, π].
pub fn wrap_angle(a: Float) -> Float {
    let wrapped = PI - (PI - a).rem_euclid(TWO_PI);
    // rem_euclid may round up to exactly 2π for tiny negative inputs
    if wrapped <= -PI {
        wrapped + TWO_PI
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdGains {
    pub kp: Float,
    pub kd: Float,
}

/// PD law on a revolute joint, correcting along the shorter way around:
///     τ = Kp * wrap(target - angle) - Kd * velocity
/// No saturation is applied.
pub fn pd_torque(gains: &PdGains, target: Float, angle: Float, velocity: Float) -> Float {
    gains.kp * wrap_angle(target - angle) - gains.kd * velocity
}

/// Holds a single hinge at a fixed angle, typically a pendulum at its upper
/// equilibrium, through the motor that drives it.
pub struct PendulumBalanceController {
    pub gains: PdGains,
    pub target: Float,
    joint: usize,
    actuator: usize,
}

impl PendulumBalanceController {
    pub fn for_model(model: &Model, config: &PdConfig) -> Result<Self, SetupError> {
        let joint = match &config.joint {
            Some(name) => model
                .joint_id(name)
                .ok_or_else(|| SetupError::MissingJoint(name.clone()))?,
            None if model.nq() > 0 => 0,
            None => return Err(SetupError::MissingJoint("<first joint>".to_string())),
        };
        let actuator = model
            .actuators
            .iter()
            .position(|a| a.joint == joint)
            .ok_or_else(|| SetupError::MissingActuator(model.joints[joint].name.clone()))?;

        Ok(PendulumBalanceController {
            gains: PdGains {
                kp: config.kp,
                kd: config.kd,
            },
            target: config.target,
            joint,
            actuator,
        })
    }

    pub fn joint(&self) -> usize {
        self.joint
    }

    /// Index of the motor the torque is written to.
    pub fn actuator(&self) -> usize {
        self.actuator
    }
}

impl Controller for PendulumBalanceController {
    fn control(&mut self, model: &Model, state: &MechanismState) -> Command {
        let torque = pd_torque(
            &self.gains,
            self.target,
            state.q[self.joint],
            state.v[self.joint],
        );
        let mut ctrl = DVector::zeros(model.nu());
        ctrl[self.actuator] = torque;
        Command::Actuate(ctrl)
    }
}

#[cfg(test)]
mod pd_tests {
    use rand::Rng;

    use crate::{
        assert_close,
        mjcf::load_model_from_str,
        simulate::{simulate, Simulation},
        util::test_utils::random_float,
    };

    use super::*;

    const GAINS: PdGains = PdGains { kp: 130., kd: 3. };

    #[test]
    fn wrap_angle_range_and_congruence() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let a = random_float(&mut rng, 100.);
            let wrapped = wrap_angle(a);

            assert!(wrapped > -PI && wrapped <= PI, "wrap({a}) = {wrapped}");
            let turns = (a - wrapped) / TWO_PI;
            assert_close!(turns, turns.round(), 1e-9);
        }
    }

    #[test]
    fn wrap_angle_boundaries() {
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(-PI), PI);
        assert_eq!(wrap_angle(0.), 0.);
        assert_close!(wrap_angle(3. * PI).abs(), PI, 1e-12);
        assert_close!(wrap_angle(-0.5 - TWO_PI), -0.5, 1e-12);
        assert!(wrap_angle(-1e-20) > -PI);
    }

    #[test]
    fn zero_error_gives_zero_torque() {
        assert_eq!(pd_torque(&GAINS, PI, PI, 0.), 0.);
    }

    #[test]
    fn torque_pushes_towards_target() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let below = PI - rng.random_range(0.01..PI - 0.01);
            let above = PI + rng.random_range(0.01..PI - 0.01);

            assert!(pd_torque(&GAINS, PI, below, 0.) > 0.);
            assert!(pd_torque(&GAINS, PI, above, 0.) < 0.);
        }
    }

    #[test]
    fn torque_from_hanging_position() {
        let torque = pd_torque(&GAINS, PI, 0., 0.);
        assert_close!(torque, 130. * PI, 1e-12);
        assert_close!(torque, 408.4, 0.01);
    }

    #[test]
    fn velocity_is_damped() {
        assert_eq!(pd_torque(&GAINS, PI, PI, 2.), -6.);
    }

    #[test]
    fn error_takes_the_short_way_around() {
        // 3π/2 past the target is a quarter turn short of it
        let torque = pd_torque(&GAINS, PI, PI + 1.5 * PI, 0.);
        assert_close!(torque, 130. * 0.5 * PI, 1e-9);
    }

    const PENDULUM: &str = r#"
<mujoco model="pendulum">
  <worldbody>
    <body name="pole" pos="0 0 2">
      <joint name="hinge" type="hinge" axis="0 1 0"/>
      <geom type="capsule" fromto="0 0 0 0 0 -1" size="0.02"/>
      <geom type="sphere" pos="0 0 -1" size="0.05"/>
    </body>
  </worldbody>
  <actuator>
    <motor name="torque" joint="hinge"/>
  </actuator>
</mujoco>
"#;

    #[test]
    fn setup_finds_joint_and_motor() {
        let model = load_model_from_str(PENDULUM).unwrap();

        let named = PdConfig {
            joint: Some("hinge".to_string()),
            ..Default::default()
        };
        assert!(PendulumBalanceController::for_model(&model, &named).is_ok());

        let missing = PdConfig {
            joint: Some("elbow".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            PendulumBalanceController::for_model(&model, &missing),
            Err(SetupError::MissingJoint(_))
        ));
    }

    #[test]
    fn torque_goes_to_the_motor_of_the_controlled_joint() {
        // Arrange: the controlled hinge is driven by the second motor
        let model = load_model_from_str(
            r#"
<mujoco>
  <worldbody>
    <body name="base">
      <joint name="slider" type="slide" axis="1 0 0"/>
      <geom size="0.1"/>
      <body name="pole">
        <joint name="hinge" axis="0 1 0"/>
        <geom type="capsule" fromto="0 0 0 0 0 -1" size="0.02"/>
      </body>
    </body>
  </worldbody>
  <actuator>
    <motor name="push" joint="slider"/>
    <motor name="torque" joint="hinge"/>
  </actuator>
</mujoco>
"#,
        )
        .unwrap();
        let config = PdConfig {
            joint: Some("hinge".to_string()),
            ..Default::default()
        };
        let mut controller = PendulumBalanceController::for_model(&model, &config).unwrap();
        let state = model.make_state();

        // Act
        let command = controller.control(&model, &state);

        // Assert
        assert_eq!(controller.joint(), 1);
        assert_eq!(controller.actuator(), 1);
        let Command::Actuate(ctrl) = command else {
            panic!("expected actuator controls");
        };
        assert_eq!(ctrl[0], 0.);
        assert_close!(ctrl[1], 130. * PI, 1e-12);
    }

    #[test]
    fn setup_requires_a_motor() {
        let model = load_model_from_str(
            r#"<mujoco><worldbody><body><joint/><geom size="0.1"/></body></worldbody></mujoco>"#,
        )
        .unwrap();

        let result = PendulumBalanceController::for_model(&model, &PdConfig::default());
        assert!(matches!(result, Err(SetupError::MissingActuator(_))));
    }

    #[test]
    fn balances_pendulum_upright() {
        // Arrange
        let model = load_model_from_str(PENDULUM).unwrap();
        let config = PdConfig::default();
        let controller = PendulumBalanceController::for_model(&model, &config).unwrap();
        let mut sim = Simulation::new(model, Box::new(controller));
        sim.set_position(0, config.initial_angle);

        // Act
        let qs = simulate(&mut sim, 5000);

        // Assert
        let q_final = qs[qs.len() - 1][0];
        assert_close!(wrap_angle(q_final - PI), 0., 1e-3);
        assert_close!(sim.state.v[0], 0., 1e-2);
        assert!(sim.state.ctrl[0].abs() < 1.);
    }
}
