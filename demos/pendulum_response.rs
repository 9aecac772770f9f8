//! Runs the balancing controller without a window and plots the hinge
//! angle and the applied torque to plot.png.
//!
//! Usage: pendulum_response [model.xml] [seconds]

use std::{env, error::Error, path::Path, process::ExitCode};

use gorilla_control::{
    config::{self, PendulumDemoConfig},
    control::pd::PendulumBalanceController,
    error::SetupError,
    mjcf::load_model,
    plot::plot,
    simulate::Simulation,
    types::Float,
    util::init_logging,
};
use tracing::info;

/// Balance controller wired to the model, with the joint and motor it uses.
fn setup(model_path: &str) -> Result<(Simulation, usize, usize), SetupError> {
    let config: PendulumDemoConfig = config::from_env()?;

    let model = load_model(model_path)?;
    let controller = PendulumBalanceController::for_model(&model, &config.control)?;
    let (joint, actuator) = (controller.joint(), controller.actuator());

    let mut sim = Simulation::new(model, Box::new(controller));
    sim.set_position(joint, config.control.initial_angle);
    Ok((sim, joint, actuator))
}

fn run(model_path: &str, duration: Float) -> Result<(), Box<dyn Error>> {
    let (mut sim, joint, actuator) = setup(model_path)?;
    let dt = sim.model.options.timestep;

    let ticks = (duration / dt).round() as usize;
    let mut angle = Vec::with_capacity(ticks + 1);
    let mut torque = Vec::with_capacity(ticks + 1);
    angle.push(sim.state.q[joint]);
    torque.push(0.);
    for _ in 0..ticks {
        sim.tick();
        angle.push(sim.state.q[joint]);
        torque.push(sim.state.ctrl[actuator]);
    }
    info!(
        ticks,
        final_angle = sim.state.q[joint],
        final_velocity = sim.state.v[joint],
        "simulated"
    );

    plot(
        Path::new("plot.png"),
        "PD balance response",
        &[("angle [rad]", angle.as_slice()), ("torque [Nm]", torque.as_slice())],
        dt,
    )
}

pub fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let model_path = args.get(1).map_or("assets/pendulum.xml", String::as_str);
    let duration = match args.get(2).map(|s| s.parse::<Float>()) {
        None => 5.,
        Some(Ok(seconds)) if seconds > 0. => seconds,
        Some(_) => {
            eprintln!("Usage: pendulum_response [model.xml] [seconds]");
            return ExitCode::FAILURE;
        }
    };

    match run(model_path, duration) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
