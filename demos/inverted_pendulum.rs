//! Balances a pendulum upright with a PD law on its hinge.
//!
//! Usage: inverted_pendulum <model.xml>

use std::{env, error::Error, process::ExitCode};

use gorilla_control::{
    config::{self, PendulumDemoConfig},
    control::pd::PendulumBalanceController,
    error::SetupError,
    mjcf::load_model,
    simulate::Simulation,
    util::init_logging,
    viewer,
};
use tracing::info;

fn setup(model_path: &str) -> Result<(PendulumDemoConfig, Simulation), SetupError> {
    let config: PendulumDemoConfig = config::from_env()?;

    let model = load_model(model_path)?;
    let controller = PendulumBalanceController::for_model(&model, &config.control)?;
    let joint = controller.joint();

    let mut sim = Simulation::new(model, Box::new(controller));
    sim.set_position(joint, config.control.initial_angle);
    Ok((config, sim))
}

fn run(model_path: &str) -> Result<(), Box<dyn Error>> {
    let (config, sim) = setup(model_path)?;
    info!(
        kp = config.control.kp,
        kd = config.control.kd,
        target = config.control.target,
        "balancing"
    );

    viewer::run(sim, &config.viewer)?;
    Ok(())
}

pub fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let Some(model_path) = args.get(1) else {
        let program = args.first().map_or("inverted_pendulum", String::as_str);
        eprintln!("Usage: {program} pendulum.xml");
        return ExitCode::FAILURE;
    };

    match run(model_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
