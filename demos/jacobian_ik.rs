//! Moves the tip of a two-link arm around a small circle with
//! Jacobian-transpose inverse kinematics. Escape closes the window.

use std::{error::Error, process::ExitCode};

use gorilla_control::{
    config::{self, ReachDemoConfig},
    control::jacobian_ik::JacobianTransposeController,
    error::SetupError,
    mjcf::load_model,
    simulate::Simulation,
    util::init_logging,
    viewer,
};
use tracing::info;

fn setup() -> Result<(ReachDemoConfig, Simulation), SetupError> {
    let config: ReachDemoConfig = config::from_env()?;

    let model = load_model(&config.model)?;
    let controller = JacobianTransposeController::for_model(&model, &config.control)?;
    Ok((config, Simulation::new(model, Box::new(controller))))
}

fn run() -> Result<(), Box<dyn Error>> {
    let (config, sim) = setup()?;
    info!(
        site = %config.control.site,
        radius = config.control.radius,
        alpha = config.control.alpha,
        "tracking circle"
    );

    viewer::run(sim, &config.viewer)?;
    Ok(())
}

pub fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
