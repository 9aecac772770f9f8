//! Interactive window that steps a simulation once per frame and draws it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

use crate::{config::ViewerConfig, simulate::Simulation, types::Float};

use self::{camera::Camera, renderer::RenderContext, scene::Scene};

pub mod camera;
pub mod renderer;
pub mod scene;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("could not create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("could not create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("could not create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("could not open graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface does not support any format")]
    NoSurfaceFormat,

    #[error("could not acquire frame: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    Terminating,
}

/// Why the window is asked to close, if it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    CloseRequested,
    EscapePressed,
    Other,
}

/// Lifecycle of one viewer run. Resources are acquired before `Running` and
/// released after `Terminating`, in reverse order of acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    phase: Phase,
    close_on_escape: bool,
}

impl Lifecycle {
    pub fn new(close_on_escape: bool) -> Self {
        Lifecycle {
            phase: Phase::Initializing,
            close_on_escape,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn start(&mut self) {
        if self.phase == Phase::Initializing {
            self.phase = Phase::Running;
        }
    }

    /// Returns true when the input ends the run.
    pub fn handle(&mut self, input: Input) -> bool {
        let close = match input {
            Input::CloseRequested => true,
            Input::EscapePressed => self.close_on_escape,
            Input::Other => false,
        };
        if close && self.phase == Phase::Running {
            self.phase = Phase::Terminating;
        }
        close
    }

    /// Frames are only advanced while running.
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }
}

struct Viewer {
    // Dropped in declaration order: renderer before window before simulation.
    renderer: RenderContext,
    window: Arc<Window>,
    simulation: Simulation,
    scene: Scene,
    camera: Camera,
    config: ViewerConfig,
    lifecycle: Lifecycle,
    failure: Option<ViewerError>,
}

impl Viewer {
    fn handle_event(&mut self, event: Event<()>, elwt: &EventLoopWindowTarget<()>) {
        match event {
            Event::WindowEvent { event, window_id } if window_id == self.window.id() => {
                match event {
                    WindowEvent::CloseRequested => self.input(Input::CloseRequested, elwt),
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                state: ElementState::Pressed,
                                ..
                            },
                        ..
                    } => self.input(Input::EscapePressed, elwt),
                    WindowEvent::Resized(size) => self.renderer.resize(size.width, size.height),
                    WindowEvent::RedrawRequested => {
                        if self.lifecycle.is_running() {
                            if let Err(e) = self.frame() {
                                error!("{e}");
                                self.failure = Some(e);
                                elwt.exit();
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => self.window.request_redraw(),
            _ => {}
        }
    }

    fn input(&mut self, input: Input, elwt: &EventLoopWindowTarget<()>) {
        if self.lifecycle.handle(input) {
            info!(?input, "closing viewer");
            elwt.exit();
        }
    }

    /// One loop iteration: advance the simulation, rebuild the scene, draw.
    fn frame(&mut self) -> Result<(), ViewerError> {
        self.simulation.tick();
        self.scene.update(
            &self.simulation.model,
            &self.simulation.state,
            self.simulation.target(),
            &self.config.visual,
        );
        let view_proj = self
            .camera
            .view_projection(self.renderer.aspect() as Float)
            .cast::<f32>();
        self.renderer.render(&self.scene.vertices, &view_proj)
    }
}

/// Open a window and run `simulation` until the window is closed (or Escape
/// is pressed, when configured). Blocks until the window is gone.
pub fn run(simulation: Simulation, config: &ViewerConfig) -> Result<(), ViewerError> {
    let mut lifecycle = Lifecycle::new(config.close_on_escape);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(&event_loop)?,
    );
    let renderer = RenderContext::new(window.clone())?;
    lifecycle.start();

    let mut viewer = Viewer {
        renderer,
        window,
        simulation,
        scene: Scene::new(config.max_objects),
        camera: Camera::from_config(&config.camera),
        config: config.clone(),
        lifecycle,
        failure: None,
    };
    info!(title = %config.title, "viewer running");

    event_loop.run(|event, elwt| viewer.handle_event(event, elwt))?;

    debug!(time = viewer.simulation.state.time, "viewer stopped");
    match viewer.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod viewer_tests {
    use super::*;

    #[test]
    fn window_close_always_terminates() {
        for close_on_escape in [true, false] {
            let mut lifecycle = Lifecycle::new(close_on_escape);
            lifecycle.start();

            assert!(lifecycle.handle(Input::CloseRequested));
            assert_eq!(lifecycle.phase(), Phase::Terminating);
            assert!(!lifecycle.is_running());
        }
    }

    #[test]
    fn escape_only_terminates_when_enabled() {
        let mut lifecycle = Lifecycle::new(false);
        lifecycle.start();
        assert!(!lifecycle.handle(Input::EscapePressed));
        assert_eq!(lifecycle.phase(), Phase::Running);

        let mut lifecycle = Lifecycle::new(true);
        lifecycle.start();
        assert!(lifecycle.handle(Input::EscapePressed));
        assert_eq!(lifecycle.phase(), Phase::Terminating);
    }

    #[test]
    fn other_input_keeps_running() {
        let mut lifecycle = Lifecycle::new(true);
        lifecycle.start();

        assert!(!lifecycle.handle(Input::Other));
        assert!(lifecycle.is_running());
    }

    #[test]
    fn frames_wait_for_initialization() {
        let mut lifecycle = Lifecycle::new(true);
        assert_eq!(lifecycle.phase(), Phase::Initializing);
        assert!(!lifecycle.is_running());

        lifecycle.start();
        assert!(lifecycle.is_running());

        lifecycle.handle(Input::CloseRequested);
        lifecycle.start();
        assert_eq!(lifecycle.phase(), Phase::Terminating);
    }
}
