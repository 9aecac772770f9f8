use na::{Isometry3, Matrix4, Perspective3, Point3, Vector3};

use crate::{config::CameraConfig, types::Float};

/// wgpu clip space has z in [0, 1], nalgebra projections produce [-1, 1].
#[rustfmt::skip]
const OPENGL_TO_WGPU: Matrix4<Float> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// Free camera orbiting a look-at point in a Z-up world. Azimuth and
/// elevation are in degrees; azimuth 90 looks along +y, negative elevation
/// looks down.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub distance: Float,
    pub azimuth: Float,
    pub elevation: Float,
    pub lookat: Vector3<Float>,
    pub fovy: Float, // degrees
    pub znear: Float,
    pub zfar: Float,
}

impl Camera {
    pub fn from_config(config: &CameraConfig) -> Self {
        Camera {
            distance: config.distance,
            azimuth: config.azimuth,
            elevation: config.elevation,
            lookat: Vector3::from(config.lookat),
            fovy: 45.,
            znear: 0.01,
            zfar: 100.,
        }
    }

    /// Unit viewing direction.
    pub fn forward(&self) -> Vector3<Float> {
        let (az, el) = (self.azimuth.to_radians(), self.elevation.to_radians());
        Vector3::new(el.cos() * az.cos(), el.cos() * az.sin(), el.sin())
    }

    pub fn eye(&self) -> Point3<Float> {
        Point3::from(self.lookat - self.distance * self.forward())
    }

    pub fn view(&self) -> Isometry3<Float> {
        Isometry3::look_at_rh(&self.eye(), &Point3::from(self.lookat), &Vector3::z())
    }

    /// World to wgpu clip space for a viewport of the given aspect ratio.
    pub fn view_projection(&self, aspect: Float) -> Matrix4<Float> {
        let projection = Perspective3::new(aspect, self.fovy.to_radians(), self.znear, self.zfar);
        OPENGL_TO_WGPU * projection.to_homogeneous() * self.view().to_homogeneous()
    }
}
