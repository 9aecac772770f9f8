use na::{vector, Isometry3, Matrix3, Vector3};

use crate::{inertia::SpatialInertia, types::Float, PI};

/// Geometric primitive attached to a body. Sizes follow the model
/// description's conventions (half lengths, radii).
#[derive(Debug, Clone, PartialEq)]
pub enum GeomShape {
    Plane { half_x: Float, half_y: Float },
    Sphere { radius: Float },
    Capsule { radius: Float, half_length: Float },
    Cylinder { radius: Float, half_length: Float },
    Cuboid { half_extents: Vector3<Float> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geom {
    pub name: String,
    pub shape: GeomShape,
    pub pose: Isometry3<Float>, // geom frame to body frame
    pub rgba: [f32; 4],
    pub mass: Option<Float>,
    pub density: Float,
}

impl Geom {
    pub fn new(name: &str, shape: GeomShape, pose: Isometry3<Float>) -> Self {
        Geom {
            name: name.to_string(),
            shape,
            pose,
            rgba: [0.5, 0.5, 0.5, 1.0],
            mass: None,
            density: 1000.,
        }
    }

    pub fn volume(&self) -> Float {
        match &self.shape {
            GeomShape::Plane { .. } => 0.,
            GeomShape::Sphere { radius: r } => 4. / 3. * PI * r * r * r,
            GeomShape::Capsule {
                radius: r,
                half_length: h,
            } => PI * r * r * 2. * h + 4. / 3. * PI * r * r * r,
            GeomShape::Cylinder {
                radius: r,
                half_length: h,
            } => PI * r * r * 2. * h,
            GeomShape::Cuboid { half_extents: e } => 8. * e.x * e.y * e.z,
        }
    }

    /// Spatial inertia of the geom expressed in its body frame, or None for
    /// massless geoms such as planes.
    pub fn inertia(&self) -> Option<SpatialInertia> {
        let volume = self.volume();
        if volume <= 0. {
            return None;
        }
        let m = self.mass.unwrap_or(self.density * volume);

        let diag = match &self.shape {
            GeomShape::Plane { .. } => return None,
            GeomShape::Sphere { radius: r } => {
                let i = 2. / 5. * m * r * r;
                vector![i, i, i]
            }
            GeomShape::Capsule {
                radius: r,
                half_length: h,
            } => {
                // cylinder plus two hemispherical caps, split by volume
                let l = 2. * h;
                let v_cyl = PI * r * r * l;
                let m_cyl = m * v_cyl / volume;
                let m_caps = m - m_cyl;
                let i_axis = m_cyl * r * r / 2. + m_caps * 2. * r * r / 5.;
                let i_side = m_cyl * (r * r / 4. + l * l / 12.)
                    + m_caps * (2. * r * r / 5. + l * l / 4. + 3. * l * r / 8.);
                vector![i_side, i_side, i_axis]
            }
            GeomShape::Cylinder {
                radius: r,
                half_length: h,
            } => {
                let l = 2. * h;
                let i_side = m * (3. * r * r + l * l) / 12.;
                vector![i_side, i_side, m * r * r / 2.]
            }
            GeomShape::Cuboid { half_extents: e } => {
                let (x, y, z) = (2. * e.x, 2. * e.y, 2. * e.z);
                vector![
                    m * (y * y + z * z) / 12.,
                    m * (x * x + z * z) / 12.,
                    m * (x * x + y * y) / 12.
                ]
            }
        };

        let local = SpatialInertia::from_com(m, &Vector3::zeros(), &Matrix3::from_diagonal(&diag));
        Some(local.transform(&self.pose))
    }
}

/// A named point attached to a body, e.g. an end-effector.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub name: String,
    pub body: usize,
    pub pos: Vector3<Float>,
    pub size: Float,
    pub rgba: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub name: String,
    pub parent: Option<usize>,      // None only for the world body
    pub offset: Isometry3<Float>,   // body frame to parent frame at q = 0
    pub inertia: SpatialInertia,    // expressed in body frame
    pub joints: Vec<usize>,
    pub geoms: Vec<Geom>,
}

impl RigidBody {
    pub fn world() -> Self {
        RigidBody {
            name: "world".to_string(),
            parent: None,
            offset: Isometry3::identity(),
            inertia: SpatialInertia::zero(),
            joints: vec![],
            geoms: vec![],
        }
    }

    pub fn new(name: &str, parent: usize, offset: Isometry3<Float>) -> Self {
        RigidBody {
            name: name.to_string(),
            parent: Some(parent),
            offset,
            inertia: SpatialInertia::zero(),
            joints: vec![],
            geoms: vec![],
        }
    }

    /// Sum of the inertias of all geoms of the body.
    pub fn inertia_from_geoms(&self) -> SpatialInertia {
        let mut inertia = SpatialInertia::zero();
        for geom in self.geoms.iter() {
            if let Some(geom_inertia) = geom.inertia() {
                inertia += &geom_inertia;
            }
        }
        inertia
    }
}

#[cfg(test)]
mod rigid_body_tests {
    use na::{Translation3, UnitQuaternion};

    use crate::assert_close;

    use super::*;

    #[test]
    fn sphere_inertia_from_density() {
        // Arrange
        let r = 0.1;
        let geom = Geom::new("ball", GeomShape::Sphere { radius: r }, Isometry3::identity());

        // Act
        let inertia = geom.inertia().unwrap();

        // Assert
        let m = 1000. * 4. / 3. * PI * r * r * r;
        assert_close!(inertia.mass, m, 1e-9);
        assert_close!(inertia.moment[(0, 0)], 2. / 5. * m * r * r, 1e-12);
    }

    #[test]
    fn explicit_mass_overrides_density() {
        let mut geom = Geom::new(
            "box",
            GeomShape::Cuboid {
                half_extents: vector![0.5, 0.5, 0.5],
            },
            Isometry3::from_parts(Translation3::new(0., 0., -1.), UnitQuaternion::identity()),
        );
        geom.mass = Some(2.);

        let inertia = geom.inertia().unwrap();

        assert_close!(inertia.mass, 2., 1e-12);
        assert_close!(inertia.center_of_mass().z, -1., 1e-12);
        // m/6 about own center plus m * 1^2 from the offset
        assert_close!(inertia.moment[(0, 0)], 2. / 6. + 2., 1e-12);
    }

    #[test]
    fn thin_capsule_approaches_rod() {
        let geom = Geom::new(
            "rod",
            GeomShape::Capsule {
                radius: 1e-4,
                half_length: 0.5,
            },
            Isometry3::identity(),
        );

        let inertia = geom.inertia().unwrap();

        let m = inertia.mass;
        assert_close!(inertia.moment[(0, 0)] / (m / 12.), 1., 1e-3);
    }

    #[test]
    fn plane_has_no_mass() {
        let geom = Geom::new(
            "floor",
            GeomShape::Plane {
                half_x: 1.,
                half_y: 1.,
            },
            Isometry3::identity(),
        );
        assert!(geom.inertia().is_none());
    }
}
