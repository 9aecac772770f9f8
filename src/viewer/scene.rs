use bytemuck::{Pod, Zeroable};
use na::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    mechanism::{MechanismState, Model},
    rigid_body::{Geom, GeomShape},
    types::Float,
    TWO_PI,
};

const SEGMENTS: usize = 24; // per full circle
const FLOOR_HALF_SIZE: Float = 5.; // used for planes of unbounded size
const FLOOR_CELLS: usize = 20; // per side
const FLOOR_RGBA: [f32; 4] = [0.45, 0.5, 0.55, 1.];
const MIN_SITE_RADIUS: Float = 0.015;
const TARGET_SIZE: Float = 0.03;
const TARGET_RGBA: [f32; 4] = [1., 0.2, 0.2, 1.];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Which parts of the model are drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisualOptions {
    pub floor: bool,
    pub geoms: bool,
    pub sites: bool,
    pub target: bool,
}

impl Default for VisualOptions {
    fn default() -> Self {
        VisualOptions {
            floor: true,
            geoms: true,
            sites: true,
            target: true,
        }
    }
}

/// Wireframe of the current model pose, as a line list in world
/// coordinates. At most `max_objects` objects (geoms, sites, the target)
/// are drawn per frame; the rest are dropped.
pub struct Scene {
    pub vertices: Vec<LineVertex>,
    max_objects: usize,
    objects: usize,
    overflow_reported: bool,
}

impl Scene {
    pub fn new(max_objects: usize) -> Self {
        Scene {
            vertices: vec![],
            max_objects,
            objects: 0,
            overflow_reported: false,
        }
    }

    /// Number of objects drawn by the last update.
    pub fn objects(&self) -> usize {
        self.objects
    }

    /// Rebuild the scene from the current state.
    pub fn update(
        &mut self,
        model: &Model,
        state: &MechanismState,
        target: Option<Vector3<Float>>,
        options: &VisualOptions,
    ) {
        self.vertices.clear();
        self.objects = 0;
        let mut dropped = 0;

        for (body, pose) in model.bodies.iter().zip(state.bodies_to_world.iter()) {
            for geom in body.geoms.iter() {
                let is_floor = matches!(geom.shape, GeomShape::Plane { .. });
                if (is_floor && !options.floor) || (!is_floor && !options.geoms) {
                    continue;
                }
                if !self.reserve() {
                    dropped += 1;
                    continue;
                }
                self.add_geom(&(pose * geom.pose), geom);
            }
        }

        if options.sites {
            for (site, position) in model.sites.iter().zip(state.site_xpos.iter()) {
                if !self.reserve() {
                    dropped += 1;
                    continue;
                }
                let radius = site.size.max(MIN_SITE_RADIUS);
                self.add_sphere(&Isometry3::translation(position.x, position.y, position.z), radius, site.rgba);
            }
        }

        if let (true, Some(target)) = (options.target, target) {
            if self.reserve() {
                self.add_cross(&target, TARGET_SIZE, TARGET_RGBA);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 && !self.overflow_reported {
            warn!(
                capacity = self.max_objects,
                dropped, "scene is full, some objects are not drawn"
            );
            self.overflow_reported = true;
        }
    }

    fn reserve(&mut self) -> bool {
        if self.objects < self.max_objects {
            self.objects += 1;
            true
        } else {
            false
        }
    }

    fn add_geom(&mut self, pose: &Isometry3<Float>, geom: &Geom) {
        let color = geom.rgba;
        match &geom.shape {
            GeomShape::Plane { half_x, half_y } => {
                let hx = if *half_x > 0. { *half_x } else { FLOOR_HALF_SIZE };
                let hy = if *half_y > 0. { *half_y } else { FLOOR_HALF_SIZE };
                self.add_grid(pose, hx, hy);
            }
            GeomShape::Sphere { radius } => self.add_sphere(pose, *radius, color),
            GeomShape::Capsule {
                radius,
                half_length,
            } => {
                self.add_tube(pose, *radius, *half_length, color);
                for (sign, from) in [(1., 0.), (-1., 0.5)] {
                    let end = pose * Isometry3::translation(0., 0., sign * half_length);
                    // half circles closing the ends, in the xz and yz planes
                    self.add_arc(&end, *radius, Vector3::x(), Vector3::z(), from, 0.5, color);
                    self.add_arc(&end, *radius, Vector3::y(), Vector3::z(), from, 0.5, color);
                }
            }
            GeomShape::Cylinder {
                radius,
                half_length,
            } => self.add_tube(pose, *radius, *half_length, color),
            GeomShape::Cuboid { half_extents } => self.add_box(pose, half_extents, color),
        }
    }

    fn add_line(&mut self, a: &Point3<Float>, b: &Point3<Float>, color: [f32; 4]) {
        for p in [a, b] {
            self.vertices.push(LineVertex {
                position: [p.x as f32, p.y as f32, p.z as f32],
                color,
            });
        }
    }

    /// Arc of the circle spanned by local unit vectors `u` and `v`, from
    /// `start` to `start + fraction` of a full turn.
    #[allow(clippy::too_many_arguments)]
    fn add_arc(
        &mut self,
        pose: &Isometry3<Float>,
        radius: Float,
        u: Vector3<Float>,
        v: Vector3<Float>,
        start: Float,
        fraction: Float,
        color: [f32; 4],
    ) {
        let segments = ((SEGMENTS as Float * fraction).ceil() as usize).max(1);
        let point = |i: usize| {
            let angle = TWO_PI * (start + fraction * i as Float / segments as Float);
            pose * Point3::from(radius * (angle.cos() * u + angle.sin() * v))
        };
        for i in 0..segments {
            self.add_line(&point(i), &point(i + 1), color);
        }
    }

    fn add_circle(
        &mut self,
        pose: &Isometry3<Float>,
        radius: Float,
        u: Vector3<Float>,
        v: Vector3<Float>,
        color: [f32; 4],
    ) {
        self.add_arc(pose, radius, u, v, 0., 1., color);
    }

    fn add_sphere(&mut self, pose: &Isometry3<Float>, radius: Float, color: [f32; 4]) {
        self.add_circle(pose, radius, Vector3::x(), Vector3::y(), color);
        self.add_circle(pose, radius, Vector3::y(), Vector3::z(), color);
        self.add_circle(pose, radius, Vector3::z(), Vector3::x(), color);
    }

    /// Cylinder side along the local z axis.
    fn add_tube(&mut self, pose: &Isometry3<Float>, radius: Float, half_length: Float, color: [f32; 4]) {
        for z in [-half_length, half_length] {
            let end = pose * Isometry3::translation(0., 0., z);
            self.add_circle(&end, radius, Vector3::x(), Vector3::y(), color);
        }
        for i in 0..4 {
            let angle = TWO_PI * i as Float / 4.;
            let (x, y) = (radius * angle.cos(), radius * angle.sin());
            self.add_line(
                &(pose * Point3::new(x, y, -half_length)),
                &(pose * Point3::new(x, y, half_length)),
                color,
            );
        }
    }

    fn add_box(&mut self, pose: &Isometry3<Float>, half: &Vector3<Float>, color: [f32; 4]) {
        let corner = |i: usize| {
            let sign = |bit: usize| if i & bit == 0 { -1. } else { 1. };
            pose * Point3::new(sign(1) * half.x, sign(2) * half.y, sign(4) * half.z)
        };
        // corners differing in exactly one bit share an edge
        for i in 0..8 {
            for bit in [1, 2, 4] {
                if i & bit == 0 {
                    self.add_line(&corner(i), &corner(i | bit), color);
                }
            }
        }
    }

    fn add_grid(&mut self, pose: &Isometry3<Float>, half_x: Float, half_y: Float) {
        for i in 0..=FLOOR_CELLS {
            let s = -1. + 2. * i as Float / FLOOR_CELLS as Float;
            self.add_line(
                &(pose * Point3::new(s * half_x, -half_y, 0.)),
                &(pose * Point3::new(s * half_x, half_y, 0.)),
                FLOOR_RGBA,
            );
            self.add_line(
                &(pose * Point3::new(-half_x, s * half_y, 0.)),
                &(pose * Point3::new(half_x, s * half_y, 0.)),
                FLOOR_RGBA,
            );
        }
    }

    fn add_cross(&mut self, center: &Vector3<Float>, size: Float, color: [f32; 4]) {
        let center = Point3::from(*center);
        for axis in [Vector3::x(), Vector3::y(), Vector3::z()] {
            self.add_line(&(center - size * axis), &(center + size * axis), color);
        }
    }
}

#[cfg(test)]
mod scene_tests {
    use na::vector;

    use crate::{assert_close, mjcf::load_model_from_str};

    use super::*;

    const BALL: &str = r#"
<mujoco>
  <worldbody>
    <geom name="floor" type="plane" size="0 0 0.1"/>
    <body name="ball" pos="0 0 2">
      <joint axis="0 1 0"/>
      <geom type="sphere" size="0.1"/>
      <site name="tip" pos="0 0 0.1"/>
    </body>
  </worldbody>
</mujoco>
"#;

    fn ball() -> (Model, MechanismState) {
        let model = load_model_from_str(BALL).unwrap();
        let state = model.make_state();
        (model, state)
    }

    #[test]
    fn draws_floor_geoms_sites_and_target() {
        // Arrange
        let (model, state) = ball();
        let mut scene = Scene::new(100);

        // Act
        scene.update(&model, &state, Some(vector![1., 0., 1.]), &VisualOptions::default());

        // Assert
        assert_eq!(scene.objects(), 4);
        let floor = 2 * 2 * (FLOOR_CELLS + 1);
        let spheres = 2 * 2 * 3 * SEGMENTS;
        let cross = 2 * 3;
        assert_eq!(scene.vertices.len(), floor + spheres + cross);
    }

    #[test]
    fn sphere_wireframe_follows_the_body() {
        let (model, state) = ball();
        let options = VisualOptions {
            floor: false,
            sites: false,
            ..Default::default()
        };
        let mut scene = Scene::new(100);

        scene.update(&model, &state, None, &options);

        assert_eq!(scene.objects(), 1);
        for vertex in scene.vertices.iter() {
            let p = Vector3::from(vertex.position).cast::<Float>();
            assert_close!((p - vector![0., 0., 2.]).norm(), 0.1, 1e-6);
        }
    }

    #[test]
    fn unbounded_floor_gets_a_default_extent() {
        let (model, state) = ball();
        let options = VisualOptions {
            geoms: false,
            sites: false,
            target: false,
            floor: true,
        };
        let mut scene = Scene::new(100);

        scene.update(&model, &state, None, &options);

        let max_x = scene
            .vertices
            .iter()
            .map(|v| v.position[0])
            .fold(f32::MIN, f32::max);
        assert_eq!(max_x, FLOOR_HALF_SIZE as f32);
        assert!(scene.vertices.iter().all(|v| v.position[2] == 0.));
    }

    #[test]
    fn objects_beyond_capacity_are_dropped() {
        let (model, state) = ball();
        let mut scene = Scene::new(2);

        scene.update(&model, &state, Some(vector![0., 0., 0.]), &VisualOptions::default());
        assert_eq!(scene.objects(), 2);

        // the next frame starts from an empty scene
        scene.update(&model, &state, None, &VisualOptions::default());
        assert_eq!(scene.objects(), 2);
    }

    #[test]
    fn box_has_twelve_edges() {
        let model = load_model_from_str(
            r#"<mujoco><worldbody><geom type="box" size="0.1 0.2 0.3"/></worldbody></mujoco>"#,
        )
        .unwrap();
        let state = model.make_state();
        let mut scene = Scene::new(10);

        scene.update(&model, &state, None, &VisualOptions::default());

        assert_eq!(scene.vertices.len(), 2 * 12);
        for vertex in scene.vertices.iter() {
            assert_close!(vertex.position[0].abs(), 0.1, 1e-6);
            assert_close!(vertex.position[1].abs(), 0.2, 1e-6);
            assert_close!(vertex.position[2].abs(), 0.3, 1e-6);
        }
    }

    #[test]
    fn nothing_is_drawn_with_everything_disabled() {
        let (model, state) = ball();
        let options = VisualOptions {
            floor: false,
            geoms: false,
            sites: false,
            target: false,
        };
        let mut scene = Scene::new(100);

        scene.update(&model, &state, Some(vector![0., 0., 1.]), &options);

        assert!(scene.vertices.is_empty());
        assert_eq!(scene.objects(), 0);
    }
}
