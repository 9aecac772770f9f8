//! Event-driven MJCF reader that builds a `Model` in a single pass.

use std::collections::HashSet;

use na::{
    vector, Isometry3, Matrix3, Translation3, Unit, UnitQuaternion, UnitVector3, Vector3,
};
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use tracing::{debug, warn};

use crate::{
    error::ModelError,
    inertia::SpatialInertia,
    integrators::Integrator,
    joint::Joint,
    mechanism::{Actuator, Model},
    rigid_body::{Geom, GeomShape, RigidBody, Site},
    types::Float,
    PI,
};

const DEFAULT_RGBA: [f32; 4] = [0.5, 0.5, 0.5, 1.0];
const DEFAULT_SITE_SIZE: Float = 0.005;

#[derive(Debug, Clone, Copy, PartialEq)]
enum AngleUnit {
    Degree,
    Radian,
}

impl AngleUnit {
    fn to_radians(self, value: Float) -> Float {
        match self {
            AngleUnit::Degree => value * PI / 180.,
            AngleUnit::Radian => value,
        }
    }
}

/// Start or empty tag with its attributes copied out of the read buffer.
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
}

enum Tag {
    Open(Element),
    Leaf(Element),
    Close,
    Eof,
}

impl Element {
    /// Copy out the tag name and unescaped attribute values. Duplicate or
    /// value-less attributes are errors; `position` is the tag's byte offset.
    fn from_start(e: &BytesStart, position: u64) -> Result<Self, ModelError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let mut attributes = vec![];
        for attr in e.attributes() {
            let attr = attr.map_err(|source| ModelError::Attribute {
                element: name.clone(),
                position,
                source,
            })?;
            let value = attr
                .unescape_value()
                .map_err(|source| ModelError::Xml { position, source })?;
            attributes.push((
                String::from_utf8_lossy(attr.key.as_ref()).to_string(),
                value.into_owned(),
            ));
        }
        Ok(Element { name, attributes })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn name_attr(&self) -> String {
        self.get("name").unwrap_or_default().to_string()
    }

    fn invalid(&self, key: &str) -> ModelError {
        ModelError::InvalidAttribute {
            element: self.name.clone(),
            attribute: key.to_string(),
            value: self.get(key).unwrap_or_default().to_string(),
        }
    }

    /// Whitespace separated numbers. Every token must parse.
    fn floats(&self, key: &str) -> Result<Option<Vec<Float>>, ModelError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        value
            .split_whitespace()
            .map(|token| token.parse::<Float>().map_err(|_| self.invalid(key)))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Number list with a length in `min..=max`.
    fn floats_between(
        &self,
        key: &str,
        min: usize,
        max: usize,
    ) -> Result<Option<Vec<Float>>, ModelError> {
        match self.floats(key)? {
            Some(values) if values.len() < min || values.len() > max => Err(self.invalid(key)),
            other => Ok(other),
        }
    }

    fn float(&self, key: &str) -> Result<Option<Float>, ModelError> {
        Ok(self.floats_between(key, 1, 1)?.map(|v| v[0]))
    }

    fn vector3(&self, key: &str) -> Result<Option<Vector3<Float>>, ModelError> {
        Ok(self
            .floats_between(key, 3, 3)?
            .map(|v| vector![v[0], v[1], v[2]]))
    }

    fn rgba(&self) -> Result<Option<[f32; 4]>, ModelError> {
        Ok(self
            .floats_between("rgba", 4, 4)?
            .map(|v| [v[0] as f32, v[1] as f32, v[2] as f32, v[3] as f32]))
    }

    fn unit_axis(&self, key: &str, default: Vector3<Float>) -> Result<UnitVector3<Float>, ModelError> {
        let axis = self.vector3(key)?.unwrap_or(default);
        Unit::try_new(axis, 1e-10).ok_or_else(|| self.invalid(key))
    }

    /// Orientation from `quat` (w x y z), `euler` (intrinsic x-y-z) or
    /// `axisangle`, identity when none is given.
    fn orientation(&self, angle: AngleUnit) -> Result<UnitQuaternion<Float>, ModelError> {
        if let Some(q) = self.floats_between("quat", 4, 4)? {
            let quat = na::Quaternion::new(q[0], q[1], q[2], q[3]);
            return UnitQuaternion::try_new(quat, 1e-10).ok_or_else(|| self.invalid("quat"));
        }
        if let Some(e) = self.vector3("euler")? {
            let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angle.to_radians(e.x));
            let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle.to_radians(e.y));
            let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle.to_radians(e.z));
            return Ok(rx * ry * rz);
        }
        if let Some(a) = self.floats_between("axisangle", 4, 4)? {
            let axis = Unit::try_new(vector![a[0], a[1], a[2]], 1e-10)
                .ok_or_else(|| self.invalid("axisangle"))?;
            return Ok(UnitQuaternion::from_axis_angle(&axis, angle.to_radians(a[3])));
        }
        Ok(UnitQuaternion::identity())
    }

    fn pose(&self, angle: AngleUnit) -> Result<Isometry3<Float>, ModelError> {
        let pos = self.vector3("pos")?.unwrap_or_else(Vector3::zeros);
        Ok(Isometry3::from_parts(
            Translation3::from(pos),
            self.orientation(angle)?,
        ))
    }
}

struct MotorSpec {
    name: String,
    joint: String,
    gear: Float,
    ctrl_range: Option<(Float, Float)>,
}

pub(super) struct MjcfParser<'a> {
    reader: Reader<&'a [u8]>,
    buf: Vec<u8>,
    angle: AngleUnit,
    model: Model,
    inertials: Vec<Option<SpatialInertia>>,
    motors: Vec<MotorSpec>,
}

impl<'a> MjcfParser<'a> {
    pub(super) fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        MjcfParser {
            reader,
            buf: Vec::new(),
            angle: AngleUnit::Degree,
            model: Model::empty("MuJoCo Model"),
            inertials: vec![None],
            motors: vec![],
        }
    }

    pub(super) fn parse(mut self) -> Result<Model, ModelError> {
        loop {
            match self.next_tag()? {
                Tag::Open(el) if el.name == "mujoco" => {
                    self.parse_mujoco(&el, true)?;
                    return self.finish();
                }
                Tag::Leaf(el) if el.name == "mujoco" => {
                    self.parse_mujoco(&el, false)?;
                    return self.finish();
                }
                Tag::Open(_) | Tag::Leaf(_) | Tag::Eof => return Err(ModelError::MissingRoot),
                Tag::Close => {}
            }
        }
    }

    fn next_tag(&mut self) -> Result<Tag, ModelError> {
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|source| ModelError::Xml {
                    position: self.reader.error_position(),
                    source,
                })?;
            let position = self.reader.buffer_position() as u64;
            return Ok(match event {
                Event::Start(ref e) => Tag::Open(Element::from_start(e, position)?),
                Event::Empty(ref e) => Tag::Leaf(Element::from_start(e, position)?),
                Event::End(_) => Tag::Close,
                Event::Eof => Tag::Eof,
                _ => continue, // declarations, comments, text
            });
        }
    }

    /// Consume the children of an element that was just opened.
    fn skip_children(&mut self, name: &str) -> Result<(), ModelError> {
        debug!(element = name, "skipping unsupported element");
        let mut depth = 1;
        while depth > 0 {
            match self.next_tag()? {
                Tag::Open(_) => depth += 1,
                Tag::Close => depth -= 1,
                Tag::Leaf(_) => {}
                Tag::Eof => return Err(ModelError::UnexpectedEof),
            }
        }
        Ok(())
    }

    fn parse_mujoco(&mut self, root: &Element, open: bool) -> Result<(), ModelError> {
        if let Some(name) = root.get("model") {
            self.model.name = name.to_string();
        }
        if !open {
            return Ok(());
        }

        loop {
            let (el, open) = match self.next_tag()? {
                Tag::Open(el) => (el, true),
                Tag::Leaf(el) => (el, false),
                Tag::Close => return Ok(()),
                Tag::Eof => return Err(ModelError::UnexpectedEof),
            };
            match el.name.as_str() {
                "compiler" => {
                    self.parse_compiler(&el)?;
                    if open {
                        self.skip_children(&el.name)?;
                    }
                }
                "option" => {
                    self.parse_option(&el)?;
                    if open {
                        self.skip_children(&el.name)?;
                    }
                }
                "worldbody" if open => self.parse_body_children(0)?,
                "actuator" if open => self.parse_actuators()?,
                _ if open => self.skip_children(&el.name)?,
                _ => {}
            }
        }
    }

    fn parse_compiler(&mut self, el: &Element) -> Result<(), ModelError> {
        match el.get("angle") {
            None | Some("degree") => self.angle = AngleUnit::Degree,
            Some("radian") => self.angle = AngleUnit::Radian,
            Some(_) => return Err(el.invalid("angle")),
        }
        Ok(())
    }

    fn parse_option(&mut self, el: &Element) -> Result<(), ModelError> {
        let options = &mut self.model.options;
        if let Some(timestep) = el.float("timestep")? {
            if timestep <= 0. {
                return Err(el.invalid("timestep"));
            }
            options.timestep = timestep;
        }
        if let Some(gravity) = el.vector3("gravity")? {
            options.gravity = gravity;
        }
        match el.get("integrator") {
            None | Some("Euler") => options.integrator = Integrator::SemiImplicitEuler,
            Some("RK4") => options.integrator = Integrator::RungeKutta4,
            Some(other @ ("implicit" | "implicitfast")) => {
                warn!(integrator = other, "implicit integrators unsupported, using Euler");
                options.integrator = Integrator::SemiImplicitEuler;
            }
            Some(other) => {
                return Err(ModelError::UnknownType {
                    kind: "integrator",
                    value: other.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Parse the content of `<worldbody>` or `<body>` until its closing tag.
    fn parse_body_children(&mut self, bodyid: usize) -> Result<(), ModelError> {
        loop {
            let (el, open) = match self.next_tag()? {
                Tag::Open(el) => (el, true),
                Tag::Leaf(el) => (el, false),
                Tag::Close => return Ok(()),
                Tag::Eof => return Err(ModelError::UnexpectedEof),
            };

            if el.name == "body" {
                let childid = self.add_body(&el, bodyid)?;
                if open {
                    self.parse_body_children(childid)?;
                }
                continue;
            }

            match el.name.as_str() {
                "joint" => self.add_joint(&el, bodyid)?,
                "geom" => self.add_geom(&el, bodyid)?,
                "site" => self.add_site(&el, bodyid)?,
                "inertial" => self.add_inertial(&el, bodyid)?,
                _ => {}
            }
            if open {
                self.skip_children(&el.name)?;
            }
        }
    }

    fn add_body(&mut self, el: &Element, parent: usize) -> Result<usize, ModelError> {
        let body = RigidBody::new(&el.name_attr(), parent, el.pose(self.angle)?);
        self.model.bodies.push(body);
        self.inertials.push(None);
        Ok(self.model.bodies.len() - 1)
    }

    fn add_joint(&mut self, el: &Element, bodyid: usize) -> Result<(), ModelError> {
        let name = el.name_attr();
        if bodyid == 0 {
            return Err(ModelError::WorldJoint(name));
        }
        let axis = el.unit_axis("axis", Vector3::z())?;
        let mut joint = match el.get("type").unwrap_or("hinge") {
            "hinge" => {
                let anchor = el.vector3("pos")?.unwrap_or_else(Vector3::zeros);
                Joint::revolute(&name, bodyid, anchor, axis)
            }
            "slide" => Joint::prismatic(&name, bodyid, axis),
            other => {
                return Err(ModelError::UnknownType {
                    kind: "joint",
                    value: other.to_string(),
                })
            }
        };
        joint.damping = el.float("damping")?.unwrap_or(0.);
        joint.armature = el.float("armature")?.unwrap_or(0.);

        self.model.joints.push(joint);
        let jointid = self.model.joints.len() - 1;
        self.model.bodies[bodyid].joints.push(jointid);
        Ok(())
    }

    fn add_geom(&mut self, el: &Element, bodyid: usize) -> Result<(), ModelError> {
        let kind = el.get("type").unwrap_or("sphere");
        let size = el.floats_between("size", 0, 3)?.unwrap_or_default();
        let size_at = |i: usize| size.get(i).copied().ok_or_else(|| el.invalid("size"));

        let mut pose = el.pose(self.angle)?;
        let mut half_length = None;
        if let Some(ends) = el.floats_between("fromto", 6, 6)? {
            if kind != "capsule" && kind != "cylinder" {
                return Err(el.invalid("fromto"));
            }
            let from = vector![ends[0], ends[1], ends[2]];
            let to = vector![ends[3], ends[4], ends[5]];
            let dir = to - from;
            if dir.norm() < 1e-10 {
                return Err(el.invalid("fromto"));
            }
            // Geom z axis runs along the segment
            let rotation = UnitQuaternion::rotation_between(&Vector3::z(), &dir).unwrap_or_else(
                || UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI),
            );
            pose = Isometry3::from_parts(Translation3::from((from + to) / 2.), rotation);
            half_length = Some(dir.norm() / 2.);
        }

        let shape = match kind {
            "plane" => GeomShape::Plane {
                half_x: size.first().copied().unwrap_or(0.),
                half_y: size.get(1).copied().unwrap_or(0.),
            },
            "sphere" => GeomShape::Sphere {
                radius: size_at(0)?,
            },
            "capsule" => GeomShape::Capsule {
                radius: size_at(0)?,
                half_length: match half_length {
                    Some(h) => h,
                    None => size_at(1)?,
                },
            },
            "cylinder" => GeomShape::Cylinder {
                radius: size_at(0)?,
                half_length: match half_length {
                    Some(h) => h,
                    None => size_at(1)?,
                },
            },
            "box" => GeomShape::Cuboid {
                half_extents: vector![size_at(0)?, size_at(1)?, size_at(2)?],
            },
            other => {
                return Err(ModelError::UnknownType {
                    kind: "geom",
                    value: other.to_string(),
                })
            }
        };

        let mut geom = Geom::new(&el.name_attr(), shape, pose);
        geom.mass = el.float("mass")?;
        if let Some(density) = el.float("density")? {
            geom.density = density;
        }
        geom.rgba = el.rgba()?.unwrap_or(DEFAULT_RGBA);
        self.model.bodies[bodyid].geoms.push(geom);
        Ok(())
    }

    fn add_site(&mut self, el: &Element, bodyid: usize) -> Result<(), ModelError> {
        let size = el.floats_between("size", 1, 3)?;
        self.model.sites.push(Site {
            name: el.name_attr(),
            body: bodyid,
            pos: el.vector3("pos")?.unwrap_or_else(Vector3::zeros),
            size: size.map_or(DEFAULT_SITE_SIZE, |s| s[0]),
            rgba: el.rgba()?.unwrap_or(DEFAULT_RGBA),
        });
        Ok(())
    }

    fn add_inertial(&mut self, el: &Element, bodyid: usize) -> Result<(), ModelError> {
        let mass = el.float("mass")?.ok_or_else(|| el.invalid("mass"))?;
        if mass < 0. {
            return Err(el.invalid("mass"));
        }

        let moment_principal = if let Some(d) = el.vector3("diaginertia")? {
            Matrix3::from_diagonal(&d)
        } else if let Some(f) = el.floats_between("fullinertia", 6, 6)? {
            // ixx iyy izz ixy ixz iyz
            Matrix3::new(f[0], f[3], f[4], f[3], f[1], f[5], f[4], f[5], f[2])
        } else {
            return Err(el.invalid("diaginertia"));
        };

        let frame = el.pose(self.angle)?;
        let rotation = frame.rotation.to_rotation_matrix();
        let moment_com = rotation.matrix() * moment_principal * rotation.matrix().transpose();
        self.inertials[bodyid] = Some(SpatialInertia::from_com(
            mass,
            &frame.translation.vector,
            &moment_com,
        ));
        Ok(())
    }

    fn parse_actuators(&mut self) -> Result<(), ModelError> {
        loop {
            let (el, open) = match self.next_tag()? {
                Tag::Open(el) => (el, true),
                Tag::Leaf(el) => (el, false),
                Tag::Close => return Ok(()),
                Tag::Eof => return Err(ModelError::UnexpectedEof),
            };
            if el.name == "motor" {
                self.add_motor(&el)?;
            } else {
                warn!(element = %el.name, "only motor actuators are supported, skipping");
            }
            if open {
                self.skip_children(&el.name)?;
            }
        }
    }

    fn add_motor(&mut self, el: &Element) -> Result<(), ModelError> {
        let name = el.name_attr();
        let joint = el.get("joint").ok_or_else(|| el.invalid("joint"))?.to_string();
        let gear = el.floats_between("gear", 1, 6)?.map_or(1., |g| g[0]);

        let range = match el.floats_between("ctrlrange", 2, 2)? {
            Some(r) if r[0] > r[1] => return Err(el.invalid("ctrlrange")),
            Some(r) => Some((r[0], r[1])),
            None => None,
        };
        let ctrl_range = match el.get("ctrllimited") {
            None | Some("auto") => range,
            Some("true") => Some(range.ok_or_else(|| el.invalid("ctrlrange"))?),
            Some("false") => None,
            Some(_) => return Err(el.invalid("ctrllimited")),
        };

        self.motors.push(MotorSpec {
            name,
            joint,
            gear,
            ctrl_range,
        });
        Ok(())
    }

    fn finish(mut self) -> Result<Model, ModelError> {
        for motor in std::mem::take(&mut self.motors) {
            let joint = self
                .model
                .joint_id(&motor.joint)
                .ok_or_else(|| ModelError::UnknownJoint {
                    actuator: motor.name.clone(),
                    joint: motor.joint.clone(),
                })?;
            self.model.actuators.push(Actuator {
                name: motor.name,
                joint,
                gear: motor.gear,
                ctrl_range: motor.ctrl_range,
            });
        }

        for (body, inertial) in self.model.bodies.iter_mut().zip(self.inertials.iter_mut()) {
            body.inertia = match inertial.take() {
                Some(inertia) => inertia,
                None => body.inertia_from_geoms(),
            };
        }

        check_masses(&self.model)?;
        check_unique_names(&self.model)?;
        Ok(self.model)
    }
}

/// Every body moved by a joint must carry mass itself or through its
/// descendants.
fn check_masses(model: &Model) -> Result<(), ModelError> {
    let mut subtree_mass: Vec<Float> = model.bodies.iter().map(|b| b.inertia.mass).collect();
    for bodyid in (1..model.bodies.len()).rev() {
        if let Some(parentid) = model.bodies[bodyid].parent {
            subtree_mass[parentid] += subtree_mass[bodyid];
        }
    }
    for (body, mass) in model.bodies.iter().zip(subtree_mass.iter()) {
        if !body.joints.is_empty() && *mass <= 0. {
            return Err(ModelError::MasslessBody(body.name.clone()));
        }
    }
    Ok(())
}

fn check_unique_names(model: &Model) -> Result<(), ModelError> {
    fn unique<'n>(
        kind: &'static str,
        names: impl Iterator<Item = &'n String>,
    ) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        for name in names.filter(|n| !n.is_empty()) {
            if !seen.insert(name) {
                return Err(ModelError::DuplicateName {
                    kind,
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    unique("body", model.bodies.iter().map(|b| &b.name))?;
    unique("joint", model.joints.iter().map(|j| &j.name))?;
    unique("geom", model.bodies.iter().flat_map(|b| b.geoms.iter().map(|g| &g.name)))?;
    unique("site", model.sites.iter().map(|s| &s.name))?;
    unique("actuator", model.actuators.iter().map(|a| &a.name))?;
    Ok(())
}
