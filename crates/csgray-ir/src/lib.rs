//! Declarative scene description for the csgray ray-tracing engine.
//!
//! This crate defines the input contract of the engine: surfaces, sides,
//! materials, textures, objects, arrays and the relation programs that
//! combine surfaces into solids. It is purely declarative: no compiled
//! state, no buffers. Compilation into a traversal-ready form is handled by
//! `csgray-scene`.
//!
//! Documents are plain JSON, see [`SceneDesc::from_json`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel for an unbounded extent. Any bound whose magnitude reaches this
/// value is treated as infinite by the compiler.
pub const INF: f64 = 1.0e30;

/// 3D vector with f64 components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// All components zero.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// All components one.
    pub const fn one() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    /// Components as an array.
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// 2D vector with f64 components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
}

impl Vec2 {
    /// Create a new Vec2.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// =============================================================================
// Transforms
// =============================================================================

/// Object placement: scale, then rotation (degrees, X then Y then Z), then
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform3 {
    /// Per-axis scale factors.
    pub scale: Vec3,
    /// Rotation angles in degrees.
    pub rotation: Vec3,
    /// Translation.
    pub position: Vec3,
}

impl Default for Transform3 {
    fn default() -> Self {
        Self {
            scale: Vec3::one(),
            rotation: Vec3::zero(),
            position: Vec3::zero(),
        }
    }
}

impl Transform3 {
    /// Identity placement moved to `(x, y, z)`.
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            ..Self::default()
        }
    }

    /// Same placement with the given rotation in degrees.
    pub fn rotated(mut self, x: f64, y: f64, z: f64) -> Self {
        self.rotation = Vec3::new(x, y, z);
        self
    }

    /// Same placement with the given scale.
    pub fn scaled(mut self, x: f64, y: f64, z: f64) -> Self {
        self.scale = Vec3::new(x, y, z);
        self
    }
}

/// Texture-space mapping of a surface side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform2 {
    /// Texture scale.
    pub scale: Vec2,
    /// Texture rotation in degrees.
    pub rotation: f64,
    /// Texture offset.
    pub position: Vec2,
}

impl Default for Transform2 {
    fn default() -> Self {
        Self {
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
            position: Vec2::new(0.0, 0.0),
        }
    }
}

// =============================================================================
// Surfaces
// =============================================================================

/// Primitive shape of a surface, in its local frame.
///
/// Every variant is a quadric, so the tracer handles all of them through a
/// single implicit form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SurfaceKind {
    /// The plane `z = 0`, outer side facing +z.
    Plane,
    /// Sphere centered at the origin.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Cylinder along Z.
    Cylinder {
        /// Radius.
        radius: f64,
    },
    /// Double cone along Z with the apex at the origin.
    Cone {
        /// Radius gained per unit of height.
        ratio: f64,
    },
    /// Paraboloid of revolution opening towards +z.
    Paraboloid {
        /// Focal parameter (radius² per unit of height).
        focal: f64,
    },
    /// Hyperboloid of one sheet (`waist > 0`) or two sheets (`waist < 0`).
    Hyperboloid {
        /// Radius gained per unit of height, asymptotically.
        ratio: f64,
        /// Signed squared radius at `z = 0`.
        waist: f64,
    },
    /// Parabolic cylinder, extruded along Y.
    ParaCylinder {
        /// Focal parameter.
        focal: f64,
    },
    /// Hyperbolic cylinder, extruded along Y.
    HyperCylinder {
        /// Asymptotic slope.
        ratio: f64,
        /// Signed squared half-width at `z = 0`.
        waist: f64,
    },
    /// Saddle surface `z = (x² - y²) / focal`.
    HyperParaboloid {
        /// Focal parameter.
        focal: f64,
    },
}

/// Per-axis local clipping interval. Bounds at or beyond [`INF`] in
/// magnitude are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds3 {
    /// Lower bound per axis.
    pub min: Vec3,
    /// Upper bound per axis.
    pub max: Vec3,
}

impl Default for Bounds3 {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Bounds3 {
    /// No clipping on any axis.
    pub const fn unbounded() -> Self {
        Self {
            min: Vec3::new(-INF, -INF, -INF),
            max: Vec3::new(INF, INF, INF),
        }
    }

    /// Clip to the given box.
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }
}

/// One side of a surface: texture mapping and material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Side {
    /// Texture-space mapping.
    #[serde(default)]
    pub map: Transform2,
    /// Material key referencing [`SceneDesc::materials`].
    pub material: String,
}

impl Side {
    /// A side with the identity mapping.
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            map: Transform2::default(),
            material: material.into(),
        }
    }
}

/// A clipped primitive with two sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    /// Primitive shape.
    pub kind: SurfaceKind,
    /// Local clipping interval.
    #[serde(default)]
    pub clip: Bounds3,
    /// Side facing away from the solid.
    pub outer: Side,
    /// Side facing into the solid.
    pub inner: Side,
}

impl Surface {
    /// Unclipped surface with the same material on both sides.
    pub fn new(kind: SurfaceKind, material: impl Into<String>) -> Self {
        let material = material.into();
        Self {
            kind,
            clip: Bounds3::unbounded(),
            outer: Side::new(material.clone()),
            inner: Side::new(material),
        }
    }

    /// Sphere of the given radius.
    pub fn sphere(radius: f64, material: impl Into<String>) -> Self {
        Self::new(SurfaceKind::Sphere { radius }, material)
    }

    /// Replace the clipping interval.
    pub fn clipped(mut self, min: Vec3, max: Vec3) -> Self {
        self.clip = Bounds3::new(min, max);
        self
    }
}

// =============================================================================
// Materials and textures
// =============================================================================

/// How a material interacts with light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialTag {
    /// Diffuse and specular shading.
    Plain,
    /// Emissive; not shaded by lights.
    Light,
    /// Shaded plus a mirror reflection.
    Metal,
}

/// Surface material, shared by name across surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Shading model.
    pub tag: MaterialTag,
    /// Texture key referencing [`SceneDesc::textures`].
    pub texture: String,
    /// `[diffuse, specular, power]`.
    #[serde(default = "default_props")]
    pub props: [f64; 3],
    /// `[reflect, transmit, refract]`.
    #[serde(default)]
    pub optics: [f64; 3],
    /// Index of refraction, when transmissive.
    #[serde(default)]
    pub ior: Option<f64>,
    /// Specular exponent override.
    #[serde(default)]
    pub exponent: Option<f64>,
}

fn default_props() -> [f64; 3] {
    [1.0, 0.0, 1.0]
}

impl Material {
    /// A plain diffuse material.
    pub fn plain(texture: impl Into<String>) -> Self {
        Self {
            tag: MaterialTag::Plain,
            texture: texture.into(),
            props: default_props(),
            optics: [0.0; 3],
            ior: None,
            exponent: None,
        }
    }
}

/// Surface coloring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Texture {
    /// Solid `0xRRGGBB` color.
    Color {
        /// Packed color.
        rgb: u32,
    },
    /// Procedural checkerboard in texture space.
    Checker {
        /// First color.
        a: u32,
        /// Second color.
        b: u32,
        /// Cell size.
        scale: f64,
    },
    /// Image file, loaded at compile time.
    Image {
        /// Path to the image.
        path: String,
    },
}

// =============================================================================
// Cameras and lights
// =============================================================================

/// A viewpoint looking down its local +z axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Ambient color, `0xRRGGBB`.
    pub color: u32,
    /// Ambient intensity.
    pub intensity: f64,
    /// Point-of-view (focal) distance relative to a unit-wide screen.
    pub pov: f64,
    /// Movement per second along local x, y, z when driven by actions.
    #[serde(default = "default_dps")]
    pub dps: Vec3,
    /// Rotation in degrees per second about local x, y, z.
    #[serde(default = "default_drot")]
    pub drot: Vec3,
}

fn default_dps() -> Vec3 {
    Vec3::one()
}

fn default_drot() -> Vec3 {
    Vec3::new(45.0, 45.0, 45.0)
}

impl Camera {
    /// Camera with default motion rates.
    pub fn new(color: u32, intensity: f64, pov: f64) -> Self {
        Self {
            color,
            intensity,
            pov,
            dps: default_dps(),
            drot: default_drot(),
        }
    }
}

/// A point light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    /// Light color, `0xRRGGBB`.
    pub color: u32,
    /// Ambient contribution.
    pub ambient: f64,
    /// Source intensity.
    pub source: f64,
    /// `[range, constant, linear, quadratic]` falloff.
    #[serde(default = "default_attenuation")]
    pub attenuation: [f64; 4],
}

fn default_attenuation() -> [f64; 4] {
    [0.0, 1.0, 0.0, 0.0]
}

impl Light {
    /// Light without falloff.
    pub fn new(color: u32, ambient: f64, source: f64) -> Self {
        Self {
            color,
            ambient,
            source,
            attenuation: default_attenuation(),
        }
    }
}

// =============================================================================
// Relations
// =============================================================================

/// Opcode of a relation program step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelOp {
    /// Remove the part of the target inside the operand.
    MinusOuter,
    /// Remove the part of the target outside the operand.
    MinusInner,
    /// Remove the part of the target inside the array accumulator, adding
    /// the operand (if any) to the accumulator.
    MinusAccum,
    /// Move the current target.
    IndexArray,
    /// Enable bounding-volume culling for the array.
    BoundArray,
    /// Disable bounding-volume culling for the array.
    UntieArray,
    /// Include an element in the array bounding volume.
    BoundIndex,
    /// Exclude an element from the array bounding volume.
    UntieIndex,
}

/// One step of an array relation program. Indices are positions in the
/// owning array's `objects`; `-1` means the array itself, the current
/// target, or no operand depending on the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Target element.
    pub target: i32,
    /// Opcode.
    pub op: RelOp,
    /// Operand element.
    pub operand: i32,
}

impl Relation {
    /// Create a relation step.
    pub const fn new(target: i32, op: RelOp, operand: i32) -> Self {
        Self { target, op, operand }
    }
}

// =============================================================================
// Objects and arrays
// =============================================================================

/// Rotation axis for built-in animators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
}

impl Axis {
    /// Component index of the axis.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Per-object animation attached to its transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnimatorDesc {
    /// Constant rotation about an axis.
    Spin {
        /// Rotation axis.
        axis: Axis,
        /// Angular rate.
        degrees_per_second: f64,
    },
    /// Sinusoidal offset along an axis around the initial position.
    Bob {
        /// Offset axis.
        axis: Axis,
        /// Peak offset.
        amplitude: f64,
        /// Period in milliseconds.
        period_ms: f64,
    },
    /// Animator looked up by name in the engine's registry.
    Custom {
        /// Registry key.
        name: String,
    },
}

/// Material overrides applied to every surface below an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialOverride {
    /// Outer side material.
    pub outer: String,
    /// Inner side material.
    pub inner: String,
}

/// What an object resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectKind {
    /// A viewpoint.
    Camera(Camera),
    /// A point light.
    Light(Light),
    /// A single surface.
    Surface(Surface),
    /// A nested array.
    Array(Array),
    /// A reuse of a library array from [`SceneDesc::arrays`].
    Instance {
        /// Library key.
        array: String,
    },
}

/// A node of the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Optional human-readable name, used in error messages.
    #[serde(default)]
    pub name: Option<String>,
    /// Placement relative to the parent array.
    #[serde(default)]
    pub transform: Transform3,
    /// What this object is.
    pub kind: ObjectKind,
    /// Material override for all surfaces below this object.
    #[serde(default)]
    pub materials: Option<MaterialOverride>,
    /// Animation of the transform.
    #[serde(default)]
    pub animator: Option<AnimatorDesc>,
    /// Creation timestamp in milliseconds, the animator's first baseline.
    #[serde(default)]
    pub time: i64,
}

impl Object {
    /// An object with the identity transform.
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            name: None,
            transform: Transform3::default(),
            kind,
            materials: None,
            animator: None,
            time: 0,
        }
    }

    /// A surface object.
    pub fn surface(surface: Surface) -> Self {
        Self::new(ObjectKind::Surface(surface))
    }

    /// A camera object.
    pub fn camera(camera: Camera) -> Self {
        Self::new(ObjectKind::Camera(camera))
    }

    /// A light object.
    pub fn light(light: Light) -> Self {
        Self::new(ObjectKind::Light(light))
    }

    /// A nested array object.
    pub fn array(array: Array) -> Self {
        Self::new(ObjectKind::Array(array))
    }

    /// An instance of a library array.
    pub fn instance(array: impl Into<String>) -> Self {
        Self::new(ObjectKind::Instance {
            array: array.into(),
        })
    }

    /// Set the name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the transform.
    pub fn with_transform(mut self, transform: Transform3) -> Self {
        self.transform = transform;
        self
    }

    /// Attach an animator.
    pub fn animated(mut self, animator: AnimatorDesc) -> Self {
        self.animator = Some(animator);
        self
    }
}

/// An ordered group of objects with an optional relation program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Array {
    /// Elements, addressed by position in relation programs.
    pub objects: Vec<Object>,
    /// Relation program, run once at compile time.
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Array {
    /// Array without relations.
    pub fn new(objects: Vec<Object>) -> Self {
        Self {
            objects,
            relations: Vec::new(),
        }
    }

    /// Attach a relation program.
    pub fn with_relations(mut self, relations: Vec<Relation>) -> Self {
        self.relations = relations;
        self
    }
}

// =============================================================================
// Document
// =============================================================================

/// A complete scene document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDesc {
    /// Format version string.
    pub version: String,
    /// Material definitions, keyed by name.
    #[serde(default)]
    pub materials: HashMap<String, Material>,
    /// Texture definitions, keyed by name.
    #[serde(default)]
    pub textures: HashMap<String, Texture>,
    /// Library of arrays reusable through [`ObjectKind::Instance`].
    #[serde(default)]
    pub arrays: HashMap<String, Array>,
    /// Root array.
    pub root: Array,
}

impl Default for SceneDesc {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            arrays: HashMap::new(),
            root: Array::default(),
        }
    }
}

impl SceneDesc {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a solid color texture plus a plain material of the same name.
    pub fn with_color(mut self, name: &str, rgb: u32) -> Self {
        self.textures
            .insert(name.to_string(), Texture::Color { rgb });
        self.materials
            .insert(name.to_string(), Material::plain(name));
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let json = r#"{
            "version": "0.1",
            "textures": { "red": { "type": "Color", "rgb": 16711680 } },
            "materials": { "red": { "tag": "plain", "texture": "red" } },
            "root": {
                "objects": [
                    { "kind": { "type": "Camera", "color": 16777215, "intensity": 0.1, "pov": 1.0 } },
                    {
                        "transform": { "position": { "x": 0.0, "y": 0.0, "z": 5.0 } },
                        "kind": {
                            "type": "Surface",
                            "kind": { "type": "Sphere", "radius": 1.0 },
                            "outer": { "material": "red" },
                            "inner": { "material": "red" }
                        }
                    }
                ],
                "relations": [ { "target": 1, "op": "UNTIE_INDEX", "operand": 1 } ]
            }
        }"#;
        let doc = SceneDesc::from_json(json).unwrap();
        assert_eq!(doc.root.objects.len(), 2);
        assert_eq!(doc.root.relations[0].op, RelOp::UntieIndex);
        match &doc.root.objects[1].kind {
            ObjectKind::Surface(s) => {
                assert_eq!(s.kind, SurfaceKind::Sphere { radius: 1.0 });
                assert_eq!(s.clip, Bounds3::unbounded());
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(doc.root.objects[1].transform.scale, Vec3::one());
        assert_eq!(doc.materials["red"].props, [1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_json_roundtrip_keeps_instances() {
        let mut doc = SceneDesc::new().with_color("white", 0xffffff);
        doc.arrays.insert(
            "pair".to_string(),
            Array::new(vec![
                Object::surface(Surface::sphere(1.0, "white")),
                Object::surface(Surface::sphere(0.5, "white")),
            ])
            .with_relations(vec![Relation::new(0, RelOp::MinusOuter, 1)]),
        );
        doc.root = Array::new(vec![
            Object::camera(Camera::new(0xffffff, 0.2, 1.0)),
            Object::instance("pair").with_transform(Transform3::at(2.0, 0.0, 8.0)),
        ]);

        let json = doc.to_json().unwrap();
        let back = SceneDesc::from_json(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_animator_desc_tagging() {
        let json = r#"{ "type": "Spin", "axis": "y", "degrees_per_second": 90.0 }"#;
        let anim: AnimatorDesc = serde_json::from_str(json).unwrap();
        assert_eq!(
            anim,
            AnimatorDesc::Spin {
                axis: Axis::Y,
                degrees_per_second: 90.0
            }
        );
    }
}
