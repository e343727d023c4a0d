//! Scene compiler.
//!
//! Walks the declarative object graph once and produces an arena of
//! objects, surfaces, arrays, cameras and lights addressed by stable
//! indices. Each array keeps its element list in declaration order, so
//! relation programs resolve against the array's own positions. Instances
//! of library arrays are expanded in place and run the library program
//! again, yielding the same trims at a different placement.
//!
//! Every compiled buffer is reserved through the platform allocator. If
//! compilation fails, everything reserved so far is released before the
//! error is returned; the caller's description is never touched.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use csgray_ir::{
    Array, Bounds3, Camera, Light, MaterialOverride, MaterialTag, Object, ObjectKind, SceneDesc, Side, Surface,
    SurfaceKind, Transform2, Transform3, INF,
};
use csgray_math::{Aabb3, Point3, Transform};
use csgray_trace::{Quadric, TrimEntry};

use crate::alloc::{AllocLedger, Allocator};
use crate::anim::{Animator, AnimatorRegistry};
use crate::error::{Result, SceneError};
use crate::relation::{run_program, ElementKind, LocalTrim};
use crate::texture::TextureMap;

/// Most cameras a scene may hold.
pub const MAX_CAMERAS: usize = 16;

/// Most lights a scene may hold.
pub const MAX_LIGHTS: usize = 16;

/// Placement matrix of a declared transform.
pub fn placement(t: &Transform3) -> Transform {
    Transform::from_srt(t.scale.to_array(), t.rotation.to_array(), t.position.to_array())
}

/// What sits at one array position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    /// Surface arena id.
    Surface(usize),
    /// Array arena id.
    Array(usize),
    /// Camera index.
    Camera(usize),
    /// Light index.
    Light(usize),
}

/// A scene graph node.
pub struct ObjectNode {
    /// Enclosing array's object; `None` at the root.
    pub parent: Option<usize>,
    /// Declared placement.
    pub transform: Transform3,
    /// Animator, if any.
    pub animator: Option<Arc<dyn Animator>>,
    /// Creation time in milliseconds.
    pub time: i64,
    /// Slash-separated path used in messages.
    pub path: String,
}

impl fmt::Debug for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectNode")
            .field("parent", &self.parent)
            .field("transform", &self.transform)
            .field("animated", &self.animator.is_some())
            .field("time", &self.time)
            .field("path", &self.path)
            .finish()
    }
}

/// A side with its material resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideRef {
    /// Material index.
    pub material: usize,
    /// Texture-space mapping.
    pub map: Transform2,
}

/// A compiled surface.
#[derive(Debug, Clone)]
pub struct SurfaceNode {
    /// Object carrying the surface.
    pub object: usize,
    /// Immediate array.
    pub array: usize,
    /// Position within the immediate array.
    pub position: usize,
    /// Declared shape.
    pub kind: SurfaceKind,
    /// Implicit form.
    pub quadric: Quadric,
    /// Local clip box with sentinels turned into infinities.
    pub clip: Aabb3,
    /// Clipped local extent.
    pub local_bounds: Aabb3,
    /// Outer side.
    pub outer: SideRef,
    /// Inner side.
    pub inner: SideRef,
    /// Subtractions applied to this surface.
    pub trims: Vec<TrimEntry>,
}

/// A compiled array.
#[derive(Debug, Clone)]
pub struct ArrayNode {
    /// Object carrying the array; `None` for the root.
    pub object: Option<usize>,
    /// Slash-separated path.
    pub path: String,
    /// Elements in declaration order.
    pub elements: Vec<Element>,
    /// Every surface in the subtree.
    pub surfaces: Vec<usize>,
    /// Whether rays are culled against the bounding volume.
    pub bounded: bool,
    /// Per element, whether it contributes to the bounding volume.
    pub included: Vec<bool>,
    /// Surfaces accumulated by `MINUS_ACCUM`.
    pub accumulator: Vec<usize>,
    /// Bounding volume in the array frame, included elements only, at the
    /// declared placements. The scene rebuilds it every update.
    pub local_bounds: Aabb3,
    /// Extent of the whole subtree in the array frame, at the declared
    /// placements.
    pub extent: Aabb3,
}

/// A camera and the object that places it.
#[derive(Debug, Clone, Copy)]
pub struct CameraNode {
    /// Object index.
    pub object: usize,
    /// Parameters.
    pub camera: Camera,
}

/// A light and the object that places it.
#[derive(Debug, Clone, Copy)]
pub struct LightNode {
    /// Object index.
    pub object: usize,
    /// Parameters.
    pub light: Light,
}

/// A material with its texture resolved.
#[derive(Debug, Clone)]
pub struct MaterialNode {
    /// Declared name.
    pub name: String,
    /// Shading model.
    pub tag: MaterialTag,
    /// Texture index.
    pub texture: usize,
    /// `[diffuse, specular, power]`.
    pub props: [f64; 3],
    /// `[reflect, transmit, refract]`.
    pub optics: [f64; 3],
    /// Specular exponent, falling back to `power`.
    pub exponent: f64,
}

/// Counts reported after compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileStats {
    /// Objects in the arena.
    pub objects: usize,
    /// Surfaces.
    pub surfaces: usize,
    /// Arrays, root included.
    pub arrays: usize,
    /// Cameras.
    pub cameras: usize,
    /// Lights.
    pub lights: usize,
    /// Trim entries across all surfaces.
    pub trims: usize,
    /// Bytes reserved from the allocator.
    pub bytes: usize,
}

/// Output of [`compile`].
#[derive(Debug)]
pub struct CompiledScene {
    /// Scene graph nodes.
    pub objects: Vec<ObjectNode>,
    /// Surfaces.
    pub surfaces: Vec<SurfaceNode>,
    /// Arrays; index 0 is the root.
    pub arrays: Vec<ArrayNode>,
    /// Cameras in discovery order.
    pub cameras: Vec<CameraNode>,
    /// Lights in discovery order.
    pub lights: Vec<LightNode>,
    /// Materials.
    pub materials: Vec<MaterialNode>,
    /// Textures.
    pub textures: Vec<TextureMap>,
    /// Allocator blocks backing the buffers above.
    pub ledger: AllocLedger,
}

impl CompiledScene {
    /// Root array id.
    pub const ROOT: usize = 0;

    /// Summary counts.
    pub fn stats(&self) -> CompileStats {
        CompileStats {
            objects: self.objects.len(),
            surfaces: self.surfaces.len(),
            arrays: self.arrays.len(),
            cameras: self.cameras.len(),
            lights: self.lights.len(),
            trims: self.surfaces.iter().map(|s| s.trims.len()).sum(),
            bytes: self.ledger.bytes(),
        }
    }

    /// Object index owning an element.
    pub fn element_object(&self, element: Element) -> Option<usize> {
        match element {
            Element::Surface(s) => Some(self.surfaces[s].object),
            Element::Array(a) => self.arrays[a].object,
            Element::Camera(c) => Some(self.cameras[c].object),
            Element::Light(l) => Some(self.lights[l].object),
        }
    }

    /// Rebuild every array's bounding volume from the object placements
    /// given by `place`, with the same include rules the compiler used.
    ///
    /// Returns `(local_bounds, extent)` per array, both in the array's own
    /// frame. Nested arrays always have larger ids than their parent, so a
    /// reverse sweep sees every child extent before it is needed.
    pub fn array_volumes(&self, place: impl Fn(usize) -> Transform) -> Vec<(Aabb3, Aabb3)> {
        let mut volumes = vec![(Aabb3::empty(), Aabb3::empty()); self.arrays.len()];
        for id in (0..self.arrays.len()).rev() {
            let node = &self.arrays[id];
            let (mut local, mut extent) = (Aabb3::empty(), Aabb3::empty());
            for (pos, &element) in node.elements.iter().enumerate() {
                let (bounds, oid) = match element {
                    Element::Surface(s) => (self.surfaces[s].local_bounds, self.surfaces[s].object),
                    Element::Array(a) => match self.arrays[a].object {
                        Some(oid) => (volumes[a].1, oid),
                        None => continue,
                    },
                    Element::Camera(_) | Element::Light(_) => continue,
                };
                let placed = bounds.transformed(&place(oid));
                extent.include(&placed);
                if node.included[pos] {
                    local.include(&placed);
                }
            }
            volumes[id] = (local, extent);
        }
        volumes
    }
}

/// Arena id of the surface at `pos` in an array's element list.
fn surface_at(elements: &[Element], path: &str, pos: usize) -> Result<usize> {
    match elements.get(pos) {
        Some(&Element::Surface(s)) => Ok(s),
        _ => Err(SceneError::NotASurface {
            array: path.to_string(),
            position: pos,
        }),
    }
}

/// Compile a scene description.
pub fn compile(desc: &SceneDesc, registry: &AnimatorRegistry, allocator: &mut dyn Allocator) -> Result<CompiledScene> {
    let mut builder = Builder {
        desc,
        registry,
        allocator,
        ledger: AllocLedger::new(),
        objects: Vec::new(),
        surfaces: Vec::new(),
        arrays: Vec::new(),
        cameras: Vec::new(),
        lights: Vec::new(),
        materials: Vec::new(),
        textures: Vec::new(),
        material_ids: HashMap::new(),
        texture_ids: HashMap::new(),
        instancing: Vec::new(),
    };
    match builder.build() {
        Ok(()) => {
            let compiled = builder.finish();
            log::debug!("compiled scene: {:?}", compiled.stats());
            Ok(compiled)
        }
        Err(e) => {
            builder.ledger.release_all(builder.allocator);
            Err(e)
        }
    }
}

struct Builder<'a> {
    desc: &'a SceneDesc,
    registry: &'a AnimatorRegistry,
    allocator: &'a mut dyn Allocator,
    ledger: AllocLedger,
    objects: Vec<ObjectNode>,
    surfaces: Vec<SurfaceNode>,
    arrays: Vec<ArrayNode>,
    cameras: Vec<CameraNode>,
    lights: Vec<LightNode>,
    materials: Vec<MaterialNode>,
    textures: Vec<TextureMap>,
    material_ids: HashMap<String, usize>,
    texture_ids: HashMap<String, usize>,
    instancing: Vec<String>,
}

fn unsentinel(v: f64) -> f64 {
    if v >= INF {
        f64::INFINITY
    } else if v <= -INF {
        f64::NEG_INFINITY
    } else {
        v
    }
}

fn clip_box(clip: &Bounds3, path: &str) -> Result<Aabb3> {
    let min = clip.min.to_array().map(unsentinel);
    let max = clip.max.to_array().map(unsentinel);
    for axis in 0..3 {
        if min[axis].is_nan() || max[axis].is_nan() || min[axis] > max[axis] {
            return Err(SceneError::InvalidBounds {
                path: path.to_string(),
                reason: format!("axis {axis}: min {} > max {}", min[axis], max[axis]),
            });
        }
    }
    Ok(Aabb3::new(
        Point3::new(min[0], min[1], min[2]),
        Point3::new(max[0], max[1], max[2]),
    ))
}

impl Builder<'_> {
    fn build(&mut self) -> Result<()> {
        let desc = self.desc;
        self.walk_array(&desc.root, None, "root".to_string(), None)?;
        if self.cameras.is_empty() {
            return Err(SceneError::NoCamera);
        }
        self.ledger.acquire::<ObjectNode>(self.allocator, "objects", self.objects.len())?;
        self.ledger.acquire::<SurfaceNode>(self.allocator, "surfaces", self.surfaces.len())?;
        self.ledger.acquire::<ArrayNode>(self.allocator, "arrays", self.arrays.len())?;
        self.ledger.acquire::<CameraNode>(self.allocator, "cameras", self.cameras.len())?;
        self.ledger.acquire::<LightNode>(self.allocator, "lights", self.lights.len())?;
        self.ledger.acquire::<MaterialNode>(self.allocator, "materials", self.materials.len())?;
        Ok(())
    }

    fn finish(self) -> CompiledScene {
        CompiledScene {
            objects: self.objects,
            surfaces: self.surfaces,
            arrays: self.arrays,
            cameras: self.cameras,
            lights: self.lights,
            materials: self.materials,
            textures: self.textures,
            ledger: self.ledger,
        }
    }

    fn texture(&mut self, name: &str, material: &str) -> Result<usize> {
        if let Some(&id) = self.texture_ids.get(name) {
            return Ok(id);
        }
        let declared = self.desc.textures.get(name).ok_or_else(|| SceneError::UnresolvedTexture {
            name: name.to_string(),
            material: material.to_string(),
        })?;
        let map = TextureMap::load(declared)?;
        if let TextureMap::Image { texels, .. } = &map {
            self.ledger.acquire::<[f32; 3]>(self.allocator, "texture texels", texels.len())?;
        }
        let id = self.textures.len();
        self.textures.push(map);
        self.texture_ids.insert(name.to_string(), id);
        Ok(id)
    }

    fn material(&mut self, name: &str, path: &str) -> Result<usize> {
        if let Some(&id) = self.material_ids.get(name) {
            return Ok(id);
        }
        let declared = self.desc.materials.get(name).ok_or_else(|| SceneError::UnresolvedMaterial {
            name: name.to_string(),
            path: path.to_string(),
        })?;
        let texture = self.texture(&declared.texture, name)?;
        let id = self.materials.len();
        self.materials.push(MaterialNode {
            name: name.to_string(),
            tag: declared.tag,
            texture,
            props: declared.props,
            optics: declared.optics,
            exponent: declared.exponent.unwrap_or(declared.props[2]),
        });
        self.material_ids.insert(name.to_string(), id);
        Ok(id)
    }

    fn side(&mut self, side: &Side, forced: Option<&str>, path: &str) -> Result<SideRef> {
        let name = forced.unwrap_or(&side.material);
        Ok(SideRef {
            material: self.material(name, path)?,
            map: side.map,
        })
    }

    fn push_object(&mut self, obj: &Object, parent: Option<usize>, path: &str) -> Result<usize> {
        let animator = match &obj.animator {
            Some(desc) => Some(self.registry.resolve(desc).ok_or_else(|| SceneError::UnknownAnimator {
                name: match desc {
                    csgray_ir::AnimatorDesc::Custom { name } => name.clone(),
                    other => format!("{other:?}"),
                },
                path: path.to_string(),
            })?),
            None => None,
        };
        let id = self.objects.len();
        self.objects.push(ObjectNode {
            parent,
            transform: obj.transform,
            animator,
            time: obj.time,
            path: path.to_string(),
        });
        Ok(id)
    }

    fn add_surface(
        &mut self,
        surface: &Surface,
        object: usize,
        array: usize,
        position: usize,
        overrides: Option<&MaterialOverride>,
        path: &str,
    ) -> Result<usize> {
        let clip = clip_box(&surface.clip, path)?;
        let outer = self.side(&surface.outer, overrides.map(|o| o.outer.as_str()), path)?;
        let inner = self.side(&surface.inner, overrides.map(|o| o.inner.as_str()), path)?;
        let id = self.surfaces.len();
        self.surfaces.push(SurfaceNode {
            object,
            array,
            position,
            kind: surface.kind,
            quadric: Quadric::from_kind(&surface.kind),
            clip,
            local_bounds: Quadric::local_bounds(&surface.kind, &clip),
            outer,
            inner,
            trims: Vec::new(),
        });
        Ok(id)
    }

    fn element_kind(element: Element) -> ElementKind {
        match element {
            Element::Surface(_) => ElementKind::Surface,
            Element::Array(_) => ElementKind::Array,
            Element::Camera(_) | Element::Light(_) => ElementKind::Other,
        }
    }

    fn walk_array(
        &mut self,
        array: &Array,
        object: Option<usize>,
        path: String,
        overrides: Option<&MaterialOverride>,
    ) -> Result<usize> {
        let id = self.arrays.len();
        self.arrays.push(ArrayNode {
            object,
            path: path.clone(),
            elements: Vec::new(),
            surfaces: Vec::new(),
            bounded: false,
            included: Vec::new(),
            accumulator: Vec::new(),
            local_bounds: Aabb3::empty(),
            extent: Aabb3::empty(),
        });
        self.ledger.acquire::<Element>(self.allocator, "array elements", array.objects.len())?;

        let mut elements = Vec::with_capacity(array.objects.len());
        for (pos, obj) in array.objects.iter().enumerate() {
            let label = obj.name.clone().unwrap_or_else(|| pos.to_string());
            let obj_path = format!("{path}/{label}");
            let oid = self.push_object(obj, object, &obj_path)?;
            let ov = obj.materials.as_ref().or(overrides);
            let element = match &obj.kind {
                ObjectKind::Surface(s) => Element::Surface(self.add_surface(s, oid, id, pos, ov, &obj_path)?),
                ObjectKind::Array(a) => Element::Array(self.walk_array(a, Some(oid), obj_path, ov)?),
                ObjectKind::Instance { array: name } => {
                    let desc = self.desc;
                    let lib = desc.arrays.get(name).ok_or_else(|| SceneError::UnknownArray {
                        name: name.clone(),
                        path: obj_path.clone(),
                    })?;
                    if self.instancing.contains(name) {
                        return Err(SceneError::RecursiveInstance {
                            name: name.clone(),
                            path: obj_path,
                        });
                    }
                    self.instancing.push(name.clone());
                    let nested = self.walk_array(lib, Some(oid), obj_path, ov);
                    self.instancing.pop();
                    Element::Array(nested?)
                }
                ObjectKind::Camera(camera) => {
                    if self.cameras.len() == MAX_CAMERAS {
                        return Err(SceneError::TooManyCameras {
                            count: MAX_CAMERAS + 1,
                            max: MAX_CAMERAS,
                        });
                    }
                    self.cameras.push(CameraNode {
                        object: oid,
                        camera: *camera,
                    });
                    Element::Camera(self.cameras.len() - 1)
                }
                ObjectKind::Light(light) => {
                    if self.lights.len() == MAX_LIGHTS {
                        return Err(SceneError::TooManyLights {
                            count: MAX_LIGHTS + 1,
                            max: MAX_LIGHTS,
                        });
                    }
                    self.lights.push(LightNode {
                        object: oid,
                        light: *light,
                    });
                    Element::Light(self.lights.len() - 1)
                }
            };
            elements.push(element);
        }

        let kinds: Vec<ElementKind> = elements.iter().map(|&e| Self::element_kind(e)).collect();
        let outcome = run_program(&path, &kinds, &array.relations)?;

        let resolve = |pos: usize| surface_at(&elements, &path, pos);
        for (pos, local) in outcome.trims.iter().enumerate() {
            if local.is_empty() {
                continue;
            }
            let entries = local
                .iter()
                .map(|t| match *t {
                    LocalTrim::Outer(p) => resolve(p).map(TrimEntry::outer),
                    LocalTrim::Inner(p) => resolve(p).map(TrimEntry::inner),
                    LocalTrim::Accum => Ok(TrimEntry::accum(id)),
                })
                .collect::<Result<Vec<TrimEntry>>>()?;
            let targets = match elements[pos] {
                Element::Surface(s) => vec![s],
                Element::Array(a) => self.arrays[a].surfaces.clone(),
                Element::Camera(_) | Element::Light(_) => Vec::new(),
            };
            for s in targets {
                self.ledger.acquire::<TrimEntry>(self.allocator, "trim list", entries.len())?;
                self.surfaces[s].trims.extend_from_slice(&entries);
            }
        }

        let mut subtree = Vec::new();
        let mut extent = Aabb3::empty();
        let mut local_bounds = Aabb3::empty();
        for (pos, &element) in elements.iter().enumerate() {
            let (own, bounds, oid) = match element {
                Element::Surface(s) => {
                    let node = &self.surfaces[s];
                    (vec![s], node.local_bounds, node.object)
                }
                Element::Array(a) => {
                    let node = &self.arrays[a];
                    let Some(oid) = node.object else { continue };
                    (node.surfaces.clone(), node.extent, oid)
                }
                Element::Camera(_) | Element::Light(_) => continue,
            };
            let placed = bounds.transformed(&placement(&self.objects[oid].transform));
            extent.include(&placed);
            if outcome.included[pos] {
                local_bounds.include(&placed);
            }
            subtree.extend(own);
        }

        let accumulator = outcome.accumulator.iter().map(|&p| resolve(p)).collect::<Result<Vec<usize>>>()?;
        self.ledger.acquire::<usize>(self.allocator, "array surfaces", subtree.len())?;

        let node = &mut self.arrays[id];
        node.elements = elements;
        node.surfaces = subtree;
        node.bounded = outcome.bounded;
        node.included = outcome.included;
        node.accumulator = accumulator;
        node.local_bounds = local_bounds;
        node.extent = extent;
        Ok(id)
    }
}
