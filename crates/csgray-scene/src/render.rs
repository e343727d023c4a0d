//! Ray traversal and shading against one published world state.
//!
//! Traversal walks the compiled array tree with an explicit stack. A
//! bounded array whose world box the ray misses (or enters only beyond the
//! best hit so far) contributes only its untied members; everything else
//! is tested. Each surface reports its nearest candidate that survives the
//! clip box and the trim list.

use csgray_ir::{Camera, Light, MaterialTag};
use csgray_math::{Aabb3, Point3, Transform, Vec3};
use csgray_simd::Rgb;
use csgray_trace::{passes_trims, HitSide, Ray, RayHit, SurfacePose};

use crate::compiler::{CompiledScene, Element};
use crate::config::Opts;
use crate::texture::{apply_map, surface_uv, unpack_rgb};

/// Reflection depth for metal surfaces.
const MAX_BOUNCES: u32 = 1;

/// Offset applied along the normal before casting secondary rays.
const SURFACE_BIAS: f64 = 1e-7;

/// A camera placed in the world.
#[derive(Debug, Clone, Copy)]
pub struct CameraView {
    /// Camera to world.
    pub to_world: Transform,
    /// Camera parameters.
    pub camera: Camera,
}

impl CameraView {
    /// Primary ray through frame position `(px, py)` in pixels.
    ///
    /// The screen is one unit wide at distance `pov` in front of the camera,
    /// with `y` pointing up and the frame centered on the view axis.
    pub fn primary_ray(&self, px: f64, py: f64, width: usize, height: usize) -> Ray {
        let w = width.max(1) as f64;
        let sx = px / w - 0.5;
        let sy = (height as f64 * 0.5 - py) / w;
        let origin = self.to_world.apply_point(&Point3::origin());
        let dir = self.to_world.apply_vec(&Vec3::new(sx, sy, self.camera.pov));
        Ray::new(origin, dir)
    }
}

/// A light placed in the world.
#[derive(Debug, Clone, Copy)]
pub struct LightView {
    /// World position.
    pub position: Point3,
    /// Light parameters.
    pub light: Light,
}

/// Everything a render dispatch reads, frozen at the end of an update.
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    /// Per surface placement; `None` for a singular transform.
    pub poses: Vec<Option<SurfacePose>>,
    /// Per array world bounding volume.
    pub array_bounds: Vec<Aabb3>,
    /// Cameras in compile order.
    pub cameras: Vec<CameraView>,
    /// Lights in compile order.
    pub lights: Vec<LightView>,
}

/// Ray queries over a compiled scene at one instant.
pub struct Tracer<'a> {
    scene: &'a CompiledScene,
    world: &'a WorldSnapshot,
    opts: Opts,
}

fn widen(c: Rgb) -> [f64; 3] {
    [c[0] as f64, c[1] as f64, c[2] as f64]
}

impl<'a> Tracer<'a> {
    /// Tracer over `scene` as placed by `world`.
    pub fn new(scene: &'a CompiledScene, world: &'a WorldSnapshot, opts: Opts) -> Self {
        Self { scene, world, opts }
    }

    /// Nearest valid hit with `t < t_max`.
    pub fn nearest(&self, ray: &Ray, t_max: f64) -> Option<RayHit> {
        let culling = !self.opts.contains(Opts::NO_CULLING);
        let mut best: Option<RayHit> = None;
        let mut stack = vec![CompiledScene::ROOT];
        while let Some(a) = stack.pop() {
            let node = &self.scene.arrays[a];
            let limit = best.as_ref().map_or(t_max, |h| h.t);
            let culled = culling
                && node.bounded
                && ray
                    .intersect_aabb(&self.world.array_bounds[a])
                    .map_or(true, |(enter, _)| enter >= limit);
            for (pos, element) in node.elements.iter().enumerate() {
                if culled && node.included[pos] {
                    continue;
                }
                match *element {
                    Element::Surface(s) => self.test_surface(s, ray, t_max, &mut best),
                    Element::Array(child) => stack.push(child),
                    Element::Camera(_) | Element::Light(_) => {}
                }
            }
        }
        best
    }

    fn test_surface(&self, s: usize, ray: &Ray, t_max: f64, best: &mut Option<RayHit>) {
        let Some(pose) = &self.world.poses[s] else {
            return;
        };
        let scene = self.scene;
        let poses = &self.world.poses;
        let trims = &scene.surfaces[s].trims;
        let limit = best.as_ref().map_or(t_max, |h| h.t);
        for (t, local) in pose.candidates(ray, limit) {
            let point = ray.at(t);
            let keep = passes_trims(
                s,
                trims,
                |array| scene.arrays[array].accumulator.as_slice(),
                |o| poses[o].as_ref().is_some_and(|p| p.inside(&point)),
            );
            if keep {
                *best = Some(pose.hit(ray, t, local, s));
                return;
            }
        }
    }

    /// Shaded color seen along `ray`. Rays that hit nothing are black.
    pub fn shade(&self, ray: &Ray, camera: &CameraView, depth: u32) -> [f64; 3] {
        let Some(hit) = self.nearest(ray, f64::INFINITY) else {
            return [0.0; 3];
        };
        let surface = &self.scene.surfaces[hit.surface];
        let side = match hit.side {
            HitSide::Outer => &surface.outer,
            HitSide::Inner => &surface.inner,
        };
        let material = &self.scene.materials[side.material];
        let uv = apply_map(&side.map, surface_uv(&surface.kind, &hit.local));
        let base = widen(self.scene.textures[material.texture].sample(uv.0, uv.1));
        if material.tag == MaterialTag::Light {
            return base;
        }

        let cam_ambient = widen(unpack_rgb(camera.camera.color));
        let mut ambient = cam_ambient.map(|c| c * camera.camera.intensity);
        for lv in &self.world.lights {
            let lc = widen(unpack_rgb(lv.light.color));
            for i in 0..3 {
                ambient[i] += lc[i] * lv.light.ambient;
            }
        }
        let mut color = [base[0] * ambient[0], base[1] * ambient[1], base[2] * ambient[2]];

        let n = hit.normal.into_inner();
        let view = -ray.direction.into_inner();
        let origin = hit.point + n * SURFACE_BIAS;
        let [diffuse, specular, _] = material.props;
        for lv in &self.world.lights {
            let to_light = lv.position - hit.point;
            let dist = to_light.norm();
            if dist <= 0.0 {
                continue;
            }
            let l = to_light / dist;
            let ndotl = n.dot(&l);
            if ndotl <= 0.0 {
                continue;
            }
            let [range, c0, c1, c2] = lv.light.attenuation;
            if range > 0.0 && dist > range {
                continue;
            }
            if !self.opts.contains(Opts::NO_SHADOWS) && self.nearest(&Ray::new(origin, l), dist).is_some() {
                continue;
            }
            let denom = c0 + c1 * dist + c2 * dist * dist;
            let energy = lv.light.source * if denom > 0.0 { 1.0 / denom } else { 1.0 };
            let reflected = n * (2.0 * ndotl) - l;
            let highlight = reflected.dot(&view).max(0.0).powf(material.exponent);
            let lc = widen(unpack_rgb(lv.light.color));
            for i in 0..3 {
                color[i] += energy * lc[i] * (diffuse * ndotl * base[i] + specular * highlight);
            }
        }

        let reflect = material.optics[0];
        if material.tag == MaterialTag::Metal && depth < MAX_BOUNCES && reflect > 0.0 {
            let d = ray.direction.into_inner();
            let bounce = self.shade(&Ray::new(origin, d - n * (2.0 * d.dot(&n))), camera, depth + 1);
            for i in 0..3 {
                color[i] += reflect * bounce[i];
            }
        }
        color
    }

    /// One antialiasing sample at frame position `(px, py)`.
    pub fn sample(&self, camera: &CameraView, px: f64, py: f64, width: usize, height: usize) -> Rgb {
        let c = self.shade(&camera.primary_ray(px, py, width, height), camera, 0);
        [c[0] as f32, c[1] as f32, c[2] as f32]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;
    use crate::anim::AnimatorRegistry;
    use crate::compiler::{compile, placement};
    use csgray_ir::{Array, Object, RelOp, Relation, SceneDesc, Surface, Transform3};

    /// Snapshot with every object at its declared placement.
    fn snapshot(scene: &CompiledScene) -> WorldSnapshot {
        let world = |o: usize| {
            let mut chain = vec![o];
            while let Some(p) = scene.objects[*chain.last().unwrap()].parent {
                chain.push(p);
            }
            chain
                .iter()
                .rev()
                .fold(Transform::identity(), |acc, &i| acc.then(&placement(&scene.objects[i].transform)))
        };
        WorldSnapshot {
            poses: scene
                .surfaces
                .iter()
                .map(|s| SurfacePose::new(s.quadric, s.clip, &s.local_bounds, world(s.object)))
                .collect(),
            array_bounds: scene
                .arrays
                .iter()
                .map(|a| a.object.map_or(a.local_bounds, |o| a.local_bounds.transformed(&world(o))))
                .collect(),
            cameras: Vec::new(),
            lights: Vec::new(),
        }
    }

    fn two_spheres(relations: Vec<Relation>) -> CompiledScene {
        let mut desc = SceneDesc::new().with_color("white", 0xffffff);
        desc.root = Array::new(vec![
            Object::surface(Surface::sphere(1.0, "white")),
            Object::surface(Surface::sphere(1.0, "white")).with_transform(Transform3::at(1.0, 0.0, 0.0)),
            Object::camera(Camera::new(0xffffff, 0.2, 1.0)),
        ])
        .with_relations(relations);
        compile(&desc, &AnimatorRegistry::new(), &mut HeapAllocator::new()).unwrap()
    }

    #[test]
    fn test_minus_outer_hides_overlap() {
        let scene = two_spheres(vec![Relation::new(0, RelOp::MinusOuter, 1)]);
        let world = snapshot(&scene);
        let tracer = Tracer::new(&scene, &world, Opts::NONE);

        // From the left the first hit is sphere 0, outside sphere 1.
        let hit = tracer
            .nearest(&Ray::new(Point3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)), f64::INFINITY)
            .unwrap();
        assert_eq!(hit.surface, 0);
        assert!((hit.t - 4.0).abs() < 1e-9);

        // Through the lens both spheres share, sphere 0 never reports a hit.
        let ray = Ray::new(Point3::new(0.8, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let hit = tracer.nearest(&ray, f64::INFINITY).unwrap();
        assert_eq!(hit.surface, 1);
        let mut best = None;
        tracer.test_surface(0, &ray, f64::INFINITY, &mut best);
        assert!(best.is_none());
    }

    #[test]
    fn test_culling_keeps_untied_members() {
        let mut desc = SceneDesc::new().with_color("white", 0xffffff);
        desc.root = Array::new(vec![
            Object::surface(Surface::sphere(1.0, "white")),
            Object::surface(Surface::sphere(1.0, "white")).with_transform(Transform3::at(0.0, 10.0, 0.0)),
            Object::camera(Camera::new(0, 0.0, 1.0)),
        ])
        .with_relations(vec![
            Relation::new(-1, RelOp::BoundArray, -1),
            Relation::new(-1, RelOp::UntieIndex, 1),
        ]);
        let scene = compile(&desc, &AnimatorRegistry::new(), &mut HeapAllocator::new()).unwrap();
        let world = snapshot(&scene);
        let tracer = Tracer::new(&scene, &world, Opts::NONE);
        let ray = Ray::new(Point3::new(-5.0, 10.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(tracer.nearest(&ray, f64::INFINITY).map(|h| h.surface), Some(1));
    }

    #[test]
    fn test_primary_ray_centered() {
        let view = CameraView {
            to_world: Transform::translation(0.0, 0.0, -5.0),
            camera: Camera::new(0, 0.0, 1.0),
        };
        let ray = view.primary_ray(8.0, 4.0, 16, 8);
        assert!((ray.origin.z + 5.0).abs() < 1e-12);
        assert!((ray.direction.z - 1.0).abs() < 1e-12);
    }
}
