//! A surface placed in the world for one frame.

use csgray_math::{Aabb3, Dir3, Point3, Transform, T_MIN};

use crate::quadric::Quadric;
use crate::ray::{HitSide, Ray, RayHit};

/// Slack applied to clip tests so hits on a clip boundary are kept.
const CLIP_EPS: f64 = 1e-9;

/// Per-frame world placement of a compiled surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfacePose {
    /// Implicit shape in the local frame.
    pub quadric: Quadric,
    /// Local clipping box; infinite extents allowed.
    pub clip: Aabb3,
    /// Local to world.
    pub to_world: Transform,
    /// World to local.
    pub to_local: Transform,
    /// Conservative world-space bounds.
    pub world_bounds: Aabb3,
}

impl SurfacePose {
    /// Place a surface. Returns `None` for a singular transform.
    pub fn new(quadric: Quadric, clip: Aabb3, local_bounds: &Aabb3, to_world: Transform) -> Option<Self> {
        let to_local = to_world.inverse()?;
        Some(Self {
            quadric,
            clip,
            to_world,
            to_local,
            world_bounds: local_bounds.transformed(&to_world),
        })
    }

    /// Ray parameters in `(T_MIN, t_max)` where the ray crosses the clipped
    /// surface, ascending, with the matching local point.
    pub fn candidates(&self, ray: &Ray, t_max: f64) -> impl Iterator<Item = (f64, Point3)> + '_ {
        let o = self.to_local.apply_point(&ray.origin);
        let d = self.to_local.apply_vec(ray.direction.as_ref());
        self.quadric
            .intersect(&o, &d)
            .iter()
            .filter(move |&t| t > T_MIN && t < t_max)
            .map(move |t| (t, o + t * d))
            .filter(move |(_, local)| self.in_clip(local))
    }

    /// True if a local point lies within the clip box.
    #[inline]
    pub fn in_clip(&self, local: &Point3) -> bool {
        (0..3).all(|i| local[i] >= self.clip.min[i] - CLIP_EPS && local[i] <= self.clip.max[i] + CLIP_EPS)
    }

    /// True if a world point lies strictly inside the solid.
    #[inline]
    pub fn inside(&self, world: &Point3) -> bool {
        self.quadric.value(&self.to_local.apply_point(world)) < 0.0
    }

    /// Build the hit record for a candidate returned by [`Self::candidates`].
    pub fn hit(&self, ray: &Ray, t: f64, local: Point3, surface: usize) -> RayHit {
        let outward = self.to_world.apply_normal(&self.quadric.gradient(&local));
        let (side, facing) = if outward.dot(ray.direction.as_ref()) <= 0.0 {
            (HitSide::Outer, outward)
        } else {
            (HitSide::Inner, -outward)
        };
        RayHit {
            t,
            point: ray.at(t),
            local,
            normal: Dir3::new_normalize(facing),
            side,
            surface,
        }
    }
}
