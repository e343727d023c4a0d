//! Ray representation and basic ray-geometry tests.

use csgray_math::{Aabb3, Dir3, Point3, Vec3};

/// A ray in 3D space defined by origin and direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Dir3,
    /// Precomputed reciprocal of direction components for fast AABB tests.
    inv_direction: Vec3,
    /// Sign of direction components (0 if positive, 1 if negative).
    sign: [usize; 3],
}

impl Ray {
    /// Create a new ray from origin and direction.
    ///
    /// The direction will be normalized.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        let dir = Dir3::new_normalize(direction);
        let inv = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let sign = [
            if inv.x < 0.0 { 1 } else { 0 },
            if inv.y < 0.0 { 1 } else { 0 },
            if inv.z < 0.0 { 1 } else { 0 },
        ];
        Self {
            origin,
            direction: dir,
            inv_direction: inv,
            sign,
        }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction.as_ref()
    }

    /// Test ray-AABB intersection using the slab method.
    ///
    /// Returns `Some((t_min, t_max))` if the ray intersects the box,
    /// where `t_min` and `t_max` are the entry and exit parameters.
    /// Returns `None` if no intersection.
    ///
    /// Handles infinite box extents and axis-aligned rays.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f64, f64)> {
        let bounds = [aabb.min, aabb.max];
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;

        for axis in 0..3 {
            let lo = bounds[self.sign[axis]][axis];
            let hi = bounds[1 - self.sign[axis]][axis];
            let o = self.origin[axis];
            let inv = self.inv_direction[axis];

            if inv.is_infinite() {
                // Parallel to the slab: inside or never.
                if o < lo.min(hi) || o > lo.max(hi) {
                    return None;
                }
                continue;
            }

            let t1 = (lo - o) * inv;
            let t2 = (hi - o) * inv;
            // inf - inf cannot happen here since o is finite, but a NaN from
            // 0 * inf is possible when the box is unbounded on this axis.
            if !t1.is_nan() {
                t_min = t_min.max(t1);
            }
            if !t2.is_nan() {
                t_max = t_max.min(t2);
            }
        }

        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }
}

/// Which side of a surface a hit landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSide {
    /// The ray arrived from outside the solid.
    Outer,
    /// The ray arrived from inside the solid.
    Inner,
}

/// Result of a ray-scene intersection.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    /// Parameter along the ray where intersection occurs.
    pub t: f64,
    /// World-space intersection point.
    pub point: Point3,
    /// Surface-local intersection point, used for texture mapping.
    pub local: Point3,
    /// World-space normal facing the incoming ray.
    pub normal: Dir3,
    /// Side that was hit.
    pub side: HitSide,
    /// Global id of the surface that was hit.
    pub surface: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let p = ray.at(5.0);
        assert!((p.x - 5.0).abs() < 1e-12);
        assert!(p.y.abs() < 1e-12);
        assert!(p.z.abs() < 1e-12);
    }

    #[test]
    fn test_ray_aabb_hit() {
        let ray = Ray::new(Point3::new(-5.0, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0));
        let aabb = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let (t_min, t_max) = ray.intersect_aabb(&aabb).unwrap();
        assert!((t_min - 5.0).abs() < 1e-10);
        assert!((t_max - 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_ray_aabb_miss() {
        let ray = Ray::new(Point3::new(-5.0, 5.0, 5.0), Vec3::new(1.0, 0.0, 0.0));
        let aabb = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert!(ray.intersect_aabb(&aabb).is_none());
    }

    #[test]
    fn test_ray_aabb_behind() {
        let ray = Ray::new(Point3::new(-5.0, 0.5, 0.5), Vec3::new(-1.0, 0.0, 0.0));
        let aabb = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert!(ray.intersect_aabb(&aabb).is_none());
    }

    #[test]
    fn test_ray_aabb_unbounded_axis() {
        // A box unbounded along z is hit by any ray that crosses its x/y footprint.
        let ray = Ray::new(Point3::new(0.5, 0.5, -100.0), Vec3::new(0.0, 0.0, 1.0));
        let aabb = Aabb3::new(
            Point3::new(0.0, 0.0, f64::NEG_INFINITY),
            Point3::new(1.0, 1.0, f64::INFINITY),
        );
        assert!(ray.intersect_aabb(&aabb).is_some());

        let aside = Ray::new(Point3::new(2.0, 0.5, -100.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(aside.intersect_aabb(&aabb).is_none());
    }
}
