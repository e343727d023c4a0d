#![warn(missing_docs)]

//! Math types for the csgray ray-tracing engine.
//!
//! Thin wrappers around nalgebra providing the handful of types the scene
//! compiler and the tracer share: points, vectors, directions, affine
//! transforms and axis-aligned boxes.

use nalgebra::{Matrix4, Unit, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// Smallest ray parameter accepted as a hit, to keep secondary rays from
/// re-hitting the surface they start on.
pub const T_MIN: f64 = 1e-6;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(1, 1)] = c;
        m[(1, 2)] = -s;
        m[(2, 1)] = s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 2)] = s;
        m[(2, 0)] = -s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Build the placement matrix of a scale/rotation/position triplet.
    ///
    /// Rotation angles are in degrees and applied X first, then Y, then Z;
    /// scale is applied before rotation and translation last.
    pub fn from_srt(scale: [f64; 3], rotation_deg: [f64; 3], position: [f64; 3]) -> Self {
        let s = Self::scale(scale[0], scale[1], scale[2]);
        let rx = Self::rotation_x(rotation_deg[0].to_radians());
        let ry = Self::rotation_y(rotation_deg[1].to_radians());
        let rz = Self::rotation_z(rotation_deg[2].to_radians());
        let t = Self::translation(position[0], position[1], position[2]);
        t.then(&rz).then(&ry).then(&rx).then(&s)
    }

    /// Compose: `self` then `other` (self * other).
    ///
    /// The result applies `other` first and `self` second.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    #[inline]
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation, applies rotation/scale).
    #[inline]
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Transform a normal vector (uses inverse transpose of upper-left 3x3).
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        let m3 = self.matrix.fixed_view::<3, 3>(0, 0);
        if let Some(inv) = m3.try_inverse() {
            inv.transpose() * n
        } else {
            // Degenerate transform, return input unchanged
            *n
        }
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Axis-aligned bounding box in 3D.
///
/// Infinite extents are allowed and survive every operation here; an
/// empty box has `min > max` and contains nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// The box covering all of space.
    pub fn infinite() -> Self {
        Self {
            min: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            max: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
        }
    }

    /// True if nothing has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// True if every extent is finite.
    pub fn is_finite(&self) -> bool {
        self.min.coords.iter().chain(self.max.coords.iter()).all(|c| c.is_finite())
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this AABB to include another one.
    pub fn include(&mut self, other: &Aabb3) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// True if `other` lies inside this box, within `tol`.
    pub fn contains(&self, other: &Aabb3, tol: f64) -> bool {
        if other.is_empty() {
            return true;
        }
        (0..3).all(|i| self.min[i] - tol <= other.min[i] && other.max[i] <= self.max[i] + tol)
    }

    /// Intersect with another box, possibly producing an empty one.
    pub fn intersection(&self, other: &Aabb3) -> Aabb3 {
        Aabb3::new(
            Point3::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            Point3::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        )
    }

    /// Box enclosing this one after an affine transform.
    ///
    /// Finite boxes transform their eight corners. Any infinite extent that
    /// a rotation could smear onto another axis makes that axis infinite.
    pub fn transformed(&self, t: &Transform) -> Aabb3 {
        if self.is_empty() {
            return *self;
        }
        if self.is_finite() {
            let mut out = Aabb3::empty();
            for i in 0..8 {
                let corner = Point3::new(
                    if i & 1 == 0 { self.min.x } else { self.max.x },
                    if i & 2 == 0 { self.min.y } else { self.max.y },
                    if i & 4 == 0 { self.min.z } else { self.max.z },
                );
                out.include_point(&t.apply_point(&corner));
            }
            return out;
        }

        // Arvo's method with infinities: each output axis accumulates the
        // contribution of every input axis the matrix mixes into it.
        let m = &t.matrix;
        let mut min = [m[(0, 3)], m[(1, 3)], m[(2, 3)]];
        let mut max = min;
        for row in 0..3 {
            for col in 0..3 {
                let k = m[(row, col)];
                if k == 0.0 {
                    continue;
                }
                let a = k * self.min[col];
                let b = k * self.max[col];
                min[row] += a.min(b);
                max[row] += a.max(b);
            }
        }
        for i in 0..3 {
            if min[i].is_nan() {
                min[i] = f64::NEG_INFINITY;
            }
            if max[i].is_nan() {
                max[i] = f64::INFINITY;
            }
        }
        Aabb3::new(
            Point3::new(min[0], min[1], min[2]),
            Point3::new(max[0], max[1], max[2]),
        )
    }
}
