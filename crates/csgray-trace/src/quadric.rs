//! Generic quadric surfaces.
//!
//! Every primitive the engine knows is a quadric of the form
//! `a x² + b y² + c z² + d z + e = 0` in its local frame, with the solid on
//! the negative side. One intersector and one classifier cover them all.

use csgray_ir::SurfaceKind;
use csgray_math::{Aabb3, Point3, Vec3};

/// Below this magnitude the quadratic term is treated as absent.
const LINEAR_EPS: f64 = 1e-12;

/// Implicit quadric `a x² + b y² + c z² + d z + e`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    /// x² coefficient.
    pub a: f64,
    /// y² coefficient.
    pub b: f64,
    /// z² coefficient.
    pub c: f64,
    /// z coefficient.
    pub d: f64,
    /// Constant term.
    pub e: f64,
}

/// Up to two ray parameters, ascending.
#[derive(Debug, Clone, Copy, Default)]
pub struct Roots {
    t: [f64; 2],
    n: usize,
}

impl Roots {
    fn push(&mut self, t: f64) {
        if self.n < 2 {
            self.t[self.n] = t;
            self.n += 1;
        }
    }

    /// Number of roots.
    pub fn len(&self) -> usize {
        self.n
    }

    /// True when the ray misses.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Roots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = f64> {
        let t = self.t;
        (0..self.n).map(move |i| t[i])
    }
}

impl Quadric {
    /// Lower a declarative surface kind to its implicit form.
    pub fn from_kind(kind: &SurfaceKind) -> Self {
        let q = |a, b, c, d, e| Quadric { a, b, c, d, e };
        match *kind {
            SurfaceKind::Plane => q(0.0, 0.0, 0.0, 1.0, 0.0),
            SurfaceKind::Sphere { radius } => q(1.0, 1.0, 1.0, 0.0, -radius * radius),
            SurfaceKind::Cylinder { radius } => q(1.0, 1.0, 0.0, 0.0, -radius * radius),
            SurfaceKind::Cone { ratio } => q(1.0, 1.0, -ratio * ratio, 0.0, 0.0),
            SurfaceKind::Paraboloid { focal } => q(1.0, 1.0, 0.0, -focal, 0.0),
            SurfaceKind::Hyperboloid { ratio, waist } => q(1.0, 1.0, -ratio * ratio, 0.0, -waist),
            SurfaceKind::ParaCylinder { focal } => q(1.0, 0.0, 0.0, -focal, 0.0),
            SurfaceKind::HyperCylinder { ratio, waist } => {
                q(1.0, 0.0, -ratio * ratio, 0.0, -waist)
            }
            SurfaceKind::HyperParaboloid { focal } => q(1.0, -1.0, 0.0, -focal, 0.0),
        }
    }

    /// Value of the implicit function; negative inside the solid.
    #[inline]
    pub fn value(&self, p: &Point3) -> f64 {
        self.a * p.x * p.x + self.b * p.y * p.y + self.c * p.z * p.z + self.d * p.z + self.e
    }

    /// Gradient of the implicit function, pointing out of the solid.
    #[inline]
    pub fn gradient(&self, p: &Point3) -> Vec3 {
        Vec3::new(
            2.0 * self.a * p.x,
            2.0 * self.b * p.y,
            2.0 * self.c * p.z + self.d,
        )
    }

    /// Intersect the local-space line `o + t * dir`.
    ///
    /// `dir` need not be normalized, so a world ray mapped through an
    /// affine inverse keeps its world parameterization. Negative roots are
    /// returned too; callers filter by their own `t` window.
    pub fn intersect(&self, o: &Point3, dir: &Vec3) -> Roots {
        let qa = self.a * dir.x * dir.x + self.b * dir.y * dir.y + self.c * dir.z * dir.z;
        let qb = 2.0 * (self.a * o.x * dir.x + self.b * o.y * dir.y + self.c * o.z * dir.z)
            + self.d * dir.z;
        let qc = self.value(o);

        let mut roots = Roots::default();
        if qa.abs() < LINEAR_EPS {
            if qb.abs() >= LINEAR_EPS {
                roots.push(-qc / qb);
            }
            return roots;
        }

        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 {
            return roots;
        }
        // Numerically stable form of the quadratic formula
        let sq = disc.sqrt();
        let k = -0.5 * (qb + qb.signum() * sq);
        let (t1, t2) = if k != 0.0 {
            (k / qa, qc / k)
        } else {
            let t = -qb / (2.0 * qa);
            (t, t)
        };
        roots.push(t1.min(t2));
        roots.push(t1.max(t2));
        roots
    }

    /// Natural local extent of the surface clipped to `clip`.
    ///
    /// Axes the shape leaves open stay infinite unless the clip closes
    /// them; radial extents of cones and their relatives are derived from
    /// the clipped height.
    pub fn local_bounds(kind: &SurfaceKind, clip: &Aabb3) -> Aabb3 {
        let inf = f64::INFINITY;
        let zmax_abs = clip.min.z.abs().max(clip.max.z.abs());
        let sym = |rx: f64, ry: f64, z0: f64, z1: f64| {
            Aabb3::new(Point3::new(-rx, -ry, z0), Point3::new(rx, ry, z1))
        };
        let natural = match *kind {
            SurfaceKind::Plane => sym(inf, inf, 0.0, 0.0),
            SurfaceKind::Sphere { radius } => {
                let r = radius.abs();
                sym(r, r, -r, r)
            }
            SurfaceKind::Cylinder { radius } => {
                let r = radius.abs();
                sym(r, r, -inf, inf)
            }
            SurfaceKind::Cone { ratio } => {
                let r = ratio.abs() * zmax_abs;
                sym(r, r, -inf, inf)
            }
            SurfaceKind::Paraboloid { focal } => {
                let (z0, z1) = paraboloid_height(focal);
                let r = (focal.abs() * zmax_abs).sqrt();
                sym(r, r, z0, z1)
            }
            SurfaceKind::Hyperboloid { ratio, waist } => {
                let r = (ratio * ratio * zmax_abs * zmax_abs + waist).max(0.0).sqrt();
                sym(r, r, -inf, inf)
            }
            SurfaceKind::ParaCylinder { focal } => {
                let (z0, z1) = paraboloid_height(focal);
                let r = (focal.abs() * zmax_abs).sqrt();
                sym(r, inf, z0, z1)
            }
            SurfaceKind::HyperCylinder { ratio, waist } => {
                let r = (ratio * ratio * zmax_abs * zmax_abs + waist).max(0.0).sqrt();
                sym(r, inf, -inf, inf)
            }
            SurfaceKind::HyperParaboloid { focal } => {
                let xm = clip.min.x.abs().max(clip.max.x.abs());
                let ym = clip.min.y.abs().max(clip.max.y.abs());
                let f = focal.abs().max(LINEAR_EPS);
                let (lo, hi) = (-(ym * ym) / f, (xm * xm) / f);
                if focal < 0.0 {
                    sym(inf, inf, -hi, -lo)
                } else {
                    sym(inf, inf, lo, hi)
                }
            }
        };
        natural.intersection(clip)
    }
}

/// Height range of a paraboloid opening along the sign of `focal`.
fn paraboloid_height(focal: f64) -> (f64, f64) {
    if focal >= 0.0 {
        (0.0, f64::INFINITY)
    } else {
        (f64::NEG_INFINITY, 0.0)
    }
}
