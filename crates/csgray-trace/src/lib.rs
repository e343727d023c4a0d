#![warn(missing_docs)]

//! Quadric ray intersection for the csgray engine.
//!
//! Every primitive is a clipped quadric in its own local frame. This crate
//! intersects world rays with posed quadrics and decides whether a hit
//! survives the subtractions the scene compiler attached to its surface.
//!
//! # Architecture
//!
//! - [`Ray`] - Ray representation with origin and direction
//! - [`RayHit`] - Intersection result with world and local points
//! - [`quadric`] - Implicit surfaces, root finding and local bounds
//! - [`pose`] - A surface placed in the world for one frame
//! - [`csg`] - Trim-list evaluation for subtracted solids
//!
//! # Example
//!
//! ```ignore
//! use csgray_trace::{Quadric, Ray, SurfacePose};
//!
//! let kind = SurfaceKind::Sphere { radius: 1.0 };
//! let clip = Aabb3::infinite();
//! let bounds = Quadric::local_bounds(&kind, &clip);
//! let pose = SurfacePose::new(Quadric::from_kind(&kind), clip, &bounds, Transform::identity())
//!     .unwrap();
//!
//! let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
//! let first = pose.candidates(&ray, f64::INFINITY).next();
//! ```

mod ray;
pub mod csg;
pub mod pose;
pub mod quadric;

pub use csg::{passes_trims, TrimEntry, TrimKind};
pub use pose::SurfacePose;
pub use quadric::{Quadric, Roots};
pub use ray::{HitSide, Ray, RayHit};
