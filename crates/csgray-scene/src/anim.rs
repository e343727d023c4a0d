//! Per-object animators.
//!
//! An animator mutates its object's transform in place once per update,
//! given the current time and the time of its previous run. Time is always
//! supplied by the caller in milliseconds.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::Arc;

use csgray_ir::{AnimatorDesc, Axis, Transform3};

/// Read-only facts about the animated object.
#[derive(Debug, Clone, Copy)]
pub struct AnimatorContext<'a> {
    /// Arena index of the object.
    pub object: usize,
    /// Transform the object was declared with.
    pub base: &'a Transform3,
    /// Declared creation time, the first `last` value.
    pub created: i64,
}

/// Mutates an object transform over time.
pub trait Animator: Send + Sync {
    /// Advance `transform` from `last` to `time`.
    fn animate(&self, time: i64, last: i64, transform: &mut Transform3, ctx: &AnimatorContext<'_>);
}

impl<F> Animator for F
where
    F: Fn(i64, i64, &mut Transform3, &AnimatorContext<'_>) + Send + Sync,
{
    fn animate(&self, time: i64, last: i64, transform: &mut Transform3, ctx: &AnimatorContext<'_>) {
        self(time, last, transform, ctx)
    }
}

fn component(v: &mut csgray_ir::Vec3, axis: Axis) -> &mut f64 {
    match axis {
        Axis::X => &mut v.x,
        Axis::Y => &mut v.y,
        Axis::Z => &mut v.z,
    }
}

/// Constant rotation about one axis. The accumulated angle stays in
/// `[0, 360)` however long the scene runs.
#[derive(Debug, Clone, Copy)]
pub struct Spin {
    /// Rotation axis.
    pub axis: Axis,
    /// Angular rate.
    pub degrees_per_second: f64,
}

impl Animator for Spin {
    fn animate(&self, time: i64, last: i64, transform: &mut Transform3, _ctx: &AnimatorContext<'_>) {
        let dt = time.wrapping_sub(last) as f64 / 1000.0;
        let angle = component(&mut transform.rotation, self.axis);
        *angle = (*angle + self.degrees_per_second * dt).rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negatives
        if *angle >= 360.0 {
            *angle = 0.0;
        }
    }
}

/// Sinusoidal offset along one axis around the declared position.
#[derive(Debug, Clone, Copy)]
pub struct Bob {
    /// Offset axis.
    pub axis: Axis,
    /// Peak offset.
    pub amplitude: f64,
    /// Period in milliseconds.
    pub period_ms: f64,
}

impl Animator for Bob {
    fn animate(&self, time: i64, _last: i64, transform: &mut Transform3, ctx: &AnimatorContext<'_>) {
        let mut base = ctx.base.position;
        let origin = *component(&mut base, self.axis);
        let phase = if self.period_ms > 0.0 {
            time.wrapping_sub(ctx.created) as f64 / self.period_ms
        } else {
            0.0
        };
        *component(&mut transform.position, self.axis) = origin + self.amplitude * (TAU * phase).sin();
    }
}

/// Named animators available to [`AnimatorDesc::Custom`].
#[derive(Default, Clone)]
pub struct AnimatorRegistry {
    named: HashMap<String, Arc<dyn Animator>>,
}

impl std::fmt::Debug for AnimatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.named.keys().collect();
        names.sort();
        f.debug_struct("AnimatorRegistry").field("named", &names).finish()
    }
}

impl AnimatorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an animator under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, animator: Arc<dyn Animator>) -> &mut Self {
        self.named.insert(name.into(), animator);
        self
    }

    /// Number of named animators.
    pub fn len(&self) -> usize {
        self.named.len()
    }

    /// True if no animator is registered.
    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
    }

    /// Build or look up the animator a description names.
    ///
    /// Returns `None` only for an unregistered custom name.
    pub fn resolve(&self, desc: &AnimatorDesc) -> Option<Arc<dyn Animator>> {
        match desc {
            AnimatorDesc::Spin { axis, degrees_per_second } => Some(Arc::new(Spin {
                axis: *axis,
                degrees_per_second: *degrees_per_second,
            })),
            AnimatorDesc::Bob { axis, amplitude, period_ms } => Some(Arc::new(Bob {
                axis: *axis,
                amplitude: *amplitude,
                period_ms: *period_ms,
            })),
            AnimatorDesc::Custom { name } => self.named.get(name).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ctx(base: &Transform3) -> AnimatorContext<'_> {
        AnimatorContext {
            object: 0,
            base,
            created: 0,
        }
    }

    #[test]
    fn test_spin_wraps_into_range() {
        let spin = Spin {
            axis: Axis::Y,
            degrees_per_second: 90.0,
        };
        let base = Transform3::default();
        let mut t = base;
        let mut last = 0;
        for time in (500..=20_000).step_by(500) {
            spin.animate(time, last, &mut t, &ctx(&base));
            last = time;
            assert!((0.0..360.0).contains(&t.rotation.y));
        }
        // 20 s at 90 deg/s is five full turns.
        assert_relative_eq!(t.rotation.y, 0.0, epsilon = 1e-9);

        spin.animate(last - 1000, last, &mut t, &ctx(&base));
        assert_relative_eq!(t.rotation.y, 270.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bob_is_a_function_of_time() {
        let bob = Bob {
            axis: Axis::Z,
            amplitude: 2.0,
            period_ms: 1000.0,
        };
        let base = Transform3::at(0.0, 0.0, 5.0);
        let mut t = base;
        bob.animate(250, 0, &mut t, &ctx(&base));
        assert_relative_eq!(t.position.z, 7.0, epsilon = 1e-9);
        bob.animate(1250, 250, &mut t, &ctx(&base));
        assert_relative_eq!(t.position.z, 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_registry_resolves_custom() {
        let mut reg = AnimatorRegistry::new();
        reg.register(
            "lift",
            Arc::new(|time: i64, _last: i64, t: &mut Transform3, _c: &AnimatorContext<'_>| {
                t.position.y = time as f64;
            }),
        );
        let custom = AnimatorDesc::Custom { name: "lift".into() };
        let anim = reg.resolve(&custom).unwrap();
        let base = Transform3::default();
        let mut t = base;
        anim.animate(42, 0, &mut t, &ctx(&base));
        assert_relative_eq!(t.position.y, 42.0);
        assert!(reg.resolve(&AnimatorDesc::Custom { name: "missing".into() }).is_none());
    }
}
