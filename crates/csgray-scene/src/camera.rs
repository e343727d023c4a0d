//! Camera selection and action-driven camera motion.

use csgray_ir::{Camera, Transform3, Vec3};
use csgray_math::Transform;

/// Movement request applied to the current camera on each update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraAction {
    /// Leave the camera where it is.
    #[default]
    None,
    /// Move along the view direction.
    Forward,
    /// Move against the view direction.
    Back,
    /// Strafe left.
    Left,
    /// Strafe right.
    Right,
    /// Move up.
    Up,
    /// Move down.
    Down,
    /// Yaw left.
    TurnLeft,
    /// Yaw right.
    TurnRight,
    /// Pitch up.
    TiltUp,
    /// Pitch down.
    TiltDown,
}

/// Circular cursor over the cameras found while compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraRig {
    current: usize,
    count: usize,
}

impl CameraRig {
    /// Rig over `count` cameras, starting at the first.
    pub fn new(count: usize) -> Self {
        Self { current: 0, count }
    }

    /// Advance to the next camera, wrapping around. Returns the new index.
    pub fn next_cam(&mut self) -> usize {
        if self.count > 0 {
            self.current = (self.current + 1) % self.count;
        }
        self.current
    }

    /// Current camera index.
    pub fn cam_index(&self) -> usize {
        self.current
    }

    /// Number of cameras.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True if the rig has no camera.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Move or turn a camera transform by `action` over `seconds`.
///
/// Translation happens in the camera's own frame (x right, y up, z
/// forward) at the camera's `dps` rates; turning uses `drot` in degrees
/// per second and keeps angles in `[0, 360)`.
pub fn apply_action(transform: &mut Transform3, camera: &Camera, action: CameraAction, seconds: f64) {
    let step = |rate: f64| rate * seconds;
    let local = match action {
        CameraAction::Forward => Vec3::new(0.0, 0.0, step(camera.dps.z)),
        CameraAction::Back => Vec3::new(0.0, 0.0, -step(camera.dps.z)),
        CameraAction::Right => Vec3::new(step(camera.dps.x), 0.0, 0.0),
        CameraAction::Left => Vec3::new(-step(camera.dps.x), 0.0, 0.0),
        CameraAction::Up => Vec3::new(0.0, step(camera.dps.y), 0.0),
        CameraAction::Down => Vec3::new(0.0, -step(camera.dps.y), 0.0),
        CameraAction::TurnLeft => {
            transform.rotation.y = (transform.rotation.y - step(camera.drot.y)).rem_euclid(360.0);
            return;
        }
        CameraAction::TurnRight => {
            transform.rotation.y = (transform.rotation.y + step(camera.drot.y)).rem_euclid(360.0);
            return;
        }
        CameraAction::TiltUp => {
            transform.rotation.x = (transform.rotation.x - step(camera.drot.x)).rem_euclid(360.0);
            return;
        }
        CameraAction::TiltDown => {
            transform.rotation.x = (transform.rotation.x + step(camera.drot.x)).rem_euclid(360.0);
            return;
        }
        CameraAction::None => return,
    };
    let turn = Transform::from_srt([1.0; 3], transform.rotation.to_array(), [0.0; 3]);
    let world = turn.apply_vec(&csgray_math::Vec3::new(local.x, local.y, local.z));
    transform.position.x += world.x;
    transform.position.y += world.y;
    transform.position.z += world.z;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_next_cam_cycles() {
        let mut rig = CameraRig::new(3);
        assert_eq!(rig.cam_index(), 0);
        assert_eq!(rig.next_cam(), 1);
        assert_eq!(rig.next_cam(), 2);
        assert_eq!(rig.next_cam(), 0);
        assert_eq!(rig.cam_index(), 0);

        let mut single = CameraRig::new(1);
        assert_eq!(single.next_cam(), 0);
    }

    #[test]
    fn test_forward_follows_heading() {
        let cam = Camera::new(0, 0.0, 1.0);
        let mut t = Transform3::default();
        apply_action(&mut t, &cam, CameraAction::Forward, 2.0);
        assert_relative_eq!(t.position.z, 2.0, epsilon = 1e-12);

        // Facing +x after a quarter turn about y.
        let mut t = Transform3::default().rotated(0.0, 90.0, 0.0);
        apply_action(&mut t, &cam, CameraAction::Forward, 1.0);
        assert_relative_eq!(t.position.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.position.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_turns_stay_in_range() {
        let cam = Camera::new(0, 0.0, 1.0);
        let mut t = Transform3::default();
        apply_action(&mut t, &cam, CameraAction::TurnLeft, 1.0);
        assert_relative_eq!(t.rotation.y, 315.0, epsilon = 1e-12);
        apply_action(&mut t, &cam, CameraAction::TiltDown, 10.0);
        assert_relative_eq!(t.rotation.x, 90.0, epsilon = 1e-12);
        apply_action(&mut t, &cam, CameraAction::None, 10.0);
        assert_relative_eq!(t.rotation.x, 90.0, epsilon = 1e-12);
    }
}
