use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Upper bound on the absolute pitch, in degrees.
pub const PITCH_LIMIT: f32 = 89.0;

/// Axis a camera translation follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Free-flying camera with a derived orthonormal basis.
///
/// `front`, `right` and `up` are recomputed from `yaw`/`pitch` on every
/// rotation, so floating point error from repeated deltas never accumulates
/// in the basis itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    position: Vec3,
    target: Vec3,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
}

impl Camera {
    /// Builds a camera looking from `position` at `target`.
    ///
    /// `target` must differ from `position` and `world_up` must not be parallel
    /// to the view direction; the basis is undefined otherwise. The initial
    /// front is rebuilt from the clamped yaw and pitch, so a steeper target is
    /// pulled back to the pitch limit and `target()` reports a point one unit
    /// ahead.
    pub fn new(position: Vec3, target: Vec3, world_up: Vec3) -> Self {
        debug_assert!(
            (target - position).length_squared() > f32::EPSILON,
            "camera target must differ from its position"
        );
        let front = (target - position).normalize();
        let yaw = front.z.atan2(front.x).to_degrees();
        let pitch = front
            .y
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let world_up = world_up.normalize();
        let right = front.cross(world_up).normalize();
        let up = right.cross(front).normalize();
        let mut camera = Self {
            position,
            target,
            front,
            right,
            up,
            world_up,
            yaw,
            pitch,
        };
        camera.recompute_basis(0.0);
        camera
    }

    /// Look-at transform for the current pose.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Translates the camera along one of its basis vectors.
    pub fn move_by(&mut self, direction: MoveDirection, speed: f32) {
        let offset = match direction {
            MoveDirection::Forward => self.front * speed,
            MoveDirection::Backward => -self.front * speed,
            MoveDirection::Right => self.right * speed,
            MoveDirection::Left => -self.right * speed,
            MoveDirection::Up => self.up * speed,
            MoveDirection::Down => -self.up * speed,
        };
        self.position += offset;
        self.target = self.position + self.front;
    }

    /// Applies rotation deltas given in radians.
    ///
    /// A zero `roll_delta` rebuilds `up` from the world up vector, which also
    /// clears any roll introduced earlier.
    pub fn rotate(&mut self, pitch_delta: f32, yaw_delta: f32, roll_delta: f32) {
        self.yaw += yaw_delta.to_degrees();
        self.pitch = (self.pitch + pitch_delta.to_degrees()).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.recompute_basis(roll_delta);
    }

    fn recompute_basis(&mut self, roll: f32) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();

        if roll != 0.0 {
            let rotated = Mat3::from_axis_angle(self.front, roll) * self.up;
            self.right = self.front.cross(rotated).normalize();
            self.up = self.right.cross(self.front).normalize();
        } else {
            self.right = self.front.cross(self.world_up).normalize();
            self.up = self.right.cross(self.front).normalize();
        }

        self.target = self.position + self.front;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    /// Yaw in degrees.
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch in degrees, always within `[-89, 89]`.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn assert_orthonormal(camera: &Camera) {
        assert!((camera.front().length() - 1.0).abs() < EPS);
        assert!((camera.right().length() - 1.0).abs() < EPS);
        assert!((camera.up().length() - 1.0).abs() < EPS);
        assert!(camera.right().dot(camera.up()).abs() < EPS);
        assert!(camera.front().dot(camera.up()).abs() < EPS);
        assert!(camera.front().dot(camera.right()).abs() < EPS);
        // right-handed: right x up == -front
        assert!((camera.right().cross(camera.up()) + camera.front()).length() < EPS);
    }

    fn looking_down_x() -> Camera {
        Camera::new(Vec3::ZERO, Vec3::X, Vec3::Y)
    }

    #[test]
    fn move_forward_follows_front() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        camera.move_by(MoveDirection::Forward, 1.0);
        assert!((camera.position() - Vec3::new(0.0, 0.0, 4.0)).length() < EPS);
        assert!((camera.target() - Vec3::new(0.0, 0.0, 3.0)).length() < EPS);
    }

    #[test]
    fn zero_speed_move_changes_nothing() {
        let mut camera = Camera::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 0.0, -2.0), Vec3::Y);
        camera.rotate(0.2, -0.7, 0.0);
        let before = camera.clone();
        for direction in [
            MoveDirection::Forward,
            MoveDirection::Backward,
            MoveDirection::Left,
            MoveDirection::Right,
            MoveDirection::Up,
            MoveDirection::Down,
        ] {
            camera.move_by(direction, 0.0);
        }
        assert_eq!(camera.position(), before.position());
        assert_eq!(camera.front(), before.front());
        assert_eq!(camera.right(), before.right());
        assert_eq!(camera.up(), before.up());
    }

    #[test]
    fn strafing_moves_along_right() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        camera.move_by(MoveDirection::Right, 2.0);
        assert!((camera.position() - Vec3::new(2.0, 0.0, 5.0)).length() < EPS);
        camera.move_by(MoveDirection::Down, 1.0);
        assert!((camera.position() - Vec3::new(2.0, -1.0, 5.0)).length() < EPS);
    }

    #[test]
    fn yaw_quarter_turn_stays_horizontal() {
        let mut camera = looking_down_x();
        assert!(camera.yaw().abs() < EPS);
        assert!(camera.pitch().abs() < EPS);

        camera.rotate(0.0, 90f32.to_radians(), 0.0);
        assert!((camera.front() - Vec3::Z).length() < EPS);
        assert!((camera.front().length() - 1.0).abs() < EPS);
        assert!(camera.front().dot(Vec3::X).abs() < EPS);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = looking_down_x();
        for _ in 0..50 {
            camera.rotate(10f32.to_radians(), 0.0, 0.0);
            assert!(camera.pitch() <= PITCH_LIMIT);
        }
        assert_eq!(camera.pitch(), PITCH_LIMIT);
        for _ in 0..100 {
            camera.rotate(-7f32.to_radians(), 0.0, 0.0);
            assert!(camera.pitch() >= -PITCH_LIMIT);
        }
        assert_eq!(camera.pitch(), -PITCH_LIMIT);
    }

    #[test]
    fn steep_initial_target_is_clamped_at_construction() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::new(0.001, 1.0, 0.0), Vec3::Y);
        assert_eq!(camera.pitch(), PITCH_LIMIT);
        assert!((camera.front().y - PITCH_LIMIT.to_radians().sin()).abs() < EPS);
        assert_orthonormal(&camera);

        let front = camera.front();
        let view = camera.view_matrix();
        camera.rotate(0.0, 0.0, 0.0);
        assert!((camera.front() - front).length() < EPS);
        assert!(camera.view_matrix().abs_diff_eq(view, EPS));
    }

    #[test]
    fn zero_roll_rotations_keep_basis_orthonormal() {
        let mut camera = Camera::new(
            Vec3::new(-6.79388, 2.73188, -7.94507),
            Vec3::new(15.384, -0.275071, -11.2464),
            Vec3::Y,
        );
        assert_orthonormal(&camera);
        let mut seed = 17u32;
        for _ in 0..2000 {
            // small deterministic LCG so the sequence is reproducible
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let pitch = ((seed >> 8) % 200) as f32 / 100.0 - 1.0;
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let yaw = ((seed >> 8) % 200) as f32 / 100.0 - 1.0;
            camera.rotate(pitch, yaw, 0.0);
            assert_orthonormal(&camera);
            assert!(camera.pitch().abs() <= PITCH_LIMIT);
        }
    }

    #[test]
    fn zero_roll_clears_previous_roll() {
        let mut camera = looking_down_x();
        camera.rotate(0.0, 0.0, 30f32.to_radians());
        assert!(camera.up().dot(Vec3::Y) < 0.9);
        assert_orthonormal(&camera);

        camera.rotate(0.0, 0.0, 0.0);
        assert!((camera.up() - Vec3::Y).length() < EPS);
        assert_orthonormal(&camera);
    }

    #[test]
    fn roll_turns_up_around_front() {
        let mut camera = looking_down_x();
        camera.rotate(0.0, 0.0, 90f32.to_radians());
        assert!((camera.front() - Vec3::X).length() < EPS);
        assert!(camera.up().dot(Vec3::Y).abs() < EPS);
        assert_orthonormal(&camera);
    }

    #[test]
    fn view_matrix_is_pure() {
        let mut camera = Camera::new(Vec3::new(3.0, 1.0, 2.0), Vec3::ZERO, Vec3::Y);
        camera.rotate(0.1, 0.3, 0.0);
        let first = camera.view_matrix();
        let second = camera.view_matrix();
        assert_eq!(first, second);
    }

    #[test]
    fn view_matrix_maps_target_onto_negative_z() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((origin_in_view - Vec3::new(0.0, 0.0, -5.0)).length() < EPS);
    }
}
