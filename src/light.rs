use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Direction the light points from before any rotation is applied.
pub const BASE_DIRECTION: Vec3 = Vec3::new(0.0, 1.0, 1.0);

/// Degrees the light turns per animated frame.
pub const ANIMATION_STEP: f32 = -1.0;

/// Orthographic volume the shadow map covers, in light space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightFrustum {
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
    /// Distance from the origin at which the light "eye" sits.
    pub distance: f32,
}

impl Default for LightFrustum {
    fn default() -> Self {
        Self {
            half_extent: 10.0,
            near: 1.0,
            far: 15.0,
            distance: 5.0,
        }
    }
}

/// Point light used when the second light is switched on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(11.3923, 0.687753, -17.3235),
            color: Vec3::new(1.0, 0.5, 0.2),
        }
    }
}

/// Builds the projection * view transform mapping world positions into the
/// shadow map's clip space.
pub fn compute_light_space_matrix(direction: Vec3, frustum: &LightFrustum) -> Mat4 {
    let extent = frustum.half_extent;
    let projection =
        Mat4::orthographic_rh(-extent, extent, -extent, extent, frustum.near, frustum.far);
    let eye = direction.normalize() * frustum.distance;
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
    projection * view
}

/// Animatable directional light. Only the angle is stored; the direction is
/// derived from it whenever it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    angle: f32,
    frustum: LightFrustum,
}

impl LightState {
    pub fn new(angle: f32, frustum: LightFrustum) -> Self {
        Self { angle, frustum }
    }

    /// Current angle around world up, in degrees. Not wrapped.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn frustum(&self) -> &LightFrustum {
        &self.frustum
    }

    pub fn advance(&mut self, delta: f32) {
        self.angle += delta;
    }

    pub fn rotation(&self) -> Mat4 {
        Mat4::from_rotation_y(self.angle.to_radians())
    }

    pub fn direction(&self) -> Vec3 {
        self.rotation()
            .transform_vector3(BASE_DIRECTION.normalize())
            .normalize()
    }

    pub fn light_space_matrix(&self) -> Mat4 {
        compute_light_space_matrix(self.direction(), &self.frustum)
    }
}

impl Default for LightState {
    fn default() -> Self {
        Self::new(0.0, LightFrustum::default())
    }
}
