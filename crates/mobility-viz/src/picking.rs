//! Pointer picking against render-object spheres.

use bevy::math::{Vec2, Vec3};
use mobility_events::AgentId;

/// World-space ray with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickRay {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl PickRay {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Perspective camera description used to build pick rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickCamera {
    pub eye: Vec3,
    pub target: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Viewport size in pixels
    pub viewport: Vec2,
}

impl PickCamera {
    /// Ray through a pointer position given in pixels from the top-left
    /// corner. `None` for an empty viewport or a degenerate camera basis.
    pub fn ray(&self, pointer: Vec2) -> Option<PickRay> {
        if self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return None;
        }
        let forward = (self.target - self.eye).try_normalize()?;
        let right = forward.cross(Vec3::Y).try_normalize()?;
        let up = right.cross(forward);

        let ndc = Vec2::new(
            pointer.x / self.viewport.x * 2.0 - 1.0,
            1.0 - pointer.y / self.viewport.y * 2.0,
        );
        let tan_half = (self.fov_y * 0.5).tan();
        let aspect = self.viewport.x / self.viewport.y;
        let direction = forward + right * (ndc.x * tan_half * aspect) + up * (ndc.y * tan_half);

        Some(PickRay {
            origin: self.eye,
            direction: direction.try_normalize()?,
        })
    }
}

/// Distance along the ray to the first intersection with a sphere, if the
/// sphere is in front of the ray origin.
pub fn ray_sphere_hit(ray: &PickRay, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let near = -b - root;
    if near >= 0.0 {
        return Some(near);
    }
    let far = -b + root;
    (far >= 0.0).then_some(far)
}

/// Id of the nearest sphere the ray hits.
pub fn pick_nearest<I>(ray: &PickRay, targets: I) -> Option<AgentId>
where
    I: IntoIterator<Item = (AgentId, Vec3, f32)>,
{
    targets
        .into_iter()
        .filter_map(|(id, center, radius)| ray_sphere_hit(ray, center, radius).map(|t| (id, t)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}
