//! Orbit camera: controller state machine and input systems.
//!
//! The controller starts auto-orbiting. Pressing the pointer starts a drag and
//! permanently hands orbit control to the user; only
//! [`CameraController::set_auto_orbit`] brings the automatic orbit back.

use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::{CursorLeft, PrimaryWindow};

use crate::config::CameraConfig;
use crate::plugin::VizContext;

/// Wheel delta reported per scroll line, in pixel-equivalents.
const PIXELS_PER_LINE: f32 = 100.0;

/// Plugin for orbit camera input and transform updates.
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera).add_systems(
            Update,
            (handle_pointer_input, handle_wheel_input, apply_camera_to_transform).chain(),
        );
    }
}

/// Camera control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraState {
    /// Eye circles the origin at a fixed rate
    #[default]
    AutoOrbiting,
    /// Pointer is held; orientation follows its displacement
    Dragging,
    /// User-controlled orientation, not moving on its own
    ManualOrbiting,
}

/// Orientation captured when a drag starts.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DragAnchor {
    press: Vec2,
    theta: f32,
    phi: f32,
}

/// Spherical orbit camera looking at the origin.
#[derive(Debug, Clone)]
pub struct CameraController {
    config: CameraConfig,
    state: CameraState,
    /// Azimuth in radians
    theta: f32,
    /// Polar angle in radians, measured from +y
    phi: f32,
    distance: f32,
    drag: Option<DragAnchor>,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let mut controller = Self {
            config,
            state: CameraState::AutoOrbiting,
            theta: 0.0,
            phi: 0.0,
            distance: 0.0,
            drag: None,
        };
        controller.phi = controller.clamp_phi(config.initial_polar);
        controller.distance = controller.clamp_distance(config.initial_distance);
        controller
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn is_auto_orbiting(&self) -> bool {
        self.state == CameraState::AutoOrbiting
    }

    pub fn is_dragging(&self) -> bool {
        self.state == CameraState::Dragging
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Current (theta, phi). While auto-orbiting these are derived from the
    /// eye position at `elapsed`.
    pub fn angles(&self, elapsed: f32) -> (f32, f32) {
        match self.state {
            CameraState::AutoOrbiting => spherical_angles(self.auto_eye(elapsed)),
            _ => (self.theta, self.phi),
        }
    }

    fn clamp_distance(&self, distance: f32) -> f32 {
        distance.clamp(self.config.min_distance, self.config.max_distance)
    }

    fn clamp_phi(&self, phi: f32) -> f32 {
        let margin = self.config.polar_margin;
        phi.clamp(margin, std::f32::consts::PI - margin)
    }

    fn auto_eye(&self, elapsed: f32) -> Vec3 {
        let angle = elapsed * self.config.orbit_rate;
        Vec3::new(
            angle.sin() * self.distance,
            self.config.orbit_height,
            angle.cos() * self.distance,
        )
    }

    fn manual_eye(&self) -> Vec3 {
        let d = self.distance;
        Vec3::new(
            d * self.phi.sin() * self.theta.cos(),
            d * self.phi.cos(),
            d * self.phi.sin() * self.theta.sin(),
        )
    }

    /// Eye position at `elapsed` seconds.
    pub fn eye(&self, elapsed: f32) -> Vec3 {
        match self.state {
            CameraState::AutoOrbiting => self.auto_eye(elapsed),
            _ => self.manual_eye(),
        }
    }

    /// Leaves auto-orbit with the orientation the auto eye currently has.
    fn leave_auto_orbit(&mut self, elapsed: f32) {
        if self.state != CameraState::AutoOrbiting {
            return;
        }
        let (theta, phi) = spherical_angles(self.auto_eye(elapsed));
        self.theta = theta;
        self.phi = self.clamp_phi(phi);
        self.state = CameraState::ManualOrbiting;
    }

    /// Starts a drag at `press` (pixels).
    pub fn pointer_down(&mut self, press: Vec2, elapsed: f32) {
        self.leave_auto_orbit(elapsed);
        self.drag = Some(DragAnchor {
            press,
            theta: self.theta,
            phi: self.phi,
        });
        self.state = CameraState::Dragging;
    }

    /// Updates the orientation from the pointer displacement since the
    /// press. Returns false when no drag is in progress.
    pub fn pointer_move(&mut self, position: Vec2) -> bool {
        let Some(anchor) = self.drag else {
            return false;
        };
        let delta = position - anchor.press;
        self.theta = anchor.theta - delta.x * self.config.drag_sensitivity;
        self.phi = self.clamp_phi(anchor.phi + delta.y * self.config.drag_sensitivity);
        true
    }

    /// Ends a drag. Orbit stays under user control.
    pub fn pointer_up(&mut self) {
        if self.drag.take().is_some() {
            self.state = CameraState::ManualOrbiting;
        }
    }

    /// Applies a wheel delta (pixel units, positive moves away).
    pub fn wheel(&mut self, delta: f32) -> f32 {
        self.adjust_distance(delta * self.config.wheel_scale)
    }

    /// Changes the distance by raw world units and returns the clamped result.
    pub fn adjust_distance(&mut self, delta: f32) -> f32 {
        self.distance = self.clamp_distance(self.distance + delta);
        self.distance
    }

    /// Enables or disables the automatic orbit.
    pub fn set_auto_orbit(&mut self, enabled: bool, elapsed: f32) {
        if enabled {
            self.drag = None;
            self.state = CameraState::AutoOrbiting;
        } else {
            self.leave_auto_orbit(elapsed);
        }
    }
}

/// (theta, phi) of a point relative to the origin, in the convention used by
/// the manual orbit.
fn spherical_angles(p: Vec3) -> (f32, f32) {
    let length = p.length();
    if length <= f32::EPSILON {
        return (0.0, std::f32::consts::FRAC_PI_2);
    }
    (p.z.atan2(p.x), (p.y / length).clamp(-1.0, 1.0).acos())
}

/// Marker component for the main camera.
#[derive(Component)]
pub struct MainCamera;

/// System to set up the camera and lights on startup.
fn setup_camera(mut commands: Commands, ctx: Res<VizContext>) {
    let config = *ctx.camera().config();
    let eye = ctx.camera().eye(0.0);

    commands.spawn((
        Camera3dBundle {
            projection: PerspectiveProjection {
                fov: config.fov_degrees.to_radians(),
                near: config.near,
                far: config.far,
                ..default()
            }
            .into(),
            transform: Transform::from_translation(eye).looking_at(Vec3::ZERO, Vec3::Y),
            ..default()
        },
        MainCamera,
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 400.0,
    });
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            illuminance: 8_000.0,
            ..default()
        },
        transform: Transform::from_xyz(50.0, 50.0, 50.0).looking_at(Vec3::ZERO, Vec3::Y),
        ..default()
    });
    commands.spawn(PointLightBundle {
        point_light: PointLight {
            intensity: 2_000_000.0,
            range: 300.0,
            ..default()
        },
        transform: Transform::from_xyz(-50.0, 50.0, -50.0),
        ..default()
    });
}

/// System to route mouse buttons and cursor motion into picking and the
/// orbit controller.
fn handle_pointer_input(
    mut ctx: ResMut<VizContext>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut cursor_left: EventReader<CursorLeft>,
) {
    if cursor_left.read().next().is_some() {
        ctx.pointer_up();
    }

    let Ok(window) = windows.get_single() else {
        return;
    };
    let cursor = window.cursor_position();

    if mouse_button.just_pressed(MouseButton::Left) {
        if let Some(position) = cursor {
            ctx.pointer_down(position);
        }
    }
    if let Some(position) = cursor {
        ctx.pointer_move(position);
    }
    if mouse_button.just_released(MouseButton::Left) {
        ctx.pointer_up();
    }
}

/// System to turn scroll events into distance changes.
fn handle_wheel_input(mut ctx: ResMut<VizContext>, mut scroll: EventReader<MouseWheel>) {
    for ev in scroll.read() {
        let pixels = match ev.unit {
            MouseScrollUnit::Line => ev.y * PIXELS_PER_LINE,
            MouseScrollUnit::Pixel => ev.y,
        };
        // Scrolling up zooms in.
        ctx.wheel(-pixels);
    }
}

/// System to apply the controller's eye position to the camera transform.
fn apply_camera_to_transform(
    ctx: Res<VizContext>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    let eye = ctx.camera_eye();
    for mut transform in camera_query.iter_mut() {
        *transform = Transform::from_translation(eye).looking_at(Vec3::ZERO, Vec3::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_4, PI};

    #[test]
    fn test_initial_state() {
        let camera = CameraController::default();
        assert_eq!(camera.state(), CameraState::AutoOrbiting);
        assert_eq!(camera.distance(), 120.0);
        assert_eq!(camera.angles(0.0).0, spherical_angles(camera.eye(0.0)).0);
    }

    #[test]
    fn test_auto_orbit_circles_at_fixed_height() {
        let camera = CameraController::default();
        for t in [0.0, 1.0, 7.5] {
            let eye = camera.eye(t);
            assert_eq!(eye.y, 60.0);
            assert!((Vec2::new(eye.x, eye.z).length() - 120.0).abs() < 1e-3);
        }
        assert_ne!(camera.eye(0.0), camera.eye(1.0));
    }

    #[test]
    fn test_drag_lifecycle() {
        let mut camera = CameraController::default();
        camera.pointer_down(Vec2::new(100.0, 100.0), 0.0);
        assert_eq!(camera.state(), CameraState::Dragging);

        let (theta0, phi0) = camera.angles(0.0);
        assert!(camera.pointer_move(Vec2::new(150.0, 120.0)));
        let (theta, phi) = camera.angles(0.0);
        assert!((theta - (theta0 - 0.5)).abs() < 1e-5);
        assert!((phi - (phi0 + 0.2)).abs() < 1e-5);

        camera.pointer_up();
        assert_eq!(camera.state(), CameraState::ManualOrbiting);
        assert!(!camera.pointer_move(Vec2::new(0.0, 0.0)));
        assert_eq!(camera.angles(99.0), (theta, phi));
    }

    #[test]
    fn test_drag_is_relative_to_press_not_accumulated() {
        let mut camera = CameraController::default();
        camera.set_auto_orbit(false, 0.0);
        camera.pointer_down(Vec2::ZERO, 0.0);
        for x in 1..=50 {
            camera.pointer_move(Vec2::new(x as f32, 0.0));
        }
        let (theta_steps, _) = camera.angles(0.0);

        let mut other = CameraController::default();
        other.set_auto_orbit(false, 0.0);
        other.pointer_down(Vec2::ZERO, 0.0);
        other.pointer_move(Vec2::new(50.0, 0.0));
        assert!((other.angles(0.0).0 - theta_steps).abs() < 1e-6);
    }

    #[test]
    fn test_polar_angle_is_clamped() {
        let mut camera = CameraController::default();
        camera.pointer_down(Vec2::ZERO, 0.0);
        camera.pointer_move(Vec2::new(0.0, 10_000.0));
        assert!((camera.angles(0.0).1 - (PI - 0.1)).abs() < 1e-5);
        camera.pointer_move(Vec2::new(0.0, -10_000.0));
        assert!((camera.angles(0.0).1 - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_wheel_scales_and_clamps() {
        let mut camera = CameraController::default();
        assert_eq!(camera.wheel(500.0), 170.0);
        assert_eq!(camera.wheel(10_000.0), 250.0);
        assert_eq!(camera.wheel(-10_000.0), 40.0);
        assert_eq!(camera.state(), CameraState::AutoOrbiting);
    }

    #[test]
    fn test_only_explicit_enable_returns_to_auto() {
        let mut camera = CameraController::default();
        camera.pointer_down(Vec2::ZERO, 0.0);
        camera.pointer_up();
        camera.pointer_down(Vec2::ZERO, 0.0);
        camera.pointer_up();
        assert_eq!(camera.state(), CameraState::ManualOrbiting);

        camera.set_auto_orbit(true, 3.0);
        assert!(camera.is_auto_orbiting());
    }

    #[test]
    fn test_leaving_auto_orbit_keeps_direction() {
        let mut camera = CameraController::default();
        let t = 2.0;
        let before = camera.eye(t).normalize();
        camera.set_auto_orbit(false, t);
        let after = camera.eye(t).normalize();
        assert!(before.distance(after) < 1e-4, "{before:?} vs {after:?}");
    }

    #[test]
    fn test_manual_eye_formula() {
        let mut camera = CameraController::default();
        camera.set_auto_orbit(false, 0.0);
        camera.pointer_down(Vec2::ZERO, 0.0);
        // Drive to theta = 0, phi = pi/4 from whatever the seed was.
        let (theta0, phi0) = camera.angles(0.0);
        camera.pointer_move(Vec2::new(theta0 / 0.01, (FRAC_PI_4 - phi0) / 0.01));
        let eye = camera.eye(0.0);
        let d = 120.0;
        assert!((eye.x - d * FRAC_PI_4.sin()).abs() < 1e-2);
        assert!((eye.y - d * FRAC_PI_4.cos()).abs() < 1e-2);
        assert!(eye.z.abs() < 1e-2);
    }
}
