use glam::Vec3;

use crate::config::ControlConfig;
use crate::controller::input::{InputProcessor, InputState};
use crate::controller::physics::PhysicsWorld;
use crate::model::Camera;

/// Engagement transitions, raised to subscribers such as the instructions overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEvent {
    Acquired,
    Released,
}

/// First-person controller: mouse look plus planar movement applied to the
/// player body. Movement, look and shooting only happen while engaged
/// (pointer locked).
pub struct FirstPersonController {
    config: ControlConfig,
    yaw: f32,
    pitch: f32,
    enabled: bool,
    listeners: Vec<Box<dyn FnMut(LockEvent)>>,
}

impl FirstPersonController {
    pub fn new(config: ControlConfig) -> Self {
        Self {
            config,
            yaw: 0.0,
            pitch: 0.0,
            enabled: false,
            listeners: Vec::new(),
        }
    }

    /// Called on every lock transition
    pub fn subscribe(&mut self, listener: impl FnMut(LockEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Sync the engaged flag with the host's pointer-lock state. Returns the
    /// transition, if there was one.
    pub fn set_pointer_locked(&mut self, locked: bool) -> Option<LockEvent> {
        if locked == self.enabled {
            return None;
        }
        self.enabled = locked;
        let event = if locked { LockEvent::Acquired } else { LockEvent::Released };
        tracing::info!(?event, "pointer lock changed");
        for listener in &mut self.listeners {
            listener(event);
        }
        Some(event)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Apply a mouse delta in pixels
    pub fn apply_look(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.config.mouse_sensitivity;
        self.set_pitch(self.pitch - dy * self.config.mouse_sensitivity);
    }

    /// Used by recoil; positive tilts the view up
    pub fn nudge_pitch(&mut self, delta: f32) {
        self.set_pitch(self.pitch + delta);
    }

    fn set_pitch(&mut self, pitch: f32) {
        let pi_half = std::f32::consts::FRAC_PI_2;
        self.pitch = pitch.clamp(-pi_half, pi_half);
    }

    /// Horizontal unit vectors for the current yaw
    fn planar_axes(&self) -> (Vec3, Vec3) {
        let (sin, cos) = self.yaw.sin_cos();
        (Vec3::new(cos, 0.0, sin), Vec3::new(-sin, 0.0, cos))
    }

    /// Per-frame update. Look deltas are always consumed so nothing piles up
    /// while unlocked; the camera always follows the player body.
    pub fn update(
        &mut self,
        dt_ms: f32,
        input: &mut InputState,
        processor: &InputProcessor,
        world: &mut PhysicsWorld,
        camera: &mut Camera,
    ) {
        let (dx, dy) = input.consume_look();

        if self.enabled {
            self.apply_look(dx, dy);

            let (forward, right) = self.planar_axes();
            let mut wish = Vec3::ZERO;
            if processor.is_moving_forward(input) {
                wish += forward;
            }
            if processor.is_moving_backward(input) {
                wish -= forward;
            }
            if processor.is_moving_right(input) {
                wish += right;
            }
            if processor.is_moving_left(input) {
                wish -= right;
            }

            let step = self.config.velocity_factor * dt_ms * 0.1;
            if wish != Vec3::ZERO {
                world.push_player(wish * step);
            }

            if processor.is_jumping(input) && world.player_grounded() {
                world.set_player_vertical_velocity(self.config.jump_velocity);
            }
        }

        self.sync_camera(world, camera);
    }

    /// Put the eye at the player body's centre, looking along yaw/pitch
    pub fn sync_camera(&self, world: &PhysicsWorld, camera: &mut Camera) {
        camera.yaw = self.yaw;
        camera.pitch = self.pitch;
        camera.eye = world.player_position();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaygroundConfig;
    use crate::controller::input::InputEvent;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn controller() -> FirstPersonController {
        FirstPersonController::new(ControlConfig::default())
    }

    #[test]
    fn test_lock_transitions_notify_once() {
        let mut controller = controller();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        controller.subscribe(move |event| sink.borrow_mut().push(event));

        assert!(!controller.is_enabled());
        assert_eq!(controller.set_pointer_locked(true), Some(LockEvent::Acquired));
        assert_eq!(controller.set_pointer_locked(true), None);
        assert_eq!(controller.set_pointer_locked(false), Some(LockEvent::Released));
        assert_eq!(*seen.borrow(), vec![LockEvent::Acquired, LockEvent::Released]);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut controller = controller();
        controller.apply_look(0.0, -100_000.0);
        assert_eq!(controller.pitch(), std::f32::consts::FRAC_PI_2);
        controller.nudge_pitch(1.0);
        assert_eq!(controller.pitch(), std::f32::consts::FRAC_PI_2);
        controller.apply_look(0.0, 100_000.0);
        assert_eq!(controller.pitch(), -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_update_moves_player_along_yaw() {
        let config = PlaygroundConfig::default();
        let mut world = PhysicsWorld::new(&config);
        let mut camera = Camera::new(800, 600, 75.0, 0.1, 1000.0);
        let processor = InputProcessor::default();
        let mut input = InputState::new();
        let mut controller = controller();
        controller.set_pointer_locked(true);

        input.process_event(&InputEvent::KeyDown("w".to_string()));
        controller.update(16.0, &mut input, &processor, &mut world, &mut camera);

        let velocity = world.player_velocity();
        let expected = 0.2 * 16.0 * 0.1;
        assert!((velocity.x - expected).abs() < 1e-5, "{velocity}");
        assert!(velocity.z.abs() < 1e-5);
        assert_eq!(camera.eye, world.player_position());
    }

    #[test]
    fn test_update_ignores_input_while_unlocked() {
        let config = PlaygroundConfig::default();
        let mut world = PhysicsWorld::new(&config);
        let mut camera = Camera::new(800, 600, 75.0, 0.1, 1000.0);
        let processor = InputProcessor::default();
        let mut input = InputState::new();
        let mut controller = controller();

        input.process_event(&InputEvent::KeyDown("d".to_string()));
        input.look_delta = (40.0, 0.0);
        controller.update(16.0, &mut input, &processor, &mut world, &mut camera);

        assert_eq!(world.player_velocity(), Vec3::ZERO);
        assert_eq!(controller.yaw(), 0.0);
        assert_eq!(input.look_delta, (0.0, 0.0));
    }
}
