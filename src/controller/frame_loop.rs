use rand::Rng;

use crate::config::PlaygroundConfig;
use crate::controller::camera_controller::FirstPersonController;
use crate::controller::input::{InputProcessor, InputState, Trigger};
use crate::controller::physics::{PhysicsWorld, Shot};
use crate::model::Scene;
use crate::ui::FpsCounter;

/// Everything the frame loop advances: scene, physics world, controller.
/// Platform-independent; the web and native hosts feed it input and render its scene.
pub struct Playground {
    pub config: PlaygroundConfig,
    pub scene: Scene,
    pub world: PhysicsWorld,
    pub controller: FirstPersonController,
    pub input_processor: InputProcessor,
    pub fps: FpsCounter,
    pub last_shot: Option<Shot>,
}

impl Playground {
    pub fn new<R: Rng + ?Sized>(config: PlaygroundConfig, width: u32, height: u32, rng: &mut R) -> Self {
        let mut scene = Scene::new(&config.scene, width, height);
        let mut world = PhysicsWorld::new(&config);
        world.spawn_boxes(&mut scene, config.physics.box_count, rng);

        let controller = FirstPersonController::new(config.controls.clone());
        controller.sync_camera(&world, &mut scene.camera);
        let input_processor = InputProcessor::new(config.controls.bindings.clone());

        Self {
            config,
            scene,
            world,
            controller,
            input_processor,
            fps: FpsCounter::default(),
            last_shot: None,
        }
    }

    /// One frame: lock state and shoot triggers, physics step, then controller update.
    /// Rendering and the FPS tick are the host's, in that order, after this returns.
    pub fn advance(&mut self, input: &mut InputState, dt_ms: f32) {
        if input.pointer_locked != self.controller.is_enabled() {
            self.controller.set_pointer_locked(input.pointer_locked);
        }

        for trigger in input.drain_triggers() {
            match trigger {
                Trigger::Press => {
                    self.world.begin_charge(&self.controller);
                }
                Trigger::Release => {
                    if let Some(shot) = self.world.fire(&mut self.scene, &self.controller) {
                        self.last_shot = Some(shot);
                    }
                }
            }
        }

        self.world.step(&mut self.scene, &mut self.controller);
        self.controller
            .update(dt_ms, input, &self.input_processor, &mut self.world, &mut self.scene.camera);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.scene.resize(width, height);
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::FrameLoopContext;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use web_sys::{HtmlCanvasElement, Window};

    use super::Playground;
    use crate::controller::InputState;
    use crate::ui;
    use crate::view::{GpuContext, RenderState};

    /// Browser frame loop state, driven from requestAnimationFrame
    pub struct FrameLoopContext {
        pub playground: Playground,
        pub input: Rc<RefCell<InputState>>,
        pub gpu: GpuContext,
        pub render_state: RenderState,
        pub egui_ctx: egui::Context,
        pub window: Window,
        pub canvas: HtmlCanvasElement,
        pub last_time: Option<f64>,
    }

    impl FrameLoopContext {
        pub fn frame(&mut self) {
            let now = self.window.performance().map(|p| p.now()).unwrap_or(0.0);
            let dt_ms = self.last_time.map(|last| (now - last).clamp(0.0, 100.0)).unwrap_or(0.0) as f32;
            self.last_time = Some(now);

            self.handle_resize();

            let playground = &mut self.playground;
            playground.advance(&mut self.input.borrow_mut(), dt_ms);

            let dpr = self.window.device_pixel_ratio() as f32;
            self.egui_ctx.set_pixels_per_point(dpr);
            let raw_input = ui::raw_input(
                self.render_state.width,
                self.render_state.height,
                dpr,
                now / 1000.0,
                Vec::new(),
            );
            let output = ui::build_ui(&self.egui_ctx, raw_input, &playground);
            let (ui_frame, _) = ui::into_frame(&self.egui_ctx, output);

            let gpu = &self.gpu;
            self.render_state.prepare(&gpu.device, &gpu.queue, &playground.scene);
            self.render_state
                .draw_frame(&gpu.device, &gpu.queue, &gpu.surface, playground.scene.clear_color, ui_frame);

            playground.fps.tick(dt_ms);
        }

        /// Match the canvas backing store to the window, in physical pixels
        fn handle_resize(&mut self) {
            let (Ok(w), Ok(h)) = (self.window.inner_width(), self.window.inner_height()) else {
                return;
            };
            let dpr = self.window.device_pixel_ratio();
            let width = (w.as_f64().unwrap_or(800.0) * dpr) as u32;
            let height = (h.as_f64().unwrap_or(600.0) * dpr) as u32;

            if self.render_state.resize(&self.gpu.device, &self.gpu.surface, width, height) {
                self.canvas.set_width(width);
                self.canvas.set_height(height);
                self.playground.resize(width, height);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::input::{InputEvent, MouseButton};
    use crate::controller::LockEvent;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn playground() -> Playground {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        Playground::new(PlaygroundConfig::default(), 1280, 720, &mut rng)
    }

    fn primary(input: &mut InputState, is_down: bool) {
        input.process_event(&InputEvent::MouseButton { button: MouseButton::Primary, is_down });
    }

    #[test]
    fn test_charge_and_shoot_end_to_end() {
        let mut playground = playground();
        assert_eq!(playground.world.box_count(), 3);
        for pair in playground.world.boxes() {
            let p = playground.world.body_position(pair.body).unwrap();
            assert!((0.5..=1.5).contains(&p.y));
            assert!((-10.0..=10.0).contains(&p.x) && (-10.0..=10.0).contains(&p.z));
        }

        let mut input = InputState::new();
        input.process_event(&InputEvent::PointerLockChanged { locked: true });
        primary(&mut input, true);
        for _ in 0..14 {
            playground.advance(&mut input, 16.0);
        }
        assert_eq!(playground.world.energy(), 15);

        primary(&mut input, false);
        playground.advance(&mut input, 16.0);

        let shot = playground.last_shot.expect("fired");
        assert_eq!(shot.energy, 15);
        assert_eq!(shot.launch_speed, 15.0);
        assert_eq!(playground.world.ball_count(), 1);
        assert_eq!(playground.world.energy(), 0);
        assert!(!playground.world.recoil().is_idle());
    }

    #[test]
    fn test_clicks_before_lock_do_nothing() {
        let mut playground = playground();
        let mut input = InputState::new();

        // the click that requests the lock arrives before the lock itself
        primary(&mut input, true);
        input.process_event(&InputEvent::PointerLockChanged { locked: true });
        primary(&mut input, false);
        playground.advance(&mut input, 16.0);

        assert!(playground.controller.is_enabled());
        assert_eq!(playground.world.energy(), 0);
        assert!(playground.last_shot.is_none());
    }

    #[test]
    fn test_lock_changes_reach_subscribers() {
        let mut playground = playground();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        playground.controller.subscribe(move |event| sink.borrow_mut().push(event));

        let mut input = InputState::new();
        playground.advance(&mut input, 16.0);
        input.process_event(&InputEvent::PointerLockChanged { locked: true });
        playground.advance(&mut input, 16.0);
        playground.advance(&mut input, 16.0);
        input.process_event(&InputEvent::PointerLockChanged { locked: false });
        playground.advance(&mut input, 16.0);

        assert_eq!(*seen.borrow(), vec![LockEvent::Acquired, LockEvent::Released]);
    }

    #[test]
    fn test_world_frozen_while_unlocked() {
        let mut playground = playground();
        let mut input = InputState::new();
        let start = playground.world.player_position();
        for _ in 0..5 {
            playground.advance(&mut input, 16.0);
        }
        assert_eq!(playground.world.player_position(), start);
        assert_eq!(playground.scene.camera.eye, start);
    }
}
