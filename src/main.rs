use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

use ballpit::{
    config::PlaygroundConfig,
    controller::{self, InputEvent, InputState, Playground},
    logging, ui,
    view::{GpuContext, RenderState},
};

/// DOM `KeyboardEvent.key` name for the keys the controller binds
fn dom_key(code: KeyCode) -> Option<&'static str> {
    Some(match code {
        KeyCode::KeyW => "w",
        KeyCode::KeyA => "a",
        KeyCode::KeyS => "s",
        KeyCode::KeyD => "d",
        KeyCode::Space => " ",
        KeyCode::ArrowUp => "ArrowUp",
        KeyCode::ArrowDown => "ArrowDown",
        KeyCode::ArrowLeft => "ArrowLeft",
        KeyCode::ArrowRight => "ArrowRight",
        KeyCode::Escape => "Escape",
        _ => return None,
    })
}

/// Window, GPU and egui state, created once the event loop is running
struct Graphics {
    window: Arc<Window>,
    gpu: GpuContext,
    render_state: RenderState,
    egui_state: egui_winit::State,
}

struct App {
    playground: Playground,
    input: InputState,
    graphics: Option<Graphics>,
    egui_ctx: egui::Context,
    last_frame: Instant,
}

impl App {
    fn new() -> Self {
        let mut rng = ChaCha8Rng::from_entropy();
        Self {
            playground: Playground::new(PlaygroundConfig::default(), 1280, 720, &mut rng),
            input: InputState::new(),
            graphics: None,
            egui_ctx: egui::Context::default(),
            last_frame: Instant::now(),
        }
    }

    fn init_graphics(&self, event_loop: &ActiveEventLoop) -> Result<Graphics, Box<dyn std::error::Error>> {
        let attrs = Window::default_attributes()
            .with_title("Ballpit")
            .with_inner_size(LogicalSize::new(1280, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let size = window.inner_size();

        let gpu = pollster::block_on(GpuContext::new_native(window.clone(), size.width, size.height))?;
        let render_state = RenderState::new(&gpu.device, gpu.format, gpu.config.alpha_mode, gpu.config.width, gpu.config.height);
        let egui_state = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        Ok(Graphics { window, gpu, render_state, egui_state })
    }

    /// Native stand-in for pointer lock: grab and hide the cursor
    fn set_locked(&mut self, locked: bool) {
        let Some(graphics) = &self.graphics else { return };
        let window = &graphics.window;
        if locked {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                tracing::warn!(error = %e, "cursor grab unavailable");
                return;
            }
        } else if let Err(e) = window.set_cursor_grab(CursorGrabMode::None) {
            tracing::warn!(error = %e, "failed to release cursor");
        }
        window.set_cursor_visible(!locked);
        self.input.process_event(&InputEvent::PointerLockChanged { locked });
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt_ms = ((now - self.last_frame).as_secs_f32() * 1000.0).min(100.0);
        self.last_frame = now;

        self.playground.advance(&mut self.input, dt_ms);

        let Some(graphics) = &mut self.graphics else { return };
        let raw_input = graphics.egui_state.take_egui_input(&graphics.window);
        let output = ui::build_ui(&self.egui_ctx, raw_input, &self.playground);
        let (ui_frame, platform_output) = ui::into_frame(&self.egui_ctx, output);
        graphics.egui_state.handle_platform_output(&graphics.window, platform_output);

        let gpu = &graphics.gpu;
        graphics.render_state.prepare(&gpu.device, &gpu.queue, &self.playground.scene);
        graphics
            .render_state
            .draw_frame(&gpu.device, &gpu.queue, &gpu.surface, self.playground.scene.clear_color, ui_frame);

        self.playground.fps.tick(dt_ms);
        graphics.window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.graphics.is_some() {
            return;
        }
        match self.init_graphics(event_loop) {
            Ok(graphics) => {
                let size = graphics.window.inner_size();
                self.playground.resize(size.width, size.height);
                tracing::info!(width = size.width, height = size.height, "window ready");
                self.graphics = Some(graphics);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialise graphics");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Some(graphics) = &mut self.graphics {
            if !self.input.pointer_locked && graphics.egui_state.on_window_event(&graphics.window, &event).consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(graphics) = &mut self.graphics {
                    let gpu = &graphics.gpu;
                    if graphics.render_state.resize(&gpu.device, &gpu.surface, size.width, size.height) {
                        self.playground.resize(size.width, size.height);
                    }
                }
            }
            WindowEvent::Focused(false) => {
                self.input.process_event(&InputEvent::FocusLost);
                self.set_locked(false);
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key: PhysicalKey::Code(code), state, .. },
                ..
            } => {
                let Some(key) = dom_key(code) else { return };
                let pressed = state == ElementState::Pressed;
                if pressed && self.playground.input_processor.is_escape(key) {
                    self.set_locked(false);
                }
                let event = if pressed {
                    InputEvent::KeyDown(key.to_string())
                } else {
                    InputEvent::KeyUp(key.to_string())
                };
                self.input.process_event(&event);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                let button = match button {
                    MouseButton::Left => controller::MouseButton::Primary,
                    MouseButton::Middle => controller::MouseButton::Middle,
                    MouseButton::Right => controller::MouseButton::Secondary,
                    _ => controller::MouseButton::Other(-1),
                };
                // The click that takes the lock is not a trigger
                self.input.process_event(&InputEvent::MouseButton { button, is_down: pressed });
                if pressed && button == controller::MouseButton::Primary && !self.input.pointer_locked {
                    self.set_locked(true);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input.process_event(&InputEvent::MouseMove { dx: delta.0 as f32, dy: delta.1 as f32 });
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(graphics) = &self.graphics {
            graphics.window.request_redraw();
        }
    }
}

fn main() -> Result<(), winit::error::EventLoopError> {
    logging::init();
    tracing::info!("ballpit starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)
}
