use egui::Context;

use crate::controller::Playground;
use crate::view::UiFrame;

/// Frames per second, refreshed about once a second
#[derive(Debug, Default, Clone)]
pub struct FpsCounter {
    fps: f32,
    frames: u32,
    elapsed_ms: f32,
}

impl FpsCounter {
    pub fn tick(&mut self, dt_ms: f32) {
        self.frames += 1;
        self.elapsed_ms += dt_ms;
        if self.elapsed_ms >= 1000.0 {
            self.fps = self.frames as f32 * 1000.0 / self.elapsed_ms;
            self.frames = 0;
            self.elapsed_ms = 0.0;
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// Raw egui input for a canvas of `width` x `height` physical pixels
pub fn raw_input(width: u32, height: u32, pixels_per_point: f32, time_s: f64, events: Vec<egui::Event>) -> egui::RawInput {
    let mut raw_input = egui::RawInput::default();
    raw_input.time = Some(time_s);
    raw_input.screen_rect = Some(egui::Rect::from_min_size(
        egui::Pos2::new(0.0, 0.0),
        egui::vec2(width as f32 / pixels_per_point, height as f32 / pixels_per_point),
    ));
    raw_input.events = events;
    raw_input
}

/// Build the complete UI and return egui output
pub fn build_ui(egui_ctx: &Context, raw_input: egui::RawInput, playground: &Playground) -> egui::FullOutput {
    egui_ctx.run(raw_input, |ctx| {
        draw_aim(ctx, playground);
        draw_stats(ctx, playground);
        if !playground.controller.is_enabled() {
            draw_instructions(ctx);
        }
    })
}

/// Tessellate for the renderer; the platform output goes back to the host
pub fn into_frame(egui_ctx: &Context, output: egui::FullOutput) -> (UiFrame, egui::PlatformOutput) {
    let primitives = egui_ctx.tessellate(output.shapes, output.pixels_per_point);
    let frame = UiFrame {
        primitives,
        textures_delta: output.textures_delta,
        pixels_per_point: output.pixels_per_point,
    };
    (frame, output.platform_output)
}

/// Filled disk at screen centre, coloured by the current charge
fn draw_aim(ctx: &Context, playground: &Playground) {
    let scene = &playground.scene;
    let painter = ctx.layer_painter(egui::LayerId::new(egui::Order::Foreground, egui::Id::new("aim")));
    let screen = ctx.available_rect();
    let radius = (screen.height() * scene.aim_radius_fraction).max(2.0);
    painter.circle_filled(screen.center(), radius, scene.aim_color().to_egui(scene.aim_opacity));
}

fn draw_stats(ctx: &Context, playground: &Playground) {
    egui::Area::new(egui::Id::new("stats"))
        .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
        .interactable(false)
        .show(ctx, |ui| {
            let text = |s: String| egui::RichText::new(s).small().color(egui::Color32::WHITE);
            ui.label(text(format!("FPS: {:.0}", playground.fps.fps())));
            ui.label(text(format!(
                "Balls: {}/{}  Boxes: {}",
                playground.world.ball_count(),
                playground.config.shoot.max_balls,
                playground.world.box_count()
            )));
            if playground.world.energy() > 0 {
                ui.label(text(format!("Energy: {}", playground.world.energy())));
            }
        });
}

fn draw_instructions(ctx: &Context) {
    egui::Window::new("Ballpit")
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new("Click to play").strong());
            ui.separator();
            ui.label(egui::RichText::new("Move: WASD / arrow keys").small());
            ui.label(egui::RichText::new("Jump: Space").small());
            ui.label(egui::RichText::new("Look: mouse").small());
            ui.label(egui::RichText::new("Shoot: hold and release left button").small());
            ui.label(egui::RichText::new("Pause: Esc").small());
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaygroundConfig;
    use crate::controller::InputState;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_fps_counter_updates_each_second() {
        let mut fps = FpsCounter::default();
        for _ in 0..59 {
            fps.tick(1000.0 / 60.0);
        }
        assert_eq!(fps.fps(), 0.0);
        fps.tick(1000.0 / 60.0 + 0.01);
        assert!((fps.fps() - 60.0).abs() < 0.1, "{}", fps.fps());
    }

    #[test]
    fn test_build_ui_runs_locked_and_unlocked() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut playground = Playground::new(PlaygroundConfig::default(), 800, 600, &mut rng);
        let ctx = Context::default();

        let output = build_ui(&ctx, raw_input(800, 600, 1.0, 0.0, Vec::new()), &playground);
        let (frame, _) = into_frame(&ctx, output);
        assert!(!frame.primitives.is_empty());

        let mut input = InputState::new();
        input.pointer_locked = true;
        playground.advance(&mut input, 16.0);
        assert!(playground.controller.is_enabled());
        let output = build_ui(&ctx, raw_input(800, 600, 1.0, 0.016, Vec::new()), &playground);
        assert!(!output.shapes.is_empty());
    }
}
