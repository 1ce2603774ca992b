/// Platform-agnostic input handling
use std::collections::HashSet;

/// Platform-independent input events
#[derive(Debug, Clone)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    MouseMove { dx: f32, dy: f32 },
    MouseButton { button: MouseButton, is_down: bool },
    FocusLost,
    PointerLockChanged { locked: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
    Other(i16),
}

impl MouseButton {
    pub fn from_web_button(button: i16) -> Self {
        match button {
            0 => MouseButton::Primary,
            1 => MouseButton::Middle,
            2 => MouseButton::Secondary,
            other => MouseButton::Other(other),
        }
    }
}

/// Edge of the primary button while the pointer is locked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Press,
    Release,
}

/// Input accumulated between frames
#[derive(Debug, Default)]
pub struct InputState {
    pub pressed_keys: HashSet<String>,
    pub look_delta: (f32, f32),
    pub pointer_locked: bool,
    triggers: Vec<Trigger>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.pressed_keys.insert(key.clone());
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(key.as_str());
            }
            InputEvent::MouseMove { dx, dy } => {
                if self.pointer_locked {
                    self.look_delta.0 += dx;
                    self.look_delta.1 += dy;
                }
            }
            // The click that acquires the lock must not start a charge
            InputEvent::MouseButton { button: MouseButton::Primary, is_down } => {
                if self.pointer_locked {
                    self.triggers.push(if *is_down { Trigger::Press } else { Trigger::Release });
                }
            }
            InputEvent::MouseButton { .. } => {}
            InputEvent::FocusLost => {
                self.clear_keys();
            }
            InputEvent::PointerLockChanged { locked } => {
                self.pointer_locked = *locked;
                if !locked {
                    self.look_delta = (0.0, 0.0);
                }
            }
        }
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    pub fn clear_keys(&mut self) {
        self.pressed_keys.clear();
    }

    pub fn consume_look(&mut self) -> (f32, f32) {
        std::mem::take(&mut self.look_delta)
    }

    /// Trigger edges in arrival order
    pub fn drain_triggers(&mut self) -> Vec<Trigger> {
        std::mem::take(&mut self.triggers)
    }
}

/// Key mapping configuration, in DOM `KeyboardEvent.key` names
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub forward: String,
    pub backward: String,
    pub left: String,
    pub right: String,
    pub jump: String,
    pub escape: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: "w".to_string(),
            backward: "s".to_string(),
            left: "a".to_string(),
            right: "d".to_string(),
            jump: " ".to_string(),
            escape: "Escape".to_string(),
        }
    }
}

/// High-level queries over `InputState` through the key bindings
#[derive(Debug, Clone, Default)]
pub struct InputProcessor {
    bindings: KeyBindings,
}

impl InputProcessor {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    /// Letter bindings match regardless of shift
    fn is_bound(input: &InputState, binding: &str) -> bool {
        input.is_key_pressed(binding)
            || input.is_key_pressed(&binding.to_uppercase())
            || input.is_key_pressed(&binding.to_lowercase())
    }

    pub fn is_moving_forward(&self, input: &InputState) -> bool {
        Self::is_bound(input, &self.bindings.forward) || input.is_key_pressed("ArrowUp")
    }

    pub fn is_moving_backward(&self, input: &InputState) -> bool {
        Self::is_bound(input, &self.bindings.backward) || input.is_key_pressed("ArrowDown")
    }

    pub fn is_moving_left(&self, input: &InputState) -> bool {
        Self::is_bound(input, &self.bindings.left) || input.is_key_pressed("ArrowLeft")
    }

    pub fn is_moving_right(&self, input: &InputState) -> bool {
        Self::is_bound(input, &self.bindings.right) || input.is_key_pressed("ArrowRight")
    }

    pub fn is_jumping(&self, input: &InputState) -> bool {
        input.is_key_pressed(&self.bindings.jump)
    }

    pub fn is_escape(&self, key: &str) -> bool {
        key == self.bindings.escape
    }

    /// Keys whose browser default (scrolling) should be suppressed
    pub fn is_navigation_key(&self, key: &str) -> bool {
        matches!(key, "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight")
            || [&self.bindings.forward, &self.bindings.backward, &self.bindings.left, &self.bindings.right, &self.bindings.jump]
                .iter()
                .any(|b| key.eq_ignore_ascii_case(b))
    }
}

pub mod wasm {
    use super::*;
    use web_sys::{KeyboardEvent, MouseEvent};

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }

    pub fn mouse_move_to_input(e: &MouseEvent) -> InputEvent {
        InputEvent::MouseMove {
            dx: e.movement_x() as f32,
            dy: e.movement_y() as f32,
        }
    }

    pub fn mouse_button_to_input(e: &MouseEvent, is_down: bool) -> InputEvent {
        InputEvent::MouseButton {
            button: MouseButton::from_web_button(e.button()),
            is_down,
        }
    }
}
