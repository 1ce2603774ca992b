// CONTROLLER: Input, game logic, and update loop
pub mod camera_controller;
pub mod frame_loop;
pub mod input;
pub mod physics;

pub use camera_controller::{FirstPersonController, LockEvent};
pub use frame_loop::Playground;
#[cfg(target_arch = "wasm32")]
pub use frame_loop::FrameLoopContext;
pub use input::{InputEvent, InputProcessor, InputState, KeyBindings, MouseButton, Trigger};
pub use physics::{BodyPair, PhysicsWorld, Shot};
