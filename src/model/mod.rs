// MODEL: Scene data and game state
pub mod bounded_queue;
pub mod camera;
pub mod color;
pub mod scene;
pub mod shot;

pub use bounded_queue::BoundedQueue;
pub use camera::Camera;
pub use color::Rgb;
pub use scene::{Lighting, MeshId, MeshShape, Scene, VisualMesh};
pub use shot::{Charge, Recoil};
