//! Deterministic fixed-point physics: shapes, narrow phase, layer matrix,
//! the 2D ECS pipeline, and the standalone 3D body world.

pub mod contact;
pub mod contact3;
pub mod layers;
pub mod shape;
pub mod step;
pub mod world3;

pub use contact::Contact2;
pub use contact3::Contact3;
pub use layers::LayerMatrix;
pub use shape::{Basis3, Shape};
pub use step::{PhysicsConfig, PhysicsPipeline};
pub use world3::{Body3, Physics3Config, PhysicsWorld3};
