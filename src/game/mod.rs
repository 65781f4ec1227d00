//! Game logic: components, input, the ordered system pipeline and the
//! deterministic room bootstrap. Everything below `net/` in the module
//! tree is 100% deterministic.

pub mod components;
pub mod effects;
pub mod input;
pub mod pathing;
pub mod player;
pub mod setup;
pub mod step;
pub mod zombie;

pub use input::{FrameInputs, InputDirection};
pub use step::{SimConfig, Simulation};
