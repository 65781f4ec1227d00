//! Networking (non-deterministic): wire protocol, rooms, and the frame
//! broadcaster. Nothing under `net/` touches simulation state directly;
//! the seed and the input stream are the only bridge.

pub mod protocol;
pub mod room;
pub mod server;

pub use protocol::{Packet, ProtocolError};
pub use server::{FrameServer, ServerConfig};
