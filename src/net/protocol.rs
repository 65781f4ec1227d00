//! Wire Protocol
//!
//! Frame layout (both directions, over a reliable-ordered transport):
//!
//! ```text
//! ┌────────────────────┬──────────┬──────────────────────┐
//! │ length: u32 BE     │ type: u8 │ payload (protobuf)   │
//! │ = 1 + payload_len  │          │                      │
//! └────────────────────┴──────────┴──────────────────────┘
//! ```
//!
//! The numeric type codes and the protobuf field numbers are the
//! bit-exact contract; never renumber them. Frames above 1 MiB or with a
//! zero length are malformed and terminate the connection; an unknown
//! type code is logged and skipped.

use prost::Message;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Hard cap on `length`; anything larger drops the connection.
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

/// CONNECT type code.
pub const MSG_CONNECT: u8 = 1;
/// FRAME_DATA type code.
pub const MSG_FRAME_DATA: u8 = 2;
/// SERVER_FRAME type code.
pub const MSG_SERVER_FRAME: u8 = 3;
/// DISCONNECT type code.
pub const MSG_DISCONNECT: u8 = 4;
/// FRAME_LOSS type code.
pub const MSG_FRAME_LOSS: u8 = 5;
/// HEARTBEAT type code.
pub const MSG_HEARTBEAT: u8 = 6;
/// GAME_START type code.
pub const MSG_GAME_START: u8 = 7;

/// Connection handshake. The client may send a zero `player_id`; the
/// server's reply carries the assigned id.
#[derive(Clone, PartialEq, Message)]
pub struct ConnectMsg {
    /// Assigned player id (0 in the client's request).
    #[prost(uint32, tag = "1")]
    pub player_id: u32,
    /// Display name.
    #[prost(string, tag = "2")]
    pub player_name: String,
}

/// One player's input for one frame.
#[derive(Clone, PartialEq, Message)]
pub struct FrameDataMsg {
    /// Sending player.
    #[prost(uint32, tag = "1")]
    pub player_id: u32,
    /// Wire encoding of [`crate::game::input::InputDirection`].
    #[prost(int32, tag = "2")]
    pub direction: i32,
    /// Client frame the input targets.
    #[prost(uint64, tag = "3")]
    pub frame_number: u64,
}

/// Authoritative frame broadcast: every input the room buffered between
/// the previous tick and this one, in arrival order.
#[derive(Clone, PartialEq, Message)]
pub struct ServerFrameMsg {
    /// Room-scoped frame number, strictly increasing from 1.
    #[prost(uint64, tag = "1")]
    pub frame_number: u64,
    /// Server wall-clock at broadcast, UTC milliseconds.
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    /// Buffered inputs, in the order they arrived.
    #[prost(message, repeated, tag = "3")]
    pub frame_datas: Vec<FrameDataMsg>,
}

/// Client request to re-broadcast missed frames.
#[derive(Clone, PartialEq, Message)]
pub struct FrameLossMsg {
    /// Frames the client never received.
    #[prost(uint64, repeated, tag = "1")]
    pub frame_numbers: Vec<u64>,
}

/// Room start announcement: the seed is the single source of simulation
/// determinism for every member, delivered before any ServerFrame.
#[derive(Clone, PartialEq, Message)]
pub struct GameStartMsg {
    /// Room id.
    #[prost(uint64, tag = "1")]
    pub room_id: u64,
    /// Simulation seed shared by the whole room.
    #[prost(int64, tag = "2")]
    pub random_seed: i64,
    /// Members in join order; the first is the host.
    #[prost(uint32, repeated, tag = "3")]
    pub player_ids: Vec<u32>,
}

impl ServerFrameMsg {
    /// Collapse the broadcast into the per-player input map the
    /// simulation consumes. If a player managed to get several inputs
    /// into one frame, the last one sent wins.
    pub fn to_frame_inputs(&self) -> crate::game::input::FrameInputs {
        let mut inputs = crate::game::input::FrameInputs::new();
        for fd in &self.frame_datas {
            inputs.insert(
                fd.player_id,
                crate::game::input::InputDirection::from_wire(fd.direction),
            );
        }
        inputs
    }
}

/// A decoded wire message.
#[derive(Clone, PartialEq, Debug)]
pub enum Packet {
    /// CONNECT (1).
    Connect(ConnectMsg),
    /// FRAME_DATA (2).
    FrameData(FrameDataMsg),
    /// SERVER_FRAME (3).
    ServerFrame(ServerFrameMsg),
    /// DISCONNECT (4).
    Disconnect,
    /// FRAME_LOSS (5).
    FrameLoss(FrameLossMsg),
    /// HEARTBEAT (6).
    Heartbeat,
    /// GAME_START (7).
    GameStart(GameStartMsg),
}

/// Protocol violations and transport failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame length outside `1..=MAX_FRAME_LEN`.
    #[error("malformed frame length {0}")]
    BadLength(u32),
    /// Type code not in the contract. Recoverable: skip the frame.
    #[error("unknown message type {0}")]
    UnknownType(u8),
    /// Payload failed to parse. Recoverable: skip the frame.
    #[error("payload decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
    /// Transport failure. Fatal for the connection.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// True when the framing itself is intact and the connection can
    /// keep reading.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownType(_) | Self::Decode(_))
    }
}

impl Packet {
    /// The wire type code.
    pub fn type_code(&self) -> u8 {
        match self {
            Packet::Connect(_) => MSG_CONNECT,
            Packet::FrameData(_) => MSG_FRAME_DATA,
            Packet::ServerFrame(_) => MSG_SERVER_FRAME,
            Packet::Disconnect => MSG_DISCONNECT,
            Packet::FrameLoss(_) => MSG_FRAME_LOSS,
            Packet::Heartbeat => MSG_HEARTBEAT,
            Packet::GameStart(_) => MSG_GAME_START,
        }
    }

    /// Encode the full frame: `length + type + payload`.
    pub fn encode_frame(&self) -> Vec<u8> {
        let payload = match self {
            Packet::Connect(m) => m.encode_to_vec(),
            Packet::FrameData(m) => m.encode_to_vec(),
            Packet::ServerFrame(m) => m.encode_to_vec(),
            Packet::Disconnect => Vec::new(),
            Packet::FrameLoss(m) => m.encode_to_vec(),
            Packet::Heartbeat => Vec::new(),
            Packet::GameStart(m) => m.encode_to_vec(),
        };
        let length = 1 + payload.len() as u32;
        let mut frame = Vec::with_capacity(4 + length as usize);
        frame.extend_from_slice(&length.to_be_bytes());
        frame.push(self.type_code());
        frame.extend_from_slice(&payload);
        frame
    }

    /// Decode a payload for a given type code.
    pub fn decode(type_code: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        Ok(match type_code {
            MSG_CONNECT => Packet::Connect(ConnectMsg::decode(payload)?),
            MSG_FRAME_DATA => Packet::FrameData(FrameDataMsg::decode(payload)?),
            MSG_SERVER_FRAME => Packet::ServerFrame(ServerFrameMsg::decode(payload)?),
            MSG_DISCONNECT => Packet::Disconnect,
            MSG_FRAME_LOSS => Packet::FrameLoss(FrameLossMsg::decode(payload)?),
            MSG_HEARTBEAT => Packet::Heartbeat,
            MSG_GAME_START => Packet::GameStart(GameStartMsg::decode(payload)?),
            other => return Err(ProtocolError::UnknownType(other)),
        })
    }
}

/// Read one frame. Partial reads are retried inside `read_exact`, so a
/// slow peer never corrupts framing. A bad length is fatal; a bad
/// type/payload is reported as recoverable and the stream position stays
/// frame-aligned.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet, ProtocolError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let length = u32::from_be_bytes(len_buf);
    if length < 1 || length > MAX_FRAME_LEN {
        return Err(ProtocolError::BadLength(length));
    }

    let mut type_buf = [0u8; 1];
    reader.read_exact(&mut type_buf).await?;
    let mut payload = vec![0u8; (length - 1) as usize];
    reader.read_exact(&mut payload).await?;

    Packet::decode(type_buf[0], &payload)
}

/// Write one frame.
pub async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &Packet,
) -> Result<(), ProtocolError> {
    writer.write_all(&packet.encode_frame()).await?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
