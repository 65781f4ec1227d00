//! Player Input
//!
//! The closed direction enumeration shared with the wire protocol, and
//! the per-tick input map consumed by the simulation step. The numeric
//! values are part of the wire contract and must never be reordered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::vec2::FixVec2;

/// One player's input for one frame.
///
/// `Up/Down/Left/Right` steer; the remaining variants request the
/// player's current action. `None` means idle.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum InputDirection {
    /// No input.
    #[default]
    None = 0,
    /// Move up (+Y).
    Up = 1,
    /// Move down (-Y).
    Down = 2,
    /// Move left (-X).
    Left = 3,
    /// Move right (+X).
    Right = 4,
    /// Fire the current weapon.
    Fire = 5,
    /// Place a wall ghost.
    PlaceWall = 6,
    /// Drop a barrel.
    PlaceBarrel = 7,
}

impl InputDirection {
    /// Decode a wire value; unknown values fall back to `None` so one bad
    /// input does not break the stream.
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => Self::Up,
            2 => Self::Down,
            3 => Self::Left,
            4 => Self::Right,
            5 => Self::Fire,
            6 => Self::PlaceWall,
            7 => Self::PlaceBarrel,
            _ => Self::None,
        }
    }

    /// Wire encoding.
    #[inline]
    pub fn to_wire(self) -> i32 {
        self as i32
    }

    /// Unit movement vector, ZERO for non-movement inputs.
    pub fn move_vec(self) -> FixVec2 {
        match self {
            Self::Up => FixVec2::UP,
            Self::Down => FixVec2::DOWN,
            Self::Left => FixVec2::LEFT,
            Self::Right => FixVec2::RIGHT,
            _ => FixVec2::ZERO,
        }
    }

    /// True for the four steering variants.
    #[inline]
    pub fn is_movement(self) -> bool {
        matches!(self, Self::Up | Self::Down | Self::Left | Self::Right)
    }
}

/// All inputs applied to one frame: player id → direction. A BTreeMap so
/// application order is sorted by player id on every machine.
pub type FrameInputs = BTreeMap<u32, InputDirection>;
