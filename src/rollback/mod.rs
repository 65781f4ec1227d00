//! Predict/rollback: snapshot ring, input history and the ServerFrame
//! classification state machine.

pub mod controller;

pub use controller::{
    classify, Classification, DivergenceError, RollbackController, ServerFrameOutcome,
};
