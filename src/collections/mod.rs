//! Deterministic container types.

pub mod ordered;

pub use ordered::{OrderedMap, OrderedSet};
