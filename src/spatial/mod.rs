//! Broad-phase spatial indices. Derived data: rebuilt or incrementally
//! maintained from component state each tick, never snapshotted.

pub mod aabb;
pub mod bvh;
pub mod quadtree;

pub use aabb::{Aabb2, Aabb3};
pub use bvh::Bvh;
pub use quadtree::Quadtree;
