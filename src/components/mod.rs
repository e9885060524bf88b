//! Plain data types shared by the simulation and the render unit.
//!
//! Submodules overview:
//! - [`color`] – logical (float) and native (RGBA8) colors
//! - [`drawable`] – drawable descriptors and their shapes
//! - [`transform`] – 2D affine transforms and rectangles

pub mod color;
pub mod drawable;
pub mod transform;
