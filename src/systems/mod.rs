//! Backend systems.
//!
//! Submodules overview
//! - [`framesync`] – per-tick frame synchronizer and the presenter wiring
//! - [`render`] – draw dispatch of drawables onto a render target
//! - [`texture_transform`] – pixel-level texture operations
//! - `audio` – raylib audio thread backend (feature `raylib`)
//! - `window` – raylib window render loop (feature `raylib`)

#[cfg(feature = "raylib")]
pub mod audio;
pub mod framesync;
pub mod render;
pub mod texture_transform;
#[cfg(feature = "raylib")]
pub mod window;
