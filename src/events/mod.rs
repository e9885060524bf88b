//! Messages exchanged between execution units.
//!
//! Submodules:
//! - [`audio`] – audio bridge notifications and audio-thread commands
//! - [`frame`] – the single-slot frame handshake between simulation and renderer
pub mod audio;
pub mod frame;
