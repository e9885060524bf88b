//! Aberred FX library.
//!
//! Presentation backend for a 2D engine: a simulation thread describes each
//! frame as a collection of drawables, and a render unit draws exactly one
//! pass per simulation step, synchronized through a single-slot handshake.
//!
//! - [`components`] – drawable descriptors, colors and 2D transforms
//! - [`events`] – the frame handshake and audio messages
//! - [`resources`] – textures, fonts, audio players, input and configuration
//! - [`systems`] – draw dispatch, frame synchronization, texture operations
//! - [`scene`] – JSON scene loading
//!
//! The `components`, `resources` and `systems` names are kept for layout
//! only: there is no ECS here. Components are plain value types, resources
//! are stores owned by a [`ResourceStore`](resources::store::ResourceStore),
//! and systems are ordinary functions and structs called by the frame loop.
//!
//! Everything except the `raylib` feature modules runs headless on the
//! software [`Canvas`](resources::rendertarget::Canvas).

pub mod components;
pub mod error;
pub mod events;
pub mod resources;
pub mod scene;
pub mod systems;
