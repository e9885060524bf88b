//! Long-lived state owned by the presenter.
//!
//! Overview
//! - `audio` – audio bridge between player handles and native players
//! - `drawables` – drawable collection shared by both units
//! - `fontstore` – loaded fonts keyed by string IDs, text measurement
//! - `gameconfig` – INI backend configuration
//! - `input` – pressed keys and pointer buttons, pointer position
//! - `rendertarget` – render target trait and the software canvas
//! - `store` – the aggregate resource store
//! - `surface` – logical surface size and scale mode
//! - `texture` – texture handles and pixel data
//! - `texturestore` – loaded textures and texture operations

pub mod audio;
pub mod drawables;
pub mod fontstore;
pub mod gameconfig;
pub mod input;
pub mod rendertarget;
pub mod store;
pub mod surface;
pub mod texture;
pub mod texturestore;
