//! Error types shared by the resource store, the draw dispatcher and the
//! frame handshake.
//!
//! Recoverable render-side failures are reported per drawable and never leave
//! the per-tick callback; resource calls return them to the simulation side.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which store a failed lookup went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Texture,
    Font,
    AudioPlayer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Texture => "texture",
            ResourceKind::Font => "font",
            ResourceKind::AudioPlayer => "audio player",
        };
        f.write_str(name)
    }
}

/// Errors raised by resource, configuration and drawing operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The handle or key is not bound to anything.
    #[error("{kind} '{key}' not found")]
    ResourceNotFound { kind: ResourceKind, key: String },

    /// The handle exists but its pixel data was unloaded.
    #[error("{kind} '{key}' is not loaded")]
    ResourceUnavailable { kind: ResourceKind, key: String },

    /// Malformed bootstrap input. Fatal before the frame loop starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A drawable or argument the backend cannot interpret.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("failed to parse font: {0}")]
    Font(String),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid scene description: {0}")]
    Scene(#[from] serde_json::Error),
}

impl RenderError {
    pub fn not_found(kind: ResourceKind, key: impl ToString) -> Self {
        RenderError::ResourceNotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn unavailable(kind: ResourceKind, key: impl ToString) -> Self {
        RenderError::ResourceUnavailable {
            kind,
            key: key.to_string(),
        }
    }
}

/// Errors raised by the simulation/render handshake.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// `signal_frame` was called while the previous frame is still pending.
    #[error("a frame is already pending presentation")]
    FramePending,

    /// The render unit did not consume the frame in time.
    #[error("render unit did not advance within {0:?}")]
    Timeout(Duration),

    /// The other side of the handshake was dropped.
    #[error("the other side of the frame handshake is gone")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, RenderError>;
