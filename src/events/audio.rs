//! Audio messages and commands.
//!
//! [`AudioMessage`] is emitted by the
//! [`AudioBridge`](crate::resources::audio::AudioBridge) whenever a binding
//! changes state. [`AudioCmd`] is the request protocol between a proxy player
//! and a backend that keeps its native players on a dedicated audio thread.
use crossbeam_channel::Sender;
use std::path::PathBuf;

use crate::resources::audio::PlayerId;

/// Notifications emitted by the [`AudioBridge`](crate::resources::audio::AudioBridge).
///
/// Drained by whoever holds a receiver from
/// [`AudioBridge::messages`](crate::resources::audio::AudioBridge::messages).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioMessage {
    PlayerLoaded { player: PlayerId },
    /// Natural end reached and playback restarted from zero. `remaining` is
    /// the countdown left for counted loops, `None` for infinite loops.
    PlayerRestarted { player: PlayerId, remaining: Option<u32> },
    /// Natural end reached and the player stopped.
    PlayerFinished { player: PlayerId },
    PlayerUnloaded { player: PlayerId },
    PlayersUnloadedAll,
}

/// Commands sent to an audio thread. `voice` numbers the native players
/// owned by that thread.
#[derive(Debug, Clone)]
pub enum AudioCmd {
    /// Open `path` as a new voice and answer on `reply`.
    Open {
        voice: u32,
        path: PathBuf,
        reply: Sender<Result<(), String>>,
    },
    /// Start, or continue after a pause.
    Play { voice: u32 },
    Pause { voice: u32 },
    Stop { voice: u32 },
    Seek { voice: u32, seconds: f32 },
    Volume { voice: u32, volume: f32 },
    /// Release the voice.
    Close { voice: u32 },
    Shutdown,
}
