//! Audio bridge between logical player handles and native playback objects.
//!
//! The simulation refers to players by [`PlayerId`]. Each handle is reserved
//! with [`AudioBridge::load_audio_player`] and later bound to a native player
//! by [`AudioBridge::load_audio_clip`]. Native players come from an
//! [`AudioBackend`], so a real device, a dedicated audio thread or a test
//! double can sit behind the same bridge.
//!
//! End-of-media handling is a per-binding policy:
//! - `set_loop(false)`: stop at the end (default)
//! - `set_loop(true)`: restart from zero forever
//! - `set_loop_count(n)`: restart `n` more times, then stop
//!
//! Backends only *report* the natural end of media; [`AudioBridge::pump`]
//! polls for it and applies the policy. Every operation on a handle that is
//! not bound fails with [`RenderError::ResourceNotFound`].
//!
//! Notifications go to a bounded queue of [`MESSAGE_CAPACITY`] entries. When
//! nobody drains it, the oldest message is discarded to make room.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RenderError, ResourceKind, Result};
use crate::events::audio::AudioMessage;

/// Notifications kept for receivers before the oldest is dropped.
pub const MESSAGE_CAPACITY: usize = 256;

/// Logical player handle owned by the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An audio clip to bind to a player.
#[derive(Clone, Debug, Default)]
pub struct AudioClip {
    pub cached_path: PathBuf,
    /// Encoded contents, if the clip was loaded from memory.
    pub data: Option<Vec<u8>>,
    /// Drop `data` once a native player has been created from it.
    pub flush_after_load: bool,
}

impl AudioClip {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            cached_path: path.into(),
            ..Default::default()
        }
    }

    pub fn flush(&mut self) {
        self.data = None;
    }
}

/// Engine-native playback object.
pub trait NativePlayer: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, position: Duration);
    fn position(&self) -> Duration;
    fn length(&self) -> Duration;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn is_playing(&self) -> bool;
    /// Returns `true` once for every natural end of media since the last
    /// call.
    fn take_end_of_media(&mut self) -> bool;
    /// Release native resources. The player is not used afterwards.
    fn dispose(&mut self);
}

/// Factory of native players.
pub trait AudioBackend: Send {
    fn open(&mut self, clip: &AudioClip) -> Result<Box<dyn NativePlayer>>;
}

/// What happens when a bound player reaches the end of its media.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EndOfMedia {
    Stop,
    Restart,
    /// Restart while the counter is positive, decrementing each time.
    Countdown(u32),
}

struct Binding {
    player: Option<Box<dyn NativePlayer>>,
    on_end: EndOfMedia,
}

pub struct AudioBridge {
    backend: Box<dyn AudioBackend>,
    players: FxHashMap<PlayerId, Binding>,
    next_id: u32,
    tx_msg: Sender<AudioMessage>,
    rx_msg: Receiver<AudioMessage>,
}

impl AudioBridge {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        let (tx_msg, rx_msg) = bounded(MESSAGE_CAPACITY);
        Self {
            backend,
            players: FxHashMap::default(),
            next_id: 0,
            tx_msg,
            rx_msg,
        }
    }

    /// Bridge whose players make no sound. Useful headless.
    pub fn silent() -> Self {
        Self::new(Box::new(SilentBackend))
    }

    /// Receiver for bridge notifications. Receivers share one queue, so each
    /// message is delivered to exactly one of them.
    pub fn messages(&self) -> Receiver<AudioMessage> {
        self.rx_msg.clone()
    }

    fn notify(&self, msg: AudioMessage) {
        // The bridge keeps its own receiver alive, so only Full can happen.
        if let Err(TrySendError::Full(msg)) = self.tx_msg.try_send(msg) {
            if let Ok(dropped) = self.rx_msg.try_recv() {
                debug!("audio message queue full, dropped {:?}", dropped);
            }
            let _ = self.tx_msg.try_send(msg);
        }
    }

    /// Reserve a new player handle.
    pub fn load_audio_player(&mut self) -> PlayerId {
        let id = PlayerId(self.next_id);
        self.next_id += 1;
        self.players.insert(
            id,
            Binding {
                player: None,
                on_end: EndOfMedia::Stop,
            },
        );
        debug!("audio player {} reserved", id);
        id
    }

    /// Bind `clip` to `player`, replacing any previous native player. The
    /// binding starts in stop-at-end mode.
    pub fn load_audio_clip(&mut self, clip: &mut AudioClip, player: PlayerId) -> Result<()> {
        if !self.players.contains_key(&player) {
            return Err(RenderError::not_found(ResourceKind::AudioPlayer, player));
        }
        let native = self.backend.open(clip)?;
        if let Some(binding) = self.players.get_mut(&player) {
            if let Some(mut old) = binding.player.replace(native) {
                old.dispose();
            }
            binding.on_end = EndOfMedia::Stop;
        }
        info!("audio player {} bound to '{}'", player, clip.cached_path.display());
        if clip.flush_after_load {
            clip.flush();
        }
        self.notify(AudioMessage::PlayerLoaded { player });
        Ok(())
    }

    fn binding_mut(&mut self, player: PlayerId) -> Result<(&mut Box<dyn NativePlayer>, &mut EndOfMedia)> {
        match self.players.get_mut(&player) {
            Some(Binding {
                player: Some(native),
                on_end,
            }) => Ok((native, on_end)),
            _ => Err(RenderError::not_found(ResourceKind::AudioPlayer, player)),
        }
    }

    fn native(&self, player: PlayerId) -> Result<&dyn NativePlayer> {
        self.players
            .get(&player)
            .and_then(|b| b.player.as_deref())
            .ok_or_else(|| RenderError::not_found(ResourceKind::AudioPlayer, player))
    }

    fn native_mut(&mut self, player: PlayerId) -> Result<&mut Box<dyn NativePlayer>> {
        self.binding_mut(player).map(|(native, _)| native)
    }

    pub fn set_position(&mut self, player: PlayerId, position: Duration) -> Result<()> {
        self.native_mut(player)?.seek(position);
        Ok(())
    }

    pub fn position(&self, player: PlayerId) -> Result<Duration> {
        Ok(self.native(player)?.position())
    }

    pub fn length(&self, player: PlayerId) -> Result<Duration> {
        Ok(self.native(player)?.length())
    }

    pub fn volume(&self, player: PlayerId) -> Result<f32> {
        Ok(self.native(player)?.volume())
    }

    pub fn set_volume(&mut self, player: PlayerId, volume: f32) -> Result<()> {
        self.native_mut(player)?.set_volume(volume);
        Ok(())
    }

    pub fn pause(&mut self, player: PlayerId) -> Result<()> {
        self.native_mut(player)?.pause();
        Ok(())
    }

    /// Start or continue playback.
    pub fn resume(&mut self, player: PlayerId) -> Result<()> {
        self.native_mut(player)?.play();
        Ok(())
    }

    pub fn is_playing(&self, player: PlayerId) -> Result<bool> {
        Ok(self.native(player)?.is_playing())
    }

    /// `true`: restart indefinitely. `false`: stop at the end. Either
    /// clears a running countdown.
    pub fn set_loop(&mut self, player: PlayerId, looped: bool) -> Result<()> {
        let (_, on_end) = self.binding_mut(player)?;
        *on_end = if looped {
            EndOfMedia::Restart
        } else {
            EndOfMedia::Stop
        };
        Ok(())
    }

    /// Restart `count` more times after the current playback, then stop.
    pub fn set_loop_count(&mut self, player: PlayerId, count: u32) -> Result<()> {
        let (_, on_end) = self.binding_mut(player)?;
        *on_end = EndOfMedia::Countdown(count);
        Ok(())
    }

    /// Remaining restarts for counted loops; `None` when the player is not
    /// in counted mode.
    pub fn remaining_loops(&self, player: PlayerId) -> Result<Option<u32>> {
        self.native(player)?;
        Ok(match self.players.get(&player).map(|b| b.on_end) {
            Some(EndOfMedia::Countdown(n)) => Some(n),
            _ => None,
        })
    }

    /// Apply the end-of-media policy of `player`.
    pub fn handle_end_of_media(&mut self, player: PlayerId) -> Result<()> {
        let (native, on_end) = self.binding_mut(player)?;
        let msg = match *on_end {
            EndOfMedia::Stop => {
                native.stop();
                AudioMessage::PlayerFinished { player }
            }
            EndOfMedia::Restart => {
                native.seek(Duration::ZERO);
                native.play();
                AudioMessage::PlayerRestarted {
                    player,
                    remaining: None,
                }
            }
            EndOfMedia::Countdown(n) if n > 0 => {
                *on_end = EndOfMedia::Countdown(n - 1);
                native.seek(Duration::ZERO);
                native.play();
                AudioMessage::PlayerRestarted {
                    player,
                    remaining: Some(n - 1),
                }
            }
            EndOfMedia::Countdown(_) => {
                *on_end = EndOfMedia::Stop;
                native.stop();
                AudioMessage::PlayerFinished { player }
            }
        };
        debug!("audio player {} end of media: {:?}", player, msg);
        self.notify(msg);
        Ok(())
    }

    /// Poll every bound player for a natural end of media and apply the
    /// loop policy. Returns how many ends were handled.
    pub fn pump(&mut self) -> usize {
        let mut ended: Vec<PlayerId> = self
            .players
            .iter_mut()
            .filter_map(|(id, binding)| {
                let native = binding.player.as_mut()?;
                native.take_end_of_media().then_some(*id)
            })
            .collect();
        ended.sort();
        for id in ended.iter() {
            if let Err(e) = self.handle_end_of_media(*id) {
                warn!("audio player {}: {}", id, e);
            }
        }
        ended.len()
    }

    /// Dispose the native player and forget the handle.
    pub fn unload_player(&mut self, player: PlayerId) -> Result<()> {
        let binding = self
            .players
            .remove(&player)
            .ok_or_else(|| RenderError::not_found(ResourceKind::AudioPlayer, player))?;
        if let Some(mut native) = binding.player {
            native.dispose();
        }
        info!("audio player {} unloaded", player);
        self.notify(AudioMessage::PlayerUnloaded { player });
        Ok(())
    }

    pub fn unload_all_players(&mut self) {
        for (_, binding) in self.players.drain() {
            if let Some(mut native) = binding.player {
                native.dispose();
            }
        }
        info!("all audio players unloaded");
        self.notify(AudioMessage::PlayersUnloadedAll);
    }

    /// Number of reserved handles.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl Drop for AudioBridge {
    fn drop(&mut self) {
        for (_, binding) in self.players.drain() {
            if let Some(mut native) = binding.player {
                native.dispose();
            }
        }
    }
}

/// End-of-media detection for backends that can only ask a stream whether it
/// is playing right now.
///
/// A voice counts as started once its play command has run on the device
/// thread. A stream that is not playing is reported as ended only if it was
/// started and not halted since, so a play request still in flight is never
/// mistaken for a finished stream.
#[derive(Debug, Default)]
pub struct StreamEnds {
    started: FxHashSet<u32>,
}

impl StreamEnds {
    /// The device started or resumed `voice`.
    pub fn started(&mut self, voice: u32) {
        self.started.insert(voice);
    }

    /// The device paused, stopped or closed `voice`.
    pub fn halted(&mut self, voice: u32) {
        self.started.remove(&voice);
    }

    pub fn is_started(&self, voice: u32) -> bool {
        self.started.contains(&voice)
    }

    /// `true` once when a started voice's stream is found not playing.
    pub fn poll(&mut self, voice: u32, stream_playing: bool) -> bool {
        if stream_playing {
            return false;
        }
        self.started.remove(&voice)
    }
}

/// Backend whose players keep state but produce no sound and never end.
pub struct SilentBackend;

impl AudioBackend for SilentBackend {
    fn open(&mut self, _clip: &AudioClip) -> Result<Box<dyn NativePlayer>> {
        Ok(Box::new(SilentPlayer {
            volume: 1.0,
            ..Default::default()
        }))
    }
}

#[derive(Default)]
struct SilentPlayer {
    playing: bool,
    position: Duration,
    volume: f32,
}

impl NativePlayer for SilentPlayer {
    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.position = Duration::ZERO;
    }

    fn seek(&mut self, position: Duration) {
        self.position = position;
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn length(&self) -> Duration {
        Duration::ZERO
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn take_end_of_media(&mut self) -> bool {
        false
    }

    fn dispose(&mut self) {
        self.playing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_handle_is_not_found() {
        let mut bridge = AudioBridge::silent();
        let id = bridge.load_audio_player();
        // Reserved but no clip bound yet.
        assert!(matches!(
            bridge.pause(id),
            Err(RenderError::ResourceNotFound {
                kind: ResourceKind::AudioPlayer,
                ..
            })
        ));
        assert!(bridge.set_loop(PlayerId(99), true).is_err());
        assert!(bridge.unload_player(PlayerId(99)).is_err());
    }

    #[test]
    fn test_clip_on_unknown_player_fails() {
        let mut bridge = AudioBridge::silent();
        let mut clip = AudioClip::from_path("a.ogg");
        assert!(bridge.load_audio_clip(&mut clip, PlayerId(5)).is_err());
    }

    #[test]
    fn test_flush_after_load_drops_clip_data() {
        let mut bridge = AudioBridge::silent();
        let id = bridge.load_audio_player();
        let mut clip = AudioClip {
            cached_path: "a.ogg".into(),
            data: Some(vec![1, 2, 3]),
            flush_after_load: true,
        };
        bridge.load_audio_clip(&mut clip, id).unwrap();
        assert!(clip.data.is_none());
    }

    #[test]
    fn test_loop_mode_switches_clear_countdown() {
        let mut bridge = AudioBridge::silent();
        let id = bridge.load_audio_player();
        bridge.load_audio_clip(&mut AudioClip::from_path("a.ogg"), id).unwrap();
        assert_eq!(bridge.remaining_loops(id).unwrap(), None);
        bridge.set_loop_count(id, 3).unwrap();
        assert_eq!(bridge.remaining_loops(id).unwrap(), Some(3));
        bridge.set_loop(id, true).unwrap();
        assert_eq!(bridge.remaining_loops(id).unwrap(), None);
    }

    #[test]
    fn test_volume_and_seek_reach_native_player() {
        let mut bridge = AudioBridge::silent();
        let id = bridge.load_audio_player();
        bridge.load_audio_clip(&mut AudioClip::from_path("a.ogg"), id).unwrap();
        bridge.set_volume(id, 0.25).unwrap();
        bridge.set_position(id, Duration::from_millis(1500)).unwrap();
        assert_eq!(bridge.volume(id).unwrap(), 0.25);
        assert_eq!(bridge.position(id).unwrap(), Duration::from_millis(1500));
        bridge.resume(id).unwrap();
        assert!(bridge.is_playing(id).unwrap());
        bridge.pause(id).unwrap();
        assert!(!bridge.is_playing(id).unwrap());
    }

    #[test]
    fn test_stream_not_yet_started_is_not_an_end() {
        let mut ends = StreamEnds::default();
        // Play requested but not yet run on the device thread.
        assert!(!ends.poll(0, false));

        ends.started(0);
        assert!(!ends.poll(0, true));
        assert!(ends.poll(0, false));
        assert!(!ends.poll(0, false));
        assert!(!ends.is_started(0));

        ends.started(1);
        ends.halted(1);
        assert!(!ends.poll(1, false));
    }

    #[test]
    fn test_unload_all_clears_and_notifies() {
        let mut bridge = AudioBridge::silent();
        let rx = bridge.messages();
        let a = bridge.load_audio_player();
        bridge.load_audio_player();
        bridge.load_audio_clip(&mut AudioClip::from_path("a.ogg"), a).unwrap();
        bridge.unload_all_players();
        assert!(bridge.is_empty());
        let msgs: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            msgs,
            vec![
                AudioMessage::PlayerLoaded { player: a },
                AudioMessage::PlayersUnloadedAll
            ]
        );
    }
}
