//! Audio bridge integration tests with a scripted backend: loop policies,
//! notifications and handle lifetimes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use aberredfx::error::{RenderError, Result};
use aberredfx::events::audio::AudioMessage;
use aberredfx::resources::audio::{
    AudioBackend, AudioBridge, AudioClip, MESSAGE_CAPACITY, NativePlayer, PlayerId,
};

/// State of one scripted voice, shared with the test body.
#[derive(Debug, Default)]
struct Voice {
    plays: u32,
    stops: u32,
    playing: bool,
    ended: bool,
    position: Duration,
    volume: f32,
    disposed: bool,
}

type Voices = Arc<Mutex<Vec<Arc<Mutex<Voice>>>>>;

struct ScriptedBackend {
    voices: Voices,
}

impl AudioBackend for ScriptedBackend {
    fn open(&mut self, clip: &AudioClip) -> Result<Box<dyn NativePlayer>> {
        if clip.cached_path.to_string_lossy().contains("broken") {
            return Err(RenderError::Io(std::io::Error::other("cannot decode")));
        }
        let voice = Arc::new(Mutex::new(Voice {
            volume: 1.0,
            ..Voice::default()
        }));
        self.voices.lock().push(voice.clone());
        Ok(Box::new(ScriptedPlayer { voice }))
    }
}

struct ScriptedPlayer {
    voice: Arc<Mutex<Voice>>,
}

impl NativePlayer for ScriptedPlayer {
    fn play(&mut self) {
        let mut v = self.voice.lock();
        v.plays += 1;
        v.playing = true;
    }

    fn pause(&mut self) {
        self.voice.lock().playing = false;
    }

    fn stop(&mut self) {
        let mut v = self.voice.lock();
        v.stops += 1;
        v.playing = false;
        v.position = Duration::ZERO;
    }

    fn seek(&mut self, position: Duration) {
        self.voice.lock().position = position;
    }

    fn position(&self) -> Duration {
        self.voice.lock().position
    }

    fn length(&self) -> Duration {
        Duration::from_secs(3)
    }

    fn volume(&self) -> f32 {
        self.voice.lock().volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.voice.lock().volume = volume;
    }

    fn is_playing(&self) -> bool {
        self.voice.lock().playing
    }

    fn take_end_of_media(&mut self) -> bool {
        std::mem::take(&mut self.voice.lock().ended)
    }

    fn dispose(&mut self) {
        self.voice.lock().disposed = true;
    }
}

fn bridge() -> (AudioBridge, Voices) {
    let _ = env_logger::builder().is_test(true).try_init();
    let voices = Voices::default();
    let bridge = AudioBridge::new(Box::new(ScriptedBackend {
        voices: voices.clone(),
    }));
    (bridge, voices)
}

fn bound(bridge: &mut AudioBridge) -> PlayerId {
    let player = bridge.load_audio_player();
    bridge
        .load_audio_clip(&mut AudioClip::from_path("music/theme.ogg"), player)
        .unwrap();
    player
}

/// Let the voice run to its natural end, then pump the bridge.
fn finish(bridge: &mut AudioBridge, voice: &Arc<Mutex<Voice>>) -> usize {
    {
        let mut v = voice.lock();
        v.playing = false;
        v.ended = true;
        v.position = Duration::from_secs(3);
    }
    bridge.pump()
}

fn drain(bridge: &AudioBridge) -> Vec<AudioMessage> {
    bridge.messages().try_iter().collect()
}

#[test]
fn test_counted_loop_plays_count_plus_one_times() {
    let (mut bridge, voices) = bridge();
    let player = bound(&mut bridge);
    let voice = voices.lock()[0].clone();
    drain(&bridge);

    bridge.set_loop_count(player, 2).unwrap();
    bridge.resume(player).unwrap();
    assert_eq!(bridge.remaining_loops(player).unwrap(), Some(2));

    assert_eq!(finish(&mut bridge, &voice), 1);
    assert_eq!(bridge.remaining_loops(player).unwrap(), Some(1));
    assert_eq!(bridge.position(player).unwrap(), Duration::ZERO);
    finish(&mut bridge, &voice);
    assert!(bridge.is_playing(player).unwrap());
    finish(&mut bridge, &voice);

    assert!(!bridge.is_playing(player).unwrap());
    assert_eq!(voice.lock().plays, 3);
    assert_eq!(voice.lock().stops, 1);
    assert_eq!(
        drain(&bridge),
        vec![
            AudioMessage::PlayerRestarted {
                player,
                remaining: Some(1)
            },
            AudioMessage::PlayerRestarted {
                player,
                remaining: Some(0)
            },
            AudioMessage::PlayerFinished { player },
        ]
    );
    // Back to stop-at-end mode.
    assert_eq!(bridge.remaining_loops(player).unwrap(), None);
}

#[test]
fn test_infinite_loop_restarts_until_paused() {
    let (mut bridge, voices) = bridge();
    let player = bound(&mut bridge);
    let voice = voices.lock()[0].clone();

    bridge.set_loop(player, true).unwrap();
    bridge.resume(player).unwrap();
    for _ in 0..10 {
        finish(&mut bridge, &voice);
        assert!(bridge.is_playing(player).unwrap());
    }
    assert_eq!(voice.lock().plays, 11);

    bridge.pause(player).unwrap();
    assert!(!bridge.is_playing(player).unwrap());
    assert_eq!(bridge.pump(), 0);
    assert_eq!(voice.lock().plays, 11);
}

#[test]
fn test_default_policy_stops_at_end() {
    let (mut bridge, voices) = bridge();
    let player = bound(&mut bridge);
    let voice = voices.lock()[0].clone();
    drain(&bridge);

    bridge.resume(player).unwrap();
    finish(&mut bridge, &voice);
    assert!(!bridge.is_playing(player).unwrap());
    assert_eq!(voice.lock().plays, 1);
    assert_eq!(drain(&bridge), vec![AudioMessage::PlayerFinished { player }]);
}

#[test]
fn test_rebinding_disposes_previous_player_and_resets_policy() {
    let (mut bridge, voices) = bridge();
    let player = bound(&mut bridge);
    bridge.set_loop(player, true).unwrap();

    bridge
        .load_audio_clip(&mut AudioClip::from_path("music/other.ogg"), player)
        .unwrap();
    assert!(voices.lock()[0].lock().disposed);

    let voice = voices.lock()[1].clone();
    bridge.resume(player).unwrap();
    finish(&mut bridge, &voice);
    assert!(!bridge.is_playing(player).unwrap());
}

#[test]
fn test_volume_and_position_pass_through() {
    let (mut bridge, _voices) = bridge();
    let player = bound(&mut bridge);
    bridge.set_volume(player, 0.25).unwrap();
    bridge.set_position(player, Duration::from_millis(1500)).unwrap();
    assert_eq!(bridge.volume(player).unwrap(), 0.25);
    assert_eq!(bridge.position(player).unwrap(), Duration::from_millis(1500));
    assert_eq!(bridge.length(player).unwrap(), Duration::from_secs(3));
}

#[test]
fn test_unbound_and_unloaded_handles_are_not_found() {
    let (mut bridge, voices) = bridge();
    let reserved = bridge.load_audio_player();
    assert!(matches!(bridge.resume(reserved), Err(RenderError::ResourceNotFound { .. })));

    let broken = bridge.load_audio_clip(&mut AudioClip::from_path("broken.ogg"), reserved);
    assert!(broken.is_err());
    assert!(bridge.is_playing(reserved).is_err());

    let player = bound(&mut bridge);
    bridge.unload_player(player).unwrap();
    assert!(voices.lock()[0].lock().disposed);
    assert!(matches!(bridge.is_playing(player), Err(RenderError::ResourceNotFound { .. })));
    assert!(bridge.unload_player(player).is_err());
}

#[test]
fn test_unload_all_disposes_every_player() {
    let (mut bridge, voices) = bridge();
    let a = bound(&mut bridge);
    let b = bound(&mut bridge);
    assert_ne!(a, b);
    drain(&bridge);

    bridge.unload_all_players();
    assert!(bridge.is_empty());
    assert!(voices.lock().iter().all(|v| v.lock().disposed));
    assert_eq!(drain(&bridge), vec![AudioMessage::PlayersUnloadedAll]);
}

#[test]
fn test_flush_after_load_drops_clip_data() {
    let (mut bridge, _voices) = bridge();
    let player = bridge.load_audio_player();
    let mut clip = AudioClip {
        data: Some(vec![1, 2, 3]),
        flush_after_load: true,
        ..AudioClip::from_path("music/theme.ogg")
    };
    bridge.load_audio_clip(&mut clip, player).unwrap();
    assert!(clip.data.is_none());
}

#[test]
fn test_undrained_messages_stay_bounded() {
    let (mut bridge, voices) = bridge();
    let player = bound(&mut bridge);
    let voice = voices.lock()[0].clone();

    bridge.set_loop(player, true).unwrap();
    bridge.resume(player).unwrap();
    for _ in 0..10_000 {
        finish(&mut bridge, &voice);
    }
    assert_eq!(bridge.messages().len(), MESSAGE_CAPACITY);

    // The newest notifications are the ones kept.
    bridge.set_loop(player, false).unwrap();
    finish(&mut bridge, &voice);
    let queued = drain(&bridge);
    assert_eq!(queued.len(), MESSAGE_CAPACITY);
    assert_eq!(queued.last(), Some(&AudioMessage::PlayerFinished { player }));
    assert!(matches!(queued[0], AudioMessage::PlayerRestarted { .. }));
}
