//! Raylib audio backend running on a dedicated thread.
//!
//! Raylib music streams must stay on the thread that opened the audio
//! device, so [`RaylibAudioBackend`] owns a background thread that holds the
//! device and every `Music`. Players handed to the
//! [`AudioBridge`](crate::resources::audio::AudioBridge) are thin proxies:
//! control calls become [`AudioCmd`] messages over a crossbeam channel, and
//! queries read a [`VoiceState`] table the thread refreshes on every pass.
//!
//! The thread only reports the natural end of a stream; loop policies are
//! applied by the bridge when it is pumped. Ends are judged from what the
//! thread itself started ([`StreamEnds`]), never from the proxies' optimistic
//! view of the voice table.

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use raylib::core::audio::{Music, RaylibAudio};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{RenderError, Result};
use crate::events::audio::AudioCmd;
use crate::resources::audio::{AudioBackend, AudioClip, NativePlayer, StreamEnds};

const PUMP_INTERVAL: Duration = Duration::from_millis(10);
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Last known state of one voice, written by the audio thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct VoiceState {
    pub position: Duration,
    pub length: Duration,
    pub volume: f32,
    pub playing: bool,
    pub ended: bool,
}

type VoiceTable = Arc<Mutex<FxHashMap<u32, VoiceState>>>;

pub struct RaylibAudioBackend {
    tx_cmd: Sender<AudioCmd>,
    voices: VoiceTable,
    next_voice: u32,
    thread: Option<JoinHandle<()>>,
}

impl RaylibAudioBackend {
    /// Spawn the audio thread and wait until the device is open.
    pub fn start() -> Result<Self> {
        let (tx_cmd, rx_cmd) = unbounded();
        let (tx_ready, rx_ready) = bounded(1);
        let voices: VoiceTable = Arc::default();
        let thread_voices = voices.clone();
        let thread = std::thread::Builder::new()
            .name("audio".into())
            .spawn(move || audio_thread(rx_cmd, tx_ready, thread_voices))?;
        match rx_ready.recv() {
            Ok(Ok(())) => Ok(Self {
                tx_cmd,
                voices,
                next_voice: 0,
                thread: Some(thread),
            }),
            Ok(Err(message)) => {
                let _ = thread.join();
                Err(RenderError::Io(std::io::Error::other(message)))
            }
            Err(_) => Err(RenderError::Io(std::io::Error::other(
                "audio thread exited during startup",
            ))),
        }
    }
}

impl AudioBackend for RaylibAudioBackend {
    fn open(&mut self, clip: &AudioClip) -> Result<Box<dyn NativePlayer>> {
        let voice = self.next_voice;
        self.next_voice += 1;
        let (reply, rx_reply) = bounded(1);
        self.tx_cmd
            .send(AudioCmd::Open {
                voice,
                path: clip.cached_path.clone(),
                reply,
            })
            .map_err(|_| RenderError::Io(std::io::Error::other("audio thread is gone")))?;
        match rx_reply.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(Box::new(RemotePlayer {
                voice,
                tx_cmd: self.tx_cmd.clone(),
                voices: self.voices.clone(),
            })),
            Ok(Err(message)) => Err(RenderError::Io(std::io::Error::other(message))),
            Err(_) => Err(RenderError::Io(std::io::Error::other(format!(
                "audio thread did not open {:?}",
                clip.cached_path
            )))),
        }
    }
}

impl Drop for RaylibAudioBackend {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(AudioCmd::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Proxy for a `Music` living on the audio thread.
struct RemotePlayer {
    voice: u32,
    tx_cmd: Sender<AudioCmd>,
    voices: VoiceTable,
}

impl RemotePlayer {
    fn send(&self, cmd: AudioCmd) {
        if self.tx_cmd.send(cmd).is_err() {
            warn!("audio thread is gone; voice {} ignored a command", self.voice);
        }
    }

    fn state(&self) -> VoiceState {
        self.voices.lock().get(&self.voice).copied().unwrap_or_default()
    }

    fn edit(&self, f: impl FnOnce(&mut VoiceState)) {
        if let Some(state) = self.voices.lock().get_mut(&self.voice) {
            f(state);
        }
    }
}

impl NativePlayer for RemotePlayer {
    fn play(&mut self) {
        self.edit(|s| {
            s.playing = true;
            s.ended = false;
        });
        self.send(AudioCmd::Play { voice: self.voice });
    }

    fn pause(&mut self) {
        self.edit(|s| s.playing = false);
        self.send(AudioCmd::Pause { voice: self.voice });
    }

    fn stop(&mut self) {
        self.edit(|s| {
            s.playing = false;
            s.position = Duration::ZERO;
        });
        self.send(AudioCmd::Stop { voice: self.voice });
    }

    fn seek(&mut self, position: Duration) {
        self.edit(|s| s.position = position);
        self.send(AudioCmd::Seek {
            voice: self.voice,
            seconds: position.as_secs_f32(),
        });
    }

    fn position(&self) -> Duration {
        self.state().position
    }

    fn length(&self) -> Duration {
        self.state().length
    }

    fn volume(&self) -> f32 {
        self.state().volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.edit(|s| s.volume = volume);
        self.send(AudioCmd::Volume {
            voice: self.voice,
            volume,
        });
    }

    fn is_playing(&self) -> bool {
        self.state().playing
    }

    fn take_end_of_media(&mut self) -> bool {
        let mut ended = false;
        self.edit(|s| ended = std::mem::take(&mut s.ended));
        ended
    }

    fn dispose(&mut self) {
        self.send(AudioCmd::Close { voice: self.voice });
    }
}

fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or_default()
}

/// Entry point of the audio thread. Returns after [`AudioCmd::Shutdown`] or
/// when every command sender is gone.
fn audio_thread(rx_cmd: Receiver<AudioCmd>, tx_ready: Sender<std::result::Result<(), String>>, voices: VoiceTable) {
    let audio = match RaylibAudio::init_audio_device() {
        Ok(device) => device,
        Err(e) => {
            error!("failed to initialize audio device: {}", e);
            let _ = tx_ready.send(Err(e.to_string()));
            return;
        }
    };
    let _ = tx_ready.send(Ok(()));
    info!("audio thread started ({:?})", std::thread::current().id());

    let mut musics: FxHashMap<u32, Music> = FxHashMap::default();
    let mut paused: FxHashSet<u32> = FxHashSet::default();
    let mut ends = StreamEnds::default();

    'run: loop {
        // 1) Drain commands
        loop {
            let cmd = match rx_cmd.try_recv() {
                Ok(cmd) => cmd,
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => break 'run,
            };
            match cmd {
                AudioCmd::Open { voice, path, reply } => {
                    match audio.new_music(&path.to_string_lossy()) {
                        Ok(mut music) => {
                            // Ends are reported to the bridge, which owns looping.
                            music.looping = false;
                            debug!("voice {} opened {:?}", voice, path);
                            voices.lock().insert(
                                voice,
                                VoiceState {
                                    length: secs(music.get_time_length()),
                                    volume: 1.0,
                                    ..VoiceState::default()
                                },
                            );
                            musics.insert(voice, music);
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            warn!("voice {} failed to open {:?}: {}", voice, path, e);
                            let _ = reply.send(Err(e.to_string()));
                        }
                    }
                }
                AudioCmd::Play { voice } => {
                    if let Some(music) = musics.get(&voice) {
                        if paused.remove(&voice) {
                            music.resume_stream();
                        } else {
                            music.play_stream();
                        }
                        ends.started(voice);
                    }
                }
                AudioCmd::Pause { voice } => {
                    if let Some(music) = musics.get(&voice) {
                        music.pause_stream();
                        paused.insert(voice);
                        ends.halted(voice);
                    }
                }
                AudioCmd::Stop { voice } => {
                    if let Some(music) = musics.get(&voice) {
                        music.stop_stream();
                        paused.remove(&voice);
                        ends.halted(voice);
                    }
                }
                AudioCmd::Seek { voice, seconds } => {
                    if let Some(music) = musics.get(&voice) {
                        music.seek_stream(seconds);
                    }
                }
                AudioCmd::Volume { voice, volume } => {
                    if let Some(music) = musics.get(&voice) {
                        music.set_volume(volume);
                    }
                }
                AudioCmd::Close { voice } => {
                    paused.remove(&voice);
                    ends.halted(voice);
                    if musics.remove(&voice).is_some() {
                        debug!("voice {} closed", voice);
                    }
                    voices.lock().remove(&voice);
                }
                AudioCmd::Shutdown => {
                    info!("audio thread shutdown requested");
                    break 'run;
                }
            }
        }

        // 2) Pump streams and detect natural ends.
        {
            let mut table = voices.lock();
            for (voice, music) in musics.iter() {
                let Some(state) = table.get_mut(voice) else {
                    continue;
                };
                let stream_playing = music.is_stream_playing();
                if stream_playing {
                    music.update_stream();
                    state.position = secs(music.get_time_played());
                }
                if ends.poll(*voice, stream_playing) {
                    debug!("voice {} reached end of media", voice);
                    state.playing = false;
                    state.ended = true;
                    state.position = secs(music.get_time_length());
                }
            }
        }
        std::thread::sleep(PUMP_INTERVAL);
    }

    musics.clear();
    voices.lock().clear();
    info!("audio thread exiting ({:?})", std::thread::current().id());
}
