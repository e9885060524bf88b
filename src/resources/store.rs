//! Aggregate resource store.
//!
//! Groups the texture, font and audio stores into one object that is handed
//! explicitly to the frame synchronizer and the draw dispatcher. Two
//! presenters built from two stores never see each other's resources.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::resources::audio::AudioBridge;
use crate::resources::fontstore::FontStore;
use crate::resources::texturestore::TextureStore;

pub struct ResourceStore {
    pub textures: TextureStore,
    pub fonts: FontStore,
    pub audio: AudioBridge,
}

/// Resource store shared between the simulation and render units.
pub type SharedResources = Arc<Mutex<ResourceStore>>;

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new(AudioBridge::silent())
    }
}

impl ResourceStore {
    pub fn new(audio: AudioBridge) -> Self {
        Self {
            textures: TextureStore::new(),
            fonts: FontStore::new(),
            audio,
        }
    }

    pub fn into_shared(self) -> SharedResources {
        Arc::new(Mutex::new(self))
    }

    /// Drop every texture, font and audio binding.
    pub fn clear(&mut self) {
        self.textures.unload_all_textures();
        self.fonts.clear();
        self.audio.unload_all_players();
    }
}
