//! Local preview clip backend

use super::AudioElement;
use crate::error::{PlaybackError, Result};
use crate::events::EventSink;
use tracing::debug;

/// Plays preview clips through an [`AudioElement`]
pub struct LocalClipBackend {
    element: Box<dyn AudioElement>,
    sink: EventSink,
    loaded: Option<String>,
}

impl LocalClipBackend {
    pub fn new(mut element: Box<dyn AudioElement>, sink: EventSink) -> Self {
        element.attach(sink.clone());
        Self {
            element,
            sink,
            loaded: None,
        }
    }

    pub fn loaded_url(&self) -> Option<&str> {
        self.loaded.as_deref()
    }

    /// Load a clip, rewound to the start
    pub fn load(&mut self, url: &str) {
        debug!(url = %url, "Loading preview clip");
        self.element.load(url);
        self.element.seek(0.0);
        self.loaded = Some(url.to_string());
    }

    pub async fn play(&mut self) -> Result<()> {
        if self.loaded.is_none() {
            return Err(PlaybackError::NoPlayableSource);
        }
        self.element.play().await
    }

    pub fn pause(&mut self) {
        self.element.pause();
    }

    pub fn seek(&mut self, position_secs: f64) {
        self.element.seek(position_secs);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.element.set_volume(volume);
    }

    pub(crate) fn activate(&mut self, generation: u64) {
        self.sink.arm(generation);
    }

    /// Stop and unload; later element events are stale
    pub(crate) fn deactivate(&mut self) {
        self.sink.disarm();
        if self.loaded.take().is_some() {
            self.element.pause();
            self.element.unload();
        }
    }
}
