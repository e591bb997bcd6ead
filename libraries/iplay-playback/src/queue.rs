//! Session play queue
//!
//! An ordered list of tracks plus a cursor. The cursor is `None` exactly
//! when the queue is empty and otherwise always points inside the list.
//! Navigation wraps in both directions.

use crate::types::Track;

#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    index: Option<usize>,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole queue
    ///
    /// `start_index` is clamped into range. Returns the new current track.
    pub fn replace(&mut self, tracks: Vec<Track>, start_index: usize) -> Option<&Track> {
        self.index = if tracks.is_empty() {
            None
        } else {
            Some(start_index.min(tracks.len() - 1))
        };
        self.tracks = tracks;
        self.current()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.index = None;
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn current_index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&Track> {
        self.index.and_then(|i| self.tracks.get(i))
    }

    /// Move to the next track, wrapping to the start
    pub fn advance(&mut self) -> Option<&Track> {
        let len = self.tracks.len();
        self.index = self.index.map(|i| (i + 1) % len);
        self.current()
    }

    /// Move to the previous track, wrapping to the end
    pub fn retreat(&mut self) -> Option<&Track> {
        let len = self.tracks.len();
        self.index = self.index.map(|i| (i + len - 1) % len);
        self.current()
    }

    /// Point the cursor at `index` if it is in range
    pub fn set_index(&mut self, index: usize) -> bool {
        if index < self.tracks.len() {
            self.index = Some(index);
            true
        } else {
            false
        }
    }

    /// Position of the first track with this id
    pub fn position_of(&self, track_id: &str) -> Option<usize> {
        if track_id.is_empty() {
            return None;
        }
        self.tracks.iter().position(|t| t.id == track_id)
    }
}
