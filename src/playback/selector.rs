//! Mapping from sensor states to videos, and the no-match policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::sensor::{PhotoId, SensorState, TagTable};

/// What to do when a state has no exact mapping entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// No match means no video: the engine closes and shows blank.
    #[default]
    Strict,
    /// No match keeps whatever is currently playing.
    KeepPrevious,
}

/// Static table from sensor state to video identifier. Need not be total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackMapping {
    videos: HashMap<SensorState, String>,
}

impl PlaybackMapping {
    /// Empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Conventional mapping over every known tag and photo combination:
    /// `video_{rfid}{p1}{p2}{p3}.mp4`.
    pub fn generate(tags: &TagTable) -> Self {
        let mut mapping = Self::new();
        for tag in tags.ids() {
            for bits in 0u8..8 {
                let state = PhotoId::ALL
                    .iter()
                    .enumerate()
                    .fold(SensorState::default().with_rfid(tag), |state, (i, photo)| {
                        state.with_photo(*photo, bits & (1 << i) != 0)
                    });
                mapping.insert(state, conventional_name(&state));
            }
        }
        mapping
    }

    /// Add or replace the video for a state.
    pub fn insert(&mut self, state: SensorState, video_id: impl Into<String>) {
        self.videos.insert(state, video_id.into());
    }

    /// Exact lookup.
    pub fn get(&self, state: &SensorState) -> Option<&str> {
        self.videos.get(state).map(String::as_str)
    }

    /// Number of mapped states.
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    /// Whether no state is mapped.
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

/// Generated filename for a state, e.g. `video_2010.mp4`.
pub fn conventional_name(state: &SensorState) -> String {
    format!("video_{}.mp4", state.code())
}

/// Outcome of running the selection policy for a new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    /// Play this video.
    Play(&'a str),
    /// Stop playback and show blank.
    Stop,
    /// Leave the current video running.
    Keep,
}

/// Pure state-to-video selector.
#[derive(Debug, Clone)]
pub struct PlaybackSelector {
    mapping: PlaybackMapping,
    policy: FallbackPolicy,
}

impl PlaybackSelector {
    /// Selector over `mapping` applying `policy` to unmapped states.
    pub fn new(mapping: PlaybackMapping, policy: FallbackPolicy) -> Self {
        Self { mapping, policy }
    }

    /// Policy for unmapped states.
    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// The state-to-video table.
    pub fn mapping(&self) -> &PlaybackMapping {
        &self.mapping
    }

    /// Exact-match lookup of the full state.
    pub fn select(&self, state: &SensorState) -> Option<&str> {
        self.mapping.get(state)
    }

    /// Apply the fallback policy on top of [`select`](Self::select).
    pub fn decide(&self, state: &SensorState) -> Selection<'_> {
        match (self.select(state), self.policy) {
            (Some(video), _) => Selection::Play(video),
            (None, FallbackPolicy::Strict) => Selection::Stop,
            (None, FallbackPolicy::KeepPrevious) => Selection::Keep,
        }
    }
}
