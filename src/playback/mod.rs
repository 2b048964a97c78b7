//! Video selection and playback.
//!
//! - [`selector`]: sensor state to video identifier, with the no-match policy
//! - [`engine`]: the single active source, looping and blank frames
//! - [`backend`]: the trait seam decoders plug into
//! - [`ffmpeg`] / [`synthetic`]: the two decoders shipped with the crate

pub mod backend;
pub mod engine;
pub mod ffmpeg;
pub mod frame;
pub mod selector;
pub mod synthetic;

pub use backend::{SourceError, VideoBackend, VideoStream};
pub use engine::{PlaybackEngine, PlaybackStatus, CLOSED_CURSOR};
pub use ffmpeg::FfmpegBackend;
pub use frame::Frame;
pub use selector::{FallbackPolicy, PlaybackMapping, PlaybackSelector, Selection};
pub use synthetic::{ClipSpec, SyntheticBackend};
