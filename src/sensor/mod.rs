//! Sensor side of the installation: line decoding and state tracking.
//!
//! Raw serial lines flow through [`LineDecoder`] into [`SensorEvent`]s, which
//! [`StateTracker`] folds into the current [`SensorState`].

pub mod decoder;
pub mod state;
pub mod tracker;

pub use decoder::{DecodeError, LineDecoder, SensorEvent};
pub use state::{PhotoId, SensorState, TagId, TagTable};
pub use tracker::{reduce, StateTracker, Transition};
