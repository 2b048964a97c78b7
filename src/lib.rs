//! Sensor-driven video playback for an interactive installation.
//!
//! A microcontroller reports an RFID reader and three photoresistors over a
//! serial line. This crate decodes those lines into sensor events, tracks the
//! combined sensor state, picks the video mapped to that state and plays it
//! full screen, looping, with switches that keep the current frame position.
//!
//! - [`sensor`]: line decoding, tag table, state tracking
//! - [`playback`]: state-to-video selection and the playback engine
//! - [`serial`]: the serial link and its scripted stand-in
//! - [`app`]: the installation context, keyboard commands and the fixed-step
//!   control loop
//! - [`gui`]: the egui window (feature `gui_egui`)
//! - [`config`]: layered settings
//!
//! Everything runs on one thread. The runners call
//! [`Installation::poll_serial`](app::Installation::poll_serial) and
//! [`Installation::tick`](app::Installation::tick) from their loop; nothing
//! in the crate spawns threads or blocks longer than the serial read timeout.

pub mod app;
pub mod config;
pub mod error;
#[cfg(feature = "gui_egui")]
pub mod gui;
pub mod playback;
pub mod sensor;
pub mod serial;
