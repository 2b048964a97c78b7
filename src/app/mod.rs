//! The installation: one owned context tying sensors to playback.
//!
//! [`Installation`] owns the decoder, the state tracker, the selector, the
//! playback engine and the serial line source. A runner (the egui window or
//! the headless loop) drives it on one thread:
//!
//! 1. forward key presses with [`handle_command`](Installation::handle_command)
//! 2. [`poll_serial`](Installation::poll_serial) once per iteration
//! 3. [`tick`](Installation::tick) once per due fixed-timestep tick and draw
//!    the returned frame
//!
//! Selection runs only when the tracker reports an actual state change, so a
//! repeated detection of the same tag never restarts the video. Sensor-driven
//! switches keep the frame position; an explicit stop does not.

pub mod headless;
pub mod keys;
pub mod timing;

pub use headless::run_headless;
pub use keys::{command_for_key, Command, Key};
pub use timing::FixedTimestep;

use tracing::{info, warn};

use crate::config::{ConfigError, Settings};
use crate::playback::{
    Frame, PlaybackEngine, PlaybackSelector, Selection, VideoBackend,
};
use crate::sensor::{LineDecoder, SensorEvent, SensorState, StateTracker, TagTable};
use crate::serial::{LineSource, PortError};

/// Application context owning every piece of runtime state.
pub struct Installation<B: VideoBackend, P: LineSource> {
    decoder: LineDecoder,
    tracker: StateTracker,
    selector: PlaybackSelector,
    engine: PlaybackEngine<B>,
    port: P,
    running: bool,
    fullscreen: bool,
}

impl<B: VideoBackend, P: LineSource> Installation<B, P> {
    /// Assemble an installation from its parts.
    pub fn new(tags: TagTable, selector: PlaybackSelector, engine: PlaybackEngine<B>, port: P) -> Self {
        Self {
            decoder: LineDecoder::new(tags.clone()),
            tracker: StateTracker::new(tags),
            selector,
            engine,
            port,
            running: false,
            fullscreen: false,
        }
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &Settings, backend: B, port: P) -> Result<Self, ConfigError> {
        let tags = settings.tag_table()?;
        let mapping = settings.playback_mapping(&tags)?;
        info!(
            "Loaded {} tags and {} mapped sensor states (policy: {:?})",
            tags.len(),
            mapping.len(),
            settings.mapping.policy
        );
        let selector = PlaybackSelector::new(mapping, settings.mapping.policy);
        let engine = PlaybackEngine::new(
            backend,
            (settings.video.blank_width, settings.video.blank_height),
        );
        let mut installation = Self::new(tags, selector, engine, port);
        installation.fullscreen = settings.window.fullscreen;
        Ok(installation)
    }

    /// Select the video for the initial state and mark the loop running.
    pub fn start(&mut self) {
        info!("Starting with sensor state {}", self.tracker.state());
        self.running = true;
        self.on_state_changed(self.tracker.state());
    }

    /// Whether the control loop should keep going.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ask the runner to leave its loop.
    pub fn quit(&mut self) {
        info!("Quit requested");
        self.running = false;
    }

    /// Whether the window should be fullscreen.
    pub fn fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Current combined sensor state.
    pub fn state(&self) -> SensorState {
        self.tracker.state()
    }

    /// The playback engine.
    pub fn engine(&self) -> &PlaybackEngine<B> {
        &self.engine
    }

    /// The serial line source.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutable access to the line source.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Connect if needed and consume at most one line. Never blocks longer
    /// than the port's read timeout. A lost connection leaves playback as it
    /// is; the next poll tries to reconnect.
    pub fn poll_serial(&mut self) {
        if !self.port.is_connected() && !self.port.try_connect() {
            return;
        }
        match self.port.read_line() {
            Ok(Some(line)) => {
                self.handle_line(&line);
            }
            Ok(None) | Err(PortError::NotConnected) => {}
            Err(err) => warn!("{}; waiting for the controller to come back", err),
        }
    }

    /// Decode and apply one serial line. Returns whether the state changed.
    pub fn handle_line(&mut self, line: &str) -> bool {
        let event = self.decoder.decode(line);
        self.handle_event(event)
    }

    /// Apply one sensor event, running selection if the state changed.
    pub fn handle_event(&mut self, event: SensorEvent) -> bool {
        let transition = self.tracker.apply(&event);
        if transition.changed {
            self.on_state_changed(transition.state);
        }
        transition.changed
    }

    /// Execute an operator command.
    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::Quit => self.quit(),
            Command::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                info!("Fullscreen: {}", self.fullscreen);
            }
            Command::Stop => {
                info!("Stopping video");
                self.engine.close();
            }
            Command::SimulateTagLost => {
                let current = self.tracker.state().rfid();
                self.handle_event(SensorEvent::RfidLost(Some(current)));
            }
            Command::SimulateTag(index) => match self.decoder.tags().id(index) {
                Some(id) if !id.is_none() => {
                    self.handle_event(SensorEvent::RfidDetected(id));
                }
                _ => warn!("No tag {} in the tag table, ignoring key", index),
            },
            Command::TogglePhoto(photo) => {
                let event = if self.tracker.state().photo(photo) {
                    SensorEvent::PhotoUncovered(photo)
                } else {
                    SensorEvent::PhotoCovered(photo)
                };
                self.handle_event(event);
            }
        }
    }

    /// Advance playback by one fixed-timestep tick.
    pub fn tick(&mut self) -> &Frame {
        self.engine.advance_frame()
    }

    /// Frame currently on screen.
    pub fn presented(&self) -> &Frame {
        self.engine.presented()
    }

    fn on_state_changed(&mut self, state: SensorState) {
        match self.selector.decide(&state) {
            Selection::Play(video_id) => {
                info!("Play video '{}' for sensor state {}", video_id, state);
                if let Err(err) = self.engine.open(video_id, true, true) {
                    warn!("Playback for sensor state {} failed: {}", state, err);
                }
            }
            Selection::Stop => {
                warn!("Undefined sensor state {}, stopping video", state);
                self.engine.close();
            }
            Selection::Keep => {
                info!("Undefined sensor state {}, keeping current video", state);
            }
        }
    }
}

impl<B: VideoBackend, P: LineSource> Drop for Installation<B, P> {
    fn drop(&mut self) {
        self.engine.close();
        info!("Installation shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{
        ClipSpec, FallbackPolicy, PlaybackMapping, PlaybackStatus, SyntheticBackend,
    };
    use crate::sensor::PhotoId;
    use crate::serial::ScriptedPort;

    fn installation(policy: FallbackPolicy) -> Installation<SyntheticBackend, ScriptedPort> {
        let tags = TagTable::new(vec!["0".into(), "A".into(), "B".into()]).unwrap();
        let mut mapping = PlaybackMapping::new();
        mapping.insert(SensorState::default(), "idle.mp4");
        mapping.insert(SensorState::default().with_rfid(tags.id(1).unwrap()), "a.mp4");
        mapping.insert(SensorState::default().with_rfid(tags.id(2).unwrap()), "b.mp4");
        let backend = SyntheticBackend::new()
            .with_clip("idle.mp4", ClipSpec::new(20, 4, 4))
            .with_clip("a.mp4", ClipSpec::new(20, 4, 4))
            .with_clip("b.mp4", ClipSpec::new(20, 4, 4));
        Installation::new(
            tags,
            PlaybackSelector::new(mapping, policy),
            PlaybackEngine::new(backend, (4, 4)),
            ScriptedPort::new(),
        )
    }

    #[test]
    fn test_start_plays_initial_state() {
        let mut app = installation(FallbackPolicy::Strict);
        app.start();
        assert!(app.is_running());
        assert_eq!(app.engine().video_id(), Some("idle.mp4"));
    }

    #[test]
    fn test_repeated_detection_does_not_restart() {
        let mut app = installation(FallbackPolicy::Strict);
        app.start();
        app.handle_command(Command::SimulateTag(1));
        for _ in 0..5 {
            app.tick();
        }
        assert!(!app.handle_command_changed(Command::SimulateTag(1)));
        assert_eq!(app.engine().cursor(), 5);
    }

    #[test]
    fn test_switch_keeps_frame_position() {
        let mut app = installation(FallbackPolicy::Strict);
        app.start();
        app.handle_command(Command::SimulateTag(1));
        for _ in 0..7 {
            app.tick();
        }
        app.handle_command(Command::SimulateTag(2));
        assert_eq!(app.engine().video_id(), Some("b.mp4"));
        assert_eq!(app.engine().cursor(), 7);
    }

    #[test]
    fn test_policies_on_unmapped_state() {
        let mut strict = installation(FallbackPolicy::Strict);
        strict.start();
        strict.handle_command(Command::TogglePhoto(PhotoId::One));
        assert_eq!(strict.engine().status(), PlaybackStatus::Closed);
        assert!(strict.presented().is_blank());

        let mut keep = installation(FallbackPolicy::KeepPrevious);
        keep.start();
        keep.handle_command(Command::TogglePhoto(PhotoId::One));
        assert_eq!(keep.engine().video_id(), Some("idle.mp4"));
    }

    #[test]
    fn test_stop_and_quit_commands() {
        let mut app = installation(FallbackPolicy::Strict);
        app.start();
        app.handle_command(Command::Stop);
        assert_eq!(app.engine().cursor(), crate::playback::CLOSED_CURSOR);
        app.handle_command(Command::ToggleFullscreen);
        assert!(app.fullscreen());
        app.handle_command(Command::Quit);
        assert!(!app.is_running());
    }

    #[test]
    fn test_unknown_tag_key_is_ignored() {
        let mut app = installation(FallbackPolicy::Strict);
        app.start();
        app.handle_command(Command::SimulateTag(4));
        assert!(app.state().rfid().is_none());
    }

    impl<B: VideoBackend, P: LineSource> Installation<B, P> {
        fn handle_command_changed(&mut self, command: Command) -> bool {
            let before = self.state();
            self.handle_command(command);
            before != self.state()
        }
    }
}
