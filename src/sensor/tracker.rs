//! Sensor state tracker.
//!
//! [`reduce`] is the pure transition function; [`StateTracker`] holds the
//! single authoritative state and logs what each event did to it.

use tracing::{debug, info, warn};

use super::decoder::SensorEvent;
use super::state::{SensorState, TagId, TagTable};

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State after the event.
    pub state: SensorState,
    /// Whether the externally visible state differs from before.
    pub changed: bool,
}

/// Apply `event` to `state`. Same inputs always give the same output.
pub fn reduce(state: SensorState, event: &SensorEvent) -> Transition {
    let next = match event {
        // The no-tag id is never a detection.
        SensorEvent::RfidDetected(id) if id.is_none() => state,
        SensorEvent::RfidDetected(id) => state.with_rfid(*id),
        SensorEvent::RfidLost(_) => state.with_rfid(TagId::NONE),
        SensorEvent::PhotoCovered(photo) => state.with_photo(*photo, true),
        SensorEvent::PhotoUncovered(photo) => state.with_photo(*photo, false),
        SensorEvent::Malformed(_) | SensorEvent::Empty => state,
    };
    Transition {
        state: next,
        changed: next != state,
    }
}

/// Owner of the current sensor state.
#[derive(Debug, Clone)]
pub struct StateTracker {
    state: SensorState,
    tags: TagTable,
}

impl StateTracker {
    /// Start with no tag and every photoresistor uncovered.
    pub fn new(tags: TagTable) -> Self {
        Self {
            state: SensorState::default(),
            tags,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Apply an event and report whether the state changed.
    pub fn apply(&mut self, event: &SensorEvent) -> Transition {
        match event {
            SensorEvent::RfidDetected(id) => {
                info!("RFID {} detected (UID {})", id, self.tags.uid(*id));
            }
            SensorEvent::RfidLost(reported) => self.check_lost_tag(*reported),
            SensorEvent::PhotoCovered(photo) => info!("Photoresistor #{} covered", photo),
            SensorEvent::PhotoUncovered(photo) => info!("Photoresistor #{} uncovered", photo),
            SensorEvent::Malformed(err) => warn!("Ignoring serial line: {}", err),
            SensorEvent::Empty => {}
        }

        let transition = reduce(self.state, event);
        if transition.changed {
            debug!("Sensor state {} -> {}", self.state, transition.state);
        }
        self.state = transition.state;
        transition
    }

    fn check_lost_tag(&self, reported: Option<TagId>) {
        let current = self.state.rfid();
        match reported {
            Some(id) if id == current => info!("RFID {} lost (UID {})", id, self.tags.uid(id)),
            Some(id) => warn!(
                "RFID mismatch: lost {} (UID {}) whereas last detected was {} (UID {}), clearing anyway",
                id,
                self.tags.uid(id),
                current,
                self.tags.uid(current)
            ),
            None => warn!(
                "RFID mismatch: lost an unknown UID whereas last detected was {}, clearing anyway",
                current
            ),
        }
    }
}
