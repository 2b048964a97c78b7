//! Control loop without a window.
//!
//! Same order as the windowed runner: poll the serial link, run the due
//! playback ticks, sleep until the next tick. Frames are produced but not
//! shown, which keeps the sensor side and the engine exercisable on machines
//! without a display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use super::{FixedTimestep, Installation};
use crate::playback::VideoBackend;
use crate::serial::LineSource;

/// Run until `stop` is set or the installation is asked to quit.
pub fn run_headless<B: VideoBackend, P: LineSource>(
    installation: &mut Installation<B, P>,
    fps: u32,
    stop: &AtomicBool,
) {
    let mut clock = FixedTimestep::new(fps, Instant::now());
    installation.start();
    info!("Headless control loop running at {} fps", fps);

    while installation.is_running() && !stop.load(Ordering::SeqCst) {
        installation.poll_serial();

        let ticks = clock.due_ticks(Instant::now());
        for _ in 0..ticks {
            installation.tick();
        }
        if ticks > 0 {
            debug!(
                "Frame {} of '{}'",
                installation.engine().cursor(),
                installation.engine().video_id().unwrap_or("-")
            );
        }

        thread::sleep(clock.until_next());
    }

    info!("Headless control loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{
        ClipSpec, FallbackPolicy, PlaybackEngine, PlaybackMapping, PlaybackSelector,
        SyntheticBackend,
    };
    use crate::sensor::{SensorState, TagTable};
    use crate::serial::ScriptedPort;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_loop_consumes_script_and_stops_on_flag() {
        let tags = TagTable::new(vec!["0".into(), "0x01 0x02".into()]).unwrap();
        let mut mapping = PlaybackMapping::new();
        mapping.insert(SensorState::default(), "idle.mp4");
        mapping.insert(SensorState::default().with_rfid(tags.id(1).unwrap()), "tag.mp4");
        let backend = SyntheticBackend::new()
            .with_clip("idle.mp4", ClipSpec::new(10, 2, 2))
            .with_clip("tag.mp4", ClipSpec::new(10, 2, 2));
        let port = ScriptedPort::new().line("UID Value: 0x01 0x02");
        let mut installation = Installation::new(
            tags,
            PlaybackSelector::new(mapping, FallbackPolicy::Strict),
            PlaybackEngine::new(backend, (2, 2)),
            port,
        );

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            flag.store(true, Ordering::SeqCst);
        });

        run_headless(&mut installation, 100, &stop);
        stopper.join().unwrap();

        assert_eq!(installation.port().remaining(), 0);
        assert_eq!(installation.engine().video_id(), Some("tag.mp4"));
        assert!(installation.engine().presented_count() > 0);
    }

    #[test]
    fn test_preset_flag_returns_immediately() {
        let tags = TagTable::new(vec!["0".into()]).unwrap();
        let mut installation = Installation::new(
            tags,
            PlaybackSelector::new(PlaybackMapping::new(), FallbackPolicy::Strict),
            PlaybackEngine::new(SyntheticBackend::new(), (2, 2)),
            ScriptedPort::offline(),
        );
        let stop = AtomicBool::new(true);
        run_headless(&mut installation, 25, &stop);
        assert!(installation.is_running());
        assert!(installation.presented().is_blank());
    }
}
