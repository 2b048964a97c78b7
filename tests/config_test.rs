//! Layered configuration: defaults, TOML file, environment.

use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use sensor_playback::app::Installation;
use sensor_playback::config::{ConfigError, Settings};
use sensor_playback::playback::{FallbackPolicy, SyntheticBackend};
use sensor_playback::sensor::{SensorState, TagTable};
use sensor_playback::serial::ScriptedPort;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let file = write_config(
        r#"
tags = ["0x00", "0x01 0x02"]

[serial]
port = "/dev/ttyUSB3"
baud_rate = 9600

[video]
directory = "/srv/videos"
fps = 30

[mapping]
policy = "keep_previous"
generate = false

[[mapping.entries]]
rfid = 1
photos = [true, false, false]
video = "special.mp4"
"#,
    );

    let settings = Settings::load_from(file.path()).unwrap();
    assert_eq!(settings.tags.len(), 2);
    assert_eq!(settings.serial.port.as_deref(), Some("/dev/ttyUSB3"));
    assert_eq!(settings.serial.baud_rate, 9600);
    assert_eq!(settings.serial.read_timeout_ms, 6);
    assert_eq!(settings.video.fps, 30);
    assert_eq!(settings.window.title, "window");
    assert_eq!(settings.mapping.policy, FallbackPolicy::KeepPrevious);

    let tags = settings.tag_table().unwrap();
    let mapping = settings.playback_mapping(&tags).unwrap();
    assert_eq!(mapping.len(), 1);
    let state = SensorState::new(tags.id(1).unwrap(), true, false, false);
    assert_eq!(mapping.get(&state), Some("special.mp4"));
}

#[test]
#[serial]
fn test_generated_mapping_covers_every_state() {
    let file = write_config(r#"tags = ["0x00", "0x0A", "0x0B"]"#);
    let settings = Settings::load_from(file.path()).unwrap();
    let tags = settings.tag_table().unwrap();
    let mapping = settings.playback_mapping(&tags).unwrap();

    assert_eq!(mapping.len(), 3 * 8);
    let state = SensorState::new(tags.id(2).unwrap(), false, true, true);
    assert_eq!(mapping.get(&state), Some("video_2011.mp4"));
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = write_config(
        r#"
[serial]
baud_rate = 9600
"#,
    );
    std::env::set_var("SENSOR_PLAYBACK_SERIAL__BAUD_RATE", "57600");
    std::env::set_var("SENSOR_PLAYBACK_MAPPING__POLICY", "keep_previous");
    let loaded = Settings::load_from(file.path());
    std::env::remove_var("SENSOR_PLAYBACK_SERIAL__BAUD_RATE");
    std::env::remove_var("SENSOR_PLAYBACK_MAPPING__POLICY");

    let settings = loaded.unwrap();
    assert_eq!(settings.serial.baud_rate, 57600);
    assert_eq!(settings.mapping.policy, FallbackPolicy::KeepPrevious);
}

#[test]
#[serial]
fn test_missing_and_invalid_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        Settings::load_from(&missing),
        Err(ConfigError::Missing(path)) if path == missing
    ));

    let file = write_config(
        r#"
[video]
fps = 0
"#,
    );
    assert!(matches!(
        Settings::load_from(file.path()),
        Err(ConfigError::Validation(_))
    ));

    let file = write_config("tags = 5");
    assert!(matches!(Settings::load_from(file.path()), Err(ConfigError::Load(_))));
}

#[test]
#[serial]
fn test_effective_settings_round_trip_through_toml() {
    let mut settings = Settings::default();
    settings.serial.port = Some("COM4".into());
    let file = write_config(&settings.to_toml().unwrap());
    assert_eq!(Settings::load_from(file.path()).unwrap(), settings);
}

#[test]
#[serial]
fn test_installation_from_settings() {
    let mut settings = Settings::default();
    settings.window.fullscreen = true;
    let installation =
        Installation::from_settings(&settings, SyntheticBackend::new(), ScriptedPort::offline())
            .unwrap();

    assert!(installation.fullscreen());
    assert_eq!(installation.presented().width(), settings.video.blank_width);
    assert_eq!(
        installation.state(),
        SensorState::default(),
        "starts with no tag and every photoresistor open"
    );
    assert_eq!(TagTable::new(settings.tags.clone()), Some(settings.tag_table().unwrap()));
}
