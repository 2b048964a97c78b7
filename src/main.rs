//! Sensor playback binary.
//!
//! ```bash
//! # Window, settings from config/default.toml
//! sensor-playback
//!
//! # Another config file, a fixed port, no window
//! sensor-playback --config site.toml --port /dev/ttyACM0 --headless
//!
//! # Show the effective settings and exit
//! sensor-playback --print-config
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sensor_playback::app::{run_headless, Installation};
use sensor_playback::config::Settings;
use sensor_playback::playback::{FfmpegBackend, VideoBackend};
use sensor_playback::serial::LineSource;

/// Plays the video mapped to the current RFID and photoresistor state.
#[derive(Parser, Debug)]
#[command(name = "sensor-playback", version, about)]
struct Cli {
    /// Configuration file (default: config/default.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the videos
    #[arg(long, value_name = "DIR")]
    videos: Option<PathBuf>,

    /// Serial device to prefer
    #[arg(short, long, value_name = "PORT")]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Control loop and playback rate
    #[arg(long)]
    fps: Option<u32>,

    /// Start fullscreen
    #[arg(long)]
    fullscreen: bool,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(videos) = &self.videos {
            settings.video.directory = videos.clone();
        }
        if let Some(port) = &self.port {
            settings.serial.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            settings.serial.baud_rate = baud;
        }
        if let Some(fps) = self.fps {
            settings.video.fps = fps;
        }
        if self.fullscreen {
            settings.window.fullscreen = true;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("Failed to load configuration")?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid command line overrides")?;

    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.application.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting {}", settings.application.name);

    let backend = FfmpegBackend::new(
        settings.video.directory.clone(),
        settings.video.ffmpeg.clone(),
        settings.video.ffprobe.clone(),
    );
    if !backend.is_available() {
        warn!(
            "'{}' not found, every video will fail to open and show blank",
            settings.video.ffmpeg.display()
        );
    }

    run(&cli, &settings, backend, line_source(&settings))
}

#[cfg(feature = "instrument_serial")]
fn line_source(settings: &Settings) -> sensor_playback::serial::SerialPortManager {
    sensor_playback::serial::SerialPortManager::new(&settings.serial)
}

#[cfg(not(feature = "instrument_serial"))]
fn line_source(_settings: &Settings) -> sensor_playback::serial::ScriptedPort {
    warn!("Built without serial support, only keyboard input is available");
    sensor_playback::serial::ScriptedPort::offline()
}

fn run<B, P>(cli: &Cli, settings: &Settings, backend: B, port: P) -> Result<()>
where
    B: VideoBackend + 'static,
    P: LineSource + 'static,
{
    let mut installation = Installation::from_settings(settings, backend, port)
        .context("Failed to build the installation")?;

    if cli.headless || !cfg!(feature = "gui_egui") {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
        run_headless(&mut installation, settings.video.fps, &stop);
        return Ok(());
    }

    #[cfg(feature = "gui_egui")]
    sensor_playback::gui::run(installation, &settings.window, settings.video.fps)?;
    Ok(())
}
