//! FFmpeg subprocess video backend.
//!
//! Probes each file with `ffprobe` and decodes it by streaming raw RGB24
//! frames from an `ffmpeg` child process. Seeking restarts the child at the
//! target timestamp. Works wherever the FFmpeg command line tools are
//! installed, without linking against the libraries.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::backend::{SourceError, VideoBackend, VideoStream};
use super::frame::{rgb_len, Frame};

/// Properties of a video stream as reported by ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProperties {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Average frame rate.
    pub fps: f64,
    /// Frame count, when the container reports one.
    pub frame_count: Option<u64>,
}

/// Backend resolving video identifiers inside a directory.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    directory: PathBuf,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegBackend {
    /// Create a backend reading from `directory` with the given executables.
    pub fn new(directory: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Check that `ffmpeg` can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Full path of a video identifier.
    pub fn resolve(&self, video_id: &str) -> PathBuf {
        self.directory.join(video_id)
    }

    fn probe(&self, path: &Path) -> Result<VideoProperties, SourceError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,nb_frames,duration",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| SourceError::Probe {
                path: path.to_path_buf(),
                message: format!("ffprobe execution failed: {}", e),
            })?;

        if !output.status.success() {
            return Err(SourceError::Probe {
                path: path.to_path_buf(),
                message: format!("ffprobe exited with {}", output.status),
            });
        }

        parse_probe(&String::from_utf8_lossy(&output.stdout)).map_err(|message| {
            SourceError::Probe {
                path: path.to_path_buf(),
                message,
            }
        })
    }
}

impl VideoBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open(&self, video_id: &str) -> Result<Box<dyn VideoStream>, SourceError> {
        let path = self.resolve(video_id);
        if !path.is_file() {
            return Err(SourceError::Missing(path));
        }

        let props = self.probe(&path)?;
        info!(
            "Video '{}': {}x{} @ {:.3} fps, {} frames",
            video_id,
            props.width,
            props.height,
            props.fps,
            props
                .frame_count
                .map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        let mut stream = FfmpegStream {
            ffmpeg: self.ffmpeg.clone(),
            path,
            props,
            decoder: None,
        };
        stream.spawn(0)?;
        Ok(Box::new(stream))
    }
}

struct Decoder {
    child: Child,
    stdout: ChildStdout,
}

impl Drop for Decoder {
    fn drop(&mut self) {
        // The child may already have exited at end of stream.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

struct FfmpegStream {
    ffmpeg: PathBuf,
    path: PathBuf,
    props: VideoProperties,
    decoder: Option<Decoder>,
}

impl FfmpegStream {
    fn spawn(&mut self, frame: u64) -> Result<(), SourceError> {
        // Release the running decoder before starting its replacement.
        self.decoder = None;

        let mut command = Command::new(&self.ffmpeg);
        command.args(["-v", "error", "-nostdin"]);
        if frame > 0 {
            let seconds = frame as f64 / self.props.fps;
            command.arg("-ss").arg(format!("{:.6}", seconds));
        }
        command
            .arg("-i")
            .arg(&self.path)
            .args(["-map", "0:v:0", "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = command.spawn().map_err(|e| SourceError::OpenFailed {
            id: self.path.display().to_string(),
            message: format!("ffmpeg execution failed: {}", e),
        })?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SourceError::OpenFailed {
                id: self.path.display().to_string(),
                message: "ffmpeg stdout not captured".to_string(),
            });
        };

        debug!("Spawned ffmpeg for '{}' at frame {}", self.path.display(), frame);
        self.decoder = Some(Decoder { child, stdout });
        Ok(())
    }
}

impl VideoStream for FfmpegStream {
    fn dimensions(&self) -> (u32, u32) {
        (self.props.width, self.props.height)
    }

    fn frame_count(&self) -> Option<u64> {
        self.props.frame_count
    }

    fn seek(&mut self, frame: u64) -> Result<(), SourceError> {
        self.spawn(frame).map_err(|e| SourceError::Seek {
            frame,
            message: e.to_string(),
        })
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };
        let mut pixels = vec![0u8; rgb_len(self.props.width, self.props.height)];
        match decoder.stdout.read_exact(&mut pixels) {
            Ok(()) => Frame::from_rgb(self.props.width, self.props.height, pixels)
                .map(Some)
                .ok_or_else(|| SourceError::Decode("frame size mismatch".to_string())),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.decoder = None;
                Ok(None)
            }
            Err(e) => {
                warn!("ffmpeg read failed for '{}': {}", self.path.display(), e);
                Err(SourceError::Io(e))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse ffprobe JSON output for the first video stream.
pub fn parse_probe(json: &str) -> Result<VideoProperties, String> {
    let data: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("Failed to parse ffprobe JSON: {}", e))?;
    let stream = data
        .streams
        .first()
        .ok_or_else(|| "No video streams found".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("Video stream has no resolution".to_string()),
    };
    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_fps_fraction)
        .ok_or_else(|| "Video stream has no frame rate".to_string())?;

    let duration = stream
        .duration
        .as_deref()
        .or_else(|| data.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok());
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .or_else(|| duration.map(|d| (d * fps).floor() as u64).filter(|&n| n > 0));

    Ok(VideoProperties {
        width,
        height,
        fps,
        frame_count,
    })
}

/// Parse a rational like `25/1` or `30000/1001`.
pub fn parse_fps_fraction(value: &str) -> Option<f64> {
    let (num, den) = match value.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (value.trim().parse::<f64>().ok()?, 1.0),
    };
    (num > 0.0 && den > 0.0).then(|| num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fps_fraction() {
        assert_eq!(parse_fps_fraction("25/1"), Some(25.0));
        assert!((parse_fps_fraction("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_fps_fraction("0/0"), None);
        assert_eq!(parse_fps_fraction("abc"), None);
    }

    #[test]
    fn test_parse_probe_with_frame_count() {
        let json = r#"{
            "streams": [{"width": 1280, "height": 720, "r_frame_rate": "25/1", "nb_frames": "250", "duration": "10.000000"}],
            "format": {"duration": "10.000000"}
        }"#;
        let props = parse_probe(json).unwrap();
        assert_eq!((props.width, props.height), (1280, 720));
        assert_eq!(props.fps, 25.0);
        assert_eq!(props.frame_count, Some(250));
    }

    #[test]
    fn test_parse_probe_estimates_from_format_duration() {
        let json = r#"{
            "streams": [{"width": 640, "height": 480, "r_frame_rate": "25/1"}],
            "format": {"duration": "4.000000"}
        }"#;
        assert_eq!(parse_probe(json).unwrap().frame_count, Some(100));
    }

    #[test]
    fn test_parse_probe_without_streams() {
        assert!(parse_probe(r#"{"streams": []}"#).is_err());
        assert!(parse_probe("not json").is_err());
    }

    #[test]
    fn test_open_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FfmpegBackend::new(dir.path(), "ffmpeg", "ffprobe");
        assert!(matches!(
            backend.open("video_0000.mp4"),
            Err(SourceError::Missing(_))
        ));
    }
}
