//! File-backed media element: `ffprobe` for metadata, an `ffmpeg` child
//! process for RGBA frames.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use image::RgbaImage;
use serde::Deserialize;
use snapreel_common::process::command_exists;
use snapreel_project_model::{mime_from_path, SourceMedia};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use crate::element::{MediaElement, MediaEvent};
use crate::error::{MediaError, MediaErrorKind};

const DEFAULT_FPS: f64 = 30.0;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Read duration, frame size and frame rate of a video file.
pub async fn probe_source(path: &Path) -> Result<SourceMedia, MediaError> {
    let name = display_name(path);
    if !path.exists() {
        return Err(MediaError::with_detail(
            MediaErrorKind::Network,
            format!("{name}: file not found"),
        ));
    }
    if !command_exists("ffprobe") {
        return Err(MediaError::with_detail(
            MediaErrorKind::Unknown,
            "ffprobe not found on PATH",
        ));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| MediaError::with_detail(MediaErrorKind::Aborted, format!("{name}: {e}")))?;

    if !output.status.success() {
        return Err(MediaError::unsupported(&name));
    }

    let parsed: ProbeOutput =
        serde_json::from_slice(&output.stdout).map_err(|_| MediaError::unsupported(&name))?;
    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| MediaError::unsupported(&name))?;
    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MediaError::unsupported(&name)),
    };

    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    Ok(SourceMedia {
        uri: path.display().to_string(),
        mime_type: mime_from_path(path).to_string(),
        duration_secs,
        natural_width: width,
        natural_height: height,
        frame_rate: stream.avg_frame_rate.as_deref().and_then(parse_rate),
    })
}

/// Parse an ffprobe rational such as `30000/1001`.
fn parse_rate(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/').unwrap_or((raw, "1"));
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    let rate = num / den;
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One decoder run, started at a seek position.
struct FrameDecoder {
    _child: Child,
    stdout: ChildStdout,
    start: f64,
    frames_read: u64,
}

impl FrameDecoder {
    fn spawn(path: &Path, start: f64, fps: f64) -> Result<Self, MediaError> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-ss"])
            .arg(format!("{start:.6}"))
            .arg("-i")
            .arg(path)
            .args(["-an", "-vf"])
            .arg(format!("fps={fps}"))
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::decode(format!("failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::decode("failed to capture ffmpeg stdout"))?;

        debug!(pid = child.id(), start, "Decoder started");
        Ok(Self {
            _child: child,
            stdout,
            start,
            frames_read: 0,
        })
    }

    /// Next raw frame, or `None` once the stream is exhausted.
    async fn next_frame(&mut self, width: u32, height: u32) -> Result<Option<RgbaImage>, MediaError> {
        let mut buf = vec![0u8; width as usize * height as usize * 4];
        match self.stdout.read_exact(&mut buf).await {
            Ok(_) => {
                self.frames_read += 1;
                Ok(RgbaImage::from_raw(width, height, buf))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(MediaError::decode(e)),
        }
    }
}

/// A video file played through ffmpeg.
pub struct FfmpegMediaElement {
    path: PathBuf,
    media: SourceMedia,
    fps: f64,
    position: f64,
    paused: bool,
    ended: bool,
    seek_pending: bool,
    decoder: Option<FrameDecoder>,
    frame: Option<RgbaImage>,
    events: VecDeque<MediaEvent>,
}

impl FfmpegMediaElement {
    /// Probe `path` and decode its first frame.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref().to_path_buf();
        let media = probe_source(&path).await?;
        if !command_exists("ffmpeg") {
            return Err(MediaError::with_detail(
                MediaErrorKind::Unknown,
                "ffmpeg not found on PATH",
            ));
        }

        info!(
            path = %path.display(),
            duration_secs = media.duration_secs,
            width = media.natural_width,
            height = media.natural_height,
            "Opened media source"
        );

        let fps = media.frame_rate.unwrap_or(DEFAULT_FPS);
        let mut element = Self {
            path,
            media,
            fps,
            position: 0.0,
            paused: true,
            ended: false,
            seek_pending: true,
            decoder: None,
            frame: None,
            events: VecDeque::from([MediaEvent::LoadStart, MediaEvent::DurationChange]),
        };
        element.wait_seeked().await?;
        element.events.push_back(MediaEvent::LoadedData);
        Ok(element)
    }

    pub fn source(&self) -> &SourceMedia {
        &self.media
    }

    fn name(&self) -> String {
        display_name(&self.path)
    }

    fn mark_ended(&mut self) {
        self.ended = true;
        if !self.paused {
            self.paused = true;
            self.events.push_back(MediaEvent::Pause);
        }
        self.events.push_back(MediaEvent::Ended);
    }

    /// Read frames until the decoder has caught up with `position`.
    async fn catch_up(&mut self) -> Result<(), MediaError> {
        let (width, height) = (self.media.natural_width, self.media.natural_height);
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(());
        };

        let target = ((self.position - decoder.start).max(0.0) * self.fps).floor() as u64;
        while decoder.frames_read <= target {
            match decoder.next_frame(width, height).await? {
                Some(frame) => self.frame = Some(frame),
                None => {
                    self.decoder = None;
                    self.mark_ended();
                    break;
                }
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MediaElement for FfmpegMediaElement {
    fn duration(&self) -> f64 {
        self.media.duration_secs
    }

    fn natural_size(&self) -> (u32, u32) {
        (self.media.natural_width, self.media.natural_height)
    }

    fn mime_type(&self) -> &str {
        &self.media.mime_type
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn set_current_time(&mut self, time: f64) {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        self.position = if self.media.duration_secs > 0.0 {
            time.min(self.media.duration_secs)
        } else {
            time
        };
        self.ended = false;
        self.seek_pending = true;
        self.decoder = None;
    }

    async fn wait_seeked(&mut self) -> Result<(), MediaError> {
        if !self.seek_pending {
            return Ok(());
        }
        self.seek_pending = false;

        let (width, height) = (self.media.natural_width, self.media.natural_height);
        let mut decoder = FrameDecoder::spawn(&self.path, self.position, self.fps)?;
        match decoder.next_frame(width, height).await? {
            Some(frame) => {
                self.frame = Some(frame);
                self.decoder = Some(decoder);
            }
            None if self.frame.is_some() => {
                // Seeking to the very end yields no frames; keep the last one.
                self.decoder = None;
            }
            None => {
                let err = MediaError::decode(format!("{}: decoder produced no frames", self.name()));
                self.events.push_back(MediaEvent::Error(err.clone()));
                return Err(err);
            }
        }
        self.events.push_back(MediaEvent::Seeked);
        Ok(())
    }

    async fn play(&mut self) -> Result<(), MediaError> {
        if self.ended {
            self.set_current_time(0.0);
        }
        self.wait_seeked().await?;
        if self.paused {
            self.paused = false;
            self.events.push_back(MediaEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.events.push_back(MediaEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn ended(&self) -> bool {
        self.ended
    }

    async fn advance(&mut self, elapsed: Duration) -> Result<(), MediaError> {
        self.wait_seeked().await?;
        if self.paused || self.ended {
            return Ok(());
        }

        self.position += elapsed.as_secs_f64();
        let duration = self.media.duration_secs;
        if duration > 0.0 && self.position >= duration {
            self.position = duration;
            self.mark_ended();
            return Ok(());
        }

        if self.decoder.is_none() {
            self.mark_ended();
            return Ok(());
        }
        self.catch_up().await
    }

    fn current_frame(&self) -> Result<&RgbaImage, MediaError> {
        self.frame
            .as_ref()
            .ok_or_else(|| MediaError::decode(format!("{}: no frame decoded", self.name())))
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.events.pop_front()
    }
}
