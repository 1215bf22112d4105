//! Frame encoding: the backend seam and the ffmpeg implementation.

use std::process::Stdio;

use async_trait::async_trait;
use image::RgbaImage;
use snapreel_common::process::{command_exists, drain_stderr, last_line};
use snapreel_common::{SnapreelError, SnapreelResult};
use snapreel_project_model::OutputContainer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

/// Encoder parameters for one export.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_bps: u64,
    pub container: OutputContainer,
}

impl EncoderConfig {
    pub fn validate(&self) -> SnapreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SnapreelError::encode("encode width/height must be non-zero"));
        }
        if self.fps == 0 {
            return Err(SnapreelError::encode("encode fps must be non-zero"));
        }
        Ok(())
    }
}

/// One composited frame handed to the encoder.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    pub image: &'a RgbaImage,
    /// Presentation time in microseconds, taken from the source position.
    pub timestamp_us: i64,
}

/// The finished, in-memory container.
#[derive(Debug, Clone)]
pub struct EncodedOutput {
    pub bytes: Vec<u8>,
    pub container: OutputContainer,
    /// Frames accepted from the engine.
    pub frames: u64,
}

/// An open encoding session.
#[async_trait]
pub trait FrameEncoder: Send {
    /// Submit a frame. Timestamps must be strictly increasing.
    async fn encode(&mut self, frame: VideoFrame<'_>) -> SnapreelResult<()>;

    /// Flush and return the assembled container.
    async fn finish(&mut self) -> SnapreelResult<EncodedOutput>;

    /// Discard everything encoded so far.
    async fn abort(&mut self);
}

/// Factory for encoding sessions (ffmpeg, in-memory, ...).
pub trait EncoderBackend: Send + Sync {
    /// Check if this backend can encode on this system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;

    fn create(&self, config: &EncoderConfig) -> SnapreelResult<Box<dyn FrameEncoder>>;
}

/// Encodes through the system `ffmpeg` binary, raw RGBA in over stdin and the
/// container out over stdout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoderBackend;

impl FfmpegEncoderBackend {
    pub fn new() -> Self {
        Self
    }

    fn args(config: &EncoderConfig) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.extend([
            "-s".to_string(),
            format!("{}x{}", config.width, config.height),
            "-r".to_string(),
            config.fps.to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-an".to_string(),
            // yuv420p needs even sides.
            "-vf".to_string(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
            "-b:v".to_string(),
            config.bitrate_bps.to_string(),
        ]);

        let codec: &[&str] = match config.container {
            OutputContainer::Webm => &[
                "-c:v",
                "libvpx-vp9",
                "-deadline",
                "realtime",
                "-cpu-used",
                "8",
                "-pix_fmt",
                "yuv420p",
                "-f",
                "webm",
            ],
            OutputContainer::Mp4 => &[
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "frag_keyframe+empty_moov",
                "-f",
                "mp4",
            ],
        };
        args.extend(codec.iter().map(|s| s.to_string()));
        args.push("pipe:1".to_string());
        args
    }
}

impl EncoderBackend for FfmpegEncoderBackend {
    fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn create(&self, config: &EncoderConfig) -> SnapreelResult<Box<dyn FrameEncoder>> {
        config.validate()?;
        let args = Self::args(config);
        tracing::debug!(args = ?args, "Starting ffmpeg encoder");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SnapreelError::encode(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SnapreelError::encode("Failed to capture ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SnapreelError::encode("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SnapreelError::encode("Failed to capture ffmpeg stderr"))?;

        // Collect output concurrently; ffmpeg stalls if stdout fills while we write frames.
        let output_task = tokio::spawn(async move {
            let mut bytes = Vec::new();
            stdout.read_to_end(&mut bytes).await.map(|_| bytes)
        });

        tracing::info!(
            pid = child.id(),
            width = config.width,
            height = config.height,
            fps = config.fps,
            container = ?config.container,
            "ffmpeg encoder started"
        );

        Ok(Box::new(FfmpegEncoder {
            config: config.clone(),
            child,
            stdin: Some(stdin),
            output_task: Some(output_task),
            stderr_task: Some(drain_stderr(stderr)),
            slots: SlotClock::new(config.fps),
            last_frame: None,
            frames: 0,
        }))
    }
}

/// Maps microsecond timestamps onto constant-rate output slots.
#[derive(Debug, Clone)]
pub struct SlotClock {
    fps: f64,
    origin_us: Option<i64>,
    next_slot: u64,
}

impl SlotClock {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1) as f64,
            origin_us: None,
            next_slot: 0,
        }
    }

    /// How many times the previous frame must be repeated before this one,
    /// or `None` when the frame lands in an already-filled slot.
    pub fn place(&mut self, timestamp_us: i64) -> Option<u64> {
        let origin = *self.origin_us.get_or_insert(timestamp_us);
        let offset_secs = (timestamp_us - origin).max(0) as f64 / 1_000_000.0;
        let slot = (offset_secs * self.fps).round() as u64;
        if slot < self.next_slot {
            return None;
        }
        let repeats = slot - self.next_slot;
        self.next_slot = slot + 1;
        Some(repeats)
    }
}

struct FfmpegEncoder {
    config: EncoderConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    output_task: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    stderr_task: Option<JoinHandle<String>>,
    slots: SlotClock,
    last_frame: Option<Vec<u8>>,
    frames: u64,
}

/// Write `repeats` copies of the previous frame, then the current one.
async fn write_frame(
    stdin: &mut ChildStdin,
    previous: Option<&[u8]>,
    repeats: u64,
    current: &[u8],
) -> std::io::Result<()> {
    if let Some(previous) = previous {
        for _ in 0..repeats {
            stdin.write_all(previous).await?;
        }
    }
    stdin.write_all(current).await
}

impl FfmpegEncoder {
    async fn stderr_summary(&mut self) -> String {
        match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl FrameEncoder for FfmpegEncoder {
    async fn encode(&mut self, frame: VideoFrame<'_>) -> SnapreelResult<()> {
        if frame.image.dimensions() != (self.config.width, self.config.height) {
            return Err(SnapreelError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.image.width(),
                frame.image.height(),
                self.config.width,
                self.config.height
            )));
        }

        let Some(repeats) = self.slots.place(frame.timestamp_us) else {
            self.frames += 1;
            return Ok(());
        };

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SnapreelError::encode("ffmpeg encoder is already finalized"));
        };

        let write_result =
            write_frame(stdin, self.last_frame.as_deref(), repeats, frame.image.as_raw()).await;

        if let Err(e) = write_result {
            let stderr = self.stderr_summary().await;
            return Err(SnapreelError::encode(format!(
                "failed to write frame to ffmpeg: {e} {}",
                last_line(&stderr)
            )));
        }

        match self.last_frame.as_mut() {
            Some(buf) => buf.copy_from_slice(frame.image.as_raw()),
            None => self.last_frame = Some(frame.image.as_raw().clone()),
        }
        self.frames += 1;
        Ok(())
    }

    async fn finish(&mut self) -> SnapreelResult<EncodedOutput> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| SnapreelError::encode(format!("failed to close ffmpeg stdin: {e}")))?;
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| SnapreelError::encode(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = self.stderr_summary().await;

        let bytes = match self.output_task.take() {
            Some(task) => task
                .await
                .map_err(|e| SnapreelError::encode(format!("ffmpeg output reader failed: {e}")))?
                .map_err(|e| SnapreelError::encode(format!("Failed reading ffmpeg output: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            return Err(SnapreelError::encode(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }

        tracing::info!(
            frames = self.frames,
            bytes = bytes.len(),
            "ffmpeg encoder finished"
        );

        Ok(EncodedOutput {
            bytes,
            container: self.config.container,
            frames: self.frames,
        })
    }

    async fn abort(&mut self) {
        self.stdin.take();
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "ffmpeg already exited");
        }
        if let Some(task) = self.output_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}
