//! X11 screen capture through `ffmpeg -f x11grab`.
//!
//! ffmpeg encodes straight into a streamable container on stdout; a reader
//! task slices that stream into timeslice-sized `DataAvailable` chunks.
//! Stopping writes `q` to ffmpeg's stdin so it finalizes the container.

use std::process::Stdio;

use snapreel_common::process::{command_exists, drain_stderr, last_line};
use snapreel_common::{SnapreelError, SnapreelResult};
use snapreel_project_model::OutputContainer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::device::{CaptureDevice, CaptureEvent, EventSender, RecorderConfig};

const READ_CHUNK: usize = 64 * 1024;

/// Records an X11 display.
#[derive(Debug)]
pub struct FfmpegScreenDevice {
    display: String,
    region: Option<(u32, u32, u32, u32)>,
    draw_mouse: bool,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FfmpegScreenDevice {
    /// Capture the display named by `$DISPLAY` (`:0.0` when unset).
    pub fn new() -> Self {
        Self {
            display: std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".to_string()),
            region: None,
            draw_mouse: true,
            stop_tx: None,
            task: None,
        }
    }

    /// Capture only `width x height` at `(x, y)`.
    pub fn with_region(mut self, x: u32, y: u32, width: u32, height: u32) -> Self {
        self.region = Some((x, y, width, height));
        self
    }

    pub fn with_cursor(mut self, draw_mouse: bool) -> Self {
        self.draw_mouse = draw_mouse;
        self
    }

    fn args(&self, config: &RecorderConfig) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-f", "x11grab"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        args.extend([
            "-framerate".to_string(),
            config.fps.to_string(),
            "-draw_mouse".to_string(),
            if self.draw_mouse { "1" } else { "0" }.to_string(),
        ]);

        let input = match self.region {
            Some((x, y, w, h)) => {
                args.extend(["-video_size".to_string(), format!("{w}x{h}")]);
                format!("{}+{x},{y}", self.display)
            }
            None => self.display.clone(),
        };
        args.extend(["-i".to_string(), input, "-an".to_string()]);

        let codec: &[&str] = match OutputContainer::from_mime(&config.mime_type) {
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
                "ultrafast",
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

impl Default for FfmpegScreenDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the reader task owns.
struct Recorder {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
    events: EventSender,
    timeslice: std::time::Duration,
}

impl Recorder {
    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        let mut buf = vec![0u8; READ_CHUNK];
        let mut pending: Vec<u8> = Vec::new();
        let mut slice = tokio::time::interval(self.timeslice);
        slice.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut stop_requested = false;

        loop {
            tokio::select! {
                read = self.stdout.read(&mut buf) => match read {
                    Ok(0) => break,
                    Ok(n) => pending.extend_from_slice(&buf[..n]),
                    Err(e) => {
                        let _ = self.events.send(CaptureEvent::Error(format!("Failed reading ffmpeg output: {e}")));
                        return;
                    }
                },
                _ = slice.tick() => {
                    if !pending.is_empty() {
                        let _ = self.events.send(CaptureEvent::DataAvailable(std::mem::take(&mut pending)));
                    }
                },
                _ = &mut stop_rx, if !stop_requested => {
                    stop_requested = true;
                    self.request_quit().await;
                },
            }
        }

        if !pending.is_empty() {
            let _ = self.events.send(CaptureEvent::DataAvailable(pending));
        }

        let status = self.child.wait().await;
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        match status {
            Ok(status) if status.success() || stop_requested => {
                if !stop_requested {
                    // ffmpeg ended on its own: the display went away.
                    let _ = self.events.send(CaptureEvent::TrackEnded);
                }
                tracing::info!(%status, "ffmpeg screen capture exited");
                let _ = self.events.send(CaptureEvent::RecorderStopped);
            }
            Ok(status) => {
                let _ = self.events.send(CaptureEvent::Error(format!(
                    "ffmpeg exited with status {status}: {}",
                    last_line(&stderr)
                )));
            }
            Err(e) => {
                let _ = self
                    .events
                    .send(CaptureEvent::Error(format!("Failed to wait on ffmpeg: {e}")));
            }
        }
    }

    async fn request_quit(&mut self) {
        let Some(mut stdin) = self.stdin.take() else {
            return;
        };
        let quit = async {
            stdin.write_all(b"q").await?;
            stdin.flush().await?;
            stdin.shutdown().await
        };
        if let Err(e) = quit.await {
            tracing::warn!(error = %e, "Failed to ask ffmpeg to quit, killing it");
            let _ = self.child.start_kill();
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for FfmpegScreenDevice {
    fn name(&self) -> &str {
        "ffmpeg-x11grab"
    }

    fn is_available(&self) -> bool {
        cfg!(target_os = "linux") && command_exists("ffmpeg")
    }

    async fn start(&mut self, config: &RecorderConfig, events: EventSender) -> SnapreelResult<()> {
        if self.task.is_some() {
            return Err(SnapreelError::capture("Screen capture already running"));
        }

        let args = self.args(config);
        tracing::debug!(args = ?args, "Starting ffmpeg screen capture");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SnapreelError::capture(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SnapreelError::capture("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SnapreelError::capture("Failed to capture ffmpeg stderr"))?;

        tracing::info!(pid = child.id(), display = %self.display, fps = config.fps, "Screen capture started");

        let recorder = Recorder {
            child,
            stdin,
            stdout,
            stderr_task: Some(drain_stderr(stderr)),
            events,
            timeslice: config.timeslice,
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);
        self.task = Some(tokio::spawn(recorder.run(stop_rx)));
        Ok(())
    }

    fn pause(&mut self) -> SnapreelResult<()> {
        Err(SnapreelError::capability(
            "ffmpeg screen capture cannot pause; stop and start a new recording",
        ))
    }

    fn resume(&mut self) -> SnapreelResult<()> {
        Err(SnapreelError::capability("ffmpeg screen capture cannot pause"))
    }

    fn stop(&mut self) -> SnapreelResult<()> {
        if let Some(tx) = self.stop_tx.take() {
            // The reader may already have exited on its own; it reports that itself.
            let _ = tx.send(());
        }
        Ok(())
    }

    fn release(&mut self) {
        self.stop_tx = None;
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                tracing::debug!("Aborting ffmpeg screen capture");
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_for_full_display() {
        let device = FfmpegScreenDevice {
            display: ":1".to_string(),
            ..FfmpegScreenDevice::new()
        };
        let args = device.args(&RecorderConfig::default());
        assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == ":1"));
        assert!(args.windows(2).any(|w| w[0] == "-framerate" && w[1] == "30"));
        assert!(args.iter().any(|a| a == "libvpx-vp9"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_args_for_region_and_mp4() {
        let device = FfmpegScreenDevice {
            display: ":0.0".to_string(),
            ..FfmpegScreenDevice::new()
        }
        .with_region(100, 50, 1280, 720)
        .with_cursor(false);
        let config = RecorderConfig {
            mime_type: "video/mp4".to_string(),
            ..RecorderConfig::default()
        };
        let args = device.args(&config);
        assert!(args.windows(2).any(|w| w[0] == "-video_size" && w[1] == "1280x720"));
        assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == ":0.0+100,50"));
        assert!(args.windows(2).any(|w| w[0] == "-draw_mouse" && w[1] == "0"));
        assert!(args.iter().any(|a| a == "frag_keyframe+empty_moov"));
    }

    #[test]
    fn test_pause_is_reported_as_unsupported() {
        let mut device = FfmpegScreenDevice::new();
        assert!(matches!(
            device.pause(),
            Err(SnapreelError::CapabilityUnavailable { .. })
        ));
    }
}
