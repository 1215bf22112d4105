//! Export engine: trimmed, cropped, composited re-encode of a source element.
//!
//! One export runs at a time per engine. The run takes over the source
//! element (position and play state), drives it tick by tick through the
//! trim window, composites each frame over the background, hands frames to
//! the encoder, and delivers the finished container through an
//! [`ArtifactSink`]. Whatever happens, the element is handed back at the
//! position and play state it had before.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use serde::Serialize;
use snapreel_common::{
    secs_to_micros, AppConfig, ExportSettings, FixedStepTicker, SnapreelError, SnapreelResult,
    TickSource,
};
use snapreel_playback::MediaElement;
use snapreel_project_model::{
    effective_window, output_file_name, BackgroundSpec, ExportOptions, OutputContainer, Rgba,
};

use crate::background::{render_background, resolve_background};
use crate::compositor::{output_size, Compositor, Layout};
use crate::encoder::{EncoderBackend, EncoderConfig, FfmpegEncoderBackend, FrameEncoder, VideoFrame};
use crate::sink::{ArtifactSink, DirectorySink};

/// Lifecycle of one export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ExportState {
    #[default]
    Idle,
    Preparing,
    Encoding,
    Finalizing,
    Cancelled,
    Failed,
    Done,
}

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportProgress {
    /// Whole percent of the trim window covered, never decreasing within a run.
    pub percent: u8,

    /// Current stage.
    pub state: ExportState,

    /// Frames handed to the encoder so far.
    pub frames_encoded: u64,
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Builds the frame scheduler for each run.
pub type TickerFactory = Box<dyn Fn() -> Box<dyn TickSource> + Send + Sync>;

/// How an export run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Completed {
        path: PathBuf,
        file_name: String,
        frames: u64,
    },
    /// Stopped through [`ExportEngine::cancel_export`]; nothing was delivered.
    Cancelled,
}

/// Loads background images referenced by URI.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, uri: &str) -> SnapreelResult<RgbaImage>;
}

/// Reads images from local paths (plain or `file://`).
#[derive(Debug, Clone, Default)]
pub struct FsImageLoader;

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn load(&self, uri: &str) -> SnapreelResult<RgbaImage> {
        let path = PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri));
        let decoded = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| anyhow::anyhow!("image loader task failed: {e}"))?;

        match decoded {
            Ok(img) => Ok(img.to_rgba8()),
            Err(e) => {
                tracing::debug!(uri, error = %e, "Background image decode failed");
                Err(SnapreelError::BackgroundImageLoadFailed {
                    uri: uri.to_string(),
                })
            }
        }
    }
}

/// Requests cancellation of whatever export the engine is running.
///
/// Cloneable so a signal handler or another task can hold one.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Position and play state of the source before the engine took it over.
#[derive(Debug, Clone, Copy)]
struct PlayerSnapshot {
    position: f64,
    was_playing: bool,
}

impl PlayerSnapshot {
    fn take(source: &dyn MediaElement) -> Self {
        Self {
            position: source.current_time(),
            was_playing: !source.is_paused() && !source.ended(),
        }
    }

    async fn restore(self, source: &mut dyn MediaElement) {
        source.set_current_time(self.position);
        if let Err(e) = source.wait_seeked().await {
            tracing::warn!(error = %e, position = self.position, "Failed to restore source position");
        }
        if self.was_playing {
            if let Err(e) = source.play().await {
                tracing::warn!(error = %e, "Failed to resume source playback");
            }
        } else {
            source.pause();
        }
    }
}

/// Clears the busy flag and progress when a run ends, however it ends.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    progress: &'a AtomicU8,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.progress.store(0, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Export errors keep their kind when it is one the caller can act on;
/// everything else is reported as a generic export failure.
fn classify(err: SnapreelError) -> SnapreelError {
    match err {
        e @ (SnapreelError::InvalidTrimRange { .. }
        | SnapreelError::Encode { .. }
        | SnapreelError::CapabilityUnavailable { .. }
        | SnapreelError::ExportFailed { .. }) => e,
        e if e.is_source_error() => e,
        other => SnapreelError::export_failed(other.to_string()),
    }
}

fn percent_of(position: f64, start: f64, end: f64) -> u8 {
    let span = end - start;
    if span <= 0.0 {
        return 0;
    }
    (((position - start) / span).clamp(0.0, 1.0) * 100.0).round() as u8
}

/// The export engine.
pub struct ExportEngine {
    settings: ExportSettings,
    encoder: Arc<dyn EncoderBackend>,
    sink: Arc<dyn ArtifactSink>,
    images: Arc<dyn ImageLoader>,
    ticker: TickerFactory,
    busy: AtomicBool,
    cancel: Arc<AtomicBool>,
    progress: AtomicU8,
    state: Mutex<ExportState>,
}

impl ExportEngine {
    pub fn new(
        settings: ExportSettings,
        encoder: Arc<dyn EncoderBackend>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        let fps = settings.framerate as f64;
        Self {
            settings,
            encoder,
            sink,
            images: Arc::new(FsImageLoader),
            ticker: Box::new(move || -> Box<dyn TickSource> {
                Box::new(FixedStepTicker::per_frame(fps))
            }),
            busy: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: AtomicU8::new(0),
            state: Mutex::new(ExportState::Idle),
        }
    }

    /// Engine with the ffmpeg encoder writing into the configured downloads directory.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.export.clone(),
            Arc::new(FfmpegEncoderBackend::new()),
            Arc::new(DirectorySink::new(&config.downloads_dir)),
        )
    }

    pub fn with_image_loader(mut self, images: Arc<dyn ImageLoader>) -> Self {
        self.images = images;
        self
    }

    /// Replace the per-run frame scheduler (real-time display ticks, for instance).
    pub fn with_ticker(mut self, ticker: TickerFactory) -> Self {
        self.ticker = ticker;
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_exporting(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Percent of the running export, 0 when idle.
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    /// Ask the running export to stop at its next tick.
    pub fn cancel_export(&self) {
        if self.is_exporting() {
            tracing::info!("Export cancellation requested");
        }
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ExportState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            tracing::debug!(from = ?*current, to = ?state, "Export state");
            *current = state;
        }
    }

    fn report(&self, callback: Option<&ProgressCallback>, percent: u8, frames_encoded: u64) {
        self.progress.store(percent, Ordering::SeqCst);
        if let Some(cb) = callback {
            cb(ExportProgress {
                percent,
                state: self.state(),
                frames_encoded,
            });
        }
    }

    fn fallback_fill(&self) -> Rgba {
        match self.settings.fallback_fill.parse::<Rgba>() {
            Ok(color) => color,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid fallback fill, using red");
                Rgba::rgb(255, 0, 0)
            }
        }
    }

    /// Export `source` with `options`.
    ///
    /// Fails fast with [`SnapreelError::CapabilityUnavailable`] when the
    /// encoder backend is missing and with [`SnapreelError::ExportBusy`] while
    /// another export runs; neither touches the source. Otherwise the source
    /// is restored to its prior position and play state on every exit path.
    pub async fn export_video(
        &self,
        source: &mut dyn MediaElement,
        options: &ExportOptions,
        progress: Option<ProgressCallback>,
    ) -> SnapreelResult<ExportOutcome> {
        if !self.encoder.is_available() {
            return Err(SnapreelError::capability(format!(
                "frame encoder '{}' is not available on this system",
                self.encoder.name()
            )));
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Refusing export while another is in progress");
            return Err(SnapreelError::ExportBusy);
        }
        let _busy = BusyGuard {
            busy: &self.busy,
            progress: &self.progress,
        };
        self.cancel.store(false, Ordering::SeqCst);
        self.progress.store(0, Ordering::SeqCst);

        let snapshot = PlayerSnapshot::take(source);
        tracing::info!(
            backend = self.encoder.name(),
            trim_start = options.trim_start,
            trim_end = options.trim_end,
            padding = options.padding,
            "Starting export"
        );
        self.set_state(ExportState::Preparing);

        let result = self.run(source, options, progress.as_ref()).await;
        snapshot.restore(source).await;

        let result = result.map_err(classify);
        match &result {
            Ok(ExportOutcome::Completed {
                path,
                frames,
                ..
            }) => {
                self.set_state(ExportState::Done);
                tracing::info!(path = %path.display(), frames, "Export complete");
            }
            Ok(ExportOutcome::Cancelled) => {
                self.set_state(ExportState::Cancelled);
                tracing::info!("Export cancelled");
            }
            Err(e) => {
                self.set_state(ExportState::Failed);
                tracing::error!(error = %e, "Export failed");
            }
        }
        result
    }

    async fn run(
        &self,
        source: &mut dyn MediaElement,
        options: &ExportOptions,
        progress: Option<&ProgressCallback>,
    ) -> SnapreelResult<ExportOutcome> {
        let (start, end) = effective_window(options.trim_start, options.trim_end, source.duration())
            .ok_or(SnapreelError::InvalidTrimRange {
                start: options.trim_start,
                end: options.trim_end,
            })?;

        source.pause();

        options
            .aspect_ratio
            .validate()
            .map_err(|e| SnapreelError::export_failed(e.to_string()))?;
        let natural = source.natural_size();
        let canvas_size = output_size(
            natural,
            self.settings.max_output_height,
            options.aspect_ratio,
        );

        let image = self.preload_background(&options.background).await;
        let paint = resolve_background(
            &options.background,
            canvas_size,
            image.as_ref().map(RgbaImage::dimensions),
            self.fallback_fill(),
        );
        let background = render_background(&paint, canvas_size, image.as_ref());

        let crop = options.crop_area.filter(|c| !c.is_identity());
        let layout = Layout::compute(natural, crop, canvas_size, options.padding);
        let mut compositor = Compositor::new(layout, crop, background);

        let container = OutputContainer::from_mime(source.mime_type());
        let config = EncoderConfig {
            width: canvas_size.0,
            height: canvas_size.1,
            fps: self.settings.framerate,
            bitrate_bps: self.settings.bitrate_bps,
            container,
        };
        tracing::debug!(
            canvas = ?canvas_size,
            dest = ?layout.dest,
            start,
            end,
            container = ?container,
            "Export layout"
        );

        let mut encoder = self.encoder.create(&config)?;
        self.set_state(ExportState::Encoding);

        let frames = match self
            .encode_window(source, &mut compositor, encoder.as_mut(), (start, end), progress)
            .await
        {
            Ok(frames) => frames,
            Err(e) => {
                encoder.abort().await;
                return Err(e);
            }
        };

        if self.is_cancelled() {
            encoder.abort().await;
            return Ok(ExportOutcome::Cancelled);
        }

        self.set_state(ExportState::Finalizing);
        let output = encoder.finish().await?;
        if self.is_cancelled() {
            return Ok(ExportOutcome::Cancelled);
        }

        let file_name = output_file_name(
            options.file_name.as_deref(),
            &self.settings.default_file_name,
            output.container,
        );
        let path = self.sink.deliver(&file_name, &output.bytes)?;
        self.report(progress, 100, frames);

        Ok(ExportOutcome::Completed {
            path,
            file_name,
            frames,
        })
    }

    /// Drive the source through `[start, end)` and feed the encoder.
    ///
    /// Returns the number of frames submitted. Stops early, without error,
    /// when cancelled or when the source ends.
    async fn encode_window(
        &self,
        source: &mut dyn MediaElement,
        compositor: &mut Compositor,
        encoder: &mut dyn FrameEncoder,
        (start, end): (f64, f64),
        progress: Option<&ProgressCallback>,
    ) -> SnapreelResult<u64> {
        let mut ticker = (self.ticker)();

        source.set_current_time(start);
        source.wait_seeked().await?;
        source.play().await?;

        let mut last_timestamp: Option<i64> = None;
        let mut percent = 0u8;
        let mut frames = 0u64;

        loop {
            let position = source.current_time();
            if self.is_cancelled() || position >= end || source.ended() {
                break;
            }

            let canvas = compositor.draw_frame(source.current_frame()?);
            let timestamp_us = secs_to_micros(position);

            if self.is_cancelled() {
                break;
            }
            if last_timestamp.map_or(true, |last| timestamp_us > last) {
                encoder
                    .encode(VideoFrame {
                        image: canvas,
                        timestamp_us,
                    })
                    .await?;
                last_timestamp = Some(timestamp_us);
                frames += 1;
            }

            percent = percent.max(percent_of(position, start, end));
            self.report(progress, percent, frames);

            let tick = ticker.next_tick().await;
            source.advance(tick.elapsed).await?;
        }

        source.pause();
        tracing::debug!(frames, last_timestamp, "Frame loop finished");
        Ok(frames)
    }

    async fn preload_background(&self, spec: &BackgroundSpec) -> Option<RgbaImage> {
        let BackgroundSpec::Image { uri } = spec else {
            return None;
        };

        let timeout = Duration::from_millis(self.settings.image_timeout_ms);
        let loaded = match tokio::time::timeout(timeout, self.images.load(uri)).await {
            Ok(result) => result,
            Err(_) => Err(SnapreelError::BackgroundImageLoadFailed { uri: uri.clone() }),
        };

        match loaded {
            Ok(img) => Some(img),
            Err(e) => {
                let degraded = SnapreelError::BackgroundImageLoadFailed { uri: uri.clone() };
                tracing::warn!(error = %degraded, cause = %e, "Exporting without background image");
                None
            }
        }
    }
}
