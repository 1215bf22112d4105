use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::RgbaImage;
use snapreel_common::{ExportSettings, SnapreelError, SnapreelResult};
use snapreel_playback::{MediaElement, SyntheticElement};
use snapreel_project_model::{
    AspectRatio, BackgroundSpec, CropArea, ExportOptions, OutputContainer, Rgba,
};
use snapreel_render_engine::{
    ArtifactSink, EncodedOutput, EncoderBackend, EncoderConfig, ExportEngine, ExportOutcome,
    ExportState, FrameEncoder, ImageLoader, ProgressCallback, VideoFrame,
};

#[derive(Debug, Default)]
struct EncodeLog {
    configs: Vec<EncoderConfig>,
    timestamps: Vec<i64>,
    first_pixel: Option<[u8; 4]>,
    finished: bool,
    aborted: bool,
}

/// Records what the engine submits instead of encoding it.
#[derive(Clone)]
struct MemoryEncoderBackend {
    available: bool,
    fail_on_frame: Option<usize>,
    log: Arc<Mutex<EncodeLog>>,
}

impl MemoryEncoderBackend {
    fn new() -> Self {
        Self {
            available: true,
            fail_on_frame: None,
            log: Arc::default(),
        }
    }

    fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    fn failing_at(frame: usize) -> Self {
        Self {
            fail_on_frame: Some(frame),
            ..Self::new()
        }
    }
}

struct MemoryEncoder {
    container: OutputContainer,
    fail_on_frame: Option<usize>,
    log: Arc<Mutex<EncodeLog>>,
}

#[async_trait::async_trait]
impl FrameEncoder for MemoryEncoder {
    async fn encode(&mut self, frame: VideoFrame<'_>) -> SnapreelResult<()> {
        let mut log = self.log.lock().unwrap();
        if self.fail_on_frame == Some(log.timestamps.len()) {
            return Err(SnapreelError::encode("disk full"));
        }
        if log.first_pixel.is_none() {
            log.first_pixel = Some(frame.image.get_pixel(0, 0).0);
        }
        log.timestamps.push(frame.timestamp_us);
        Ok(())
    }

    async fn finish(&mut self) -> SnapreelResult<EncodedOutput> {
        let mut log = self.log.lock().unwrap();
        log.finished = true;
        Ok(EncodedOutput {
            bytes: vec![0x1a, 0x45, 0xdf, 0xa3],
            container: self.container,
            frames: log.timestamps.len() as u64,
        })
    }

    async fn abort(&mut self) {
        self.log.lock().unwrap().aborted = true;
    }
}

impl EncoderBackend for MemoryEncoderBackend {
    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &str {
        "memory"
    }

    fn create(&self, config: &EncoderConfig) -> SnapreelResult<Box<dyn FrameEncoder>> {
        self.log.lock().unwrap().configs.push(config.clone());
        Ok(Box::new(MemoryEncoder {
            container: config.container,
            fail_on_frame: self.fail_on_frame,
            log: Arc::clone(&self.log),
        }))
    }
}

#[derive(Default)]
struct MemorySink {
    delivered: Mutex<Vec<(String, usize)>>,
}

impl MemorySink {
    fn deliveries(&self) -> Vec<(String, usize)> {
        self.delivered.lock().unwrap().clone()
    }
}

impl ArtifactSink for MemorySink {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> SnapreelResult<PathBuf> {
        self.delivered
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes.len()));
        Ok(PathBuf::from("/downloads").join(file_name))
    }
}

struct FailingImages;

#[async_trait::async_trait]
impl ImageLoader for FailingImages {
    async fn load(&self, uri: &str) -> SnapreelResult<RgbaImage> {
        Err(SnapreelError::BackgroundImageLoadFailed {
            uri: uri.to_string(),
        })
    }
}

struct SlowImages;

#[async_trait::async_trait]
impl ImageLoader for SlowImages {
    async fn load(&self, _uri: &str) -> SnapreelResult<RgbaImage> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(RgbaImage::new(4, 4))
    }
}

struct SolidImages([u8; 4]);

#[async_trait::async_trait]
impl ImageLoader for SolidImages {
    async fn load(&self, _uri: &str) -> SnapreelResult<RgbaImage> {
        Ok(RgbaImage::from_pixel(8, 8, image::Rgba(self.0)))
    }
}

fn engine_with(backend: MemoryEncoderBackend) -> (ExportEngine, Arc<Mutex<EncodeLog>>, Arc<MemorySink>) {
    let log = Arc::clone(&backend.log);
    let sink = Arc::new(MemorySink::default());
    let engine = ExportEngine::new(ExportSettings::default(), Arc::new(backend), sink.clone());
    (engine, log, sink)
}

/// A source that has been playing for half a second.
async fn playing_source(duration: f64) -> SyntheticElement {
    let mut source = SyntheticElement::new(320, 180, duration);
    source.play().await.unwrap();
    source.advance(Duration::from_millis(500)).await.unwrap();
    source
}

fn recording_progress() -> (ProgressCallback, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p.percent));
    (callback, seen)
}

fn padded(background: BackgroundSpec) -> ExportOptions {
    ExportOptions {
        background,
        padding: 16,
        ..ExportOptions::default()
    }
}

#[tokio::test]
async fn test_export_completes_and_restores_source() {
    let (engine, log, sink) = engine_with(MemoryEncoderBackend::new());
    let mut source = playing_source(2.0).await;
    let (callback, seen) = recording_progress();

    let options = ExportOptions {
        trim_start: 0.5,
        trim_end: 1.5,
        file_name: Some("My Recording!! 01".to_string()),
        ..padded(BackgroundSpec::Gradient {
            colors: [Rgba::rgb(0x7c, 0x3a, 0xed), Rgba::rgb(0xec, 0x48, 0x99)],
        })
    };
    let outcome = engine
        .export_video(&mut source, &options, Some(callback))
        .await
        .unwrap();

    let ExportOutcome::Completed {
        file_name, frames, ..
    } = outcome
    else {
        panic!("expected a completed export");
    };
    assert_eq!(file_name, "My-Recording-01.webm");

    let log = log.lock().unwrap();
    assert_eq!(log.configs.len(), 1);
    assert_eq!((log.configs[0].width, log.configs[0].height), (320, 180));
    assert_eq!(log.configs[0].container, OutputContainer::Webm);
    assert!(log.finished);
    assert!(!log.aborted);
    assert_eq!(frames as usize, log.timestamps.len());
    assert!(frames >= 25);
    assert_eq!(log.timestamps[0], 500_000);
    assert!(log.timestamps.windows(2).all(|w| w[0] < w[1]));
    assert!(log.timestamps.iter().all(|&ts| ts < 1_500_000));

    let percents = seen.lock().unwrap().clone();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.last(), Some(&100));

    assert_eq!(sink.deliveries(), vec![("My-Recording-01.webm".to_string(), 4)]);
    assert_eq!(source.current_time(), 0.5);
    assert!(!source.is_paused());
    assert_eq!(engine.state(), ExportState::Done);
    assert!(!engine.is_exporting());
    assert_eq!(engine.progress(), 0);
}

#[tokio::test]
async fn test_invalid_trim_range_fails_without_download() {
    let (engine, log, sink) = engine_with(MemoryEncoderBackend::new());
    let mut source = SyntheticElement::new(320, 180, 4.0);
    source.set_current_time(1.25);
    source.wait_seeked().await.unwrap();

    let options = ExportOptions {
        trim_start: 3.0,
        trim_end: 2.0,
        ..ExportOptions::default()
    };
    let err = engine
        .export_video(&mut source, &options, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SnapreelError::InvalidTrimRange { .. }));
    assert!(log.lock().unwrap().configs.is_empty());
    assert!(sink.deliveries().is_empty());
    assert_eq!(source.current_time(), 1.25);
    assert!(source.is_paused());
    assert_eq!(engine.state(), ExportState::Failed);
}

#[tokio::test]
async fn test_missing_encoder_is_reported_distinctly() {
    let (engine, log, sink) = engine_with(MemoryEncoderBackend::unavailable());
    let mut source = playing_source(2.0).await;

    let err = engine
        .export_video(&mut source, &ExportOptions::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, SnapreelError::CapabilityUnavailable { .. }));
    assert!(log.lock().unwrap().configs.is_empty());
    assert!(sink.deliveries().is_empty());
    // The source was never touched.
    assert_eq!(source.current_time(), 0.5);
    assert!(!source.is_paused());
    assert_eq!(engine.state(), ExportState::Idle);
}

#[tokio::test]
async fn test_cancel_mid_export_skips_download_and_restores() {
    let (engine, log, sink) = engine_with(MemoryEncoderBackend::new());
    let mut source = playing_source(3.0).await;

    let handle = engine.cancel_handle();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    let callback: ProgressCallback = Box::new(move |p| {
        recorded.lock().unwrap().push(p.percent);
        if p.percent >= 40 {
            handle.cancel();
        }
    });

    let outcome = engine
        .export_video(&mut source, &ExportOptions::default(), Some(callback))
        .await
        .unwrap();

    assert_eq!(outcome, ExportOutcome::Cancelled);
    assert!(sink.deliveries().is_empty());

    let log = log.lock().unwrap();
    assert!(log.aborted);
    assert!(!log.finished);
    assert!(log.timestamps.iter().all(|&ts| ts <= 1_300_000));

    let percents = seen.lock().unwrap().clone();
    assert!(percents.iter().all(|&p| p < 100));

    assert_eq!(source.current_time(), 0.5);
    assert!(!source.is_paused());
    assert_eq!(engine.state(), ExportState::Cancelled);
}

#[tokio::test]
async fn test_failed_background_image_degrades_to_fallback_fill() {
    let (engine, log, sink) = engine_with(MemoryEncoderBackend::new());
    let engine = engine.with_image_loader(Arc::new(FailingImages));
    let mut source = SyntheticElement::new(320, 180, 0.5);

    let options = padded(BackgroundSpec::Image {
        uri: "missing.png".to_string(),
    });
    let outcome = engine.export_video(&mut source, &options, None).await.unwrap();

    assert!(matches!(outcome, ExportOutcome::Completed { .. }));
    assert_eq!(log.lock().unwrap().first_pixel, Some([255, 0, 0, 255]));
    assert_eq!(sink.deliveries().len(), 1);
}

#[tokio::test]
async fn test_slow_background_image_times_out() {
    let backend = MemoryEncoderBackend::new();
    let log = Arc::clone(&backend.log);
    let settings = ExportSettings {
        image_timeout_ms: 50,
        ..ExportSettings::default()
    };
    let engine = ExportEngine::new(settings, Arc::new(backend), Arc::new(MemorySink::default()))
        .with_image_loader(Arc::new(SlowImages));
    let mut source = SyntheticElement::new(320, 180, 0.5);

    let options = padded(BackgroundSpec::Image {
        uri: "https://example.invalid/wall.png".to_string(),
    });
    let outcome = engine.export_video(&mut source, &options, None).await.unwrap();

    assert!(matches!(outcome, ExportOutcome::Completed { .. }));
    assert_eq!(log.lock().unwrap().first_pixel, Some([255, 0, 0, 255]));
}

#[tokio::test]
async fn test_background_image_is_painted_behind_video() {
    let (engine, log, _sink) = engine_with(MemoryEncoderBackend::new());
    let engine = engine.with_image_loader(Arc::new(SolidImages([0, 200, 0, 255])));
    let mut source = SyntheticElement::new(320, 180, 0.5);

    let options = padded(BackgroundSpec::Image {
        uri: "wall.png".to_string(),
    });
    engine.export_video(&mut source, &options, None).await.unwrap();

    assert_eq!(log.lock().unwrap().first_pixel, Some([0, 200, 0, 255]));
}

#[tokio::test]
async fn test_second_concurrent_export_is_refused() {
    let (engine, _log, sink) = engine_with(MemoryEncoderBackend::new());
    let mut first = SyntheticElement::new(320, 180, 1.0);
    let mut second = SyntheticElement::new(320, 180, 1.0);
    let options = ExportOptions::default();

    let (a, b) = tokio::join!(
        engine.export_video(&mut first, &options, None),
        engine.export_video(&mut second, &options, None),
    );

    let busy = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(SnapreelError::ExportBusy)))
        .count();
    let completed = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Ok(ExportOutcome::Completed { .. })))
        .count();
    assert_eq!((busy, completed), (1, 1));
    assert_eq!(sink.deliveries().len(), 1);
    assert!(!engine.is_exporting());
}

#[tokio::test]
async fn test_encoder_failure_aborts_job() {
    let (engine, log, sink) = engine_with(MemoryEncoderBackend::failing_at(3));
    let mut source = playing_source(2.0).await;

    let err = engine
        .export_video(&mut source, &ExportOptions::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, SnapreelError::Encode { .. }));
    assert!(log.lock().unwrap().aborted);
    assert!(sink.deliveries().is_empty());
    assert_eq!(source.current_time(), 0.5);
    assert!(!source.is_paused());
    assert_eq!(engine.state(), ExportState::Failed);
    assert!(!engine.is_exporting());
}

#[tokio::test]
async fn test_mp4_source_exports_mp4_with_default_name() {
    let (engine, log, sink) = engine_with(MemoryEncoderBackend::new());
    let mut source = SyntheticElement::new(1920, 1080, 0.5).with_mime_type("video/mp4");

    let options = ExportOptions {
        aspect_ratio: AspectRatio::Fixed {
            width: 1,
            height: 1,
        },
        crop_area: Some(CropArea::new(25.0, 25.0, 50.0, 50.0)),
        ..ExportOptions::default()
    };
    engine.export_video(&mut source, &options, None).await.unwrap();

    let config = log.lock().unwrap().configs[0].clone();
    assert_eq!(config.container, OutputContainer::Mp4);
    assert_eq!((config.width, config.height), (720, 720));
    assert_eq!(
        sink.deliveries(),
        vec![("edited-recording.mp4".to_string(), 4)]
    );
}

#[tokio::test]
async fn test_degenerate_aspect_ratio_fails_cleanly() {
    let (engine, log, sink) = engine_with(MemoryEncoderBackend::new());
    let mut source = playing_source(2.0).await;

    let options = ExportOptions {
        aspect_ratio: AspectRatio::Fixed {
            width: 16,
            height: 0,
        },
        ..ExportOptions::default()
    };
    let err = engine
        .export_video(&mut source, &options, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SnapreelError::ExportFailed { .. }));
    assert!(log.lock().unwrap().configs.is_empty());
    assert!(sink.deliveries().is_empty());
    assert_eq!(source.current_time(), 0.5);
    assert!(!source.is_paused());
    assert_eq!(engine.state(), ExportState::Failed);
}
