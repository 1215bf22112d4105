//! Record the screen.

use std::path::PathBuf;
use std::time::Duration;

use snapreel_capture_engine::{CaptureSession, CaptureState, FfmpegScreenDevice, RecorderConfig};
use snapreel_common::AppConfig;
use snapreel_playback::format_time;
use snapreel_project_model::{output_file_name, SessionContext};
use snapreel_render_engine::{ArtifactSink, DirectorySink};
use tokio::time::Instant;

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

pub async fn run(
    config: &AppConfig,
    output_dir: Option<PathBuf>,
    seconds: Option<f64>,
    title: Option<String>,
) -> anyhow::Result<()> {
    let recorder = RecorderConfig::from(&config.capture);
    let output_dir = output_dir.unwrap_or_else(|| config.downloads_dir.clone());

    println!("Starting screen recording");
    println!("  Output: {}", output_dir.display());
    println!("  FPS: {}", recorder.fps);
    println!("  Format: {}", recorder.mime_type);
    println!();

    let mut session = CaptureSession::new(Box::new(FfmpegScreenDevice::new()), recorder);
    session.start().await?;

    let deadline = seconds
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(|s| Instant::now() + Duration::from_secs_f64(s));
    match seconds {
        Some(s) => println!("Recording for {}... press Ctrl+C to stop early", format_time(s)),
        None => println!("Press Ctrl+C to stop recording..."),
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = wait_until(deadline) => break,
            state = session.next_event() => match state {
                Some(CaptureState::Stopped | CaptureState::Failed) | None => break,
                _ => {}
            },
        }
    }

    if matches!(
        session.state(),
        CaptureState::Recording | CaptureState::Paused | CaptureState::Stopping
    ) {
        session.stop().await?;
    }
    if session.state() == CaptureState::Failed {
        anyhow::bail!(
            "Recording failed: {}",
            session.error().unwrap_or("unknown error")
        );
    }

    println!();
    println!("Recorded {}", format_time(session.elapsed_secs()));

    let mut context = SessionContext::new();
    session.commit_to(&mut context);
    let recording = context
        .current()
        .ok_or_else(|| anyhow::anyhow!("Recorder stopped without producing a recording"))?;
    if recording.is_empty() {
        anyhow::bail!("Recorder produced no data");
    }

    let file_name = output_file_name(title.as_deref(), "recording", recording.container());
    let path = DirectorySink::new(output_dir).deliver(&file_name, &recording.bytes)?;
    println!("Recording saved to: {}", path.display());

    Ok(())
}
