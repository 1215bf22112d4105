//! Check system capabilities.

use std::sync::Arc;

use snapreel_capture_engine::{CaptureDevice, FfmpegScreenDevice};
use snapreel_common::process::command_exists;
use snapreel_common::AppConfig;
use snapreel_playback::SyntheticElement;
use snapreel_project_model::{ExportOptions, PRESET_GRADIENTS};
use snapreel_render_engine::{
    DirectorySink, EncoderBackend, ExportEngine, ExportOutcome, FfmpegEncoderBackend,
};

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Snapreel System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = FfmpegEncoderBackend::new().is_available();
    report(ffmpeg, "ffmpeg (export encoder)");
    report(command_exists("ffprobe"), "ffprobe (source probing)");

    let screen = FfmpegScreenDevice::new();
    let display = std::env::var("DISPLAY").ok();
    report(
        screen.is_available() && display.is_some(),
        &format!(
            "Screen capture: {} on {}",
            screen.name(),
            display.as_deref().unwrap_or("<no DISPLAY>")
        ),
    );

    println!();
    println!("Downloads directory: {}", config.downloads_dir.display());
    println!(
        "Export: max height {}px, {} fps, {} kbps",
        config.export.max_output_height,
        config.export.framerate,
        config.export.bitrate_bps / 1000
    );
    println!(
        "Gradient presets: {}",
        PRESET_GRADIENTS
            .iter()
            .map(|p| p.id)
            .collect::<Vec<_>>()
            .join(", ")
    );

    if !ffmpeg {
        println!();
        println!("Exports need ffmpeg on PATH.");
        return Ok(());
    }

    println!();
    println!("Running a test export...");
    let scratch = std::env::temp_dir().join("snapreel-check");
    let engine = ExportEngine::new(
        config.export.clone(),
        Arc::new(FfmpegEncoderBackend::new()),
        Arc::new(DirectorySink::new(&scratch)),
    );
    let mut source = SyntheticElement::new(320, 180, 0.5);
    let options = ExportOptions {
        file_name: Some("snapreel-check".to_string()),
        padding: 8,
        ..ExportOptions::default()
    };

    match engine.export_video(&mut source, &options, None).await {
        Ok(ExportOutcome::Completed { path, frames, .. }) => {
            report(true, &format!("Test export: {frames} frames"));
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::debug!(error = %e, path = %path.display(), "Failed to remove test export");
            }
        }
        Ok(ExportOutcome::Cancelled) => report(false, "Test export was cancelled"),
        Err(e) => report(false, &format!("Test export failed: {e}")),
    }

    Ok(())
}

fn report(ok: bool, what: &str) {
    if ok {
        println!("[OK] {what}");
    } else {
        println!("[MISSING] {what}");
    }
}
