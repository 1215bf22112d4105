//! Export an edited copy of a recording.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use snapreel_common::{AppConfig, DisplayTicker, TickSource};
use snapreel_playback::{format_time, FfmpegMediaElement, MediaElement};
use snapreel_project_model::{
    preset_gradient, AspectRatio, BackgroundSelection, CropArea, ExportOptions, Rgba,
    PRESET_GRADIENTS,
};
use snapreel_render_engine::{
    DirectorySink, ExportEngine, ExportOutcome, FfmpegEncoderBackend, ProgressCallback,
};

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Recording to export
    pub input: PathBuf,

    /// Title the output file is named after (defaults to the input file name)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Start of the exported window in seconds
    #[arg(long, default_value = "0")]
    pub trim_start: f64,

    /// End of the exported window in seconds (0 = end of the recording)
    #[arg(long, default_value = "0")]
    pub trim_end: f64,

    /// Crop rectangle in percent of the frame: x,y,width,height
    #[arg(long, value_parser = parse_crop)]
    pub crop: Option<CropArea>,

    /// Two-colour diagonal gradient background: c0,c1 (hex)
    #[arg(long, value_parser = parse_gradient, conflicts_with_all = ["preset", "image"])]
    pub gradient: Option<[Rgba; 2]>,

    /// Named gradient preset (see `snapreel check` for the list)
    #[arg(long, conflicts_with = "image")]
    pub preset: Option<String>,

    /// Background image, cover-fitted behind the video
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Padding around the video in output pixels
    #[arg(long, default_value = "0")]
    pub padding: u32,

    /// Output aspect ratio, `source` or W:H
    #[arg(long, default_value = "source")]
    pub aspect: AspectRatio,

    /// Directory the export is written to (defaults to the downloads directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Pace frame production at the display refresh rate instead of as fast as possible
    #[arg(long)]
    pub realtime: bool,
}

fn parse_crop(value: &str) -> Result<CropArea, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid crop {value:?}: {e}"))?;
    match parts.as_slice() {
        &[x, y, w, h] => Ok(CropArea::new(x, y, w, h)),
        _ => Err(format!("invalid crop {value:?}, expected x,y,width,height")),
    }
}

fn parse_gradient(value: &str) -> Result<[Rgba; 2], String> {
    let (a, b) = value
        .split_once(',')
        .ok_or_else(|| format!("invalid gradient {value:?}, expected c0,c1"))?;
    let a: Rgba = a.trim().parse().map_err(|e| format!("{e}"))?;
    let b: Rgba = b.trim().parse().map_err(|e| format!("{e}"))?;
    Ok([a, b])
}

pub async fn run(config: &AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    println!("Exporting: {}", args.input.display());

    let mut background = BackgroundSelection::default();
    if let Some(colors) = args.gradient {
        background.select_gradient(colors);
    }
    if let Some(id) = args.preset.as_deref() {
        let preset = preset_gradient(id).ok_or_else(|| {
            let known: Vec<&str> = PRESET_GRADIENTS.iter().map(|p| p.id).collect();
            anyhow::anyhow!("Unknown preset: {id}. Use one of: {}", known.join(", "))
        })?;
        background.select_gradient(preset.colors);
    }
    if let Some(image) = args.image.as_ref() {
        background.select_image(image.to_string_lossy());
    }

    let title = args.title.clone().or_else(|| {
        args.input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    });

    let options = ExportOptions {
        background: background.spec(),
        padding: args.padding,
        crop_area: args.crop,
        trim_start: args.trim_start,
        trim_end: args.trim_end,
        aspect_ratio: args.aspect,
        file_name: title,
    };

    let mut source = FfmpegMediaElement::open(&args.input).await?;
    let (width, height) = source.natural_size();
    println!(
        "  Source: {width}x{height}, {} ({})",
        format_time(source.duration()),
        source.mime_type()
    );

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.downloads_dir.clone());
    println!("  Output directory: {}", output_dir.display());

    let mut engine = ExportEngine::new(
        config.export.clone(),
        Arc::new(FfmpegEncoderBackend::new()),
        Arc::new(DirectorySink::new(output_dir)),
    );
    if args.realtime {
        let playback = config.playback.clone();
        engine = engine.with_ticker(Box::new(move || -> Box<dyn TickSource> {
            Box::new(DisplayTicker::for_playback(&playback))
        }));
    }

    let cancel = engine.cancel_handle();
    let progress_cb: ProgressCallback = Box::new(|p| {
        print!(
            "\r  Progress: {:>3}% ({} frames, {:?})  ",
            p.percent, p.frames_encoded, p.state
        );
        let _ = std::io::stdout().flush();
    });

    let export = engine.export_video(&mut source, &options, Some(progress_cb));
    tokio::pin!(export);
    let result = loop {
        tokio::select! {
            result = &mut export => break result,
            _ = tokio::signal::ctrl_c() => {
                println!("\n  Cancelling...");
                cancel.cancel();
            }
        }
    };

    match result {
        Ok(ExportOutcome::Completed { path, frames, .. }) => {
            println!("\nExport complete: {} ({frames} frames)", path.display());
            Ok(())
        }
        Ok(ExportOutcome::Cancelled) => {
            println!("\nExport cancelled");
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Export failed: {e}"))
        }
    }
}
