//! Show source media information.

use std::path::PathBuf;

use snapreel_common::AppConfig;
use snapreel_playback::{capture_still, format_time, probe_source, FfmpegMediaElement};
use snapreel_project_model::{output_file_name, AspectRatio};
use snapreel_render_engine::compositor::output_size;

pub async fn run(
    config: &AppConfig,
    input: PathBuf,
    still: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let media = probe_source(&input).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&media)?);
    } else {
        let (out_w, out_h) = output_size(
            (media.natural_width, media.natural_height),
            config.export.max_output_height,
            AspectRatio::Source,
        );

        println!("Source: {}", media.display_name());
        println!("  MIME type: {}", media.mime_type);
        println!("  Duration: {} ({:.3}s)", format_time(media.duration_secs), media.duration_secs);
        println!(
            "  Resolution: {}x{} (aspect {:.3})",
            media.natural_width,
            media.natural_height,
            media.aspect_ratio()
        );
        match media.frame_rate {
            Some(fps) => println!("  Frame rate: {fps:.2}fps"),
            None => println!("  Frame rate: unknown"),
        }
        println!();
        println!("Export defaults:");
        println!("  Canvas: {out_w}x{out_h}");
        println!(
            "  File: {}",
            output_file_name(
                input.file_stem().and_then(|s| s.to_str()),
                &config.export.default_file_name,
                media.output_container(),
            )
        );
    }

    if let Some(path) = still {
        let element = FfmpegMediaElement::open(&input).await?;
        let png = capture_still(&element)?;
        std::fs::write(&path, png)?;
        println!("Still frame written to: {}", path.display());
    }

    Ok(())
}
