//! Thumbnail stage: evenly spaced frame grabs, scored for pick quality.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use pf_av::{media_duration, ToolCommand};
use pf_core::config::{ThumbnailFormat, ThumbnailsConfig};
use pf_core::report::round2;
use pf_core::{AgentPayload, Error};

use crate::agent::{Agent, AgentContext};

/// Bound on each single-frame extraction.
const FRAME_TIMEOUT: Duration = Duration::from_secs(30);

/// Extracts thumbnails spread across the video and scores each frame.
pub struct ThumbnailsAgent;

#[async_trait]
impl Agent for ThumbnailsAgent {
    fn name(&self) -> &'static str {
        "thumbnails"
    }

    async fn validate(&self, ctx: &AgentContext) -> pf_core::Result<()> {
        super::ensure_input_file(self.name(), &ctx.input_path)?;
        ctx.tools.require("ffmpeg")?;
        ctx.tools.require("ffprobe")?;
        Ok(())
    }

    async fn execute(&self, ctx: &AgentContext) -> pf_core::Result<AgentPayload> {
        let cfg = &ctx.config.thumbnails;
        let ffmpeg = ctx.tools.require("ffmpeg")?;

        let thumb_dir = ctx.output_dir.join("thumbnails");
        std::fs::create_dir_all(&thumb_dir)?;

        let duration = media_duration(&ctx.tools, &ctx.input_path).await?;
        let timestamps = calculate_timestamps(duration, cfg.count);
        info!(
            duration_secs = duration,
            count = cfg.count,
            "extracting thumbnails"
        );

        let ext = cfg.format.extension();
        let mut paths = Vec::new();
        let mut scores = Vec::new();
        let mut kept_timestamps = Vec::new();

        for (i, &ts) in timestamps.iter().enumerate() {
            let out_path = thumb_dir.join(format!("thumb_{:02}.{ext}", i + 1));
            debug!(timestamp = ts, path = %out_path.display(), "extracting frame");

            match extract_frame(&ffmpeg.path, &ctx.input_path, ts, &out_path, cfg).await {
                Ok(()) if out_path.is_file() => {
                    scores.push(score_thumbnail(&out_path));
                    paths.push(out_path);
                    kept_timestamps.push(ts);
                }
                Ok(()) => warn!(timestamp = ts, "extraction produced no file, skipping"),
                Err(e) => warn!(timestamp = ts, error = %e, "frame extraction failed, skipping"),
            }
        }

        if paths.is_empty() {
            return Err(Error::agent(self.name(), "no thumbnails were generated"));
        }
        info!(generated = paths.len(), "thumbnails ready");

        Ok(AgentPayload::Thumbnails {
            paths,
            scores,
            timestamps: kept_timestamps,
        })
    }
}

/// Evenly spaced grab points with a 5% margin at each end; a single
/// thumbnail comes from the midpoint.
fn calculate_timestamps(duration: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![round2(duration / 2.0)];
    }
    let margin = duration * 0.05;
    let interval = (duration - 2.0 * margin) / (count as f64 - 1.0);
    (0..count)
        .map(|i| round2(margin + i as f64 * interval))
        .collect()
}

async fn extract_frame(
    ffmpeg: &Path,
    input: &Path,
    timestamp: f64,
    out_path: &Path,
    cfg: &ThumbnailsConfig,
) -> pf_core::Result<()> {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.arg("-y")
        .arg("-hide_banner")
        .arg("-ss")
        .arg(timestamp.to_string())
        .arg("-i")
        .arg(input.to_string_lossy())
        .arg("-vframes")
        .arg("1")
        .arg("-vf")
        .arg(format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = cfg.width,
            h = cfg.height
        ));
    match cfg.format {
        ThumbnailFormat::Jpg => {
            cmd.arg("-qscale:v").arg(jpeg_qscale(cfg.quality).to_string());
        }
        ThumbnailFormat::Webp => {
            cmd.arg("-c:v")
                .arg("libwebp")
                .arg("-quality")
                .arg(cfg.quality.to_string());
        }
        ThumbnailFormat::Png => {}
    }
    cmd.arg("-loglevel")
        .arg("error")
        .arg(out_path.to_string_lossy())
        .timeout(FRAME_TIMEOUT);
    cmd.execute().await?;
    Ok(())
}

/// Map a 1-100 quality to ffmpeg's inverted 1-31 JPEG qscale.
fn jpeg_qscale(quality: u32) -> u32 {
    ((31.0 - (quality as f64 / 100.0 * 30.0)) as u32).max(1)
}

/// Score a frame in [0, 1]: mid exposure and high luma spread read as a
/// usable thumbnail. An undecodable file scores zero.
fn score_thumbnail(path: &Path) -> f64 {
    let image = match image::open(path) {
        Ok(image) => image,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not decode frame for scoring");
            return 0.0;
        }
    };
    let luma = image.to_luma8();
    let pixels = luma.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    let n = pixels.len() as f64;
    let mean = pixels.iter().map(|&p| f64::from(p)).sum::<f64>() / n / 255.0;
    let variance = pixels
        .iter()
        .map(|&p| {
            let v = f64::from(p) / 255.0 - mean;
            v * v
        })
        .sum::<f64>()
        / n;
    let exposure = 1.0 - (mean - 0.5).abs() * 2.0;
    let spread = (variance.sqrt() / 0.5).min(1.0);
    round2((exposure * 0.5 + spread * 0.5).clamp(0.0, 1.0))
}
