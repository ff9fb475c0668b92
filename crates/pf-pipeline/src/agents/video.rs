//! Video stage: color grading, optional caption burn-in, and re-encoding.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use pf_av::{ToolCommand, ToolRegistry};
use pf_core::config::{CaptionsConfig, VideoConfig};
use pf_core::{AgentPayload, Error};

use crate::agent::{Agent, AgentContext};

/// LUT container formats ffmpeg's lut3d filter accepts.
const SUPPORTED_LUT_FORMATS: &[&str] = &["cube", "3dl", "dat", "m3d", "csp"];

/// Bound on the `-encoders` capability probe.
const ENCODER_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Re-encodes the input with grading filters, muxing in the normalized
/// audio track and burning captions when asked to.
pub struct VideoAgent;

#[async_trait]
impl Agent for VideoAgent {
    fn name(&self) -> &'static str {
        "video"
    }

    async fn validate(&self, ctx: &AgentContext) -> pf_core::Result<()> {
        super::ensure_input_file(self.name(), &ctx.input_path)?;
        ctx.tools.require("ffmpeg")?;
        Ok(())
    }

    async fn execute(&self, ctx: &AgentContext) -> pf_core::Result<AgentPayload> {
        let cfg = &ctx.config.video;
        let ffmpeg = ctx.tools.require("ffmpeg")?;
        std::fs::create_dir_all(&ctx.output_dir)?;

        let stem = ctx
            .input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input");
        let output_path = ctx.output_dir.join(format!("{stem}_enhanced.mp4"));

        let lut = usable_lut(cfg.lut_path.as_deref());
        let burn_srt = if ctx.config.captions.burn_captions {
            ctx.handoff
                .captions_srt
                .as_deref()
                .filter(|p| p.is_file())
        } else {
            None
        };
        let audio_track = ctx.handoff.audio_track.as_deref().filter(|p| p.is_file());

        let filter_chain = build_filter_chain(cfg, lut, burn_srt, &ctx.config.captions);
        let use_hardware = cfg.hardware_acceleration
            && hardware_encoder_available(&ctx.tools, &cfg.hardware_encoder).await;
        let encoder = if use_hardware {
            cfg.hardware_encoder.clone()
        } else {
            cfg.software_encoder.clone()
        };
        info!(encoder = %encoder, "encoding video");

        let mut cmd = ToolCommand::new(ffmpeg.path.clone());
        cmd.arg("-y")
            .arg("-hide_banner")
            .arg("-i")
            .arg(ctx.input_path.to_string_lossy());
        match audio_track {
            Some(track) => {
                debug!(track = %track.display(), "muxing normalized audio");
                cmd.arg("-i")
                    .arg(track.to_string_lossy())
                    .arg("-map")
                    .arg("0:v:0")
                    .arg("-map")
                    .arg("1:a:0");
            }
            None => {
                cmd.arg("-map").arg("0:v").arg("-map").arg("0:a?");
            }
        }
        if !filter_chain.is_empty() {
            debug!(filter = %filter_chain, "video filter chain");
            cmd.arg("-vf").arg(&filter_chain);
        }
        if use_hardware {
            cmd.arg("-c:v")
                .arg(&cfg.hardware_encoder)
                .arg("-b:v")
                .arg(&cfg.hardware_bitrate);
        } else {
            cmd.arg("-c:v")
                .arg(&cfg.software_encoder)
                .arg("-preset")
                .arg(&cfg.preset)
                .arg("-crf")
                .arg(cfg.crf.to_string());
        }
        cmd.arg("-c:a")
            .arg("aac")
            .arg("-b:a")
            .arg("192k")
            .arg("-movflags")
            .arg("+faststart")
            .arg("-loglevel")
            .arg("error")
            .arg(output_path.to_string_lossy())
            .timeout(Duration::from_secs(cfg.timeout_secs));
        cmd.execute().await?;

        if !output_path.is_file() {
            return Err(Error::agent(
                self.name(),
                "ffmpeg reported success but produced no video output",
            ));
        }

        Ok(AgentPayload::Video {
            output_path,
            encoder,
            lut_applied: lut.is_some(),
            audio_muxed: audio_track.is_some(),
            captions_burned: burn_srt.is_some(),
        })
    }
}

/// A configured LUT is only used when it exists and its extension is one
/// ffmpeg accepts; anything else is skipped with a warning.
fn usable_lut(lut_path: Option<&Path>) -> Option<&Path> {
    let path = lut_path?;
    if !path.is_file() {
        warn!(lut = %path.display(), "LUT file not found, skipping color grade");
        return None;
    }
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_LUT_FORMATS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !supported {
        warn!(lut = %path.display(), "unsupported LUT format, skipping color grade");
        return None;
    }
    Some(path)
}

fn build_filter_chain(
    video: &VideoConfig,
    lut: Option<&Path>,
    burn_srt: Option<&Path>,
    captions: &CaptionsConfig,
) -> String {
    let mut filters = Vec::new();

    if let Some(lut) = lut {
        filters.push(format!(
            "lut3d='{}':interp=trilinear",
            escape_filter_path(lut)
        ));
    }
    if video.brightness != 0.0 || video.contrast != 1.0 || video.saturation != 1.0 {
        filters.push(format!(
            "eq=contrast={}:brightness={}:saturation={}",
            video.contrast, video.brightness, video.saturation
        ));
    }
    if video.denoise {
        filters.push("hqdn3d=1.5:1.5:6:6".to_string());
    }
    if let Some(srt) = burn_srt {
        filters.push(format!(
            "subtitles='{}':force_style='FontSize={},PrimaryColour={}'",
            escape_filter_path(srt),
            captions.font_size,
            captions.font_color
        ));
    }

    filters.join(",")
}

/// ffmpeg filter arguments treat `:` as an option separator and `\` as an
/// escape, so paths embedded in a filter need both rewritten.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").replace(':', "\\:")
}

/// Whether the configured hardware encoder shows up in `ffmpeg -encoders`.
/// Probe trouble of any kind reads as unavailable.
async fn hardware_encoder_available(tools: &ToolRegistry, encoder: &str) -> bool {
    let Ok(ffmpeg) = tools.require("ffmpeg") else {
        return false;
    };
    let probe = ToolCommand::new(ffmpeg.path.clone())
        .arg("-hide_banner")
        .arg("-encoders")
        .timeout(ENCODER_PROBE_TIMEOUT)
        .execute()
        .await;
    match probe {
        Ok(output) => output.stdout.contains(encoder),
        Err(e) => {
            debug!(error = %e, "encoder probe failed, assuming software");
            false
        }
    }
}
