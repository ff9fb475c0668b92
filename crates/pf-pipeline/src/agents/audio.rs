//! Audio stage: EQ, compression, and loudness normalization in one ffmpeg
//! pass.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use pf_av::ToolCommand;
use pf_core::config::AudioConfig;
use pf_core::{AgentPayload, Error};

use crate::agent::{Agent, AgentContext};

/// Extracts the audio track, cleans it up, and normalizes loudness.
pub struct AudioAgent;

#[async_trait]
impl Agent for AudioAgent {
    fn name(&self) -> &'static str {
        "audio"
    }

    async fn validate(&self, ctx: &AgentContext) -> pf_core::Result<()> {
        super::ensure_input_file(self.name(), &ctx.input_path)?;
        ctx.tools.require("ffmpeg")?;
        Ok(())
    }

    async fn execute(&self, ctx: &AgentContext) -> pf_core::Result<AgentPayload> {
        let cfg = &ctx.config.audio;
        let ffmpeg = ctx.tools.require("ffmpeg")?;
        std::fs::create_dir_all(&ctx.output_dir)?;

        let stem = ctx
            .input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input");
        let output_path = ctx.output_dir.join(format!("{stem}_audio_normalized.wav"));

        let filter_chain = build_filter_chain(cfg);
        debug!(filter = %filter_chain, "audio filter chain");

        // loudnorm prints its measurement JSON on stderr at info level, so
        // the log level stays default here.
        let output = ToolCommand::new(ffmpeg.path.clone())
            .arg("-y")
            .arg("-hide_banner")
            .arg("-i")
            .arg(ctx.input_path.to_string_lossy())
            .arg("-vn")
            .arg("-af")
            .arg(&filter_chain)
            .arg("-ar")
            .arg(cfg.sample_rate_hz.to_string())
            .arg("-ac")
            .arg("2")
            .arg("-c:a")
            .arg("pcm_s16le")
            .arg(output_path.to_string_lossy())
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .execute()
            .await?;

        if !output_path.is_file() {
            return Err(Error::agent(
                self.name(),
                "ffmpeg reported success but produced no audio output",
            ));
        }

        let stats = parse_loudnorm_stats(&output.stderr);
        info!(
            output = %output_path.display(),
            input_lufs = ?stats.input_i,
            "audio normalized"
        );

        Ok(AgentPayload::Audio {
            output_path,
            input_loudness_lufs: stats.input_i,
            input_true_peak_db: stats.input_tp,
            input_loudness_range_lu: stats.input_lra,
        })
    }
}

/// Fixed cleanup chain ending in loudness normalization toward the
/// configured targets.
fn build_filter_chain(cfg: &AudioConfig) -> String {
    format!(
        "highpass=f=80,lowpass=f=12000,equalizer=f=3000:t=q:w=1.5:g=2,\
         acompressor=threshold=-20dB:ratio=3:attack=5:release=50,\
         loudnorm=I={}:TP={}:LRA={}:print_format=json",
        cfg.target_loudness_lufs, cfg.true_peak_db, cfg.loudness_range_lu
    )
}

#[derive(Debug, Default, PartialEq)]
struct LoudnessStats {
    input_i: Option<f64>,
    input_tp: Option<f64>,
    input_lra: Option<f64>,
}

/// Pull the measured input stats out of loudnorm's JSON block on stderr.
///
/// The block is optional; ffmpeg builds differ in what they print, so a
/// missing or unparseable block yields empty stats rather than an error.
fn parse_loudnorm_stats(stderr: &str) -> LoudnessStats {
    for (start, _) in stderr.match_indices('{') {
        let Some(rel_end) = stderr[start..].find('}') else {
            break;
        };
        let block = &stderr[start..start + rel_end + 1];
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(block) {
            if value.get("input_i").is_some() {
                return LoudnessStats {
                    input_i: field_f64(&value, "input_i"),
                    input_tp: field_f64(&value, "input_tp"),
                    input_lra: field_f64(&value, "input_lra"),
                };
            }
        }
    }
    LoudnessStats::default()
}

/// loudnorm emits numbers as JSON strings; accept either form, and drop
/// non-finite readings (silence measures as `-inf`).
fn field_f64(value: &serde_json::Value, key: &str) -> Option<f64> {
    let parsed = match value.get(key)? {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
