//! Caption stage: whisper transcription rendered as an SRT file.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use pf_av::ToolCommand;
use pf_core::{AgentPayload, Error};

use crate::agent::{Agent, AgentContext};

/// Bound on the transcription-audio extraction pass.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(120);

/// Transcribes the input's audio and writes subtitles.
///
/// Burn-in happens in the video stage; this stage only produces the SRT
/// and hands it off.
pub struct CaptionsAgent;

#[async_trait]
impl Agent for CaptionsAgent {
    fn name(&self) -> &'static str {
        "captions"
    }

    async fn validate(&self, ctx: &AgentContext) -> pf_core::Result<()> {
        super::ensure_input_file(self.name(), &ctx.input_path)?;
        ctx.tools.require("ffmpeg")?;
        ctx.tools.require("whisper")?;
        Ok(())
    }

    async fn execute(&self, ctx: &AgentContext) -> pf_core::Result<AgentPayload> {
        let cfg = &ctx.config.captions;
        std::fs::create_dir_all(&ctx.output_dir)?;

        let stem = ctx
            .input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input");
        let srt_path = ctx.output_dir.join(format!("{stem}_captions.srt"));

        // Whisper wants 16 kHz mono; stage it in a temp dir that also
        // receives the transcript JSON.
        let workdir = tempfile::tempdir()?;
        let wav_path = workdir.path().join("transcribe.wav");

        let ffmpeg = ctx.tools.require("ffmpeg")?;
        ToolCommand::new(ffmpeg.path.clone())
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(ctx.input_path.to_string_lossy())
            .arg("-vn")
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg("-c:a")
            .arg("pcm_s16le")
            .arg(wav_path.to_string_lossy())
            .timeout(EXTRACT_TIMEOUT)
            .execute()
            .await?;

        let whisper = ctx.tools.require("whisper")?;
        info!(model = cfg.whisper_model.as_str(), "transcribing audio");
        ToolCommand::new(whisper.path.clone())
            .arg(wav_path.to_string_lossy())
            .arg("--model")
            .arg(cfg.whisper_model.as_str())
            .arg("--language")
            .arg(&cfg.language)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(workdir.path().to_string_lossy())
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .execute()
            .await?;

        let transcript_path = workdir.path().join("transcribe.json");
        if !transcript_path.is_file() {
            return Err(Error::agent(self.name(), "whisper produced no transcript"));
        }
        let transcript: Transcript =
            serde_json::from_str(&std::fs::read_to_string(&transcript_path)?)
                .map_err(|e| Error::parse("whisper transcript", e.to_string()))?;
        debug!(segments = transcript.segments.len(), "transcript parsed");

        let entries = build_entries(
            &transcript.segments,
            cfg.max_words_per_line,
            cfg.max_chars_per_line,
        );
        let word_count = transcript
            .segments
            .iter()
            .map(|s| s.text.split_whitespace().count())
            .sum();

        std::fs::write(&srt_path, render_srt(&entries))?;
        info!(
            srt = %srt_path.display(),
            entries = entries.len(),
            "captions written"
        );

        Ok(AgentPayload::Captions {
            srt_path,
            entry_count: entries.len(),
            word_count,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Transcript {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Deserialize)]
struct TranscriptSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Clone, PartialEq)]
struct SrtEntry {
    start: f64,
    end: f64,
    text: String,
}

/// Split every segment into display lines and spread each segment's time
/// span across its lines in proportion to character length.
fn build_entries(
    segments: &[TranscriptSegment],
    max_words: usize,
    max_chars: usize,
) -> Vec<SrtEntry> {
    let mut entries = Vec::new();
    for segment in segments {
        let lines = split_lines(&segment.text, max_words, max_chars);
        if lines.is_empty() {
            continue;
        }
        let total_chars: usize = lines.iter().map(String::len).sum();
        let span = (segment.end - segment.start).max(0.0);
        let mut consumed = 0usize;
        for line in lines {
            let begin = segment.start + span * consumed as f64 / total_chars as f64;
            consumed += line.len();
            let finish = segment.start + span * consumed as f64 / total_chars as f64;
            entries.push(SrtEntry {
                start: begin,
                end: finish,
                text: line,
            });
        }
    }
    entries
}

/// Greedy word fill: a line flushes once it reaches the word limit or its
/// joined text reaches the character limit. A single overlong word still
/// becomes its own line.
fn split_lines(text: &str, max_words: usize, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        current_len = if current.is_empty() {
            word.len()
        } else {
            current_len + 1 + word.len()
        };
        current.push(word);
        if current.len() >= max_words || current_len >= max_chars {
            lines.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
    }
    if !current.is_empty() {
        lines.push(current.join(" "));
    }
    lines
}

fn render_srt(entries: &[SrtEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(entry.start),
            format_timestamp(entry.end),
            entry.text
        ));
    }
    out
}

/// `HH:MM:SS,mmm`, rounded to the millisecond.
fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1_000;
    let millis = total_millis % 1_000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::run_agent;
    use pf_core::PipelineConfig;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn timestamps_render_as_srt() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(3661.5), "01:01:01,500");
        assert_eq!(format_timestamp(59.9996), "00:01:00,000");
        assert_eq!(format_timestamp(-1.0), "00:00:00,000");
    }

    #[test]
    fn lines_flush_at_the_word_limit() {
        let lines = split_lines("a b c d e f g h i j k l", 5, 100);
        assert_eq!(lines, vec!["a b c d e", "f g h i j", "k l"]);
    }

    #[test]
    fn lines_flush_at_the_char_limit() {
        let lines = split_lines("alpha beta gamma delta", 100, 10);
        // Flush happens after the word that crosses the limit is appended.
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn an_overlong_word_stands_alone() {
        let lines = split_lines("supercalifragilisticexpialidocious ok", 10, 8);
        assert_eq!(lines, vec!["supercalifragilisticexpialidocious", "ok"]);
    }

    #[test]
    fn short_segment_keeps_its_own_timing() {
        let entries = build_entries(&[seg(1.0, 3.0, " hello world ")], 10, 42);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start, 1.0);
        assert_eq!(entries[0].end, 3.0);
        assert_eq!(entries[0].text, "hello world");
    }

    #[test]
    fn split_segment_time_is_apportioned_by_length() {
        // Two equal-length lines split the span in half.
        let entries = build_entries(&[seg(0.0, 4.0, "aa bb cc dd")], 2, 100);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "aa bb");
        assert_eq!(entries[0].start, 0.0);
        assert!((entries[0].end - 2.0).abs() < 1e-9);
        assert!((entries[1].start - 2.0).abs() < 1e-9);
        assert_eq!(entries[1].end, 4.0);
    }

    #[test]
    fn entry_times_are_monotonic_across_segments() {
        let entries = build_entries(
            &[
                seg(0.0, 5.0, "one two three four five six seven eight"),
                seg(5.0, 9.0, "nine ten eleven twelve"),
            ],
            3,
            100,
        );
        for pair in entries.windows(2) {
            assert!(pair[0].end <= pair[1].start + 1e-9);
        }
        assert_eq!(entries.last().unwrap().end, 9.0);
    }

    #[test]
    fn blank_segments_produce_no_entries() {
        let entries = build_entries(&[seg(0.0, 2.0, "   ")], 10, 42);
        assert!(entries.is_empty());
    }

    #[test]
    fn srt_rendering_numbers_from_one() {
        let entries = vec![
            SrtEntry {
                start: 0.0,
                end: 1.5,
                text: "first".to_string(),
            },
            SrtEntry {
                start: 1.5,
                end: 3.0,
                text: "second".to_string(),
            },
        ];
        let srt = render_srt(&entries);
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,500\nfirst\n\n"));
        assert!(srt.contains("2\n00:00:01,500 --> 00:00:03,000\nsecond\n\n"));
    }

    #[test]
    fn empty_transcript_renders_an_empty_file() {
        assert_eq!(render_srt(&[]), "");
    }

    #[tokio::test]
    async fn missing_whisper_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"x").unwrap();
        let mut tools = pf_av::ToolRegistry::default();
        tools.insert("ffmpeg", PathBuf::from("echo"));
        let ctx = AgentContext::new(
            input,
            dir.path().join("out"),
            Arc::new(PipelineConfig::default()),
            Arc::new(tools),
        );
        let report = run_agent(&CaptionsAgent, &ctx).await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("whisper"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn transcript_flows_through_to_srt() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"x").unwrap();

        let write_script = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };

        // Touches its last argument, like ffmpeg writing the wav.
        let fake_ffmpeg = write_script("fake_ffmpeg", "#!/bin/sh\nfor last; do :; done\n: > \"$last\"\n");
        // Emits a transcript next to the wav it was given.
        let fake_whisper = write_script(
            "fake_whisper",
            concat!(
                "#!/bin/sh\n",
                "wav=\"$1\"\n",
                "out=\"\"\n",
                "while [ $# -gt 0 ]; do\n",
                "  if [ \"$1\" = \"--output_dir\" ]; then out=\"$2\"; fi\n",
                "  shift\n",
                "done\n",
                "base=$(basename \"$wav\" .wav)\n",
                "printf '%s' '{\"segments\":[{\"id\":0,\"start\":0.0,\"end\":4.0,",
                "\"text\":\" hello world this is a caption test\"}]}' > \"$out/$base.json\"\n"
            ),
        );

        let mut tools = pf_av::ToolRegistry::default();
        tools.insert("ffmpeg", fake_ffmpeg);
        tools.insert("whisper", fake_whisper);

        let ctx = AgentContext::new(
            input,
            dir.path().join("out"),
            Arc::new(PipelineConfig::default()),
            Arc::new(tools),
        );
        let report = run_agent(&CaptionsAgent, &ctx).await;
        assert!(report.success, "error: {:?}", report.error);

        match report.payload.unwrap() {
            AgentPayload::Captions {
                srt_path,
                entry_count,
                word_count,
            } => {
                assert_eq!(entry_count, 1);
                assert_eq!(word_count, 7);
                let srt = std::fs::read_to_string(&srt_path).unwrap();
                assert!(srt.contains("00:00:00,000 --> 00:00:04,000"));
                assert!(srt.contains("hello world this is a caption test"));
                assert_eq!(
                    srt_path.file_name().unwrap().to_str().unwrap(),
                    "clip_captions.srt"
                );
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
