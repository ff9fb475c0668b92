//! Typed pipeline configuration.
//!
//! Five sections (`audio`, `captions`, `video`, `thumbnails`, `backup`),
//! every leaf key with a documented default. Values are range-checked by
//! [`PipelineConfig::validate`], which collects every violation instead of
//! stopping at the first.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Accepted x264/x265 preset names for `video.preset`.
pub const X264_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Sample rates accepted for `audio.sample_rate_hz`.
pub const SAMPLE_RATES: &[u32] = &[44_100, 48_000, 96_000];

/// Whisper model size used for transcription.
///
/// Larger models are slower and more accurate; `tiny` is the conservative
/// fallback selected by [`SafetyProfile::Conservative`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperModel {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    /// Model name as passed to the whisper CLI `--model` flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "tiny",
            WhisperModel::Base => "base",
            WhisperModel::Small => "small",
            WhisperModel::Medium => "medium",
            WhisperModel::Large => "large",
        }
    }
}

/// Output image format for extracted thumbnails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    #[default]
    Jpg,
    Png,
    Webp,
}

impl ThumbnailFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ThumbnailFormat::Jpg => "jpg",
            ThumbnailFormat::Png => "png",
            ThumbnailFormat::Webp => "webp",
        }
    }
}

/// Conservative-defaults selector, resolved once at process startup and
/// passed explicitly into configuration resolution.
///
/// `Conservative` corresponds to `CI=true` in the environment: hardware
/// acceleration off, smallest transcription model, extended backup
/// retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SafetyProfile {
    #[default]
    Standard,
    Conservative,
}

impl SafetyProfile {
    /// Read the `CI` environment flag. Call once at the binary boundary;
    /// resolution itself never touches the environment.
    pub fn from_env() -> Self {
        match std::env::var("CI") {
            Ok(v) if v.eq_ignore_ascii_case("true") => SafetyProfile::Conservative,
            _ => SafetyProfile::Standard,
        }
    }
}

/// Effective pipeline configuration, one instance per run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub captions: CaptionsConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub thumbnails: ThumbnailsConfig,

    #[serde(default)]
    pub backup: BackupConfig,
}

/// Loudness normalization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Integrated loudness target in LUFS.
    #[serde(default = "default_target_loudness")]
    pub target_loudness_lufs: f64,

    /// True peak ceiling in dBTP.
    #[serde(default = "default_true_peak")]
    pub true_peak_db: f64,

    /// Loudness range target in LU.
    #[serde(default = "default_loudness_range")]
    pub loudness_range_lu: f64,

    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,

    #[serde(default = "default_audio_timeout")]
    pub timeout_secs: u64,
}

fn default_target_loudness() -> f64 {
    -16.0
}
fn default_true_peak() -> f64 {
    -1.5
}
fn default_loudness_range() -> f64 {
    11.0
}
fn default_sample_rate() -> u32 {
    48_000
}
fn default_audio_timeout() -> u64 {
    300
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_loudness_lufs: default_target_loudness(),
            true_peak_db: default_true_peak(),
            loudness_range_lu: default_loudness_range(),
            sample_rate_hz: default_sample_rate(),
            timeout_secs: default_audio_timeout(),
        }
    }
}

/// Transcription and subtitle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptionsConfig {
    #[serde(default)]
    pub whisper_model: WhisperModel,

    #[serde(default = "default_language")]
    pub language: String,

    /// Maximum words per rendered subtitle line.
    #[serde(default = "default_max_words")]
    pub max_words_per_line: usize,

    /// Maximum characters per rendered subtitle line.
    #[serde(default = "default_max_chars")]
    pub max_chars_per_line: usize,

    /// Burn the subtitles into the enhanced video.
    #[serde(default)]
    pub burn_captions: bool,

    /// Font size used when burning captions.
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// ASS-style primary color used when burning captions.
    #[serde(default = "default_font_color")]
    pub font_color: String,

    #[serde(default = "default_captions_timeout")]
    pub timeout_secs: u64,
}

fn default_language() -> String {
    "en".to_string()
}
fn default_max_words() -> usize {
    10
}
fn default_max_chars() -> usize {
    42
}
fn default_font_size() -> u32 {
    24
}
fn default_font_color() -> String {
    "&HFFFFFF&".to_string()
}
fn default_captions_timeout() -> u64 {
    600
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            whisper_model: WhisperModel::default(),
            language: default_language(),
            max_words_per_line: default_max_words(),
            max_chars_per_line: default_max_chars(),
            burn_captions: false,
            font_size: default_font_size(),
            font_color: default_font_color(),
            timeout_secs: default_captions_timeout(),
        }
    }
}

/// Color grading and encoding settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    /// Prefer the hardware encoder when ffmpeg reports it available.
    #[serde(default = "default_true")]
    pub hardware_acceleration: bool,

    #[serde(default = "default_hardware_encoder")]
    pub hardware_encoder: String,

    /// Target bitrate when hardware encoding (ffmpeg `-b:v` syntax).
    #[serde(default = "default_hardware_bitrate")]
    pub hardware_bitrate: String,

    #[serde(default = "default_software_encoder")]
    pub software_encoder: String,

    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant rate factor for software encoding.
    #[serde(default = "default_crf")]
    pub crf: u32,

    #[serde(default)]
    pub brightness: f64,

    #[serde(default = "default_unit")]
    pub contrast: f64,

    #[serde(default = "default_unit")]
    pub saturation: f64,

    /// Apply a light hqdn3d denoise pass.
    #[serde(default)]
    pub denoise: bool,

    /// Optional 3D LUT to apply (.cube, .3dl, .dat, .m3d, .csp).
    #[serde(default)]
    pub lut_path: Option<PathBuf>,

    #[serde(default = "default_video_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_hardware_encoder() -> String {
    "h264_videotoolbox".to_string()
}
fn default_hardware_bitrate() -> String {
    "10M".to_string()
}
fn default_software_encoder() -> String {
    "libx264".to_string()
}
fn default_preset() -> String {
    "fast".to_string()
}
fn default_crf() -> u32 {
    18
}
fn default_unit() -> f64 {
    1.0
}
fn default_video_timeout() -> u64 {
    1800
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            hardware_acceleration: true,
            hardware_encoder: default_hardware_encoder(),
            hardware_bitrate: default_hardware_bitrate(),
            software_encoder: default_software_encoder(),
            preset: default_preset(),
            crf: default_crf(),
            brightness: 0.0,
            contrast: default_unit(),
            saturation: default_unit(),
            denoise: false,
            lut_path: None,
            timeout_secs: default_video_timeout(),
        }
    }
}

/// Thumbnail extraction settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThumbnailsConfig {
    /// Number of thumbnails spread across the video duration.
    #[serde(default = "default_count")]
    pub count: usize,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default)]
    pub format: ThumbnailFormat,

    /// Encoder quality, 1-100 (jpg and webp only).
    #[serde(default = "default_quality")]
    pub quality: u32,
}

fn default_count() -> usize {
    6
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_quality() -> u32 {
    95
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            width: default_width(),
            height: default_height(),
            format: ThumbnailFormat::default(),
            quality: default_quality(),
        }
    }
}

/// Input backup and retention settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Backup directory; relative paths resolve under the output directory.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Entries older than this are evicted after each backup.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Entries beyond this count are evicted oldest-first after each backup.
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".backups")
}
fn default_retention_days() -> u32 {
    7
}
fn default_max_count() -> usize {
    10
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backup_dir: default_backup_dir(),
            retention_days: default_retention_days(),
            max_count: default_max_count(),
        }
    }
}

impl PipelineConfig {
    /// Range-check every leaf value, returning all violations.
    ///
    /// An empty vector means the configuration is valid. Messages are
    /// prefixed with the `section.key` they refer to.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let a = &self.audio;
        if !(-70.0..=-5.0).contains(&a.target_loudness_lufs) {
            violations.push(format!(
                "audio.target_loudness_lufs: {} is outside -70..=-5",
                a.target_loudness_lufs
            ));
        }
        if !(-9.0..=0.0).contains(&a.true_peak_db) {
            violations.push(format!(
                "audio.true_peak_db: {} is outside -9..=0",
                a.true_peak_db
            ));
        }
        if !(1.0..=20.0).contains(&a.loudness_range_lu) {
            violations.push(format!(
                "audio.loudness_range_lu: {} is outside 1..=20",
                a.loudness_range_lu
            ));
        }
        if !SAMPLE_RATES.contains(&a.sample_rate_hz) {
            violations.push(format!(
                "audio.sample_rate_hz: {} is not one of 44100, 48000, 96000",
                a.sample_rate_hz
            ));
        }
        if a.timeout_secs == 0 {
            violations.push("audio.timeout_secs: must be at least 1".to_string());
        }

        let c = &self.captions;
        if c.language.is_empty() {
            violations.push("captions.language: must not be empty".to_string());
        }
        if c.max_words_per_line == 0 {
            violations.push("captions.max_words_per_line: must be at least 1".to_string());
        }
        if c.max_chars_per_line < 8 {
            violations.push(format!(
                "captions.max_chars_per_line: {} is below the minimum of 8",
                c.max_chars_per_line
            ));
        }
        if !(8..=128).contains(&c.font_size) {
            violations.push(format!(
                "captions.font_size: {} is outside 8..=128",
                c.font_size
            ));
        }
        if c.font_color.is_empty() {
            violations.push("captions.font_color: must not be empty".to_string());
        }
        if c.timeout_secs == 0 {
            violations.push("captions.timeout_secs: must be at least 1".to_string());
        }

        let v = &self.video;
        if v.crf > 51 {
            violations.push(format!("video.crf: {} is outside 0..=51", v.crf));
        }
        if !X264_PRESETS.contains(&v.preset.as_str()) {
            violations.push(format!("video.preset: `{}` is not a known preset", v.preset));
        }
        if v.hardware_encoder.is_empty() {
            violations.push("video.hardware_encoder: must not be empty".to_string());
        }
        if v.hardware_bitrate.is_empty() {
            violations.push("video.hardware_bitrate: must not be empty".to_string());
        }
        if v.software_encoder.is_empty() {
            violations.push("video.software_encoder: must not be empty".to_string());
        }
        if !(-1.0..=1.0).contains(&v.brightness) {
            violations.push(format!(
                "video.brightness: {} is outside -1..=1",
                v.brightness
            ));
        }
        if !(0.0..=2.0).contains(&v.contrast) {
            violations.push(format!("video.contrast: {} is outside 0..=2", v.contrast));
        }
        if !(0.0..=3.0).contains(&v.saturation) {
            violations.push(format!(
                "video.saturation: {} is outside 0..=3",
                v.saturation
            ));
        }
        if v.timeout_secs == 0 {
            violations.push("video.timeout_secs: must be at least 1".to_string());
        }

        let t = &self.thumbnails;
        if t.count == 0 {
            violations.push("thumbnails.count: must be at least 1".to_string());
        }
        if t.width < 16 {
            violations.push(format!(
                "thumbnails.width: {} is below the minimum of 16",
                t.width
            ));
        }
        if t.height < 16 {
            violations.push(format!(
                "thumbnails.height: {} is below the minimum of 16",
                t.height
            ));
        }
        if !(1..=100).contains(&t.quality) {
            violations.push(format!(
                "thumbnails.quality: {} is outside 1..=100",
                t.quality
            ));
        }

        let b = &self.backup;
        if b.backup_dir.as_os_str().is_empty() {
            violations.push("backup.backup_dir: must not be empty".to_string());
        }
        if b.retention_days == 0 {
            violations.push("backup.retention_days: must be at least 1".to_string());
        }
        if b.max_count == 0 {
            violations.push("backup.max_count: must be at least 1".to_string());
        }

        violations
    }
}
