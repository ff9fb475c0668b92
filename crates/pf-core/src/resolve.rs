//! Configuration resolution.
//!
//! Layers built-in defaults, an optional base file, an optional override
//! file, and a caller-supplied override mapping into one effective
//! [`PipelineConfig`]: later sources win key-by-key, never whole-section
//! overwrite. The merged document is then schema-checked, collecting every
//! violation. Resolution is deterministic and reads nothing but its
//! arguments.

use crate::config::{PipelineConfig, SafetyProfile};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The effective configuration plus the base path recorded in the
/// processing log.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: PipelineConfig,
    pub config_path: Option<PathBuf>,
}

/// Resolve the effective configuration for one run.
///
/// With no base path, the built-in defaults document is the base. A given
/// but missing file fails with [`Error::ConfigNotFound`]; any schema
/// violation fails with [`Error::ConfigSchema`] carrying the full list.
pub fn resolve(
    base_path: Option<&Path>,
    override_path: Option<&Path>,
    overrides: Option<&Value>,
    profile: SafetyProfile,
) -> Result<ResolvedConfig> {
    let defaults = serde_json::to_value(PipelineConfig::default())?;
    let mut merged = defaults.clone();

    if let Some(path) = base_path {
        deep_merge(&mut merged, load_document(path)?);
        debug!(path = %path.display(), "merged base config");
    }
    if let Some(path) = override_path {
        deep_merge(&mut merged, load_document(path)?);
        debug!(path = %path.display(), "merged override config");
    }
    if let Some(value) = overrides {
        deep_merge(&mut merged, value.clone());
        debug!("merged caller overrides");
    }

    apply_profile(&mut merged, profile);

    let mut violations = Vec::new();
    collect_unknown_keys(&merged, &defaults, &mut violations);
    let config = type_sections(&merged, &mut violations);
    violations.extend(config.validate());

    if !violations.is_empty() {
        return Err(Error::config_schema(violations));
    }

    Ok(ResolvedConfig {
        config,
        config_path: base_path.map(Path::to_path_buf),
    })
}

/// Merge `overlay` into `base`: objects merge recursively key-by-key,
/// everything else replaces the base value.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn load_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::config_not_found(path)
        } else {
            Error::from(e)
        }
    })?;

    serde_json::from_str(&text).map_err(|e| {
        Error::config_schema(vec![format!("{}: not valid JSON: {e}", path.display())])
    })
}

fn apply_profile(merged: &mut Value, profile: SafetyProfile) {
    if profile != SafetyProfile::Conservative {
        return;
    }
    info!("conservative profile active, applying safe defaults");
    set_key(merged, "video", "hardware_acceleration", Value::Bool(false));
    set_key(merged, "captions", "whisper_model", Value::String("tiny".into()));
    set_key(merged, "backup", "retention_days", Value::from(999));
}

fn set_key(doc: &mut Value, section: &str, key: &str, value: Value) {
    // A non-object section is left alone here; validation reports it.
    if let Some(section_map) = doc.get_mut(section).and_then(Value::as_object_mut) {
        section_map.insert(key.to_string(), value);
    }
}

fn collect_unknown_keys(merged: &Value, defaults: &Value, violations: &mut Vec<String>) {
    let merged_map = match merged.as_object() {
        Some(map) => map,
        None => {
            violations.push("configuration root must be a JSON object".to_string());
            return;
        }
    };
    // The defaults document is a serialized struct, always an object.
    let defaults_map = match defaults.as_object() {
        Some(map) => map,
        None => return,
    };

    for (section, value) in merged_map {
        let default_section = match defaults_map.get(section) {
            Some(v) => v,
            None => {
                violations.push(format!("unknown section `{section}`"));
                continue;
            }
        };
        let value_map = match value.as_object() {
            Some(map) => map,
            None => {
                violations.push(format!("{section}: must be an object"));
                continue;
            }
        };
        if let Some(default_map) = default_section.as_object() {
            for key in value_map.keys() {
                if !default_map.contains_key(key) {
                    violations.push(format!("unknown key `{section}.{key}`"));
                }
            }
        }
    }
}

fn type_sections(merged: &Value, violations: &mut Vec<String>) -> PipelineConfig {
    PipelineConfig {
        audio: type_section(merged, "audio", violations),
        captions: type_section(merged, "captions", violations),
        video: type_section(merged, "video", violations),
        thumbnails: type_section(merged, "thumbnails", violations),
        backup: type_section(merged, "backup", violations),
    }
}

fn type_section<T: DeserializeOwned + Default>(
    doc: &Value,
    section: &str,
    violations: &mut Vec<String>,
) -> T {
    match doc.get(section) {
        Some(value) if value.is_object() => match serde_json::from_value(value.clone()) {
            Ok(typed) => typed,
            Err(e) => {
                violations.push(format!("{section}: {e}"));
                T::default()
            }
        },
        // Missing or malformed sections were already reported; fall back so
        // the remaining sections still get range-checked.
        _ => T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WhisperModel;
    use serde_json::json;
    use std::fs;

    fn write_config(dir: &tempfile::TempDir, name: &str, value: &Value) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn no_sources_yields_defaults() {
        let resolved = resolve(None, None, None, SafetyProfile::Standard).unwrap();
        assert_eq!(resolved.config.video.crf, 18);
        assert_eq!(resolved.config.thumbnails.count, 6);
        assert!(resolved.config_path.is_none());
    }

    #[test]
    fn base_file_overrides_defaults_key_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_config(&dir, "base.json", &json!({"video": {"crf": 20}}));

        let resolved = resolve(Some(&base), None, None, SafetyProfile::Standard).unwrap();
        assert_eq!(resolved.config.video.crf, 20);
        // Sibling keys in the same section keep their defaults.
        assert_eq!(resolved.config.video.preset, "fast");
        assert_eq!(resolved.config.audio.sample_rate_hz, 48_000);
        assert_eq!(resolved.config_path.as_deref(), Some(base.as_path()));
    }

    #[test]
    fn override_file_wins_over_base_without_clobbering_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_config(
            &dir,
            "base.json",
            &json!({"video": {"crf": 20, "preset": "slow"}}),
        );
        let overlay = write_config(&dir, "override.json", &json!({"video": {"crf": 25}}));

        let resolved =
            resolve(Some(&base), Some(&overlay), None, SafetyProfile::Standard).unwrap();
        assert_eq!(resolved.config.video.crf, 25);
        assert_eq!(resolved.config.video.preset, "slow");
    }

    #[test]
    fn caller_mapping_wins_last() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_config(&dir, "base.json", &json!({"video": {"crf": 20}}));
        let overlay = write_config(&dir, "override.json", &json!({"video": {"crf": 25}}));
        let mapping = json!({"video": {"crf": 30}});

        let resolved = resolve(
            Some(&base),
            Some(&overlay),
            Some(&mapping),
            SafetyProfile::Standard,
        )
        .unwrap();
        assert_eq!(resolved.config.video.crf, 30);
    }

    #[test]
    fn each_layer_is_independently_optional() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = write_config(&dir, "override.json", &json!({"thumbnails": {"count": 3}}));

        let resolved = resolve(None, Some(&overlay), None, SafetyProfile::Standard).unwrap();
        assert_eq!(resolved.config.thumbnails.count, 3);

        let mapping = json!({"thumbnails": {"count": 9}});
        let resolved = resolve(None, None, Some(&mapping), SafetyProfile::Standard).unwrap();
        assert_eq!(resolved.config.thumbnails.count, 9);
    }

    #[test]
    fn missing_base_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = resolve(Some(&missing), None, None, SafetyProfile::Standard).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn missing_override_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = resolve(None, Some(&missing), None, SafetyProfile::Standard).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn malformed_json_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let err = resolve(Some(&path), None, None, SafetyProfile::Standard).unwrap_err();
        match err {
            Error::ConfigSchema { violations } => {
                assert!(violations[0].contains("not valid JSON"));
            }
            other => panic!("expected ConfigSchema, got {other:?}"),
        }
    }

    #[test]
    fn unknown_section_is_rejected() {
        let mapping = json!({"foo": {"bar": 1}});
        let err = resolve(None, None, Some(&mapping), SafetyProfile::Standard).unwrap_err();
        match err {
            Error::ConfigSchema { violations } => {
                assert!(violations.iter().any(|v| v.contains("unknown section `foo`")));
            }
            other => panic!("expected ConfigSchema, got {other:?}"),
        }
    }

    #[test]
    fn unknown_leaf_key_is_rejected() {
        let mapping = json!({"video": {"crff": 18}});
        let err = resolve(None, None, Some(&mapping), SafetyProfile::Standard).unwrap_err();
        match err {
            Error::ConfigSchema { violations } => {
                assert!(violations.iter().any(|v| v.contains("unknown key `video.crff`")));
            }
            other => panic!("expected ConfigSchema, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_crf_is_rejected_through_the_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_config(&dir, "base.json", &json!({"video": {"crf": 999}}));

        let err = resolve(Some(&base), None, None, SafetyProfile::Standard).unwrap_err();
        match err {
            Error::ConfigSchema { violations } => {
                assert!(violations.iter().any(|v| v.contains("video.crf")));
            }
            other => panic!("expected ConfigSchema, got {other:?}"),
        }
    }

    #[test]
    fn all_violations_are_listed_together() {
        let mapping = json!({"foo": {}, "video": {"crf": 999}, "thumbnails": {"count": 0}});
        let err = resolve(None, None, Some(&mapping), SafetyProfile::Standard).unwrap_err();
        match err {
            Error::ConfigSchema { violations } => {
                assert_eq!(violations.len(), 3);
                assert!(violations.iter().any(|v| v.contains("unknown section `foo`")));
                assert!(violations.iter().any(|v| v.contains("video.crf")));
                assert!(violations.iter().any(|v| v.contains("thumbnails.count")));
            }
            other => panic!("expected ConfigSchema, got {other:?}"),
        }
    }

    #[test]
    fn scalar_section_is_rejected() {
        let mapping = json!({"audio": 5});
        let err = resolve(None, None, Some(&mapping), SafetyProfile::Standard).unwrap_err();
        match err {
            Error::ConfigSchema { violations } => {
                assert!(violations.iter().any(|v| v.contains("audio: must be an object")));
            }
            other => panic!("expected ConfigSchema, got {other:?}"),
        }
    }

    #[test]
    fn conservative_profile_applies_safe_defaults() {
        let resolved = resolve(None, None, None, SafetyProfile::Conservative).unwrap();
        assert!(!resolved.config.video.hardware_acceleration);
        assert_eq!(resolved.config.captions.whisper_model, WhisperModel::Tiny);
        assert_eq!(resolved.config.backup.retention_days, 999);
    }

    #[test]
    fn conservative_profile_wins_over_overrides() {
        let mapping = json!({"video": {"hardware_acceleration": true}});
        let resolved = resolve(None, None, Some(&mapping), SafetyProfile::Conservative).unwrap();
        assert!(!resolved.config.video.hardware_acceleration);
    }

    #[test]
    fn conservative_profile_touches_nothing_else() {
        let standard = resolve(None, None, None, SafetyProfile::Standard).unwrap();
        let conservative = resolve(None, None, None, SafetyProfile::Conservative).unwrap();
        assert_eq!(standard.config.video.crf, conservative.config.video.crf);
        assert_eq!(
            standard.config.thumbnails.count,
            conservative.config.thumbnails.count
        );
        assert_eq!(
            standard.config.audio.target_loudness_lufs,
            conservative.config.audio.target_loudness_lufs
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let mapping = json!({"video": {"crf": 23}, "backup": {"max_count": 4}});
        let a = resolve(None, None, Some(&mapping), SafetyProfile::Standard).unwrap();
        let b = resolve(None, None, Some(&mapping), SafetyProfile::Standard).unwrap();
        assert_eq!(
            serde_json::to_value(&a.config).unwrap(),
            serde_json::to_value(&b.config).unwrap()
        );
    }

    #[test]
    fn deep_merge_replaces_scalars() {
        let mut base = json!({"a": 1, "b": 2});
        deep_merge(&mut base, json!({"b": 3}));
        assert_eq!(base, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn deep_merge_recurses_into_objects() {
        let mut base = json!({"video": {"crf": 18, "preset": "fast"}});
        deep_merge(&mut base, json!({"video": {"crf": 22}}));
        assert_eq!(base, json!({"video": {"crf": 22, "preset": "fast"}}));
    }

    #[test]
    fn deep_merge_inserts_new_keys() {
        let mut base = json!({"video": {"crf": 18}});
        deep_merge(&mut base, json!({"video": {"denoise": true}, "extra": 1}));
        assert_eq!(
            base,
            json!({"video": {"crf": 18, "denoise": true}, "extra": 1})
        );
    }

    #[test]
    fn deep_merge_object_replaces_scalar() {
        let mut base = json!({"a": 1});
        deep_merge(&mut base, json!({"a": {"nested": true}}));
        assert_eq!(base, json!({"a": {"nested": true}}));
    }
}
