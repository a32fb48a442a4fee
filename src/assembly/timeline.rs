//! Canonical timeline artifact: deterministic serialization, self-hash,
//! and source-hash validation for conform.
//!
//! The on-disk form is JSON with two-space indentation and
//! lexicographically sorted keys. `timeline_hash` is the sha256 of exactly
//! the bytes that would be produced with the hash field absent, so
//! validators can strip the field, re-serialize, and compare.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, TimelineError};

/// Format version stamped into every artifact
pub const TIMELINE_VERSION: &str = "1.0";

/// One edit in the timeline, referencing the original source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineClip {
    /// Absolute path to the source file
    pub src: PathBuf,
    /// In-point in seconds, `0 <= in < out`
    #[serde(rename = "in")]
    pub in_point: f64,
    /// Out-point in seconds
    #[serde(rename = "out")]
    pub out_point: f64,
}

/// The canonical timeline object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_markers: Option<Vec<f64>>,
    pub clips: Vec<TimelineClip>,
    /// ISO-8601 creation timestamp
    pub created_at: String,
    pub fps: u32,
    pub music: PathBuf,
    /// Content hash per referenced source path at write time
    pub source_hashes: BTreeMap<String, String>,
    pub target_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_hash: Option<String>,
    pub used_beat_snapping: bool,
    pub used_scene_detect: bool,
    pub version: String,
}

impl Timeline {
    /// Canonical serialization: UTF-8 JSON, two-space indent, sorted keys.
    /// With `include_hash = false` the `timeline_hash` field is stripped,
    /// producing exactly the bytes the hash covers.
    pub fn canonical_bytes(&self, include_hash: bool) -> Result<Vec<u8>> {
        let mut value = serde_json::to_value(self).map_err(|e| TimelineError::Invalid {
            reason: e.to_string(),
        })?;
        if !include_hash {
            if let Some(map) = value.as_object_mut() {
                map.remove("timeline_hash");
            }
        }
        let text = serde_json::to_string_pretty(&value).map_err(|e| TimelineError::Invalid {
            reason: e.to_string(),
        })?;
        Ok(text.into_bytes())
    }

    /// Compute the sha256 of the hash-free canonical serialization
    pub fn compute_hash(&self) -> Result<String> {
        let bytes = self.canonical_bytes(false)?;
        Ok(hex_digest(&bytes))
    }

    /// Verify that `timeline_hash` matches the serialized content
    pub fn verify_hash(&self) -> Result<bool> {
        match &self.timeline_hash {
            Some(stored) => Ok(*stored == self.compute_hash()?),
            None => Ok(false),
        }
    }
}

/// Inputs for writing a timeline artifact
#[derive(Debug, Clone)]
pub struct TimelineParams {
    pub clips: Vec<TimelineClip>,
    pub target_seconds: u32,
    pub music_path: PathBuf,
    pub output_path: PathBuf,
    pub fps: u32,
    pub used_scene_detect: bool,
    pub used_beat_snapping: bool,
    pub bar_markers: Option<Vec<f64>>,
    pub tempo: Option<f64>,
    pub time_signature: Option<String>,
}

/// Write a deterministic timeline artifact: absolutize paths, record
/// source hashes, serialize canonically, stamp the self-hash, re-serialize.
pub fn write_timeline(params: TimelineParams) -> Result<PathBuf> {
    let clips: Vec<TimelineClip> = params
        .clips
        .into_iter()
        .map(|clip| {
            Ok(TimelineClip {
                src: absolutize(&clip.src)?,
                in_point: clip.in_point,
                out_point: clip.out_point,
            })
        })
        .collect::<Result<_>>()?;
    let music = absolutize(&params.music_path)?;

    let mut source_hashes = BTreeMap::new();
    for clip in &clips {
        if clip.src.exists() {
            source_hashes.insert(
                clip.src.display().to_string(),
                file_identity_hash(&clip.src)?,
            );
        }
    }
    if music.exists() {
        source_hashes.insert(music.display().to_string(), file_identity_hash(&music)?);
    }

    let mut timeline = Timeline {
        bar_markers: params.bar_markers,
        clips,
        created_at: chrono::Utc::now().to_rfc3339(),
        fps: params.fps,
        music,
        source_hashes,
        target_seconds: params.target_seconds,
        tempo: params.tempo,
        time_signature: params.time_signature,
        timeline_hash: None,
        used_beat_snapping: params.used_beat_snapping,
        used_scene_detect: params.used_scene_detect,
        version: TIMELINE_VERSION.to_string(),
    };

    timeline.timeline_hash = Some(timeline.compute_hash()?);

    let output = absolutize(&params.output_path)?;
    std::fs::write(&output, timeline.canonical_bytes(true)?)?;

    tracing::info!("Timeline written: {:?}", output);
    Ok(output)
}

/// Read and validate a timeline artifact. The stored hash is not
/// recomputed here; use [`Timeline::verify_hash`] for that.
pub fn read_timeline(timeline_path: &Path) -> Result<Timeline> {
    if !timeline_path.exists() {
        return Err(TimelineError::NotFound {
            path: timeline_path.display().to_string(),
        }
        .into());
    }

    let content = std::fs::read_to_string(timeline_path)?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| TimelineError::Invalid {
            reason: format!("bad JSON: {e}"),
        })?;

    for field in ["clips", "fps", "target_seconds", "music", "timeline_hash"] {
        if value.get(field).is_none() {
            return Err(TimelineError::Invalid {
                reason: format!("missing required field: {field}"),
            }
            .into());
        }
    }

    let clips = value["clips"].as_array().ok_or_else(|| TimelineError::Invalid {
        reason: "clips must be an array".to_string(),
    })?;
    for (i, clip) in clips.iter().enumerate() {
        for field in ["src", "in", "out"] {
            if clip.get(field).is_none() {
                return Err(TimelineError::Invalid {
                    reason: format!("clip {i} missing required field: {field}"),
                }
                .into());
            }
        }
        let in_point = clip["in"].as_f64();
        let out_point = clip["out"].as_f64();
        match (in_point, out_point) {
            (Some(i_pt), Some(o_pt)) if i_pt < o_pt => {}
            (Some(_), Some(_)) => {
                return Err(TimelineError::Invalid {
                    reason: format!("clip {i} invalid timecode: in >= out"),
                }
                .into());
            }
            _ => {
                return Err(TimelineError::Invalid {
                    reason: format!("clip {i} timecodes must be numeric"),
                }
                .into());
            }
        }
    }

    serde_json::from_value(value).map_err(|e| {
        TimelineError::Invalid {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Check that every hashed source still exists with an unchanged identity
pub fn validate_timeline_sources(timeline: &Timeline) -> bool {
    for (path, expected) in &timeline.source_hashes {
        let path = Path::new(path);
        if !path.exists() {
            return false;
        }
        match file_identity_hash(path) {
            Ok(actual) if actual == *expected => {}
            _ => return false,
        }
    }
    true
}

/// sha256 over `path:mtime:size`, the cheap content-identity hash used for
/// source validation
pub fn file_identity_hash(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let identity = format!(
        "{}:{}.{:09}:{}",
        path.display(),
        mtime.as_secs(),
        mtime.subsec_nanos(),
        metadata.len()
    );
    Ok(hex_digest(identity.as_bytes()))
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Make a path absolute against the current directory without touching the
/// filesystem
pub(crate) fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_params(dir: &Path) -> TimelineParams {
        let clip_a = dir.join("a.mp4");
        let clip_b = dir.join("b.mp4");
        let music = dir.join("music.wav");
        std::fs::write(&clip_a, b"video a").unwrap();
        std::fs::write(&clip_b, b"video b").unwrap();
        std::fs::write(&music, b"music").unwrap();

        TimelineParams {
            clips: vec![
                TimelineClip {
                    src: clip_a,
                    in_point: 0.0,
                    out_point: 2.0,
                },
                TimelineClip {
                    src: clip_b,
                    in_point: 1.5,
                    out_point: 3.25,
                },
            ],
            target_seconds: 20,
            music_path: music,
            output_path: dir.join("timeline.json"),
            fps: 25,
            used_scene_detect: false,
            used_beat_snapping: true,
            bar_markers: Some(vec![0.5, 2.5, 4.5]),
            tempo: Some(120.0),
            time_signature: Some("4/4".to_string()),
        }
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = tempdir().unwrap();
        let path = write_timeline(sample_params(dir.path())).unwrap();

        let timeline = read_timeline(&path).unwrap();
        assert_eq!(timeline.clips.len(), 2);
        assert_eq!(timeline.fps, 25);
        assert_eq!(timeline.target_seconds, 20);
        assert!(timeline.used_beat_snapping);
        assert_eq!(timeline.version, TIMELINE_VERSION);

        // Re-serializing the parsed timeline reproduces the file bytes
        let on_disk = std::fs::read(&path).unwrap();
        let reserialized = timeline.canonical_bytes(true).unwrap();
        assert_eq!(on_disk, reserialized);
    }

    #[test]
    fn test_hash_covers_stripped_serialization() {
        let dir = tempdir().unwrap();
        let path = write_timeline(sample_params(dir.path())).unwrap();
        let timeline = read_timeline(&path).unwrap();

        assert!(timeline.verify_hash().unwrap());

        // Recomputing by hand matches the stored value
        let stripped = timeline.canonical_bytes(false).unwrap();
        assert_eq!(timeline.timeline_hash.as_deref().unwrap(), hex_digest(&stripped));
    }

    #[test]
    fn test_keys_are_sorted() {
        let dir = tempdir().unwrap();
        let path = write_timeline(sample_params(dir.path())).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        let top_level_keys: Vec<&str> = content
            .lines()
            .filter(|line| line.starts_with("  \"") && line.contains(':'))
            .map(|line| {
                let start = line.find('"').unwrap() + 1;
                let end = line[start..].find('"').unwrap() + start;
                &line[start..end]
            })
            .collect();

        let mut sorted = top_level_keys.clone();
        sorted.sort_unstable();
        assert_eq!(top_level_keys, sorted);
        assert_eq!(top_level_keys.first().copied(), Some("bar_markers"));
    }

    #[test]
    fn test_source_hash_records_all_sources() {
        let dir = tempdir().unwrap();
        let path = write_timeline(sample_params(dir.path())).unwrap();
        let timeline = read_timeline(&path).unwrap();
        assert_eq!(timeline.source_hashes.len(), 3); // two clips + music
        assert!(validate_timeline_sources(&timeline));
    }

    #[test]
    fn test_source_mutation_detected() {
        let dir = tempdir().unwrap();
        let params = sample_params(dir.path());
        let clip = params.clips[0].src.clone();
        let path = write_timeline(params).unwrap();
        let timeline = read_timeline(&path).unwrap();

        // Rewrite the source so mtime/size change
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(&clip, b"video a, but longer now").unwrap();

        assert!(!validate_timeline_sources(&timeline));
    }

    #[test]
    fn test_missing_source_invalid() {
        let dir = tempdir().unwrap();
        let params = sample_params(dir.path());
        let clip = params.clips[0].src.clone();
        let path = write_timeline(params).unwrap();
        let timeline = read_timeline(&path).unwrap();

        std::fs::remove_file(clip).unwrap();
        assert!(!validate_timeline_sources(&timeline));
    }

    #[test]
    fn test_read_rejects_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timeline.json");
        std::fs::write(&path, r#"{"clips": [], "fps": 25}"#).unwrap();

        let err = read_timeline(&path).unwrap_err();
        assert!(err.to_string().contains("missing required field"));
    }

    #[test]
    fn test_read_rejects_inverted_timecodes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timeline.json");
        std::fs::write(
            &path,
            r#"{
  "clips": [{"src": "/clips/a.mp4", "in": 3.0, "out": 1.0}],
  "fps": 25,
  "music": "/music.wav",
  "target_seconds": 20,
  "timeline_hash": "abc"
}"#,
        )
        .unwrap();

        let err = read_timeline(&path).unwrap_err();
        assert!(err.to_string().contains("in >= out"));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_timeline(Path::new("/nonexistent/timeline.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_write_is_idempotent_modulo_created_at() {
        let dir = tempdir().unwrap();
        let path = write_timeline(sample_params(dir.path())).unwrap();
        let mut first = read_timeline(&path).unwrap();
        let mut second = read_timeline(&path).unwrap();

        first.created_at = String::new();
        second.created_at = String::new();
        assert_eq!(first, second);
    }
}
