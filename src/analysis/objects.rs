use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::analysis::frame::{connected_blobs, detect_faces, rgb_to_hsv, GrayFrame, RgbFrame};
use crate::config::AnalysisSettings;
use crate::error::{AnalysisError, Result};
use crate::ffmpeg::FfmpegGateway;

/// Wedding-tagged object categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    WeddingRings,
    WeddingCake,
    Dancing,
    Bouquet,
    CeremonyMoments,
    ToastMoments,
    People,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::WeddingRings,
        ObjectKind::WeddingCake,
        ObjectKind::Dancing,
        ObjectKind::Bouquet,
        ObjectKind::CeremonyMoments,
        ObjectKind::ToastMoments,
        ObjectKind::People,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::WeddingRings => "wedding_rings",
            ObjectKind::WeddingCake => "wedding_cake",
            ObjectKind::Dancing => "dancing",
            ObjectKind::Bouquet => "bouquet",
            ObjectKind::CeremonyMoments => "ceremony_moments",
            ObjectKind::ToastMoments => "toast_moments",
            ObjectKind::People => "people",
        }
    }

    /// Baseline confidence recorded per detection of this kind
    fn base_confidence(&self) -> f64 {
        match self {
            ObjectKind::WeddingRings => 0.4,
            ObjectKind::WeddingCake => 0.5,
            ObjectKind::Dancing => 0.6,
            ObjectKind::Bouquet => 0.45,
            ObjectKind::CeremonyMoments => 0.65,
            ObjectKind::ToastMoments => 0.5,
            ObjectKind::People => 0.7,
        }
    }

    /// Per-frame detection cap
    fn frame_cap(&self) -> u32 {
        match self {
            ObjectKind::WeddingRings => 4,
            ObjectKind::WeddingCake => 2,
            ObjectKind::Dancing => 10,
            ObjectKind::Bouquet => 3,
            ObjectKind::CeremonyMoments => 8,
            ObjectKind::ToastMoments => 6,
            ObjectKind::People => u32::MAX,
        }
    }
}

/// Scene classification derived from object counts (the last two variants
/// are only produced by story refinement or vision enrichment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneClass {
    Ceremony,
    Reception,
    Party,
    Preparation,
    IntimateMoments,
    ScenicMoments,
}

impl SceneClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneClass::Ceremony => "ceremony",
            SceneClass::Reception => "reception",
            SceneClass::Party => "party",
            SceneClass::Preparation => "preparation",
            SceneClass::IntimateMoments => "intimate_moments",
            SceneClass::ScenicMoments => "scenic_moments",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ceremony" => Some(SceneClass::Ceremony),
            "reception" => Some(SceneClass::Reception),
            "party" => Some(SceneClass::Party),
            "preparation" => Some(SceneClass::Preparation),
            "intimate_moments" => Some(SceneClass::IntimateMoments),
            "scenic_moments" => Some(SceneClass::ScenicMoments),
            _ => None,
        }
    }
}

/// Result of wedding object detection for one clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectAnalysis {
    pub clip_path: PathBuf,
    pub duration: f64,
    /// Aggregate counts per kind across sampled frames
    pub objects_detected: BTreeMap<ObjectKind, u32>,
    /// Mean confidence per detected kind
    pub confidence_scores: BTreeMap<ObjectKind, f64>,
    /// Timestamps where any objects were detected
    pub key_moments: Vec<f64>,
    pub scene_classification: SceneClass,
    pub analysis_duration: f64,
}

impl ObjectAnalysis {
    pub fn count(&self, kind: ObjectKind) -> u32 {
        self.objects_detected.get(&kind).copied().unwrap_or(0)
    }

    /// Empty analysis for a clip that produced no usable frames
    pub fn empty(clip_path: &Path) -> Self {
        Self {
            clip_path: clip_path.to_path_buf(),
            duration: 0.0,
            objects_detected: BTreeMap::new(),
            confidence_scores: BTreeMap::new(),
            key_moments: Vec::new(),
            scene_classification: SceneClass::Preparation,
            analysis_duration: 0.0,
        }
    }
}

/// Heuristic wedding object detector over sampled frames
pub struct ObjectDetector {
    gateway: Arc<FfmpegGateway>,
    settings: AnalysisSettings,
}

impl ObjectDetector {
    pub fn new(gateway: Arc<FfmpegGateway>, settings: AnalysisSettings) -> Self {
        Self { gateway, settings }
    }

    /// Analyze a clip, sampling a frame every `detect_interval` seconds
    pub async fn analyze(&self, video_path: &Path) -> Result<ObjectAnalysis> {
        let started = Instant::now();
        tracing::info!(
            "Object detection: {:?}",
            video_path.file_name().unwrap_or_default()
        );

        let duration = self.gateway.probe_duration(video_path).await?;
        let sample_fps = 1.0 / self.settings.detect_interval;
        let width = self.settings.frame_width;
        let height = self.settings.frame_height;

        let raw = self
            .gateway
            .read_rgb_frames(video_path, sample_fps, width, height, None)
            .await?;
        let frames: Vec<RgbFrame> = raw
            .into_iter()
            .filter_map(|data| RgbFrame::from_raw(width, height, data))
            .collect();
        if frames.is_empty() {
            return Err(AnalysisError::FrameDecodeFailed {
                path: video_path.display().to_string(),
                reason: "no frames decoded".to_string(),
            }
            .into());
        }

        let mut objects_detected: BTreeMap<ObjectKind, u32> = BTreeMap::new();
        let mut confidence_sums: BTreeMap<ObjectKind, (f64, u32)> = BTreeMap::new();
        let mut key_moments = Vec::new();
        let mut prev_gray: Option<GrayFrame> = None;

        for (i, frame) in frames.iter().enumerate() {
            let timestamp = i as f64 * self.settings.detect_interval;
            let gray = frame.luma();

            let frame_objects = detect_objects_in_frame(frame, &gray, prev_gray.as_ref());

            let mut total = 0u32;
            for (kind, count) in &frame_objects {
                if *count > 0 {
                    *objects_detected.entry(*kind).or_insert(0) += count;
                    let entry = confidence_sums.entry(*kind).or_insert((0.0, 0));
                    entry.0 += kind.base_confidence();
                    entry.1 += 1;
                    total += count;
                }
            }

            if total > 0 {
                key_moments.push(timestamp);
                if total > 5 {
                    tracing::debug!("Key moment at {:.2}s: {} objects", timestamp, total);
                }
            }

            prev_gray = Some(gray);
        }

        let confidence_scores = confidence_sums
            .into_iter()
            .map(|(kind, (sum, n))| (kind, sum / n as f64))
            .collect();

        let scene_classification = classify_scene(&objects_detected);
        let analysis_duration = started.elapsed().as_secs_f64();

        tracing::info!(
            "Object detection complete: {} key moments, scene {:?}",
            key_moments.len(),
            scene_classification
        );

        Ok(ObjectAnalysis {
            clip_path: video_path.to_path_buf(),
            duration,
            objects_detected,
            confidence_scores,
            key_moments,
            scene_classification,
            analysis_duration,
        })
    }
}

/// Run all sub-detectors against one frame
fn detect_objects_in_frame(
    frame: &RgbFrame,
    gray: &GrayFrame,
    prev_gray: Option<&GrayFrame>,
) -> BTreeMap<ObjectKind, u32> {
    let faces = detect_faces(frame);
    let face_count = faces.len() as u32;

    let mut objects = BTreeMap::new();
    objects.insert(ObjectKind::WeddingRings, detect_rings(frame));
    objects.insert(ObjectKind::WeddingCake, detect_cake(frame));
    objects.insert(
        ObjectKind::Dancing,
        detect_dancing(gray, prev_gray, face_count),
    );
    objects.insert(ObjectKind::Bouquet, detect_bouquet(frame));
    objects.insert(ObjectKind::CeremonyMoments, detect_ceremony(face_count));
    objects.insert(ObjectKind::ToastMoments, detect_toast(frame, face_count));
    objects.insert(ObjectKind::People, face_count);

    for (kind, count) in objects.iter_mut() {
        *count = (*count).min(kind.frame_cap());
    }

    objects
}

/// Rings: small circular metallic-colored blobs
fn detect_rings(frame: &RgbFrame) -> u32 {
    let mask = frame.mask(is_metallic);
    let frame_area = frame.width() * frame.height();
    let min_area = (frame_area / 2000).max(8);
    let max_area = frame_area / 50;

    connected_blobs(&mask, min_area)
        .into_iter()
        .filter(|blob| blob.area <= max_area && blob.is_roundish())
        .count() as u32
}

/// Cake: white regions whose contour is taller than wide
fn detect_cake(frame: &RgbFrame) -> u32 {
    let mask = frame.mask(|r, g, b| {
        let (_, s, v) = rgb_to_hsv(r, g, b);
        s < 0.12 && v > 0.78
    });
    let min_area = (frame.width() * frame.height() / 60).max(32);

    connected_blobs(&mask, min_area)
        .into_iter()
        .filter(|blob| blob.aspect_ratio() > 0.8)
        .count() as u32
}

/// Dancing: people visible while inter-frame motion is high
fn detect_dancing(gray: &GrayFrame, prev_gray: Option<&GrayFrame>, face_count: u32) -> u32 {
    let Some(prev) = prev_gray else {
        return 0;
    };
    let motion = gray.mean_abs_diff(prev);
    if face_count > 0 && motion > 0.1 {
        face_count
    } else {
        0
    }
}

/// Bouquet: saturated colorful regions with a roughly round contour
fn detect_bouquet(frame: &RgbFrame) -> u32 {
    let mask = frame.mask(|r, g, b| {
        let (_, s, v) = rgb_to_hsv(r, g, b);
        s > 0.45 && v > 0.3
    });
    let frame_area = frame.width() * frame.height();
    let min_area = (frame_area / 200).max(16);
    let max_area = frame_area / 20;

    connected_blobs(&mask, min_area)
        .into_iter()
        .filter(|blob| {
            blob.area <= max_area && (0.7..=1.4).contains(&(1.0 / blob.aspect_ratio().max(0.01)))
        })
        .count() as u32
}

/// Ceremony: formal grouping of two or more people
fn detect_ceremony(face_count: u32) -> u32 {
    if face_count >= 2 {
        face_count
    } else {
        0
    }
}

/// Toast: people plus a glass proxy (small bright desaturated blobs)
fn detect_toast(frame: &RgbFrame, face_count: u32) -> u32 {
    let mask = frame.mask(|r, g, b| {
        let (_, s, v) = rgb_to_hsv(r, g, b);
        s < 0.15 && v > 0.85
    });
    let frame_area = frame.width() * frame.height();
    let min_area = (frame_area / 3000).max(4);
    let max_area = frame_area / 150;

    let glass_count = connected_blobs(&mask, min_area)
        .into_iter()
        .filter(|blob| blob.area <= max_area && blob.aspect_ratio() > 1.0)
        .count();

    if glass_count > 0 {
        face_count
    } else {
        0
    }
}

/// Metallic gold/silver tones
fn is_metallic(r: u8, g: u8, b: u8) -> bool {
    // Gold: strong red and green, weak blue. Silver: uniformly bright.
    (r > 150 && g > 150 && b < 100) || (r > 180 && g > 180 && b > 180)
}

/// Scene classification rules applied to clip totals
fn classify_scene(objects: &BTreeMap<ObjectKind, u32>) -> SceneClass {
    let count = |kind| objects.get(&kind).copied().unwrap_or(0);

    if count(ObjectKind::CeremonyMoments) > 3 {
        SceneClass::Ceremony
    } else if count(ObjectKind::Dancing) > 2 {
        SceneClass::Party
    } else if count(ObjectKind::WeddingCake) > 0 || count(ObjectKind::ToastMoments) > 0 {
        SceneClass::Reception
    } else {
        SceneClass::Preparation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(ObjectKind, u32)]) -> BTreeMap<ObjectKind, u32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_scene_ceremony_wins() {
        let objects = counts(&[
            (ObjectKind::CeremonyMoments, 4),
            (ObjectKind::Dancing, 10),
            (ObjectKind::WeddingCake, 2),
        ]);
        assert_eq!(classify_scene(&objects), SceneClass::Ceremony);
    }

    #[test]
    fn test_scene_party_from_dancing() {
        let objects = counts(&[(ObjectKind::Dancing, 3)]);
        assert_eq!(classify_scene(&objects), SceneClass::Party);
    }

    #[test]
    fn test_scene_reception_from_cake_or_toast() {
        assert_eq!(
            classify_scene(&counts(&[(ObjectKind::WeddingCake, 1)])),
            SceneClass::Reception
        );
        assert_eq!(
            classify_scene(&counts(&[(ObjectKind::ToastMoments, 2)])),
            SceneClass::Reception
        );
    }

    #[test]
    fn test_scene_defaults_to_preparation() {
        assert_eq!(classify_scene(&BTreeMap::new()), SceneClass::Preparation);
    }

    #[test]
    fn test_object_kind_serde_names() {
        let json = serde_json::to_string(&ObjectKind::WeddingRings).unwrap();
        assert_eq!(json, "\"wedding_rings\"");
        assert_eq!(ObjectKind::WeddingRings.as_str(), "wedding_rings");
    }

    #[test]
    fn test_scene_class_parse_roundtrip() {
        for scene in [
            SceneClass::Ceremony,
            SceneClass::Reception,
            SceneClass::Party,
            SceneClass::Preparation,
            SceneClass::IntimateMoments,
            SceneClass::ScenicMoments,
        ] {
            assert_eq!(SceneClass::parse(scene.as_str()), Some(scene));
        }
        assert_eq!(SceneClass::parse("unknown"), None);
    }

    #[test]
    fn test_dancing_requires_motion() {
        let still = GrayFrame::from_raw(4, 4, vec![100; 16]).unwrap();
        assert_eq!(detect_dancing(&still, Some(&still), 3), 0);

        let moved = GrayFrame::from_raw(4, 4, vec![200; 16]).unwrap();
        assert_eq!(detect_dancing(&moved, Some(&still), 3), 3);
        assert_eq!(detect_dancing(&moved, None, 3), 0);
    }

    #[test]
    fn test_frame_caps_applied() {
        let frame = RgbFrame::from_raw(4, 4, vec![0; 48]).unwrap();
        let gray = frame.luma();
        let objects = detect_objects_in_frame(&frame, &gray, None);
        for (kind, count) in objects {
            assert!(count <= kind.frame_cap(), "{kind:?} over cap");
        }
    }
}
