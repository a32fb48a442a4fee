//! # Content Selector
//!
//! Orchestrates per-clip analysis and fuses the results into a final score
//! per clip: object detection and emotion analysis run in parallel, the
//! optional vision enricher adjusts their output, the story-arc builder and
//! style-preset engine classify the clip, and a weighted fusion produces
//! the score used for top-N selection.
//!
//! Results are cached per process, keyed on the clip plus every styling
//! input plus a version tag; see [`cache`].

pub mod cache;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::emotion::{Emotion, EmotionAnalysis, EmotionAnalyzer, Sentiment};
use crate::analysis::objects::{ObjectAnalysis, ObjectDetector, ObjectKind, SceneClass};
use crate::analysis::VisionEnricher;
use crate::config::{AnalysisSettings, VisionConfig};
use crate::error::Result;
use crate::ffmpeg::FfmpegGateway;
use crate::story::arc::{StoryArc, StoryArcBuilder};
use crate::story::presets::{StylePreset, StylePresetEngine, StyleTreatment};
use crate::story::{EmotionalTone, NarrativePosition, NarrativeStyle};

pub use cache::{AnalysisCache, CacheKey, CACHE_VERSION};

/// Full analysis runs every analyzer; fast analysis skips emotion and
/// collapses the fusion weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Full,
    Fast,
}

/// Styling inputs for a selection run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionStyles {
    pub story_style: NarrativeStyle,
    pub style_preset: StylePreset,
}

impl Default for SelectionStyles {
    fn default() -> Self {
        Self {
            story_style: NarrativeStyle::Traditional,
            style_preset: StylePreset::Romantic,
        }
    }
}

/// Fused per-clip analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub clip_path: PathBuf,
    pub object_analysis: ObjectAnalysis,
    pub emotion_analysis: EmotionAnalysis,
    pub story_arc: StoryArc,
    pub style_treatment: StyleTreatment,
    /// Final fused score in [0, 1]
    pub final_score: f64,
    /// Human-readable reason this clip scored the way it did
    pub selection_reason: String,
}

/// AI content selection over a set of clips
pub struct ContentSelector {
    gateway: Arc<FfmpegGateway>,
    object_detector: ObjectDetector,
    emotion_analyzer: EmotionAnalyzer,
    story_builder: StoryArcBuilder,
    style_engine: StylePresetEngine,
    enricher: VisionEnricher,
    cache: AnalysisCache,
    settings: AnalysisSettings,
}

impl ContentSelector {
    pub fn new(
        gateway: Arc<FfmpegGateway>,
        settings: AnalysisSettings,
        vision: VisionConfig,
    ) -> Self {
        Self {
            object_detector: ObjectDetector::new(gateway.clone(), settings.clone()),
            emotion_analyzer: EmotionAnalyzer::new(gateway.clone(), settings.clone()),
            story_builder: StoryArcBuilder::new(),
            style_engine: StylePresetEngine::new(),
            enricher: VisionEnricher::new(vision),
            cache: AnalysisCache::new(),
            settings,
            gateway,
        }
    }

    /// Drop every cached result
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Full analysis: object and emotion analyzers in parallel, optional
    /// vision enrichment, story arc, style preset, fused score.
    pub async fn analyze(
        &self,
        clip_path: &Path,
        styles: SelectionStyles,
    ) -> Result<Arc<SelectionResult>> {
        let key = CacheKey::new(clip_path, styles.story_style, styles.style_preset, AnalysisMode::Full);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Cache hit for {:?}", clip_path.file_name().unwrap_or_default());
            return Ok(cached);
        }

        tracing::info!("Analyzing clip: {:?}", clip_path.file_name().unwrap_or_default());

        let (object, emotion) = tokio::join!(
            self.object_detector.analyze(clip_path),
            self.emotion_analyzer.analyze(clip_path),
        );
        let mut object = object?;
        let mut emotion = emotion?;

        self.enricher
            .enrich(&self.gateway, clip_path, &mut object, &mut emotion)
            .await;

        let result = self.fuse(clip_path, object, emotion, styles, AnalysisMode::Full);
        Ok(self.cache.insert(key, result))
    }

    /// Fast analysis: emotion is skipped (a neutral default is injected)
    /// and the fusion weights collapse onto object and story signals.
    pub async fn analyze_fast(
        &self,
        clip_path: &Path,
        styles: SelectionStyles,
    ) -> Result<Arc<SelectionResult>> {
        let key = CacheKey::new(clip_path, styles.story_style, styles.style_preset, AnalysisMode::Fast);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Cache hit for {:?}", clip_path.file_name().unwrap_or_default());
            return Ok(cached);
        }

        tracing::info!(
            "Fast analyzing clip: {:?}",
            clip_path.file_name().unwrap_or_default()
        );

        let mut object = self.object_detector.analyze(clip_path).await?;
        let mut emotion = EmotionAnalysis::neutral(clip_path, object.duration);

        self.enricher
            .enrich(&self.gateway, clip_path, &mut object, &mut emotion)
            .await;

        let result = self.fuse(clip_path, object, emotion, styles, AnalysisMode::Fast);
        Ok(self.cache.insert(key, result))
    }

    /// Analyze clips in bounded batches and return the top `target_count`
    /// by final score, descending. Once at least `2 * target_count` clips
    /// are analyzed and `target_count` of them clear the quality bar, the
    /// remaining batches are skipped. Per-clip analyzer failures drop the
    /// clip and the batch continues.
    pub async fn select_best(
        &self,
        clip_paths: &[PathBuf],
        target_count: usize,
        styles: SelectionStyles,
        fast_mode: bool,
    ) -> Vec<Arc<SelectionResult>> {
        self.select_best_with_batch(
            clip_paths,
            target_count,
            styles,
            fast_mode,
            self.settings.batch_size,
        )
        .await
    }

    /// `select_best` with an explicit batch width (background jobs use 3)
    pub async fn select_best_with_batch(
        &self,
        clip_paths: &[PathBuf],
        target_count: usize,
        styles: SelectionStyles,
        fast_mode: bool,
        batch_size: usize,
    ) -> Vec<Arc<SelectionResult>> {
        tracing::info!(
            "Selecting best {} clips from {} candidates",
            target_count,
            clip_paths.len()
        );

        const QUALITY_BAR: f64 = 0.6;
        let mut results: Vec<Arc<SelectionResult>> = Vec::new();

        for (batch_idx, batch) in clip_paths.chunks(batch_size.max(1)).enumerate() {
            tracing::debug!("Processing batch {}", batch_idx + 1);

            let analyses = futures::future::join_all(batch.iter().map(|clip| async move {
                let outcome = if fast_mode {
                    self.analyze_fast(clip, styles).await
                } else {
                    self.analyze(clip, styles).await
                };
                (clip, outcome)
            }))
            .await;

            for (clip, outcome) in analyses {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        tracing::warn!("Skipping {:?}: {e}", clip.file_name().unwrap_or_default());
                    }
                }
            }

            // Early exit once enough high-quality clips are in hand
            if results.len() >= target_count * 2 {
                let high_quality = results
                    .iter()
                    .filter(|r| r.final_score > QUALITY_BAR)
                    .count();
                if high_quality >= target_count {
                    tracing::info!(
                        "Early exit: {} high-quality clips after {} analyzed",
                        high_quality,
                        results.len()
                    );
                    break;
                }
            }
        }

        results.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap());
        results.truncate(target_count);

        tracing::info!("Selected {} clips", results.len());
        results
    }

    fn fuse(
        &self,
        clip_path: &Path,
        object: ObjectAnalysis,
        emotion: EmotionAnalysis,
        styles: SelectionStyles,
        mode: AnalysisMode,
    ) -> SelectionResult {
        let story_arc = self
            .story_builder
            .build(&object, &emotion, styles.story_style);
        let style_treatment = self.style_engine.apply(&story_arc, styles.style_preset);

        let final_score = match mode {
            AnalysisMode::Full => {
                object_score(&object) * 0.3
                    + emotion_score(&emotion) * 0.25
                    + story_score(&story_arc) * 0.25
                    + style_score(&story_arc, &style_treatment) * 0.2
            }
            AnalysisMode::Fast => {
                fast_object_score(&object) * 0.5 + story_arc.story_importance * 0.3 + 0.5 * 0.2
            }
        }
        .min(1.0);

        let selection_reason = selection_reason(&object, &emotion, &story_arc, final_score);

        tracing::info!(
            "Analysis complete: score {:.2} ({})",
            final_score,
            &selection_reason[..selection_reason.len().min(50)]
        );

        SelectionResult {
            clip_path: clip_path.to_path_buf(),
            object_analysis: object,
            emotion_analysis: emotion,
            story_arc,
            style_treatment,
            final_score,
            selection_reason,
        }
    }
}

/// Object sub-score for full analysis
fn object_score(object: &ObjectAnalysis) -> f64 {
    let mut score: f64 = 0.0;
    if object.count(ObjectKind::WeddingRings) > 0 {
        score += 0.4;
    }
    if object.count(ObjectKind::WeddingCake) > 0 {
        score += 0.3;
    }
    if object.count(ObjectKind::CeremonyMoments) > 0 {
        score += 0.5;
    }
    if object.count(ObjectKind::Dancing) > 0 {
        score += 0.2;
    }
    if object.count(ObjectKind::People) > 2 {
        score += 0.1;
    }

    let key_moments = object.key_moments.len();
    if key_moments > 3 {
        score += 0.2;
    } else if key_moments > 1 {
        score += 0.1;
    }

    score.min(1.0)
}

/// Simplified object sub-score for fast analysis
fn fast_object_score(object: &ObjectAnalysis) -> f64 {
    (object.key_moments.len() as f64 / 10.0).min(1.0)
}

/// Emotion sub-score for full analysis
fn emotion_score(emotion: &EmotionAnalysis) -> f64 {
    let mut score: f64 = 0.0;
    if emotion.score(Emotion::Joy) > 0.6 {
        score += 0.3;
    }
    if emotion.score(Emotion::Love) > 0.5 {
        score += 0.4;
    }
    if emotion.score(Emotion::Celebration) > 0.6 {
        score += 0.2;
    }
    if emotion.score(Emotion::Tenderness) > 0.5 {
        score += 0.3;
    }

    if emotion.excitement_level > 0.7 {
        score += 0.2;
    } else if emotion.excitement_level > 0.4 {
        score += 0.1;
    }

    match emotion.overall_sentiment {
        Sentiment::Positive => score += 0.2,
        Sentiment::Neutral => score += 0.1,
        Sentiment::Negative => {}
    }

    if emotion.emotional_moments.len() > 2 {
        score += 0.1;
    }

    score.min(1.0)
}

/// Story sub-score from importance, scene, tone, and position tables
fn story_score(story_arc: &StoryArc) -> f64 {
    let scene_score = match story_arc.scene_classification {
        SceneClass::Ceremony => 0.9,
        SceneClass::IntimateMoments => 0.8,
        SceneClass::Reception => 0.7,
        SceneClass::Preparation => 0.6,
        SceneClass::Party => 0.5,
        SceneClass::ScenicMoments => 0.4,
    };

    let tone_score = match story_arc.emotional_tone {
        EmotionalTone::Romantic => 0.9,
        EmotionalTone::Intimate => 0.8,
        EmotionalTone::Joyful => 0.7,
        EmotionalTone::Dramatic => 0.6,
        EmotionalTone::Celebratory => 0.5,
    };

    let position_score = match story_arc.narrative_position {
        NarrativePosition::Climax => 0.9,
        NarrativePosition::RisingAction => 0.8,
        NarrativePosition::FallingAction => 0.7,
        NarrativePosition::Opening => 0.6,
        NarrativePosition::Resolution => 0.5,
    };

    (story_arc.story_importance * 0.4
        + scene_score * 0.3
        + tone_score * 0.2
        + position_score * 0.1)
        .min(1.0)
}

/// Style compatibility sub-score
fn style_score(story_arc: &StoryArc, treatment: &StyleTreatment) -> f64 {
    let mut score: f64 = 0.5;

    let tone_matches: &[StylePreset] = match story_arc.emotional_tone {
        EmotionalTone::Romantic => &[StylePreset::Romantic, StylePreset::Cinematic],
        EmotionalTone::Joyful => &[StylePreset::Energetic, StylePreset::Documentary],
        EmotionalTone::Dramatic => &[StylePreset::Cinematic],
        EmotionalTone::Intimate => &[StylePreset::Romantic, StylePreset::Documentary],
        EmotionalTone::Celebratory => &[StylePreset::Energetic],
    };
    if tone_matches.contains(&treatment.applied_style) {
        score += 0.3;
    }

    let scene_matches: &[StylePreset] = match story_arc.scene_classification {
        SceneClass::Ceremony => &[StylePreset::Cinematic, StylePreset::Romantic],
        SceneClass::IntimateMoments => &[StylePreset::Romantic, StylePreset::Documentary],
        SceneClass::Party => &[StylePreset::Energetic, StylePreset::Documentary],
        SceneClass::Preparation => &[StylePreset::Documentary, StylePreset::Romantic],
        _ => &[],
    };
    if scene_matches.contains(&treatment.applied_style) {
        score += 0.2;
    }

    score.min(1.0)
}

/// Compose the human-readable selection reason
fn selection_reason(
    object: &ObjectAnalysis,
    emotion: &EmotionAnalysis,
    story_arc: &StoryArc,
    final_score: f64,
) -> String {
    let mut reasons: Vec<String> = Vec::new();

    if object.count(ObjectKind::WeddingRings) >= 2 {
        reasons.push("features ring exchange".to_string());
    }
    if object.count(ObjectKind::WeddingCake) >= 2 {
        reasons.push("includes cake cutting".to_string());
    }
    if object.count(ObjectKind::CeremonyMoments) >= 3 {
        reasons.push("shows ceremony moments".to_string());
    }
    if object.count(ObjectKind::Dancing) >= 2 {
        reasons.push("captures dancing".to_string());
    }
    if object.count(ObjectKind::People) >= 5 {
        reasons.push("shows wedding party".to_string());
    }

    if emotion.score(Emotion::Joy) > 0.7 {
        reasons.push("high joy and happiness".to_string());
    }
    if emotion.score(Emotion::Love) > 0.6 {
        reasons.push("romantic and loving".to_string());
    }
    if emotion.score(Emotion::Celebration) > 0.7 {
        reasons.push("celebratory atmosphere".to_string());
    }

    if story_arc.story_importance > 0.7 {
        reasons.push("high story importance".to_string());
    }
    match story_arc.emotional_tone {
        EmotionalTone::Romantic => reasons.push("romantic tone".to_string()),
        EmotionalTone::Intimate => reasons.push("intimate moment".to_string()),
        _ => {}
    }
    if story_arc.narrative_position == NarrativePosition::Climax {
        reasons.push("climactic moment".to_string());
    }

    if object.key_moments.len() > 3 {
        reasons.push(format!("{} key moments", object.key_moments.len()));
    }

    if final_score > 0.8 {
        reasons.push("excellent overall quality".to_string());
    } else if final_score > 0.6 {
        reasons.push("good quality".to_string());
    } else {
        reasons.push("decent quality".to_string());
    }

    reasons.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn object_with(pairs: &[(ObjectKind, u32)], key_moments: usize) -> ObjectAnalysis {
        let mut analysis = ObjectAnalysis::empty(Path::new("/clips/a.mp4"));
        analysis.objects_detected = pairs.iter().copied().collect();
        analysis.key_moments = (0..key_moments).map(|i| i as f64 * 1.5).collect();
        analysis
    }

    fn emotion_with(pairs: &[(Emotion, f64)], excitement: f64) -> EmotionAnalysis {
        let mut analysis = EmotionAnalysis::neutral(Path::new("/clips/a.mp4"), 5.0);
        analysis.emotions = pairs.iter().copied().collect::<BTreeMap<_, _>>();
        analysis.excitement_level = excitement;
        analysis
    }

    #[test]
    fn test_object_score_range() {
        let rich = object_with(
            &[
                (ObjectKind::WeddingRings, 2),
                (ObjectKind::WeddingCake, 1),
                (ObjectKind::CeremonyMoments, 4),
                (ObjectKind::Dancing, 3),
                (ObjectKind::People, 6),
            ],
            5,
        );
        assert!((object_score(&rich) - 1.0).abs() < 1e-9);

        let empty = object_with(&[], 0);
        assert_eq!(object_score(&empty), 0.0);
    }

    #[test]
    fn test_fast_object_score_from_key_moments() {
        assert_eq!(fast_object_score(&object_with(&[], 0)), 0.0);
        assert!((fast_object_score(&object_with(&[], 5)) - 0.5).abs() < 1e-9);
        assert_eq!(fast_object_score(&object_with(&[], 20)), 1.0);
    }

    #[test]
    fn test_emotion_score_neutral_baseline() {
        let neutral = EmotionAnalysis::neutral(Path::new("/clips/a.mp4"), 5.0);
        // Neutral sentiment contributes its baseline only
        assert!((emotion_score(&neutral) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_emotion_score_capped() {
        let rich = emotion_with(
            &[
                (Emotion::Joy, 0.9),
                (Emotion::Love, 0.9),
                (Emotion::Celebration, 0.9),
                (Emotion::Tenderness, 0.9),
            ],
            0.9,
        );
        let mut rich = rich;
        rich.overall_sentiment = Sentiment::Positive;
        assert!((emotion_score(&rich) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_selection_reason_always_scored() {
        let object = object_with(&[], 0);
        let emotion = emotion_with(&[], 0.0);
        let arc = StoryArcBuilder::new().build(&object, &emotion, NarrativeStyle::Traditional);
        let reason = selection_reason(&object, &emotion, &arc, 0.2);
        assert!(reason.contains("decent quality"));
    }

    #[test]
    fn test_final_score_weights_sum_to_one() {
        // Sub-scores are each capped at 1.0, so the fusion caps at 1.0 too
        assert!((0.3 + 0.25 + 0.25 + 0.2 - 1.0f64).abs() < 1e-9);
        assert!((0.5 + 0.3 + 0.2 - 1.0f64).abs() < 1e-9);
    }
}
