use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analysis::emotion::{Emotion, EmotionAnalysis};
use crate::analysis::objects::{ObjectAnalysis, ObjectKind, SceneClass};
use crate::story::{EmotionalTone, NarrativePosition, NarrativeStyle};

/// Narrative classification for one clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryArc {
    pub clip_path: PathBuf,
    /// Scene classification refined by emotional context
    pub scene_classification: SceneClass,
    /// Importance of the clip to the story, in [0, 1]
    pub story_importance: f64,
    pub narrative_position: NarrativePosition,
    pub emotional_tone: EmotionalTone,
    /// Suggested clip duration in seconds, in [1, 8]
    pub recommended_duration: f64,
    /// Human-readable story context
    pub story_notes: String,
}

/// Builds story arcs from object and emotion analyses. Pure: the same
/// inputs always produce the same arc.
pub struct StoryArcBuilder;

impl StoryArcBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        object: &ObjectAnalysis,
        emotion: &EmotionAnalysis,
        style: NarrativeStyle,
    ) -> StoryArc {
        let scene = refine_scene(object, emotion);
        let importance = story_importance(object, emotion);
        let position = narrative_position(scene, style);
        let tone = emotional_tone(emotion, scene);
        let duration = recommended_duration(scene, importance, tone);
        let notes = story_notes(scene, object, emotion);

        StoryArc {
            clip_path: object.clip_path.clone(),
            scene_classification: scene,
            story_importance: importance,
            narrative_position: position,
            emotional_tone: tone,
            recommended_duration: duration,
            story_notes: notes,
        }
    }
}

impl Default for StoryArcBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Refine the object-derived scene with emotional context
fn refine_scene(object: &ObjectAnalysis, emotion: &EmotionAnalysis) -> SceneClass {
    let scene = object.scene_classification;
    let excitement = emotion.excitement_level;
    let tenderness = emotion.score(Emotion::Tenderness);
    let love = emotion.score(Emotion::Love);

    if scene == SceneClass::Ceremony && excitement > 0.7 {
        SceneClass::Ceremony
    } else if scene == SceneClass::Party && tenderness > 0.5 {
        SceneClass::IntimateMoments
    } else if scene == SceneClass::Reception && excitement > 0.8 {
        SceneClass::Party
    } else if love > 0.6 && excitement < 0.4 {
        SceneClass::IntimateMoments
    } else {
        scene
    }
}

/// Weighted sum over object and emotion signals, capped at 1.0
fn story_importance(object: &ObjectAnalysis, emotion: &EmotionAnalysis) -> f64 {
    let mut importance: f64 = 0.0;

    if object.count(ObjectKind::WeddingRings) > 0 {
        importance += 0.3;
    }
    if object.count(ObjectKind::WeddingCake) > 0 {
        importance += 0.2;
    }
    if object.count(ObjectKind::CeremonyMoments) > 0 {
        importance += 0.4;
    }
    if object.count(ObjectKind::Dancing) > 0 {
        importance += 0.1;
    }

    if emotion.score(Emotion::Joy) > 0.7 {
        importance += 0.2;
    }
    if emotion.score(Emotion::Love) > 0.6 {
        importance += 0.3;
    }
    if emotion.score(Emotion::Celebration) > 0.7 {
        importance += 0.1;
    }

    if object.key_moments.len() > 2 {
        importance += 0.1;
    }

    importance.min(1.0)
}

/// Table lookup from refined scene to position in the arc. The narrative
/// style currently shares one mapping across templates.
fn narrative_position(scene: SceneClass, _style: NarrativeStyle) -> NarrativePosition {
    match scene {
        SceneClass::Preparation => NarrativePosition::Opening,
        SceneClass::Ceremony => NarrativePosition::Climax,
        SceneClass::Reception => NarrativePosition::FallingAction,
        SceneClass::Party => NarrativePosition::Resolution,
        SceneClass::IntimateMoments => NarrativePosition::RisingAction,
        SceneClass::ScenicMoments => NarrativePosition::RisingAction,
    }
}

/// Argmax over the five tone scorers
fn emotional_tone(emotion: &EmotionAnalysis, scene: SceneClass) -> EmotionalTone {
    let excitement = emotion.excitement_level;

    EmotionalTone::ALL
        .iter()
        .map(|&tone| (tone, tone_score(tone, emotion, excitement, scene)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(b.0.cmp(&a.0)))
        .map(|(tone, _)| tone)
        .unwrap_or(EmotionalTone::Joyful)
}

fn tone_score(
    tone: EmotionalTone,
    emotion: &EmotionAnalysis,
    excitement: f64,
    scene: SceneClass,
) -> f64 {
    let mut score = 0.0;
    match tone {
        EmotionalTone::Romantic => {
            if emotion.score(Emotion::Love) > 0.5 {
                score += 0.6;
            }
            if emotion.score(Emotion::Tenderness) > 0.4 {
                score += 0.4;
            }
            if matches!(scene, SceneClass::Ceremony | SceneClass::IntimateMoments) {
                score += 0.3;
            }
        }
        EmotionalTone::Joyful => {
            if emotion.score(Emotion::Joy) > 0.6 {
                score += 0.8;
            }
            if excitement > 0.5 {
                score += 0.4;
            }
            if matches!(scene, SceneClass::Party | SceneClass::Reception) {
                score += 0.3;
            }
        }
        EmotionalTone::Dramatic => {
            if emotion.score(Emotion::Surprise) > 0.5 {
                score += 0.6;
            }
            if scene == SceneClass::Ceremony {
                score += 0.4;
            }
            if excitement > 0.6 {
                score += 0.3;
            }
        }
        EmotionalTone::Intimate => {
            if emotion.score(Emotion::Tenderness) > 0.6 {
                score += 0.8;
            }
            if emotion.score(Emotion::Love) > 0.5 {
                score += 0.6;
            }
            if excitement < 0.4 {
                score += 0.4;
            }
        }
        EmotionalTone::Celebratory => {
            if emotion.score(Emotion::Celebration) > 0.6 {
                score += 0.8;
            }
            if excitement > 0.7 {
                score += 0.6;
            }
            if matches!(scene, SceneClass::Party | SceneClass::Reception) {
                score += 0.4;
            }
        }
    }
    score
}

/// Scene base duration adjusted by importance and tone, clamped to [1, 8]
fn recommended_duration(scene: SceneClass, importance: f64, tone: EmotionalTone) -> f64 {
    let base = match scene {
        SceneClass::Preparation => 3.0,
        SceneClass::Ceremony => 5.0,
        SceneClass::Reception => 4.0,
        SceneClass::Party => 3.0,
        SceneClass::IntimateMoments => 4.0,
        SceneClass::ScenicMoments => 3.0,
    };

    let importance_multiplier = 0.5 + importance * 0.5;
    let tone_multiplier = match tone {
        EmotionalTone::Romantic => 1.2,
        EmotionalTone::Intimate => 1.3,
        EmotionalTone::Dramatic => 1.1,
        EmotionalTone::Joyful => 0.9,
        EmotionalTone::Celebratory => 0.8,
    };

    (base * importance_multiplier * tone_multiplier).clamp(1.0, 8.0)
}

/// Human-readable story context for the clip
fn story_notes(scene: SceneClass, object: &ObjectAnalysis, emotion: &EmotionAnalysis) -> String {
    let mut notes = vec![match scene {
        SceneClass::Preparation => "Getting ready moments with anticipation and excitement",
        SceneClass::Ceremony => "The main ceremony with vows, ring exchange, and the kiss",
        SceneClass::Reception => "Cocktail hour and dinner with speeches and toasts",
        SceneClass::Party => "Dancing and celebration with high energy",
        SceneClass::IntimateMoments => "Romantic and tender moments between the couple",
        SceneClass::ScenicMoments => "Beautiful location shots and environmental beauty",
    }
    .to_string()];

    if object.count(ObjectKind::WeddingRings) > 0 {
        notes.push("Features ring exchange - a key wedding moment".to_string());
    }
    if object.count(ObjectKind::WeddingCake) > 0 {
        notes.push("Includes cake cutting ceremony".to_string());
    }
    if object.count(ObjectKind::Dancing) > 0 {
        notes.push("Shows dancing and celebration".to_string());
    }
    if object.count(ObjectKind::People) > 3 {
        notes.push("Features multiple people - great for group shots".to_string());
    }

    if emotion.score(Emotion::Joy) > 0.7 {
        notes.push("High joy and happiness - perfect for highlight".to_string());
    }
    if emotion.score(Emotion::Love) > 0.6 {
        notes.push("Romantic and loving moments".to_string());
    }
    if emotion.score(Emotion::Celebration) > 0.7 {
        notes.push("Celebratory and festive atmosphere".to_string());
    }

    if object.key_moments.len() > 2 {
        notes.push(format!("Contains {} key moments", object.key_moments.len()));
    }

    notes.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn object_with(pairs: &[(ObjectKind, u32)], scene: SceneClass) -> ObjectAnalysis {
        let mut analysis = ObjectAnalysis::empty(Path::new("/clips/a.mp4"));
        analysis.objects_detected = pairs.iter().copied().collect();
        analysis.scene_classification = scene;
        analysis
    }

    fn emotion_with(pairs: &[(Emotion, f64)], excitement: f64) -> EmotionAnalysis {
        let mut analysis = EmotionAnalysis::neutral(Path::new("/clips/a.mp4"), 5.0);
        analysis.emotions = pairs.iter().copied().collect::<BTreeMap<_, _>>();
        analysis.excitement_level = excitement;
        analysis
    }

    #[test]
    fn test_tender_party_becomes_intimate() {
        let object = object_with(&[], SceneClass::Party);
        let emotion = emotion_with(&[(Emotion::Tenderness, 0.6)], 0.5);
        assert_eq!(refine_scene(&object, &emotion), SceneClass::IntimateMoments);
    }

    #[test]
    fn test_calm_love_becomes_intimate() {
        let object = object_with(&[], SceneClass::Preparation);
        let emotion = emotion_with(&[(Emotion::Love, 0.7)], 0.2);
        assert_eq!(refine_scene(&object, &emotion), SceneClass::IntimateMoments);
    }

    #[test]
    fn test_excited_reception_becomes_party() {
        let object = object_with(&[], SceneClass::Reception);
        let emotion = emotion_with(&[], 0.85);
        assert_eq!(refine_scene(&object, &emotion), SceneClass::Party);
    }

    #[test]
    fn test_importance_capped_at_one() {
        let object = object_with(
            &[
                (ObjectKind::WeddingRings, 2),
                (ObjectKind::WeddingCake, 1),
                (ObjectKind::CeremonyMoments, 5),
                (ObjectKind::Dancing, 3),
            ],
            SceneClass::Ceremony,
        );
        let emotion = emotion_with(
            &[
                (Emotion::Joy, 0.9),
                (Emotion::Love, 0.9),
                (Emotion::Celebration, 0.9),
            ],
            0.9,
        );
        let importance = story_importance(&object, &emotion);
        assert!((importance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_importance_of_empty_clip_is_zero() {
        let object = object_with(&[], SceneClass::Preparation);
        let emotion = emotion_with(&[], 0.0);
        assert_eq!(story_importance(&object, &emotion), 0.0);
    }

    #[test]
    fn test_duration_clamped() {
        for scene in [SceneClass::Ceremony, SceneClass::Party, SceneClass::ScenicMoments] {
            for importance in [0.0, 0.5, 1.0] {
                for tone in EmotionalTone::ALL {
                    let d = recommended_duration(scene, importance, tone);
                    assert!((1.0..=8.0).contains(&d), "{d} out of range");
                }
            }
        }
    }

    #[test]
    fn test_ceremony_maps_to_climax() {
        assert_eq!(
            narrative_position(SceneClass::Ceremony, NarrativeStyle::Traditional),
            NarrativePosition::Climax
        );
        assert_eq!(
            narrative_position(SceneClass::Party, NarrativeStyle::Modern),
            NarrativePosition::Resolution
        );
    }

    #[test]
    fn test_full_build_is_deterministic() {
        let object = object_with(&[(ObjectKind::CeremonyMoments, 4)], SceneClass::Ceremony);
        let emotion = emotion_with(&[(Emotion::Joy, 0.8)], 0.6);
        let builder = StoryArcBuilder::new();

        let a = builder.build(&object, &emotion, NarrativeStyle::Traditional);
        let b = builder.build(&object, &emotion, NarrativeStyle::Traditional);
        assert_eq!(a.scene_classification, b.scene_classification);
        assert_eq!(a.story_importance, b.story_importance);
        assert_eq!(a.emotional_tone, b.emotional_tone);
        assert_eq!(a.recommended_duration, b.recommended_duration);
        assert!((1.0..=8.0).contains(&a.recommended_duration));
        assert!(!a.story_notes.is_empty());
    }
}
