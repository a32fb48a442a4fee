use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analysis::objects::SceneClass;
use crate::story::arc::StoryArc;
use crate::story::{EmotionalTone, NarrativePosition};

/// Named editing-style presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StylePreset {
    Romantic,
    Energetic,
    Cinematic,
    Documentary,
}

impl StylePreset {
    pub const ALL: [StylePreset; 4] = [
        StylePreset::Romantic,
        StylePreset::Energetic,
        StylePreset::Cinematic,
        StylePreset::Documentary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StylePreset::Romantic => "romantic",
            StylePreset::Energetic => "energetic",
            StylePreset::Cinematic => "cinematic",
            StylePreset::Documentary => "documentary",
        }
    }

    fn config(&self) -> PresetConfig {
        match self {
            StylePreset::Romantic => PresetConfig {
                color_grade: ColorGrade::WarmTones,
                transition: TransitionStyle::SoftCrossfade,
                duration_preference: DurationPreference::Longer,
                music_tempo: "slow_to_medium",
                focus: "emotional_moments",
                saturation: 1.1,
                warmth: 1.2,
                contrast: 0.9,
                brightness_offset: 0.1,
            },
            StylePreset::Energetic => PresetConfig {
                color_grade: ColorGrade::Vibrant,
                transition: TransitionStyle::QuickCuts,
                duration_preference: DurationPreference::Shorter,
                music_tempo: "fast",
                focus: "action_moments",
                saturation: 1.3,
                warmth: 1.0,
                contrast: 1.1,
                brightness_offset: 0.0,
            },
            StylePreset::Cinematic => PresetConfig {
                color_grade: ColorGrade::FilmLook,
                transition: TransitionStyle::CinematicWipes,
                duration_preference: DurationPreference::Varied,
                music_tempo: "dramatic",
                focus: "story_beats",
                saturation: 0.9,
                warmth: 1.1,
                contrast: 1.2,
                brightness_offset: -0.1,
            },
            StylePreset::Documentary => PresetConfig {
                color_grade: ColorGrade::Natural,
                transition: TransitionStyle::Fade,
                duration_preference: DurationPreference::Medium,
                music_tempo: "moderate",
                focus: "authentic_moments",
                saturation: 1.0,
                warmth: 1.0,
                contrast: 1.0,
                brightness_offset: 0.0,
            },
        }
    }
}

impl std::str::FromStr for StylePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "romantic" => Ok(StylePreset::Romantic),
            "energetic" => Ok(StylePreset::Energetic),
            "cinematic" => Ok(StylePreset::Cinematic),
            "documentary" => Ok(StylePreset::Documentary),
            other => Err(format!("unknown style preset: {other}")),
        }
    }
}

/// Configuration bundle behind a preset
#[derive(Debug, Clone)]
struct PresetConfig {
    color_grade: ColorGrade,
    transition: TransitionStyle,
    duration_preference: DurationPreference,
    music_tempo: &'static str,
    focus: &'static str,
    saturation: f64,
    warmth: f64,
    contrast: f64,
    brightness_offset: f64,
}

/// Color grading looks with their ffmpeg filter strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorGrade {
    WarmTones,
    Vibrant,
    FilmLook,
    Natural,
}

impl ColorGrade {
    pub fn ffmpeg_filter(&self) -> &'static str {
        match self {
            ColorGrade::WarmTones => {
                "colorbalance=rs=0.1:gs=0.05:bs=-0.1:rm=0.1:gm=0.05:bm=-0.1"
            }
            ColorGrade::Vibrant => "eq=saturation=1.3:contrast=1.1",
            ColorGrade::FilmLook => {
                "colorbalance=rs=0.05:gs=0.02:bs=-0.05:rm=0.05:gm=0.02:bm=-0.05,eq=contrast=1.2"
            }
            ColorGrade::Natural => "eq=saturation=1.0:contrast=1.0",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ColorGrade::WarmTones => "Warm, golden tones perfect for romantic moments",
            ColorGrade::Vibrant => "Bright, saturated colors for energetic moments",
            ColorGrade::FilmLook => "Cinematic film look with enhanced contrast",
            ColorGrade::Natural => "Natural colors with minimal processing",
        }
    }
}

/// Transition styles between clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    SoftCrossfade,
    QuickCuts,
    CinematicWipes,
    Fade,
}

impl TransitionStyle {
    pub fn duration(&self) -> f64 {
        match self {
            TransitionStyle::SoftCrossfade => 0.8,
            TransitionStyle::QuickCuts => 0.2,
            TransitionStyle::CinematicWipes => 1.2,
            TransitionStyle::Fade => 0.5,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            TransitionStyle::SoftCrossfade => "Soft crossfade between clips",
            TransitionStyle::QuickCuts => "Quick cuts with minimal transition",
            TransitionStyle::CinematicWipes => "Cinematic wipe transitions",
            TransitionStyle::Fade => "Simple fade transitions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationPreference {
    Longer,
    Shorter,
    Varied,
    Medium,
}

impl DurationPreference {
    fn multiplier(&self) -> f64 {
        match self {
            DurationPreference::Longer => 1.3,
            DurationPreference::Shorter => 0.7,
            DurationPreference::Varied | DurationPreference::Medium => 1.0,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            DurationPreference::Longer => "longer",
            DurationPreference::Shorter => "shorter",
            DurationPreference::Varied => "varied",
            DurationPreference::Medium => "medium",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            DurationPreference::Longer => "Longer clips for emotional impact",
            DurationPreference::Shorter => "Shorter clips for fast-paced editing",
            DurationPreference::Varied => "Varied clip lengths for dynamic pacing",
            DurationPreference::Medium => "Medium-length clips for balanced pacing",
        }
    }
}

/// Snapshot of a preset's full configuration, reflected back to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetSummary {
    pub name: StylePreset,
    pub description: String,
    pub color_grade: ColorGradeSummary,
    pub transitions: TransitionSummary,
    pub timing: TimingSummary,
    pub focus: String,
    pub technical: TechnicalSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorGradeSummary {
    pub name: ColorGrade,
    pub description: String,
    pub saturation: f64,
    pub warmth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionSummary {
    pub name: TransitionStyle,
    pub description: String,
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSummary {
    pub music_tempo: String,
    pub clip_duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSummary {
    pub contrast: f64,
    pub brightness: f64,
}

/// Result of applying a preset to a story arc
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleTreatment {
    pub clip_path: PathBuf,
    pub applied_style: StylePreset,
    pub color_grade: ColorGrade,
    pub transition: TransitionStyle,
    /// Arc-recommended duration adjusted for the preset, in [1, 10]
    pub recommended_duration: f64,
    pub style_notes: String,
}

/// Applies editing-style presets on top of story arcs
pub struct StylePresetEngine;

impl StylePresetEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, story_arc: &StoryArc, preset: StylePreset) -> StyleTreatment {
        let config = preset.config();

        let duration =
            (story_arc.recommended_duration * config.duration_preference.multiplier())
                .clamp(1.0, 10.0);
        let color_grade = select_color_grade(story_arc, preset, &config);
        let transition = select_transition(story_arc, preset, &config);
        let notes = style_notes(preset, &config, color_grade, transition);

        StyleTreatment {
            clip_path: story_arc.clip_path.clone(),
            applied_style: preset,
            color_grade,
            transition,
            recommended_duration: duration,
            style_notes: notes,
        }
    }

    /// All registered presets
    pub fn available_presets(&self) -> Vec<StylePreset> {
        StylePreset::ALL.to_vec()
    }

    /// Full configuration snapshot for a preset, including the color
    /// grading and technical numbers behind it
    pub fn summary(&self, preset: StylePreset) -> PresetSummary {
        let config = preset.config();
        PresetSummary {
            name: preset,
            description: format!("{} style for wedding highlights", preset.as_str()),
            color_grade: ColorGradeSummary {
                name: config.color_grade,
                description: config.color_grade.description().to_string(),
                saturation: config.saturation,
                warmth: config.warmth,
            },
            transitions: TransitionSummary {
                name: config.transition,
                description: config.transition.description().to_string(),
                duration: config.transition.duration(),
            },
            timing: TimingSummary {
                music_tempo: config.music_tempo.to_string(),
                clip_duration: config.duration_preference.as_str().to_string(),
            },
            focus: config.focus.to_string(),
            technical: TechnicalSummary {
                contrast: config.contrast,
                brightness: config.brightness_offset,
            },
        }
    }

    /// Rank presets for a story arc by tone and scene affinity
    pub fn recommendations(&self, story_arc: &StoryArc) -> Vec<(StylePreset, f64)> {
        let mut ranked: Vec<(StylePreset, f64)> = StylePreset::ALL
            .iter()
            .map(|&preset| {
                let mut score = tone_affinity(story_arc.emotional_tone, preset) * 0.4
                    + scene_affinity(story_arc.scene_classification, preset) * 0.3;

                if story_arc.story_importance > 0.7 && preset == StylePreset::Cinematic {
                    score += 0.2;
                } else if story_arc.story_importance < 0.3 && preset == StylePreset::Documentary {
                    score += 0.2;
                }

                (preset, score)
            })
            .collect();

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        ranked
    }
}

impl Default for StylePresetEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Tone can override the preset grade for the presets that allow it
fn select_color_grade(
    story_arc: &StoryArc,
    preset: StylePreset,
    config: &PresetConfig,
) -> ColorGrade {
    let suggested = match story_arc.emotional_tone {
        EmotionalTone::Romantic | EmotionalTone::Intimate => ColorGrade::WarmTones,
        EmotionalTone::Joyful | EmotionalTone::Celebratory => ColorGrade::Vibrant,
        EmotionalTone::Dramatic => ColorGrade::FilmLook,
    };

    if matches!(preset, StylePreset::Romantic | StylePreset::Cinematic) {
        suggested
    } else {
        config.color_grade
    }
}

/// Narrative position can override the transition for the presets that
/// allow it
fn select_transition(
    story_arc: &StoryArc,
    preset: StylePreset,
    config: &PresetConfig,
) -> TransitionStyle {
    let suggested = match story_arc.narrative_position {
        NarrativePosition::Opening | NarrativePosition::Resolution => TransitionStyle::Fade,
        NarrativePosition::RisingAction | NarrativePosition::FallingAction => {
            TransitionStyle::SoftCrossfade
        }
        NarrativePosition::Climax => TransitionStyle::CinematicWipes,
    };

    if matches!(preset, StylePreset::Cinematic | StylePreset::Documentary) {
        suggested
    } else {
        config.transition
    }
}

fn style_notes(
    preset: StylePreset,
    config: &PresetConfig,
    color_grade: ColorGrade,
    transition: TransitionStyle,
) -> String {
    let focus = match config.focus {
        "emotional_moments" => "Focus on emotional and romantic moments",
        "action_moments" => "Focus on dynamic and energetic moments",
        "story_beats" => "Focus on key story moments and narrative flow",
        _ => "Focus on natural and authentic moments",
    };

    format!(
        "Applied {} style; Color: {}; Transitions: {}; {}; {}",
        preset.as_str(),
        color_grade.description(),
        transition.description(),
        focus,
        config.duration_preference.description()
    )
}

fn tone_affinity(tone: EmotionalTone, preset: StylePreset) -> f64 {
    use EmotionalTone::*;
    use StylePreset::*;
    match (tone, preset) {
        (EmotionalTone::Romantic, StylePreset::Romantic) => 0.9,
        (EmotionalTone::Romantic, Cinematic) => 0.7,
        (EmotionalTone::Romantic, Documentary) => 0.5,
        (EmotionalTone::Romantic, Energetic) => 0.2,
        (Joyful, Energetic) => 0.9,
        (Joyful, Documentary) => 0.6,
        (Joyful, Cinematic) => 0.5,
        (Joyful, StylePreset::Romantic) => 0.4,
        (Dramatic, Cinematic) => 0.9,
        (Dramatic, StylePreset::Romantic) => 0.6,
        (Dramatic, Documentary) => 0.4,
        (Dramatic, Energetic) => 0.3,
        (Intimate, StylePreset::Romantic) => 0.9,
        (Intimate, Documentary) => 0.7,
        (Intimate, Cinematic) => 0.5,
        (Intimate, Energetic) => 0.1,
        (Celebratory, Energetic) => 0.9,
        (Celebratory, Documentary) => 0.6,
        (Celebratory, Cinematic) => 0.5,
        (Celebratory, StylePreset::Romantic) => 0.4,
    }
}

fn scene_affinity(scene: SceneClass, preset: StylePreset) -> f64 {
    use SceneClass::*;
    use StylePreset::*;
    match (scene, preset) {
        (Preparation, Documentary) => 0.8,
        (Preparation, Romantic) => 0.6,
        (Preparation, Cinematic) => 0.5,
        (Preparation, Energetic) => 0.3,
        (Ceremony, Cinematic) => 0.9,
        (Ceremony, Romantic) => 0.8,
        (Ceremony, Documentary) => 0.6,
        (Ceremony, Energetic) => 0.2,
        (Reception, Documentary) => 0.7,
        (Reception, Energetic) => 0.6,
        (Reception, Romantic) => 0.5,
        (Reception, Cinematic) => 0.4,
        (Party, Energetic) => 0.9,
        (Party, Documentary) => 0.6,
        (Party, Cinematic) => 0.5,
        (Party, Romantic) => 0.3,
        (IntimateMoments, Romantic) => 0.9,
        (IntimateMoments, Documentary) => 0.7,
        (IntimateMoments, Cinematic) => 0.6,
        (IntimateMoments, Energetic) => 0.1,
        (ScenicMoments, Cinematic) => 0.8,
        (ScenicMoments, Documentary) => 0.7,
        (ScenicMoments, Romantic) => 0.5,
        (ScenicMoments, Energetic) => 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn arc(scene: SceneClass, tone: EmotionalTone, importance: f64) -> StoryArc {
        StoryArc {
            clip_path: Path::new("/clips/a.mp4").to_path_buf(),
            scene_classification: scene,
            story_importance: importance,
            narrative_position: NarrativePosition::Climax,
            emotional_tone: tone,
            recommended_duration: 5.0,
            story_notes: String::new(),
        }
    }

    #[test]
    fn test_apply_adjusts_duration_for_preference() {
        let engine = StylePresetEngine::new();
        let story = arc(SceneClass::Ceremony, EmotionalTone::Romantic, 0.8);

        let romantic = engine.apply(&story, StylePreset::Romantic);
        assert!((romantic.recommended_duration - 6.5).abs() < 1e-9);

        let energetic = engine.apply(&story, StylePreset::Energetic);
        assert!((energetic.recommended_duration - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_duration_clamped_to_ten() {
        let engine = StylePresetEngine::new();
        let mut story = arc(SceneClass::Ceremony, EmotionalTone::Romantic, 1.0);
        story.recommended_duration = 8.0;
        let treatment = engine.apply(&story, StylePreset::Romantic);
        assert!(treatment.recommended_duration <= 10.0);
    }

    #[test]
    fn test_romantic_tone_overrides_cinematic_grade() {
        let engine = StylePresetEngine::new();
        let story = arc(SceneClass::Ceremony, EmotionalTone::Romantic, 0.5);
        let treatment = engine.apply(&story, StylePreset::Cinematic);
        assert_eq!(treatment.color_grade, ColorGrade::WarmTones);
    }

    #[test]
    fn test_energetic_keeps_its_grade() {
        let engine = StylePresetEngine::new();
        let story = arc(SceneClass::Party, EmotionalTone::Romantic, 0.5);
        let treatment = engine.apply(&story, StylePreset::Energetic);
        assert_eq!(treatment.color_grade, ColorGrade::Vibrant);
    }

    #[test]
    fn test_recommendations_prefer_matching_preset() {
        let engine = StylePresetEngine::new();
        let story = arc(SceneClass::Party, EmotionalTone::Celebratory, 0.5);
        let ranked = engine.recommendations(&story);
        assert_eq!(ranked[0].0, StylePreset::Energetic);
        assert!(ranked.windows(2).all(|pair| pair[0].1 >= pair[1].1));
    }

    #[test]
    fn test_summary_surfaces_preset_numbers() {
        let engine = StylePresetEngine::new();

        let romantic = engine.summary(StylePreset::Romantic);
        assert_eq!(romantic.color_grade.saturation, 1.1);
        assert_eq!(romantic.color_grade.warmth, 1.2);
        assert_eq!(romantic.technical.contrast, 0.9);
        assert_eq!(romantic.technical.brightness, 0.1);
        assert_eq!(romantic.timing.music_tempo, "slow_to_medium");
        assert_eq!(romantic.timing.clip_duration, "longer");

        let cinematic = engine.summary(StylePreset::Cinematic);
        assert_eq!(cinematic.technical.brightness, -0.1);
        assert_eq!(cinematic.color_grade.name, ColorGrade::FilmLook);
    }

    #[test]
    fn test_available_presets_complete() {
        let engine = StylePresetEngine::new();
        let presets = engine.available_presets();
        assert_eq!(presets.len(), 4);
        for preset in presets {
            assert!(!engine.summary(preset).focus.is_empty());
        }
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("romantic".parse::<StylePreset>().unwrap(), StylePreset::Romantic);
        assert!("sepia".parse::<StylePreset>().is_err());
    }
}
