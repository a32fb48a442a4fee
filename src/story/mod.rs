//! # Story Module
//!
//! Maps analyzer output onto narrative structure: scene refinement, story
//! importance, narrative position, emotional tone, and a recommended clip
//! duration ([`arc`]), plus the named editing-style presets applied on top
//! ([`presets`]).

pub mod arc;
pub mod presets;

use serde::{Deserialize, Serialize};

pub use arc::{StoryArc, StoryArcBuilder};
pub use presets::{PresetSummary, StylePreset, StylePresetEngine, StyleTreatment};

/// Narrative templates a highlight can follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeStyle {
    Traditional,
    Modern,
    Intimate,
    Destination,
}

impl NarrativeStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeStyle::Traditional => "traditional",
            NarrativeStyle::Modern => "modern",
            NarrativeStyle::Intimate => "intimate",
            NarrativeStyle::Destination => "destination",
        }
    }
}

impl std::str::FromStr for NarrativeStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "traditional" => Ok(NarrativeStyle::Traditional),
            "modern" => Ok(NarrativeStyle::Modern),
            "intimate" => Ok(NarrativeStyle::Intimate),
            "destination" => Ok(NarrativeStyle::Destination),
            other => Err(format!("unknown story style: {other}")),
        }
    }
}

/// Position of a clip within the overall narrative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativePosition {
    Opening,
    RisingAction,
    Climax,
    FallingAction,
    Resolution,
}

impl NarrativePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativePosition::Opening => "opening",
            NarrativePosition::RisingAction => "rising_action",
            NarrativePosition::Climax => "climax",
            NarrativePosition::FallingAction => "falling_action",
            NarrativePosition::Resolution => "resolution",
        }
    }
}

/// Dominant emotional tone of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalTone {
    Romantic,
    Joyful,
    Dramatic,
    Intimate,
    Celebratory,
}

impl EmotionalTone {
    pub const ALL: [EmotionalTone; 5] = [
        EmotionalTone::Romantic,
        EmotionalTone::Joyful,
        EmotionalTone::Dramatic,
        EmotionalTone::Intimate,
        EmotionalTone::Celebratory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionalTone::Romantic => "romantic",
            EmotionalTone::Joyful => "joyful",
            EmotionalTone::Dramatic => "dramatic",
            EmotionalTone::Intimate => "intimate",
            EmotionalTone::Celebratory => "celebratory",
        }
    }
}
