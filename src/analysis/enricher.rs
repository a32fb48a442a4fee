use std::path::Path;
use std::time::Duration;

use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::analysis::emotion::{Emotion, EmotionAnalysis, Sentiment};
use crate::analysis::objects::{ObjectAnalysis, ObjectKind, SceneClass};
use crate::config::VisionConfig;
use crate::error::{AnalysisError, Result};
use crate::ffmpeg::FfmpegGateway;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const CLASSIFY_PROMPT: &str = "You are classifying a single wedding video frame. \
Return a compact JSON with keys: scene (one of ceremony, reception, party, preparation, \
intimate_moments, scenic_moments), subjects (array of strings like bride, groom, guests, \
rings, bouquet, cake, dance, toast), actions (array), emotion (one of romantic, joyful, \
intimate, celebratory, neutral), and confidence (0-1). Keep it concise, valid JSON only.";

/// Structured hints returned by the external classifier
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisionHints {
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Optional enrichment through an external vision classifier. Disabled
/// silently when the feature flag is off or no credential is present, and a
/// no-op on every failure path: enrichment can never fail the pipeline.
pub struct VisionEnricher {
    config: VisionConfig,
    client: Option<reqwest::Client>,
}

impl VisionEnricher {
    pub fn new(config: VisionConfig) -> Self {
        let client = if config.is_active() {
            reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .ok()
        } else {
            None
        };
        if config.enabled && client.is_none() {
            tracing::warn!("Vision enrichment requested but unavailable; disabling");
        }
        Self { config, client }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Classify a first-frame thumbnail and merge the hints into the given
    /// analyses. Always returns; failures only log.
    pub async fn enrich(
        &self,
        gateway: &FfmpegGateway,
        video_path: &Path,
        object: &mut ObjectAnalysis,
        emotion: &mut EmotionAnalysis,
    ) {
        if !self.is_enabled() {
            return;
        }

        match self.try_enrich(gateway, video_path).await {
            Ok(Some(hints)) => merge_hints(&hints, object, emotion),
            Ok(None) => {}
            Err(e) => tracing::warn!("Vision enrichment failed: {e}"),
        }
    }

    async fn try_enrich(
        &self,
        gateway: &FfmpegGateway,
        video_path: &Path,
    ) -> Result<Option<VisionHints>> {
        let Some(client) = self.client.as_ref() else {
            return Ok(None);
        };
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        let thumb_dir = tempfile::Builder::new()
            .prefix("highlight_thumb_")
            .tempdir()?;
        let thumb_path = thumb_dir.path().join("thumb.jpg");
        gateway
            .extract_frame(video_path, &thumb_path, 0.0)
            .await?;

        let bytes = std::fs::read(&thumb_path)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);

        let body = json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": CLASSIFY_PROMPT },
                    { "type": "image_url", "image_url": {
                        "url": format!("data:image/jpeg;base64,{encoded}")
                    }},
                ],
            }],
            "temperature": 0.2,
            "max_tokens": 300,
        });

        let response = client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::VisionEnricherFailed {
                reason: e.to_string(),
            })?;

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| AnalysisError::VisionEnricherFailed {
                    reason: e.to_string(),
                })?;

        let Some(content) = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        else {
            return Ok(None);
        };

        Ok(parse_hints(&content))
    }
}

/// Best-effort parse of the classifier response, tolerating code fences
fn parse_hints(content: &str) -> Option<VisionHints> {
    let mut cleaned = content.trim();
    if let Some(stripped) = cleaned.strip_prefix("```") {
        cleaned = stripped;
        if let Some(newline) = cleaned.find('\n') {
            cleaned = &cleaned[newline + 1..];
        }
        cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned);
    }
    serde_json::from_str(cleaned.trim()).ok()
}

/// Merge classifier hints into the object and emotion analyses
fn merge_hints(hints: &VisionHints, object: &mut ObjectAnalysis, emotion: &mut EmotionAnalysis) {
    if let Some(scene) = hints.scene.as_deref().and_then(SceneClass::parse) {
        object.scene_classification = scene;
    }

    for subject in &hints.subjects {
        if let Some(kind) = subject_to_kind(subject) {
            *object.objects_detected.entry(kind).or_insert(0) += 1;
        }
    }

    if let Some(term) = hints.emotion.as_deref() {
        if let Some(mapped) = emotion_term_to_kind(term) {
            let entry = emotion.emotions.entry(mapped).or_insert(0.0);
            *entry = entry.max(0.6);
            emotion.overall_sentiment = Sentiment::Positive;
            emotion.excitement_level = emotion.excitement_level.max(0.5);
        }
    }
}

fn subject_to_kind(subject: &str) -> Option<ObjectKind> {
    match subject.to_lowercase().as_str() {
        "rings" => Some(ObjectKind::WeddingRings),
        "cake" => Some(ObjectKind::WeddingCake),
        "dance" => Some(ObjectKind::Dancing),
        "toast" => Some(ObjectKind::ToastMoments),
        "bouquet" => Some(ObjectKind::Bouquet),
        "guests" | "bride" | "groom" => Some(ObjectKind::People),
        _ => None,
    }
}

/// Map the classifier's tone vocabulary onto the closed emotion set.
/// "neutral" intentionally maps to nothing.
fn emotion_term_to_kind(term: &str) -> Option<Emotion> {
    match term.to_lowercase().as_str() {
        "romantic" => Some(Emotion::Love),
        "joyful" => Some(Emotion::Joy),
        "intimate" => Some(Emotion::Tenderness),
        "celebratory" => Some(Emotion::Celebration),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_analyses() -> (ObjectAnalysis, EmotionAnalysis) {
        (
            ObjectAnalysis::empty(&PathBuf::from("/clips/a.mp4")),
            EmotionAnalysis::neutral(&PathBuf::from("/clips/a.mp4"), 5.0),
        )
    }

    #[test]
    fn test_disabled_without_credentials() {
        let enricher = VisionEnricher::new(VisionConfig::default());
        assert!(!enricher.is_enabled());
    }

    #[test]
    fn test_parse_hints_plain_json() {
        let hints = parse_hints(r#"{"scene": "ceremony", "subjects": ["rings"]}"#).unwrap();
        assert_eq!(hints.scene.as_deref(), Some("ceremony"));
        assert_eq!(hints.subjects, vec!["rings"]);
    }

    #[test]
    fn test_parse_hints_code_fenced() {
        let content = "```json\n{\"scene\": \"party\", \"emotion\": \"joyful\"}\n```";
        let hints = parse_hints(content).unwrap();
        assert_eq!(hints.scene.as_deref(), Some("party"));
        assert_eq!(hints.emotion.as_deref(), Some("joyful"));
    }

    #[test]
    fn test_parse_hints_garbage_is_none() {
        assert!(parse_hints("not json at all").is_none());
    }

    #[test]
    fn test_merge_overrides_scene_and_bumps_counts() {
        let (mut object, mut emotion) = sample_analyses();
        let hints = VisionHints {
            scene: Some("ceremony".to_string()),
            subjects: vec!["rings".to_string(), "bride".to_string(), "unknown".to_string()],
            actions: vec![],
            emotion: None,
            confidence: Some(0.9),
        };
        merge_hints(&hints, &mut object, &mut emotion);
        assert_eq!(object.scene_classification, SceneClass::Ceremony);
        assert_eq!(object.count(ObjectKind::WeddingRings), 1);
        assert_eq!(object.count(ObjectKind::People), 1);
    }

    #[test]
    fn test_merge_positive_emotion_floors_excitement() {
        let (mut object, mut emotion) = sample_analyses();
        let hints = VisionHints {
            emotion: Some("romantic".to_string()),
            ..Default::default()
        };
        merge_hints(&hints, &mut object, &mut emotion);
        assert!(emotion.score(Emotion::Love) >= 0.6);
        assert_eq!(emotion.overall_sentiment, Sentiment::Positive);
        assert!(emotion.excitement_level >= 0.5);
    }

    #[test]
    fn test_merge_neutral_emotion_is_noop() {
        let (mut object, mut emotion) = sample_analyses();
        let hints = VisionHints {
            emotion: Some("neutral".to_string()),
            ..Default::default()
        };
        let before = emotion.excitement_level;
        merge_hints(&hints, &mut object, &mut emotion);
        assert_eq!(emotion.overall_sentiment, Sentiment::Neutral);
        assert_eq!(emotion.excitement_level, before);
    }
}
