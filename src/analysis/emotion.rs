use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::analysis::frame::{detect_faces, FaceBox, GrayFrame, RgbFrame};
use crate::config::AnalysisSettings;
use crate::error::{AnalysisError, Result};
use crate::ffmpeg::FfmpegGateway;
use crate::music::analyzer::{estimate_tempo, mean_spectral_centroid};
use crate::music::AudioLoader;

/// Emotion categories scored per clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Joy,
    Surprise,
    Love,
    Excitement,
    Tenderness,
    Celebration,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Joy,
        Emotion::Surprise,
        Emotion::Love,
        Emotion::Excitement,
        Emotion::Tenderness,
        Emotion::Celebration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Surprise => "surprise",
            Emotion::Love => "love",
            Emotion::Excitement => "excitement",
            Emotion::Tenderness => "tenderness",
            Emotion::Celebration => "celebration",
        }
    }
}

/// Overall sentiment of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// A timestamped emotional peak
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalMoment {
    pub timestamp: f64,
    pub emotion: Emotion,
    pub confidence: f64,
}

/// Result of emotion analysis for one clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionAnalysis {
    pub clip_path: PathBuf,
    pub duration: f64,
    /// Combined per-emotion scores in [0, 1]
    pub emotions: BTreeMap<Emotion, f64>,
    /// Top emotional moments, strongest first
    pub emotional_moments: Vec<EmotionalMoment>,
    pub overall_sentiment: Sentiment,
    /// Fusion of excitement, celebration and joy in [0, 1]
    pub excitement_level: f64,
    pub analysis_duration: f64,
}

impl EmotionAnalysis {
    pub fn score(&self, emotion: Emotion) -> f64 {
        self.emotions.get(&emotion).copied().unwrap_or(0.0)
    }

    /// Neutral default injected by fast analysis, which skips this analyzer
    pub fn neutral(clip_path: &Path, duration: f64) -> Self {
        Self {
            clip_path: clip_path.to_path_buf(),
            duration,
            emotions: BTreeMap::new(),
            emotional_moments: Vec::new(),
            overall_sentiment: Sentiment::Neutral,
            excitement_level: 0.3,
            analysis_duration: 0.0,
        }
    }
}

/// Facial-expression + audio-sentiment analyzer
pub struct EmotionAnalyzer {
    gateway: Arc<FfmpegGateway>,
    settings: AnalysisSettings,
}

impl EmotionAnalyzer {
    pub fn new(gateway: Arc<FfmpegGateway>, settings: AnalysisSettings) -> Self {
        Self { gateway, settings }
    }

    /// Analyze emotional content of a clip. The audio path silently degrades
    /// to visual-only when the clip has no usable audio track.
    pub async fn analyze(&self, video_path: &Path) -> Result<EmotionAnalysis> {
        let started = Instant::now();
        tracing::info!(
            "Emotion analysis: {:?}",
            video_path.file_name().unwrap_or_default()
        );

        let info = self.gateway.probe_media(video_path).await?;
        let duration = info.duration;
        let video_emotions = self.analyze_video(video_path).await?;
        let audio_emotions = if info.has_audio {
            analyze_audio(video_path)
        } else {
            tracing::debug!("No audio stream, using visual-only analysis");
            None
        };

        let combined = combine_emotions(&video_emotions, audio_emotions.as_ref());
        let overall_sentiment = determine_sentiment(&combined);
        let excitement_level = excitement_level(&combined);
        let emotional_moments = find_emotional_moments(&video_emotions);

        let analysis_duration = started.elapsed().as_secs_f64();
        tracing::info!(
            "Emotion analysis complete: {:?} sentiment, {} emotional moments",
            overall_sentiment,
            emotional_moments.len()
        );

        Ok(EmotionAnalysis {
            clip_path: video_path.to_path_buf(),
            duration,
            emotions: combined,
            emotional_moments,
            overall_sentiment,
            excitement_level,
            analysis_duration,
        })
    }

    /// Per-frame facial emotion scores over time
    async fn analyze_video(
        &self,
        video_path: &Path,
    ) -> Result<Vec<(f64, BTreeMap<Emotion, f64>)>> {
        let sample_fps = 1.0 / self.settings.detect_interval;
        let width = self.settings.frame_width;
        let height = self.settings.frame_height;

        let raw = self
            .gateway
            .read_rgb_frames(video_path, sample_fps, width, height, None)
            .await?;
        if raw.is_empty() {
            return Err(AnalysisError::FrameDecodeFailed {
                path: video_path.display().to_string(),
                reason: "no frames decoded".to_string(),
            }
            .into());
        }

        let mut timeline = Vec::new();
        for (i, data) in raw.into_iter().enumerate() {
            let Some(frame) = RgbFrame::from_raw(width, height, data) else {
                continue;
            };
            let timestamp = i as f64 * self.settings.detect_interval;
            timeline.push((timestamp, analyze_frame_emotions(&frame)));
        }

        Ok(timeline)
    }
}

/// Average per-emotion scores across all faces in a frame; zeros when no
/// faces are visible.
fn analyze_frame_emotions(frame: &RgbFrame) -> BTreeMap<Emotion, f64> {
    let faces = detect_faces(frame);
    let mut scores: BTreeMap<Emotion, f64> =
        Emotion::ALL.iter().map(|&e| (e, 0.0)).collect();
    if faces.is_empty() {
        return scores;
    }

    let gray = frame.luma();
    for face in &faces {
        let roi = face_roi(&gray, face);
        for (emotion, value) in score_face_emotions(&roi) {
            *scores.entry(emotion).or_insert(0.0) += value;
        }
    }

    let n = faces.len() as f64;
    for value in scores.values_mut() {
        *value /= n;
    }
    scores
}

fn face_roi(gray: &GrayFrame, face: &FaceBox) -> GrayFrame {
    gray.region(face.x, face.y, face.w, face.h)
}

/// Heuristic per-face emotion scores from grayscale facial structure
fn score_face_emotions(roi: &GrayFrame) -> BTreeMap<Emotion, f64> {
    let mut scores = BTreeMap::new();

    // Mouth band: lower 40% of the face, central 60%
    let mouth = roi.region(
        roi.width() / 5,
        roi.height() * 3 / 5,
        roi.width() * 3 / 5,
        roi.height() * 2 / 5,
    );
    let joy = (mouth.gradient_density() * 5.0).min(1.0);

    // Eye band: upper-middle of the face
    let eyes = roi.region(
        roi.width() / 10,
        roi.height() / 5,
        roi.width() * 4 / 5,
        roi.height() * 3 / 10,
    );
    let surprise = (eyes.gradient_density() * 4.0).min(1.0);

    // Love has no reliable single-face visual signal; it only rises through
    // vision enrichment
    let love = 0.0;

    let excitement = roi.stddev().min(1.0);
    let tenderness = (1.0 - roi.laplacian_std() * 4.0).max(0.0);
    let celebration = (joy + excitement) / 2.0;

    scores.insert(Emotion::Joy, joy);
    scores.insert(Emotion::Surprise, surprise);
    scores.insert(Emotion::Love, love);
    scores.insert(Emotion::Excitement, excitement);
    scores.insert(Emotion::Tenderness, tenderness);
    scores.insert(Emotion::Celebration, celebration);
    scores
}

/// Audio-derived emotion scores, or None when the clip has no usable audio.
/// Failures here are downgraded, never propagated.
fn analyze_audio(video_path: &Path) -> Option<BTreeMap<Emotion, f64>> {
    let audio = match AudioLoader::load(video_path) {
        Ok(audio) => audio,
        Err(e) => {
            tracing::debug!("Audio analysis skipped (no audio track): {e}");
            return None;
        }
    };

    let samples = audio.mono_samples();
    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if samples.is_empty() || peak < 0.001 {
        tracing::debug!("No audio content detected, using visual-only analysis");
        return None;
    }

    let sr = audio.sample_rate;
    let mut scores = BTreeMap::new();

    // RMS energy drives excitement
    let rms =
        (samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64)
            .sqrt();
    scores.insert(Emotion::Excitement, (rms * 2.0).min(1.0));

    // Spectral brightness drives joy
    let centroid = mean_spectral_centroid(&samples, sr);
    scores.insert(Emotion::Joy, (centroid / 3000.0).min(1.0));

    // Zero crossing rate drives celebration
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    let zcr = crossings as f64 / samples.len() as f64;
    scores.insert(Emotion::Celebration, (zcr * 10.0).min(1.0));

    // Tempo supersedes the energy-derived excitement estimate
    let tempo = estimate_tempo(&samples, sr);
    scores.insert(Emotion::Excitement, (tempo / 200.0).min(1.0));

    Some(scores)
}

/// Combine video and audio scores (70/30) when audio is present
fn combine_emotions(
    video: &[(f64, BTreeMap<Emotion, f64>)],
    audio: Option<&BTreeMap<Emotion, f64>>,
) -> BTreeMap<Emotion, f64> {
    let mut combined = BTreeMap::new();
    for &emotion in &Emotion::ALL {
        let samples: Vec<f64> = video
            .iter()
            .filter_map(|(_, scores)| scores.get(&emotion).copied())
            .collect();
        let video_avg = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        };

        let value = match audio {
            Some(audio_scores) => {
                let audio_score = audio_scores.get(&emotion).copied().unwrap_or(0.0);
                0.7 * video_avg + 0.3 * audio_score
            }
            None => video_avg,
        };
        combined.insert(emotion, value);
    }
    combined
}

/// Positive when joy + love + celebration dominate; this heuristic never
/// emits negative sentiment.
fn determine_sentiment(emotions: &BTreeMap<Emotion, f64>) -> Sentiment {
    let positive = emotions.get(&Emotion::Joy).unwrap_or(&0.0)
        + emotions.get(&Emotion::Love).unwrap_or(&0.0)
        + emotions.get(&Emotion::Celebration).unwrap_or(&0.0);
    if positive > 0.5 {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}

fn excitement_level(emotions: &BTreeMap<Emotion, f64>) -> f64 {
    let excitement = emotions.get(&Emotion::Excitement).unwrap_or(&0.0);
    let celebration = emotions.get(&Emotion::Celebration).unwrap_or(&0.0);
    let joy = emotions.get(&Emotion::Joy).unwrap_or(&0.0);
    (excitement * 0.5 + celebration * 0.3 + joy * 0.2).min(1.0)
}

/// All per-frame scores above the moment threshold, strongest first, top 10
fn find_emotional_moments(video: &[(f64, BTreeMap<Emotion, f64>)]) -> Vec<EmotionalMoment> {
    const THRESHOLD: f64 = 0.3;

    let mut moments: Vec<EmotionalMoment> = video
        .iter()
        .flat_map(|(timestamp, scores)| {
            scores
                .iter()
                .filter(|(_, &confidence)| confidence > THRESHOLD)
                .map(|(&emotion, &confidence)| EmotionalMoment {
                    timestamp: *timestamp,
                    emotion,
                    confidence,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    moments.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
    moments.truncate(10);
    moments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emotions(pairs: &[(Emotion, f64)]) -> BTreeMap<Emotion, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_sentiment_positive_threshold() {
        let scores = emotions(&[(Emotion::Joy, 0.3), (Emotion::Celebration, 0.3)]);
        assert_eq!(determine_sentiment(&scores), Sentiment::Positive);

        let scores = emotions(&[(Emotion::Joy, 0.2)]);
        assert_eq!(determine_sentiment(&scores), Sentiment::Neutral);
    }

    #[test]
    fn test_excitement_level_weights() {
        let scores = emotions(&[
            (Emotion::Excitement, 1.0),
            (Emotion::Celebration, 1.0),
            (Emotion::Joy, 1.0),
        ]);
        assert!((excitement_level(&scores) - 1.0).abs() < 1e-9);

        let scores = emotions(&[(Emotion::Excitement, 0.5)]);
        assert!((excitement_level(&scores) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_combine_prefers_video_without_audio() {
        let video = vec![
            (0.0, emotions(&[(Emotion::Joy, 0.8)])),
            (1.5, emotions(&[(Emotion::Joy, 0.4)])),
        ];
        let combined = combine_emotions(&video, None);
        assert!((combined[&Emotion::Joy] - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_combine_blends_audio() {
        let video = vec![(0.0, emotions(&[(Emotion::Joy, 1.0)]))];
        let audio = emotions(&[(Emotion::Joy, 0.0)]);
        let combined = combine_emotions(&video, Some(&audio));
        assert!((combined[&Emotion::Joy] - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_emotional_moments_threshold_and_order() {
        let video = vec![
            (0.0, emotions(&[(Emotion::Joy, 0.9), (Emotion::Surprise, 0.1)])),
            (1.5, emotions(&[(Emotion::Celebration, 0.5)])),
        ];
        let moments = find_emotional_moments(&video);
        assert_eq!(moments.len(), 2);
        assert_eq!(moments[0].emotion, Emotion::Joy);
        assert!(moments[0].confidence >= moments[1].confidence);
    }

    #[test]
    fn test_neutral_default() {
        let neutral = EmotionAnalysis::neutral(Path::new("/clips/a.mp4"), 5.0);
        assert_eq!(neutral.overall_sentiment, Sentiment::Neutral);
        assert!((neutral.excitement_level - 0.3).abs() < 1e-9);
        assert!(neutral.emotional_moments.is_empty());
    }
}
