use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::frame::{detect_faces, GrayFrame, RgbFrame};
use crate::config::AnalysisSettings;
use crate::error::{AnalysisError, Result};
use crate::ffmpeg::FfmpegGateway;

/// Most best-moment timestamps reported per clip
const MAX_BEST_MOMENTS: usize = 10;
/// Best-moment cap for the windowed range variant
const MAX_WINDOW_MOMENTS: usize = 5;

/// Results from visual analysis of a video clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualAnalysis {
    pub clip_path: PathBuf,
    pub duration: f64,
    /// Mean face count across sampled frames
    pub face_count: u32,
    pub face_confidence: f64,
    pub motion_score: f64,
    pub brightness_score: f64,
    pub contrast_score: f64,
    pub stability_score: f64,
    /// Weighted fusion of the individual metrics
    pub overall_quality: f64,
    /// Timestamps of the best moments, chronological, spacing >= 10% of
    /// duration
    pub best_moments: Vec<f64>,
    pub analysis_duration: f64,
}

/// Score for one sampled frame
#[derive(Debug, Clone, Copy)]
struct MomentScore {
    timestamp: f64,
    face_score: f64,
    motion_score: f64,
    brightness_score: f64,
    combined_score: f64,
}

/// Per-frame metrics that do not depend on the previous frame
struct FrameMetrics {
    face_score: f64,
    brightness: f64,
    contrast: f64,
    gray: GrayFrame,
}

/// Frame quality scorer and best-moment ranker
pub struct VisualAnalyzer {
    gateway: Arc<FfmpegGateway>,
    settings: AnalysisSettings,
}

impl VisualAnalyzer {
    pub fn new(gateway: Arc<FfmpegGateway>, settings: AnalysisSettings) -> Self {
        Self { gateway, settings }
    }

    /// Analyze a full clip for visual content and quality
    pub async fn analyze(&self, video_path: &Path) -> Result<VisualAnalysis> {
        let started = Instant::now();
        tracing::info!("Visual analysis: {:?}", video_path.file_name().unwrap_or_default());

        let duration = self.gateway.probe_duration(video_path).await?;
        let frames = self.decode_frames(video_path, None).await?;
        if frames.is_empty() {
            return Err(AnalysisError::FrameDecodeFailed {
                path: video_path.display().to_string(),
                reason: "no frames decoded".to_string(),
            }
            .into());
        }

        let sample_interval = 1.0 / self.settings.visual_sample_fps;
        let moments = self.score_frames(&frames, 0.0, sample_interval);

        let count = moments.len() as f64;
        let face_confidence = moments.iter().map(|m| m.face_score).sum::<f64>() / count;
        let motion_score = moments.iter().map(|m| m.motion_score).sum::<f64>() / count;
        let brightness_score = moments.iter().map(|m| m.brightness_score).sum::<f64>() / count;
        let contrast_score = {
            let metrics: Vec<f64> = frames.iter().map(|f| (f.luma().stddev() * 4.0).min(1.0)).collect();
            metrics.iter().sum::<f64>() / metrics.len() as f64
        };
        let stability_score = 1.0 - motion_score;

        let overall_quality = self.fuse_quality(
            face_confidence,
            motion_score,
            brightness_score,
            contrast_score,
            stability_score,
        );

        let best_moments = select_best_moments(&moments, duration, MAX_BEST_MOMENTS);
        let analysis_duration = started.elapsed().as_secs_f64();

        tracing::info!(
            "Visual analysis complete: quality {:.2}, {} best moments",
            overall_quality,
            best_moments.len()
        );

        Ok(VisualAnalysis {
            clip_path: video_path.to_path_buf(),
            duration,
            face_count: (face_confidence * 5.0).round() as u32,
            face_confidence,
            motion_score,
            brightness_score,
            contrast_score,
            stability_score,
            overall_quality,
            best_moments,
            analysis_duration,
        })
    }

    /// Find the best moments within a specific time range. Returns up to
    /// five absolute timestamps.
    pub async fn find_best_moments_in(
        &self,
        video_path: &Path,
        start: f64,
        duration: f64,
    ) -> Result<Vec<f64>> {
        if duration <= 0.0 {
            return Ok(Vec::new());
        }

        let frames = self.decode_frames(video_path, Some((start, duration))).await?;
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let sample_interval = 1.0 / self.settings.visual_sample_fps;
        let moments = self.score_frames(&frames, start, sample_interval);
        Ok(select_best_moments(&moments, duration, MAX_WINDOW_MOMENTS))
    }

    async fn decode_frames(
        &self,
        video_path: &Path,
        window: Option<(f64, f64)>,
    ) -> Result<Vec<RgbFrame>> {
        let width = self.settings.frame_width;
        let height = self.settings.frame_height;
        let raw = self
            .gateway
            .read_rgb_frames(
                video_path,
                self.settings.visual_sample_fps,
                width,
                height,
                window,
            )
            .await?;

        Ok(raw
            .into_iter()
            .filter_map(|data| RgbFrame::from_raw(width, height, data))
            .collect())
    }

    /// Score sampled frames. Face/brightness/contrast are independent per
    /// frame and run on the rayon pool; motion needs the previous sampled
    /// frame and runs as a second sequential pass.
    fn score_frames(&self, frames: &[RgbFrame], start: f64, interval: f64) -> Vec<MomentScore> {
        let metrics: Vec<FrameMetrics> = frames
            .par_iter()
            .map(|frame| {
                let gray = frame.luma();
                let faces = detect_faces(frame);
                FrameMetrics {
                    face_score: (faces.len() as f64 / 5.0).min(1.0),
                    brightness: brightness_score(gray.mean()),
                    contrast: (gray.stddev() * 4.0).min(1.0),
                    gray,
                }
            })
            .collect();

        metrics
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let motion = if i == 0 {
                    0.0
                } else {
                    (m.gray.mean_abs_diff(&metrics[i - 1].gray) * 10.0).min(1.0)
                };
                let combined = m.face_score * 0.4 + motion * 0.3 + m.brightness * 0.3;
                MomentScore {
                    timestamp: start + i as f64 * interval,
                    face_score: m.face_score,
                    motion_score: motion,
                    brightness_score: m.brightness,
                    combined_score: combined,
                }
            })
            .collect()
    }

    /// Weighted quality fusion; motion is scored by distance from the ideal
    /// motion level.
    fn fuse_quality(
        &self,
        face: f64,
        motion: f64,
        brightness: f64,
        contrast: f64,
        stability: f64,
    ) -> f64 {
        let motion_penalty = (motion - self.settings.ideal_motion).abs();
        let adjusted_motion = (1.0 - motion_penalty * 2.0).max(0.0);

        let quality = face * 0.3
            + adjusted_motion * 0.2
            + brightness * 0.2
            + contrast * 0.15
            + stability * 0.15;
        quality.clamp(0.0, 1.0)
    }
}

/// Brightness score peaks at mid-gray and falls off linearly
fn brightness_score(mean: f64) -> f64 {
    (1.0 - (mean - 0.5).abs() * 2.0).max(0.0)
}

/// Greedy best-moment selection: sort by combined score descending, reject
/// candidates within 10% of the duration of an already-picked moment, then
/// return the picks in chronological order.
fn select_best_moments(moments: &[MomentScore], duration: f64, max_moments: usize) -> Vec<f64> {
    let mut sorted: Vec<&MomentScore> = moments.iter().collect();
    sorted.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap());

    let min_interval = duration * 0.1;
    let mut best: Vec<f64> = Vec::new();

    for moment in sorted {
        let too_close = best
            .iter()
            .any(|&existing| (moment.timestamp - existing).abs() < min_interval);
        if !too_close {
            best.push(moment.timestamp);
        }
        if best.len() >= max_moments {
            break;
        }
    }

    best.sort_by(|a, b| a.partial_cmp(b).unwrap());
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moment(t: f64, score: f64) -> MomentScore {
        MomentScore {
            timestamp: t,
            face_score: 0.0,
            motion_score: 0.0,
            brightness_score: 0.0,
            combined_score: score,
        }
    }

    #[test]
    fn test_brightness_peaks_at_mid_gray() {
        assert!((brightness_score(0.5) - 1.0).abs() < 1e-9);
        assert_eq!(brightness_score(0.0), 0.0);
        assert_eq!(brightness_score(1.0), 0.0);
        assert!((brightness_score(0.25) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_best_moments_spacing() {
        let moments: Vec<MomentScore> =
            (0..100).map(|i| moment(i as f64 * 0.1, 1.0 - i as f64 * 0.001)).collect();
        let best = select_best_moments(&moments, 10.0, MAX_BEST_MOMENTS);

        assert!(best.len() <= MAX_BEST_MOMENTS);
        assert!(best.windows(2).all(|pair| pair[1] > pair[0]));
        for pair in best.windows(2) {
            assert!(pair[1] - pair[0] >= 1.0 - 1e-9); // 10% of 10s
        }
    }

    #[test]
    fn test_best_moments_prefers_high_scores() {
        let moments = vec![moment(0.0, 0.1), moment(5.0, 0.9), moment(9.0, 0.5)];
        let best = select_best_moments(&moments, 10.0, 2);
        assert_eq!(best, vec![5.0, 9.0]);
    }

    #[test]
    fn test_best_moments_empty_input() {
        let best = select_best_moments(&[], 10.0, MAX_BEST_MOMENTS);
        assert!(best.is_empty());
    }
}
