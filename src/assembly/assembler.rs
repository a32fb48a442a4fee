use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::analysis::visual::VisualAnalyzer;
use crate::assembly::timeline::{absolutize, write_timeline, TimelineClip, TimelineParams};
use crate::config::Config;
use crate::error::{AssemblyError, Result};
use crate::ffmpeg::FfmpegGateway;
use crate::music::{MusicAnalysis, MusicAnalyzer};
use crate::selector::{ContentSelector, SelectionResult, SelectionStyles};

/// Loudness normalization chain applied to the music stream
const LOUDNORM_FILTER: &str =
    "[1:a]loudnorm=I=-14:TP=-1.5:LRA=11,aresample=48000,pan=stereo|FL=c0|FR=c1[a]";

/// Result of the assemble stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembleOutput {
    pub proxy_output: PathBuf,
    pub timeline_path: PathBuf,
    pub timeline_hash: String,
    /// Wall-clock seconds spent creating proxies
    pub proxy_time: f64,
    /// Wall-clock seconds spent on the final render
    pub render_time: f64,
    /// Run directory holding all intermediates; cleanup is the caller's
    /// responsibility
    pub temp_dir: PathBuf,
}

/// Request for the AI-selected assembly variant
#[derive(Debug, Clone)]
pub struct SmartAssembleRequest {
    pub clips: Vec<PathBuf>,
    pub music: PathBuf,
    pub target_seconds: u32,
    pub use_ai_selection: bool,
    pub styles: SelectionStyles,
    pub fast_mode: bool,
}

/// Per-clip metadata surfaced by the AI-selected variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedClipSummary {
    pub path: PathBuf,
    pub score: f64,
    pub scene: String,
    pub tone: String,
    pub importance: f64,
    pub reason: String,
}

/// Scene/tone/position counts across the selected clips
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryBreakdown {
    pub scenes: BTreeMap<String, u32>,
    pub tones: BTreeMap<String, u32>,
    pub positions: BTreeMap<String, u32>,
    pub total_clips: usize,
}

/// Aggregate quality metrics across the selected clips
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub average_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub high_quality_clips: usize,
    pub story_importance_avg: f64,
}

/// Composite result of the AI-selected assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartAssembleOutput {
    pub output: AssembleOutput,
    pub selected_clips: Vec<SelectedClipSummary>,
    pub story_breakdown: StoryBreakdown,
    pub quality_metrics: QualityMetrics,
}

/// A trimmed intermediate segment
struct Segment {
    path: PathBuf,
    duration: f64,
}

/// Preview assembly pipeline: proxies, music-aligned trimming,
/// concatenation, loudness-normalized music overlay, timeline emission.
pub struct Assembler {
    gateway: Arc<FfmpegGateway>,
    config: Config,
    music_analyzer: MusicAnalyzer,
    visual_analyzer: VisualAnalyzer,
}

impl Assembler {
    pub fn new(gateway: Arc<FfmpegGateway>, config: Config) -> Self {
        Self {
            music_analyzer: MusicAnalyzer::new(gateway.clone()),
            visual_analyzer: VisualAnalyzer::new(gateway.clone(), config.analysis.clone()),
            gateway,
            config,
        }
    }

    /// Assemble a preview and timeline from source clips and a music track.
    /// `target_seconds == 0` selects dynamic duration (3 s per clip).
    pub async fn assemble(
        &self,
        clips: &[PathBuf],
        music_path: &Path,
        target_seconds: u32,
    ) -> Result<AssembleOutput> {
        if clips.is_empty() {
            return Err(AssemblyError::NoClips.into());
        }

        // Clip references are absolute for the life of the run; every path
        // handed to the transcoder gateway descends from these
        let clips: Vec<PathBuf> = clips
            .iter()
            .map(|clip| absolutize(clip))
            .collect::<Result<_>>()?;
        let music_path = absolutize(music_path)?;

        for clip in &clips {
            if !clip.exists() {
                return Err(AssemblyError::SourceNotFound {
                    path: clip.display().to_string(),
                }
                .into());
            }
        }
        if !music_path.exists() {
            return Err(AssemblyError::MusicNotFound {
                path: music_path.display().to_string(),
            }
            .into());
        }

        let target_seconds = if target_seconds == 0 {
            let dynamic = clips.len() as u32 * 3;
            tracing::info!(
                "Dynamic duration: {} clips x 3s = {}s",
                clips.len(),
                dynamic
            );
            dynamic
        } else {
            target_seconds
        };
        let target = target_seconds as f64;

        let proxy_started = Instant::now();
        let temp_dir = self.create_run_dir("highlight_")?;
        let proxy_dir = temp_dir.join("proxies");
        std::fs::create_dir_all(&proxy_dir)?;
        tracing::info!("Run directory: {:?}", temp_dir);

        // Step 1: 720p fast-start proxies
        tracing::info!("Creating proxies for {} clips", clips.len());
        let proxies = self.create_proxies(&clips, &proxy_dir).await?;
        let proxy_time = proxy_started.elapsed().as_secs_f64();

        // Step 2: music analysis ahead of any trimming decision
        let music = self.music_analyzer.analyze(&music_path, Some(target)).await;
        tracing::info!(
            "Music grid: {:.1} BPM, {} beats, {} bars",
            music.tempo,
            music.beat_times.len(),
            music.bar_times.len()
        );

        // Step 3: trimming strategy
        let segments = if music.bar_times.len() >= proxies.len() {
            tracing::info!("Bar-synced trimming with {} bars", music.bar_times.len());
            self.trim_with_markers(&proxies, &music.bar_times, &temp_dir, true)
                .await?
        } else if music.beat_times.len() >= proxies.len() {
            tracing::info!("Beat-synced trimming with {} beats", music.beat_times.len());
            self.trim_with_markers(&proxies, &music.beat_times, &temp_dir, false)
                .await?
        } else {
            tracing::warn!(
                "Not enough beats/bars for {} clips, using uniform trimming",
                proxies.len()
            );
            let segment_duration = target / proxies.len() as f64;
            self.trim_uniform(&proxies, segment_duration, &temp_dir).await?
        };

        // Step 4: loop-fill when the cut runs short of the target
        let total: f64 = segments.iter().map(|s| s.duration).sum();
        let segments = if total < target * 0.9 {
            tracing::info!(
                "Segments total {:.2}s, looping to reach {:.0}s target",
                total,
                target
            );
            self.loop_to_duration(segments, target, &temp_dir).await?
        } else {
            segments
        };

        // Step 5: concatenate
        tracing::info!("Concatenating {} segments", segments.len());
        let concatenated = self.concatenate(&segments, &temp_dir).await?;

        // Step 6: music overlay with loudness normalization
        let render_started = Instant::now();
        tracing::info!("Overlaying music and normalizing loudness");
        let final_output = self.overlay_music(&concatenated, &music_path, &temp_dir).await?;
        let render_time = render_started.elapsed().as_secs_f64();

        // Step 7: timeline emission
        let timeline_clips = self
            .timeline_clips(&clips, &segments, &music)
            .await?;
        let timeline_path = temp_dir.join("timeline.json");
        let timeline_path = write_timeline(TimelineParams {
            clips: timeline_clips,
            target_seconds,
            music_path: music_path.clone(),
            output_path: timeline_path,
            fps: self.config.assembly.fps,
            used_scene_detect: false,
            used_beat_snapping: true,
            bar_markers: Some(music.bar_times.clone()),
            tempo: Some(music.tempo),
            time_signature: Some(music.time_signature.clone()),
        })?;
        let timeline_hash = crate::assembly::timeline::read_timeline(&timeline_path)?
            .timeline_hash
            .unwrap_or_default();

        // Step 8: final rename
        let proxy_output = temp_dir.join("highlight_proxy.mp4");
        std::fs::rename(&final_output, &proxy_output)?;
        tracing::info!("Preview created: {:?}", proxy_output);

        Ok(AssembleOutput {
            proxy_output,
            timeline_path,
            timeline_hash,
            proxy_time,
            render_time,
            temp_dir,
        })
    }

    /// AI-selected assembly: reorder and filter the clip list through the
    /// content selector, then run the standard pipeline and attach the
    /// selection metadata.
    pub async fn assemble_with_selection(
        &self,
        selector: &ContentSelector,
        request: SmartAssembleRequest,
    ) -> Result<SmartAssembleOutput> {
        if request.clips.is_empty() {
            return Err(AssemblyError::NoClips.into());
        }

        // Absolutize up front so selection, its cache keys, and the
        // assembly below all see the same clip references
        let clips: Vec<PathBuf> = request
            .clips
            .iter()
            .map(|clip| absolutize(clip))
            .collect::<Result<_>>()?;
        let music = absolutize(&request.music)?;

        let (clip_order, selected) = if request.use_ai_selection {
            let target = if request.target_seconds == 0 {
                clips.len() as u32 * 3
            } else {
                request.target_seconds
            };
            let target_count = clips.len().min((target as usize / 3).max(5));

            tracing::info!(
                "AI selection: choosing {} of {} clips ({} / {})",
                target_count,
                clips.len(),
                request.styles.story_style.as_str(),
                request.styles.style_preset.as_str()
            );

            let selected = selector
                .select_best(&clips, target_count, request.styles, request.fast_mode)
                .await;
            if selected.is_empty() {
                return Err(AssemblyError::OutputFailed {
                    reason: "AI selection produced no usable clips".to_string(),
                }
                .into());
            }
            let order: Vec<PathBuf> = selected.iter().map(|r| r.clip_path.clone()).collect();
            (order, selected)
        } else {
            (clips, Vec::new())
        };

        let output = self
            .assemble(&clip_order, &music, request.target_seconds)
            .await?;

        Ok(SmartAssembleOutput {
            output,
            selected_clips: selected.iter().map(|r| summarize(r)).collect(),
            story_breakdown: story_breakdown(&selected),
            quality_metrics: quality_metrics(&selected),
        })
    }

    /// Create the per-run temp directory under the configured root
    fn create_run_dir(&self, prefix: &str) -> Result<PathBuf> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix(prefix);
            b
        };
        let dir = match &self.config.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir.into_path())
    }

    async fn create_proxies(&self, clips: &[PathBuf], proxy_dir: &Path) -> Result<Vec<PathBuf>> {
        let settings = &self.config.transcode;
        let mut proxies = Vec::with_capacity(clips.len());

        for (i, clip) in clips.iter().enumerate() {
            let proxy = proxy_dir.join(format!("proxy_{i:03}.mp4"));
            tracing::info!(
                "Creating proxy for {:?}",
                clip.file_name().unwrap_or_default()
            );
            self.gateway
                .run([
                    OsStr::new("-y"),
                    OsStr::new("-i"),
                    clip.as_os_str(),
                    OsStr::new("-vf"),
                    OsStr::new(&settings.scale_filter),
                    OsStr::new("-c:v"),
                    OsStr::new("libx264"),
                    OsStr::new("-preset"),
                    OsStr::new(&settings.preset),
                    OsStr::new("-crf"),
                    OsStr::new(&settings.crf.to_string()),
                    OsStr::new("-c:a"),
                    OsStr::new("aac"),
                    OsStr::new("-b:a"),
                    OsStr::new(&settings.audio_bitrate),
                    OsStr::new("-movflags"),
                    OsStr::new("+faststart"),
                    proxy.as_os_str(),
                ])
                .await?;
            proxies.push(proxy);
        }

        Ok(proxies)
    }

    /// Marker-synced trimming. Segment i spans the interval between marker
    /// i and i+1 (the last interval pads as needed). With `use_best_moments`
    /// a search window around the marker-suggested time is scored by the
    /// visual analyzer and the first best moment wins.
    async fn trim_with_markers(
        &self,
        proxies: &[PathBuf],
        markers: &[f64],
        temp_dir: &Path,
        use_best_moments: bool,
    ) -> Result<Vec<Segment>> {
        let mut intervals: Vec<f64> = markers.windows(2).map(|pair| pair[1] - pair[0]).collect();
        let last_interval = intervals.last().copied().unwrap_or(2.0);
        while intervals.len() < proxies.len() {
            intervals.push(last_interval);
        }

        let mut segments = Vec::with_capacity(proxies.len());
        for (i, proxy) in proxies.iter().enumerate() {
            let duration = self.gateway.probe_duration(proxy).await?;
            let segment_duration = intervals[i].min(duration);
            let marker = markers[i.min(markers.len() - 1)];

            let mut start = if use_best_moments {
                self.best_moment_start(proxy, marker, duration, segment_duration)
                    .await
            } else {
                marker.min((duration - segment_duration).max(0.0))
            };

            if start + segment_duration > duration {
                start = ((duration - segment_duration) / 2.0).max(0.0);
                tracing::debug!("Re-centered segment {} to {:.2}s", i + 1, start);
            }

            let label = if use_best_moments { "bar" } else { "beat" };
            let trimmed = temp_dir.join(format!("trimmed_{label}_{i:03}.mp4"));
            tracing::info!(
                "Trimming segment {}/{} ({} at {:.2}s, {:.2}s long)",
                i + 1,
                proxies.len(),
                label,
                marker,
                segment_duration
            );
            self.trim_segment(proxy, &trimmed, start, segment_duration).await?;
            segments.push(Segment {
                path: trimmed,
                duration: segment_duration,
            });
        }

        Ok(segments)
    }

    /// Search a window around the marker-suggested time for the visually
    /// best start point; fall back to the suggestion itself.
    async fn best_moment_start(
        &self,
        proxy: &Path,
        marker: f64,
        duration: f64,
        segment_duration: f64,
    ) -> f64 {
        let video_time = if duration > 0.0 { marker % duration } else { 0.0 };
        let window = (duration * 0.3).min(10.0);
        let search_start = (video_time - window / 2.0).max(0.0);
        let search_len = (duration - search_start).min(window);

        let best = match self
            .visual_analyzer
            .find_best_moments_in(proxy, search_start, search_len)
            .await
        {
            Ok(moments) => moments,
            Err(e) => {
                tracing::warn!("Best-moment search failed ({e}), using bar timing");
                Vec::new()
            }
        };

        match best.first() {
            Some(&moment) => {
                let start = (moment - search_start).clamp(0.0, (duration - segment_duration).max(0.0));
                tracing::debug!("Best moment at {:.2}s (quality-based selection)", start);
                start
            }
            None => video_time.min((duration - segment_duration).max(0.0)),
        }
    }

    /// Uniform fallback trimming from the middle of each proxy
    async fn trim_uniform(
        &self,
        proxies: &[PathBuf],
        segment_duration: f64,
        temp_dir: &Path,
    ) -> Result<Vec<Segment>> {
        let mut segments = Vec::with_capacity(proxies.len());
        for (i, proxy) in proxies.iter().enumerate() {
            let duration = self.gateway.probe_duration(proxy).await?;
            let segment_duration = segment_duration.min(duration);
            let start = ((duration - segment_duration) / 2.0).max(0.0);

            let trimmed = temp_dir.join(format!("trimmed_{i:03}.mp4"));
            tracing::info!("Trimming segment {}/{}", i + 1, proxies.len());
            self.trim_segment(proxy, &trimmed, start, segment_duration).await?;
            segments.push(Segment {
                path: trimmed,
                duration: segment_duration,
            });
        }
        Ok(segments)
    }

    /// Re-encode one segment to the uniform intermediate format
    async fn trim_segment(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
    ) -> Result<()> {
        let assembly = &self.config.assembly;
        self.gateway
            .run([
                OsStr::new("-y"),
                OsStr::new("-i"),
                input.as_os_str(),
                OsStr::new("-ss"),
                OsStr::new(&format!("{start:.3}")),
                OsStr::new("-t"),
                OsStr::new(&format!("{duration:.3}")),
                OsStr::new("-c:v"),
                OsStr::new("libx264"),
                OsStr::new("-c:a"),
                OsStr::new("aac"),
                OsStr::new("-preset"),
                OsStr::new(&assembly.segment_preset),
                OsStr::new("-crf"),
                OsStr::new(&assembly.segment_crf.to_string()),
                OsStr::new("-r"),
                OsStr::new(&assembly.fps.to_string()),
                OsStr::new("-vf"),
                OsStr::new(&format!("scale={}:{}", assembly.width, assembly.height)),
                output.as_os_str(),
            ])
            .await?;
        Ok(())
    }

    /// Loop-append segments until the target is reached, trimming the last
    /// to land on it exactly.
    async fn loop_to_duration(
        &self,
        segments: Vec<Segment>,
        target: f64,
        temp_dir: &Path,
    ) -> Result<Vec<Segment>> {
        let mut looped: Vec<Segment> = Vec::new();
        let mut current = 0.0f64;

        'outer: while current < target {
            for segment in &segments {
                if current >= target {
                    break 'outer;
                }
                let remaining = target - current;
                if segment.duration <= remaining {
                    looped.push(Segment {
                        path: segment.path.clone(),
                        duration: segment.duration,
                    });
                    current += segment.duration;
                } else {
                    let trimmed =
                        temp_dir.join(format!("looped_trimmed_{:03}.mp4", looped.len()));
                    self.gateway
                        .run([
                            OsStr::new("-y"),
                            OsStr::new("-i"),
                            segment.path.as_os_str(),
                            OsStr::new("-t"),
                            OsStr::new(&format!("{remaining:.3}")),
                            OsStr::new("-c:v"),
                            OsStr::new("libx264"),
                            OsStr::new("-c:a"),
                            OsStr::new("aac"),
                            OsStr::new("-preset"),
                            OsStr::new(&self.config.assembly.segment_preset),
                            OsStr::new("-crf"),
                            OsStr::new(&self.config.assembly.segment_crf.to_string()),
                            trimmed.as_os_str(),
                        ])
                        .await?;
                    looped.push(Segment {
                        path: trimmed,
                        duration: remaining,
                    });
                    current = target;
                    break 'outer;
                }
            }
        }

        tracing::info!("Looped to {} segments totaling {:.2}s", looped.len(), current);
        Ok(looped)
    }

    /// Concat-demuxer pass over a file list of absolute paths
    async fn concatenate(&self, segments: &[Segment], temp_dir: &Path) -> Result<PathBuf> {
        let filelist = temp_dir.join("filelist.txt");
        let mut content = String::new();
        for segment in segments {
            content.push_str(&format!("file '{}'\n", segment.path.display()));
        }
        std::fs::write(&filelist, content)?;

        let output = temp_dir.join("concatenated.mp4");
        let assembly = &self.config.assembly;
        self.gateway
            .run([
                OsStr::new("-y"),
                OsStr::new("-f"),
                OsStr::new("concat"),
                OsStr::new("-safe"),
                OsStr::new("0"),
                OsStr::new("-i"),
                filelist.as_os_str(),
                OsStr::new("-c:v"),
                OsStr::new("libx264"),
                OsStr::new("-c:a"),
                OsStr::new("aac"),
                OsStr::new("-preset"),
                OsStr::new(&assembly.segment_preset),
                OsStr::new("-crf"),
                OsStr::new(&assembly.segment_crf.to_string()),
                output.as_os_str(),
            ])
            .await?;
        Ok(output)
    }

    /// Loop the music under the cut, normalize to -14 LUFS, resample to
    /// 48 kHz stereo, copy the video stream, stop at the shorter stream.
    async fn overlay_music(
        &self,
        video: &Path,
        music: &Path,
        temp_dir: &Path,
    ) -> Result<PathBuf> {
        let output = temp_dir.join("highlight_final.mp4");
        self.gateway
            .run([
                OsStr::new("-y"),
                OsStr::new("-i"),
                video.as_os_str(),
                OsStr::new("-stream_loop"),
                OsStr::new("-1"),
                OsStr::new("-i"),
                music.as_os_str(),
                OsStr::new("-filter_complex"),
                OsStr::new(LOUDNORM_FILTER),
                OsStr::new("-map"),
                OsStr::new("0:v:0"),
                OsStr::new("-map"),
                OsStr::new("[a]"),
                OsStr::new("-c:v"),
                OsStr::new("copy"),
                OsStr::new("-c:a"),
                OsStr::new("aac"),
                OsStr::new("-ac"),
                OsStr::new("2"),
                OsStr::new("-b:a"),
                OsStr::new(&self.config.assembly.music_bitrate),
                OsStr::new("-shortest"),
                output.as_os_str(),
            ])
            .await?;
        Ok(output)
    }

    /// Map trimmed segments back onto the original clips for the timeline,
    /// using bar markers (or beats) to place the in-points.
    async fn timeline_clips(
        &self,
        originals: &[PathBuf],
        segments: &[Segment],
        music: &MusicAnalysis,
    ) -> Result<Vec<TimelineClip>> {
        let markers: &[f64] = if !music.bar_times.is_empty() {
            &music.bar_times
        } else {
            &music.beat_times
        };

        let mut clips = Vec::new();
        for (i, (original, segment)) in originals.iter().zip(segments.iter()).enumerate() {
            let duration = segment.duration;
            let original_duration = self.gateway.probe_duration(original).await?;

            let start = match markers.get(i) {
                Some(&marker) => marker.min((original_duration - duration).max(0.0)),
                None => ((original_duration - duration) / 2.0).max(0.0),
            };

            clips.push(TimelineClip {
                src: original.clone(),
                in_point: round_ms(start),
                out_point: round_ms(start + duration),
            });
        }
        Ok(clips)
    }
}

/// Round to whole milliseconds
fn round_ms(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn summarize(result: &SelectionResult) -> SelectedClipSummary {
    SelectedClipSummary {
        path: result.clip_path.clone(),
        score: result.final_score,
        scene: result.story_arc.scene_classification.as_str().to_string(),
        tone: result.story_arc.emotional_tone.as_str().to_string(),
        importance: result.story_arc.story_importance,
        reason: result.selection_reason.clone(),
    }
}

fn story_breakdown(selected: &[Arc<SelectionResult>]) -> StoryBreakdown {
    let mut breakdown = StoryBreakdown {
        total_clips: selected.len(),
        ..Default::default()
    };
    for result in selected {
        *breakdown
            .scenes
            .entry(result.story_arc.scene_classification.as_str().to_string())
            .or_insert(0) += 1;
        *breakdown
            .tones
            .entry(result.story_arc.emotional_tone.as_str().to_string())
            .or_insert(0) += 1;
        *breakdown
            .positions
            .entry(result.story_arc.narrative_position.as_str().to_string())
            .or_insert(0) += 1;
    }
    breakdown
}

fn quality_metrics(selected: &[Arc<SelectionResult>]) -> QualityMetrics {
    if selected.is_empty() {
        return QualityMetrics::default();
    }
    let scores: Vec<f64> = selected.iter().map(|r| r.final_score).collect();
    QualityMetrics {
        average_score: scores.iter().sum::<f64>() / scores.len() as f64,
        max_score: scores.iter().cloned().fold(f64::MIN, f64::max),
        min_score: scores.iter().cloned().fold(f64::MAX, f64::min),
        high_quality_clips: scores.iter().filter(|&&s| s > 0.7).count(),
        story_importance_avg: selected
            .iter()
            .map(|r| r.story_arc.story_importance)
            .sum::<f64>()
            / selected.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::ToolPaths;

    fn fake_assembler() -> Assembler {
        let gateway = Arc::new(FfmpegGateway::with_tools(ToolPaths {
            ffmpeg: PathBuf::from("/bin/false"),
            ffprobe: PathBuf::from("/bin/false"),
            version: "test".to_string(),
        }));
        Assembler::new(gateway, Config::default())
    }

    #[tokio::test]
    async fn test_assemble_rejects_empty_clip_list() {
        let assembler = fake_assembler();
        let err = assembler
            .assemble(&[], Path::new("/music.wav"), 20)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::HighlightError::Assembly(AssemblyError::NoClips)
        ));
    }

    #[tokio::test]
    async fn test_assemble_absolutizes_before_precondition_checks() {
        let assembler = fake_assembler();
        let err = assembler
            .assemble(
                &[PathBuf::from("missing/clip.mp4")],
                Path::new("missing/music.wav"),
                20,
            )
            .await
            .unwrap_err();

        // The not-found error reports the absolutized clip reference
        let expected = std::env::current_dir()
            .unwrap()
            .join("missing/clip.mp4")
            .display()
            .to_string();
        assert!(err.to_string().contains(&expected), "got: {err}");
    }

    #[tokio::test]
    async fn test_assemble_missing_music_reported() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("a.mp4");
        std::fs::write(&clip, b"video").unwrap();

        let assembler = fake_assembler();
        let err = assembler
            .assemble(&[clip], &dir.path().join("missing.wav"), 20)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::HighlightError::Assembly(AssemblyError::MusicNotFound { .. })
        ));
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(1.23456), 1.235);
        assert_eq!(round_ms(0.0004), 0.0);
        assert_eq!(round_ms(2.9996), 3.0);
    }

    #[test]
    fn test_quality_metrics_empty() {
        let metrics = quality_metrics(&[]);
        assert_eq!(metrics.high_quality_clips, 0);
        assert_eq!(metrics.average_score, 0.0);
    }
}
