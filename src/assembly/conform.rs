use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::assembly::timeline::{absolutize, read_timeline, validate_timeline_sources, Timeline};
use crate::config::Config;
use crate::error::{Result, TimelineError};
use crate::ffmpeg::FfmpegGateway;

/// Result of conforming a timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformOutput {
    pub output: PathBuf,
    pub conform_time: f64,
    pub temp_dir: PathBuf,
}

/// Re-renders a timeline from the original sources at master quality
pub struct Conformer {
    gateway: Arc<FfmpegGateway>,
    config: Config,
}

impl Conformer {
    pub fn new(gateway: Arc<FfmpegGateway>, config: Config) -> Self {
        Self { gateway, config }
    }

    /// Conform a timeline to a master-quality output. Fails with
    /// `TimelineError::SourcesChanged` when any referenced source no longer
    /// matches its recorded hash.
    pub async fn conform(
        &self,
        timeline_path: &Path,
        output_path: Option<&Path>,
        music_override: Option<&Path>,
        no_audio: bool,
    ) -> Result<ConformOutput> {
        let timeline_path = absolutize(timeline_path)?;
        let timeline = read_timeline(&timeline_path)?;

        if !validate_timeline_sources(&timeline) {
            return Err(TimelineError::SourcesChanged.into());
        }

        let temp_dir = self.create_run_dir()?;
        let output = match output_path {
            Some(path) => absolutize(path)?,
            None => temp_dir.join("highlight_master.mp4"),
        };

        let music = match music_override {
            Some(path) => absolutize(path)?,
            None => timeline.music.clone(),
        };

        let started = Instant::now();
        if no_audio {
            self.conform_video_only(&timeline, &output, &temp_dir).await?;
        } else {
            self.conform_with_audio(&timeline, &output, &music, &temp_dir)
                .await?;
        }
        let conform_time = started.elapsed().as_secs_f64();

        tracing::info!("Conform complete in {:.2}s: {:?}", conform_time, output);
        Ok(ConformOutput {
            output,
            conform_time,
            temp_dir,
        })
    }

    /// Video-only conform from originals: concat demuxer with precise
    /// inpoint/duration entries, H.264 medium CRF 18, yuv420p at the
    /// timeline's frame rate.
    async fn conform_video_only(
        &self,
        timeline: &Timeline,
        output: &Path,
        temp_dir: &Path,
    ) -> Result<()> {
        let filelist = temp_dir.join("conform_filelist.txt");
        let mut content = String::new();
        for clip in &timeline.clips {
            let duration = clip.out_point - clip.in_point;
            content.push_str(&format!("file '{}'\n", clip.src.display()));
            content.push_str(&format!("inpoint {:.3}\n", clip.in_point));
            content.push_str(&format!("duration {duration:.3}\n"));
        }
        std::fs::write(&filelist, content)?;

        tracing::info!("Conforming video from original sources");
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
                OsStr::new("-preset"),
                OsStr::new("medium"),
                OsStr::new("-crf"),
                OsStr::new("18"),
                OsStr::new("-r"),
                OsStr::new(&timeline.fps.to_string()),
                OsStr::new("-pix_fmt"),
                OsStr::new("yuv420p"),
                output.as_os_str(),
            ])
            .await?;
        Ok(())
    }

    /// Conform with the music overlaid through the same loudness chain the
    /// assembler uses; the already-conformed video stream is copied.
    async fn conform_with_audio(
        &self,
        timeline: &Timeline,
        output: &Path,
        music: &Path,
        temp_dir: &Path,
    ) -> Result<()> {
        let video = temp_dir.join("conform_video.mp4");
        self.conform_video_only(timeline, &video, temp_dir).await?;

        tracing::info!("Overlaying music on conformed video");
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
                OsStr::new(
                    "[1:a]loudnorm=I=-14:TP=-1.5:LRA=11,aresample=48000,pan=stereo|FL=c0|FR=c1[a]",
                ),
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
        Ok(())
    }

    fn create_run_dir(&self) -> Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("conform_");
        let dir = match &self.config.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir.into_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::timeline::{write_timeline, TimelineClip, TimelineParams};
    use crate::ffmpeg::ToolPaths;
    use tempfile::tempdir;

    fn fake_gateway() -> Arc<FfmpegGateway> {
        Arc::new(FfmpegGateway::with_tools(ToolPaths {
            ffmpeg: PathBuf::from("/bin/false"),
            ffprobe: PathBuf::from("/bin/false"),
            version: "test".to_string(),
        }))
    }

    #[tokio::test]
    async fn test_conform_rejects_changed_sources() {
        let dir = tempdir().unwrap();
        let clip = dir.path().join("a.mp4");
        let music = dir.path().join("music.wav");
        std::fs::write(&clip, b"video").unwrap();
        std::fs::write(&music, b"music").unwrap();

        let timeline_path = write_timeline(TimelineParams {
            clips: vec![TimelineClip {
                src: clip.clone(),
                in_point: 0.0,
                out_point: 1.0,
            }],
            target_seconds: 10,
            music_path: music,
            output_path: dir.path().join("timeline.json"),
            fps: 25,
            used_scene_detect: false,
            used_beat_snapping: true,
            bar_markers: None,
            tempo: None,
            time_signature: None,
        })
        .unwrap();

        // Mutate the source after the timeline was written
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(&clip, b"different video bytes").unwrap();

        let conformer = Conformer::new(fake_gateway(), Config::default());
        let err = conformer
            .conform(&timeline_path, None, None, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::HighlightError::Timeline(TimelineError::SourcesChanged)
        ));
    }

    #[tokio::test]
    async fn test_conform_missing_timeline() {
        let conformer = Conformer::new(fake_gateway(), Config::default());
        let err = conformer
            .conform(Path::new("/nonexistent/timeline.json"), None, None, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
