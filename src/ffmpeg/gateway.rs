use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;

use crate::error::{truncate_tail, Result, ToolError};

/// Seconds allowed for the startup `-version` verification probes
const DETECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved executable locations, computed once at startup and treated as
/// immutable configuration afterwards.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// First line of `ffprobe -version`
    pub version: String,
}

/// Media metadata reported by ffprobe
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_audio: bool,
}

/// Async gateway to the external transcoder
#[derive(Debug, Clone)]
pub struct FfmpegGateway {
    tools: ToolPaths,
}

impl FfmpegGateway {
    /// Locate and verify ffmpeg + ffprobe. Called once at startup; a missing
    /// or non-functional tool is a hard precondition failure.
    pub async fn detect() -> Result<Self> {
        let ffmpeg = Self::find_tool("ffmpeg").ok_or_else(|| ToolError::Missing {
            tool: "ffmpeg".to_string(),
        })?;
        let ffprobe = Self::find_tool("ffprobe").ok_or_else(|| ToolError::Missing {
            tool: "ffprobe".to_string(),
        })?;

        Self::verify(&ffmpeg, "ffmpeg").await?;
        let version = Self::verify(&ffprobe, "ffprobe").await?;

        tracing::info!("Transcoder found: {}", version);

        Ok(Self {
            tools: ToolPaths {
                ffmpeg,
                ffprobe,
                version,
            },
        })
    }

    /// Build a gateway around already-resolved tool paths (tests)
    pub fn with_tools(tools: ToolPaths) -> Self {
        Self { tools }
    }

    /// Resolved tool paths and version info
    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// Search PATH, then a platform-dependent list of well-known install
    /// prefixes.
    fn find_tool(name: &str) -> Option<PathBuf> {
        if let Some(paths) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&paths) {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
                #[cfg(windows)]
                {
                    let candidate = dir.join(format!("{name}.exe"));
                    if candidate.is_file() {
                        return Some(candidate);
                    }
                }
            }
        }

        let well_known: &[&str] = if cfg!(target_os = "macos") {
            &["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin"]
        } else if cfg!(windows) {
            &["C:\\ffmpeg\\bin", "C:\\Program Files\\ffmpeg\\bin"]
        } else {
            &["/usr/bin", "/usr/local/bin", "/snap/bin"]
        };

        for prefix in well_known {
            let candidate = Path::new(prefix).join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        None
    }

    /// Run `<tool> -version` under the detection timeout and return the
    /// first line of output.
    async fn verify(path: &Path, tool: &str) -> Result<String> {
        let run = Command::new(path)
            .arg("-version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = tokio::time::timeout(DETECT_TIMEOUT, run)
            .await
            .map_err(|_| ToolError::Timeout {
                tool: tool.to_string(),
            })?
            .map_err(|_| ToolError::Missing {
                tool: tool.to_string(),
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: tool.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr_tail: truncate_tail(&String::from_utf8_lossy(&output.stderr)),
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }

    /// Run ffmpeg with the given argument list, capturing stdout/stderr.
    /// Non-zero exit surfaces as `ToolError::Failed` with the stderr tail.
    pub async fn run<I, S>(&self, args: I) -> Result<std::process::Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_tool(&self.tools.ffmpeg, "ffmpeg", args).await
    }

    /// Run ffprobe with the given argument list
    pub async fn run_probe<I, S>(&self, args: I) -> Result<std::process::Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_tool(&self.tools.ffprobe, "ffprobe", args).await
    }

    async fn run_tool<I, S>(&self, path: &Path, tool: &str, args: I) -> Result<std::process::Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ToolError::Failed {
                tool: tool.to_string(),
                exit_code: -1,
                stderr_tail: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: tool.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr_tail: truncate_tail(&stderr),
            }
            .into());
        }

        if !stderr.is_empty() {
            tracing::debug!("{} stderr: {}", tool, truncate_tail(&stderr));
        }

        Ok(output)
    }

    /// Probe the media duration in seconds
    pub async fn probe_duration<P: AsRef<Path>>(&self, path: P) -> Result<f64> {
        let path = path.as_ref();
        let output = self
            .run_probe([
                OsStr::new("-v"),
                OsStr::new("quiet"),
                OsStr::new("-show_entries"),
                OsStr::new("format=duration"),
                OsStr::new("-of"),
                OsStr::new("csv=p=0"),
                path.as_os_str(),
            ])
            .await?;

        let text = String::from_utf8_lossy(&output.stdout);
        let duration: f64 = text.trim().parse().map_err(|_| ToolError::ProbeFailed {
            path: path.display().to_string(),
            reason: format!("unparseable duration '{}'", text.trim()),
        })?;

        if duration <= 0.0 {
            return Err(ToolError::ProbeFailed {
                path: path.display().to_string(),
                reason: "non-positive duration".to_string(),
            }
            .into());
        }

        Ok(duration)
    }

    /// Probe full stream metadata (duration, resolution, frame rate, audio
    /// presence)
    pub async fn probe_media<P: AsRef<Path>>(&self, path: P) -> Result<MediaInfo> {
        let path = path.as_ref();
        let output = self
            .run_probe([
                OsStr::new("-v"),
                OsStr::new("quiet"),
                OsStr::new("-print_format"),
                OsStr::new("json"),
                OsStr::new("-show_format"),
                OsStr::new("-show_streams"),
                path.as_os_str(),
            ])
            .await?;

        let json: Value =
            serde_json::from_slice(&output.stdout).map_err(|e| ToolError::ProbeFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let streams = json["streams"].as_array().ok_or_else(|| ToolError::ProbeFailed {
            path: path.display().to_string(),
            reason: "no streams".to_string(),
        })?;

        let video = streams
            .iter()
            .find(|s| s["codec_type"].as_str() == Some("video"));
        let has_audio = streams
            .iter()
            .any(|s| s["codec_type"].as_str() == Some("audio"));

        let duration = json["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);

        let (width, height, fps) = match video {
            Some(v) => {
                let fps = v["r_frame_rate"]
                    .as_str()
                    .map(parse_rational_fps)
                    .unwrap_or(25.0);
                (
                    v["width"].as_u64().unwrap_or(0) as u32,
                    v["height"].as_u64().unwrap_or(0) as u32,
                    fps,
                )
            }
            None => (0, 0, 0.0),
        };

        Ok(MediaInfo {
            duration,
            width,
            height,
            fps,
            has_audio,
        })
    }

    /// Extract a single frame at `at` seconds as a JPEG
    pub async fn extract_frame(
        &self,
        video: impl AsRef<Path>,
        out: impl AsRef<Path>,
        at: f64,
    ) -> Result<()> {
        self.run([
            OsStr::new("-y"),
            OsStr::new("-ss"),
            OsStr::new(&format!("{at:.3}")),
            OsStr::new("-i"),
            video.as_ref().as_os_str(),
            OsStr::new("-frames:v"),
            OsStr::new("1"),
            OsStr::new("-q:v"),
            OsStr::new("2"),
            out.as_ref().as_os_str(),
        ])
        .await?;
        Ok(())
    }

    /// Decode raw RGB24 frames at `fps` samples per second, scaled to
    /// `width`x`height`. With `window = Some((start, duration))` only that
    /// range is decoded. Frames arrive on stdout as packed rgb24.
    pub async fn read_rgb_frames<P: AsRef<Path>>(
        &self,
        video: P,
        fps: f64,
        width: u32,
        height: u32,
        window: Option<(f64, f64)>,
    ) -> Result<Vec<Vec<u8>>> {
        let video = video.as_ref();
        let mut args: Vec<String> = vec!["-v".into(), "error".into()];
        if let Some((start, duration)) = window {
            args.push("-ss".into());
            args.push(format!("{start:.3}"));
            args.push("-t".into());
            args.push(format!("{duration:.3}"));
        }
        args.push("-i".into());
        args.push(video.display().to_string());
        args.push("-vf".into());
        args.push(format!("fps={fps},scale={width}:{height}"));
        args.push("-f".into());
        args.push("rawvideo".into());
        args.push("-pix_fmt".into());
        args.push("rgb24".into());
        args.push("-".into());

        let output = self.run(args).await?;

        let frame_len = (width * height * 3) as usize;
        let frames = output
            .stdout
            .chunks_exact(frame_len)
            .map(|chunk| chunk.to_vec())
            .collect();

        Ok(frames)
    }

    /// Transcode any audio input to linear-PCM WAV at the given sample rate,
    /// mono.
    pub async fn transcode_wav(
        &self,
        src: impl AsRef<Path>,
        dst: impl AsRef<Path>,
        sample_rate: u32,
    ) -> Result<()> {
        self.run([
            OsStr::new("-y"),
            OsStr::new("-i"),
            src.as_ref().as_os_str(),
            OsStr::new("-acodec"),
            OsStr::new("pcm_s16le"),
            OsStr::new("-ar"),
            OsStr::new(&sample_rate.to_string()),
            OsStr::new("-ac"),
            OsStr::new("1"),
            dst.as_ref().as_os_str(),
        ])
        .await?;
        Ok(())
    }
}

/// Parse an ffprobe frame rate such as "30/1" or "29.97"
fn parse_rational_fps(s: &str) -> f64 {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().unwrap_or(25.0);
        let den: f64 = den.parse().unwrap_or(1.0);
        if den > 0.0 {
            return num / den;
        }
        return 25.0;
    }
    s.parse().unwrap_or(25.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rational_fps() {
        assert_eq!(parse_rational_fps("30/1"), 30.0);
        assert_eq!(parse_rational_fps("29.97"), 29.97);
        assert_eq!(parse_rational_fps("0/0"), 25.0);
        assert_eq!(parse_rational_fps("garbage"), 25.0);
    }

    #[test]
    fn test_find_tool_missing() {
        assert!(FfmpegGateway::find_tool("definitely-not-a-real-binary-xyz").is_none());
    }
}
