use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the Highlight-Compositor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Proxy transcode settings
    pub transcode: TranscodeConfig,

    /// Per-clip content analysis settings
    pub analysis: AnalysisSettings,

    /// Preview assembly settings
    pub assembly: AssemblyConfig,

    /// Optional external vision classifier
    pub vision: VisionConfig,

    /// Override for the temp-directory root (run directories are created
    /// inside it). Defaults to the system temp dir when unset.
    pub temp_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcode: TranscodeConfig::default(),
            analysis: AnalysisSettings::default(),
            assembly: AssemblyConfig::default(),
            vision: VisionConfig::default(),
            temp_root: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|_| ConfigError::ParseFailed {
            path: path.display().to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build a configuration from defaults overlaid with environment
    /// variables. Absent variables are never fatal.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(preset) = std::env::var("HIGHLIGHT_FFMPEG_PRESET") {
            config.transcode.preset = preset;
        }
        if let Ok(crf) = std::env::var("HIGHLIGHT_FFMPEG_CRF") {
            if let Ok(v) = crf.parse() {
                config.transcode.crf = v;
            }
        }
        if let Ok(bitrate) = std::env::var("HIGHLIGHT_FFMPEG_AUDIO_BITRATE") {
            config.transcode.audio_bitrate = bitrate;
        }
        if let Ok(dir) = std::env::var("HIGHLIGHT_TMP_DIR") {
            if !dir.is_empty() {
                config.temp_root = Some(PathBuf::from(dir));
            }
        }
        config.vision.enabled = std::env::var("HIGHLIGHT_VISION_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        config.vision.api_key = std::env::var("HIGHLIGHT_VISION_API_KEY").ok();
        if let Ok(model) = std::env::var("HIGHLIGHT_VISION_MODEL") {
            config.vision.model = model;
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.assembly.validate()?;
        Ok(())
    }
}

/// Settings for the proxy transcode stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// x264 preset used for proxy creation
    pub preset: String,

    /// Constant rate factor for proxies
    pub crf: u32,

    /// AAC bitrate for proxy audio
    pub audio_bitrate: String,

    /// Scale filter applied to proxies
    pub scale_filter: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            preset: "ultrafast".to_string(),
            crf: 28,
            audio_bitrate: "96k".to_string(),
            scale_filter: "scale='min(1280,iw)':-2".to_string(),
        }
    }
}

/// Per-clip analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Visual quality sampling rate in frames per second
    pub visual_sample_fps: f64,

    /// Seconds between sampled frames for object/emotion detection
    pub detect_interval: f64,

    /// Frame width analyzers decode to (height follows aspect via scale)
    pub frame_width: u32,

    /// Frame height analyzers decode to
    pub frame_height: u32,

    /// Motion level treated as ideal when fusing visual quality
    pub ideal_motion: f64,

    /// Clips analyzed concurrently in interactive selection
    pub batch_size: usize,

    /// Clips analyzed concurrently inside background jobs
    pub job_batch_size: usize,

    /// Worker threads for CPU-bound frame scoring
    pub scoring_threads: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            visual_sample_fps: 1.0,
            detect_interval: 1.5,
            frame_width: 320,
            frame_height: 180,
            ideal_motion: 0.3,
            batch_size: 4,
            job_batch_size: 3,
            scoring_threads: num_cpus::get(),
        }
    }
}

impl AnalysisSettings {
    fn validate(&self) -> Result<()> {
        if self.visual_sample_fps <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "analysis.visual_sample_fps".to_string(),
                value: self.visual_sample_fps.to_string(),
            }
            .into());
        }
        if self.detect_interval <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "analysis.detect_interval".to_string(),
                value: self.detect_interval.to_string(),
            }
            .into());
        }
        if self.batch_size == 0 || self.job_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "analysis.batch_size".to_string(),
                value: format!("{}/{}", self.batch_size, self.job_batch_size),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.ideal_motion) {
            return Err(ConfigError::InvalidValue {
                key: "analysis.ideal_motion".to_string(),
                value: self.ideal_motion.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Preview assembly settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Output frame rate
    pub fps: u32,

    /// Output width
    pub width: u32,

    /// Output height
    pub height: u32,

    /// x264 preset for segment re-encodes
    pub segment_preset: String,

    /// Constant rate factor for segment re-encodes
    pub segment_crf: u32,

    /// AAC bitrate for the final music overlay
    pub music_bitrate: String,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            fps: 25,
            width: 1280,
            height: 720,
            segment_preset: "fast".to_string(),
            segment_crf: 23,
            music_bitrate: "192k".to_string(),
        }
    }
}

impl AssemblyConfig {
    fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "assembly.fps".to_string(),
                value: self.fps.to_string(),
            }
            .into());
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "assembly.resolution".to_string(),
                value: format!("{}x{}", self.width, self.height),
            }
            .into());
        }
        Ok(())
    }
}

/// Optional external vision classifier configuration. The enricher is
/// silently disabled when the feature flag is off or the credential is
/// absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Feature flag for vision enrichment
    pub enabled: bool,

    /// API credential; absence disables the enricher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent to the classifier
    pub model: String,

    /// Endpoint for the chat-completions style classifier API
    pub endpoint: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }
}

impl VisionConfig {
    /// Whether enrichment is actually usable
    pub fn is_active(&self) -> bool {
        self.enabled && self.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let original_config = Config::default();

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config.transcode.preset, loaded_config.transcode.preset);
        assert_eq!(original_config.assembly.fps, loaded_config.assembly.fps);
    }

    #[test]
    fn test_invalid_sample_rate() {
        let mut config = Config::default();
        config.analysis.visual_sample_fps = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_vision_inactive_without_key() {
        let mut vision = VisionConfig::default();
        vision.enabled = true;
        assert!(!vision.is_active());
        vision.api_key = Some("sk-test".to_string());
        assert!(vision.is_active());
    }
}
