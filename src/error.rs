use thiserror::Error;

/// Main error type for the Highlight-Compositor library
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("Transcoder error: {0}")]
    Tool(#[from] ToolError),

    #[error("Music analysis error: {0}")]
    Music(#[from] MusicError),

    #[error("Content analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// External transcoder (ffmpeg/ffprobe) failures
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} not found in PATH or well-known install locations")]
    Missing { tool: String },

    #[error("{tool} exited with code {exit_code}: {stderr_tail}")]
    Failed {
        tool: String,
        exit_code: i32,
        stderr_tail: String,
    },

    #[error("{tool} verification timed out")]
    Timeout { tool: String },

    #[error("Failed to probe media duration for {path}: {reason}")]
    ProbeFailed { path: String, reason: String },
}

/// Music analysis errors
#[derive(Error, Debug)]
pub enum MusicError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Music analysis failed: {reason}")]
    AnalysisFailed { reason: String },
}

/// Per-clip content analysis errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to decode frames from {path}: {reason}")]
    FrameDecodeFailed { path: String, reason: String },

    #[error("Failed to decode audio from {path}: {reason}")]
    AudioDecodeFailed { path: String, reason: String },

    #[error("Vision enrichment failed: {reason}")]
    VisionEnricherFailed { reason: String },
}

/// Preview assembly errors
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("No source clips provided")]
    NoClips,

    #[error("Source clip not found: {path}")]
    SourceNotFound { path: String },

    #[error("Music file not found: {path}")]
    MusicNotFound { path: String },

    #[error("Output generation failed: {reason}")]
    OutputFailed { reason: String },
}

/// Timeline artifact errors
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Timeline file not found: {path}")]
    NotFound { path: String },

    #[error("Timeline invalid: {reason}")]
    Invalid { reason: String },

    #[error("Timeline source files have changed or are missing")]
    SourcesChanged,
}

/// Background job errors
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {id}")]
    NotFound { id: String },

    #[error("Job {id} is not cancellable in its current state")]
    NotCancellable { id: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using HighlightError
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Maximum length of diagnostic text surfaced to callers (stderr tails, messages)
pub const MAX_ERROR_LEN: usize = 500;

/// Truncate diagnostic text to the reporting limit, keeping the tail
/// (ffmpeg prints the interesting part last)
pub fn truncate_tail(text: &str) -> String {
    if text.len() <= MAX_ERROR_LEN {
        return text.to_string();
    }
    let mut boundary = text.len() - MAX_ERROR_LEN;
    while !text.is_char_boundary(boundary) {
        boundary += 1;
    }
    text[boundary..].to_string()
}

impl HighlightError {
    /// Get a user-facing error message, truncated to the reporting limit
    pub fn user_message(&self) -> String {
        let mut text = match self {
            Self::Tool(ToolError::Missing { tool }) => {
                format!("{tool} was not found. Install FFmpeg and make sure it is on your PATH.")
            }
            Self::Music(MusicError::LoadFailed { path }) => {
                format!(
                    "Could not load audio file '{path}'. Please check the file exists and is a supported format."
                )
            }
            Self::Timeline(TimelineError::SourcesChanged) => {
                "Timeline source files have changed since the timeline was written; re-run assemble."
                    .to_string()
            }
            _ => self.to_string(),
        };
        if text.len() > MAX_ERROR_LEN {
            let mut boundary = MAX_ERROR_LEN;
            while !text.is_char_boundary(boundary) {
                boundary -= 1;
            }
            text.truncate(boundary);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_tail_keeps_short_text() {
        assert_eq!(truncate_tail("short"), "short");
    }

    #[test]
    fn test_truncate_tail_keeps_last_500() {
        let long = "a".repeat(600) + "tail";
        let truncated = truncate_tail(&long);
        assert_eq!(truncated.len(), MAX_ERROR_LEN);
        assert!(truncated.ends_with("tail"));
    }

    #[test]
    fn test_user_message_truncated() {
        let err = HighlightError::Assembly(AssemblyError::OutputFailed {
            reason: "x".repeat(900),
        });
        assert!(err.user_message().len() <= MAX_ERROR_LEN);
    }
}
