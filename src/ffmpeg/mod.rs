//! # Transcoder Gateway
//!
//! Uniform async invocation of the external ffmpeg/ffprobe binaries. All
//! pipeline stages that touch media bytes go through [`FfmpegGateway`]:
//! transcoding, duration/metadata probing, raw-frame taps for the content
//! analyzers, and thumbnail extraction.
//!
//! Arguments are always passed as a list (no shell interpretation), file
//! paths are absolute, and stderr is captured even on success for
//! diagnostic logging.

pub mod gateway;

pub use gateway::{FfmpegGateway, MediaInfo, ToolPaths};
