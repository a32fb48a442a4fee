//! # Music Analysis Module
//!
//! Derives the beat-and-bar grid that drives clip trimming: tempo, evenly
//! spaced beat timestamps, bar timestamps (4/4), and the offset where the
//! musical content actually starts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use highlight_compositor::ffmpeg::FfmpegGateway;
//! use highlight_compositor::music::MusicAnalyzer;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let gateway = Arc::new(FfmpegGateway::detect().await?);
//! let analyzer = MusicAnalyzer::new(gateway);
//! let analysis = analyzer.analyze(Path::new("song.mp3"), Some(60.0)).await;
//!
//! println!("Tempo: {:.1} BPM, {} bars", analysis.tempo, analysis.bar_times.len());
//! # Ok(())
//! # }
//! ```
//!
//! Analysis never fails outright: any error degrades to a deterministic
//! 120 BPM fallback grid with reduced confidence.

pub mod analyzer;
pub mod loader;
pub mod types;

pub use analyzer::MusicAnalyzer;
pub use loader::{AudioData, AudioLoader};
pub use types::{GridConfidence, MusicAnalysis};
