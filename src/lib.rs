//! # Highlight-Compositor
//!
//! Assemble beat-synced wedding highlight edits from raw footage and a
//! music track.
//!
//! The pipeline analyzes the music into a beat-and-bar grid, scores every
//! clip with parallel content analyzers (visual quality, wedding object
//! detection, emotion), fuses the results into a story arc and final score
//! per clip, trims musically aligned segments at the visually best moments,
//! and muxes the music under loudness normalization. The edit is described
//! by a canonical, hash-stamped timeline that can later be re-rendered from
//! the original sources at master quality.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use highlight_compositor::{Assembler, Config, FfmpegGateway};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let gateway = Arc::new(FfmpegGateway::detect().await?);
//! let assembler = Assembler::new(gateway, Config::from_env());
//!
//! let clips = vec![PathBuf::from("/footage/ceremony.mp4")];
//! let result = assembler
//!     .assemble(&clips, "/footage/song.mp3".as_ref(), 60)
//!     .await?;
//!
//! println!("Preview: {:?}", result.proxy_output);
//! println!("Timeline: {:?}", result.timeline_path);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`ffmpeg`] - async gateway to the external transcoder
//! - [`music`] - tempo and beat/bar grid analysis
//! - [`analysis`] - per-clip visual, object, and emotion analyzers
//! - [`story`] - story arcs and editing-style presets
//! - [`selector`] - parallel analysis orchestration, score fusion, caching
//! - [`assembly`] - preview assembly, timeline artifact, conform
//! - [`jobs`] - background job lifecycle with progress and cancellation

pub mod analysis;
pub mod assembly;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod jobs;
pub mod music;
pub mod selector;
pub mod story;

// Re-export commonly used types for convenience
pub use crate::{
    assembly::{Assembler, Conformer, Timeline},
    config::Config,
    error::{HighlightError, Result},
    ffmpeg::FfmpegGateway,
    jobs::JobRegistry,
    music::MusicAnalyzer,
    selector::{ContentSelector, SelectionStyles},
};
