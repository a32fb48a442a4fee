//! # Content Analysis Module
//!
//! Per-clip analyzers that score footage for the selector and assembler:
//!
//! - [`visual`] - frame quality scoring and best-moment ranking
//! - [`objects`] - wedding-tagged object counting and scene classification
//! - [`emotion`] - facial-expression and audio-sentiment scoring
//! - [`enricher`] - optional external vision classifier hints
//!
//! All analyzers pull frames through the transcoder gateway as raw RGB
//! buffers ([`frame`]) and are deterministic for identical inputs.

pub mod emotion;
pub mod enricher;
pub mod frame;
pub mod objects;
pub mod visual;

pub use emotion::{Emotion, EmotionAnalysis, EmotionAnalyzer, Sentiment};
pub use enricher::VisionEnricher;
pub use objects::{ObjectAnalysis, ObjectDetector, ObjectKind, SceneClass};
pub use visual::{VisualAnalysis, VisualAnalyzer};
