//! # Assembly Module
//!
//! The output half of the pipeline:
//!
//! - [`assembler`] - proxies, musically aligned trimming, concatenation,
//!   music overlay, preview emission
//! - [`timeline`] - the canonical, hash-stamped timeline artifact
//! - [`conform`] - master-quality re-render of a timeline from originals

pub mod assembler;
pub mod conform;
pub mod timeline;

pub use assembler::{
    AssembleOutput, Assembler, QualityMetrics, SelectedClipSummary, SmartAssembleOutput,
    SmartAssembleRequest, StoryBreakdown,
};
pub use conform::{ConformOutput, Conformer};
pub use timeline::{
    read_timeline, validate_timeline_sources, write_timeline, Timeline, TimelineClip,
    TimelineParams,
};
