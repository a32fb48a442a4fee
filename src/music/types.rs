use serde::{Deserialize, Serialize};

/// Beat-and-bar grid derived from a music track.
///
/// Invariants: `beat_times` strictly increasing; `bar_times` is a
/// subsequence of the beat grid (every fourth beat under 4/4); the first
/// bar is never earlier than `music_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicAnalysis {
    /// Tempo in beats per minute, clamped to [60, 200]
    pub tempo: f64,

    /// Beat timestamps in seconds, strictly increasing
    pub beat_times: Vec<f64>,

    /// Bar (measure) timestamps in seconds
    pub bar_times: Vec<f64>,

    /// Derived bars per minute (tempo / beats-per-bar)
    pub bars_per_minute: f64,

    /// Beats per bar; fixed at 4 for 4/4
    pub beats_per_bar: u32,

    /// Time signature string ("4/4")
    pub time_signature: String,

    /// Offset in seconds where musical content starts
    pub music_start: f64,

    /// Wall-clock seconds spent analyzing
    pub analysis_duration: f64,

    /// Confidence bundle, each score in [0, 1]
    pub confidence: GridConfidence,
}

/// Confidence scores for the derived grid
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridConfidence {
    pub tempo: f64,
    pub beats: f64,
    pub bars: f64,
    pub overall: f64,
}

impl GridConfidence {
    /// Confidence for a grid generated from a detected tempo
    pub fn regular() -> Self {
        Self {
            tempo: 0.8,
            beats: 0.9,
            bars: 0.9,
            overall: 0.87,
        }
    }

    /// Confidence for the deterministic 120 BPM fallback
    pub fn fallback() -> Self {
        Self {
            tempo: 0.5,
            beats: 0.5,
            bars: 0.5,
            overall: 0.5,
        }
    }
}

impl MusicAnalysis {
    /// Interval between beats in seconds
    pub fn beat_interval(&self) -> f64 {
        60.0 / self.tempo
    }

    /// Interval between bars in seconds
    pub fn bar_interval(&self) -> f64 {
        self.beat_interval() * self.beats_per_bar as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals() {
        let analysis = MusicAnalysis {
            tempo: 120.0,
            beat_times: vec![],
            bar_times: vec![],
            bars_per_minute: 30.0,
            beats_per_bar: 4,
            time_signature: "4/4".to_string(),
            music_start: 0.0,
            analysis_duration: 0.0,
            confidence: GridConfidence::regular(),
        };
        assert!((analysis.beat_interval() - 0.5).abs() < 1e-9);
        assert!((analysis.bar_interval() - 2.0).abs() < 1e-9);
    }
}
