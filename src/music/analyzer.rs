use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;

use crate::error::{MusicError, Result};
use crate::ffmpeg::FfmpegGateway;
use crate::music::loader::AudioLoader;
use crate::music::types::{GridConfidence, MusicAnalysis};

/// Sample rate all music analysis runs at
const ANALYSIS_SAMPLE_RATE: u32 = 22_050;
/// FFT window for the onset envelope
const WINDOW_SIZE: usize = 1024;
/// Hop between analysis windows
const HOP_SIZE: usize = 512;
/// Beats per bar under 4/4
const BEATS_PER_BAR: u32 = 4;
/// Plausible tempo bounds in BPM
const MIN_TEMPO: f64 = 60.0;
const MAX_TEMPO: f64 = 200.0;
/// Hard cap on fallback grid length in seconds
const MAX_GRID_SECONDS: f64 = 300.0;

/// Beat-grid analyzer built around tempo estimation over an onset-strength
/// envelope, with regular grid generation for stability.
pub struct MusicAnalyzer {
    gateway: Arc<FfmpegGateway>,
}

impl MusicAnalyzer {
    pub fn new(gateway: Arc<FfmpegGateway>) -> Self {
        Self { gateway }
    }

    /// Analyze a music file into a beat-and-bar grid. Never fails: any error
    /// degrades to the deterministic 120 BPM fallback grid.
    pub async fn analyze(&self, music_path: &Path, target_duration: Option<f64>) -> MusicAnalysis {
        match self.try_analyze(music_path, target_duration).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!("Music analysis failed ({e}), using 120 BPM fallback grid");
                fallback_analysis(target_duration)
            }
        }
    }

    async fn try_analyze(
        &self,
        music_path: &Path,
        target_duration: Option<f64>,
    ) -> Result<MusicAnalysis> {
        let started = Instant::now();
        tracing::info!("Analyzing music: {:?}", music_path.file_name().unwrap_or_default());

        let wav = self.ensure_wav(music_path).await?;
        let audio = AudioLoader::load(wav.path())?;
        let mut samples = audio.mono_samples();
        let sr = audio.sample_rate;

        if let Some(limit) = target_duration {
            let max_samples = (limit * sr as f64) as usize;
            samples.truncate(max_samples.max(1));
        }

        if samples.is_empty() {
            return Err(MusicError::AnalysisFailed {
                reason: "no audio samples".to_string(),
            }
            .into());
        }

        // Step 1: find where the musical content starts
        let music_start = find_music_start(&samples, sr);
        tracing::debug!("Music starts at {:.2}s", music_start);

        if music_start > 0.0 {
            let skip = (music_start * sr as f64) as usize;
            samples.drain(..skip.min(samples.len()));
        }

        // Step 2: tempo estimation on the trimmed audio
        let tempo = estimate_tempo(&samples, sr).clamp(MIN_TEMPO, MAX_TEMPO);
        tracing::info!("Detected tempo: {:.1} BPM", tempo);

        // Steps 3-5: regular beat and bar grids over the trimmed duration
        let beat_interval = 60.0 / tempo;
        let bar_interval = beat_interval * BEATS_PER_BAR as f64;
        let duration = samples.len() as f64 / sr as f64;

        let beat_times = regular_grid(duration, beat_interval);
        let bar_times = regular_grid(duration, bar_interval);

        // Step 6: snap to the grid anchored at the first element, dedup
        let mut beat_times = align_to_grid(&beat_times, beat_interval);
        let mut bar_times = align_to_grid(&bar_times, bar_interval);

        // Offset back to absolute track time
        for t in beat_times.iter_mut().chain(bar_times.iter_mut()) {
            *t += music_start;
        }

        // Step 7: optional truncation to the target duration
        if let Some(limit) = target_duration {
            beat_times.retain(|&t| t <= limit);
            bar_times.retain(|&t| t <= limit);
        }

        let analysis_duration = started.elapsed().as_secs_f64();
        tracing::info!(
            "Music analysis complete in {:.2}s: {} beats, {} bars",
            analysis_duration,
            beat_times.len(),
            bar_times.len()
        );

        Ok(MusicAnalysis {
            tempo,
            beat_times,
            bar_times,
            bars_per_minute: tempo / BEATS_PER_BAR as f64,
            beats_per_bar: BEATS_PER_BAR,
            time_signature: format!("{BEATS_PER_BAR}/4"),
            music_start,
            analysis_duration,
            confidence: GridConfidence::regular(),
        })
    }

    /// Normalize the input to linear-PCM WAV at 22,050 Hz mono if it is not
    /// already. The temp file path is deterministic per process and removed
    /// when the guard drops.
    async fn ensure_wav(&self, music_path: &Path) -> Result<NormalizedWav> {
        if music_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false)
        {
            if let Ok(reader) = hound::WavReader::open(music_path) {
                let spec = reader.spec();
                if spec.sample_rate == ANALYSIS_SAMPLE_RATE && spec.channels == 1 {
                    return Ok(NormalizedWav::borrowed(music_path));
                }
            }
        }

        let wav_path =
            std::env::temp_dir().join(format!("highlight_beat_{}.wav", std::process::id()));
        tracing::debug!("Converting to WAV for analysis: {:?}", wav_path);
        self.gateway
            .transcode_wav(music_path, &wav_path, ANALYSIS_SAMPLE_RATE)
            .await?;
        Ok(NormalizedWav::owned(wav_path))
    }
}

/// Temp-WAV guard; owned files are deleted on drop
struct NormalizedWav {
    path: PathBuf,
    owned: bool,
}

impl NormalizedWav {
    fn borrowed(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            owned: false,
        }
    }

    fn owned(path: PathBuf) -> Self {
        Self { path, owned: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for NormalizedWav {
    fn drop(&mut self) {
        if self.owned {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Find the start of musical content: first short-window RMS above 10% of
/// the peak RMS, clamped to [0.1, 5.0] seconds. Returns 0.0 when nothing
/// rises above the threshold.
pub(crate) fn find_music_start(samples: &[f32], sample_rate: u32) -> f64 {
    const FRAME: usize = 2048;
    const HOP: usize = 512;

    if samples.len() < FRAME {
        return 0.0;
    }

    let rms: Vec<f32> = samples
        .windows(FRAME)
        .step_by(HOP)
        .map(|w| (w.iter().map(|&x| x * x).sum::<f32>() / w.len() as f32).sqrt())
        .collect();

    let peak = rms.iter().cloned().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return 0.0;
    }
    let threshold = peak * 0.1;

    match rms.iter().position(|&r| r > threshold) {
        Some(idx) => {
            let t = (idx * HOP) as f64 / sample_rate as f64;
            t.clamp(0.1, 5.0)
        }
        None => 0.0,
    }
}

/// Estimate tempo by autocorrelating the onset-strength envelope over the
/// plausible beat-lag range, with a gentle prior centered on 120 BPM.
pub(crate) fn estimate_tempo(samples: &[f32], sample_rate: u32) -> f64 {
    let envelope = onset_envelope(samples);
    if envelope.len() < 8 {
        return 120.0;
    }

    let frame_rate = sample_rate as f64 / HOP_SIZE as f64;
    let min_lag = ((60.0 / MAX_TEMPO) * frame_rate).floor().max(1.0) as usize;
    let max_lag = ((60.0 / MIN_TEMPO) * frame_rate).ceil() as usize;
    let max_lag = max_lag.min(envelope.len().saturating_sub(1));
    if min_lag >= max_lag {
        return 120.0;
    }

    let mut best_lag = min_lag;
    let mut best_score = f64::MIN;
    for lag in min_lag..=max_lag {
        let corr: f64 = envelope
            .iter()
            .zip(envelope[lag..].iter())
            .map(|(&a, &b)| (a as f64) * (b as f64))
            .sum();

        let bpm = 60.0 * frame_rate / lag as f64;
        // Log-normal prior around 120 BPM keeps octave errors in check
        let prior = (-0.5 * ((bpm / 120.0).ln() / 0.9).powi(2)).exp();
        let score = corr * prior;

        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }

    60.0 * frame_rate / best_lag as f64
}

/// Spectral-flux onset strength envelope (Hann-windowed FFT per hop)
pub(crate) fn onset_envelope(samples: &[f32]) -> Vec<f32> {
    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(WINDOW_SIZE);
    let mut input = fft.make_input_vec();
    let mut spectrum: Vec<Complex<f32>> = fft.make_output_vec();

    let mut previous = vec![0.0f32; WINDOW_SIZE / 2 + 1];
    let mut envelope = Vec::new();

    for window in samples.windows(WINDOW_SIZE).step_by(HOP_SIZE) {
        for (i, &sample) in window.iter().enumerate() {
            let hann = 0.5
                * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / (WINDOW_SIZE - 1) as f32).cos());
            input[i] = sample * hann;
        }

        if fft.process(&mut input, &mut spectrum).is_err() {
            continue;
        }

        let mut flux = 0.0f32;
        for (i, c) in spectrum.iter().enumerate() {
            let magnitude = c.norm();
            flux += (magnitude - previous[i]).max(0.0);
            previous[i] = magnitude;
        }
        envelope.push(flux);
    }

    envelope
}

/// Mean spectral centroid in Hz, used by the emotion analyzer's audio path
pub(crate) fn mean_spectral_centroid(samples: &[f32], sample_rate: u32) -> f64 {
    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(WINDOW_SIZE);
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();

    let mut centroids = Vec::new();
    for window in samples.windows(WINDOW_SIZE).step_by(HOP_SIZE) {
        input[..window.len()].copy_from_slice(window);
        if fft.process(&mut input, &mut spectrum).is_err() {
            continue;
        }

        let bins = spectrum.len() as f64;
        let total: f64 = spectrum.iter().map(|c| c.norm() as f64).sum();
        if total <= 0.0 {
            continue;
        }
        let weighted: f64 = spectrum
            .iter()
            .enumerate()
            .map(|(i, c)| i as f64 * c.norm() as f64)
            .sum();
        centroids.push((weighted / total) * (sample_rate as f64 / 2.0) / bins);
    }

    if centroids.is_empty() {
        0.0
    } else {
        centroids.iter().sum::<f64>() / centroids.len() as f64
    }
}

/// Evenly spaced grid over [0, duration)
fn regular_grid(duration: f64, interval: f64) -> Vec<f64> {
    let mut grid = Vec::new();
    let mut i = 0u64;
    loop {
        let t = i as f64 * interval;
        if t >= duration {
            break;
        }
        grid.push(t);
        i += 1;
    }
    grid
}

/// Snap times to a regular grid anchored at the first element, preserving
/// its offset, then deduplicate.
pub(crate) fn align_to_grid(times: &[f64], interval: f64) -> Vec<f64> {
    let Some(&offset) = times.first() else {
        return Vec::new();
    };

    let mut aligned: Vec<f64> = times
        .iter()
        .map(|&t| {
            let relative = t - offset;
            offset + (relative / interval).round() * interval
        })
        .collect();

    aligned.sort_by(|a, b| a.partial_cmp(b).unwrap());
    aligned.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    aligned
}

/// Deterministic fallback grid: 120 BPM, 4/4, regular beats and bars
pub(crate) fn fallback_analysis(target_duration: Option<f64>) -> MusicAnalysis {
    let tempo = 120.0;
    let beat_interval = 60.0 / tempo;
    let bar_interval = beat_interval * BEATS_PER_BAR as f64;

    let mut beat_times = Vec::new();
    let mut bar_times = Vec::new();
    let mut current = 0.0f64;
    loop {
        if let Some(limit) = target_duration {
            if current > limit + bar_interval {
                break;
            }
        }
        beat_times.push(current);
        if beat_times.len() % BEATS_PER_BAR as usize == 1 {
            bar_times.push(current);
        }
        current += beat_interval;
        if current > MAX_GRID_SECONDS {
            break;
        }
    }

    MusicAnalysis {
        tempo,
        beat_times,
        bar_times,
        bars_per_minute: tempo / BEATS_PER_BAR as f64,
        beats_per_bar: BEATS_PER_BAR,
        time_signature: format!("{BEATS_PER_BAR}/4"),
        music_start: 0.0,
        analysis_duration: 0.0,
        confidence: GridConfidence::fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Click track at the given BPM with decaying bursts on each beat
    fn click_track(bpm: f64, seconds: f64, sample_rate: u32) -> Vec<f32> {
        let total = (seconds * sample_rate as f64) as usize;
        let mut samples = vec![0.0f32; total];
        let beat_samples = (60.0 / bpm * sample_rate as f64) as usize;
        for start in (0..total).step_by(beat_samples) {
            for i in 0..2000.min(total - start) {
                let t = i as f32 / sample_rate as f32;
                let decay = (-t * 40.0).exp();
                samples[start + i] = (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * decay;
            }
        }
        samples
    }

    #[test]
    fn test_estimate_tempo_click_track() {
        let samples = click_track(120.0, 10.0, ANALYSIS_SAMPLE_RATE);
        let tempo = estimate_tempo(&samples, ANALYSIS_SAMPLE_RATE);
        // Accept the detected tempo or an octave relative of it
        let candidates = [tempo, tempo * 2.0, tempo / 2.0];
        assert!(
            candidates.iter().any(|t| (t - 120.0).abs() < 8.0),
            "unexpected tempo {tempo}"
        );
    }

    #[test]
    fn test_find_music_start_skips_silence() {
        let sr = ANALYSIS_SAMPLE_RATE;
        let mut samples = vec![0.0f32; sr as usize]; // 1s silence
        samples.extend(click_track(120.0, 2.0, sr));
        let start = find_music_start(&samples, sr);
        assert!(start >= 0.5 && start <= 1.5, "start was {start}");
    }

    #[test]
    fn test_find_music_start_clamped() {
        let sr = ANALYSIS_SAMPLE_RATE;
        let samples = click_track(120.0, 2.0, sr);
        let start = find_music_start(&samples, sr);
        assert!(start >= 0.1 && start <= 5.0);
    }

    #[test]
    fn test_align_to_grid_snaps_and_dedups() {
        let times = vec![1.0, 1.49, 2.02, 2.51, 2.52];
        let aligned = align_to_grid(&times, 0.5);
        assert_eq!(aligned, vec![1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn test_fallback_grid_invariants() {
        let analysis = fallback_analysis(Some(20.0));
        assert_eq!(analysis.tempo, 120.0);
        assert!(analysis
            .beat_times
            .windows(2)
            .all(|pair| pair[1] > pair[0]));
        // Bars sit on every fourth beat
        for bar in &analysis.bar_times {
            assert!(analysis.beat_times.iter().any(|b| (b - bar).abs() < 1e-9));
        }
        assert_eq!(analysis.bar_times[0], analysis.beat_times[0]);
    }

    #[test]
    fn test_regular_grid_spacing() {
        let grid = regular_grid(2.0, 0.5);
        assert_eq!(grid, vec![0.0, 0.5, 1.0, 1.5]);
    }
}
