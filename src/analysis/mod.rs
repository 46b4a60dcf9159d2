//! Track analysis: decode to mono PCM, then tempo, beat grid, energy, key,
//! structure, and highlights, cached as content-addressed JSON.

pub(crate) mod batch;
mod cache;
mod energy;
mod fft;
mod key;
mod onset;
mod structure;
mod tempo;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ffmpeg::{DecodeRequest, FfmpegError, FfmpegTool};

pub use tempo::{TempoEstimate, TempoSource};

/// Fixed mono sample rate used for all analysis passes.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

/// Structural label assigned to each 32-beat phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentLabel {
    Intro,
    Verse,
    Chorus,
    Bridge,
    Outro,
}

impl std::fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SegmentLabel::Intro => "Intro",
            SegmentLabel::Verse => "Verse",
            SegmentLabel::Chorus => "Chorus",
            SegmentLabel::Bridge => "Bridge",
            SegmentLabel::Outro => "Outro",
        };
        f.write_str(name)
    }
}

/// One phrase-level structural segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub time: f64,
    pub label: SegmentLabel,
    pub energy: f64,
    /// Mean 300-3400 Hz band ratio over the phrase; 0.5 when unknown.
    #[serde(default = "neutral_vocal_energy")]
    pub vocal_energy: f64,
}

fn neutral_vocal_energy() -> f64 {
    0.5
}

/// A high-energy 64-beat window, ranked by mean beat energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub start_beat_idx: usize,
    pub end_beat_idx: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub score: f64,
}

/// Complete per-track analysis. Immutable once computed; persisted under its
/// content hash so identical bytes are never analyzed twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    pub filepath: String,
    pub hash: String,
    /// Seconds, rounded to two decimals.
    pub duration: f64,
    /// 60-200 BPM, rounded to one decimal.
    pub bpm: f64,
    /// Full-signal RMS in dBFS, rounded to one decimal.
    pub loudness_db: f64,
    /// `"<root> <Major|Minor>"`, e.g. `"F# Minor"`.
    pub key: String,
    pub beat_times: Vec<f64>,
    pub phrases: Vec<f64>,
    pub segments: Vec<Segment>,
    /// One value per beat, max-normalized to [0, 1].
    pub energy: Vec<f64>,
    /// Up to three windows, descending score.
    pub highlights: Vec<Highlight>,
    #[serde(default)]
    pub bpm_source: TempoSource,
}

impl TrackAnalysis {
    pub fn mean_energy(&self) -> f64 {
        if self.energy.is_empty() {
            return 0.5;
        }
        self.energy.iter().sum::<f64>() / self.energy.len() as f64
    }

    pub fn filename(&self) -> String {
        Path::new(&self.filepath)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filepath.clone())
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Decoding {path} produced no usable audio: {detail}")]
    Decode { path: PathBuf, detail: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Analyze one track, consulting the cache first.
///
/// A cache hit returns the stored struct unchanged, including the filepath it
/// was first analyzed under.
pub fn analyze_track(
    tool: &FfmpegTool,
    path: &Path,
    cache_dir: &Path,
) -> Result<TrackAnalysis, AnalysisError> {
    let hash = cache::content_hash(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let cache_file = cache::cache_path(cache_dir, &hash);
    if let Some(cached) = cache::load(&cache_file) {
        debug!("Analysis cache hit for {}", path.display());
        return Ok(cached);
    }

    info!("Analyzing {}", path.display());
    let samples = tool
        .decode_to_pcm(&DecodeRequest::mono(path, ANALYSIS_SAMPLE_RATE))
        .map_err(|err| map_decode_error(path, err))?;

    let analysis = analyze_samples(path, hash, &samples, ANALYSIS_SAMPLE_RATE);
    if let Err(err) = cache::store(&cache_file, &analysis) {
        warn!("Analysis cache write failed: {err}");
    }
    info!(
        "Analyzed {} ({:.1}s, {:.1} BPM, {})",
        path.display(),
        analysis.duration,
        analysis.bpm,
        analysis.key
    );
    Ok(analysis)
}

/// Analyze up to four tracks at a time, preserving caller order.
pub fn analyze_batch(
    tool: &FfmpegTool,
    paths: &[PathBuf],
    cache_dir: &Path,
) -> Vec<Result<TrackAnalysis, AnalysisError>> {
    batch::run_indexed(paths.len(), batch::MAX_PARALLEL_JOBS, |idx| {
        analyze_track(tool, &paths[idx], cache_dir)
    })
}

fn analyze_samples(path: &Path, hash: String, samples: &[f32], sample_rate: u32) -> TrackAnalysis {
    let duration = samples.len() as f64 / sample_rate as f64;
    let loudness = energy::loudness_dbfs(samples);

    let envelope = onset::onset_envelope(samples);
    let estimate = tempo::estimate_tempo(&envelope, sample_rate, onset::ONSET_HOP_SIZE);
    if estimate.is_defaulted() {
        warn!(
            "Signal too short for tempo analysis in {}; defaulting to {} BPM",
            path.display(),
            estimate.bpm
        );
    }
    let beat_times = tempo::beat_grid(
        &envelope,
        sample_rate,
        onset::ONSET_HOP_SIZE,
        duration,
        estimate.bpm,
    );
    let beat_energy = energy::beat_energy(samples, sample_rate, &beat_times);
    let profile = key::spectral_profile(samples, sample_rate);

    let phrases = structure::phrase_times(&beat_times);
    let segments =
        structure::classify_segments(&phrases, &beat_energy, duration, &profile.vocal_ratios);
    let highlights = structure::detect_highlights(&beat_times, &beat_energy);

    TrackAnalysis {
        filepath: path.to_string_lossy().into_owned(),
        hash,
        duration: (duration * 100.0).round() / 100.0,
        bpm: estimate.bpm,
        loudness_db: tempo::round1(loudness),
        key: profile.key,
        beat_times,
        phrases,
        segments,
        energy: beat_energy,
        highlights,
        bpm_source: estimate.source,
    }
}

fn map_decode_error(path: &Path, err: FfmpegError) -> AnalysisError {
    match err {
        FfmpegError::Io { source, .. } => AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => AnalysisError::Decode {
            path: path.to_path_buf(),
            detail: other.to_string(),
        },
    }
}
