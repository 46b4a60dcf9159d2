use serde::{Deserialize, Serialize};

pub(crate) const BPM_MIN: f64 = 60.0;
pub(crate) const BPM_MAX: f64 = 200.0;

/// Below this many onset frames the autocorrelation is meaningless.
const MIN_ONSET_FRAMES: usize = 100;
const FALLBACK_BPM: f64 = 120.0;
const ANCHOR_SEARCH_SECONDS: f64 = 5.0;

/// How a tempo value was obtained. Callers that care about the silent
/// fallback check this instead of comparing against a sentinel value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoSource {
    #[default]
    Measured,
    DefaultedShortSignal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub source: TempoSource,
}

impl TempoEstimate {
    pub fn is_defaulted(&self) -> bool {
        self.source != TempoSource::Measured
    }
}

/// Estimate the tempo from an onset envelope.
///
/// Mean autocorrelation over the 60-200 BPM lag range, weighted by a gentle
/// perceptual bias toward 120 BPM so half/double-tempo lags do not win on raw
/// correlation alone.
pub(crate) fn estimate_tempo(onset: &[f32], sample_rate: u32, hop_size: usize) -> TempoEstimate {
    if onset.len() < MIN_ONSET_FRAMES {
        return TempoEstimate {
            bpm: FALLBACK_BPM,
            source: TempoSource::DefaultedShortSignal,
        };
    }

    let sr = sample_rate as f64;
    let hop = hop_size as f64;
    let min_lag = ((sr * 60.0 / (BPM_MAX * hop)) as usize).max(1);
    let max_lag = ((sr * 60.0 / (BPM_MIN * hop)) as usize).min(onset.len() - 1);

    let mut best_lag = min_lag;
    let mut best_corr = -1.0_f64;
    for lag in min_lag..=max_lag {
        let mut corr = 0.0_f64;
        let mut count = 0usize;
        for i in 0..onset.len() - lag {
            corr += onset[i] as f64 * onset[i + lag] as f64;
            count += 1;
        }
        if count > 0 {
            corr /= count as f64;
        }

        let bpm_approx = 60.0 / (lag as f64 * hop / sr);
        let bias = (-0.5 * ((bpm_approx - 120.0) / 40.0).powi(2)).exp();
        let weighted = corr * (0.8 + 0.2 * bias);
        if weighted > best_corr {
            best_corr = weighted;
            best_lag = lag;
        }
    }

    let beat_period = best_lag as f64 * hop / sr;
    if beat_period <= 0.0 {
        return TempoEstimate {
            bpm: FALLBACK_BPM,
            source: TempoSource::DefaultedShortSignal,
        };
    }
    TempoEstimate {
        bpm: round1(normalize_bpm(60.0 / beat_period)),
        source: TempoSource::Measured,
    }
}

/// Fold a raw BPM into [60, 200] by octave doubling/halving.
pub(crate) fn normalize_bpm(mut bpm: f64) -> f64 {
    while bpm > BPM_MAX {
        bpm /= 2.0;
    }
    while bpm < BPM_MIN {
        bpm *= 2.0;
    }
    bpm
}

/// Generate the phase-anchored beat grid.
///
/// The anchor is the strongest onset peak within the first five seconds; the
/// grid extends backward and forward from it at `60/bpm`, rounded to whole
/// milliseconds.
pub(crate) fn beat_grid(
    onset: &[f32],
    sample_rate: u32,
    hop_size: usize,
    duration_sec: f64,
    bpm: f64,
) -> Vec<f64> {
    let bpm = if bpm > 0.0 { bpm } else { FALLBACK_BPM };
    let beat_period = 60.0 / bpm;

    let mut anchor = 0.0_f64;
    if !onset.is_empty() {
        let frames_per_sec = sample_rate as f64 / hop_size as f64;
        let search = ((ANCHOR_SEARCH_SECONDS * frames_per_sec) as usize).min(onset.len());
        let mut best_idx = 0usize;
        let mut best_value = 0.0_f32;
        for (idx, &value) in onset.iter().enumerate().take(search) {
            if value > best_value {
                best_value = value;
                best_idx = idx;
            }
        }
        anchor = best_idx as f64 / frames_per_sec;
    }

    let mut beats = Vec::new();
    let mut t = anchor;
    while t >= 0.0 {
        beats.push(round_ms(t));
        t -= beat_period;
    }
    t = anchor + beat_period;
    while t < duration_sec {
        beats.push(round_ms(t));
        t += beat_period;
    }
    beats.sort_by(|a, b| a.total_cmp(b));
    beats
}

pub(crate) fn round_ms(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
