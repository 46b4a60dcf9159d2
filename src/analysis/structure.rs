use super::{Highlight, Segment, SegmentLabel};

/// Beats per phrase block.
pub(crate) const PHRASE_BEATS: usize = 32;

const HIGHLIGHT_WINDOW_BEATS: usize = 64;
const HIGHLIGHT_STEP_BEATS: usize = 16;
const HIGHLIGHT_LIMIT: usize = 3;

/// Neutral vocal estimate for phrases with no spectral frames.
const VOCAL_FALLBACK: f64 = 0.5;

/// One phrase boundary time per 32 beats.
pub(crate) fn phrase_times(beat_times: &[f64]) -> Vec<f64> {
    beat_times.iter().step_by(PHRASE_BEATS).copied().collect()
}

/// Label each phrase by its energy percentile band and position in the track.
pub(crate) fn classify_segments(
    phrases: &[f64],
    beat_energy: &[f64],
    duration_sec: f64,
    vocal_ratios: &[(f64, f64)],
) -> Vec<Segment> {
    if phrases.is_empty() {
        return Vec::new();
    }

    let phrase_energies = phrase_mean_energies(phrases.len(), beat_energy);
    let mut sorted = phrase_energies.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let low_threshold = percentile(&sorted, 0.3);
    let high_threshold = percentile(&sorted, 0.7);

    phrases
        .iter()
        .enumerate()
        .map(|(i, &time)| {
            let energy = phrase_energies[i];
            let relative = if duration_sec > 0.0 {
                time / duration_sec
            } else {
                0.0
            };
            let label = if relative < 0.15 && energy < high_threshold {
                SegmentLabel::Intro
            } else if relative > 0.85 && energy < high_threshold {
                SegmentLabel::Outro
            } else if energy >= high_threshold {
                SegmentLabel::Chorus
            } else if energy <= low_threshold {
                SegmentLabel::Bridge
            } else {
                SegmentLabel::Verse
            };
            let next_time = phrases.get(i + 1).copied().unwrap_or(f64::INFINITY);
            Segment {
                time,
                label,
                energy,
                vocal_energy: phrase_vocal_energy(time, next_time, vocal_ratios),
            }
        })
        .collect()
}

fn phrase_mean_energies(phrase_count: usize, beat_energy: &[f64]) -> Vec<f64> {
    (0..phrase_count)
        .map(|i| {
            let start = i * PHRASE_BEATS;
            let end = ((i + 1) * PHRASE_BEATS).min(beat_energy.len());
            if start >= beat_energy.len() {
                return 0.0;
            }
            let span = &beat_energy[start..end];
            span.iter().sum::<f64>() / span.len() as f64
        })
        .collect()
}

fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let idx = ((sorted.len() as f64 * fraction) as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn phrase_vocal_energy(start: f64, end: f64, vocal_ratios: &[(f64, f64)]) -> f64 {
    let mut sum = 0.0_f64;
    let mut count = 0usize;
    for &(time, ratio) in vocal_ratios {
        if time >= start && time < end {
            sum += ratio;
            count += 1;
        }
    }
    if count == 0 {
        VOCAL_FALLBACK
    } else {
        sum / count as f64
    }
}

/// Slide a 64-beat window in 16-beat steps and keep the three highest-energy
/// windows, descending by score.
pub(crate) fn detect_highlights(beat_times: &[f64], energy: &[f64]) -> Vec<Highlight> {
    if beat_times.len() < HIGHLIGHT_WINDOW_BEATS || energy.len() < HIGHLIGHT_WINDOW_BEATS {
        let end = beat_times.last().copied().unwrap_or(0.0);
        return vec![Highlight {
            start_beat_idx: 0,
            end_beat_idx: 0,
            start_time: 0.0,
            end_time: end,
            score: 0.0,
        }];
    }

    let mut candidates = Vec::new();
    let mut i = 0usize;
    while i + HIGHLIGHT_WINDOW_BEATS <= energy.len() {
        let window = &energy[i..i + HIGHLIGHT_WINDOW_BEATS];
        let score = window.iter().sum::<f64>() / window.len() as f64;
        let end_idx = (i + HIGHLIGHT_WINDOW_BEATS - 1).min(beat_times.len() - 1);
        candidates.push(Highlight {
            start_beat_idx: i,
            end_beat_idx: i + HIGHLIGHT_WINDOW_BEATS,
            start_time: beat_times[i],
            end_time: beat_times[end_idx],
            score,
        });
        i += HIGHLIGHT_STEP_BEATS;
    }
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(HIGHLIGHT_LIMIT);
    candidates
}
