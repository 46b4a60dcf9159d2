//! Play-bound computation and the two-pass fade envelope.
//!
//! The exit fade of track *i* equals the entry fade of track *i+1*, which is
//! only known once the next pair's crossfade is clamped. That dependency is
//! resolved by an explicit pre-pass over theoretical chunk lengths; the
//! renderer later re-clamps each crossfade against the measured length of the
//! previous chunk when placing chunks on the canvas.

use serde::{Deserialize, Serialize};

use crate::analysis::{SegmentLabel, TrackAnalysis};
use crate::plan::{TransitionSpec, TransitionType};

/// Preferred minimum playable window per track.
pub const MIN_CHUNK_SECONDS: f64 = 30.0;
/// Hard floor the clamp never crosses.
pub const MIN_TAIL_SECONDS: f64 = 15.0;

/// Absolute crossfade floor in milliseconds.
const MIN_XFADE_MS: i64 = 8000;
/// The previous chunk must keep at least this much of itself un-faded.
const PREV_CHUNK_RESERVE_MS: i64 = 1000;
/// The incoming chunk must keep at least this much of itself un-faded.
const CURRENT_CHUNK_RESERVE_MS: i64 = 5000;
/// A crossfade may cover at most this share of either chunk.
const XFADE_SHARE_CAP: f64 = 0.4;

/// One renderable playlist slot derived from a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub filepath: String,
    pub filename: String,
    pub duration: f64,
    pub bpm: f64,
    pub loudness_db: f64,
    pub play_start: f64,
    pub play_end: f64,
}

/// Derive play bounds for every track in plan order.
///
/// The first track opens on its strongest highlight (or an early Intro/Verse
/// segment) snapped to the beat grid, unless that lands past the midpoint in
/// which case it opens at zero. Every later track starts where its incoming
/// transition drops in, clamped so at least 15 seconds remain.
pub fn compute_play_bounds(
    tracks: &[TrackAnalysis],
    transitions: &[TransitionSpec],
) -> Vec<TrackEntry> {
    let mut entries: Vec<TrackEntry> = tracks
        .iter()
        .map(|track| TrackEntry {
            filepath: track.filepath.clone(),
            filename: track.filename(),
            duration: track.duration,
            bpm: track.bpm,
            loudness_db: track.loudness_db,
            play_start: 0.0,
            play_end: track.duration,
        })
        .collect();
    if entries.is_empty() {
        return entries;
    }

    entries[0].play_start = first_track_start(&tracks[0]);

    for i in 1..entries.len() {
        let start = match transitions.get(i - 1) {
            Some(transition) => {
                let duration = tracks[i].duration;
                transition
                    .b_in_time
                    .clamp(0.0, (duration - MIN_TAIL_SECONDS).max(0.0))
            }
            None => 0.0,
        };
        entries[i].play_start = start;
    }
    entries
}

fn first_track_start(track: &TrackAnalysis) -> f64 {
    let mut anchor = 0.0_f64;
    if let Some(best) = track.highlights.first() {
        anchor = best.start_time;
    } else if let Some(segment) = track
        .segments
        .iter()
        .find(|s| matches!(s.label, SegmentLabel::Intro | SegmentLabel::Verse))
    {
        anchor = segment.time;
    }

    if anchor > 0.0 && !track.beat_times.is_empty() {
        anchor = track
            .beat_times
            .iter()
            .copied()
            .min_by(|a, b| (a - anchor).abs().total_cmp(&(b - anchor).abs()))
            .unwrap_or(anchor);
    }
    // An opener past the midpoint means the analysis misread the track.
    if anchor > track.duration * 0.5 {
        return 0.0;
    }
    anchor
}

/// Enforce the 30-second preferred window and the 15-second hard floor.
///
/// A short window extends forward; when the source runs out the end pins to
/// the duration and the start backs up instead.
pub fn clamp_play_bounds(start_sec: f64, end_sec: f64, duration: f64) -> (f64, f64) {
    let mut end = if end_sec <= 0.0 { duration } else { end_sec };
    let mut start = start_sec.max(0.0);

    if end - start < MIN_CHUNK_SECONDS {
        let needed = MIN_CHUNK_SECONDS - (end - start);
        if end + needed <= duration {
            end += needed;
        } else {
            end = duration;
            start = (end - MIN_CHUNK_SECONDS).max(0.0);
        }
    }
    if start >= end - MIN_TAIL_SECONDS {
        start = (end - MIN_TAIL_SECONDS).max(0.0);
    }
    (start, end)
}

/// Chunk lengths a crossfade is clamped against.
#[derive(Debug, Clone, Copy)]
pub struct XfadeBudget {
    /// Length of the previous chunk in ms (theory in the pre-pass, measured
    /// in the render pass).
    pub prev_chunk_ms: i64,
    /// Theoretical length of the incoming chunk in ms.
    pub current_chunk_ms: i64,
    /// Mean tempo of the two tracks, for the musical minimum.
    pub avg_bpm: f64,
}

/// Apply the full clamp chain to a requested crossfade.
///
/// Raised to at least two bars at the pair's mean tempo (floor 8 s), then
/// capped by the previous chunk's budget, the incoming chunk's budget, and a
/// 40% share of the shorter chunk. Non-positive caps are skipped; the result
/// never goes below zero.
pub fn clamp_crossfade_ms(target_ms: i64, budget: &XfadeBudget) -> i64 {
    let avg_bpm = if budget.avg_bpm > 0.0 {
        budget.avg_bpm
    } else {
        120.0
    };
    let bar_ms = 4.0 * 60_000.0 / avg_bpm;
    let musical_min = ((2.0 * bar_ms).round() as i64).max(MIN_XFADE_MS);

    let mut xfade = target_ms.max(musical_min);

    let max_by_prev = budget.prev_chunk_ms - PREV_CHUNK_RESERVE_MS;
    let max_by_current = budget.current_chunk_ms - CURRENT_CHUNK_RESERVE_MS;
    let max_by_share =
        (budget.prev_chunk_ms.min(budget.current_chunk_ms) as f64 * XFADE_SHARE_CAP) as i64;

    if max_by_prev > 0 {
        xfade = xfade.min(max_by_prev);
    }
    if max_by_current > 0 {
        xfade = xfade.min(max_by_current);
    }
    if max_by_share > 0 {
        xfade = xfade.min(max_by_share);
    }
    xfade.max(0)
}

/// Entry/exit fade assignment for one playlist slot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FadePlan {
    pub entry_fade: f64,
    pub entry_kind: Option<TransitionType>,
    pub exit_fade: f64,
    pub exit_kind: Option<TransitionType>,
}

/// Pre-pass over theoretical chunk lengths that fixes every fade envelope.
///
/// Fade lengths cannot change once a chunk's filter chain is built, so they
/// come from theory here; only the canvas overlap is later recomputed from
/// measured chunk lengths.
pub fn plan_fades(playlist: &[TrackEntry], transitions: &[TransitionSpec]) -> Vec<FadePlan> {
    let mut fades = vec![FadePlan::default(); playlist.len()];
    let mut prev_theory_ms = 0_i64;

    for (i, entry) in playlist.iter().enumerate() {
        let (start, end) = clamp_play_bounds(entry.play_start, entry.play_end, entry.duration);
        let chunk_theory_ms = ((end - start) * 1000.0).round() as i64;

        if i > 0 {
            if let Some(transition) = transitions.get(i - 1) {
                let budget = XfadeBudget {
                    prev_chunk_ms: prev_theory_ms,
                    current_chunk_ms: chunk_theory_ms,
                    avg_bpm: (playlist[i - 1].bpm + entry.bpm) / 2.0,
                };
                let xfade_ms =
                    clamp_crossfade_ms((transition.duration * 1000.0).round() as i64, &budget);
                let fade_sec = xfade_ms as f64 / 1000.0;
                fades[i].entry_fade = fade_sec;
                fades[i].entry_kind = Some(transition.kind);
                fades[i - 1].exit_fade = fade_sec;
                fades[i - 1].exit_kind = Some(transition.kind);
            }
        }
        prev_theory_ms = chunk_theory_ms;
    }
    fades
}
