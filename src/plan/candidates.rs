use rand::Rng;
use rand::rngs::StdRng;

use crate::analysis::{Segment, SegmentLabel, TrackAnalysis};
use crate::weights::WeightsConfig;

use super::camelot::camelot_distance;
use super::{TransitionSpec, TransitionType};

pub(super) const CANDIDATES_PER_PAIR: usize = 8;

/// Seconds added past the exit anchor before snapping, so the outgoing track
/// rides its chosen section for a while before the blend starts.
const EXIT_RIDE_SECONDS: f64 = 20.0;
/// Chance of anchoring on the top highlight instead of a label pool.
const HIGHLIGHT_PICK_PROBABILITY: f64 = 0.7;
/// Chance that an Outro→Intro pairing is allowed through anyway.
const OUTRO_INTRO_PASS_PROBABILITY: f64 = 0.05;
/// Segments with more vocal presence than this are avoided at the seams.
const VOCAL_REJECT_THRESHOLD: f64 = 0.6;
/// Snap to a phrase boundary only when one is within this many seconds.
const PHRASE_SNAP_RADIUS: f64 = 15.0;
const BEAT_SNAP_GRID: usize = 16;

const EXIT_LABELS: [SegmentLabel; 4] = [
    SegmentLabel::Chorus,
    SegmentLabel::Verse,
    SegmentLabel::Bridge,
    SegmentLabel::Outro,
];
const ENTRY_LABELS: [SegmentLabel; 4] = [
    SegmentLabel::Intro,
    SegmentLabel::Verse,
    SegmentLabel::Chorus,
    SegmentLabel::Bridge,
];

/// Where a transition anchors inside a track: a labelled structural segment
/// or a detected highlight window.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    time: f64,
    label: AnchorLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnchorLabel {
    Segment(SegmentLabel),
    Highlight,
}

impl AnchorLabel {
    fn name(self) -> &'static str {
        match self {
            AnchorLabel::Segment(SegmentLabel::Intro) => "Intro",
            AnchorLabel::Segment(SegmentLabel::Verse) => "Verse",
            AnchorLabel::Segment(SegmentLabel::Chorus) => "Chorus",
            AnchorLabel::Segment(SegmentLabel::Bridge) => "Bridge",
            AnchorLabel::Segment(SegmentLabel::Outro) => "Outro",
            AnchorLabel::Highlight => "Highlight",
        }
    }
}

/// Generate the candidate pool for one adjacent pair.
pub(super) fn generate_candidates(
    track_a: &TrackAnalysis,
    track_b: &TrackAnalysis,
    weights: &WeightsConfig,
    rng: &mut StdRng,
) -> Vec<TransitionSpec> {
    let bars = weighted_bar_choices(weights);
    let target_bpm = (track_a.bpm + track_b.bpm) / 2.0;

    // Time-stretching is disabled by policy: both sides keep native tempo.
    let speed_a = 1.0;
    let speed_b = 1.0;

    let fallback_exit = [Segment {
        time: track_a.duration - 30.0,
        label: SegmentLabel::Outro,
        energy: 0.5,
        vocal_energy: 0.5,
    }];
    let fallback_entry = [Segment {
        time: 0.0,
        label: SegmentLabel::Intro,
        energy: 0.5,
        vocal_energy: 0.5,
    }];
    let segments_a: &[Segment] = if track_a.segments.is_empty() {
        &fallback_exit
    } else {
        &track_a.segments
    };
    let segments_b: &[Segment] = if track_b.segments.is_empty() {
        &fallback_entry
    } else {
        &track_b.segments
    };

    let mut candidates = Vec::with_capacity(CANDIDATES_PER_PAIR);
    for _ in 0..CANDIDATES_PER_PAIR {
        let kind = select_transition_type(track_a, track_b, weights, rng);
        let picked_bars = bars[rng.random_range(0..bars.len())];

        let mut exit = pick_exit_anchor(track_a, segments_a, rng);
        let mut entry = pick_entry_anchor(track_b, segments_b, rng);

        // An outro bleeding into an intro is the least interesting blend;
        // almost always re-roll it.
        while exit.label == AnchorLabel::Segment(SegmentLabel::Outro)
            && entry.label == AnchorLabel::Segment(SegmentLabel::Intro)
            && rng.random::<f64>() > OUTRO_INTRO_PASS_PROBABILITY
        {
            exit = pick_segment(segments_a, &EXIT_LABELS, rng);
            entry = pick_segment(segments_b, &ENTRY_LABELS, rng);
        }

        let a_out = snap_to_phrase(
            exit.time + EXIT_RIDE_SECONDS,
            &track_a.phrases,
            &track_a.beat_times,
            BEAT_SNAP_GRID,
        );
        let b_in = snap_to_phrase(
            entry.time,
            &track_b.phrases,
            &track_b.beat_times,
            BEAT_SNAP_GRID,
        );

        let beat_duration = 60.0 / target_bpm;
        candidates.push(TransitionSpec {
            kind,
            name: format!("{} | {}->{}", kind, exit.label.name(), entry.label.name()),
            duration: picked_bars as f64 * 4.0 * beat_duration,
            a_out_time: a_out.clamp(0.0, track_a.duration),
            b_in_time: b_in.clamp(0.0, track_b.duration),
            speed_a,
            speed_b,
            pitch_step_b: 0.0,
        });
    }
    candidates
}

/// Rank one pair's candidates and keep the best.
///
/// Candidates whose exit would start within four seconds of the previous
/// track's entry are heavily penalized so selections stay chronological.
pub(super) fn select_best(
    candidates: &[TransitionSpec],
    weights: &WeightsConfig,
    min_exit_time: f64,
    rng: &mut StdRng,
) -> Option<TransitionSpec> {
    candidates
        .iter()
        .map(|candidate| {
            let weight = match weights.type_weights.get(&candidate.kind) {
                Some(&w) if w != 0.0 => w,
                _ => 1.0,
            };
            let penalty = if candidate.a_out_time < min_exit_time + 4.0 {
                -500.0
            } else {
                0.0
            };
            (weight + penalty + rng.random::<f64>() * 0.01, candidate)
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.clone())
}

/// Pick a transition type for the pair's harmonic/energy/tempo context.
fn select_transition_type(
    track_a: &TrackAnalysis,
    track_b: &TrackAnalysis,
    weights: &WeightsConfig,
    rng: &mut StdRng,
) -> TransitionType {
    let energy_shift = track_b.mean_energy() - track_a.mean_energy();
    let key_distance = camelot_distance(&track_a.key, &track_b.key);
    let bpm_gap = (track_a.bpm - track_b.bpm).abs();

    let mut choices: Vec<(TransitionType, f64)> = vec![(
        TransitionType::Crossfade,
        weights
            .type_weights
            .get(&TransitionType::Crossfade)
            .copied()
            .unwrap_or(0.5),
    )];
    let offer = |kind: TransitionType, choices: &mut Vec<(TransitionType, f64)>| {
        if let Some(&weight) = weights.type_weights.get(&kind) {
            choices.push((kind, weight));
        }
    };

    if key_distance <= 10 && bpm_gap < 5.0 {
        offer(TransitionType::Mashup, &mut choices);
        offer(TransitionType::BassSwap, &mut choices);
    } else if energy_shift > 0.2 {
        offer(TransitionType::BassSwap, &mut choices);
    } else if energy_shift < -0.2 {
        offer(TransitionType::FilterFade, &mut choices);
    } else if bpm_gap > 10.0 {
        offer(TransitionType::Cut, &mut choices);
    }

    choices
        .into_iter()
        .map(|(kind, weight)| (kind, weight * (0.5 + rng.random::<f64>())))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(kind, _)| kind)
        .unwrap_or(TransitionType::Crossfade)
}

fn pick_exit_anchor(track: &TrackAnalysis, segments: &[Segment], rng: &mut StdRng) -> Anchor {
    if let Some(best) = top_highlight(track) {
        if rng.random::<f64>() < HIGHLIGHT_PICK_PROBABILITY {
            return Anchor {
                time: best.1,
                label: AnchorLabel::Highlight,
            };
        }
    }
    pick_segment(segments, &EXIT_LABELS, rng)
}

fn pick_entry_anchor(track: &TrackAnalysis, segments: &[Segment], rng: &mut StdRng) -> Anchor {
    if let Some(best) = top_highlight(track) {
        if rng.random::<f64>() < HIGHLIGHT_PICK_PROBABILITY {
            return Anchor {
                time: best.0,
                label: AnchorLabel::Highlight,
            };
        }
    }
    pick_segment(segments, &ENTRY_LABELS, rng)
}

/// (start_time, end_time) of the highest-scoring highlight.
fn top_highlight(track: &TrackAnalysis) -> Option<(f64, f64)> {
    track
        .highlights
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|h| (h.start_time, h.end_time))
}

/// Stratified pick from the label pool, skipping vocal-heavy segments and
/// falling back to the unfiltered pool when that empties it.
fn pick_segment(segments: &[Segment], labels: &[SegmentLabel], rng: &mut StdRng) -> Anchor {
    let labelled = |segment: &&Segment| labels.contains(&segment.label);
    let pool: Vec<&Segment> = segments
        .iter()
        .filter(labelled)
        .filter(|segment| segment.vocal_energy <= VOCAL_REJECT_THRESHOLD)
        .collect();
    let pool = if pool.is_empty() {
        segments.iter().filter(labelled).collect::<Vec<_>>()
    } else {
        pool
    };

    if pool.is_empty() {
        if segments.is_empty() {
            return Anchor {
                time: 0.0,
                label: AnchorLabel::Segment(SegmentLabel::Verse),
            };
        }
        let any = &segments[rng.random_range(0..segments.len())];
        return Anchor {
            time: any.time,
            label: AnchorLabel::Segment(any.label),
        };
    }
    let chosen = pool[rng.random_range(0..pool.len())];
    Anchor {
        time: chosen.time,
        label: AnchorLabel::Segment(chosen.label),
    }
}

/// Nearest phrase boundary when one is close enough, else the nearest beat
/// rounded onto the 16-beat grid.
pub(crate) fn snap_to_phrase(time_sec: f64, phrases: &[f64], beats: &[f64], grid: usize) -> f64 {
    if let Some(&nearest) = phrases
        .iter()
        .min_by(|a, b| (*a - time_sec).abs().total_cmp(&(*b - time_sec).abs()))
    {
        if (nearest - time_sec).abs() < PHRASE_SNAP_RADIUS {
            return nearest;
        }
    }
    snap_to_beat_grid(time_sec, beats, grid)
}

fn snap_to_beat_grid(time_sec: f64, beats: &[f64], grid: usize) -> f64 {
    if beats.is_empty() || grid == 0 {
        return time_sec;
    }
    let nearest = beats
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - time_sec).abs().total_cmp(&(b.1 - time_sec).abs()))
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let mut snapped = ((nearest as f64 / grid as f64).round() as usize) * grid;
    if snapped >= beats.len() {
        snapped = (beats.len() - 1) / grid * grid;
    }
    beats[snapped.min(beats.len() - 1)]
}

/// Expand the bar weight map into a draw list: weight 1.3 contributes 13
/// copies, so a uniform index pick respects the weights.
fn weighted_bar_choices(weights: &WeightsConfig) -> Vec<u32> {
    let mut choices = Vec::new();
    for (&bars, &weight) in &weights.bar_weights {
        let copies = ((weight * 10.0).round() as usize).max(1);
        choices.extend(std::iter::repeat_n(bars, copies));
    }
    if choices.is_empty() {
        choices.push(8);
    }
    choices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::tests::{rich_track, stub_track};
    use rand::SeedableRng;

    #[test]
    fn generates_the_full_candidate_pool() {
        let a = rich_track("a", 128.0, "C Major", 240.0);
        let b = rich_track("b", 126.0, "G Major", 240.0);
        let mut rng = StdRng::seed_from_u64(7);
        let candidates = generate_candidates(&a, &b, &WeightsConfig::default(), &mut rng);
        assert_eq!(candidates.len(), CANDIDATES_PER_PAIR);
        for candidate in &candidates {
            assert!(candidate.a_out_time >= 0.0 && candidate.a_out_time <= a.duration);
            assert!(candidate.b_in_time >= 0.0 && candidate.b_in_time <= b.duration);
            assert!(candidate.duration > 0.0);
            assert_eq!(candidate.speed_a, 1.0);
            assert_eq!(candidate.speed_b, 1.0);
        }
    }

    #[test]
    fn candidate_duration_follows_bars_at_the_target_tempo() {
        let a = rich_track("a", 120.0, "C Major", 240.0);
        let b = rich_track("b", 120.0, "C Major", 240.0);
        let mut rng = StdRng::seed_from_u64(3);
        let candidates = generate_candidates(&a, &b, &WeightsConfig::default(), &mut rng);
        for candidate in &candidates {
            // 4 bars = 8s, 8 bars = 16s at 120 BPM.
            let bars = candidate.duration / (4.0 * 0.5);
            assert!(
                (bars - 4.0).abs() < 1e-9 || (bars - 8.0).abs() < 1e-9,
                "unexpected bar count {bars}"
            );
        }
    }

    #[test]
    fn big_tempo_gap_offers_cuts() {
        let a = stub_track("a", 95.0, "C Major", 0.5);
        let b = stub_track("b", 130.0, "C Major", 0.5);
        let mut rng = StdRng::seed_from_u64(1);
        let mut saw_cut = false;
        for _ in 0..64 {
            if select_transition_type(&a, &b, &WeightsConfig::default(), &mut rng)
                == TransitionType::Cut
            {
                saw_cut = true;
                break;
            }
        }
        assert!(saw_cut);
    }

    #[test]
    fn close_harmony_and_tempo_offer_mashups() {
        let a = stub_track("a", 124.0, "C Major", 0.5);
        let b = stub_track("b", 126.0, "G Major", 0.5);
        let mut rng = StdRng::seed_from_u64(1);
        let mut kinds = std::collections::BTreeSet::new();
        for _ in 0..64 {
            kinds.insert(select_transition_type(&a, &b, &WeightsConfig::default(), &mut rng));
        }
        assert!(kinds.contains(&TransitionType::Mashup) || kinds.contains(&TransitionType::BassSwap));
        assert!(kinds.contains(&TransitionType::Crossfade));
    }

    #[test]
    fn selection_penalizes_non_chronological_exits() {
        let weights = WeightsConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        let early = TransitionSpec {
            kind: TransitionType::BassSwap,
            name: "early".to_string(),
            duration: 16.0,
            a_out_time: 10.0,
            b_in_time: 5.0,
            speed_a: 1.0,
            speed_b: 1.0,
            pitch_step_b: 0.0,
        };
        let late = TransitionSpec {
            a_out_time: 120.0,
            name: "late".to_string(),
            kind: TransitionType::Crossfade,
            ..early.clone()
        };
        let best = select_best(&[early, late], &weights, 40.0, &mut rng).unwrap();
        assert_eq!(best.name, "late");
    }

    #[test]
    fn vocal_heavy_segments_are_skipped_when_alternatives_exist() {
        let mut segments = vec![
            Segment {
                time: 10.0,
                label: SegmentLabel::Verse,
                energy: 0.5,
                vocal_energy: 0.9,
            },
            Segment {
                time: 50.0,
                label: SegmentLabel::Verse,
                energy: 0.5,
                vocal_energy: 0.2,
            },
        ];
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..32 {
            let anchor = pick_segment(&segments, &[SegmentLabel::Verse], &mut rng);
            assert_eq!(anchor.time, 50.0);
        }
        // With every option vocal-heavy the full pool comes back.
        segments[1].vocal_energy = 0.95;
        let anchor = pick_segment(&segments, &[SegmentLabel::Verse], &mut rng);
        assert!(anchor.time == 10.0 || anchor.time == 50.0);
    }

    #[test]
    fn snapping_prefers_phrase_boundaries_within_range() {
        let phrases = vec![0.0, 16.0, 32.0];
        let beats: Vec<f64> = (0..100).map(|i| i as f64 * 0.5).collect();
        assert_eq!(snap_to_phrase(18.0, &phrases, &beats, 16), 16.0);
        // 60s is 28s past the last phrase boundary: falls to the beat grid.
        let snapped = snap_to_phrase(60.0, &phrases, &beats, 16);
        let idx = beats.iter().position(|&b| b == snapped).unwrap();
        assert_eq!(idx % 16, 0);
    }

    #[test]
    fn beat_grid_snap_clamps_to_the_last_full_grid_line() {
        let beats: Vec<f64> = (0..40).map(|i| i as f64 * 0.5).collect();
        let snapped = snap_to_beat_grid(100.0, &beats, 16);
        assert_eq!(snapped, beats[32]);
    }

    #[test]
    fn bar_draw_list_respects_weights() {
        let choices = weighted_bar_choices(&WeightsConfig::default());
        let fours = choices.iter().filter(|&&b| b == 4).count();
        let eights = choices.iter().filter(|&&b| b == 8).count();
        assert_eq!(fours, 10);
        assert_eq!(eights, 13);
    }
}
