//! Mix planning: harmonic ordering, transition candidate generation, and
//! scenario-level selection.

mod camelot;
mod candidates;
mod order;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::TrackAnalysis;
use crate::weights::WeightsConfig;

/// The blend family applied between two adjacent tracks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Crossfade,
    BassSwap,
    Cut,
    FilterFade,
    Mashup,
}

impl std::fmt::Display for TransitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransitionType::Crossfade => "crossfade",
            TransitionType::BassSwap => "bass_swap",
            TransitionType::Cut => "cut",
            TransitionType::FilterFade => "filter_fade",
            TransitionType::Mashup => "mashup",
        };
        f.write_str(name)
    }
}

/// A fully specified transition between one adjacent pair.
///
/// Both time fields are snapped to the owning track's phrase or beat grid.
/// `duration` is `bars * 4 * (60 / target_bpm)` at generation time; the
/// renderer may clamp it further against real chunk lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    #[serde(rename = "type")]
    pub kind: TransitionType,
    pub name: String,
    pub duration: f64,
    pub a_out_time: f64,
    pub b_in_time: f64,
    /// Tempo factors are held at 1.0 by policy; the audition path honors
    /// them, the main renderer never stretches.
    pub speed_a: f64,
    pub speed_b: f64,
    #[serde(default)]
    pub pitch_step_b: f64,
}

/// Ordered tracks plus the candidate pools and winning selection per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixPlan {
    pub sorted_tracks: Vec<TrackAnalysis>,
    pub candidates: Vec<Vec<TransitionSpec>>,
    pub selections: Vec<TransitionSpec>,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Mix planning needs at least 2 analyzed tracks, got {0}")]
    NotEnoughTracks(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    /// Independent candidate/selection runs; the best-scoring run wins.
    pub scenarios: usize,
    /// Base RNG seed; each scenario derives its own stream from it.
    pub seed: u64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            scenarios: 5,
            seed: 42,
        }
    }
}

/// Produce the full mix plan: sort once, then run N independent candidate
/// generation + selection scenarios and keep the one whose selected types
/// carry the most total user weight (earlier runs win ties).
pub fn generate_mix_plan(
    tracks: &[TrackAnalysis],
    weights: &WeightsConfig,
    options: &PlanOptions,
) -> Result<MixPlan, PlanError> {
    if tracks.len() < 2 {
        return Err(PlanError::NotEnoughTracks(tracks.len()));
    }

    let sorted = order::sort_playlist(tracks);
    let scenarios = options.scenarios.max(1);

    let mut best_score = f64::NEG_INFINITY;
    let mut best_candidates: Vec<Vec<TransitionSpec>> = Vec::new();
    let mut best_selections: Vec<TransitionSpec> = Vec::new();

    for scenario in 0..scenarios {
        let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(scenario as u64));
        let mut scenario_score = 0.0;
        let mut scenario_candidates = Vec::with_capacity(sorted.len() - 1);
        let mut scenario_selections = Vec::with_capacity(sorted.len() - 1);
        let mut min_exit_time = 0.0_f64;

        for pair in sorted.windows(2) {
            let pool = candidates::generate_candidates(&pair[0], &pair[1], weights, &mut rng);
            if let Some(best) =
                candidates::select_best(&pool, weights, min_exit_time, &mut rng)
            {
                scenario_score += weights.type_weight(best.kind);
                min_exit_time = best.b_in_time;
                scenario_selections.push(best);
            }
            scenario_candidates.push(pool);
        }

        debug!("Scenario {scenario} scored {scenario_score:.2}");
        if scenario_score > best_score {
            best_score = scenario_score;
            best_candidates = scenario_candidates;
            best_selections = scenario_selections;
        }
    }

    info!(
        "Planned mix of {} tracks, {} transitions, scenario score {best_score:.2}",
        sorted.len(),
        best_selections.len()
    );
    Ok(MixPlan {
        sorted_tracks: sorted,
        candidates: best_candidates,
        selections: best_selections,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::{Highlight, Segment, SegmentLabel};

    /// Minimal analysis stub: key/bpm/energy only.
    pub(crate) fn stub_track(name: &str, bpm: f64, key: &str, energy: f64) -> TrackAnalysis {
        TrackAnalysis {
            filepath: name.to_string(),
            hash: name.to_string(),
            duration: 240.0,
            bpm,
            loudness_db: -12.0,
            key: key.to_string(),
            beat_times: Vec::new(),
            phrases: Vec::new(),
            segments: Vec::new(),
            energy: vec![energy],
            highlights: Vec::new(),
            bpm_source: Default::default(),
        }
    }

    /// Fully populated analysis: beat grid, phrases, segments, highlights.
    pub(crate) fn rich_track(name: &str, bpm: f64, key: &str, duration: f64) -> TrackAnalysis {
        let step = 60.0 / bpm;
        let beat_times: Vec<f64> = (0..)
            .map(|i| i as f64 * step)
            .take_while(|t| *t < duration)
            .collect();
        let phrases: Vec<f64> = beat_times.iter().step_by(32).copied().collect();
        let segments: Vec<Segment> = phrases
            .iter()
            .enumerate()
            .map(|(i, &time)| Segment {
                time,
                label: match (time / duration, i % 3) {
                    (p, _) if p < 0.15 => SegmentLabel::Intro,
                    (p, _) if p > 0.85 => SegmentLabel::Outro,
                    (_, 0) => SegmentLabel::Chorus,
                    (_, 1) => SegmentLabel::Verse,
                    _ => SegmentLabel::Bridge,
                },
                energy: 0.5,
                vocal_energy: 0.4,
            })
            .collect();
        let energy = vec![0.6; beat_times.len()];
        let highlights = if beat_times.len() >= 64 {
            vec![Highlight {
                start_beat_idx: 32,
                end_beat_idx: 96,
                start_time: beat_times[32],
                end_time: beat_times[95.min(beat_times.len() - 1)],
                score: 0.9,
            }]
        } else {
            Vec::new()
        };
        TrackAnalysis {
            filepath: name.to_string(),
            hash: name.to_string(),
            duration,
            bpm,
            loudness_db: -11.0,
            key: key.to_string(),
            beat_times,
            phrases,
            segments,
            energy,
            highlights,
            bpm_source: Default::default(),
        }
    }

    #[test]
    fn planning_needs_two_tracks() {
        let weights = WeightsConfig::default();
        let err = generate_mix_plan(
            &[rich_track("solo", 120.0, "C Major", 200.0)],
            &weights,
            &PlanOptions::default(),
        );
        assert!(matches!(err, Err(PlanError::NotEnoughTracks(1))));
    }

    #[test]
    fn plan_has_one_selection_per_adjacent_pair() {
        let tracks = vec![
            rich_track("a", 120.0, "C Major", 240.0),
            rich_track("b", 122.0, "G Major", 230.0),
            rich_track("c", 125.0, "D Major", 250.0),
        ];
        let plan =
            generate_mix_plan(&tracks, &WeightsConfig::default(), &PlanOptions::default())
                .unwrap();
        assert_eq!(plan.sorted_tracks.len(), 3);
        assert_eq!(plan.selections.len(), 2);
        assert_eq!(plan.candidates.len(), 2);
        for pool in &plan.candidates {
            assert_eq!(pool.len(), 8);
        }
    }

    #[test]
    fn planning_is_deterministic_for_a_fixed_seed() {
        let tracks = vec![
            rich_track("a", 118.0, "A Minor", 220.0),
            rich_track("b", 121.0, "C Major", 240.0),
            rich_track("c", 127.0, "E Minor", 260.0),
            rich_track("d", 124.0, "G Major", 230.0),
        ];
        let options = PlanOptions {
            scenarios: 5,
            seed: 1234,
        };
        let weights = WeightsConfig::default();
        let first = generate_mix_plan(&tracks, &weights, &options).unwrap();
        let second = generate_mix_plan(&tracks, &weights, &options).unwrap();
        assert_eq!(first.selections, second.selections);
        assert_eq!(first.candidates, second.candidates);
    }

    #[test]
    fn selections_remain_chronological_whenever_the_pool_allows() {
        let tracks: Vec<TrackAnalysis> = (0..6)
            .map(|i| rich_track(&format!("t{i}"), 118.0 + i as f64 * 2.0, "C Major", 260.0))
            .collect();
        let plan =
            generate_mix_plan(&tracks, &WeightsConfig::default(), &PlanOptions::default())
                .unwrap();
        // A selection may only break chronology when every candidate in its
        // pool breaks it; otherwise the -500 penalty forces a compliant pick.
        let mut min_exit = 0.0_f64;
        for (selection, pool) in plan.selections.iter().zip(&plan.candidates) {
            if selection.a_out_time < min_exit + 4.0 {
                assert!(
                    pool.iter().all(|c| c.a_out_time < min_exit + 4.0),
                    "non-chronological pick despite compliant candidates"
                );
            }
            min_exit = selection.b_in_time;
        }
    }

    #[test]
    fn transition_spec_serializes_with_wire_names() {
        let spec = TransitionSpec {
            kind: TransitionType::BassSwap,
            name: "bass_swap | Chorus->Verse".to_string(),
            duration: 16.0,
            a_out_time: 120.0,
            b_in_time: 30.0,
            speed_a: 1.0,
            speed_b: 1.0,
            pitch_step_b: 0.0,
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "bass_swap");
        assert_eq!(json["a_out_time"], 120.0);
    }
}
