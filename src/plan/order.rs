use crate::analysis::TrackAnalysis;

use super::camelot::camelot_distance;

/// Target mean energy for a track at relative position `p` in the set:
/// rises toward a peak around 70% in, then eases off.
fn ideal_energy(position: f64) -> f64 {
    (position * std::f64::consts::PI * 0.9).sin() * 0.6 + 0.4
}

/// Greedy nearest-neighbour ordering over harmonic distance, tempo gap,
/// energy-arc fit, and tempo-trend momentum. The first analyzed track seeds
/// the chain. Mean energies are computed once up front.
pub(super) fn sort_playlist(tracks: &[TrackAnalysis]) -> Vec<TrackAnalysis> {
    if tracks.is_empty() {
        return Vec::new();
    }

    let mean_energies: Vec<f64> = tracks.iter().map(TrackAnalysis::mean_energy).collect();

    let mut sorted_idx = vec![0usize];
    let mut remaining: Vec<usize> = (1..tracks.len()).collect();

    while !remaining.is_empty() {
        let current = &tracks[sorted_idx[sorted_idx.len() - 1]];
        let position = sorted_idx.len() as f64 / tracks.len() as f64;
        let target_energy = ideal_energy(position);
        let trend = if sorted_idx.len() >= 2 {
            current.bpm - tracks[sorted_idx[sorted_idx.len() - 2]].bpm
        } else {
            0.0
        };

        let mut best_slot = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for (slot, &candidate_idx) in remaining.iter().enumerate() {
            let candidate = &tracks[candidate_idx];
            let score = transition_score(
                current,
                candidate,
                mean_energies[candidate_idx],
                target_energy,
                trend,
            );
            if score > best_score {
                best_score = score;
                best_slot = slot;
            }
        }
        sorted_idx.push(remaining.remove(best_slot));
    }

    sorted_idx.into_iter().map(|idx| tracks[idx].clone()).collect()
}

fn transition_score(
    current: &TrackAnalysis,
    candidate: &TrackAnalysis,
    candidate_energy: f64,
    target_energy: f64,
    trend: f64,
) -> f64 {
    let key_distance = camelot_distance(&current.key, &candidate.key) as f64;
    let mut score = (60.0 - key_distance).max(0.0);

    let bpm_gap = (candidate.bpm - current.bpm).abs();
    score += (20.0 - bpm_gap).max(0.0);

    let energy_miss = (candidate_energy - target_energy).abs();
    score += (20.0 - energy_miss * 20.0).max(0.0);

    let momentum = (trend > 0.0 && candidate.bpm > current.bpm)
        || (trend < 0.0 && candidate.bpm < current.bpm);
    if momentum {
        score += 5.0;
    }
    score
}
