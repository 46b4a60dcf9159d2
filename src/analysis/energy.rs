use super::fft::hann_window;

pub(crate) const RMS_FRAME_SIZE: usize = 2048;
pub(crate) const RMS_HOP_SIZE: usize = 512;

/// RMS of Hann-windowed frames over the whole signal.
pub(crate) fn rms_frames(samples: &[f32], frame_size: usize, hop_size: usize) -> Vec<f64> {
    if samples.len() <= frame_size || hop_size == 0 {
        return vec![0.5];
    }
    let frame_count = (samples.len() - frame_size) / hop_size;
    if frame_count == 0 {
        return vec![0.5];
    }
    let window = hann_window(frame_size);
    let mut frames = Vec::with_capacity(frame_count);
    for i in 0..frame_count {
        let start = i * hop_size;
        let mut sum = 0.0_f64;
        let mut count = 0usize;
        for (j, &sample) in samples[start..].iter().take(frame_size).enumerate() {
            let value = (sample * window[j]) as f64;
            sum += value * value;
            count += 1;
        }
        frames.push(if count > 0 {
            (sum / count as f64).sqrt()
        } else {
            0.0
        });
    }
    frames
}

/// Mean frame RMS between each beat and the next (the last beat extends half
/// a second), max-normalized into [0, 1].
pub(crate) fn beat_energy(samples: &[f32], sample_rate: u32, beat_times: &[f64]) -> Vec<f64> {
    let rms = rms_frames(samples, RMS_FRAME_SIZE, RMS_HOP_SIZE);
    if beat_times.len() < 2 {
        return vec![0.5];
    }

    let frames_per_sec = sample_rate as f64 / RMS_HOP_SIZE as f64;
    let mut energy = Vec::with_capacity(beat_times.len());
    for (i, &beat) in beat_times.iter().enumerate() {
        let frame_idx = ((beat * frames_per_sec) as usize).min(rms.len().saturating_sub(1));
        let next_idx = match beat_times.get(i + 1) {
            Some(&next) => ((next * frames_per_sec) as usize).min(rms.len()),
            None => (frame_idx + (frames_per_sec * 0.5) as usize).min(rms.len()),
        };
        let span = &rms[frame_idx..next_idx.max(frame_idx)];
        energy.push(if span.is_empty() {
            0.0
        } else {
            span.iter().sum::<f64>() / span.len() as f64
        });
    }

    let max = energy.iter().copied().fold(0.0_f64, f64::max);
    if max > 1e-6 {
        for value in &mut energy {
            *value /= max;
        }
    }
    energy
}

/// Full-signal RMS loudness in dBFS.
pub(crate) fn loudness_dbfs(samples: &[f32]) -> f64 {
    let mut sum = 0.0_f64;
    for &sample in samples {
        sum += sample as f64 * sample as f64;
    }
    let mean = sum / (samples.len() + 1) as f64;
    20.0 * (mean.sqrt() + 1e-6).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_frames_degenerate_input_yields_neutral_value() {
        assert_eq!(rms_frames(&[0.5; 100], RMS_FRAME_SIZE, RMS_HOP_SIZE), vec![0.5]);
    }

    #[test]
    fn beat_energy_is_max_normalized() {
        let sr = 22_050u32;
        let mut samples = vec![0.05_f32; sr as usize * 4];
        // Loud second beat.
        for sample in &mut samples[sr as usize..sr as usize * 2] {
            *sample = 0.9;
        }
        let beats = vec![0.0, 1.0, 2.0, 3.0];
        let energy = beat_energy(&samples, sr, &beats);
        assert_eq!(energy.len(), beats.len());
        let max = energy.iter().copied().fold(0.0_f64, f64::max);
        assert!((max - 1.0).abs() < 1e-9);
        assert!(energy[1] > energy[0]);
    }

    #[test]
    fn beat_energy_with_a_single_beat_is_neutral() {
        assert_eq!(beat_energy(&[0.1; 4096], 22_050, &[0.0]), vec![0.5]);
    }

    #[test]
    fn full_scale_signal_is_near_zero_dbfs() {
        let samples = vec![1.0_f32; 22_050];
        let db = loudness_dbfs(&samples);
        assert!(db.abs() < 0.1, "loudness {db}");
    }

    #[test]
    fn silence_is_deeply_negative_dbfs() {
        let db = loudness_dbfs(&[0.0; 1000]);
        assert!(db < -100.0);
    }
}
