use super::fft::{Complex32, fft_in_place, fill_windowed, hann_window};

pub(crate) const KEY_FRAME_SIZE: usize = 4096;
pub(crate) const KEY_HOP_SIZE: usize = 2048;

const CHROMA_MIN_HZ: f64 = 65.0;
const CHROMA_MAX_HZ: f64 = 4000.0;
/// Middle C; pitch classes are measured in semitones from here.
const CHROMA_REF_HZ: f64 = 261.63;
const VOCAL_MIN_HZ: f64 = 300.0;
const VOCAL_MAX_HZ: f64 = 3400.0;

pub(crate) const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Krumhansl-Schmuckler tonal hierarchy profiles.
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Output of the single spectral pass shared by key detection and the
/// vocal-band estimate: the winning key plus one (time, ratio) point per
/// frame, where ratio is 300-3400 Hz magnitude over the 65-4000 Hz total.
pub(crate) struct SpectralProfile {
    pub(crate) key: String,
    pub(crate) vocal_ratios: Vec<(f64, f64)>,
}

pub(crate) fn spectral_profile(samples: &[f32], sample_rate: u32) -> SpectralProfile {
    let frame_size = KEY_FRAME_SIZE;
    let hop_size = KEY_HOP_SIZE;
    if samples.len() <= frame_size {
        return SpectralProfile {
            key: "C Major".to_string(),
            vocal_ratios: Vec::new(),
        };
    }
    let frame_count = (samples.len() - frame_size) / hop_size;
    if frame_count == 0 {
        return SpectralProfile {
            key: "C Major".to_string(),
            vocal_ratios: Vec::new(),
        };
    }

    let fft_size = frame_size.next_power_of_two();
    let window = hann_window(frame_size);
    let mut frame = vec![Complex32::default(); fft_size];
    let mut chroma = [0.0_f64; 12];
    let mut vocal_ratios = Vec::with_capacity(frame_count);
    let sr = sample_rate as f64;

    for i in 0..frame_count {
        let start = i * hop_size;
        fill_windowed(&mut frame, samples, start, &window);
        if fft_in_place(&mut frame).is_err() {
            break;
        }
        let mut total = 0.0_f64;
        let mut vocal = 0.0_f64;
        for bin in 1..=fft_size / 2 {
            let freq = bin as f64 * sr / fft_size as f64;
            if !(CHROMA_MIN_HZ..=CHROMA_MAX_HZ).contains(&freq) {
                continue;
            }
            let magnitude = frame[bin].magnitude() as f64;
            let semitones = 12.0 * (freq / CHROMA_REF_HZ).log2();
            let pc = (semitones.round() as i64).rem_euclid(12) as usize;
            chroma[pc] += magnitude;
            total += magnitude;
            if (VOCAL_MIN_HZ..=VOCAL_MAX_HZ).contains(&freq) {
                vocal += magnitude;
            }
        }
        let time = start as f64 / sr;
        let ratio = if total > 0.0 { vocal / total } else { 0.0 };
        vocal_ratios.push((time, ratio));
    }

    SpectralProfile {
        key: best_key(&chroma),
        vocal_ratios,
    }
}

fn best_key(chroma: &[f64; 12]) -> String {
    let mut best_corr = -999.0_f64;
    let mut best = "C Major".to_string();
    let mut rolled = [0.0_f64; 12];
    for rot in 0..12 {
        for (j, slot) in rolled.iter_mut().enumerate() {
            *slot = chroma[(j + rot) % 12];
        }
        let corr_major = pearson(&rolled, &MAJOR_PROFILE);
        let corr_minor = pearson(&rolled, &MINOR_PROFILE);
        if corr_major > best_corr {
            best_corr = corr_major;
            best = format!("{} Major", NOTE_NAMES[rot]);
        }
        if corr_minor > best_corr {
            best_corr = corr_minor;
            best = format!("{} Minor", NOTE_NAMES[rot]);
        }
    }
    best
}

/// Pearson correlation coefficient; 0 on degenerate input.
pub(crate) fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    if n == 0 || n != b.len() {
        return 0.0;
    }
    let (mut sum_a, mut sum_b, mut sum_ab, mut sum_a2, mut sum_b2) =
        (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    for i in 0..n {
        sum_a += a[i];
        sum_b += b[i];
        sum_ab += a[i] * b[i];
        sum_a2 += a[i] * a[i];
        sum_b2 += b[i] * b[i];
    }
    let num = n as f64 * sum_ab - sum_a * sum_b;
    let den = ((n as f64 * sum_a2 - sum_a * sum_a) * (n as f64 * sum_b2 - sum_b * sum_b)).sqrt();
    if den < 1e-12 { 0.0 } else { num / den }
}
