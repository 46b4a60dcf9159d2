use super::fft::{Complex32, fft_in_place, fill_windowed, hann_window};

pub(crate) const ONSET_FRAME_SIZE: usize = 1024;
pub(crate) const ONSET_HOP_SIZE: usize = 512;

/// Spectral-flux onset envelope: one value per analysis frame.
///
/// Flux is the positive half-wave rectified magnitude difference against the
/// previous frame. The complex frame and both magnitude buffers are allocated
/// once and reused for the whole pass.
pub(crate) fn onset_envelope(samples: &[f32]) -> Vec<f32> {
    onset_envelope_with(samples, ONSET_FRAME_SIZE, ONSET_HOP_SIZE)
}

fn onset_envelope_with(samples: &[f32], frame_size: usize, hop_size: usize) -> Vec<f32> {
    if samples.len() <= frame_size || hop_size == 0 {
        return Vec::new();
    }
    let frame_count = (samples.len() - frame_size) / hop_size;
    if frame_count == 0 {
        return Vec::new();
    }

    let fft_size = frame_size.next_power_of_two();
    let bins = fft_size / 2 + 1;
    let window = hann_window(frame_size);
    let mut frame = vec![Complex32::default(); fft_size];
    let mut magnitude = vec![0.0_f32; bins];
    let mut previous = vec![0.0_f32; bins];

    let mut envelope = Vec::with_capacity(frame_count);
    for i in 0..frame_count {
        fill_windowed(&mut frame, samples, i * hop_size, &window);
        if fft_in_place(&mut frame).is_err() {
            break;
        }
        for (bin, slot) in magnitude.iter_mut().enumerate() {
            *slot = frame[bin].magnitude();
        }
        let mut flux = 0.0_f64;
        for (current, prior) in magnitude.iter().zip(previous.iter()) {
            let diff = (current - prior) as f64;
            if diff > 0.0 {
                flux += diff;
            }
        }
        envelope.push(flux as f32);
        std::mem::swap(&mut previous, &mut magnitude);
    }
    envelope
}
