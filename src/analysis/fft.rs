use std::f32::consts::PI;
use std::ops::{Add, Mul, Sub};

/// Complex sample used by the in-place FFT.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Complex32 {
    pub(crate) re: f32,
    pub(crate) im: f32,
}

impl Complex32 {
    pub(crate) fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    pub(crate) fn magnitude(self) -> f32 {
        (self.re * self.re + self.im * self.im).sqrt()
    }
}

impl Add for Complex32 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.re + other.re, self.im + other.im)
    }
}

impl Sub for Complex32 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.re - other.re, self.im - other.im)
    }
}

impl Mul for Complex32 {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Self::new(
            self.re * other.re - self.im * other.im,
            self.re * other.im + self.im * other.re,
        )
    }
}

pub(crate) fn hann_window(length: usize) -> Vec<f32> {
    if length <= 1 {
        return vec![1.0_f32; length.max(1)];
    }
    let denom = (length - 1) as f32;
    (0..length)
        .map(|n| 0.5_f32 * (1.0 - (2.0 * PI * n as f32 / denom).cos()))
        .collect()
}

/// In-place iterative radix-2 Cooley-Tukey transform.
///
/// The buffer length must be a power of two; callers zero-pad shorter frames
/// into a reused buffer so a streaming sequence of frames never reallocates.
pub(crate) fn fft_in_place(buffer: &mut [Complex32]) -> Result<(), String> {
    let n = buffer.len();
    if n == 0 || !n.is_power_of_two() {
        return Err(format!("FFT length must be a power of two, got {n}"));
    }
    bit_reverse_permute(buffer);
    let mut len = 2usize;
    while len <= n {
        let angle = -2.0_f32 * PI / len as f32;
        let wlen = Complex32::new(angle.cos(), angle.sin());
        for start in (0..n).step_by(len) {
            let mut w = Complex32::new(1.0, 0.0);
            for i in 0..(len / 2) {
                let u = buffer[start + i];
                let v = buffer[start + i + len / 2] * w;
                buffer[start + i] = u + v;
                buffer[start + i + len / 2] = u - v;
                w = w * wlen;
            }
        }
        len *= 2;
    }
    Ok(())
}

fn bit_reverse_permute(buffer: &mut [Complex32]) {
    let n = buffer.len();
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            buffer.swap(i, j);
        }
    }
}

/// Zero the buffer, then fill the head with windowed samples starting at `start`.
pub(crate) fn fill_windowed(
    buffer: &mut [Complex32],
    samples: &[f32],
    start: usize,
    window: &[f32],
) {
    for cell in buffer.iter_mut() {
        *cell = Complex32::default();
    }
    for (j, cell) in buffer.iter_mut().take(window.len()).enumerate() {
        let Some(&sample) = samples.get(start + j) else {
            break;
        };
        *cell = Complex32::new(sample * window[j], 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_window_is_symmetric_and_zero_at_edges() {
        let w = hann_window(16);
        assert!(w[0].abs() < 1e-6);
        assert!(w[15].abs() < 1e-6);
        assert!((w[3] - w[12]).abs() < 1e-6);
    }

    #[test]
    fn fft_rejects_non_power_of_two_lengths() {
        let mut buf = vec![Complex32::default(); 12];
        assert!(fft_in_place(&mut buf).is_err());
    }

    #[test]
    fn fft_of_constant_signal_lands_in_dc_bin() {
        let mut buf = vec![Complex32::new(1.0, 0.0); 8];
        fft_in_place(&mut buf).unwrap();
        assert!((buf[0].re - 8.0).abs() < 1e-4);
        for bin in &buf[1..] {
            assert!(bin.magnitude() < 1e-4);
        }
    }

    #[test]
    fn fft_of_single_tone_peaks_at_its_bin() {
        let n = 64usize;
        let cycle = 4.0;
        let mut buf: Vec<Complex32> = (0..n)
            .map(|i| Complex32::new((2.0 * PI * cycle * i as f32 / n as f32).sin(), 0.0))
            .collect();
        fft_in_place(&mut buf).unwrap();
        let peak = (0..n / 2)
            .max_by(|a, b| buf[*a].magnitude().total_cmp(&buf[*b].magnitude()))
            .unwrap();
        assert_eq!(peak, 4);
    }

    #[test]
    fn fill_windowed_zero_pads_past_the_frame() {
        let window = hann_window(4);
        let mut buf = vec![Complex32::new(9.0, 9.0); 8];
        fill_windowed(&mut buf, &[1.0, 1.0], 0, &window);
        assert!(buf[2].magnitude() < 1e-6);
        assert!(buf[7].magnitude() < 1e-6);
    }
}
