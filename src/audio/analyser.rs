use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::{BIN_COUNT, FFT_SIZE};

/// Byte frequency analyser with the same scaling as a browser `AnalyserNode`:
/// Blackman window, `|X[k]| / N`, exponential smoothing over time, then
/// decibels mapped linearly from `min_db..max_db` onto `0..=255`.
pub struct FrequencyAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
}

impl Default for FrequencyAnalyser {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl FrequencyAnalyser {
    pub fn new(smoothing: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        Self {
            fft,
            window: Self::blackman_window(FFT_SIZE),
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            smoothed: vec![0.0; BIN_COUNT],
            bytes: vec![0; BIN_COUNT],
            smoothing: smoothing.clamp(0.0, 1.0),
            min_db: -100.0,
            max_db: -30.0,
        }
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        let a = 0.16f32;
        let (a0, a1, a2) = ((1.0 - a) / 2.0, 0.5, a / 2.0);
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    /// Analyses the most recent `FFT_SIZE` samples (zero-padded in front when
    /// fewer are given) and returns the updated byte frame.
    pub fn analyse(&mut self, samples: &[f32]) -> &[u8] {
        let tail = &samples[samples.len().saturating_sub(FFT_SIZE)..];
        let pad = FFT_SIZE - tail.len();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let x = if i < pad { 0.0 } else { tail[i - pad] };
            *slot = Complex::new(x * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let range = self.max_db - self.min_db;
        for k in 0..BIN_COUNT {
            let magnitude = self.buffer[k].norm() / FFT_SIZE as f32;
            let v = self.smoothing * self.smoothed[k] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[k] = v;

            self.bytes[k] = if v > 0.0 {
                let db = 20.0 * v.log10();
                (255.0 / range * (db - self.min_db)).floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }

        &self.bytes
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Forgets smoothing history, e.g. on seek or track change.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
        self.bytes.iter_mut().for_each(|b| *b = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_at_bin(bin: usize, amplitude: f32) -> Vec<f32> {
        (0..FFT_SIZE * 4)
            .map(|n| {
                let phase = 2.0 * std::f32::consts::PI * bin as f32 * n as f32 / FFT_SIZE as f32;
                amplitude * phase.sin()
            })
            .collect()
    }

    #[test]
    fn silence_reads_as_zero() {
        let mut analyser = FrequencyAnalyser::default();
        let frame = analyser.analyse(&vec![0.0; FFT_SIZE]);
        assert_eq!(frame.len(), BIN_COUNT);
        assert!(frame.iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let mut analyser = FrequencyAnalyser::default();
        let signal = sine_at_bin(32, 0.8);
        for _ in 0..10 {
            analyser.analyse(&signal);
        }
        let frame = analyser.bytes();
        assert_eq!(frame[32], 255);
        assert!(frame[100] < 128);
        assert!(frame[200] < 128);
    }

    #[test]
    fn smoothing_decays_instead_of_dropping() {
        let mut analyser = FrequencyAnalyser::default();
        let signal = sine_at_bin(20, 0.8);
        for _ in 0..10 {
            analyser.analyse(&signal);
        }
        let loud = analyser.bytes()[20];
        let after = analyser.analyse(&vec![0.0; FFT_SIZE])[20];
        assert!(after > 0 && after <= loud);

        analyser.reset();
        assert!(analyser.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn short_input_is_padded() {
        let mut analyser = FrequencyAnalyser::new(0.0);
        let frame = analyser.analyse(&[0.5; 300]);
        assert_eq!(frame.len(), BIN_COUNT);
        assert!(frame[0] > 0);
    }
}
