//! Offline tempo estimation over a whole decoded track.
//!
//! Onsets come from an energy detector (adaptive mean + deviation threshold
//! with a refractory gap); the tempo is the mean of the inter-onset intervals
//! that agree with the median.

use log::debug;
use serde::Serialize;
use std::collections::VecDeque;

/// Result of one estimation pass.
#[derive(Debug, Clone, Serialize)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub onsets: usize,
    pub duration_seconds: f64,
}

pub struct TempoEstimator {
    sample_rate: f32,
    hop: usize,
    history_size: usize,
    /// Seconds of silence forced between onsets
    min_beat_interval: f32,
    max_beat_interval: f32,
    /// Mean-square energy below which a hop never counts as an onset
    energy_floor: f32,
    sensitivity: f32,
}

impl TempoEstimator {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        let hop = 1024;
        Self {
            sample_rate,
            hop,
            history_size: ((sample_rate * 0.5) as usize / hop).max(4),
            min_beat_interval: 0.3,
            max_beat_interval: 2.0,
            energy_floor: 1e-4,
            sensitivity: 1.5,
        }
    }

    /// Onset times in seconds.
    pub fn onsets(&self, samples: &[f32]) -> Vec<f32> {
        let mut history: VecDeque<f32> = VecDeque::with_capacity(self.history_size + 1);
        let mut onsets = Vec::new();
        let mut last_onset = f32::NEG_INFINITY;
        let hop_seconds = self.hop as f32 / self.sample_rate;

        for (i, chunk) in samples.chunks(self.hop).enumerate() {
            let energy = chunk.iter().map(|x| x * x).sum::<f32>() / self.hop as f32;
            let time = i as f32 * hop_seconds;

            let mean = if history.is_empty() {
                0.0
            } else {
                history.iter().sum::<f32>() / history.len() as f32
            };
            let deviation = variance(&history, mean).sqrt();
            let threshold = mean + deviation * self.sensitivity;

            if energy > threshold
                && energy > self.energy_floor
                && time - last_onset > self.min_beat_interval
            {
                onsets.push(time);
                last_onset = time;
            }

            history.push_back(energy);
            if history.len() > self.history_size {
                history.pop_front();
            }
        }

        onsets
    }

    /// `None` when fewer than two usable intervals were found.
    pub fn estimate(&self, samples: &[f32]) -> Option<TempoEstimate> {
        let onsets = self.onsets(samples);
        let mut intervals: Vec<f32> = onsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|&dt| dt > self.min_beat_interval && dt < self.max_beat_interval)
            .collect();
        if intervals.len() < 2 {
            debug!("Tempo: only {} usable intervals", intervals.len());
            return None;
        }

        intervals.sort_by(|a, b| a.total_cmp(b));
        let median = intervals[intervals.len() / 2];
        let agreeing: Vec<f32> = intervals
            .into_iter()
            .filter(|dt| (dt - median).abs() <= median * 0.25)
            .collect();
        let mean = agreeing.iter().sum::<f32>() / agreeing.len() as f32;

        let estimate = TempoEstimate {
            bpm: 60.0 / mean as f64,
            onsets: onsets.len(),
            duration_seconds: samples.len() as f64 / self.sample_rate as f64,
        };
        debug!(
            "Tempo: {:.1} bpm from {} onsets ({} agreeing intervals)",
            estimate.bpm,
            estimate.onsets,
            agreeing.len()
        );
        Some(estimate)
    }
}

fn variance(data: &VecDeque<f32>, mean: f32) -> f32 {
    if data.len() < 2 {
        return 0.0;
    }
    data.iter().map(|&x| (x - mean).powi(2)).sum::<f32>() / (data.len() - 1) as f32
}
