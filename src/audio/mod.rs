//! Audio collaborators: file playback, live capture, the byte-frequency
//! analyser feeding the engine, and offline tempo estimation.

pub mod analyser;
pub mod capture;
pub mod playback;
pub mod tempo;

pub use analyser::FrequencyAnalyser;
pub use capture::AudioCapture;
pub use playback::AudioPlayback;
pub use tempo::{TempoEstimate, TempoEstimator};

use anyhow::Result;
use log::info;
use rodio::{Decoder, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Analyser window length, matching a WebAudio `AnalyserNode.fftSize` of 512.
pub const FFT_SIZE: usize = 512;

/// Bins per frequency frame.
pub const BIN_COUNT: usize = FFT_SIZE / 2;

/// Anything that can hand the engine a byte frequency frame once per tick.
pub trait FrequencySource {
    /// Latest snapshot, or `None` when nothing new arrived since the last call.
    fn frequency_frame(&mut self) -> Option<&[u8]>;
}

/// Decodes a whole file and downmixes it to mono `f32` in -1.0..=1.0.
pub fn decode_mono<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32)> {
    let file = BufReader::new(File::open(path.as_ref())?);
    let source = Decoder::new(file)?;
    let sample_rate = source.sample_rate();
    let channels = source.channels().max(1) as usize;

    let interleaved: Vec<f32> = source.convert_samples::<f32>().collect();
    let mono = downmix(&interleaved, channels);

    info!(
        "Decoded {:?}: {} Hz, {} channels, {:.1} s",
        path.as_ref(),
        sample_rate,
        channels,
        mono.len() as f64 / sample_rate.max(1) as f64
    );
    Ok((mono, sample_rate))
}

pub(crate) fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
