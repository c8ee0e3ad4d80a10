use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use std::collections::VecDeque;

use super::{downmix, FrequencyAnalyser, FrequencySource, FFT_SIZE};

/// Live input from the default capture device.
///
/// The cpal callback downmixes to mono and ships blocks over a channel; the
/// frame loop drains it before each tick.
pub struct AudioCapture {
    #[allow(dead_code)]
    stream: Stream,
    receiver: Receiver<Vec<f32>>,
    window: SampleWindow,
    analyser: FrequencyAnalyser,
    sample_rate: u32,
}

impl AudioCapture {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No input device available"))?;

        let config = device
            .default_input_config()
            .map_err(|e| anyhow::anyhow!("Failed to get default input config: {}", e))?;

        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        info!("Audio config: {:?}", config);

        let sample_rate = config.sample_rate().0;
        let (sender, receiver) = crossbeam_channel::unbounded();

        let stream = Self::create_input_stream(&device, &config.into(), sender)?;
        stream.play()?;

        Ok(Self {
            stream,
            receiver,
            window: SampleWindow::new(FFT_SIZE),
            analyser: FrequencyAnalyser::default(),
            sample_rate,
        })
    }

    fn create_input_stream(
        device: &Device,
        config: &StreamConfig,
        sender: Sender<Vec<f32>>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;

        info!(
            "Creating input stream with {} channels at {} Hz",
            channels, config.sample_rate.0
        );

        let stream = device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if sender.send(downmix(data, channels)).is_err() {
                    warn!("Failed to send audio data");
                }
            },
            |err| {
                warn!("Audio stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl FrequencySource for AudioCapture {
    fn frequency_frame(&mut self) -> Option<&[u8]> {
        let mut fresh = false;
        while let Ok(block) = self.receiver.try_recv() {
            self.window.extend(&block);
            fresh = true;
        }
        if !fresh {
            return None;
        }
        Some(self.analyser.analyse(self.window.as_slice()))
    }
}

/// Keeps only the newest `capacity` samples.
#[derive(Debug)]
struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn extend(&mut self, block: &[f32]) {
        let keep = &block[block.len().saturating_sub(self.capacity)..];
        let overflow = (self.samples.len() + keep.len()).saturating_sub(self.capacity);
        self.samples.drain(..overflow);
        self.samples.extend(keep.iter().copied());
    }

    fn as_slice(&mut self) -> &[f32] {
        self.samples.make_contiguous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_the_newest_samples() {
        let mut window = SampleWindow::new(4);
        window.extend(&[1.0, 2.0, 3.0]);
        window.extend(&[4.0, 5.0]);
        assert_eq!(window.as_slice(), &[2.0, 3.0, 4.0, 5.0]);

        window.extend(&[6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(window.as_slice(), &[7.0, 8.0, 9.0, 10.0]);
    }
}
