use anyhow::Result;
use log::info;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{decode_mono, FrequencyAnalyser, FrequencySource, FFT_SIZE};

/// Wall-clock playback position that only advances while playing.
#[derive(Debug, Default, Clone)]
struct PlayClock {
    accumulated: Duration,
    resumed_at: Option<Instant>,
}

impl PlayClock {
    fn resume(&mut self, now: Instant) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(now);
        }
    }

    fn pause(&mut self, now: Instant) {
        if let Some(start) = self.resumed_at.take() {
            self.accumulated += now.saturating_duration_since(start);
        }
    }

    fn position(&self, now: Instant) -> Duration {
        self.accumulated
            + self
                .resumed_at
                .map_or(Duration::ZERO, |start| now.saturating_duration_since(start))
    }
}

/// Plays one file through rodio and analyses the samples under the playhead.
pub struct AudioPlayback {
    #[allow(dead_code)]
    stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Option<Sink>,
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    clock: PlayClock,
    analyser: FrequencyAnalyser,
    last_sample: Option<usize>,
}

impl AudioPlayback {
    pub fn new() -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;

        Ok(Self {
            stream,
            stream_handle,
            sink: None,
            samples: Arc::new(Vec::new()),
            sample_rate: 44100,
            clock: PlayClock::default(),
            analyser: FrequencyAnalyser::default(),
            last_sample: None,
        })
    }

    /// Decodes the file for analysis, then queues it paused for playback.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let (samples, sample_rate) = decode_mono(&path)?;
        self.samples = Arc::new(samples);
        self.sample_rate = sample_rate;

        // Decoder was consumed above; open again for the sink.
        let file = BufReader::new(File::open(&path)?);
        let source = Decoder::new(file)?;
        let sink = Sink::try_new(&self.stream_handle)?;
        sink.append(source);
        sink.pause();

        if let Some(old) = self.sink.replace(sink) {
            old.stop();
        }
        self.clock = PlayClock::default();
        self.analyser.reset();
        self.last_sample = None;

        info!(
            "Loaded audio file: {:?} ({}Hz, {} samples)",
            path.as_ref(),
            self.sample_rate,
            self.samples.len()
        );
        Ok(())
    }

    pub fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
            self.clock.resume(Instant::now());
            info!("Audio playback started");
        }
    }

    pub fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
            self.clock.pause(Instant::now());
            info!("Audio playback paused");
        }
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            self.clock = PlayClock::default();
            info!("Audio playback stopped");
        }
    }

    pub fn set_volume(&self, volume: f32) {
        if let Some(sink) = &self.sink {
            sink.set_volume(volume.clamp(0.0, 1.0));
        }
    }

    pub fn is_playing(&self) -> bool {
        self.sink.as_ref().map_or(false, |sink| !sink.is_paused())
    }

    pub fn is_finished(&self) -> bool {
        self.sink.as_ref().map_or(true, |sink| sink.empty())
    }

    pub fn position(&self) -> Duration {
        self.clock.position(Instant::now())
    }

    /// Shared handle to the decoded mono samples, for background analysis.
    pub fn samples(&self) -> Arc<Vec<f32>> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl FrequencySource for AudioPlayback {
    fn frequency_frame(&mut self) -> Option<&[u8]> {
        if self.samples.is_empty() {
            return None;
        }
        let playhead = (self.position().as_secs_f64() * self.sample_rate as f64) as usize;
        let end = playhead.min(self.samples.len());
        if self.last_sample == Some(end) {
            return None;
        }
        self.last_sample = Some(end);

        let start = end.saturating_sub(FFT_SIZE);
        Some(self.analyser.analyse(&self.samples[start..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_runs_while_playing() {
        let t0 = Instant::now();
        let mut clock = PlayClock::default();
        assert_eq!(clock.position(t0), Duration::ZERO);

        clock.resume(t0);
        clock.resume(t0 + Duration::from_millis(100));
        assert_eq!(clock.position(t0 + Duration::from_millis(250)), Duration::from_millis(250));

        clock.pause(t0 + Duration::from_millis(300));
        assert_eq!(clock.position(t0 + Duration::from_secs(5)), Duration::from_millis(300));

        clock.resume(t0 + Duration::from_secs(5));
        assert_eq!(
            clock.position(t0 + Duration::from_millis(5200)),
            Duration::from_millis(500)
        );
    }
}
