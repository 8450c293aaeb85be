//! In-memory sink for tests: records every converted buffer instead of
//! writing it anywhere, so assertions can inspect exact sample values.

use std::sync::{Arc, Mutex};

use mixer_core::FrameTime;

use crate::pcm;
use crate::sink::{AudioSink, SinkDriver, SinkError, SinkOptions, TickOutcome};

pub struct MockSink {
    sample_rate: u32,
    frames_per_buffer: usize,
    recorded: Arc<Mutex<Vec<i16>>>,
    opened: bool,
}

impl MockSink {
    pub fn new(sample_rate: u32, frames_per_buffer: usize) -> Self {
        MockSink {
            sample_rate,
            frames_per_buffer,
            recorded: Arc::new(Mutex::new(Vec::new())),
            opened: false,
        }
    }

    /// All interleaved-stereo samples written across every `run` call so far.
    pub fn recorded(&self) -> Vec<i16> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn buffers_written(&self) -> usize {
        self.recorded.lock().unwrap().len() / (2 * self.frames_per_buffer)
    }
}

impl AudioSink for MockSink {
    fn open(&mut self, _opts: &SinkOptions) -> Result<(), SinkError> {
        self.recorded.lock().unwrap().clear();
        self.opened = true;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames_per_buffer(&self) -> usize {
        self.frames_per_buffer
    }

    fn run(&mut self, driver: &mut dyn SinkDriver) -> Result<(), SinkError> {
        if !self.opened {
            return Err(SinkError::DeviceNegotiation("sink not opened".into()));
        }
        let mut sum_buffer = vec![0i64; 2 * self.frames_per_buffer];
        let mut pcm_buffer = vec![0i16; 2 * self.frames_per_buffer];
        let mut current_time: FrameTime = 0;
        loop {
            if driver.tick(current_time) == TickOutcome::Stop {
                break;
            }
            driver.mix(&mut sum_buffer);
            pcm::sum_buffer_to_i16(&sum_buffer, &mut pcm_buffer);
            self.recorded.lock().unwrap().extend_from_slice(&pcm_buffer);
            current_time += self.frames_per_buffer as FrameTime;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.opened = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRuns(u32);
    impl SinkDriver for FixedRuns {
        fn tick(&mut self, _current_time: FrameTime) -> TickOutcome {
            if self.0 == 0 {
                return TickOutcome::Stop;
            }
            self.0 -= 1;
            TickOutcome::Continue
        }
        fn mix(&mut self, sum_buffer: &mut [i64]) {
            sum_buffer.fill(1234);
        }
    }

    #[test]
    fn run_stops_on_tick_outcome_stop_and_records_buffers() {
        let mut sink = MockSink::new(48_000, 16);
        sink.open(&SinkOptions::default()).unwrap();
        let mut driver = FixedRuns(3);
        sink.run(&mut driver).unwrap();
        assert_eq!(sink.buffers_written(), 3);
        assert!(sink.recorded().iter().all(|&s| s == 1234));
    }

    #[test]
    fn run_before_open_errors() {
        let mut sink = MockSink::new(48_000, 16);
        let mut driver = FixedRuns(1);
        assert!(sink.run(&mut driver).is_err());
    }
}
