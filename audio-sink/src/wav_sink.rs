//! Blocking "write to a file" backend, writing 16-bit PCM via `hound`.
//! Blocks in its own write call, the way a blocking-PCM or file backend
//! would rather than handing off to a callback thread.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use mixer_core::FrameTime;

use crate::pcm::{self, Endianness};
use crate::sink::{AudioSink, SinkDriver, SinkError, SinkOptions, TickOutcome};

pub struct WavFileSink {
    path: PathBuf,
    sample_rate: u32,
    frames_per_buffer: usize,
    end_frame: Option<FrameTime>,
    end: Endianness,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>, sample_rate: u32, frames_per_buffer: usize) -> Self {
        WavFileSink {
            path: path.into(),
            sample_rate,
            frames_per_buffer,
            end_frame: None,
            end: Endianness::default(),
            writer: None,
        }
    }
}

impl AudioSink for WavFileSink {
    fn open(&mut self, opts: &SinkOptions) -> Result<(), SinkError> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&self.path, spec)
            .map_err(|e| SinkError::DeviceNegotiation(e.to_string()))?;
        self.writer = Some(writer);
        self.end_frame = opts
            .time
            .map(|secs| (secs * self.sample_rate as f64).round() as FrameTime);
        self.end = opts.end;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames_per_buffer(&self) -> usize {
        self.frames_per_buffer
    }

    fn run(&mut self, driver: &mut dyn SinkDriver) -> Result<(), SinkError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SinkError::DeviceNegotiation("sink not opened".into()))?;
        let mut sum_buffer = vec![0i64; 2 * self.frames_per_buffer];
        let mut pcm_buffer = vec![0i16; 2 * self.frames_per_buffer];
        let mut current_time: FrameTime = 0;
        loop {
            if let Some(end) = self.end_frame {
                if current_time >= end {
                    break;
                }
            }
            if driver.tick(current_time) == TickOutcome::Stop {
                break;
            }
            driver.mix(&mut sum_buffer);
            pcm::sum_buffer_to_i16(&sum_buffer, &mut pcm_buffer);
            for &s in &pcm_buffer {
                let disk_sample = pcm::to_disk_order(s, self.end);
                writer
                    .write_sample(disk_sample)
                    .map_err(|e| SinkError::Write(e.to_string()))?;
            }
            current_time += self.frames_per_buffer as FrameTime;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| SinkError::Write(e.to_string()))?;
        }
        Ok(())
    }
}
