//! The driver-agnostic audio sink contract: `open`, then a
//! synchronous `run` loop that ticks a driver, mixes, converts and writes
//! until the driver signals stop or the device reports an unrecoverable
//! error, then `close`.

use std::collections::HashMap;

use mixer_core::FrameTime;
use thiserror::Error;

use crate::pcm::Endianness;

/// The recognised backend option surface. Fields a given backend
/// doesn't use are simply ignored by it; `extra`/`shout` carry
/// backend-specific keys this crate doesn't implement a backend for.
#[derive(Debug, Clone, Default)]
pub struct SinkOptions {
    /// Byte order for written PCM samples. Defaults to the host's native
    /// order; a backend writing through an encoder fixed to one order (as
    /// `hound` is fixed to little-endian) swaps bytes to honor this.
    pub end: Endianness,
    pub buffersize: Option<usize>,
    pub buffercount: Option<usize>,
    pub periodsize: Option<usize>,
    pub hwbuffer: Option<usize>,
    /// Wall-clock run length in seconds.
    pub time: Option<f64>,
    pub quality: Option<u32>,
    pub fast: bool,
    pub abr: Option<u32>,
    pub haste: bool,
    pub title: Option<String>,
    pub listdevices: bool,
    pub shout: HashMap<String, String>,
    pub extra: HashMap<String, String>,
}

/// Error kinds relevant to a sink. A recoverable device
/// underrun is deliberately absent: it's handled inside `run` by re-priming
/// and retrying and never surfaces as an `Err`.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("device negotiation failed: {0}")]
    DeviceNegotiation(String),
    #[error("write to sink failed: {0}")]
    Write(String),
    #[error("buffer allocation failed: {0}")]
    Allocation(String),
}

/// Whether the driving loop should keep going after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// What a sink's `run` loop calls on every iteration, in order: `tick` first
/// (may schedule notes, mutate channels, rebase time), then `mix` if `tick`
/// didn't return `Stop`.
pub trait SinkDriver {
    fn tick(&mut self, current_time: FrameTime) -> TickOutcome;
    fn mix(&mut self, sum_buffer: &mut [i64]);
}

/// A synchronous-`run` generalisation of a `start`/`stop`/`sample_rate`/
/// `buffer_size`-shaped backend trait: rather than handing a render
/// closure to a background thread and
/// returning immediately, `run` blocks the calling thread for as long as
/// the sink is producing output.
pub trait AudioSink {
    fn open(&mut self, opts: &SinkOptions) -> Result<(), SinkError>;
    fn sample_rate(&self) -> u32;
    fn frames_per_buffer(&self) -> usize;
    fn run(&mut self, driver: &mut dyn SinkDriver) -> Result<(), SinkError>;
    fn close(&mut self) -> Result<(), SinkError>;
}

/// Bridges a [`mixer_core::Mixer`] and a tick closure into a [`SinkDriver`],
/// so a sink's `run` loop can drive the mixer without knowing about it.
pub struct MixerDriver<'a> {
    pub mixer: &'a mut mixer_core::Mixer,
    pub tick_fn: &'a mut dyn FnMut(FrameTime, &mut mixer_core::Mixer) -> TickOutcome,
}

impl<'a> SinkDriver for MixerDriver<'a> {
    fn tick(&mut self, current_time: FrameTime) -> TickOutcome {
        (self.tick_fn)(current_time, self.mixer)
    }

    fn mix(&mut self, sum_buffer: &mut [i64]) {
        self.mixer.generate(sum_buffer);
    }
}
