//! Driver-agnostic audio sink contract plus a handful of backends: a live
//! device (`cpal`), a blocking WAV file writer, and an in-memory sink used
//! by tests. This crate has no opinion on how buffers were mixed — see
//! `mixer-core` for that side of the contract.

pub mod cpal_sink;
pub mod mock_sink;
pub mod pcm;
pub mod sink;
pub mod wav_sink;

pub use cpal_sink::CpalSink;
pub use mock_sink::MockSink;
pub use pcm::Endianness;
pub use sink::{AudioSink, MixerDriver, SinkDriver, SinkError, SinkOptions, TickOutcome};
pub use wav_sink::WavFileSink;
