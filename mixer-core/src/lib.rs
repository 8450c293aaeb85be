//! Note scheduling, channel-tree composition and buffer mixing for a
//! real-time programmable soundscape engine.
//!
//! This crate has no opinion on where audio frames go once mixed — see the
//! `audio-sink` crate for the device/file/encoder side of that contract.

pub mod channel;
pub mod fixed;
pub mod mixer;
pub mod note;
pub mod queue;
pub mod resample;
pub mod sample;
pub mod walk;

pub use channel::{Channel, ChannelRef, PanPoint, StereoWindow, VolumeWindow};
pub use mixer::{GenerateOutcome, Mixer};
pub use note::Note;
pub use queue::NoteQueue;
pub use sample::{Channels, LoopPoints, Sample, SampleError};

/// A frame index, counted from the mixer's epoch. Signed because
/// [`Mixer::adjust_timebase`] can shift the origin arbitrarily, including
/// past what a given note's `start_time` already recorded.
pub type FrameTime = i64;
