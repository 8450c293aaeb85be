//! Immutable, already-decoded PCM sample data.
//!
//! Decoding itself is out of scope for this crate: a `Sample`
//! is constructed from PCM a caller has already produced, e.g. by decoding a
//! WAV/OGG file upstream.

use thiserror::Error;

/// Channel layout of a [`Sample`]. Stereo data is interleaved L/R.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Mono,
    Stereo,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
        }
    }
}

/// Loop region within a sample's frame range, `loop_start < loop_end <= num_frames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPoints {
    pub start: u64,
    pub end: u64,
}

impl LoopPoints {
    pub fn len(self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("sample data length {got} does not match num_frames({num_frames}) * channels({channels})")]
    FrameCountMismatch {
        got: usize,
        num_frames: u64,
        channels: usize,
    },
    #[error("loop region [{start}, {end}) is out of range for a {num_frames}-frame sample")]
    LoopOutOfRange {
        start: u64,
        end: u64,
        num_frames: u64,
    },
    #[error("sample has zero frames")]
    EmptySample,
}

/// An immutable, already-decoded PCM asset: mono or stereo, 16-bit signed,
/// with optional loop points and an intrinsic framerate ratio.
#[derive(Debug, Clone)]
pub struct Sample {
    data: Vec<i16>,
    num_frames: u64,
    channels: Channels,
    /// source fps ÷ output fps; `1.0` plays at natural pitch.
    framerate: f64,
    loop_points: Option<LoopPoints>,
}

impl Sample {
    pub fn new(
        data: Vec<i16>,
        channels: Channels,
        framerate: f64,
        loop_points: Option<LoopPoints>,
    ) -> Result<Self, SampleError> {
        if data.is_empty() {
            return Err(SampleError::EmptySample);
        }
        let num_frames = (data.len() / channels.count()) as u64;
        if data.len() != num_frames as usize * channels.count() {
            return Err(SampleError::FrameCountMismatch {
                got: data.len(),
                num_frames,
                channels: channels.count(),
            });
        }
        if let Some(lp) = loop_points {
            if lp.start >= lp.end || lp.end > num_frames {
                return Err(SampleError::LoopOutOfRange {
                    start: lp.start,
                    end: lp.end,
                    num_frames,
                });
            }
        }
        Ok(Sample {
            data,
            num_frames,
            channels,
            framerate,
            loop_points,
        })
    }

    /// A zero-length stand-in for a sample whose upstream decode failed:
    /// notes referencing it play silence.
    pub fn placeholder_silent(channels: Channels, framerate: f64) -> Self {
        Sample {
            data: vec![0; channels.count()],
            num_frames: 1,
            channels,
            framerate,
            loop_points: None,
        }
    }

    pub fn num_frames(&self) -> u64 {
        self.num_frames
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn framerate(&self) -> f64 {
        self.framerate
    }

    pub fn loop_points(&self) -> Option<LoopPoints> {
        self.loop_points
    }

    pub fn has_loop(&self) -> bool {
        self.loop_points.is_some()
    }

    /// Raw 16-bit sample at `(frame, channel)`, `0` past the end.
    #[inline]
    pub fn frame_channel(&self, frame: u64, channel: usize) -> i16 {
        if frame >= self.num_frames {
            return 0;
        }
        let idx = frame as usize * self.channels.count() + channel;
        self.data[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_silent_has_one_silent_frame_per_channel() {
        let s = Sample::placeholder_silent(Channels::Stereo, 1.0);
        assert_eq!(s.num_frames(), 1);
        assert!(!s.has_loop());
        assert_eq!(s.frame_channel(0, 0), 0);
        assert_eq!(s.frame_channel(0, 1), 0);
    }

    #[test]
    fn has_loop_reflects_loop_points() {
        let looped = Sample::new(vec![0; 8], Channels::Mono, 1.0, Some(LoopPoints { start: 2, end: 6 })).unwrap();
        assert!(looped.has_loop());
        let unlooped = Sample::new(vec![0; 8], Channels::Mono, 1.0, None).unwrap();
        assert!(!unlooped.has_loop());
    }
}
