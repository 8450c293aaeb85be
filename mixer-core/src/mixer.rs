//! The per-buffer mixer: walks the note queue, resamples each active note,
//! composes its channel-tree gain, and sums into a caller-owned buffer.
//!
//! The numeric path is chosen at compile time. The default build mixes in
//! Q16.16 fixed point (see [`crate::fixed`]); enabling the `float-mixing`
//! Cargo feature switches the envelope math to plain `f64` accumulation.
//! Both variants share the resampling and channel-tree-walk code above them
//! and only differ in how a frame's scalar gain is folded in.

use crate::channel::ChannelRef;
use crate::fixed;
use crate::note::Note;
use crate::queue::NoteQueue;
use crate::resample;
use crate::walk::{self, GainMatrix, VolumeRamp};
use crate::FrameTime;

/// Bookkeeping returned by [`Mixer::generate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOutcome {
    /// Notes that ran out of frames and were reaped during this buffer.
    pub notes_reaped: u32,
}

/// Owns the note queue and the mixer-thread-private scratch state needed to
/// produce one buffer at a time. Not `Send`/`Sync` by design — the embedding
/// is expected to own one `Mixer` per audio thread.
pub struct Mixer {
    queue: NoteQueue,
    current_time: FrameTime,
    frames_per_buffer: usize,
    ramps: Vec<VolumeRamp>,
}

impl Mixer {
    pub fn new(frames_per_buffer: usize) -> Self {
        Mixer {
            queue: NoteQueue::new(),
            current_time: 0,
            frames_per_buffer,
            ramps: Vec::new(),
        }
    }

    pub fn current_time(&self) -> FrameTime {
        self.current_time
    }

    pub fn frames_per_buffer(&self) -> usize {
        self.frames_per_buffer
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push(&mut self, note: Note) {
        self.queue.push(note);
    }

    /// Cascade-kill every note under `channel`, without firing `on_remove`.
    pub fn purge_by_channel(&mut self, channel: &ChannelRef) {
        self.queue.purge_by_channel(channel);
    }

    /// Shift every queued note's `start_time` and `current_time` by the same
    /// `offset`, so relative scheduling survives a clock rebase.
    pub fn adjust_timebase(&mut self, offset: FrameTime) {
        self.queue.adjust_timebase(offset);
        self.current_time -= offset;
    }

    /// Produce one buffer's worth of audio into `sum_buffer`, an
    /// interleaved-stereo `[left, right, left, right, ...]` accumulator of
    /// length `2 * frames_per_buffer`. Advances `current_time` by
    /// `frames_per_buffer`.
    pub fn generate(&mut self, sum_buffer: &mut [i64]) -> GenerateOutcome {
        assert_eq!(
            sum_buffer.len(),
            2 * self.frames_per_buffer,
            "sum_buffer must be 2 * frames_per_buffer (interleaved stereo)"
        );
        sum_buffer.fill(0);

        let current_time = self.current_time;
        let end_time = current_time + self.frames_per_buffer as FrameTime;
        let frames_per_buffer = self.frames_per_buffer;
        let ramps = &mut self.ramps;
        let mut notes_reaped = 0u32;

        self.queue.for_each_active(end_time, |note| {
            mix_note(note, current_time, end_time, frames_per_buffer, ramps, sum_buffer);
            let finished = note.is_finished();
            if finished {
                notes_reaped += 1;
            }
            finished
        });

        self.current_time = end_time;
        GenerateOutcome { notes_reaped }
    }
}

/// Resample and mix one note's contribution into `sum_buffer` for
/// `[current_time, end_time)`, advancing its cursor in place. Stops early
/// (leaving the remainder of the buffer untouched) once the note finishes.
fn mix_note(
    note: &mut Note,
    current_time: FrameTime,
    end_time: FrameTime,
    frames_per_buffer: usize,
    ramps: &mut Vec<VolumeRamp>,
    sum_buffer: &mut [i64],
) {
    let outcome = walk::walk_channel_tree(
        note.channel.as_ref(),
        note.pan,
        note.sample.channels(),
        current_time,
        end_time,
        ramps,
    );

    let step = resample::pitch_step_fixed(note.sample.framerate(), note.pitch);
    let num_source_channels = note.sample.channels().count();
    let base_volume = note.volume * outcome.volume;

    // A note's contribution starts at its `note_start_offset` within this
    // buffer, not necessarily frame 0: a note scheduled for later in this
    // buffer must stay silent until its start_time. Only a note whose
    // `start_time` already lies at or before `current_time` — including one
    // a tick callback just scheduled in the past — begins at offset 0.
    let note_start_offset = (note.start_time - current_time).clamp(0, frames_per_buffer as FrameTime) as usize;

    for f in note_start_offset..frames_per_buffer {
        if resample::is_finished(&note.sample, note.cursor, note.reps_left) {
            break;
        }

        let t = current_time + f as FrameTime;
        let gain = if outcome.sweeping {
            let frac = f as f64 / frames_per_buffer as f64;
            GainMatrix::lerp(outcome.gain_start, outcome.gain_end, frac)
        } else {
            outcome.gain_start
        };

        #[cfg(not(feature = "float-mixing"))]
        let env_q14 = if ramps.is_empty() {
            fixed::Q14_ONE
        } else {
            fixed::fold_ramps(ramps, t)
        };
        #[cfg(feature = "float-mixing")]
        let env = if ramps.is_empty() {
            1.0
        } else {
            ramps.iter().fold(1.0_f64, |acc, r| acc * r.value_at(t))
        };

        for sc in 0..num_source_channels {
            let sample_val = resample::interpolated_sample(&note.sample, sc, note.cursor, note.reps_left);

            #[cfg(not(feature = "float-mixing"))]
            {
                let base_l = fixed::to_q16(base_volume * gain.to_left[sc]);
                let base_r = fixed::to_q16(base_volume * gain.to_right[sc]);
                let iv_left = (base_l * env_q14) >> 14;
                let iv_right = (base_r * env_q14) >> 14;
                sum_buffer[2 * f] += (sample_val as i64 * iv_left) >> 16;
                sum_buffer[2 * f + 1] += (sample_val as i64 * iv_right) >> 16;
            }

            #[cfg(feature = "float-mixing")]
            {
                let l = base_volume * gain.to_left[sc] * env;
                let r = base_volume * gain.to_right[sc] * env;
                sum_buffer[2 * f] += (sample_val as f64 * l).round() as i64;
                sum_buffer[2 * f + 1] += (sample_val as f64 * r).round() as i64;
            }
        }

        resample::advance_cursor(&note.sample, &mut note.cursor, &mut note.reps_left, step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PanPoint;
    use crate::sample::{Channels, Sample};
    use std::sync::Arc;

    fn clamp_i16(v: i64) -> i16 {
        v.clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }

    #[test]
    fn silence_on_empty_queue() {
        let mut mixer = Mixer::new(8);
        let mut buf = vec![0i64; 16];
        let outcome = mixer.generate(&mut buf);
        assert_eq!(outcome.notes_reaped, 0);
        assert!(buf.iter().all(|&v| v == 0));
    }

    #[test]
    fn mono_impulse_reproduces_centred_and_reaps() {
        let sample = Arc::new(Sample::new(vec![0, 32767, 0, 0], Channels::Mono, 1.0, None).unwrap());
        let mut mixer = Mixer::new(1024);
        mixer.push(Note::new(sample, 0, 1.0, 1.0, PanPoint::IDENTITY, 1, None, None));

        let mut buf = vec![0i64; 2 * 1024];
        let outcome = mixer.generate(&mut buf);

        assert_eq!(clamp_i16(buf[0]), 0);
        assert_eq!(clamp_i16(buf[1]), 0);
        assert_eq!(clamp_i16(buf[2]), 32767);
        assert_eq!(clamp_i16(buf[3]), 32767);
        assert_eq!(clamp_i16(buf[4]), 0);
        assert_eq!(clamp_i16(buf[6]), 0);
        for f in 4..1024 {
            assert_eq!(buf[2 * f], 0);
            assert_eq!(buf[2 * f + 1], 0);
        }
        assert_eq!(outcome.notes_reaped, 1);
        assert!(mixer.is_empty());
    }

    #[test]
    fn hard_pan_left_silences_right_channel() {
        let sample = Arc::new(Sample::new(vec![0, 32767, 0, 0], Channels::Mono, 1.0, None).unwrap());
        let pan = PanPoint {
            scale_x: 1.0,
            shift_x: -1.0,
            scale_y: 1.0,
            shift_y: 0.0,
        };
        let mut mixer = Mixer::new(8);
        mixer.push(Note::new(sample, 0, 1.0, 1.0, pan, 1, None, None));

        let mut buf = vec![0i64; 16];
        mixer.generate(&mut buf);

        assert_eq!(clamp_i16(buf[2]), 32767);
        assert_eq!(buf[3], 0);
    }

    #[test]
    fn current_time_advances_by_frames_per_buffer() {
        let mut mixer = Mixer::new(64);
        let mut buf = vec![0i64; 128];
        mixer.generate(&mut buf);
        assert_eq!(mixer.current_time(), 64);
        mixer.generate(&mut buf);
        assert_eq!(mixer.current_time(), 128);
    }

    #[test]
    fn note_starting_mid_buffer_stays_silent_until_its_offset() {
        let sample = Arc::new(Sample::new(vec![32767, 32767], Channels::Mono, 1.0, None).unwrap());
        let mut mixer = Mixer::new(8);
        mixer.push(Note::new(sample, 3, 1.0, 1.0, PanPoint::IDENTITY, 1, None, None));

        let mut buf = vec![0i64; 16];
        mixer.generate(&mut buf);
        assert_eq!(clamp_i16(buf[0]), 0);
        assert_eq!(clamp_i16(buf[2]), 0);
        assert_eq!(clamp_i16(buf[4]), 0);
        assert_eq!(clamp_i16(buf[6]), 32767);
    }

    #[test]
    fn note_on_placeholder_silent_sample_mixes_to_silence() {
        // A note referencing a failed-decode stand-in plays silence rather
        // than needing a special case in the mix loop.
        let sample = Arc::new(Sample::placeholder_silent(Channels::Mono, 1.0));
        let mut mixer = Mixer::new(8);
        mixer.push(Note::new(sample, 0, 1.0, 1.0, PanPoint::IDENTITY, 1, None, None));

        let mut buf = vec![0i64; 16];
        let outcome = mixer.generate(&mut buf);
        assert!(buf.iter().all(|&v| v == 0));
        assert_eq!(outcome.notes_reaped, 1);
    }

    #[test]
    fn late_note_starts_at_buffer_frame_zero() {
        // A note a tick callback schedules with start_time < current_time
        // (already past) begins playing from the buffer's first frame,
        // missing the skipped frames.
        let sample = Arc::new(Sample::new(vec![32767, 32767], Channels::Mono, 1.0, None).unwrap());
        let mut mixer = Mixer::new(8);
        mixer.push(Note::new(sample, -2, 1.0, 1.0, PanPoint::IDENTITY, 1, None, None));

        let mut buf = vec![0i64; 16];
        mixer.generate(&mut buf);
        assert_eq!(clamp_i16(buf[0]), 32767);
    }
}
