//! Fixed-point linear-interpolation resampling with loop playback.

use crate::note::PlayCursor;
use crate::sample::Sample;

/// `2^16`, the fixed-point scale for both the pitch step and `frame_frac`.
pub const FRAC_SCALE: f64 = 65_536.0;

/// `l_pitch = clamp(framerate * pitch * 2^16, 1, 2^28)` — the fixed-point
/// per-output-frame advance of the source playhead.
pub fn pitch_step_fixed(framerate: f64, pitch: f64) -> u32 {
    let step = (framerate * pitch * FRAC_SCALE).round();
    step.clamp(1.0, (1u64 << 28) as f64) as u32
}

/// Linearly interpolated 16-bit value at `cursor` on source `channel`,
/// respecting loop wrap at the seam: if the next source frame would be
/// `loop_end` and a repeat remains, the interpolation partner is
/// `loop_end - loop_len` (== `loop_start`) instead.
pub fn interpolated_sample(sample: &Sample, channel: usize, cursor: PlayCursor, reps_left: u32) -> i16 {
    let pos = cursor.frame_pos;
    let s1 = sample.frame_channel(pos, channel);

    let at_seam = reps_left > 0
        && sample
            .loop_points()
            .is_some_and(|lp| pos + 1 == lp.end);
    let s2 = if at_seam {
        sample.frame_channel(sample.loop_points().unwrap().start, channel)
    } else {
        sample.frame_channel(pos + 1, channel)
    };

    if cursor.frame_frac == 0 {
        return s1;
    }
    let frac = cursor.frame_frac as f64 / FRAC_SCALE;
    let v = s1 as f64 + (s2 as f64 - s1 as f64) * frac;
    v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Advance `cursor` by the fixed-point `step`, then unwind any loop wraps
/// this step crossed (may fire more than once for very high pitch steps).
pub fn advance_cursor(sample: &Sample, cursor: &mut PlayCursor, reps_left: &mut u32, step: u32) {
    let combined = ((cursor.frame_pos << 16) | cursor.frame_frac as u64) + step as u64;
    cursor.frame_pos = combined >> 16;
    cursor.frame_frac = (combined & 0xFFFF) as u16;

    if let Some(lp) = sample.loop_points() {
        while cursor.frame_pos >= lp.end && *reps_left > 0 {
            cursor.frame_pos -= lp.len();
            *reps_left -= 1;
        }
    }
}

/// A note is finished once its playhead has run off the end of the sample
/// with no repeats left (`frame_pos < num_frames` holds while active).
pub fn is_finished(sample: &Sample, cursor: PlayCursor, reps_left: u32) -> bool {
    cursor.frame_pos >= sample.num_frames() && reps_left == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Channels, LoopPoints};
    use std::sync::Arc;

    #[test]
    fn looping_note_plays_num_frames_plus_reps_minus_one_times_loop_len() {
        // sample of 8 frames, loop [2, 6) -> loop_len=4, reps_total=3 -> 2 wraps.
        let sample = Sample::new(
            vec![0; 8],
            Channels::Mono,
            1.0,
            Some(LoopPoints { start: 2, end: 6 }),
        )
        .unwrap();
        let step = pitch_step_fixed(1.0, 1.0);
        assert_eq!(step, 1 << 16);

        let mut cursor = PlayCursor::default();
        let mut reps_left = 2u32; // reps_total=3
        let mut played = 0u32;
        while !is_finished(&sample, cursor, reps_left) {
            let _ = interpolated_sample(&sample, 0, cursor, reps_left);
            advance_cursor(&sample, &mut cursor, &mut reps_left, step);
            played += 1;
        }
        assert_eq!(played, 8 + 2 * 4);
    }

    #[test]
    fn non_looping_note_plays_exactly_num_frames() {
        let sample = Arc::new(Sample::new(vec![0, 32767, 0, 0], Channels::Mono, 1.0, None).unwrap());
        let step = pitch_step_fixed(1.0, 1.0);
        let mut cursor = PlayCursor::default();
        let mut reps_left = 0u32;
        let mut played = 0u32;
        while !is_finished(&sample, cursor, reps_left) {
            advance_cursor(&sample, &mut cursor, &mut reps_left, step);
            played += 1;
        }
        assert_eq!(played, 4);
    }
}
