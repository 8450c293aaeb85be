//! A scheduled playback instance of a [`Sample`] on a [`Channel`].

use std::sync::Arc;

use crate::channel::{ChannelRef, PanPoint};
use crate::sample::Sample;
use crate::FrameTime;

/// Fixed-point playhead cursor: `frame_pos` is the integer source frame,
/// `frame_frac` is the 16-bit fractional part (`0..=0xFFFF`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayCursor {
    pub frame_pos: u64,
    pub frame_frac: u16,
}

/// A scheduled playback instance. Created via [`Note::new`] or
/// [`Note::with_duration`], destroyed when exhausted or channel-purged.
pub struct Note {
    pub sample: Arc<Sample>,
    pub start_time: FrameTime,
    pub pitch: f64,
    pub volume: f64,
    pub pan: PanPoint,
    pub reps_total: u32,
    pub reps_left: u32,
    pub cursor: PlayCursor,
    pub channel: Option<ChannelRef>,
    on_remove: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Note")
            .field("start_time", &self.start_time)
            .field("pitch", &self.pitch)
            .field("volume", &self.volume)
            .field("reps_total", &self.reps_total)
            .field("reps_left", &self.reps_left)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Note {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sample: Arc<Sample>,
        start_time: FrameTime,
        pitch: f64,
        volume: f64,
        pan: PanPoint,
        reps: u32,
        channel: Option<ChannelRef>,
        on_remove: Option<Box<dyn FnOnce() + Send>>,
    ) -> Self {
        Note {
            sample,
            start_time,
            pitch,
            volume,
            pan,
            reps_total: reps,
            reps_left: reps.saturating_sub(1),
            cursor: PlayCursor::default(),
            channel,
            on_remove,
        }
    }

    /// Create a note sized to last approximately `duration_out_frames` output
    /// frames.
    #[allow(clippy::too_many_arguments)]
    pub fn with_duration(
        sample: Arc<Sample>,
        start_time: FrameTime,
        pitch: f64,
        volume: f64,
        pan: PanPoint,
        duration_out_frames: u64,
        channel: Option<ChannelRef>,
        on_remove: Option<Box<dyn FnOnce() + Send>>,
    ) -> Self {
        let reps = reps_for_duration(&sample, pitch, duration_out_frames);
        Note::new(sample, start_time, pitch, volume, pan, reps, channel, on_remove)
    }

    /// Called exactly once on reap.
    pub(crate) fn fire_on_remove(&mut self) {
        if let Some(cb) = self.on_remove.take() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(cb));
            if result.is_err() {
                tracing::warn!("note completion callback panicked; continuing");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        crate::resample::is_finished(&self.sample, self.cursor, self.reps_left)
    }
}

/// `margins = num_frames - loop_len`,
/// `duration_src = duration_out_frames * framerate * pitch`,
/// `reps = ceil((duration_src - margins) / loop_len)`, at least 1.
fn reps_for_duration(sample: &Sample, pitch: f64, duration_out_frames: u64) -> u32 {
    if !sample.has_loop() {
        return 1;
    }
    let loop_points = sample.loop_points().unwrap();
    let loop_len = loop_points.len() as f64;
    if loop_len <= 0.0 {
        return 1;
    }
    let margins = sample.num_frames() as f64 - loop_len;
    let duration_src = duration_out_frames as f64 * sample.framerate() * pitch;
    let reps = ((duration_src - margins) / loop_len).ceil();
    (reps.max(1.0)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Channels, LoopPoints};

    fn looping_sample() -> Arc<Sample> {
        Arc::new(
            Sample::new(
                vec![0; 8],
                Channels::Mono,
                1.0,
                Some(LoopPoints { start: 2, end: 6 }),
            )
            .unwrap(),
        )
    }

    #[test]
    fn duration_formula_computes_expected_reps() {
        // num_frames=8, loop_len=4, margins=4.
        // duration_out_frames=16 at natural pitch -> duration_src=16.
        // reps = ceil((16-4)/4) = 3.
        let s = looping_sample();
        let reps = reps_for_duration(&s, 1.0, 16);
        assert_eq!(reps, 3);
    }

    #[test]
    fn duration_formula_floors_at_one_rep() {
        let s = looping_sample();
        let reps = reps_for_duration(&s, 1.0, 1);
        assert_eq!(reps, 1);
    }

    #[test]
    fn on_remove_fires_exactly_once() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let count = Arc::new(AtomicU32::new(0));
        let count2 = count.clone();
        let sample = Arc::new(Sample::new(vec![0, 0], Channels::Mono, 1.0, None).unwrap());
        let mut note = Note::new(
            sample,
            0,
            1.0,
            1.0,
            PanPoint::IDENTITY,
            1,
            None,
            Some(Box::new(move || {
                count2.fetch_add(1, Ordering::SeqCst);
            })),
        );
        note.fire_on_remove();
        note.fire_on_remove();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_repr_reports_reps_total_and_reps_left() {
        let sample = Arc::new(Sample::new(vec![0; 8], Channels::Mono, 1.0, None).unwrap());
        let note = Note::new(sample, 0, 1.0, 1.0, PanPoint::IDENTITY, 4, None, None);
        let repr = format!("{:?}", note);
        assert!(repr.contains("reps_total: 4"));
        assert!(repr.contains("reps_left: 3"));
    }
}
