//! Per-note, per-buffer channel-tree composition: walks
//! `channel, channel.parent(), ...` accumulating a scalar volume (folding in
//! constant-window multiplies, recording ramp ranges for windows that
//! straddle the buffer) and a stereo pan transform (with intra-buffer sweep
//! support via a `pan_at_start`/`pan_at_end` pair).

use crate::channel::{ChannelRef, PanPoint, StereoWindow};
use crate::sample::Channels;
use crate::FrameTime;

/// A volume fade partially overlapping the current buffer, recorded instead
/// of folded into the scalar `volume` because it must be applied per-frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRamp {
    pub start: FrameTime,
    pub end: FrameTime,
    pub start_vol: f64,
    pub end_vol: f64,
}

impl VolumeRamp {
    /// The APPLY_RANGE rule (float form, used by the `float-mixing`
    /// build; the default build reimplements this with its own
    /// precision-preserving fixed-point formula, see [`crate::fixed`]).
    pub fn value_at(&self, t: FrameTime) -> f64 {
        if t >= self.end {
            self.end_vol
        } else if t <= self.start {
            self.start_vol
        } else {
            let frac = (t - self.start) as f64 / (self.end - self.start) as f64;
            self.start_vol + frac * (self.end_vol - self.start_vol)
        }
    }
}

/// Per-source-channel contribution to each output channel. `to_left[0]` /
/// `to_right[0]` is the mono channel (or stereo left); `[1]` is stereo right
/// and unused for mono sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainMatrix {
    pub to_left: [f64; 2],
    pub to_right: [f64; 2],
}

impl GainMatrix {
    pub fn lerp(a: GainMatrix, b: GainMatrix, t: f64) -> GainMatrix {
        GainMatrix {
            to_left: [
                a.to_left[0] + (b.to_left[0] - a.to_left[0]) * t,
                a.to_left[1] + (b.to_left[1] - a.to_left[1]) * t,
            ],
            to_right: [
                a.to_right[0] + (b.to_right[0] - a.to_right[0]) * t,
                a.to_right[1] + (b.to_right[1] - a.to_right[1]) * t,
            ],
        }
    }
}

/// Left/right split from a pan position: `d = max(|sx|, |sy|)`;
/// beyond unit distance, normalize and apply inverse-square falloff. `y`
/// only ever contributes to the distance cap.
pub fn split_lr(sx: f64, sy: f64) -> (f64, f64) {
    let pos = glam::DVec2::new(sx, sy);
    let d = pos.x.abs().max(pos.y.abs());
    let sx_eff = if d > 1.0 { pos.x / d } else { pos.x };
    let (mut vol_l, mut vol_r) = if sx_eff < 0.0 {
        (1.0, 1.0 + sx_eff)
    } else {
        (1.0 - sx_eff, 1.0)
    };
    if d > 1.0 {
        let d2 = d * d;
        vol_l /= d2;
        vol_r /= d2;
    }
    (vol_l, vol_r)
}

/// Build the per-source-channel gain matrix for a resolved pan transform.
pub fn gain_matrix(pan: PanPoint, channels: Channels) -> GainMatrix {
    match channels {
        Channels::Mono => {
            let (l, r) = split_lr(pan.shift_x, pan.shift_y);
            GainMatrix {
                to_left: [l, 0.0],
                to_right: [r, 0.0],
            }
        }
        Channels::Stereo => {
            let (ll, lr) = split_lr(pan.shift_x - pan.scale_x, pan.shift_y);
            let (rl, rr) = split_lr(pan.shift_x + pan.scale_x, pan.shift_y);
            GainMatrix {
                to_left: [ll, rl],
                to_right: [lr, rr],
            }
        }
    }
}

/// Result of walking a note's channel tree for one buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkOutcome {
    pub volume: f64,
    /// Gain matrix resolved at `current_time` (buffer start).
    pub gain_start: GainMatrix,
    /// Gain matrix resolved at `end_time` (buffer end). Equal to
    /// `gain_start` unless `sweeping`.
    pub gain_end: GainMatrix,
    pub sweeping: bool,
}

fn interp_pan(window: StereoWindow, t: FrameTime) -> PanPoint {
    if t <= window.t0 {
        window.pan0
    } else if t >= window.t1 {
        window.pan1
    } else {
        let frac = (t - window.t0) as f64 / (window.t1 - window.t0) as f64;
        PanPoint::lerp(window.pan0, window.pan1, frac)
    }
}

/// Walk `channel`'s ancestor chain, composing volume and pan for the buffer
/// `[current_time, end_time)`. `note_pan` is the note's own base pan
/// transform, composed first (closest to the source). `ramps` is a
/// mixer-owned scratch vector, cleared and refilled by this call.
pub fn walk_channel_tree(
    channel: Option<&ChannelRef>,
    note_pan: PanPoint,
    note_channels: Channels,
    current_time: FrameTime,
    end_time: FrameTime,
    ramps: &mut Vec<VolumeRamp>,
) -> WalkOutcome {
    ramps.clear();
    let mut volume = 1.0_f64;
    let mut pan_at_start = note_pan;
    let mut pan_at_end = note_pan;
    let mut sweeping = false;

    let mut cur = channel.cloned();
    while let Some(ch) = cur {
        if let Some(vw) = ch.volume_window(current_time) {
            if current_time >= vw.t1 {
                volume *= vw.v1;
            } else if vw.t0 >= end_time {
                volume *= vw.v0;
            } else {
                ramps.push(VolumeRamp {
                    start: vw.t0,
                    end: vw.t1,
                    start_vol: vw.v0,
                    end_vol: vw.v1,
                });
            }
        }

        if let Some(sw) = ch.stereo_window(current_time) {
            let fully_constant = current_time >= sw.t1 || sw.t0 >= end_time;
            if fully_constant {
                let constant = if current_time >= sw.t1 { sw.pan1 } else { sw.pan0 };
                pan_at_start = pan_at_start.compose(constant);
                pan_at_end = if sweeping {
                    pan_at_end.compose(constant)
                } else {
                    pan_at_start
                };
            } else {
                if !sweeping {
                    pan_at_end = pan_at_start;
                    sweeping = true;
                }
                let at_start = interp_pan(sw, current_time);
                let at_end = interp_pan(sw, end_time);
                pan_at_start = pan_at_start.compose(at_start);
                pan_at_end = pan_at_end.compose(at_end);
            }
        }

        cur = ch.parent();
    }

    let gain_start = gain_matrix(pan_at_start, note_channels);
    let gain_end = if sweeping {
        gain_matrix(pan_at_end, note_channels)
    } else {
        gain_start
    };

    WalkOutcome {
        volume,
        gain_start,
        gain_end,
        sweeping,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_symmetry_centre() {
        let (l, r) = split_lr(0.0, 0.0);
        assert!((l - r).abs() < 1e-12);
    }

    #[test]
    fn pan_symmetry_hard_left() {
        let (l, r) = split_lr(-1.0, 0.0);
        assert_eq!(r, 0.0);
        assert_eq!(l, 1.0);
    }

    #[test]
    fn pan_symmetry_hard_right() {
        let (l, r) = split_lr(1.0, 0.0);
        assert_eq!(l, 0.0);
        assert_eq!(r, 1.0);
    }

    #[test]
    fn pan_inverse_square_beyond_unit_distance() {
        let (l, _r) = split_lr(-2.0, 0.0);
        // d=2, sx_eff=-1 -> (1, 0) pre-falloff, then /= d^2=4.
        assert!((l - 0.25).abs() < 1e-12);
    }

    #[test]
    fn no_channel_no_sweep_is_identity_gain() {
        let outcome = walk_channel_tree(
            None,
            PanPoint::IDENTITY,
            Channels::Mono,
            0,
            1024,
            &mut Vec::new(),
        );
        assert_eq!(outcome.volume, 1.0);
        assert!(!outcome.sweeping);
        assert_eq!(outcome.gain_start, outcome.gain_end);
    }
}
