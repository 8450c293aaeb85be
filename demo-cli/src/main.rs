//! Manual smoke test: synthesizes a one-second tone, schedules it on a
//! [`Mixer`], and drives a [`WavFileSink`] until the tone has finished
//! playing. Not a general-purpose player — sample decoding is out of scope
//! for this workspace.

use std::f64::consts::TAU;
use std::sync::Arc;

use anyhow::{Context, Result};
use audio_sink::{AudioSink, MixerDriver, SinkOptions, TickOutcome, WavFileSink};
use mixer_core::{Channels, FrameTime, Mixer, Note, PanPoint, Sample};

fn synth_tone(framerate: f64, seconds: f64, freq_hz: f64) -> Arc<Sample> {
    let n = (framerate * seconds) as usize;
    let mut data = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64 / framerate;
        let v = (t * freq_hz * TAU).sin();
        data.push((v * 20_000.0) as i16);
    }
    Arc::new(Sample::new(data, Channels::Mono, 1.0, None).expect("synthesized sample is well-formed"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let out_path = std::env::args().nth(1).unwrap_or_else(|| "demo.wav".to_string());

    let sample_rate = 44_100u32;
    let frames_per_buffer = 512usize;
    let sample = synth_tone(sample_rate as f64, 1.0, 440.0);

    let mut mixer = Mixer::new(frames_per_buffer);
    mixer.push(Note::new(sample, 0, 1.0, 1.0, PanPoint::IDENTITY, 1, None, None));

    let total_buffers = sample_rate as usize / frames_per_buffer + 1;
    let mut buffers_run = 0usize;
    let mut tick_fn = move |_current_time: FrameTime, _mixer: &mut Mixer| -> TickOutcome {
        buffers_run += 1;
        if buffers_run > total_buffers {
            TickOutcome::Stop
        } else {
            TickOutcome::Continue
        }
    };

    let mut driver = MixerDriver {
        mixer: &mut mixer,
        tick_fn: &mut tick_fn,
    };

    let mut sink = WavFileSink::new(&out_path, sample_rate, frames_per_buffer);
    sink.open(&SinkOptions::default()).context("opening wav sink")?;
    sink.run(&mut driver).context("running mixer against wav sink")?;
    sink.close().context("closing wav sink")?;

    tracing::info!(path = %out_path, "wrote demo tone");
    Ok(())
}
