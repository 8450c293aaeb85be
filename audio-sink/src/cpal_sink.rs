//! Live-device backend: a background thread owns the
//! non-`Send` `cpal::Stream` and is driven over a control channel, so the
//! public handle stays `Send`. The calling thread of `run` blocks handing
//! off pre-mixed, pre-converted buffers through a small ring of
//! channel-backed slots, which is this crate's equivalent of the per-slot
//! mutex/condvar handoff used by pthread-style backends
//! (CoreAudio, AudioQueue) — blocking `send`/`recv` on a bounded channel
//! gives the identical "block until a slot is available" behaviour without
//! hand-rolled condvar bookkeeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use crossbeam_channel::{bounded, Receiver, Sender};
use mixer_core::FrameTime;
use tracing::warn;

use crate::pcm;
use crate::sink::{AudioSink, SinkDriver, SinkError, SinkOptions, TickOutcome};

const SLOT_COUNT: usize = 3;

enum CtrlMsg {
    Shutdown,
}

pub struct CpalSink {
    sample_rate: u32,
    frames_per_buffer: usize,
    filled_tx: Option<Sender<Vec<i16>>>,
    empty_rx: Option<Receiver<Vec<i16>>>,
    ctrl_tx: Option<Sender<CtrlMsg>>,
    bailing: Arc<AtomicBool>,
    stream_thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// `requested_frames_per_buffer` is a hint; the negotiated device buffer
    /// size (or `opts.buffersize`) wins if the device doesn't support it.
    pub fn new(requested_frames_per_buffer: usize) -> Self {
        CpalSink {
            sample_rate: 0,
            frames_per_buffer: requested_frames_per_buffer,
            filled_tx: None,
            empty_rx: None,
            ctrl_tx: None,
            bailing: Arc::new(AtomicBool::new(false)),
            stream_thread: None,
        }
    }
}

impl AudioSink for CpalSink {
    fn open(&mut self, opts: &SinkOptions) -> Result<(), SinkError> {
        if let Some(requested) = opts.buffersize {
            self.frames_per_buffer = requested;
        }
        let frames_per_buffer = self.frames_per_buffer;

        let (filled_tx, filled_rx) = bounded::<Vec<i16>>(SLOT_COUNT);
        let (empty_tx, empty_rx) = bounded::<Vec<i16>>(SLOT_COUNT);
        for _ in 0..SLOT_COUNT {
            empty_tx
                .send(vec![0i16; 2 * frames_per_buffer])
                .expect("fresh channel cannot be full");
        }
        let (ctrl_tx, ctrl_rx) = bounded::<CtrlMsg>(4);
        let bailing = self.bailing.clone();

        let (sample_rate_tx, sample_rate_rx) = bounded::<Result<u32, String>>(1);

        let thread = std::thread::spawn(move || {
            stream_owner_loop(filled_rx, empty_tx, ctrl_rx, bailing, sample_rate_tx);
        });

        let sample_rate = sample_rate_rx
            .recv()
            .map_err(|_| SinkError::DeviceNegotiation("stream thread exited before reporting sample rate".into()))?
            .map_err(SinkError::DeviceNegotiation)?;

        self.sample_rate = sample_rate;
        self.filled_tx = Some(filled_tx);
        self.empty_rx = Some(empty_rx);
        self.ctrl_tx = Some(ctrl_tx);
        self.stream_thread = Some(thread);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames_per_buffer(&self) -> usize {
        self.frames_per_buffer
    }

    fn run(&mut self, driver: &mut dyn SinkDriver) -> Result<(), SinkError> {
        let filled_tx = self
            .filled_tx
            .as_ref()
            .ok_or_else(|| SinkError::DeviceNegotiation("sink not opened".into()))?;
        let empty_rx = self.empty_rx.as_ref().unwrap();

        let mut sum_buffer = vec![0i64; 2 * self.frames_per_buffer];
        let mut current_time: FrameTime = 0;

        loop {
            if self.bailing.load(Ordering::Acquire) {
                break;
            }
            if driver.tick(current_time) == TickOutcome::Stop {
                break;
            }
            driver.mix(&mut sum_buffer);

            let mut buf = empty_rx
                .recv()
                .map_err(|_| SinkError::Write("device stream thread is gone".into()))?;
            pcm::sum_buffer_to_i16(&sum_buffer, &mut buf);
            filled_tx
                .send(buf)
                .map_err(|_| SinkError::Write("device stream thread is gone".into()))?;

            current_time += self.frames_per_buffer as FrameTime;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.bailing.store(true, Ordering::Release);
        if let Some(ctrl_tx) = self.ctrl_tx.take() {
            let _ = ctrl_tx.send(CtrlMsg::Shutdown);
        }
        if let Some(thread) = self.stream_thread.take() {
            let _ = thread.join();
        }
        self.filled_tx = None;
        self.empty_rx = None;
        Ok(())
    }
}

fn stream_owner_loop(
    filled_rx: Receiver<Vec<i16>>,
    empty_tx: Sender<Vec<i16>>,
    ctrl_rx: Receiver<CtrlMsg>,
    bailing: Arc<AtomicBool>,
    sample_rate_tx: Sender<Result<u32, String>>,
) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(d) => d,
        None => {
            let _ = sample_rate_tx.send(Err("no default output device".into()));
            return;
        }
    };

    let mut supported = match device.supported_output_configs() {
        Ok(c) => c.collect::<Vec<_>>(),
        Err(e) => {
            let _ = sample_rate_tx.send(Err(e.to_string()));
            return;
        }
    };
    if supported.is_empty() {
        let _ = sample_rate_tx.send(Err("no supported output configs".into()));
        return;
    }
    let chosen = supported
        .iter()
        .rev()
        .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        .cloned()
        .unwrap_or_else(|| supported.pop().unwrap());
    let config = chosen.with_max_sample_rate().config();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels as usize;

    let data_cb = move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
        if bailing.load(Ordering::Acquire) {
            data.iter_mut().for_each(|s| *s = 0.0);
            return;
        }
        match filled_rx.try_recv() {
            Ok(filled) => {
                for (dst, &src) in data.iter_mut().zip(filled.iter()) {
                    *dst = src as f32 / 32768.0;
                }
                for dst in data.iter_mut().skip(filled.len()) {
                    *dst = 0.0;
                }
                let _ = empty_tx.try_send(filled);
            }
            Err(_) => {
                warn!("cpal sink underrun: no filled buffer available, outputting silence");
                data.iter_mut().for_each(|s| *s = 0.0);
            }
        }
    };
    let err_cb = |err| {
        warn!(error = %err, "cpal stream error");
    };

    let stream = match device.build_output_stream(&config, data_cb, err_cb, None) {
        Ok(s) => s,
        Err(e) => {
            let _ = sample_rate_tx.send(Err(e.to_string()));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = sample_rate_tx.send(Err(e.to_string()));
        return;
    }
    let _ = sample_rate_tx.send(Ok(sample_rate));
    let _ = channels;

    loop {
        match ctrl_rx.recv() {
            Ok(CtrlMsg::Shutdown) | Err(_) => break,
        }
    }
    // `stream` drops here, stopping playback.
}
