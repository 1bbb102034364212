//! Real-time playback through CPAL
//!
//! The CPAL stream runs on its own thread and pulls from an rtrb FIFO.
//! [`CpalOutput`] is the pushing end; hand it to a [`Renderer`](crate::Renderer)
//! to keep it fed from a session.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, SupportedStreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{error, info};

use crate::error::Error;
use crate::node::OutputSink;

/// Interleaved f32 FIFO feeding a CPAL output stream.
pub struct CpalOutput {
    buffer: Producer<f32>,
    channels: usize,
    sample_rate: u32,
    /// How many samples CPAL has consumed
    samples_consumed: Arc<AtomicUsize>,
    had_underrun: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open a stream on `device` and start it
    pub fn new(device: &cpal::Device, config: &SupportedStreamConfig) -> Result<Self, Error> {
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config = config.config();
        let sample_rate = stream_config.sample_rate.0;

        // ~100ms of audio to ride out scheduling jitter
        let buffer_samples = ((sample_rate as f32 * 0.1) as usize) * channels;
        let buffer_size = buffer_samples.next_power_of_two().max(8192);
        let (producer, consumer) = RingBuffer::<f32>::new(buffer_size);

        let samples_consumed = Arc::new(AtomicUsize::new(0));
        let had_underrun = Arc::new(AtomicBool::new(false));

        // the stream is not Send on every platform, so it lives and dies on its own thread
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let device = device.clone();
        let consumed = samples_consumed.clone();
        let underrun = had_underrun.clone();
        std::thread::spawn(move || {
            let stream = match build_stream(&device, sample_format, &stream_config, consumer, consumed, underrun) {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(err.to_string()));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            loop {
                std::thread::park();
            }
        });

        ready_rx
            .recv()
            .map_err(|_| Error::Device("stream thread exited before starting".into()))?
            .map_err(Error::Device)?;

        info!(sample_rate, channels, ?sample_format, buffer_size, "output stream started");

        Ok(Self {
            buffer: producer,
            channels,
            sample_rate,
            samples_consumed,
            had_underrun,
        })
    }

    /// How many samples have been played
    #[inline]
    pub fn samples_consumed(&self) -> usize {
        self.samples_consumed.load(Ordering::Relaxed)
    }
}

impl OutputSink for CpalOutput {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn free_samples(&self) -> usize {
        self.buffer.slots()
    }

    /// Extra device channels repeat the last source channel
    fn push_block(&mut self, block: &[f32], channels: usize) -> bool {
        let channels = channels.max(1);
        let frames = block.len() / channels;
        if self.buffer.slots() < frames * self.channels {
            return false;
        }

        for frame in block.chunks_exact(channels) {
            for ch in 0..self.channels {
                // room was checked above
                let _ = self.buffer.push(frame[ch.min(channels - 1)]);
            }
        }
        true
    }

    fn take_underrun(&self) -> bool {
        self.had_underrun.swap(false, Ordering::Relaxed)
    }
}

/// Build a stream whose callback converts FIFO samples to the device format `S`
fn build_stream_for<S>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut consumer: Consumer<f32>,
    samples_consumed: Arc<AtomicUsize>,
    had_underrun: Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    S: SizedSample + FromSample<f32>,
{
    device.build_output_stream(
        stream_config,
        move |data: &mut [S], _| {
            let mut starved = false;
            for out in data.iter_mut() {
                let sample = consumer.pop().unwrap_or_else(|_| {
                    starved = true;
                    0.0
                });
                *out = S::from_sample_(sample.clamp(-1.0, 1.0));
            }
            if starved {
                had_underrun.store(true, Ordering::Relaxed);
            }
            samples_consumed.fetch_add(data.len(), Ordering::Relaxed);
        },
        |err| error!(?err, "output stream error"),
        None,
    )
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    consumer: Consumer<f32>,
    samples_consumed: Arc<AtomicUsize>,
    had_underrun: Arc<AtomicBool>,
) -> Result<cpal::Stream, String> {
    let stream = match sample_format {
        SampleFormat::F32 => build_stream_for::<f32>(device, stream_config, consumer, samples_consumed, had_underrun),
        SampleFormat::I16 => build_stream_for::<i16>(device, stream_config, consumer, samples_consumed, had_underrun),
        SampleFormat::U16 => build_stream_for::<u16>(device, stream_config, consumer, samples_consumed, had_underrun),
        SampleFormat::I32 => build_stream_for::<i32>(device, stream_config, consumer, samples_consumed, had_underrun),
        other => return Err(format!("unsupported sample format: {other:?}")),
    };
    stream.map_err(|err| err.to_string())
}
