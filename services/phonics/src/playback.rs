//! Audio output: one shared cpal stream fed by a ring buffer.
//!
//! Speech arrives as base64 PCM16 at 24kHz, gets resampled to the device
//! rate, and is pushed into the ring buffer the output callback drains.
//! The callback watches for silence edges and reports them, which is how
//! the rest of the app knows when speech starts and stops.

use crate::config::{OUTPUT_BUFFER_SECS, OUTPUT_CHUNK_SIZE};
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use phonics_native_utils::audio::{self, SPEECH_PCM16_SAMPLE_RATE};
use ringbuf::HeapProd;
use ringbuf::traits::{Consumer, Producer, Split};
use rubato::{FastFixedIn, Resampler};

/// Emitted from the output callback on silence edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    Started,
    Finished,
}

pub struct Playback {
    stream: cpal::Stream,
    producer: HeapProd<f32>,
    resampler: FastFixedIn<f32>,
}

impl Playback {
    /// Builds and starts the output stream on the given device.
    pub fn new(
        output: cpal::Device,
        events: tokio::sync::mpsc::Sender<PlaybackEvent>,
    ) -> Result<Self> {
        tracing::info!("Using output device: {:?}", &output.name()?);
        for config in output.supported_output_configs()? {
            tracing::debug!("Supported output config: {:?}", config);
        }

        let output_config = output
            .default_output_config()
            .context("Failed to get default output config")?;
        // Default channels and sample rate, fixed buffer size.
        let output_config = StreamConfig {
            channels: output_config.channels(),
            sample_rate: output_config.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
        };
        let output_channel_count = output_config.channels as usize;
        let output_sample_rate = output_config.sample_rate.0 as f64;
        tracing::info!("Output stream config: {:?}", &output_config);

        let buffer = audio::shared_buffer(buffer_capacity(output_sample_rate));
        let (producer, mut consumer) = buffer.split();

        // The callback tracks its own silence state so an event fires only
        // on the edge, not on every period.
        let mut was_silent = true;
        let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut sample_index = 0;
            let mut silence = 0;
            while sample_index < data.len() {
                let sample = consumer.try_pop().unwrap_or(0.0);
                if sample == 0.0 {
                    silence += 1;
                }
                // Left channel (ch:0).
                if sample_index < data.len() {
                    data[sample_index] = sample;
                    sample_index += 1;
                }
                // Right channel (ch:1), if it exists.
                if output_channel_count > 1 && sample_index < data.len() {
                    data[sample_index] = sample;
                    sample_index += 1;
                }
                // Ignore other channels.
                sample_index += output_channel_count.saturating_sub(2);
            }

            let silent = silence == data.len() / output_channel_count;
            if silent != was_silent {
                was_silent = silent;
                let event = if silent {
                    PlaybackEvent::Finished
                } else {
                    PlaybackEvent::Started
                };
                if let Err(e) = events.try_send(event) {
                    tracing::warn!("Failed to send playback event: {:?}", e);
                }
            }
        };

        let stream = output.build_output_stream(
            &output_config,
            output_data_fn,
            move |err| tracing::error!("An error occurred on output stream: {}", err),
            None,
        )?;
        stream.play()?;

        let resampler = audio::create_resampler(
            SPEECH_PCM16_SAMPLE_RATE,
            output_sample_rate,
            OUTPUT_CHUNK_SIZE,
        )?;

        Ok(Self {
            stream,
            producer,
            resampler,
        })
    }

    /// Kicks the stream back into playing. Called on every interaction that
    /// starts speech, mirroring how a suspended audio context is resumed.
    pub fn resume(&self) -> Result<()> {
        self.stream.play()?;
        Ok(())
    }

    /// Decodes one base64 PCM16 payload, resamples it to the device rate,
    /// and queues it for the output callback. Returns how many samples were
    /// queued; zero means the payload was empty or undecodable and no
    /// silence edge will ever fire for it.
    pub fn push_base64(&mut self, payload: &str) -> usize {
        let mut queued = 0;
        let mut dropped = 0;
        for sample in decode_and_resample(&mut self.resampler, payload) {
            if self.producer.try_push(sample).is_err() {
                dropped += 1;
            } else {
                queued += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(dropped, "output buffer full, samples dropped");
        }
        queued
    }
}

/// Samples the ring buffer must hold at the given device rate.
fn buffer_capacity(output_sample_rate: f64) -> usize {
    output_sample_rate as usize * OUTPUT_BUFFER_SECS
}

/// Turns one base64 PCM16 payload into device-rate samples. A payload that
/// fails to decode yields an empty vec.
fn decode_and_resample(resampler: &mut FastFixedIn<f32>, payload: &str) -> Vec<f32> {
    let samples = audio::decode_f32(payload);
    let chunk_size = resampler.input_frames_next();
    let mut out = Vec::new();
    for chunk in audio::split_for_chunks(&samples, chunk_size) {
        if let Ok(resampled) = resampler.process(&[chunk.as_slice()], None) {
            if let Some(resampled) = resampled.first() {
                out.extend_from_slice(resampled);
            }
        }
    }
    out
}
