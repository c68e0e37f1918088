//! Audio output sinks fed by the tick loop

pub mod wavetable;

pub use wavetable::WaveformTable;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, Stream};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use crate::error::{Error, Result};

/// Where rendered mono blocks go
pub trait AudioOutput {
    fn sample_rate(&self) -> u32;

    fn write(&mut self, block: &[f32]) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards audio; used by tests and headless runs
#[derive(Debug)]
pub struct NullOutput {
    sample_rate: u32,
    pub samples_written: usize,
    pub peak: f32,
}

impl NullOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, samples_written: 0, peak: 0.0 }
    }
}

impl AudioOutput for NullOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, block: &[f32]) -> Result<()> {
        self.samples_written += block.len();
        self.peak = block.iter().fold(self.peak, |m, s| m.max(s.abs()));
        Ok(())
    }
}

/// Writes the session to a mono 32-bit float WAV file
pub struct WavOutput {
    sample_rate: u32,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavOutput {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        Ok(Self { sample_rate, writer: Some(writer) })
    }
}

impl AudioOutput for WavOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, block: &[f32]) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            for &sample in block {
                writer.write_sample(sample)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

/// Live output through the default cpal device.
///
/// The tick loop renders blocks and hands them over a bounded channel; the
/// device callback only pulls, and plays silence when it runs dry.
pub struct CpalOutput {
    _stream: Stream,
    sender: Sender<Vec<f32>>,
    sample_rate: u32,
    dropped_blocks: u64,
}

impl CpalOutput {
    pub fn open(max_queued_blocks: usize) -> Result<Self> {
        let host = cpal::default_host();
        log::info!("[AUDIO] using audio host: {}", host.id().name());

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("No output device available".to_string()))?;
        log::info!("[AUDIO] using output device: {:?}", device.name());

        let config = device
            .default_output_config()
            .map_err(|e| Error::Audio(e.to_string()))?;
        let sample_format = config.sample_format();
        let config = cpal::StreamConfig::from(config);
        let sample_rate = config.sample_rate.0;

        let (sender, receiver) = bounded(max_queued_blocks.max(1));

        let stream = match sample_format {
            SampleFormat::F32 => create_stream::<f32>(&device, &config, receiver),
            SampleFormat::I16 => create_stream::<i16>(&device, &config, receiver),
            SampleFormat::U16 => create_stream::<u16>(&device, &config, receiver),
            other => Err(Error::Audio(format!("Unsupported sample format {:?}", other))),
        }?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        log::info!("[AUDIO] stream started at {} Hz", sample_rate);

        Ok(Self {
            _stream: stream,
            sender,
            sample_rate,
            dropped_blocks: 0,
        })
    }

    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, block: &[f32]) -> Result<()> {
        match self.sender.try_send(block.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped_blocks += 1;
                log::debug!("[AUDIO] output queue full, dropped block ({} total)", self.dropped_blocks);
                Ok(())
            },
            Err(TrySendError::Disconnected(_)) => Err(Error::Audio("output stream closed".to_string())),
        }
    }
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    blocks: Receiver<Vec<f32>>,
) -> Result<Stream>
where
    T: Sample + Send + 'static + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("[AUDIO] an error occurred on the audio stream: {}", err);

    let mut current: Vec<f32> = Vec::new();
    let mut pos = 0usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    if pos >= current.len() {
                        if let Ok(next) = blocks.try_recv() {
                            current = next;
                            pos = 0;
                        }
                    }
                    let value = match current.get(pos) {
                        Some(&v) => {
                            pos += 1;
                            v
                        },
                        None => 0.0,
                    };

                    let value_t = T::from_sample(value);
                    for sample in frame.iter_mut() {
                        *sample = value_t;
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_output_tracks_peak() {
        let mut out = NullOutput::new(44100);
        out.write(&[0.1, -0.7, 0.3]).unwrap();
        out.write(&[0.2]).unwrap();
        assert_eq!(out.samples_written, 4);
        assert_eq!(out.peak, 0.7);
    }

    #[test]
    fn test_wav_output_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut out = WavOutput::create(&path, 8000).unwrap();
        out.write(&[0.0, 0.5, -0.5, 0.25]).unwrap();
        out.finish().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.len(), 4);
    }
}
