//! Audio capture - feeds the sample buffer from the default input device
//!
//! Each cpal callback delivers one chunk. The chunk is reduced to mono
//! 16-bit samples (first channel only) and appended to the `SampleBuffer`;
//! the chunk length becomes the source's micro-chunk size.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};

use super::buffer::SampleBuffer;
use crate::error::ScopeError;

/// Append the first channel of an interleaved chunk to the buffer
fn push_input_samples<T>(data: &[T], channels: usize, buffer: &SampleBuffer)
where
    T: Sample,
    i16: FromSample<T>,
{
    let mono: Vec<i16> = data
        .chunks(channels.max(1))
        .map(|frame| frame[0].to_sample::<i16>())
        .collect();

    if !buffer.push_slice(&mono) {
        log::trace!("Buffer busy, dropped {} captured samples", mono.len());
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffer: SampleBuffer,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = config.channels as usize;
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            push_input_samples(data, channels, &buffer);
        },
        |err| log::error!("Input stream error: {}", err),
        None,
    )
}

/// A running input stream
///
/// The stream keeps capturing for as long as this value is alive.
pub struct Capture {
    _stream: cpal::Stream,
    sample_rate: u32,
    device_name: String,
}

impl Capture {
    /// Open the default input device and start appending to `buffer`
    pub fn start(buffer: SampleBuffer) -> Result<Self, ScopeError> {
        log::info!("Starting audio capture...");

        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            log::error!("No input device found");
            ScopeError::NoInputDevice
        })?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using input device: {}", device_name);

        let supported = device
            .default_input_config()
            .map_err(|e| ScopeError::InputConfig(e.to_string()))?;
        log::info!("Input config: {:?}", supported);

        let sample_rate = supported.sample_rate().0;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, buffer),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, buffer),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, buffer),
            format => {
                log::error!("Unsupported sample format: {:?}", format);
                return Err(ScopeError::UnsupportedFormat(format!("{:?}", format)));
            }
        }
        .map_err(|e| ScopeError::BuildStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| ScopeError::PlayStream(e.to_string()))?;

        log::info!("Capture started at {} Hz", sample_rate);
        Ok(Self {
            _stream: stream,
            sample_rate,
            device_name,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_input_takes_first_channel() {
        let buffer = SampleBuffer::new(16);
        let stereo: [f32; 6] = [0.5, -1.0, -0.5, 1.0, 0.0, 1.0];
        push_input_samples(&stereo, 2, &buffer);

        let snap = buffer.snapshot(16, 0);
        assert_eq!(snap.samples.len(), 3);
        assert!(snap.samples[0] > 16_000);
        assert!(snap.samples[1] < -16_000);
        assert_eq!(snap.samples[2], 0);
        assert_eq!(snap.micro_chunk, 3);
    }

    #[test]
    fn test_push_input_i16_passthrough() {
        let buffer = SampleBuffer::new(16);
        push_input_samples(&[100i16, -200, 300], 1, &buffer);
        assert_eq!(buffer.snapshot(0, 0).samples, vec![100, -200, 300]);
    }
}
