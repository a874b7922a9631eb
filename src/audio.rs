//! Audio output for the tone sequencer.
//!
//! `play_blocking` returns once the buffer has finished; the sequencer relies
//! on that to time its stage changes.

use std::time::Duration;

use crate::error::Error;

pub trait AudioSink {
    /// Play unsigned 8-bit mono samples at `sample_rate` and block until done.
    fn play_blocking(&mut self, samples: &[u8], sample_rate: u32) -> Result<(), Error>;
}

pub fn buffer_duration(samples: usize, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(samples as f64 / sample_rate.max(1) as f64)
}

/// No device: just wait as long as the buffer would have played.
pub struct SilentSink;

impl AudioSink for SilentSink {
    fn play_blocking(&mut self, samples: &[u8], sample_rate: u32) -> Result<(), Error> {
        std::thread::sleep(buffer_duration(samples.len(), sample_rate));
        Ok(())
    }
}

/// Open the configured sink, falling back to silence when no device is available.
pub fn open_sink(enabled: bool) -> Box<dyn AudioSink> {
    if !enabled {
        return Box::new(SilentSink);
    }
    #[cfg(feature = "audio")]
    {
        match device::CpalSink::open_default() {
            Ok(sink) => return Box::new(sink),
            Err(e) => log::warn!("{e}; tones will be silent"),
        }
    }
    #[cfg(not(feature = "audio"))]
    log::warn!("built without the `audio` feature; tones will be silent");
    Box::new(SilentSink)
}

#[cfg(feature = "audio")]
mod device {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    use super::{AudioSink, buffer_duration};
    use crate::error::Error;

    /// Default output device through cpal. Samples are resampled by nearest
    /// index to the device rate and duplicated across its channels.
    pub struct CpalSink {
        device: cpal::Device,
        config: cpal::StreamConfig,
    }

    impl CpalSink {
        pub fn open_default() -> Result<Self, Error> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| Error::AudioDevice("no default output device".into()))?;
            let supported = device
                .default_output_config()
                .map_err(|e| Error::AudioDevice(format!("output config: {e}")))?;
            if supported.sample_format() != cpal::SampleFormat::F32 {
                return Err(Error::AudioDevice(format!(
                    "unsupported sample format {:?}",
                    supported.sample_format()
                )));
            }
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            log::info!(
                "audio output: {} @ {}Hz, {} channels",
                name,
                supported.sample_rate().0,
                supported.channels()
            );
            Ok(Self { device, config: supported.into() })
        }
    }

    impl AudioSink for CpalSink {
        fn play_blocking(&mut self, samples: &[u8], sample_rate: u32) -> Result<(), Error> {
            let channels = self.config.channels as usize;
            let ratio = sample_rate as f64 / self.config.sample_rate.0 as f64;
            let pcm: Arc<Vec<f32>> = Arc::new(samples.iter().map(|&s| (s as f32 - 128.0) / 128.0).collect());
            let frame = Arc::new(AtomicUsize::new(0));
            let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

            let data_pcm = Arc::clone(&pcm);
            let data_frame = Arc::clone(&frame);
            let stream = self
                .device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for out in data.chunks_mut(channels) {
                            let f = data_frame.fetch_add(1, Ordering::Relaxed);
                            let idx = (f as f64 * ratio) as usize;
                            let v = match data_pcm.get(idx) {
                                Some(&v) => v,
                                None => {
                                    let _ = done_tx.try_send(());
                                    0.0
                                }
                            };
                            out.fill(v);
                        }
                    },
                    |err| log::error!("audio output error: {err}"),
                    None,
                )
                .map_err(|e| Error::AudioDevice(format!("build stream: {e}")))?;
            stream.play().map_err(|e| Error::AudioDevice(format!("play: {e}")))?;

            // upper bound in case the device stops calling back
            let limit = buffer_duration(samples.len(), sample_rate) * 2 + std::time::Duration::from_secs(1);
            if done_rx.recv_timeout(limit).is_err() {
                log::warn!("audio playback did not report completion; moving on");
            }
            drop(stream);
            Ok(())
        }
    }
}
