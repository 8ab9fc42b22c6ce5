//! cpal-based audio sink implementation.
//!
//! This module provides [`CpalSink`], the default [`AudioSink`] implementation
//! that wraps [cpal](https://crates.io/crates/cpal) for cross-platform audio output
//! (ALSA on Linux, CoreAudio on macOS, WASAPI on Windows).
//!
//! cpal is callback driven: the platform pulls samples when it needs them. The
//! sink turns that into the blocking write model the playback device expects.
//! Writes push interleaved samples into a lock-free ring buffer and wait while it
//! is full; the output callback pops from the other end. An empty ring while
//! frames are still expected is reported as an underrun on the next write.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wavplay_io::{CpalSink, PlaybackDevice};
//!
//! let sink = CpalSink::new().with_device("USB").with_queue_frames(4096);
//! let mut device = PlaybackDevice::new(Box::new(sink));
//! device.initialize(44100, 2)?;
//! ```

use crate::DeviceError;
use crate::backend::{AudioSink, NegotiatedFormat, SinkError, SinkParams};
use crate::devices::{device_name, find_output_device};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default software queue depth in frames.
pub const DEFAULT_QUEUE_FRAMES: usize = 8192;

/// Period assumed before the first callback reports the real one.
const FALLBACK_PERIOD_FRAMES: usize = 256;

const MIN_POLL: Duration = Duration::from_millis(1);

/// State shared between the writer and the audio callback.
#[derive(Debug, Default)]
struct StreamFlags {
    /// At least one frame has been written.
    primed: AtomicBool,
    draining: AtomicBool,
    underrun: AtomicBool,
    callbacks: AtomicU64,
    period_frames: AtomicUsize,
    stream_error: Mutex<Option<String>>,
}

impl StreamFlags {
    fn take_stream_error(&self) -> Option<String> {
        self.stream_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

struct Session {
    stream: Stream,
    producer: HeapProd<i16>,
    flags: Arc<StreamFlags>,
    channels: usize,
    sample_rate: u32,
}

impl Session {
    /// Half a device period, so a blocked writer wakes at least twice per callback.
    fn poll_interval(&self) -> Duration {
        let period = match self.flags.period_frames.load(Ordering::Relaxed) {
            0 => FALLBACK_PERIOD_FRAMES,
            n => n,
        };
        Duration::from_secs_f64(period as f64 / self.sample_rate.max(1) as f64 / 2.0).max(MIN_POLL)
    }

    fn pending_error(&self) -> Result<(), SinkError> {
        if let Some(msg) = self.flags.take_stream_error() {
            return Err(SinkError::Transient(msg));
        }
        if self.flags.underrun.swap(false, Ordering::SeqCst) {
            return Err(SinkError::Transient("buffer underrun".to_string()));
        }
        Ok(())
    }
}

/// cpal-backed [`AudioSink`].
///
/// Holds a cpal [`Host`], the opened [`Device`], and while a session is live the
/// output stream plus the writer end of its ring buffer.
pub struct CpalSink {
    host: Host,
    device_name: Option<String>,
    queue_frames: usize,
    device: Option<Device>,
    session: Option<Session>,
}

impl CpalSink {
    /// Create a sink for the platform's default output device.
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal sink created");
        Self {
            host,
            device_name: None,
            queue_frames: DEFAULT_QUEUE_FRAMES,
            device: None,
            session: None,
        }
    }

    /// Use the output device matching `name_or_index` instead of the default.
    pub fn with_device(mut self, name_or_index: impl Into<String>) -> Self {
        self.device_name = Some(name_or_index.into());
        self
    }

    /// Set the software queue depth in frames (minimum one).
    pub fn with_queue_frames(mut self, frames: usize) -> Self {
        self.queue_frames = frames.max(1);
        self
    }

    fn session_mut(&mut self) -> Result<&mut Session, SinkError> {
        self.session
            .as_mut()
            .ok_or_else(|| SinkError::Fatal("output stream not open".to_string()))
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the supported rate closest to `requested`.
///
/// Each range is an inclusive `(min, max)` pair. Ties favor the earlier range.
pub(crate) fn nearest_rate(ranges: &[(u32, u32)], requested: u32) -> Option<u32> {
    ranges
        .iter()
        .map(|&(min, max)| requested.clamp(min, max.max(min)))
        .min_by_key(|&rate| rate.abs_diff(requested))
}

impl AudioSink for CpalSink {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        let device = match self.device_name.as_deref() {
            Some(search) => find_output_device(&self.host, search)?,
            None => self.host.default_output_device().ok_or_else(|| {
                DeviceError::DeviceUnavailable("no default output device".to_string())
            })?,
        };
        let name = device_name(&device).unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(device = %name, "opened output device");
        self.device = Some(device);
        Ok(())
    }

    fn negotiate(&mut self, params: &SinkParams) -> Result<NegotiatedFormat, DeviceError> {
        let device = self.device.as_ref().ok_or(DeviceError::NotInitialized)?;
        if params.channels == 0 {
            return Err(DeviceError::UnsupportedParameters(
                "channel count is 0".to_string(),
            ));
        }

        let ranges: Vec<(u32, u32)> = device
            .supported_output_configs()
            .map_err(|e| DeviceError::UnsupportedParameters(e.to_string()))?
            .filter(|c| c.channels() == params.channels && c.sample_format() == SampleFormat::I16)
            .map(|c| (c.min_sample_rate(), c.max_sample_rate()))
            .collect();

        let sample_rate = nearest_rate(&ranges, params.sample_rate).ok_or_else(|| {
            DeviceError::UnsupportedParameters(format!(
                "no interleaved S16 output with {} channel(s)",
                params.channels
            ))
        })?;

        let stream_config = cpal::StreamConfig {
            channels: params.channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        let channels = params.channels as usize;

        let rb = HeapRb::<i16>::new(self.queue_frames * channels);
        let (producer, mut consumer) = rb.split();
        let flags = Arc::new(StreamFlags::default());

        let cb_flags = Arc::clone(&flags);
        let err_flags = Arc::clone(&flags);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let popped = consumer.pop_slice(data);
                    if popped < data.len() {
                        data[popped..].fill(0);
                        if cb_flags.primed.load(Ordering::Relaxed)
                            && !cb_flags.draining.load(Ordering::Relaxed)
                        {
                            cb_flags.underrun.store(true, Ordering::SeqCst);
                        }
                    }
                    cb_flags
                        .period_frames
                        .store(data.len() / channels, Ordering::Relaxed);
                    cb_flags.callbacks.fetch_add(1, Ordering::SeqCst);
                },
                move |err| {
                    *err_flags
                        .stream_error
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
                },
                None,
            )
            .map_err(|e| DeviceError::UnsupportedParameters(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::DeviceUnavailable(e.to_string()))?;

        tracing::debug!(
            channels = params.channels,
            sample_rate,
            queue_frames = self.queue_frames,
            "output stream started"
        );

        self.session = Some(Session {
            stream,
            producer,
            flags,
            channels,
            sample_rate,
        });

        Ok(NegotiatedFormat {
            sample_rate,
            channels: params.channels,
        })
    }

    fn write(&mut self, samples: &[i16], frames: usize) -> Result<usize, SinkError> {
        let session = self.session_mut()?;
        let channels = session.channels;

        loop {
            session.pending_error()?;

            let vacant_frames = session.producer.vacant_len() / channels;
            if vacant_frames > 0 {
                let n = vacant_frames.min(frames);
                let pushed = session.producer.push_slice(&samples[..n * channels]);
                session.flags.primed.store(true, Ordering::Relaxed);
                return Ok(pushed / channels);
            }
            std::thread::sleep(session.poll_interval());
        }
    }

    fn recover(&mut self, error: &SinkError) -> Result<(), SinkError> {
        match error {
            SinkError::Transient(_) => {
                let session = self.session_mut()?;
                session.flags.underrun.store(false, Ordering::SeqCst);
                session
                    .stream
                    .play()
                    .map_err(|e| SinkError::Fatal(e.to_string()))?;
                tracing::debug!("output stream recovered");
                Ok(())
            }
            SinkError::Fatal(_) => Err(error.clone()),
        }
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        let session = self.session_mut()?;
        session.flags.draining.store(true, Ordering::SeqCst);

        while !session.producer.is_empty() {
            if let Some(msg) = session.flags.take_stream_error() {
                return Err(SinkError::Fatal(msg));
            }
            std::thread::sleep(session.poll_interval());
        }

        // The final samples left the ring during the last callback; wait for one
        // more so they have been handed to the device.
        let seen = session.flags.callbacks.load(Ordering::SeqCst);
        while session.flags.callbacks.load(Ordering::SeqCst) <= seen.saturating_add(1) {
            if let Some(msg) = session.flags.take_stream_error() {
                return Err(SinkError::Fatal(msg));
            }
            std::thread::sleep(session.poll_interval());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.device = None;
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let paused = session.stream.pause();
        drop(session);
        paused.map_err(|e| SinkError::Fatal(e.to_string()))
    }
}
