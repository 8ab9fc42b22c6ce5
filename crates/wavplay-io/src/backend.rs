//! Audio sink capability.
//!
//! This module defines the [`AudioSink`] trait, the narrow surface the playback
//! device needs from a platform audio API. The default implementation wraps
//! [cpal](https://crates.io/crates/cpal) ([`CpalSink`](crate::CpalSink)); tests
//! substitute [`FakeSink`](crate::testing::FakeSink).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │             Player               │
//! │  chunked writes, cancel, drain   │
//! └──────────────┬───────────────────┘
//!                │ owns
//!                ▼
//! ┌──────────────────────────────────┐
//! │         PlaybackDevice           │
//! │  session state, one recovery     │
//! └──────────────┬───────────────────┘
//!                │ Box<dyn AudioSink>
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌─────────────┐
//! │  CpalSink   │  │  FakeSink   │
//! │  (default)  │  │  (tests)    │
//! └─────────────┘  └─────────────┘
//! ```
//!
//! The trait is object-safe so the device can hold any sink behind a box.
//! Sink results are tagged: a [`SinkError::Transient`] failure may be recovered
//! in place with [`AudioSink::recover`], a [`SinkError::Fatal`] one may not.

use crate::DeviceError;

/// Requested output format. Access is always interleaved signed 16-bit little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkParams {
    /// Requested sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channels per frame.
    pub channels: u16,
}

/// Format the sink actually agreed to.
///
/// `sample_rate` may differ from the requested rate when the hardware
/// substitutes the nearest rate it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    /// Sample rate in Hz the sink will run at.
    pub sample_rate: u32,
    /// Interleaved channels per frame.
    pub channels: u16,
}

/// Failure reported by a sink operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Temporary condition such as a buffer underrun; worth one recovery attempt.
    #[error("transient sink error: {0}")]
    Transient(String),

    /// Unrecoverable failure.
    #[error("fatal sink error: {0}")]
    Fatal(String),
}

/// Platform audio output capability.
///
/// A sink is opened, negotiated, written to, drained and closed by a single
/// owner. Implementations do not need to track session state; the
/// [`PlaybackDevice`](crate::PlaybackDevice) only calls each method in a valid order.
pub trait AudioSink {
    /// Human-readable name of this sink (e.g., "cpal", "fake").
    fn name(&self) -> &str;

    /// Open the output device.
    ///
    /// Fails with [`DeviceError::DeviceUnavailable`] when nothing can be opened.
    fn open(&mut self) -> Result<(), DeviceError>;

    /// Negotiate interleaved S16LE access at `params.channels` and a rate as
    /// close as possible to `params.sample_rate`, then prepare for writes.
    ///
    /// Fails with [`DeviceError::UnsupportedParameters`] when the access mode,
    /// sample format or channel count cannot be honored.
    fn negotiate(&mut self, params: &SinkParams) -> Result<NegotiatedFormat, DeviceError>;

    /// Write up to `frames` interleaved frames from `samples`, blocking on backpressure.
    ///
    /// Returns the number of frames accepted, which may be less than `frames`.
    fn write(&mut self, samples: &[i16], frames: usize) -> Result<usize, SinkError>;

    /// Attempt to return to a writable state after `error`.
    fn recover(&mut self, error: &SinkError) -> Result<(), SinkError>;

    /// Block until every accepted frame has been rendered.
    fn drain(&mut self) -> Result<(), SinkError>;

    /// Release the device.
    fn close(&mut self) -> Result<(), SinkError>;
}
