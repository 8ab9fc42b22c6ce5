//! Playback session state machine over an [`AudioSink`].

use crate::DeviceError;
use crate::backend::{AudioSink, NegotiatedFormat, SinkError, SinkParams};

/// Lifecycle of the output session.
///
/// `Uninitialized -> Ready -> (write)* -> Draining -> Closed`. A closed device
/// accepts a fresh [`PlaybackDevice::initialize`] just like a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been opened yet.
    Uninitialized,
    /// Format negotiated; writes are accepted.
    Ready,
    /// A drain has been issued; no further writes.
    Draining,
    /// The sink has been released.
    Closed,
}

/// Result of a single [`PlaybackDevice::write_frames`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The sink accepted this many frames (possibly fewer than requested).
    Written(usize),
    /// The sink hit a transient error and was recovered; nothing was written
    /// and the same chunk should be written again.
    Recovered,
}

/// Owner of the single live output session.
///
/// Dropping the device closes the session.
pub struct PlaybackDevice {
    sink: Box<dyn AudioSink>,
    state: SessionState,
    format: Option<NegotiatedFormat>,
}

impl PlaybackDevice {
    /// Wrap a sink. No device is opened until [`initialize`](Self::initialize).
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            state: SessionState::Uninitialized,
            format: None,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Format agreed with the sink, while a session is active.
    pub fn format(&self) -> Option<NegotiatedFormat> {
        self.format
    }

    /// Name of the underlying sink.
    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Ready | SessionState::Draining)
    }

    /// Open the sink and negotiate interleaved 16-bit output.
    ///
    /// The hardware may substitute a nearby sample rate; that is logged, not
    /// an error. On negotiation failure the opened sink is released before
    /// the error is returned. Calling this on an active session closes it first.
    pub fn initialize(
        &mut self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<NegotiatedFormat, DeviceError> {
        if self.is_active() {
            tracing::debug!("re-initializing active session");
            self.close();
        }

        self.sink.open()?;

        let params = SinkParams {
            sample_rate,
            channels,
        };
        let format = match self.sink.negotiate(&params) {
            Ok(format) => format,
            Err(err) => {
                if let Err(close_err) = self.sink.close() {
                    tracing::warn!(error = %close_err, "failed to release sink after negotiation error");
                }
                self.state = SessionState::Closed;
                return Err(err);
            }
        };

        if format.sample_rate != sample_rate {
            tracing::warn!(
                requested = sample_rate,
                actual = format.sample_rate,
                "sample rate not available, using nearest supported rate"
            );
        }
        tracing::info!(
            sink = self.sink.name(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            "playback device ready"
        );

        self.format = Some(format);
        self.state = SessionState::Ready;
        Ok(format)
    }

    /// Write `frame_count` interleaved frames from `samples`.
    ///
    /// Returns `Written(0)` for a zero count without touching the session. A
    /// short write is normal: advance by the returned count and write the rest.
    /// On a transient sink error exactly one recovery is attempted; success
    /// yields [`WriteStatus::Recovered`], failure a fatal [`DeviceError::Device`].
    pub fn write_frames(
        &mut self,
        samples: &[i16],
        frame_count: usize,
    ) -> Result<WriteStatus, DeviceError> {
        if frame_count == 0 {
            return Ok(WriteStatus::Written(0));
        }
        if self.state != SessionState::Ready {
            return Err(DeviceError::NotInitialized);
        }
        let channels = self.format.map_or(1, |f| f.channels as usize);
        let needed = frame_count * channels;
        if samples.len() < needed {
            return Err(DeviceError::BufferTooShort {
                expected: needed,
                actual: samples.len(),
            });
        }

        match self.sink.write(&samples[..needed], frame_count) {
            Ok(written) => {
                if written < frame_count {
                    tracing::debug!(written, requested = frame_count, "short write");
                }
                Ok(WriteStatus::Written(written))
            }
            Err(err @ SinkError::Transient(_)) => {
                tracing::warn!(error = %err, "write failed, attempting recovery");
                match self.sink.recover(&err) {
                    Ok(()) => Ok(WriteStatus::Recovered),
                    Err(recover_err) => Err(DeviceError::Device(format!(
                        "recover failed: {}",
                        recover_err
                    ))),
                }
            }
            Err(SinkError::Fatal(msg)) => Err(DeviceError::Device(msg)),
        }
    }

    /// Block until all written frames have been rendered.
    pub fn drain(&mut self) -> Result<(), DeviceError> {
        if !self.is_active() {
            return Err(DeviceError::NotInitialized);
        }
        self.state = SessionState::Draining;
        self.sink
            .drain()
            .map_err(|e| DeviceError::Device(format!("failed to drain: {}", e)))
    }

    /// Release the session. Safe to call any number of times, in any state.
    ///
    /// Sink errors are logged and swallowed.
    pub fn close(&mut self) {
        if !self.is_active() {
            return;
        }
        if let Err(err) = self.sink.close() {
            tracing::warn!(error = %err, "failed to close playback device");
        }
        self.state = SessionState::Closed;
        self.format = None;
    }
}

impl Drop for PlaybackDevice {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PlaybackDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackDevice")
            .field("sink", &self.sink.name())
            .field("state", &self.state)
            .field("format", &self.format)
            .finish()
    }
}
