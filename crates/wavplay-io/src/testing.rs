//! Scripted in-memory sink for exercising the device and driver without hardware.
//!
//! [`FakeSink`] records every call into a shared [`FakeLog`] that stays
//! readable after the sink has been boxed into a [`PlaybackDevice`](crate::PlaybackDevice).
//!
//! ```rust
//! use wavplay_io::testing::{FakeSink, SinkCall};
//! use wavplay_io::PlaybackDevice;
//!
//! let sink = FakeSink::new();
//! let log = sink.log();
//! let mut device = PlaybackDevice::new(Box::new(sink));
//! device.initialize(44100, 1).unwrap();
//! device.close();
//! assert_eq!(log.count(&SinkCall::Close), 1);
//! ```

use crate::DeviceError;
use crate::backend::{AudioSink, NegotiatedFormat, SinkError, SinkParams};
use crate::player::CancelToken;
use std::collections::VecDeque;
use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    /// [`AudioSink::open`]
    Open,
    /// [`AudioSink::negotiate`] with the requested parameters.
    Negotiate(SinkParams),
    /// [`AudioSink::write`] with the requested frame count.
    Write(usize),
    /// [`AudioSink::recover`]
    Recover,
    /// [`AudioSink::drain`]
    Drain,
    /// [`AudioSink::close`]
    Close,
}

/// Scripted outcome for the next write, consumed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedWrite {
    /// Accept at most this many frames.
    Accept(usize),
    /// Fail with [`SinkError::Transient`].
    Transient,
    /// Fail with [`SinkError::Fatal`].
    Fatal,
}

/// Shared record of the calls a [`FakeSink`] received.
#[derive(Debug, Clone, Default)]
pub struct FakeLog {
    inner: Arc<Mutex<LogInner>>,
}

#[derive(Debug, Default)]
struct LogInner {
    calls: Vec<SinkCall>,
    samples: Vec<i16>,
}

impl FakeLog {
    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All calls in order.
    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().calls.clone()
    }

    /// How many times `call` was recorded.
    pub fn count(&self, call: &SinkCall) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    /// Requested frame counts of every write call, in order.
    pub fn writes(&self) -> Vec<usize> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Write(frames) => Some(*frames),
                _ => None,
            })
            .collect()
    }

    /// Every sample the sink accepted, in order.
    pub fn accepted_samples(&self) -> Vec<i16> {
        self.lock().samples.clone()
    }
}

/// In-memory [`AudioSink`] with scripted failures.
#[derive(Debug, Default)]
pub struct FakeSink {
    log: FakeLog,
    channels: usize,
    script: VecDeque<ScriptedWrite>,
    max_frames_per_write: Option<usize>,
    max_channels: Option<u16>,
    substitute_rate: Option<u32>,
    fail_open: bool,
    fail_recover: bool,
    fail_drain: bool,
    fail_close: bool,
    cancel_after: Option<(CancelToken, usize)>,
    rendezvous: Option<(Arc<Barrier>, usize)>,
    writes_seen: usize,
}

impl FakeSink {
    /// A sink that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the call log.
    pub fn log(&self) -> FakeLog {
        self.log.clone()
    }

    /// Report this rate from negotiation regardless of what was requested.
    pub fn with_rate_substitution(mut self, rate: u32) -> Self {
        self.substitute_rate = Some(rate);
        self
    }

    /// Reject negotiation above this channel count.
    pub fn with_max_channels(mut self, channels: u16) -> Self {
        self.max_channels = Some(channels);
        self
    }

    /// Accept at most this many frames per write.
    pub fn with_max_frames_per_write(mut self, frames: usize) -> Self {
        self.max_frames_per_write = Some(frames);
        self
    }

    /// Outcomes for the next writes; once exhausted, writes behave normally.
    pub fn with_script(mut self, script: impl IntoIterator<Item = ScriptedWrite>) -> Self {
        self.script.extend(script);
        self
    }

    /// Make [`AudioSink::open`] fail.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Make [`AudioSink::recover`] fail.
    pub fn failing_recover(mut self) -> Self {
        self.fail_recover = true;
        self
    }

    /// Make [`AudioSink::drain`] fail.
    pub fn failing_drain(mut self) -> Self {
        self.fail_drain = true;
        self
    }

    /// Make [`AudioSink::close`] fail.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Cancel `token` while the `writes`-th write call is in progress.
    pub fn cancel_after_writes(mut self, token: CancelToken, writes: usize) -> Self {
        self.cancel_after = Some((token, writes));
        self
    }

    /// Block inside the `writes`-th write call until another thread has
    /// passed `barrier` twice: once to see the write in progress, once to release it.
    pub fn with_write_rendezvous(mut self, barrier: Arc<Barrier>, writes: usize) -> Self {
        self.rendezvous = Some((barrier, writes));
        self
    }

    fn record(&self, call: SinkCall) {
        self.log.lock().calls.push(call);
    }
}

impl AudioSink for FakeSink {
    fn name(&self) -> &str {
        "fake"
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        self.record(SinkCall::Open);
        if self.fail_open {
            return Err(DeviceError::DeviceUnavailable("fake device missing".into()));
        }
        Ok(())
    }

    fn negotiate(&mut self, params: &SinkParams) -> Result<NegotiatedFormat, DeviceError> {
        self.record(SinkCall::Negotiate(*params));
        if params.channels == 0 || self.max_channels.is_some_and(|max| params.channels > max) {
            return Err(DeviceError::UnsupportedParameters(format!(
                "{} channels",
                params.channels
            )));
        }
        self.channels = params.channels as usize;
        Ok(NegotiatedFormat {
            sample_rate: self.substitute_rate.unwrap_or(params.sample_rate),
            channels: params.channels,
        })
    }

    fn write(&mut self, samples: &[i16], frames: usize) -> Result<usize, SinkError> {
        self.record(SinkCall::Write(frames));
        self.writes_seen += 1;
        if let Some((token, after)) = &self.cancel_after
            && self.writes_seen == *after
        {
            token.cancel();
        }
        if let Some((barrier, at)) = &self.rendezvous
            && self.writes_seen == *at
        {
            barrier.wait();
            barrier.wait();
        }

        let limit = match self.script.pop_front() {
            Some(ScriptedWrite::Transient) => {
                return Err(SinkError::Transient("fake underrun".into()));
            }
            Some(ScriptedWrite::Fatal) => return Err(SinkError::Fatal("fake failure".into())),
            Some(ScriptedWrite::Accept(max)) => max,
            None => self.max_frames_per_write.unwrap_or(usize::MAX),
        };
        let accepted = frames.min(limit);
        self.log
            .lock()
            .samples
            .extend_from_slice(&samples[..accepted * self.channels]);
        Ok(accepted)
    }

    fn recover(&mut self, _error: &SinkError) -> Result<(), SinkError> {
        self.record(SinkCall::Recover);
        if self.fail_recover {
            return Err(SinkError::Fatal("fake recover failed".into()));
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        self.record(SinkCall::Drain);
        if self.fail_drain {
            return Err(SinkError::Fatal("fake drain failed".into()));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.record(SinkCall::Close);
        if self.fail_close {
            return Err(SinkError::Fatal("fake close failed".into()));
        }
        Ok(())
    }
}
