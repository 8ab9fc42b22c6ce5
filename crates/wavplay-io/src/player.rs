//! Playback driver: chunked writes with cooperative cancellation.
//!
//! [`Player::play`] initializes the device from the header, feeds frames in
//! chunks of at most [`DEFAULT_CHUNK_FRAMES`], drains, and closes. The
//! [`CancelToken`] is checked only between chunks; a write in progress is
//! never interrupted.

use crate::device::{PlaybackDevice, WriteStatus};
use crate::wav::{FrameBuffer, WavHeader};
use crate::{DeviceError, Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Frames per write call unless configured otherwise.
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Shared cancellation flag.
///
/// Clones share the same flag, so one clone can be handed to a signal
/// handler while the player polls another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next chunk boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of a finished playback run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Frames in the decoded buffer.
    pub total_frames: usize,
    /// Frames the device accepted.
    pub frames_played: usize,
    /// Write calls issued, including ones that needed recovery.
    pub write_calls: usize,
    /// Writes that hit a transient error and were recovered.
    pub recoveries: usize,
    /// Playback stopped early because the token was cancelled.
    pub cancelled: bool,
}

type ProgressFn = Box<dyn FnMut(usize)>;

/// Drives one [`PlaybackDevice`] through a full playback.
pub struct Player {
    device: PlaybackDevice,
    cancel: CancelToken,
    chunk_frames: usize,
    progress: Option<ProgressFn>,
}

impl Player {
    /// Create a player that owns `device` and polls `cancel` between chunks.
    pub fn new(device: PlaybackDevice, cancel: CancelToken) -> Self {
        Self {
            device,
            cancel,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            progress: None,
        }
    }

    /// Set the maximum frames per write call. Zero is treated as one.
    pub fn with_chunk_frames(mut self, frames: usize) -> Self {
        self.chunk_frames = frames.max(1);
        self
    }

    /// Call `progress` with the cumulative frame position after every accepted write.
    pub fn with_progress(mut self, progress: impl FnMut(usize) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// The owned device.
    pub fn device(&self) -> &PlaybackDevice {
        &self.device
    }

    /// Play `frames` using the rate and channel count from `header`.
    ///
    /// An empty buffer returns immediately without opening the device. Once
    /// the device is initialized it is always drained (even after a write
    /// failure or cancellation) and then closed.
    pub fn play(&mut self, header: &WavHeader, frames: &FrameBuffer) -> Result<PlaybackReport> {
        let mut report = PlaybackReport {
            total_frames: frames.frame_count(),
            ..PlaybackReport::default()
        };
        if frames.is_empty() {
            tracing::info!("no audio data, nothing to play");
            return Ok(report);
        }

        self.device
            .initialize(header.sample_rate, header.channels)
            .map_err(Error::Init)?;

        let write_result = self.write_all(frames, &mut report);
        let drain_result = self.device.drain();
        self.device.close();

        tracing::info!(
            frames_played = report.frames_played,
            total_frames = report.total_frames,
            write_calls = report.write_calls,
            cancelled = report.cancelled,
            "playback finished"
        );

        match (write_result, drain_result) {
            (Err(write_err), drain) => {
                if let Err(drain_err) = drain {
                    tracing::warn!(error = %drain_err, "drain after write failure also failed");
                }
                Err(Error::Write(write_err))
            }
            (Ok(()), Err(drain_err)) => Err(Error::Drain(drain_err)),
            (Ok(()), Ok(())) => Ok(report),
        }
    }

    fn write_all(
        &mut self,
        frames: &FrameBuffer,
        report: &mut PlaybackReport,
    ) -> std::result::Result<(), DeviceError> {
        let channels = frames.channels() as usize;
        let total = frames.frame_count();
        let mut position = 0;
        // Set by a recovery; a second recovery before any frame is accepted fails the run.
        let mut recovered = false;

        while position < total {
            if self.cancel.is_cancelled() {
                tracing::info!(position, "playback cancelled");
                report.cancelled = true;
                break;
            }

            let chunk = frames.chunk(position, self.chunk_frames);
            let count = chunk.len() / channels;
            report.write_calls += 1;

            match self.device.write_frames(chunk, count)? {
                WriteStatus::Written(0) => {
                    tracing::debug!(position, "sink accepted no frames, retrying");
                }
                WriteStatus::Written(written) => {
                    position += written;
                    report.frames_played = position;
                    recovered = false;
                    if let Some(progress) = self.progress.as_mut() {
                        progress(position);
                    }
                }
                WriteStatus::Recovered => {
                    report.recoveries += 1;
                    if recovered {
                        return Err(DeviceError::Device(format!(
                            "no progress at frame {} after recovery",
                            position
                        )));
                    }
                    recovered = true;
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("device", &self.device)
            .field("chunk_frames", &self.chunk_frames)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionState;
    use crate::testing::{FakeSink, ScriptedWrite, SinkCall};

    fn mono(frames: usize) -> (WavHeader, FrameBuffer) {
        let header = WavHeader::pcm16(1, 44100, (frames * 2) as u32);
        let samples = (0..frames).map(|i| i as i16).collect();
        (header, FrameBuffer::new(samples, 1, 44100))
    }

    fn player(sink: FakeSink, cancel: CancelToken) -> Player {
        Player::new(PlaybackDevice::new(Box::new(sink)), cancel)
    }

    #[test]
    fn test_plays_in_fixed_chunks() {
        let sink = FakeSink::new();
        let log = sink.log();
        let (header, frames) = mono(2500);

        let report = player(sink, CancelToken::new())
            .play(&header, &frames)
            .unwrap();

        assert_eq!(log.writes(), vec![1024, 1024, 452]);
        assert_eq!(report.frames_played, 2500);
        assert_eq!(report.write_calls, 3);
        assert_eq!(log.count(&SinkCall::Drain), 1);
        assert_eq!(log.count(&SinkCall::Close), 1);
    }

    #[test]
    fn test_short_writes_resume_at_returned_position() {
        let sink = FakeSink::new().with_max_frames_per_write(300);
        let log = sink.log();
        let (header, frames) = mono(1000);

        let report = player(sink, CancelToken::new())
            .play(&header, &frames)
            .unwrap();

        assert_eq!(log.writes(), vec![1000, 700, 400, 100]);
        assert_eq!(report.frames_played, 1000);
        assert_eq!(log.accepted_samples(), frames.samples());
    }

    #[test]
    fn test_empty_buffer_skips_device() {
        let sink = FakeSink::new();
        let log = sink.log();
        let header = WavHeader::pcm16(1, 44100, 0);

        let report = player(sink, CancelToken::new())
            .play(&header, &FrameBuffer::empty(1, 44100))
            .unwrap();

        assert_eq!(report.total_frames, 0);
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_init_failure_reported() {
        let (header, frames) = mono(10);
        let err = player(FakeSink::new().failing_open(), CancelToken::new())
            .play(&header, &frames)
            .unwrap_err();
        assert!(matches!(err, Error::Init(DeviceError::DeviceUnavailable(_))));
    }

    #[test]
    fn test_cancel_stops_after_current_chunk_and_drains() {
        let cancel = CancelToken::new();
        let sink = FakeSink::new().cancel_after_writes(cancel.clone(), 2);
        let log = sink.log();
        let (header, frames) = mono(10_000);

        let report = player(sink, cancel).play(&header, &frames).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.write_calls, 2);
        assert_eq!(report.frames_played, 2048);
        assert_eq!(log.count(&SinkCall::Drain), 1);
        assert_eq!(log.calls().last(), Some(&SinkCall::Close));
    }

    #[test]
    fn test_cancel_before_start_still_drains() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let sink = FakeSink::new();
        let log = sink.log();
        let (header, frames) = mono(100);

        let report = player(sink, cancel).play(&header, &frames).unwrap();
        assert!(report.cancelled);
        assert!(log.writes().is_empty());
        assert_eq!(log.count(&SinkCall::Drain), 1);
    }

    #[test]
    fn test_recovered_chunk_is_retried() {
        let sink = FakeSink::new().with_script([ScriptedWrite::Transient]);
        let log = sink.log();
        let (header, frames) = mono(1500);

        let report = player(sink, CancelToken::new())
            .play(&header, &frames)
            .unwrap();

        assert_eq!(log.writes(), vec![1024, 1024, 476]);
        assert_eq!(report.recoveries, 1);
        assert_eq!(report.frames_played, 1500);
    }

    #[test]
    fn test_repeated_recovery_without_progress_fails() {
        let sink = FakeSink::new().with_script([ScriptedWrite::Transient, ScriptedWrite::Transient]);
        let log = sink.log();
        let (header, frames) = mono(1500);

        let err = player(sink, CancelToken::new())
            .play(&header, &frames)
            .unwrap_err();

        assert!(matches!(err, Error::Write(_)));
        assert_eq!(log.count(&SinkCall::Drain), 1);
        assert_eq!(log.count(&SinkCall::Close), 1);
    }

    #[test]
    fn test_zero_frame_writes_are_not_failures() {
        let sink = FakeSink::new().with_script([ScriptedWrite::Accept(0), ScriptedWrite::Accept(0)]);
        let log = sink.log();
        let (header, frames) = mono(100);

        let report = player(sink, CancelToken::new())
            .play(&header, &frames)
            .unwrap();

        assert_eq!(log.writes(), vec![100, 100, 100]);
        assert_eq!(report.frames_played, 100);
        assert_eq!(report.write_calls, 3);
        assert_eq!(report.recoveries, 0);
        assert_eq!(log.count(&SinkCall::Recover), 0);
    }

    #[test]
    fn test_progress_between_recoveries_resets_retry() {
        let sink = FakeSink::new().with_script([
            ScriptedWrite::Transient,
            ScriptedWrite::Accept(10),
            ScriptedWrite::Transient,
        ]);
        let (header, frames) = mono(100);

        let report = player(sink, CancelToken::new())
            .play(&header, &frames)
            .unwrap();

        assert_eq!(report.recoveries, 2);
        assert_eq!(report.frames_played, 100);
    }

    #[test]
    fn test_fatal_write_still_drains_and_closes() {
        let sink = FakeSink::new().with_script([ScriptedWrite::Accept(1024), ScriptedWrite::Fatal]);
        let log = sink.log();
        let (header, frames) = mono(3000);

        let mut player = player(sink, CancelToken::new());
        let err = player.play(&header, &frames).unwrap_err();

        assert!(matches!(err, Error::Write(DeviceError::Device(_))));
        assert_eq!(log.writes().len(), 2);
        assert_eq!(log.count(&SinkCall::Drain), 1);
        assert_eq!(player.device().state(), SessionState::Closed);
    }

    #[test]
    fn test_drain_failure_reported() {
        let (header, frames) = mono(10);
        let err = player(FakeSink::new().failing_drain(), CancelToken::new())
            .play(&header, &frames)
            .unwrap_err();
        assert!(matches!(err, Error::Drain(_)));
    }

    #[test]
    fn test_progress_sees_every_position() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        let (header, frames) = mono(2100);

        player(FakeSink::new(), CancelToken::new())
            .with_progress(move |pos| sink_seen.borrow_mut().push(pos))
            .play(&header, &frames)
            .unwrap();

        assert_eq!(*seen.borrow(), vec![1024, 2048, 2100]);
    }

    #[test]
    fn test_custom_chunk_size() {
        let sink = FakeSink::new();
        let log = sink.log();
        let (header, frames) = mono(10);

        player(sink, CancelToken::new())
            .with_chunk_frames(4)
            .play(&header, &frames)
            .unwrap();
        assert_eq!(log.writes(), vec![4, 4, 2]);
    }
}
