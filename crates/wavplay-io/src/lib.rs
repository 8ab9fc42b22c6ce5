//! WAV decoding and blocking PCM playback for wavplay.
//!
//! This crate provides:
//!
//! - **WAV decoding**: [`parse_header`] and [`read_frames`] turn a byte source into a
//!   validated [`WavHeader`] and an interleaved 16-bit [`FrameBuffer`]
//! - **Audio sinks**: the [`AudioSink`] capability and its cpal implementation [`CpalSink`]
//! - **Playback device**: [`PlaybackDevice`], the session state machine over a sink
//! - **Playback driver**: [`Player`], the chunked write loop with cancellation and drain
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wavplay_io::{CancelToken, CpalSink, PlaybackDevice, Player, load};
//!
//! let (header, frames) = load("input.wav")?;
//! let device = PlaybackDevice::new(Box::new(CpalSink::default()));
//! let mut player = Player::new(device, CancelToken::new());
//! let report = player.play(&header, &frames)?;
//! println!("played {} of {} frames", report.frames_played, report.total_frames);
//! ```

pub mod backend;
pub mod cpal_backend;
mod device;
mod devices;
mod player;
pub mod testing;
mod wav;

pub use backend::{AudioSink, NegotiatedFormat, SinkError, SinkParams};
pub use cpal_backend::CpalSink;
pub use device::{PlaybackDevice, SessionState, WriteStatus};
pub use devices::{AudioDevice, list_output_devices};
pub use player::{CancelToken, DEFAULT_CHUNK_FRAMES, PlaybackReport, Player};
pub use wav::{
    BITS_PER_SAMPLE_16, FORMAT_PCM, FrameBuffer, HEADER_LEN, WavHeader, load, parse_header,
    read_frames,
};

use std::path::PathBuf;

/// Errors produced while decoding a WAV byte source.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The source could not be read, or ended before the expected byte count.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One of the RIFF/WAVE/fmt/data tags did not match.
    #[error("invalid WAV file: {0}")]
    InvalidFormat(String),

    /// The header describes a frame layout that cannot be decoded.
    #[error("invalid WAV header: {0}")]
    InvalidHeader(String),

    /// The payload is not 16-bit integer PCM.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Errors produced by the playback device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// No output sink could be opened.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The sink rejected the access mode, sample format, or channel count.
    #[error("unsupported parameters: {0}")]
    UnsupportedParameters(String),

    /// An operation was invoked outside an active session.
    #[error("audio device not initialized")]
    NotInitialized,

    /// The caller passed fewer samples than the requested frame count needs.
    #[error("buffer holds {actual} samples, {expected} needed")]
    BufferTooShort {
        /// Samples required for the requested frame count.
        expected: usize,
        /// Samples actually supplied.
        actual: usize,
    },

    /// Fatal write or drain failure.
    #[error("{0}")]
    Device(String),
}

/// Pipeline error naming the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input file could not be opened.
    #[error("could not open {}: {source}", path.display())]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Header parsing failed.
    #[error("could not load WAV header: {0}")]
    Header(DecodeError),

    /// Frame extraction failed.
    #[error("could not load WAV data: {0}")]
    Data(DecodeError),

    /// The output device could not be initialized.
    #[error("could not initialize audio playback: {0}")]
    Init(DeviceError),

    /// A chunk write failed and could not be recovered.
    #[error("error playing audio frames: {0}")]
    Write(DeviceError),

    /// Draining queued frames failed.
    #[error("error draining audio playback: {0}")]
    Drain(DeviceError),

    /// Device enumeration or other device failure outside a session.
    #[error("audio device error: {0}")]
    Device(#[from] DeviceError),
}

/// Convenience result type for playback operations.
pub type Result<T> = std::result::Result<T, Error>;
