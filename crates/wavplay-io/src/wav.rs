//! WAV header parsing and PCM frame extraction.
//!
//! Decoding happens in two phases. [`parse_header`] reads the fixed 44-byte
//! canonical header and checks only the four chunk tags. [`read_frames`] then
//! checks the payload description (format code, bit depth, frame layout) and
//! reads the sample data. A file can therefore carry a well-formed container
//! around an unsupported payload; that is reported by the second phase.

use crate::{DecodeError, Error, Result};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

/// Size in bytes of the canonical RIFF/WAVE header.
pub const HEADER_LEN: usize = 44;

/// `audio_format` code for integer PCM.
pub const FORMAT_PCM: u16 = 1;

/// The only supported bit depth.
pub const BITS_PER_SAMPLE_16: u16 = 16;

const RIFF_ID: [u8; 4] = *b"RIFF";
const WAVE_ID: [u8; 4] = *b"WAVE";
const FMT_ID: [u8; 4] = *b"fmt ";
const DATA_ID: [u8; 4] = *b"data";

const BYTES_PER_SAMPLE: usize = 2;

/// Canonical WAV header, as laid out in the first 44 bytes of the file.
///
/// All multi-byte fields are little-endian on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Container tag, `"RIFF"`.
    pub riff_id: [u8; 4],
    /// Size of the file minus 8 bytes.
    pub riff_size: u32,
    /// Format tag, `"WAVE"`.
    pub wave_id: [u8; 4],
    /// Format sub-chunk tag, `"fmt "`.
    pub fmt_id: [u8; 4],
    /// Size of the format sub-chunk body.
    pub fmt_size: u32,
    /// Audio format code (1 = integer PCM).
    pub audio_format: u16,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bytes per second.
    pub byte_rate: u32,
    /// Bytes per frame across all channels.
    pub block_align: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
    /// Data sub-chunk tag, `"data"`.
    pub data_id: [u8; 4],
    /// Length of the PCM payload in bytes.
    pub data_size: u32,
}

impl WavHeader {
    /// Build a canonical header for 16-bit integer PCM.
    ///
    /// # Example
    /// ```
    /// use wavplay_io::WavHeader;
    ///
    /// let header = WavHeader::pcm16(2, 48000, 19200);
    /// assert_eq!(header.block_align, 4);
    /// assert_eq!(header.byte_rate, 192_000);
    /// ```
    pub fn pcm16(channels: u16, sample_rate: u32, data_size: u32) -> Self {
        let block_align = channels.saturating_mul(BITS_PER_SAMPLE_16 / 8);
        Self {
            riff_id: RIFF_ID,
            riff_size: data_size.saturating_add(HEADER_LEN as u32 - 8),
            wave_id: WAVE_ID,
            fmt_id: FMT_ID,
            fmt_size: 16,
            audio_format: FORMAT_PCM,
            channels,
            sample_rate,
            byte_rate: sample_rate.saturating_mul(block_align as u32),
            block_align,
            bits_per_sample: BITS_PER_SAMPLE_16,
            data_id: DATA_ID,
            data_size,
        }
    }

    /// Serialize to the on-disk 44-byte layout.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.riff_id);
        out[4..8].copy_from_slice(&self.riff_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.wave_id);
        out[12..16].copy_from_slice(&self.fmt_id);
        out[16..20].copy_from_slice(&self.fmt_size.to_le_bytes());
        out[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(&self.data_id);
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }

    fn from_bytes(b: &[u8; HEADER_LEN]) -> Self {
        let tag = |at: usize| [b[at], b[at + 1], b[at + 2], b[at + 3]];
        let u16_at = |at: usize| u16::from_le_bytes([b[at], b[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]]);

        Self {
            riff_id: tag(0),
            riff_size: u32_at(4),
            wave_id: tag(8),
            fmt_id: tag(12),
            fmt_size: u32_at(16),
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_id: tag(36),
            data_size: u32_at(40),
        }
    }

    /// Number of whole frames described by `data_size`, or 0 if `block_align` is 0.
    pub fn frame_count(&self) -> usize {
        if self.block_align == 0 {
            0
        } else {
            self.data_size as usize / self.block_align as usize
        }
    }
}

/// Interleaved 16-bit PCM samples decoded from a WAV payload.
///
/// Holds exactly `frame_count() * channels()` samples. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
}

impl FrameBuffer {
    /// Wrap interleaved samples. Trailing samples that do not fill a whole frame are dropped.
    pub fn new(mut samples: Vec<i16>, channels: u16, sample_rate: u32) -> Self {
        let ch = channels.max(1) as usize;
        samples.truncate(samples.len() / ch * ch);
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    /// A buffer holding no frames.
    pub fn empty(channels: u16, sample_rate: u32) -> Self {
        Self::new(Vec::new(), channels, sample_rate)
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Channels per frame.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Sample rate the frames were recorded at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// `true` when there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length in seconds at the recorded rate.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Samples for up to `max_frames` frames starting at frame `position`.
    ///
    /// Returns an empty slice once `position` reaches the end.
    pub fn chunk(&self, position: usize, max_frames: usize) -> &[i16] {
        let ch = self.channels as usize;
        let start = position.min(self.frame_count()) * ch;
        let end = position
            .saturating_add(max_frames)
            .min(self.frame_count())
            * ch;
        &self.samples[start..end]
    }
}

/// Read and tag-check the fixed header from `source`.
///
/// Fails with [`DecodeError::Io`] if fewer than [`HEADER_LEN`] bytes are available
/// and with [`DecodeError::InvalidFormat`] if any of the four tags is wrong.
/// Audio format and bit depth are not inspected here; see [`read_frames`].
pub fn parse_header<R: Read>(source: &mut R) -> std::result::Result<WavHeader, DecodeError> {
    let mut raw = [0u8; HEADER_LEN];
    source.read_exact(&mut raw)?;
    let header = WavHeader::from_bytes(&raw);

    for (found, expected, what) in [
        (header.riff_id, RIFF_ID, "container"),
        (header.wave_id, WAVE_ID, "format"),
        (header.fmt_id, FMT_ID, "fmt chunk"),
        (header.data_id, DATA_ID, "data chunk"),
    ] {
        if found != expected {
            return Err(DecodeError::InvalidFormat(format!(
                "{} tag is {:?}, expected {:?}",
                what,
                String::from_utf8_lossy(&found),
                String::from_utf8_lossy(&expected)
            )));
        }
    }

    tracing::debug!(
        channels = header.channels,
        sample_rate = header.sample_rate,
        bits_per_sample = header.bits_per_sample,
        data_size = header.data_size,
        "parsed WAV header"
    );
    Ok(header)
}

/// Read the PCM payload described by `header` from `source`.
///
/// The source must be positioned right after the header. A zero `data_size`
/// yields an empty buffer, not an error.
pub fn read_frames<R: Read>(
    source: &mut R,
    header: &WavHeader,
) -> std::result::Result<FrameBuffer, DecodeError> {
    if header.audio_format != FORMAT_PCM {
        return Err(DecodeError::UnsupportedFormat(format!(
            "audio format {} is not integer PCM",
            header.audio_format
        )));
    }
    if header.bits_per_sample != BITS_PER_SAMPLE_16 {
        return Err(DecodeError::UnsupportedFormat(format!(
            "{}-bit samples, only 16-bit is supported",
            header.bits_per_sample
        )));
    }
    if header.data_size == 0 {
        return Ok(FrameBuffer::empty(header.channels, header.sample_rate));
    }
    if header.block_align == 0 {
        return Err(DecodeError::InvalidHeader("block_align is 0".to_string()));
    }
    if header.channels == 0 {
        return Err(DecodeError::InvalidHeader("channel count is 0".to_string()));
    }
    if header.sample_rate == 0 {
        return Err(DecodeError::InvalidHeader("sample rate is 0".to_string()));
    }
    let expected_align = header.channels as usize * BYTES_PER_SAMPLE;
    if header.block_align as usize != expected_align {
        return Err(DecodeError::InvalidHeader(format!(
            "block_align {} does not match {} channel(s) of 16-bit samples",
            header.block_align, header.channels
        )));
    }

    let data_size = header.data_size as usize;
    let mut bytes = Vec::new();
    source
        .by_ref()
        .take(data_size as u64)
        .read_to_end(&mut bytes)?;
    if bytes.len() < data_size {
        return Err(DecodeError::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("expected {} bytes of audio data, found {}", data_size, bytes.len()),
        )));
    }

    let frame_count = header.frame_count();
    let samples: Vec<i16> = bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .take(frame_count * header.channels as usize)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    tracing::debug!(frames = frame_count, "read WAV data");
    Ok(FrameBuffer::new(samples, header.channels, header.sample_rate))
}

/// Open `path` and decode it in both phases.
///
/// The file is closed before this returns. Errors name the stage that failed.
pub fn load<P: AsRef<Path>>(path: P) -> Result<(WavHeader, FrameBuffer)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let header = parse_header(&mut reader).map_err(Error::Header)?;
    let frames = read_frames(&mut reader, &header).map_err(Error::Data)?;
    Ok((header, frames))
}
