//! Streaming zstandard decode with chunk-boundary repair.
//!
//! Dump archives are read in fixed-size windows of decompressed bytes, and a
//! window can end in the middle of a multi-byte character. When that happens
//! the undecoded tail is kept and the window widens by another chunk until the
//! text decodes, bounded by a byte ceiling for the whole attempt.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use common::error::AppError;
use tracing::debug;

/// Read window sizing. `ceiling_bytes` bounds the bytes pulled for one
/// [`FrameDecoder::read_chunk`] call including widen retries and must be at
/// least twice `chunk_bytes`, so a split character always gets one retry.
#[derive(Debug, Clone, Copy)]
pub struct DecoderTuning {
    pub chunk_bytes: usize,
    pub ceiling_bytes: usize,
}

impl Default for DecoderTuning {
    fn default() -> Self {
        Self {
            chunk_bytes: 1 << 27,
            ceiling_bytes: 1 << 30,
        }
    }
}

pub struct FrameDecoder<R: Read> {
    reader: zstd::stream::read::Decoder<'static, BufReader<R>>,
    tuning: DecoderTuning,
    consumed: u64,
}

impl FrameDecoder<File> {
    pub fn open(path: &Path, tuning: DecoderTuning) -> Result<Self, AppError> {
        Self::new(File::open(path)?, tuning)
    }
}

impl<R: Read> FrameDecoder<R> {
    pub fn new(source: R, tuning: DecoderTuning) -> Result<Self, AppError> {
        if tuning.chunk_bytes == 0 {
            return Err(AppError::Validation(
                "decode chunk size must be non-zero".to_string(),
            ));
        }
        if tuning.ceiling_bytes < tuning.chunk_bytes.saturating_mul(2) {
            return Err(AppError::Validation(format!(
                "decode ceiling {} must be at least twice the chunk size {}",
                tuning.ceiling_bytes, tuning.chunk_bytes
            )));
        }

        let mut reader = zstd::stream::read::Decoder::new(source)?;
        // Dump archives are produced with long-distance matching.
        reader.window_log_max(31)?;

        Ok(Self {
            reader,
            tuning,
            consumed: 0,
        })
    }

    /// Cumulative decompressed bytes handed out, for progress display.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Next decoded text chunk, or `None` at end of stream.
    pub fn read_chunk(&mut self) -> Result<Option<String>, AppError> {
        let mut buf: Vec<u8> = Vec::with_capacity(self.tuning.chunk_bytes);

        loop {
            let start = buf.len();
            buf.resize(start + self.tuning.chunk_bytes, 0);
            let filled = read_until_full(&mut self.reader, &mut buf[start..])?;
            buf.truncate(start + filled);

            if buf.is_empty() {
                return Ok(None);
            }

            match String::from_utf8(buf) {
                Ok(text) => {
                    self.consumed += text.len() as u64;
                    return Ok(Some(text));
                }
                Err(err) => {
                    let split_at_boundary = err.utf8_error().error_len().is_none();
                    let valid_up_to = err.utf8_error().valid_up_to();
                    buf = err.into_bytes();

                    if !split_at_boundary {
                        return Err(AppError::Decode(format!(
                            "invalid UTF-8 {} bytes into the window at decompressed offset {}",
                            valid_up_to, self.consumed
                        )));
                    }
                    if filled == 0 {
                        return Err(AppError::Decode(
                            "stream ended inside a multi-byte character".to_string(),
                        ));
                    }
                    if buf.len().saturating_add(self.tuning.chunk_bytes)
                        > self.tuning.ceiling_bytes
                    {
                        return Err(AppError::Decode(format!(
                            "unable to decode window after reading {} bytes",
                            buf.len()
                        )));
                    }
                    debug!(
                        bytes = buf.len(),
                        "window ends mid-character, reading another chunk"
                    );
                }
            }
        }
    }
}

fn read_until_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
