//! Lazy line framing over a decoding stream.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use common::error::AppError;
use tracing::debug;

use crate::decode::{DecoderTuning, FrameDecoder};

/// Pull-based iterator over the complete lines of one archive, paired with
/// the decompressed byte offset reached so far (progress display only).
///
/// The last fragment of a chunk is carried over until its newline arrives. A
/// final fragment that never gets one is dropped at end of stream: dump
/// records are newline-terminated, so anything left is a truncated tail.
/// Forward-only; a new framer is needed per file.
pub struct LineFramer<R: Read> {
    decoder: FrameDecoder<R>,
    carry: String,
    ready: VecDeque<String>,
    offset: u64,
    finished: bool,
}

impl LineFramer<File> {
    pub fn open(path: &Path, tuning: DecoderTuning) -> Result<Self, AppError> {
        Ok(Self::new(FrameDecoder::open(path, tuning)?))
    }
}

impl<R: Read> LineFramer<R> {
    pub fn new(decoder: FrameDecoder<R>) -> Self {
        Self {
            decoder,
            carry: String::new(),
            ready: VecDeque::new(),
            offset: 0,
            finished: false,
        }
    }

    /// Decodes chunks until at least one complete line is buffered. Returns
    /// `false` once the stream is exhausted.
    fn refill(&mut self) -> Result<bool, AppError> {
        while self.ready.is_empty() {
            match self.decoder.read_chunk()? {
                Some(chunk) => {
                    self.carry.push_str(&chunk);
                    self.offset = self.decoder.consumed();

                    if let Some((complete, rest)) = self.carry.rsplit_once('\n') {
                        for line in complete.split('\n') {
                            self.ready.push_back(line.trim().to_owned());
                        }
                        self.carry = rest.to_owned();
                    }
                }
                None => {
                    if !self.carry.is_empty() {
                        debug!(
                            dropped_bytes = self.carry.len(),
                            "discarding trailing fragment without a newline"
                        );
                        self.carry.clear();
                    }
                    self.finished = true;
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for LineFramer<R> {
    type Item = Result<(String, u64), AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(line) = self.ready.pop_front() {
            return Some(Ok((line, self.offset)));
        }
        if self.finished {
            return None;
        }
        match self.refill() {
            Ok(true) => self.ready.pop_front().map(|line| Ok((line, self.offset))),
            Ok(false) => None,
            Err(err) => {
                // A decode failure fuses the iterator; the file is abandoned.
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
