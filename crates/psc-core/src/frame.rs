//! Newline-delimited JSON framing shared by every component that talks
//! over a byte stream.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;

pub const MAX_FRAME_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    Oversized { size: usize, max: usize },
    #[error("{size} buffered bytes without a frame delimiter, limit {max}")]
    DelimiterOverflow { size: usize, max: usize },
    #[error("frame encode failed: {0}")]
    Encode(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
}

pub fn encode_frame<T: Serialize>(value: &T, max_bytes: usize) -> Result<Vec<u8>, FrameError> {
    let mut encoded =
        serde_json::to_vec(value).map_err(|err| FrameError::Encode(err.to_string()))?;
    if encoded.len() > max_bytes {
        return Err(FrameError::Oversized {
            size: encoded.len(),
            max: max_bytes,
        });
    }
    encoded.push(b'\n');
    Ok(encoded)
}

pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8], max_bytes: usize) -> Result<T, FrameError> {
    let raw = trim_line(bytes);
    if raw.len() > max_bytes {
        return Err(FrameError::Oversized {
            size: raw.len(),
            max: max_bytes,
        });
    }
    serde_json::from_slice(raw).map_err(|err| FrameError::Decode(err.to_string()))
}

fn trim_line(bytes: &[u8]) -> &[u8] {
    let mut raw = bytes;
    while let [rest @ .., b'\n' | b'\r'] = raw {
        raw = rest;
    }
    raw
}

/// Everything one chunk of input produced: decoded frames plus the errors
/// for lines that did not decode. A bad line never stops the lines after it.
#[derive(Debug)]
pub struct FrameReport<T> {
    pub frames: Vec<T>,
    pub errors: Vec<FrameError>,
}

impl<T> Default for FrameReport<T> {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Incremental decoder for a feed that arrives in arbitrary chunks.
pub struct LineDecoder<T> {
    max_bytes: usize,
    buffered: Vec<u8>,
    marker: PhantomData<T>,
}

impl<T> LineDecoder<T> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            buffered: Vec::new(),
            marker: PhantomData,
        }
    }
}

impl<T> Default for LineDecoder<T> {
    fn default() -> Self {
        Self::new(MAX_FRAME_BYTES)
    }
}

impl<T: DeserializeOwned> LineDecoder<T> {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> FrameReport<T> {
        let mut report = FrameReport::default();
        self.buffered.extend_from_slice(chunk);

        while let Some(newline) = self.buffered.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffered.drain(..=newline).collect();
            self.decode_line(&line, &mut report);
        }

        if self.buffered.len() > self.max_bytes {
            report.errors.push(FrameError::DelimiterOverflow {
                size: self.buffered.len(),
                max: self.max_bytes,
            });
            self.buffered.clear();
        }

        report
    }

    /// Flushes a final unterminated line, if any. Call at end of feed.
    pub fn finish(&mut self) -> FrameReport<T> {
        let mut report = FrameReport::default();
        if !self.buffered.is_empty() {
            let line = std::mem::take(&mut self.buffered);
            self.decode_line(&line, &mut report);
        }
        report
    }

    fn decode_line(&self, line: &[u8], report: &mut FrameReport<T>) {
        if trim_line(line).is_empty() {
            return;
        }
        match decode_frame(line, self.max_bytes) {
            Ok(frame) => report.frames.push(frame),
            Err(err) => report.errors.push(err),
        }
    }
}
