// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunked-Transfer Decoder
//!
//! Strips an HTTP `Transfer-Encoding: chunked` envelope from an upload
//! source, yielding only the payload bytes. The decoder is an incremental
//! state machine: input may be fragmented at any byte position, including
//! inside a size line or a CRLF. Chunk extensions (after `;`) and trailer
//! headers are consumed and discarded.
//!
//! The envelope must terminate properly (`0\r\n`, trailers, blank line);
//! [`ChunkedDecoder::finish`] rejects truncated streams.

use bytes::Bytes;

use object_io_domain::ObjectIoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Reading the hex size line up to LF.
    SizeLine,
    /// Consuming `remaining` payload bytes.
    Data,
    /// Expecting CR then LF after a data chunk.
    DataEndCr,
    DataEndLf,
    /// Reading trailer lines; a blank line ends the envelope.
    TrailerLine,
    Done,
}

/// Incremental HTTP chunked-transfer decoder.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: DecodeState,
    line: Vec<u8>,
    remaining: u64,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::SizeLine,
            line: Vec::new(),
            remaining: 0,
        }
    }

    fn parse_size_line(line: &[u8]) -> Result<u64, ObjectIoError> {
        let hex_part = line
            .split(|&b| b == b';')
            .next()
            .unwrap_or_default();
        let text = std::str::from_utf8(hex_part)
            .map_err(|_| ObjectIoError::InvalidChunk("chunked size line is not ASCII".into()))?
            .trim();
        u64::from_str_radix(text, 16).map_err(|_| {
            ObjectIoError::InvalidChunk(format!("bad chunked size line {:?}", text))
        })
    }

    /// Consumes an input buffer, returning the payload pieces it completes.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>, ObjectIoError> {
        let mut out = Vec::new();
        let mut i = 0usize;
        while i < data.len() {
            match self.state {
                DecodeState::SizeLine => {
                    let byte = data[i];
                    i += 1;
                    if byte == b'\n' {
                        let line = std::mem::take(&mut self.line);
                        let line = line.strip_suffix(b"\r").unwrap_or(&line);
                        let size = Self::parse_size_line(line)?;
                        if size == 0 {
                            self.state = DecodeState::TrailerLine;
                        } else {
                            self.remaining = size;
                            self.state = DecodeState::Data;
                        }
                    } else {
                        self.line.push(byte);
                    }
                }
                DecodeState::Data => {
                    let take = (self.remaining as usize).min(data.len() - i);
                    out.push(Bytes::copy_from_slice(&data[i..i + take]));
                    i += take;
                    self.remaining -= take as u64;
                    if self.remaining == 0 {
                        self.state = DecodeState::DataEndCr;
                    }
                }
                DecodeState::DataEndCr => {
                    if data[i] != b'\r' {
                        return Err(ObjectIoError::InvalidChunk(
                            "missing CR after chunk payload".into(),
                        ));
                    }
                    i += 1;
                    self.state = DecodeState::DataEndLf;
                }
                DecodeState::DataEndLf => {
                    if data[i] != b'\n' {
                        return Err(ObjectIoError::InvalidChunk(
                            "missing LF after chunk payload".into(),
                        ));
                    }
                    i += 1;
                    self.state = DecodeState::SizeLine;
                }
                DecodeState::TrailerLine => {
                    let byte = data[i];
                    i += 1;
                    if byte == b'\n' {
                        let line = std::mem::take(&mut self.line);
                        let line = line.strip_suffix(b"\r").unwrap_or(&line);
                        if line.is_empty() {
                            self.state = DecodeState::Done;
                        }
                    } else {
                        self.line.push(byte);
                    }
                }
                DecodeState::Done => {
                    return Err(ObjectIoError::InvalidChunk(
                        "data after final chunked-transfer chunk".into(),
                    ));
                }
            }
        }
        Ok(out)
    }

    /// Verifies the envelope terminated cleanly.
    pub fn finish(self) -> Result<(), ObjectIoError> {
        if self.state == DecodeState::Done {
            Ok(())
        } else {
            Err(ObjectIoError::InvalidChunk(format!(
                "truncated chunked-transfer stream (state {:?})",
                self.state
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_pieces(envelope: &[u8], piece: usize) -> Result<Vec<u8>, ObjectIoError> {
        let mut decoder = ChunkedDecoder::new();
        let mut out = Vec::new();
        for part in envelope.chunks(piece) {
            for buf in decoder.push(part)? {
                out.extend_from_slice(&buf);
            }
        }
        decoder.finish()?;
        Ok(out)
    }

    const ENVELOPE: &[u8] = b"4\r\nWiki\r\n5\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\n\r\n";

    #[test]
    fn test_whole_envelope() {
        assert_eq!(
            decode_pieces(ENVELOPE, ENVELOPE.len()).unwrap(),
            b"Wikipedia in\r\n\r\nchunks."
        );
    }

    #[test]
    fn test_byte_by_byte() {
        assert_eq!(
            decode_pieces(ENVELOPE, 1).unwrap(),
            b"Wikipedia in\r\n\r\nchunks."
        );
    }

    #[test]
    fn test_extensions_and_trailers() {
        let envelope = b"5;ext=1\r\nhello\r\n0\r\nX-Trailer: yes\r\n\r\n";
        assert_eq!(decode_pieces(envelope, 3).unwrap(), b"hello");
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let mut decoder = ChunkedDecoder::new();
        decoder.push(b"5\r\nhel").unwrap();
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn test_bad_size_line_rejected() {
        let mut decoder = ChunkedDecoder::new();
        assert!(decoder.push(b"zz\r\n").is_err());
    }

    #[test]
    fn test_data_after_done_rejected() {
        let mut decoder = ChunkedDecoder::new();
        decoder.push(b"1\r\na\r\n0\r\n\r\n").unwrap();
        assert!(decoder.push(b"more").is_err());
    }
}
