// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! VP8 frame reader for IVF files.
//!
//! IVF is a trivial container: a 32-byte file header starting with `DKIF`, then one 12-byte
//! header per frame of which only the leading little-endian frame size is honored. There are no
//! start codes to scan for, so every record is a complete frame.

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use super::ParseError;
use super::ParsedFrame;
use super::StreamParser;
use crate::input::InputStream;
use crate::Fourcc;

const FILE_HEADER_LEN: usize = 32;
const FRAME_HEADER_LEN: usize = 12;
const SIGNATURE: &[u8; 4] = b"DKIF";

pub struct IvfParser {
    input: InputStream,
}

impl IvfParser {
    pub fn new(input: InputStream) -> Self {
        Self { input }
    }
}

impl StreamParser for IvfParser {
    fn pixel_format(&self) -> Fourcc {
        Fourcc::from(b"VP80")
    }

    fn parse(&mut self, dst: &mut [u8], want_header: bool) -> Result<ParsedFrame, ParseError> {
        let mut idx = 0;

        let mut signature = [0u8; 4];
        if self.input.read_at(&mut signature, 0).is_ok() && &signature == SIGNATURE {
            idx += FILE_HEADER_LEN;
        }

        let mut header = [0u8; FRAME_HEADER_LEN];
        if self.input.read_at(&mut header, idx).is_err() {
            // Truncated trailing record. Consume the leftovers so the stream reads as finished.
            let leftover = self.input.len() - self.input.position();
            self.input.advance(leftover);
            return Ok(ParsedFrame { size: 0, finished: true });
        }
        idx += FRAME_HEADER_LEN;

        let frame_size = LittleEndian::read_u32(&header[..4]) as usize;
        if dst.len() < frame_size {
            return Err(ParseError::FrameTooLarge { needed: frame_size, capacity: dst.len() });
        }

        let available = self.input.len().saturating_sub(self.input.position() + idx);
        let size = std::cmp::min(frame_size, available);
        self.input.read_at(&mut dst[..size], idx)?;

        // A header request leaves the cursor alone, so the first frame is fed to the decoder a
        // second time together with its payload.
        if want_header {
            return Ok(ParsedFrame { size, finished: true });
        }

        self.input.advance(idx + frame_size);
        Ok(ParsedFrame { size, finished: true })
    }

    fn reset(&mut self) {
        self.input.rewind();
    }

    fn finished(&self) -> bool {
        self.input.eof()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ivf_stream(frames: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();

        data.extend_from_slice(SIGNATURE);
        data.extend_from_slice(&[0, 0]); // version
        data.extend_from_slice(&[32, 0]); // header length
        data.extend_from_slice(b"VP80");
        data.extend_from_slice(&[0; 2]); // width
        data.extend_from_slice(&[0; 2]); // height
        data.extend_from_slice(&[0; 4]); // frame rate
        data.extend_from_slice(&[0; 4]); // time scale
        data.extend_from_slice(&(frames.len() as u32).to_le_bytes());
        data.extend_from_slice(&[0; 4]); // unused

        for (i, frame) in frames.iter().enumerate() {
            data.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            data.extend_from_slice(&(i as u64).to_le_bytes()); // timestamp
            data.extend_from_slice(frame);
        }

        data
    }

    #[test]
    fn frames_are_extracted_in_order() {
        let stream = ivf_stream(&[&[0xAA, 0xBB, 0xCC], &[0x11, 0x22]]);
        let mut parser = IvfParser::new(InputStream::from_bytes(stream));
        let mut dst = [0u8; 64];

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: 3, finished: true });
        assert_eq!(&dst[..3], &[0xAA, 0xBB, 0xCC]);

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: 2, finished: true });
        assert_eq!(&dst[..2], &[0x11, 0x22]);

        assert!(parser.finished());
    }

    #[test]
    fn header_request_does_not_consume() {
        let stream = ivf_stream(&[&[0xAA, 0xBB]]);
        let mut parser = IvfParser::new(InputStream::from_bytes(stream));
        let mut dst = [0u8; 64];

        let header = parser.parse(&mut dst, true).unwrap();
        assert_eq!(header.size, 2);

        // The first real parse re-reads the same frame.
        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame.size, 2);
        assert_eq!(&dst[..2], &[0xAA, 0xBB]);
    }

    #[test]
    fn oversized_frame_is_an_error() {
        let stream = ivf_stream(&[&[0u8; 32]]);
        let mut parser = IvfParser::new(InputStream::from_bytes(stream));
        let mut dst = [0u8; 8];

        assert!(matches!(
            parser.parse(&mut dst, false),
            Err(ParseError::FrameTooLarge { needed: 32, capacity: 8 })
        ));
    }

    #[test]
    fn truncated_trailing_record() {
        let mut stream = ivf_stream(&[&[0xAA, 0xBB]]);
        stream.extend_from_slice(&[0x02, 0x00, 0x00]); // half a frame header

        let mut parser = IvfParser::new(InputStream::from_bytes(stream));
        let mut dst = [0u8; 64];

        parser.parse(&mut dst, false).unwrap();
        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: 0, finished: true });
        assert!(parser.finished());
    }
}
