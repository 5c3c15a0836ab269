// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! H.264 Annex B frame splitter.
//!
//! Recognizes three- and four-byte start codes (`00 00 01` / `00 00 00 01`). The byte after the
//! start code is the NAL header: types 1 and 5 are slice candidates, types 6, 7 and 8 (SEI, SPS,
//! PPS) are headers. A slice candidate only counts as the start of a new picture if the
//! following byte has its high bit set, i.e. `first_mb_in_slice` is 0. That check separates a
//! picture boundary from a continuation slice.

use super::ParseError;
use super::ParsedFrame;
use super::SplitterState;
use super::StreamParser;
use super::Tag;
use crate::input::InputStream;
use crate::Fourcc;

const NO_CODE: u8 = 0;
const CODE_0X1: u8 = 1;
const CODE_0X2: u8 = 2;
const CODE_0X3: u8 = 3;
const CODE_1X1: u8 = 4;
const CODE_SLICE: u8 = 5;

pub(super) fn step(st: &mut SplitterState, byte: u8, _want_header: bool) {
    match st.state {
        NO_CODE => {
            if byte == 0x0 {
                st.state = CODE_0X1;
                st.tmp_code_start = st.pos;
            }
        }

        CODE_0X1 => {
            st.state = if byte == 0x0 { CODE_0X2 } else { NO_CODE };
        }

        CODE_0X2 => {
            st.state = match byte {
                0x1 => CODE_1X1,
                0x0 => CODE_0X3,
                _ => NO_CODE,
            };
        }

        CODE_0X3 => {
            if byte == 0x1 {
                st.state = CODE_1X1;
            } else if byte == 0x0 {
                // A run of zeros: the start code is the last four bytes of it.
                st.tmp_code_start += 1;
            } else {
                st.state = NO_CODE;
            }
        }

        CODE_1X1 => match byte & 0x1F {
            1 | 5 => st.state = CODE_SLICE,
            6 | 7 | 8 => {
                st.state = NO_CODE;
                st.last_tag = Tag::Header;
                st.headers_count += 1;
            }
            _ => st.state = NO_CODE,
        },

        _ => {
            // CODE_SLICE: only a first slice of a picture opens a frame boundary.
            if byte & 0x80 == 0x80 {
                st.main_count += 1;
                st.last_tag = Tag::Main;
            }
            st.state = NO_CODE;
        }
    }
}

pub struct H264Parser {
    input: InputStream,
    state: SplitterState,
}

impl H264Parser {
    pub fn new(input: InputStream) -> Self {
        Self { input, state: Default::default() }
    }
}

impl StreamParser for H264Parser {
    fn pixel_format(&self) -> Fourcc {
        Fourcc::from(b"H264")
    }

    fn parse(&mut self, dst: &mut [u8], want_header: bool) -> Result<ParsedFrame, ParseError> {
        self.state.scan(&mut self.input, dst, want_header, step)
    }

    fn reset(&mut self) {
        self.state.reset();
        self.input.rewind();
    }

    fn finished(&self) -> bool {
        self.input.eof()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SPS + PPS, an IDR slice and two P slices, four-byte start codes throughout.
    const SPS: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1E];
    const PPS: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x38, 0x80];
    const IDR: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00, 0x33, 0xFF];
    const P1: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x41, 0x9A, 0x02, 0x44];
    const P2: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x41, 0x9B, 0x03, 0x55];

    fn test_stream() -> Vec<u8> {
        [SPS, PPS, IDR, P1, P2].concat()
    }

    fn parser_over(data: Vec<u8>) -> H264Parser {
        H264Parser::new(InputStream::from_bytes(data))
    }

    #[test]
    fn header_block_then_frames() {
        let mut parser = parser_over(test_stream());
        let mut dst = [0u8; 256];

        // The header request stops right before the IDR start code and yields SPS + PPS.
        let header = parser.parse(&mut dst, true).unwrap();
        assert_eq!(header, ParsedFrame { size: 16, finished: true });
        assert_eq!(&dst[..16], &[SPS, PPS].concat()[..]);

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: IDR.len(), finished: true });
        assert_eq!(&dst[..IDR.len()], IDR);

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: P1.len(), finished: true });
        assert_eq!(&dst[..P1.len()], P1);

        // The last frame has no closing tag; it is emitted unfinished at end of stream.
        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: P2.len(), finished: false });
        assert_eq!(&dst[..P2.len()], P2);
        assert!(parser.finished());
    }

    #[test]
    fn emitted_frames_reassemble_the_stream() {
        let stream = test_stream();
        let mut parser = parser_over(stream.clone());
        let mut dst = [0u8; 256];
        let mut reassembled = Vec::new();

        loop {
            let frame = parser.parse(&mut dst, false).unwrap();
            reassembled.extend_from_slice(&dst[..frame.size]);
            if parser.finished() {
                break;
            }
        }

        // No gaps and no duplication over the whole recognized region.
        assert_eq!(reassembled, stream);
    }

    #[test]
    fn carry_over_across_frame_boundary() {
        let mut parser = parser_over(test_stream());
        let mut dst = [0u8; 256];

        parser.parse(&mut dst, true).unwrap();

        // Exactly-sized destination: the IDR fits, and the leading five bytes of the P1 start
        // code stay behind in the carry buffer.
        let frame = parser.parse(&mut dst[..IDR.len()], false).unwrap();
        assert_eq!(frame, ParsedFrame { size: IDR.len(), finished: true });
        assert_eq!(&parser.state.carry[..5], &P1[..5]);
        assert!(parser.state.code_start < 0);

        let frame = parser.parse(&mut dst[..P1.len()], false).unwrap();
        assert_eq!(&dst[..frame.size], P1);
    }

    #[test]
    fn undersized_destination_is_an_error() {
        let mut parser = parser_over(test_stream());
        let mut dst = [0u8; 8];

        assert!(matches!(
            parser.parse(&mut dst, true),
            Err(ParseError::FrameTooLarge { needed: 16, capacity: 8 })
        ));
        // The cursor was restored; a properly sized retry is not possible with the counters
        // already advanced, but the stream position itself is untouched.
        assert_eq!(parser.input.position(), 0);
    }

    #[test]
    fn three_byte_start_codes() {
        let stream = vec![
            0x00, 0x00, 0x01, 0x67, 0x42, // SPS
            0x00, 0x00, 0x01, 0x68, 0xCE, // PPS
            0x00, 0x00, 0x01, 0x65, 0x88, 0x11, // IDR
            0x00, 0x00, 0x01, 0x41, 0x9A, 0x22, // P
        ];
        let mut parser = parser_over(stream);
        let mut dst = [0u8; 64];

        let header = parser.parse(&mut dst, true).unwrap();
        assert_eq!(header, ParsedFrame { size: 10, finished: true });

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame.finished, true);
        assert_eq!(&dst[..frame.size], &[0x00, 0x00, 0x01, 0x65, 0x88, 0x11]);
    }

    #[test]
    fn continuation_slice_does_not_close_a_frame() {
        // Two slice NALs, the second with the high bit of its first payload byte clear: it
        // continues the same picture and must not end the frame.
        let stream = vec![
            0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x11, // first slice of picture
            0x00, 0x00, 0x00, 0x01, 0x65, 0x42, 0x22, // continuation slice
        ];
        let mut parser = parser_over(stream.clone());
        let mut dst = [0u8; 64];

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: stream.len(), finished: false });
        assert_eq!(&dst[..frame.size], &stream[..]);
    }

    #[test]
    fn reset_reproduces_identical_frames() {
        let mut parser = parser_over(test_stream());
        let mut dst = [0u8; 256];
        let mut first_run = Vec::new();

        loop {
            let frame = parser.parse(&mut dst, false).unwrap();
            first_run.push(dst[..frame.size].to_vec());
            if parser.finished() {
                break;
            }
        }

        parser.reset();

        let mut second_run = Vec::new();
        loop {
            let frame = parser.parse(&mut dst, false).unwrap();
            second_run.push(dst[..frame.size].to_vec());
            if parser.finished() {
                break;
            }
        }

        assert_eq!(first_run, second_run);
    }
}
