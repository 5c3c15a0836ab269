// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! MPEG-1/MPEG-2 frame splitter.
//!
//! After a `00 00 01` start code, `B3` (sequence header) and `B8` (GOP header) are headers and
//! `00` is a picture start.

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
const CODE_1X1: u8 = 3;

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
            if byte == 0x1 {
                st.state = CODE_1X1;
            } else if byte == 0x0 {
                st.tmp_code_start += 1;
            } else {
                st.state = NO_CODE;
            }
        }

        _ => {
            // CODE_1X1
            if byte == 0xB3 || byte == 0xB8 {
                st.state = NO_CODE;
                st.last_tag = Tag::Header;
                st.headers_count += 1;
            } else if byte == 0x00 {
                st.state = NO_CODE;
                st.last_tag = Tag::Main;
                st.main_count += 1;
            } else {
                st.state = NO_CODE;
            }
        }
    }
}

pub struct Mpeg2Parser {
    fourcc: Fourcc,
    input: InputStream,
    state: SplitterState,
}

impl Mpeg2Parser {
    pub fn new(fourcc: Fourcc, input: InputStream) -> Self {
        Self { fourcc, input, state: Default::default() }
    }
}

impl StreamParser for Mpeg2Parser {
    fn pixel_format(&self) -> Fourcc {
        self.fourcc
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

    const SEQ: &[u8] = &[0x00, 0x00, 0x01, 0xB3, 0x12, 0x34];
    const GOP: &[u8] = &[0x00, 0x00, 0x01, 0xB8, 0x56];
    const PIC1: &[u8] = &[0x00, 0x00, 0x01, 0x00, 0xAA, 0xBB];
    const PIC2: &[u8] = &[0x00, 0x00, 0x01, 0x00, 0xCC];

    fn parser_over(data: Vec<u8>) -> Mpeg2Parser {
        Mpeg2Parser::new(Fourcc::from(b"MPG2"), InputStream::from_bytes(data))
    }

    #[test]
    fn sequence_and_gop_form_the_header_block() {
        let mut parser = parser_over([SEQ, GOP, PIC1, PIC2].concat());
        let mut dst = [0u8; 64];

        let header = parser.parse(&mut dst, true).unwrap();
        assert_eq!(header, ParsedFrame { size: 11, finished: true });
        assert_eq!(&dst[..11], &[SEQ, GOP].concat()[..]);

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: PIC1.len(), finished: true });
        assert_eq!(&dst[..frame.size], PIC1);

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: PIC2.len(), finished: false });
        assert_eq!(&dst[..frame.size], PIC2);
        assert!(parser.finished());
    }

    #[test]
    fn gop_header_closes_a_picture() {
        // Picture, then a GOP header opening the next frame: the GOP belongs to the next frame
        // and its start code delimits the current one.
        let stream = [PIC1, GOP, PIC2].concat();
        let mut parser = parser_over(stream);
        let mut dst = [0u8; 64];

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: PIC1.len(), finished: true });
        assert_eq!(&dst[..frame.size], PIC1);

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: GOP.len() + PIC2.len(), finished: false });
        assert_eq!(&dst[..frame.size], &[GOP, PIC2].concat()[..]);
    }
}
