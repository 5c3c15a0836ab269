// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! MPEG-4 part 2 frame splitter, also used for H.263 and XviD streams.
//!
//! After a `00 00 01` start code, the next byte classifies the unit: visual object sequence,
//! visual object and video object layer codes (top nibble 0, 1 or 2, or `B0`/`B2`/`B3`/`B5`)
//! are headers, `B6` is a VOP. The splitter additionally recognizes the short-header form
//! (`00 00` followed by a byte whose top six bits are `100000`), where a single code doubles as
//! both picture header and picture start: once a stream opens with short headers, only short
//! headers may close its frames.

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

pub(super) fn step(st: &mut SplitterState, byte: u8, want_header: bool) {
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
            } else if byte & 0xFC == 0x80 {
                st.state = NO_CODE;

                // A short header only counts as the configuration header if the stream
                // actually opened with one.
                if want_header && !st.short_header {
                    st.last_tag = Tag::Header;
                    st.headers_count += 1;
                    st.short_header = true;
                } else if !st.seek_end || st.short_header {
                    st.last_tag = Tag::Main;
                    st.main_count += 1;
                    st.short_header = true;
                }
            } else if byte == 0x0 {
                st.tmp_code_start += 1;
            } else {
                st.state = NO_CODE;
            }
        }

        _ => {
            // CODE_1X1: classify the code that followed `00 00 01`.
            if matches!(byte >> 4, 0x0 | 0x1 | 0x2)
                || matches!(byte, 0xB0 | 0xB2 | 0xB3 | 0xB5)
            {
                st.state = NO_CODE;
                st.last_tag = Tag::Header;
                st.headers_count += 1;
            } else if byte == 0xB6 {
                st.state = NO_CODE;
                st.last_tag = Tag::Main;
                st.main_count += 1;
            } else {
                st.state = NO_CODE;
            }
        }
    }
}

pub struct Mpeg4Parser {
    fourcc: Fourcc,
    input: InputStream,
    state: SplitterState,
}

impl Mpeg4Parser {
    pub fn new(fourcc: Fourcc, input: InputStream) -> Self {
        Self { fourcc, input, state: Default::default() }
    }
}

impl StreamParser for Mpeg4Parser {
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

    const VOS: &[u8] = &[0x00, 0x00, 0x01, 0xB0, 0x01];
    const VOL: &[u8] = &[0x00, 0x00, 0x01, 0x20, 0x88];
    const VOP1: &[u8] = &[0x00, 0x00, 0x01, 0xB6, 0x10, 0x77];
    const VOP2: &[u8] = &[0x00, 0x00, 0x01, 0xB6, 0x20, 0x88];

    fn parser_over(data: Vec<u8>) -> Mpeg4Parser {
        Mpeg4Parser::new(Fourcc::from(b"MPG4"), InputStream::from_bytes(data))
    }

    #[test]
    fn header_block_then_vops() {
        let mut parser = parser_over([VOS, VOL, VOP1, VOP2].concat());
        let mut dst = [0u8; 64];

        let header = parser.parse(&mut dst, true).unwrap();
        assert_eq!(header, ParsedFrame { size: 10, finished: true });
        assert_eq!(&dst[..10], &[VOS, VOL].concat()[..]);

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: VOP1.len(), finished: true });
        assert_eq!(&dst[..frame.size], VOP1);

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: VOP2.len(), finished: false });
        assert_eq!(&dst[..frame.size], VOP2);
        assert!(parser.finished());
    }

    #[test]
    fn short_header_stream() {
        // Three short-header pictures; the code is `00 00` plus a byte matching 1000 00xx.
        let stream = vec![
            0x00, 0x00, 0x80, 0x02, 0xAA, 0xBB, // picture 1
            0x00, 0x00, 0x80, 0x02, 0xCC, 0xDD, // picture 2
            0x00, 0x00, 0x80, 0x02, 0xEE, // picture 3 (truncated at end of stream)
        ];
        let mut parser = parser_over(stream);
        let mut dst = [0u8; 64];

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: 6, finished: true });
        assert_eq!(&dst[..6], &[0x00, 0x00, 0x80, 0x02, 0xAA, 0xBB]);
        assert!(parser.state.short_header);
        assert_eq!(parser.state.last_tag, Tag::Main);

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: 6, finished: true });
        assert_eq!(&dst[..6], &[0x00, 0x00, 0x80, 0x02, 0xCC, 0xDD]);
    }

    #[test]
    fn short_header_as_configuration_header() {
        let stream = vec![
            0x00, 0x00, 0x80, 0x02, 0xAA, // opening short header
            0x00, 0x00, 0x80, 0x02, 0xBB, // first picture
        ];
        let mut parser = parser_over(stream);
        let mut dst = [0u8; 64];

        // With the header request the opening short header is counted as the configuration
        // block, delimited by the next picture.
        let header = parser.parse(&mut dst, true).unwrap();
        assert_eq!(header, ParsedFrame { size: 5, finished: true });
        assert_eq!(&dst[..5], &[0x00, 0x00, 0x80, 0x02, 0xAA]);
        assert!(parser.state.short_header);
    }

    #[test]
    fn spurious_short_code_ignored_in_long_header_stream() {
        // A byte pattern that happens to look like a short header inside VOP payload must not
        // close the frame of a stream that opened with long headers.
        let stream = [
            VOS,
            VOL,
            &[0x00, 0x00, 0x01, 0xB6, 0x10, 0x00, 0x00, 0x80], // VOP 1, payload ends 00 00 80
            &[0x00, 0x00, 0x01, 0xB6, 0x20, 0x99], // VOP 2
        ]
        .concat();
        let mut parser = parser_over(stream);
        let mut dst = [0u8; 64];

        parser.parse(&mut dst, true).unwrap();

        let frame = parser.parse(&mut dst, false).unwrap();
        assert_eq!(frame, ParsedFrame { size: 8, finished: true });
        assert_eq!(&dst[..8], &[0x00, 0x00, 0x01, 0xB6, 0x10, 0x00, 0x00, 0x80]);
        assert!(!parser.state.short_header);
    }
}
