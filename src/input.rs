// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Byte cursor over a memory-mapped compressed stream.
//!
//! The whole input file stays memory-resident for the lifetime of the stream, so every read is
//! plain pointer arithmetic. The cursor supports one level of save/restore, which the frame
//! splitters use to scan ahead for a frame boundary and then rewind to copy out the decided
//! range.

use std::fs::File;
use std::num::NonZeroUsize;
use std::os::fd::AsFd;
use std::path::Path;
use std::ptr::NonNull;
use std::slice;

use nix::libc::c_void;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to open input file: {0}")]
    Open(#[source] std::io::Error),
    #[error("input file is empty")]
    Empty,
    #[error("failed to map input file: {0}")]
    Map(#[source] nix::Error),
    #[error("read of {len} bytes at offset {offset} crosses the end of the stream")]
    OutOfBounds { offset: usize, len: usize },
}

enum Backing {
    Mapped { addr: NonNull<c_void>, len: usize, _file: File },
    Owned(Vec<u8>),
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            // SAFETY: the mapping was created over `len` bytes and lives until this value is
            // dropped, and the file it came from is mapped read-only and shared.
            Backing::Mapped { addr, len, .. } => unsafe {
                slice::from_raw_parts(addr.as_ptr() as *const u8, *len)
            },
            Backing::Owned(data) => data,
        }
    }
}

impl Drop for Backing {
    fn drop(&mut self) {
        if let Backing::Mapped { addr, len, .. } = self {
            // SAFETY: `addr`/`len` came from a successful mmap() call and nothing else unmaps
            // this range.
            unsafe {
                let _ = munmap(*addr, *len);
            }
        }
    }
}

// SAFETY: the backing mapping is read-only and solely owned by this value.
unsafe impl Send for Backing {}

/// Read-only byte cursor over a compressed input stream.
pub struct InputStream {
    backing: Backing,
    pos: usize,
    saved_pos: usize,
}

impl InputStream {
    /// Maps the file at `path` and places the cursor at its first byte.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, InputError> {
        let file = File::open(path).map_err(InputError::Open)?;
        let len = file.metadata().map_err(InputError::Open)?.len() as usize;
        let len_nz = NonZeroUsize::new(len).ok_or(InputError::Empty)?;

        // SAFETY: mapping a shared read-only view of a file we just opened.
        let addr = unsafe {
            mmap(None, len_nz, ProtFlags::PROT_READ, MapFlags::MAP_SHARED, file.as_fd(), 0)
                .map_err(InputError::Map)?
        };

        Ok(Self { backing: Backing::Mapped { addr, len, _file: file }, pos: 0, saved_pos: 0 })
    }

    /// Wraps an in-memory stream. Used by tests and callers that already hold the bitstream.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { backing: Backing::Owned(data), pos: 0, saved_pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.backing.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backing.as_slice().is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// The byte under the cursor, or 0 once the cursor has passed the end.
    pub fn read_byte(&self) -> u8 {
        *self.backing.as_slice().get(self.pos).unwrap_or(&0)
    }

    /// Copies `dst.len()` bytes starting `offset` bytes past the cursor, without moving it.
    pub fn read_at(&self, dst: &mut [u8], offset: usize) -> Result<(), InputError> {
        let data = self.backing.as_slice();
        let start = self.pos + offset;
        let end = start.checked_add(dst.len()).filter(|&end| end <= data.len());
        match end {
            Some(end) => {
                dst.copy_from_slice(&data[start..end]);
                Ok(())
            }
            None => Err(InputError::OutOfBounds { offset: start, len: dst.len() }),
        }
    }

    /// Moves the cursor forward by `n` bytes, saturating at the end of the stream.
    pub fn advance(&mut self, n: usize) {
        self.pos = std::cmp::min(self.pos + n, self.len());
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Remembers the current cursor. A single save slot exists; a second `save_pos` overwrites
    /// the first.
    pub fn save_pos(&mut self) {
        self.saved_pos = self.pos;
    }

    pub fn restore_pos(&mut self) {
        self.pos = self.saved_pos;
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_basics() {
        let mut input = InputStream::from_bytes(vec![0xAA, 0xBB, 0xCC]);

        assert_eq!(input.len(), 3);
        assert_eq!(input.read_byte(), 0xAA);
        assert!(!input.eof());

        input.advance(2);
        assert_eq!(input.read_byte(), 0xCC);

        input.advance(1);
        assert!(input.eof());
        assert_eq!(input.read_byte(), 0);

        // Advancing past the end saturates.
        input.advance(10);
        assert_eq!(input.position(), 3);

        input.rewind();
        assert_eq!(input.read_byte(), 0xAA);
    }

    #[test]
    fn save_restore_single_level() {
        let mut input = InputStream::from_bytes(vec![1, 2, 3, 4]);

        input.advance(1);
        input.save_pos();
        input.advance(2);
        assert_eq!(input.read_byte(), 4);

        input.restore_pos();
        assert_eq!(input.read_byte(), 2);
    }

    #[test]
    fn read_at_bounds() {
        let input = InputStream::from_bytes(vec![1, 2, 3, 4]);

        let mut buf = [0u8; 2];
        input.read_at(&mut buf, 1).unwrap();
        assert_eq!(buf, [2, 3]);

        let mut buf = [0u8; 3];
        assert!(input.read_at(&mut buf, 2).is_err());
    }
}
