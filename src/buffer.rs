// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! DMA-capable buffer allocation.
//!
//! Buffers are DRM dumb buffers, exported as PRIME file descriptors at allocation time so they
//! can be handed to the decoder's DMABUF queues. The pool shares ownership of the DRM card with
//! the display driver, which keeps the device open until the last buffer is gone; the decoder
//! may hold exported descriptors well past display teardown.

use std::fs::File;
use std::num::NonZeroUsize;
use std::os::fd::AsFd;
use std::slice;
use std::sync::Arc;

use drm::buffer::Buffer as _;
use drm::control::dumbbuffer::DumbBuffer;
use drm::control::Device as ControlDevice;
use drm_fourcc::DrmFourcc;
use nix::libc;
use nix::libc::c_void;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;
use std::ptr::NonNull;
use thiserror::Error;

use crate::display::Card;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("zero-sized buffer requested")]
    ZeroSized,
    #[error("dumb buffer allocation failed: {0}")]
    Alloc(#[source] std::io::Error),
    #[error("PRIME export failed: {0}")]
    Export(#[source] std::io::Error),
    #[error("failed to map buffer: {0}")]
    Map(#[source] nix::Error),
    #[error("failed to share buffer descriptor: {0}")]
    Share(#[source] std::io::Error),
}

/// Pitch used for byte-addressed (non-image) allocations.
const LINEAR_PITCH: u32 = 4096;

/// Rounds a byte-length allocation up to whole `LINEAR_PITCH`-sized rows.
fn linear_dimensions(len: usize) -> (u32, u32) {
    let rows = std::cmp::max(1, len.div_ceil(LINEAR_PITCH as usize));
    (LINEAR_PITCH, rows as u32)
}

/// Allocates [`DmaBuffer`]s against a DRM card.
pub struct BufferPool {
    card: Arc<Card>,
}

impl BufferPool {
    pub fn new(card: Arc<Card>) -> Self {
        Self { card }
    }

    /// Allocates `len` bytes of DMA-capable memory with no particular layout.
    pub fn alloc(&self, len: usize) -> Result<DmaBuffer, BufferError> {
        if len == 0 {
            return Err(BufferError::ZeroSized);
        }
        self.alloc_dumb(linear_dimensions(len), DrmFourcc::R8, 8, len)
    }

    /// Allocates a 2D image buffer of `size` pixels at `bpp` bits per pixel.
    pub fn alloc_image(
        &self,
        size: (u32, u32),
        format: DrmFourcc,
        bpp: u32,
    ) -> Result<DmaBuffer, BufferError> {
        if size.0 == 0 || size.1 == 0 {
            return Err(BufferError::ZeroSized);
        }
        self.alloc_dumb(size, format, bpp, 0)
    }

    fn alloc_dumb(
        &self,
        size: (u32, u32),
        format: DrmFourcc,
        bpp: u32,
        len: usize,
    ) -> Result<DmaBuffer, BufferError> {
        let bo = self.card.create_dumb_buffer(size, format, bpp).map_err(BufferError::Alloc)?;
        let len = if len != 0 { len } else { (bo.pitch() * bo.size().1) as usize };

        let fd = self
            .card
            .buffer_to_prime_fd(bo.handle(), (libc::O_RDWR | libc::O_CLOEXEC) as u32)
            .map_err(|err| {
                let _ = self.card.destroy_dumb_buffer(bo);
                BufferError::Export(err)
            })?;

        Ok(DmaBuffer {
            card: self.card.clone(),
            bo: Some(bo),
            fd: File::from(fd),
            len,
            mapping: None,
        })
    }
}

struct Mapping {
    addr: NonNull<c_void>,
    len: usize,
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `addr`/`len` came from a successful mmap() call owned by this value.
        unsafe {
            let _ = munmap(self.addr, self.len);
        }
    }
}

/// A physically contiguous, DMA-exportable buffer.
///
/// The PRIME descriptor is created at allocation and lives as long as the buffer. Mapping is
/// lazy and persists until the buffer is dropped.
pub struct DmaBuffer {
    card: Arc<Card>,
    bo: Option<DumbBuffer>,
    fd: File,
    len: usize,
    mapping: Option<Mapping>,
}

// SAFETY: the mapping pointer is owned exclusively by this buffer.
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The exported PRIME descriptor.
    pub fn prime_fd(&self) -> &File {
        &self.fd
    }

    /// A duplicate of the PRIME descriptor, for handing to a kernel queue.
    pub fn share_fd(&self) -> Result<File, BufferError> {
        self.fd.try_clone().map_err(BufferError::Share)
    }

    fn bo(&self) -> &DumbBuffer {
        self.bo.as_ref().expect("buffer object outlives DmaBuffer")
    }

    /// Maps the buffer into userspace read/write.
    pub fn map(&mut self) -> Result<&mut [u8], BufferError> {
        if self.mapping.is_none() {
            let len = NonZeroUsize::new(self.len).ok_or(BufferError::ZeroSized)?;

            // SAFETY: mapping a shared view of the PRIME fd we exported at allocation time.
            let addr = unsafe {
                mmap(
                    None,
                    len,
                    ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                    MapFlags::MAP_SHARED,
                    self.fd.as_fd(),
                    0,
                )
                .map_err(BufferError::Map)?
            };

            self.mapping = Some(Mapping { addr, len: self.len });
        }

        let mapping = self.mapping.as_ref().expect("mapping was just created");
        // SAFETY: the mapping covers `len` bytes and stays alive until this buffer drops; the
        // returned slice borrows `self` mutably so no aliasing map can be obtained.
        Ok(unsafe { slice::from_raw_parts_mut(mapping.addr.as_ptr() as *mut u8, mapping.len) })
    }
}

impl drm::buffer::Buffer for DmaBuffer {
    fn size(&self) -> (u32, u32) {
        self.bo().size()
    }

    fn format(&self) -> DrmFourcc {
        self.bo().format()
    }

    fn pitch(&self) -> u32 {
        self.bo().pitch()
    }

    fn handle(&self) -> drm::buffer::Handle {
        self.bo().handle()
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        self.mapping.take();
        if let Some(bo) = self.bo.take() {
            let _ = self.card.destroy_dumb_buffer(bo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_rounding() {
        assert_eq!(linear_dimensions(1), (4096, 1));
        assert_eq!(linear_dimensions(4096), (4096, 1));
        assert_eq!(linear_dimensions(4097), (4096, 2));
        assert_eq!(linear_dimensions(1024 * 1024), (4096, 256));
    }
}
