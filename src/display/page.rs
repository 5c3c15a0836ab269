// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Scan-out pages and the flip-tracking state machine.
//!
//! A page is the unit of double buffering: a pair of buffer objects (ARGB overlay + video
//! frame), their framebuffers, and an atomic request carrying the two `FB_ID` assignments,
//! prepared once at allocation. Construction happens in a single pass (allocate, add as
//! framebuffer, build request) that unwinds on failure, and `Drop` reverses it, so a page can
//! never exist in a half-built state.

use std::fs::File;
use std::sync::Arc;

use drm::buffer::Buffer as _;
use drm::buffer::PlanarBuffer;
use drm::control::atomic::AtomicModeReq;
use drm::control::framebuffer;
use drm::control::plane;
use drm::control::property;
use drm::control::Device as ControlDevice;
use drm::control::FbCmd2Flags;
use drm::Device;
use drm_fourcc::DrmFourcc;
use drm_fourcc::DrmModifier;

use super::Card;
use super::DisplayError;
use super::OVERLAY_HEIGHT;
use super::OVERLAY_WIDTH;
use crate::buffer::BufferPool;
use crate::buffer::DmaBuffer;

/// Opaque identifier of a display page, stable for the lifetime of the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageId(pub(crate) usize);

/// Layout of the video framebuffer shared by all pages.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FbInfo {
    pub size: (u32, u32),
    pub format: DrmFourcc,
    pub tiling: bool,
}

/// Two-plane framebuffer view over a single buffer object, chroma following luma.
struct PlanarView {
    size: (u32, u32),
    format: DrmFourcc,
    modifier: Option<DrmModifier>,
    pitches: [u32; 4],
    handles: [Option<drm::buffer::Handle>; 4],
    offsets: [u32; 4],
}

impl PlanarBuffer for PlanarView {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn format(&self) -> DrmFourcc {
        self.format
    }

    fn modifier(&self) -> Option<DrmModifier> {
        self.modifier
    }

    fn pitches(&self) -> [u32; 4] {
        self.pitches
    }

    fn handles(&self) -> [Option<drm::buffer::Handle>; 4] {
        self.handles
    }

    fn offsets(&self) -> [u32; 4] {
        self.offsets
    }
}

pub(crate) struct Page {
    card: Arc<Card>,
    _overlay: DmaBuffer,
    video: DmaBuffer,
    overlay_fb: framebuffer::Handle,
    video_fb: framebuffer::Handle,
    /// Prepared flip request: just the two `FB_ID` assignments.
    pub(crate) request: AtomicModeReq,
    /// The same assignments in raw form, for merging into the modeset request.
    pub(crate) fb_props: [(plane::Handle, property::Handle, framebuffer::Handle); 2],
}

impl Page {
    pub(crate) fn new(
        card: Arc<Card>,
        pool: &BufferPool,
        fbi: &FbInfo,
        video_len: usize,
        overlay_plane: (plane::Handle, property::Handle),
        video_plane: (plane::Handle, property::Handle),
    ) -> Result<Self, DisplayError> {
        let mut overlay = pool.alloc_image((OVERLAY_WIDTH, OVERLAY_HEIGHT), DrmFourcc::Argb8888, 32)?;
        // Transparent until something draws on it.
        overlay.map()?.fill(0);

        // The video object is written by the decoder only; it is never mapped here.
        let video = pool.alloc(video_len)?;

        let overlay_fb =
            card.add_framebuffer(&overlay, 32, 32).map_err(DisplayError::AddFramebuffer)?;

        let pitch = match fbi.format {
            DrmFourcc::Nv12 | DrmFourcc::Nv21 => fbi.size.0,
            format => {
                let _ = card.destroy_framebuffer(overlay_fb);
                return Err(DisplayError::UnsupportedDrmFormat(format));
            }
        };

        let view = PlanarView {
            size: fbi.size,
            format: fbi.format,
            modifier: fbi.tiling.then_some(DrmModifier::Samsung_64_32_tile),
            pitches: [pitch, pitch, 0, 0],
            handles: [Some(video.handle()), Some(video.handle()), None, None],
            offsets: [0, pitch * fbi.size.1, 0, 0],
        };
        let flags = if fbi.tiling { FbCmd2Flags::MODIFIERS } else { FbCmd2Flags::empty() };

        let video_fb = card.add_planar_framebuffer(&view, flags).map_err(|err| {
            let _ = card.destroy_framebuffer(overlay_fb);
            DisplayError::AddFramebuffer(err)
        })?;

        let fb_props =
            [(overlay_plane.0, overlay_plane.1, overlay_fb), (video_plane.0, video_plane.1, video_fb)];

        let mut request = AtomicModeReq::new();
        for (plane, prop, fb) in fb_props {
            request.add_property(plane, prop, property::Value::Framebuffer(Some(fb)));
        }

        Ok(Self { card, _overlay: overlay, video, overlay_fb, video_fb, request, fb_props })
    }

    /// The PRIME descriptor of the video buffer object.
    pub(crate) fn video_fd(&self) -> &File {
        self.video.prime_fd()
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        let _ = self.card.destroy_framebuffer(self.video_fb);
        let _ = self.card.destroy_framebuffer(self.overlay_fb);
    }
}

/// Tracks which pages are handed out and which one is on the screen.
///
/// A page is `used` from the moment `acquire` returns it until the flip that retires it
/// completes. Exactly one page is current between flip events; while a flip is pending both
/// the outgoing and incoming pages count as used.
#[derive(Debug, Default)]
pub struct PageFlight {
    used: Vec<bool>,
    current: Option<PageId>,
    pending: Option<PageId>,
}

impl PageFlight {
    pub fn new(count: usize) -> Self {
        Self { used: vec![false; count], current: None, pending: None }
    }

    /// Hands out a free page, marking it used.
    pub fn acquire(&mut self) -> Option<PageId> {
        let index = self.used.iter().position(|used| !used)?;
        self.used[index] = true;
        Some(PageId(index))
    }

    pub fn flip_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn current(&self) -> Option<PageId> {
        self.current
    }

    /// Records the page whose flip was just committed.
    pub fn flip_issued(&mut self, page: PageId) {
        assert!(self.pending.is_none(), "multiple page flips in flight");
        self.pending = Some(page);
    }

    /// Retires the previously current page and promotes the pending one.
    pub fn flip_completed(&mut self) {
        if let Some(previous) = self.current {
            self.used[previous.0] = false;
        }
        self.current = self.pending.take();
    }

    #[cfg(test)]
    fn used_count(&self) -> usize {
        self.used.iter().filter(|used| **used).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_marks_pages_used() {
        let mut flight = PageFlight::new(3);

        let a = flight.acquire().unwrap();
        let b = flight.acquire().unwrap();
        let c = flight.acquire().unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(flight.used_count(), 3);

        // No page may be handed out twice.
        assert_eq!(flight.acquire(), None);
    }

    #[test]
    fn flip_cycle_retires_previous_page() {
        let mut flight = PageFlight::new(3);

        let first = flight.acquire().unwrap();
        flight.flip_issued(first);
        flight.flip_completed();
        assert_eq!(flight.current(), Some(first));
        assert_eq!(flight.used_count(), 1);

        let second = flight.acquire().unwrap();
        flight.flip_issued(second);
        // While the flip is pending, both the outgoing and incoming pages are held.
        assert_eq!(flight.used_count(), 2);

        flight.flip_completed();
        assert_eq!(flight.current(), Some(second));
        // The page that was on screen is free again.
        assert_eq!(flight.used_count(), 1);
        assert_eq!(flight.acquire(), Some(first));
    }

    #[test]
    #[should_panic(expected = "multiple page flips in flight")]
    fn only_one_flip_in_flight() {
        let mut flight = PageFlight::new(2);

        let a = flight.acquire().unwrap();
        let b = flight.acquire().unwrap();
        flight.flip_issued(a);
        flight.flip_issued(b);
    }

    #[test]
    fn pages_rotate_without_duplication() {
        let mut flight = PageFlight::new(3);
        let mut last = None;

        for _ in 0..10 {
            let page = flight.acquire().expect("a page must be free each iteration");
            if let Some(last) = last {
                assert_ne!(page, last, "a page was handed out while still in use");
            }
            flight.flip_issued(page);
            flight.flip_completed();
            assert_eq!(flight.current(), Some(page));
            last = Some(page);
        }
    }
}
