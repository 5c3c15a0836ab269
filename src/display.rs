// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! DRM/KMS display driver.
//!
//! The driver resolves, once, a property handle for every `(object, property-name)` pair it
//! will ever write, snapshots their current values into a restore request committed at
//! teardown, and prepares a modeset request that activates the CRTC with two planes: a small
//! ARGB overlay, pixel-doubled and centered, and the video plane letterboxed to preserve the
//! source aspect ratio. Presentation is an atomic page-flip loop with at most one flip in
//! flight.

pub mod page;

use std::fs::File;
use std::fs::OpenOptions;
use std::os::fd::AsFd;
use std::os::fd::BorrowedFd;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use drm::control::atomic::AtomicModeReq;
use drm::control::connector;
use drm::control::crtc;
use drm::control::plane;
use drm::control::property;
use drm::control::AtomicCommitFlags;
use drm::control::Device as ControlDevice;
use drm::control::Event;
use drm::control::Mode;
use drm::control::ResourceHandle;
use drm::ClientCapability;
use drm::Device;
use drm_fourcc::DrmFourcc;
use nix::poll::poll;
use nix::poll::PollFd;
use nix::poll::PollFlags;
use nix::poll::PollTimeout;
use thiserror::Error;

use crate::buffer::BufferError;
use crate::buffer::BufferPool;
use crate::display::page::FbInfo;
use crate::display::page::Page;
use crate::display::page::PageFlight;
pub use crate::display::page::PageId;
use crate::Fourcc;
use crate::Resolution;
use crate::VideoInfo;

/// Driver name the card probe looks for.
const DRM_DRIVER: &str = "exynos";

pub(crate) const OVERLAY_WIDTH: u32 = 128;
pub(crate) const OVERLAY_HEIGHT: u32 = 64;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("no DRM device with driver \"{0}\" found")]
    NoDevice(String),
    #[error("failed to open DRM device: {0}")]
    Open(#[source] std::io::Error),
    #[error("failed to enable atomic modesetting: {0}")]
    AtomicCap(#[source] std::io::Error),
    #[error("failed to read DRM resources: {0}")]
    Resources(#[source] std::io::Error),
    #[error("no connected {0} connector with modes found")]
    NoConnector(ConnectorKind),
    #[error("no encoder with a usable CRTC found")]
    NoEncoder,
    #[error("requested resolution {0}x{1} not available")]
    NoMode(u32, u32),
    #[error("failed to blobify mode info: {0}")]
    ModeBlob(#[source] std::io::Error),
    #[error("property \"{name}\" not found on DRM object")]
    MissingProperty { name: &'static str },
    #[error("invalid video parameters")]
    InvalidVideoInfo,
    #[error("unknown V4L2 pixel format {0}")]
    UnsupportedPixelFormat(Fourcc),
    #[error("unsupported DRM format {0}")]
    UnsupportedDrmFormat(DrmFourcc),
    #[error("no plane with support for {0} on the selected CRTC")]
    NoVideoPlane(DrmFourcc),
    #[error("no plane with support for ARGB8888 on the selected CRTC")]
    NoOverlayPlane,
    #[error("failed to add buffer object as framebuffer: {0}")]
    AddFramebuffer(#[source] std::io::Error),
    #[error("atomic commit failed: {0}")]
    Commit(#[source] std::io::Error),
    #[error("failed to poll DRM device: {0}")]
    Poll(#[source] nix::Error),
    #[error("failed to read DRM events: {0}")]
    Event(#[source] std::io::Error),
    #[error("operation cannot be performed in this state")]
    State,
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Connector classes the caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    Hdmi,
    Vga,
    Any,
}

impl ConnectorKind {
    fn matches(self, interface: connector::Interface) -> bool {
        match self {
            ConnectorKind::Hdmi => {
                matches!(interface, connector::Interface::HDMIA | connector::Interface::HDMIB)
            }
            ConnectorKind::Vga => interface == connector::Interface::VGA,
            ConnectorKind::Any => true,
        }
    }
}

impl FromStr for ConnectorKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hdmi" | "HDMI" => Ok(ConnectorKind::Hdmi),
            "vga" | "VGA" => Ok(ConnectorKind::Vga),
            "any" => Ok(ConnectorKind::Any),
            _ => Err("unrecognized connector type. Valid values: hdmi, vga, any"),
        }
    }
}

impl std::fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectorKind::Hdmi => "HDMI",
            ConnectorKind::Vga => "VGA",
            ConnectorKind::Any => "any",
        };
        f.write_str(name)
    }
}

/// An opened DRM card.
pub struct Card(File);

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl drm::Device for Card {}
impl drm::control::Device for Card {}

impl Card {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DisplayError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(DisplayError::Open)?;
        Ok(Self(file))
    }

    /// Probes `/dev/dri/cardN` nodes for the first one driven by `driver`.
    fn open_by_driver(driver: &str) -> Result<Self, DisplayError> {
        for index in 0.. {
            let path = PathBuf::from(format!("/dev/dri/card{}", index));
            if !path.exists() {
                break;
            }

            let Ok(card) = Card::open(&path) else { continue };
            let Ok(info) = card.get_driver() else { continue };

            if info.name().to_string_lossy() == driver {
                log::info!("using DRM device {} ({})", path.display(), driver);
                return Ok(card);
            }
        }

        Err(DisplayError::NoDevice(driver.into()))
    }
}

/// Resolves the handle of a named property on `object`.
fn find_property<T: ResourceHandle>(
    card: &Card,
    object: T,
    name: &'static str,
) -> Result<property::Handle, DisplayError> {
    let props = card.get_properties(object).map_err(DisplayError::Resources)?;
    let (ids, _) = props.as_props_and_values();

    for id in ids {
        let Ok(info) = card.get_property(*id) else { continue };
        if info.name().to_str() == Ok(name) {
            return Ok(*id);
        }
    }

    Err(DisplayError::MissingProperty { name })
}

/// Snapshots the current values of `props` on `object` into `req`.
fn snapshot_properties<T: ResourceHandle + Copy>(
    card: &Card,
    req: &mut AtomicModeReq,
    object: T,
    props: &[property::Handle],
) -> Result<(), DisplayError> {
    let set = card.get_properties(object).map_err(DisplayError::Resources)?;
    let (ids, raw_values) = set.as_props_and_values();

    for wanted in props {
        let position = ids
            .iter()
            .position(|id| id == wanted)
            .ok_or(DisplayError::MissingProperty { name: "snapshot" })?;
        let info = card.get_property(*wanted).map_err(DisplayError::Resources)?;
        let value = info.value_type().convert_value(raw_values[position]);
        req.add_property(object, *wanted, value);
    }

    Ok(())
}

struct ConnectorProps {
    crtc_id: property::Handle,
}

impl ConnectorProps {
    fn resolve(card: &Card, handle: connector::Handle) -> Result<Self, DisplayError> {
        Ok(Self { crtc_id: find_property(card, handle, "CRTC_ID")? })
    }

    fn all(&self) -> [property::Handle; 1] {
        [self.crtc_id]
    }
}

struct CrtcProps {
    active: property::Handle,
    mode_id: property::Handle,
}

impl CrtcProps {
    fn resolve(card: &Card, handle: crtc::Handle) -> Result<Self, DisplayError> {
        Ok(Self {
            active: find_property(card, handle, "ACTIVE")?,
            mode_id: find_property(card, handle, "MODE_ID")?,
        })
    }

    fn all(&self) -> [property::Handle; 2] {
        [self.active, self.mode_id]
    }
}

struct PlaneProps {
    fb_id: property::Handle,
    crtc_id: property::Handle,
    crtc_x: property::Handle,
    crtc_y: property::Handle,
    crtc_w: property::Handle,
    crtc_h: property::Handle,
    src_x: property::Handle,
    src_y: property::Handle,
    src_w: property::Handle,
    src_h: property::Handle,
    zpos: property::Handle,
}

impl PlaneProps {
    fn resolve(card: &Card, handle: plane::Handle) -> Result<Self, DisplayError> {
        Ok(Self {
            fb_id: find_property(card, handle, "FB_ID")?,
            crtc_id: find_property(card, handle, "CRTC_ID")?,
            crtc_x: find_property(card, handle, "CRTC_X")?,
            crtc_y: find_property(card, handle, "CRTC_Y")?,
            crtc_w: find_property(card, handle, "CRTC_W")?,
            crtc_h: find_property(card, handle, "CRTC_H")?,
            src_x: find_property(card, handle, "SRC_X")?,
            src_y: find_property(card, handle, "SRC_Y")?,
            src_w: find_property(card, handle, "SRC_W")?,
            src_h: find_property(card, handle, "SRC_H")?,
            zpos: find_property(card, handle, "zpos")?,
        })
    }

    fn all(&self) -> [property::Handle; 11] {
        [
            self.fb_id,
            self.crtc_id,
            self.crtc_x,
            self.crtc_y,
            self.crtc_w,
            self.crtc_h,
            self.src_x,
            self.src_y,
            self.src_w,
            self.src_h,
            self.zpos,
        ]
    }
}

struct Planes {
    video: plane::Handle,
    overlay: plane::Handle,
    video_props: PlaneProps,
    overlay_props: PlaneProps,
}

/// The display driver: selected objects, prepared atomic requests and the page set.
pub struct Display {
    card: Arc<Card>,
    connector: connector::Handle,
    crtc: crtc::Handle,
    conn_props: ConnectorProps,
    crtc_props: CrtcProps,
    size: Resolution,
    mode_blob: Option<property::Value<'static>>,
    planes: Option<Planes>,
    modeset_request: Option<AtomicModeReq>,
    restore_request: Option<AtomicModeReq>,
    pages: Vec<Page>,
    flight: PageFlight,
    modeset_done: bool,
}

impl Display {
    /// Opens the card and selects connector and CRTC.
    ///
    /// The first connected connector of the requested kind that has at least one mode wins; the
    /// CRTC is the first one reachable from one of that connector's encoders.
    pub fn open(kind: ConnectorKind, device: Option<&Path>) -> Result<Self, DisplayError> {
        let card = match device {
            Some(path) => Card::open(path)?,
            None => Card::open_by_driver(DRM_DRIVER)?,
        };

        // Atomic support; this also enables universal planes.
        card.set_client_capability(ClientCapability::UniversalPlanes, true)
            .map_err(DisplayError::AtomicCap)?;
        card.set_client_capability(ClientCapability::Atomic, true)
            .map_err(DisplayError::AtomicCap)?;

        let resources = card.resource_handles().map_err(DisplayError::Resources)?;

        let mut selected = None;
        for handle in resources.connectors() {
            let Ok(info) = card.get_connector(*handle, false) else { continue };

            if kind.matches(info.interface())
                && info.state() == connector::State::Connected
                && !info.modes().is_empty()
            {
                selected = Some(info);
                break;
            }
        }
        let connector = selected.ok_or(DisplayError::NoConnector(kind))?;

        let mut crtc = None;
        for encoder in connector.encoders() {
            let Ok(info) = card.get_encoder(*encoder) else { continue };

            if let Some(first) = resources.filter_crtcs(info.possible_crtcs()).first() {
                crtc = Some(*first);
                break;
            }
        }
        let crtc = crtc.ok_or(DisplayError::NoEncoder)?;

        let conn_props = ConnectorProps::resolve(&card, connector.handle())?;
        let crtc_props = CrtcProps::resolve(&card, crtc)?;

        log::info!(
            "display: connector {:?}, crtc {:?}",
            connector.handle(),
            crtc
        );

        Ok(Self {
            card: Arc::new(card),
            connector: connector.handle(),
            crtc,
            conn_props,
            crtc_props,
            size: Resolution::default(),
            mode_blob: None,
            planes: None,
            modeset_request: None,
            restore_request: None,
            pages: Vec::new(),
            flight: PageFlight::default(),
            modeset_done: false,
        })
    }

    /// Shared handle to the underlying card, for buffer allocation.
    pub fn card(&self) -> Arc<Card> {
        self.card.clone()
    }

    /// The active mode size. Valid after `init`.
    pub fn size(&self) -> Resolution {
        self.size
    }

    /// Selects the display mode: the first one matching `requested`, or the native mode.
    pub fn init(&mut self, requested: Option<Resolution>) -> Result<(), DisplayError> {
        if self.mode_blob.is_some() {
            return Err(DisplayError::State);
        }

        let info =
            self.card.get_connector(self.connector, false).map_err(DisplayError::Resources)?;

        let mode: Mode = match requested {
            Some(res) => *info
                .modes()
                .iter()
                .find(|mode| mode.size() == (res.width as u16, res.height as u16))
                .ok_or(DisplayError::NoMode(res.width, res.height))?,
            // Mode 0 is the native one.
            None => *info.modes().first().ok_or(DisplayError::NoConnector(ConnectorKind::Any))?,
        };

        let (width, height) = mode.size();
        if width == 0 || height == 0 {
            return Err(DisplayError::NoMode(width as u32, height as u32));
        }

        self.mode_blob =
            Some(self.card.create_property_blob(&mode).map_err(DisplayError::ModeBlob)?);
        self.size = Resolution { width: width as u32, height: height as u32 };

        log::info!("display resolution = {} x {}", self.size.width, self.size.height);

        Ok(())
    }

    /// Finds the video and overlay planes, prepares the restore and modeset requests and
    /// allocates `count` pages.
    pub fn alloc_pages(
        &mut self,
        count: u32,
        vi: &VideoInfo,
        pool: &BufferPool,
    ) -> Result<(), DisplayError> {
        if !self.pages.is_empty() {
            return Err(DisplayError::State);
        }
        let mode_blob = self.mode_blob.clone().ok_or(DisplayError::State)?;
        if !vi.is_valid() {
            return Err(DisplayError::InvalidVideoInfo);
        }

        let fourcc: [u8; 4] = vi.pixel_format.into();
        let (drm_format, tiling) = match &fourcc {
            b"NV12" => (DrmFourcc::Nv12, false),
            b"NV21" => (DrmFourcc::Nv21, false),
            // The 64x32 macroblock-tiled NV12 the decoder prefers.
            b"TM12" => (DrmFourcc::Nv12, true),
            _ => return Err(DisplayError::UnsupportedPixelFormat(vi.pixel_format)),
        };

        let planes = self.select_planes(drm_format)?;

        let mut restore = AtomicModeReq::new();
        snapshot_properties(&self.card, &mut restore, self.connector, &self.conn_props.all())?;
        snapshot_properties(&self.card, &mut restore, self.crtc, &self.crtc_props.all())?;
        snapshot_properties(&self.card, &mut restore, planes.overlay, &planes.overlay_props.all())?;
        snapshot_properties(&self.card, &mut restore, planes.video, &planes.video_props.all())?;

        let mut modeset = AtomicModeReq::new();
        modeset.add_property(
            self.connector,
            self.conn_props.crtc_id,
            property::Value::CRTC(Some(self.crtc)),
        );
        modeset.add_property(self.crtc, self.crtc_props.active, property::Value::Boolean(true));
        modeset.add_property(self.crtc, self.crtc_props.mode_id, mode_blob);
        self.add_overlay_properties(&mut modeset, &planes);
        self.add_video_properties(&mut modeset, &planes, vi);

        let fbi = FbInfo {
            size: (vi.coded.width, vi.coded.height),
            format: drm_format,
            tiling,
        };
        let video_len = (vi.plane_size[0] + vi.plane_size[1]) as usize;

        let mut pages = Vec::with_capacity(count as usize);
        for _ in 0..count {
            pages.push(Page::new(
                self.card.clone(),
                pool,
                &fbi,
                video_len,
                (planes.overlay, planes.overlay_props.fb_id),
                (planes.video, planes.video_props.fb_id),
            )?);
        }

        log::info!("allocated {} pages of {} bytes video each", count, video_len);

        self.planes = Some(planes);
        self.restore_request = Some(restore);
        self.modeset_request = Some(modeset);
        self.flight = PageFlight::new(pages.len());
        self.pages = pages;

        Ok(())
    }

    /// Finds a plane usable with the selected CRTC for each of the video format and ARGB8888.
    fn select_planes(&self, drm_format: DrmFourcc) -> Result<Planes, DisplayError> {
        let resources = self.card.resource_handles().map_err(DisplayError::Resources)?;
        let plane_handles = self.card.plane_handles().map_err(DisplayError::Resources)?;

        let mut video = None;
        let mut overlay = None;

        for handle in plane_handles {
            let Ok(info) = self.card.get_plane(handle) else { continue };

            if !resources.filter_crtcs(info.possible_crtcs()).contains(&self.crtc) {
                continue;
            }

            for format in info.formats() {
                if *format == drm_format as u32 && video.is_none() {
                    video = Some(handle);
                    break;
                } else if *format == DrmFourcc::Argb8888 as u32 && overlay.is_none() {
                    overlay = Some(handle);
                    break;
                }
            }
        }

        let video = video.ok_or(DisplayError::NoVideoPlane(drm_format))?;
        let overlay = overlay.ok_or(DisplayError::NoOverlayPlane)?;

        Ok(Planes {
            video,
            overlay,
            video_props: PlaneProps::resolve(&self.card, video)?,
            overlay_props: PlaneProps::resolve(&self.card, overlay)?,
        })
    }

    /// Centers the overlay, pixel-doubled.
    fn add_overlay_properties(&self, req: &mut AtomicModeReq, planes: &Planes) {
        let (w, h) = (self.size.width, self.size.height);
        let x = if w <= OVERLAY_WIDTH * 2 { 0 } else { (w - OVERLAY_WIDTH * 2) / 2 };
        let y = if h <= OVERLAY_HEIGHT * 2 { 0 } else { (h - OVERLAY_HEIGHT * 2) / 2 };

        let props = &planes.overlay_props;
        let handle = planes.overlay;

        req.add_property(handle, props.crtc_id, property::Value::CRTC(Some(self.crtc)));
        req.add_property(handle, props.crtc_x, property::Value::SignedRange(x as i64));
        req.add_property(handle, props.crtc_y, property::Value::SignedRange(y as i64));
        req.add_property(
            handle,
            props.crtc_w,
            property::Value::UnsignedRange((OVERLAY_WIDTH * 2) as u64),
        );
        req.add_property(
            handle,
            props.crtc_h,
            property::Value::UnsignedRange((OVERLAY_HEIGHT * 2) as u64),
        );
        req.add_property(handle, props.src_x, property::Value::UnsignedRange(0));
        req.add_property(handle, props.src_y, property::Value::UnsignedRange(0));
        // Source rectangles are 16.16 fixed point.
        req.add_property(
            handle,
            props.src_w,
            property::Value::UnsignedRange((OVERLAY_WIDTH as u64) << 16),
        );
        req.add_property(
            handle,
            props.src_h,
            property::Value::UnsignedRange((OVERLAY_HEIGHT as u64) << 16),
        );
        req.add_property(handle, props.zpos, property::Value::UnsignedRange(2));
    }

    /// Letterboxes the video plane so the source aspect ratio is preserved.
    fn add_video_properties(&self, req: &mut AtomicModeReq, planes: &Planes, vi: &VideoInfo) {
        let (w, h) = (self.size.width, self.size.height);

        let mode_aspect = w as f32 / h as f32;
        let video_aspect = vi.crop.width as f32 / vi.crop.height as f32;

        let (width, height) = if (mode_aspect - video_aspect).abs() < 0.0001 {
            (w, h)
        } else if mode_aspect > video_aspect {
            ((w as f32 * video_aspect / mode_aspect) as u32, h)
        } else {
            (w, (h as f32 * mode_aspect / video_aspect) as u32)
        };

        let props = &planes.video_props;
        let handle = planes.video;

        req.add_property(handle, props.crtc_id, property::Value::CRTC(Some(self.crtc)));
        req.add_property(handle, props.crtc_x, property::Value::SignedRange(((w - width) / 2) as i64));
        req.add_property(handle, props.crtc_y, property::Value::SignedRange(((h - height) / 2) as i64));
        req.add_property(handle, props.crtc_w, property::Value::UnsignedRange(width as u64));
        req.add_property(handle, props.crtc_h, property::Value::UnsignedRange(height as u64));
        req.add_property(handle, props.src_x, property::Value::UnsignedRange(vi.crop.x as u64));
        req.add_property(handle, props.src_y, property::Value::UnsignedRange(vi.crop.y as u64));
        req.add_property(
            handle,
            props.src_w,
            property::Value::UnsignedRange((vi.crop.width as u64) << 16),
        );
        req.add_property(
            handle,
            props.src_h,
            property::Value::UnsignedRange((vi.crop.height as u64) << 16),
        );
        req.add_property(handle, props.zpos, property::Value::UnsignedRange(0));
    }

    /// Hands out a free page, or `None` when every page is in flight.
    pub fn get_page(&mut self) -> Option<PageId> {
        self.flight.acquire()
    }

    /// The PRIME descriptor of a page's video buffer.
    pub fn page_fd(&self, page: PageId) -> &File {
        self.pages[page.0].video_fd()
    }

    /// Commits `page` for scan-out on the next vblank.
    ///
    /// The first commit carries the full modeset; later ones only swap framebuffers. At most
    /// one flip is in flight: a still-pending flip is waited for first, and the very first flip
    /// is waited for synchronously since there is no previous page to release yet.
    pub fn issue_flip(&mut self, page: PageId) -> Result<(), DisplayError> {
        if self.flight.flip_pending() {
            self.wait_for_flip()?;
        }

        let (request, flags) = if self.modeset_done {
            (self.pages[page.0].request.clone(), AtomicCommitFlags::PAGE_FLIP_EVENT)
        } else {
            let mut request = self.modeset_request.as_ref().ok_or(DisplayError::State)?.clone();
            for (plane, prop, fb) in self.pages[page.0].fb_props {
                request.add_property(plane, prop, property::Value::Framebuffer(Some(fb)));
            }
            (
                request,
                AtomicCommitFlags::ALLOW_MODESET | AtomicCommitFlags::PAGE_FLIP_EVENT,
            )
        };

        self.card.atomic_commit(flags, request).map_err(DisplayError::Commit)?;
        self.modeset_done = true;

        let first_flip = self.flight.current().is_none();
        self.flight.flip_issued(page);
        log::debug!("issued flip to page {:?}", page);

        if first_flip {
            self.wait_for_flip()?;
        }

        Ok(())
    }

    /// Blocks until a page-flip event arrives and retires the outgoing page.
    pub fn wait_for_flip(&mut self) -> Result<(), DisplayError> {
        loop {
            let mut fds = [PollFd::new(self.card.as_fd(), PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::NONE).map_err(DisplayError::Poll)?;

            let events = self.card.receive_events().map_err(DisplayError::Event)?;
            let mut flipped = false;
            for event in events {
                if let Event::PageFlip(_) = event {
                    self.flight.flip_completed();
                    flipped = true;
                }
            }

            if flipped {
                return Ok(());
            }
        }
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        // Return the display to its previous state before tearing the pages down.
        if let Some(restore) = self.restore_request.take() {
            if let Err(err) =
                self.card.atomic_commit(AtomicCommitFlags::ALLOW_MODESET, restore)
            {
                log::error!("failed to restore the display: {}", err);
            }
        }

        self.pages.clear();

        if let Some(property::Value::Blob(id)) = self.mode_blob.take() {
            let _ = self.card.destroy_property_blob(id);
        }
    }
}

#[cfg(test)]
pub(crate) fn page_id_for_test(index: usize) -> PageId {
    PageId(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_kind_parsing() {
        assert_eq!(ConnectorKind::from_str("hdmi"), Ok(ConnectorKind::Hdmi));
        assert_eq!(ConnectorKind::from_str("VGA"), Ok(ConnectorKind::Vga));
        assert_eq!(ConnectorKind::from_str("any"), Ok(ConnectorKind::Any));
        assert!(ConnectorKind::from_str("dp").is_err());
    }

    #[test]
    fn connector_kind_matching() {
        assert!(ConnectorKind::Hdmi.matches(connector::Interface::HDMIA));
        assert!(ConnectorKind::Hdmi.matches(connector::Interface::HDMIB));
        assert!(!ConnectorKind::Hdmi.matches(connector::Interface::VGA));
        assert!(ConnectorKind::Any.matches(connector::Interface::DisplayPort));
    }
}
