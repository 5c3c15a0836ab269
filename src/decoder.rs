// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Stateful V4L2 memory-to-memory decode engine.
//!
//! The hardware decoder consumes compressed frames on its OUTPUT queue and produces raw
//! pictures on its CAPTURE queue. Setup follows a strict order: `open`, `set_parser`,
//! `set_source`, `init`. After that the decoder thread drives [`Decoder::run`] while the
//! presentation thread moves display pages through [`Decoder::queue_dest`] and
//! [`Decoder::dequeue_dest`]; the two sides keep their state behind separate locks so neither
//! blocks the other.

use std::fs::File;
use std::os::fd::AsRawFd;
use std::os::fd::BorrowedFd;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use nix::errno::Errno;
use nix::poll::poll;
use nix::poll::PollFd;
use nix::poll::PollFlags;
use nix::poll::PollTimeout;
use thiserror::Error;
use v4l2r::bindings::v4l2_format;
use v4l2r::bindings::v4l2_plane;
use v4l2r::bindings::v4l2_rect;
use v4l2r::bindings::V4L2_CID_MIN_BUFFERS_FOR_CAPTURE;
use v4l2r::controls::ExtControlTrait;
use v4l2r::controls::SafeExtControl;
use v4l2r::device::queue::direction::Capture;
use v4l2r::device::queue::direction::Output;
use v4l2r::device::queue::BuffersAllocated;
use v4l2r::device::queue::CreateQueueError;
use v4l2r::device::queue::CaptureQueueable;
use v4l2r::device::queue::GetCaptureBufferByIndex;
use v4l2r::device::queue::GetOutputBufferByIndex;
use v4l2r::device::queue::OutputQueueable;
use v4l2r::device::queue::Queue;
use v4l2r::device::queue::RequestBuffersError;
use v4l2r::device::AllocatedQueue;
use v4l2r::device::Device;
use v4l2r::device::DeviceConfig;
use v4l2r::device::Stream;
use v4l2r::device::TryDequeue;
use v4l2r::ioctl;
use v4l2r::ioctl::Capabilities;
use v4l2r::ioctl::Capability;
use v4l2r::ioctl::CtrlWhich;
use v4l2r::ioctl::DecoderCmd;
use v4l2r::ioctl::GFmtError;
use v4l2r::ioctl::SFmtError;
use v4l2r::ioctl::SelectionTarget;
use v4l2r::ioctl::SelectionType;
use v4l2r::ioctl::StreamOnError;
use v4l2r::memory::DmaBuf;
use v4l2r::memory::MemoryType;
use v4l2r::memory::PlaneHandle;
use v4l2r::Format;

use crate::buffer::BufferError;
use crate::buffer::DmaBuffer;
use crate::codec::ParseError;
use crate::codec::StreamParser;
use crate::display::PageId;
use crate::Fourcc;
use crate::Rect;
use crate::Resolution;
use crate::VideoInfo;

/// Card name of the decoder the device probe looks for.
const DECODER_CARD: &str = "s5p-mfc-dec";

/// Upper bound on source (compressed stream) buffers.
pub const MAX_SOURCE_BUFFERS: usize = 16;
/// Hardware limit on destination buffers.
pub const MAX_DEST_BUFFERS: usize = 32;
/// One destination buffer is always scanned out and another must be ready to become the next
/// scan-out, on top of what the hardware needs for decoding.
const DEST_EXTRA_BUFFERS: u32 = 2;

/// How long a destination dequeue waits before letting the caller observe shared state again.
const DEQUEUE_TIMEOUT_MS: u16 = 500;

struct MinBuffersForCapture;

impl ExtControlTrait for MinBuffersForCapture {
    const ID: u32 = V4L2_CID_MIN_BUFFERS_FOR_CAPTURE;
    type PAYLOAD = i32;
}

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("no video device with card name \"{0}\" found")]
    NoDevice(String),
    #[error("failed to open video device: {0}")]
    Open(String),
    #[error("video device is missing the M2M_MPLANE or STREAMING capability")]
    MissingCapabilities,
    #[error("operation cannot be performed in this state")]
    State,
    #[error("source buffers vector empty")]
    NoSourceBuffers,
    #[error("source buffer size mismatch")]
    SourceSizeMismatch,
    #[error("failed to extract header from stream")]
    NoHeader,
    #[error("unable to create queue")]
    QueueCreation,
    #[error("failed to get format for queue")]
    FormatGet,
    #[error("failed to set format for queue")]
    FormatSet,
    #[error("failed requesting buffers")]
    RequestBuffers,
    #[error("unable to stream on")]
    StreamOn,
    #[error("driver does not support {0}")]
    UnsupportedPixelFormat(Fourcc),
    #[error("failed to get the number of buffers required by the decoder: {0}")]
    ControlGet(String),
    #[error("failed to get crop information: {0}")]
    SelectionGet(String),
    #[error("failed to queue buffer: {0}")]
    QueueBuffer(String),
    #[error("unknown buffer with index {0} dequeued")]
    UnknownBuffer(usize),
    #[error("destination buffer index out of bounds")]
    DestinationOverflow,
    #[error("destination queue starved; {queued} queued but {min} required")]
    Starved { queued: u32, min: u32 },
    #[error("failed to poll video device: {0}")]
    Poll(#[source] nix::Error),
    #[error("failed to stop decoder: {0}")]
    Stop(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

impl From<CreateQueueError> for DecoderError {
    fn from(_err: CreateQueueError) -> Self {
        DecoderError::QueueCreation
    }
}

impl From<GFmtError> for DecoderError {
    fn from(_err: GFmtError) -> Self {
        DecoderError::FormatGet
    }
}

impl From<SFmtError> for DecoderError {
    fn from(_err: SFmtError) -> Self {
        DecoderError::FormatSet
    }
}

impl From<RequestBuffersError> for DecoderError {
    fn from(_err: RequestBuffersError) -> Self {
        DecoderError::RequestBuffers
    }
}

impl From<StreamOnError> for DecoderError {
    fn from(_err: StreamOnError) -> Self {
        DecoderError::StreamOn
    }
}

/// DMABUF plane at a byte offset within a shared buffer object.
#[derive(Debug)]
struct DmaBufPlane {
    fd: File,
    length: u32,
    data_offset: u32,
}

impl DmaBufPlane {
    fn new(fd: File, length: u32) -> Self {
        Self { fd, length, data_offset: 0 }
    }

    fn with_offset(fd: File, length: u32, data_offset: u32) -> Self {
        Self { fd, length, data_offset }
    }
}

impl PlaneHandle for DmaBufPlane {
    type Memory = DmaBuf;

    fn fill_v4l2_plane(&self, plane: &mut v4l2_plane) {
        plane.m.fd = self.fd.as_raw_fd();
        plane.length = self.length;
        plane.data_offset = self.data_offset;
    }
}

/// Outcome of one non-blocking [`Decoder::run`] tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Buffers were queued or dequeued this tick.
    Active,
    /// The parser has delivered every frame of the stream.
    Finished,
    /// Nothing to do; poll again.
    Nop,
}

/// Outcome of a destination dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dequeued {
    /// A decoded picture landed in the page's buffer.
    Frame(PageId),
    /// The hardware reported a zero-byte buffer: the stream is fully drained.
    Drained,
}

struct SourceBuffer {
    buffer: DmaBuffer,
    busy: bool,
}

struct SourceState {
    parser: Option<Box<dyn StreamParser>>,
    queue: Option<Queue<Output, BuffersAllocated<Vec<DmaBufPlane>>>>,
    buffers: Vec<SourceBuffer>,
    buffer_size: usize,
}

/// Maps destination buffer indices to display pages. Indices grow on demand, up to the
/// negotiated buffer count, and stay bound to their page from then on.
#[derive(Debug, Default)]
struct DestRegistry {
    pages: Vec<PageId>,
    capacity: usize,
}

impl DestRegistry {
    fn new(capacity: usize) -> Self {
        Self { pages: Vec::new(), capacity }
    }

    /// Returns the index bound to `page`, binding the next free one on first sight.
    fn assign(&mut self, page: PageId) -> Result<usize, DecoderError> {
        if let Some(index) = self.pages.iter().position(|known| *known == page) {
            return Ok(index);
        }

        if self.pages.len() >= self.capacity {
            return Err(DecoderError::DestinationOverflow);
        }

        self.pages.push(page);
        let index = self.pages.len() - 1;
        log::debug!("bound new destination buffer with index {}", index);
        Ok(index)
    }

    fn lookup(&self, index: usize) -> Option<PageId> {
        self.pages.get(index).copied()
    }
}

struct DestState {
    queue: Option<Queue<Capture, BuffersAllocated<Vec<DmaBufPlane>>>>,
    registry: DestRegistry,
    plane_size: [u32; 2],
    streaming: bool,
}

/// The decode engine.
pub struct Decoder {
    device: Arc<Device>,
    source: Mutex<SourceState>,
    dest: Mutex<DestState>,
    dest_num_queued: AtomicU32,
    dest_queue_min: u32,
    dest_buffer_count: u32,
    initialized: bool,
}

impl Decoder {
    /// Opens the decoder device.
    ///
    /// Without an explicit `device` path, `/dev/videoN` nodes are probed in ascending order for
    /// the one whose card name matches the decoder. The device must support multi-planar
    /// memory-to-memory and streaming I/O.
    pub fn open(device: Option<&Path>) -> Result<Self, DecoderError> {
        let device = match device {
            Some(path) => Self::open_device(path)?,
            None => Self::probe_device()?,
        };

        Ok(Self {
            device: Arc::new(device),
            source: Mutex::new(SourceState {
                parser: None,
                queue: None,
                buffers: Vec::new(),
                buffer_size: 0,
            }),
            dest: Mutex::new(DestState {
                queue: None,
                registry: DestRegistry::default(),
                plane_size: [0; 2],
                streaming: false,
            }),
            dest_num_queued: AtomicU32::new(0),
            dest_queue_min: 0,
            dest_buffer_count: 0,
            initialized: false,
        })
    }

    fn open_device(path: &Path) -> Result<Device, DecoderError> {
        let device = Device::open(path, DeviceConfig::new().non_blocking_dqbuf())
            .map_err(|err| DecoderError::Open(err.to_string()))?;

        let caps: Capability =
            ioctl::querycap(&device).map_err(|err| DecoderError::Open(err.to_string()))?;

        if !caps.capabilities.contains(Capabilities::VIDEO_M2M_MPLANE | Capabilities::STREAMING) {
            return Err(DecoderError::MissingCapabilities);
        }

        log::info!(
            "decoder: driver = {}, bus_info = {}, card = {}",
            caps.driver,
            caps.bus_info,
            caps.card
        );

        Ok(device)
    }

    fn probe_device() -> Result<Device, DecoderError> {
        for index in 0.. {
            let path = PathBuf::from(format!("/dev/video{}", index));
            if !path.exists() {
                break;
            }

            let Ok(device) = Device::open(&path, DeviceConfig::new().non_blocking_dqbuf()) else {
                continue;
            };
            let Ok(caps) = ioctl::querycap::<Capability>(&device) else { continue };

            if caps.card != DECODER_CARD {
                continue;
            }

            log::info!("decoder detected at {}", path.display());
            if !caps.capabilities.contains(Capabilities::VIDEO_M2M_MPLANE | Capabilities::STREAMING)
            {
                return Err(DecoderError::MissingCapabilities);
            }

            log::info!(
                "decoder: driver = {}, bus_info = {}, card = {}",
                caps.driver,
                caps.bus_info,
                caps.card
            );
            return Ok(device);
        }

        Err(DecoderError::NoDevice(DECODER_CARD.into()))
    }

    /// Binds the stream parser. Must happen before `set_source`.
    pub fn set_parser(&mut self, parser: Box<dyn StreamParser>) -> Result<(), DecoderError> {
        let source = self.source.get_mut().expect("decoder lock poisoned");

        if source.parser.is_some() {
            return Err(DecoderError::State);
        }

        source.parser = Some(parser);
        Ok(())
    }

    /// Registers the source buffers, negotiates the OUTPUT format, extracts the stream header
    /// into buffer 0 and starts the source stream.
    pub fn set_source(&mut self, buffers: Vec<DmaBuffer>) -> Result<(), DecoderError> {
        let source = self.source.get_mut().expect("decoder lock poisoned");

        if source.queue.is_some() {
            return Err(DecoderError::State);
        }
        let parser = source.parser.as_mut().ok_or(DecoderError::State)?;

        if buffers.is_empty() {
            return Err(DecoderError::NoSourceBuffers);
        }
        let buffer_size = buffers[0].len();
        if buffers.iter().any(|buffer| buffer.len() != buffer_size) {
            return Err(DecoderError::SourceSizeMismatch);
        }

        let requested = std::cmp::min(buffers.len(), MAX_SOURCE_BUFFERS);
        let mut buffers: Vec<SourceBuffer> = buffers
            .into_iter()
            .take(requested)
            .map(|buffer| SourceBuffer { buffer, busy: false })
            .collect();

        let mut queue = Queue::get_output_mplane_queue(self.device.clone())?;

        queue
            .change_format()?
            .set_pixelformat(parser.pixel_format())
            .set_planes_layout(vec![v4l2r::PlaneLayout {
                sizeimage: buffer_size as u32,
                ..Default::default()
            }])
            .apply::<v4l2_format>()?;

        let format: Format = queue.get_format()?;
        if format.pixelformat != parser.pixel_format().into() {
            return Err(DecoderError::UnsupportedPixelFormat(parser.pixel_format()));
        }

        let queue = queue
            .request_buffers_generic::<Vec<DmaBufPlane>>(MemoryType::DmaBuf, buffers.len() as u32)?;
        log::info!("got {} source buffers (requested = {})", queue.num_buffers(), buffers.len());
        buffers.truncate(queue.num_buffers());

        let header = parser.parse(buffers[0].buffer.map()?, true)?;
        if header.size == 0 {
            return Err(DecoderError::NoHeader);
        }
        log::info!("extracted a header of size {}", header.size);

        // For H.263 the header is passed again with the first frame, so re-feed it into the
        // decoder by rewinding the parser.
        if parser.pixel_format() == Fourcc::from(b"H263") {
            log::debug!("H263: re-feeding the header with the first frame");
            parser.reset();
        }

        let qbuf = queue
            .try_get_buffer(0)
            .map_err(|err| DecoderError::QueueBuffer(err.to_string()))?;
        qbuf.queue_with_handles(
            vec![DmaBufPlane::new(buffers[0].buffer.share_fd()?, buffer_size as u32)],
            &[header.size],
        )
        .map_err(|err| DecoderError::QueueBuffer(err.to_string()))?;
        buffers[0].busy = true;

        queue.stream_on()?;
        log::debug!("enabled streaming for source queue");

        source.queue = Some(queue);
        source.buffers = buffers;
        source.buffer_size = buffer_size;

        Ok(())
    }

    /// Reads back the negotiated destination format and allocates the CAPTURE queue.
    ///
    /// Returns the number of destination buffers the caller must provide pages for, together
    /// with the video parameters.
    pub fn init(&mut self) -> Result<(u32, VideoInfo), DecoderError> {
        if self.initialized {
            return Err(DecoderError::State);
        }
        if self.source.get_mut().expect("decoder lock poisoned").queue.is_none() {
            return Err(DecoderError::State);
        }

        let queue = Queue::get_capture_mplane_queue(self.device.clone())?;

        // Reading the format here is what kicks off header processing in the hardware.
        let format: Format = queue.get_format()?;

        let plane0 = format.plane_fmt.first().ok_or(DecoderError::FormatGet)?.sizeimage;
        let plane1 = format.plane_fmt.get(1).ok_or(DecoderError::FormatGet)?.sizeimage;

        let mut info = VideoInfo {
            coded: Resolution { width: format.width, height: format.height },
            pixel_format: format.pixelformat.into(),
            ..Default::default()
        };
        info.plane_size[0] = plane0;
        info.plane_size[1] = plane1;

        let mut ctrl = SafeExtControl::<MinBuffersForCapture>::from_value(0);
        ioctl::g_ext_ctrls(&*self.device, CtrlWhich::Current, &mut ctrl)
            .map_err(|err| DecoderError::ControlGet(err.to_string()))?;
        let min_buffers = ctrl.value() as u32;

        let crop: v4l2_rect = ioctl::g_selection(
            &*self.device,
            SelectionType::Capture,
            SelectionTarget::Compose,
        )
        .map_err(|err| DecoderError::SelectionGet(err.to_string()))?;
        info.crop = Rect {
            x: crop.left as u32,
            y: crop.top as u32,
            width: crop.width,
            height: crop.height,
        };

        let wanted = std::cmp::min(min_buffers + DEST_EXTRA_BUFFERS, MAX_DEST_BUFFERS as u32);
        let queue =
            queue.request_buffers_generic::<Vec<DmaBufPlane>>(MemoryType::DmaBuf, wanted)?;
        let count = queue.num_buffers() as u32;
        log::info!(
            "got {} destination buffers (requested = {}, extra = {})",
            count,
            wanted,
            DEST_EXTRA_BUFFERS
        );

        log::info!(
            "decoder buffer parameters: resolution (full) = {} x {}, \
             plane sizes = [{}, {}]",
            info.coded.width,
            info.coded.height,
            plane0,
            plane1
        );
        log::info!(
            "decoder crop parameters: width = {}, height = {}, left = {}, top = {}",
            info.crop.width,
            info.crop.height,
            info.crop.x,
            info.crop.y
        );

        let dest = self.dest.get_mut().expect("decoder lock poisoned");
        dest.queue = Some(queue);
        dest.registry = DestRegistry::new(count as usize);
        dest.plane_size = [plane0, plane1];

        self.dest_buffer_count = count;
        self.dest_queue_min = min_buffers;
        self.dest_num_queued.store(0, Ordering::Release);
        self.initialized = true;

        Ok((count, info))
    }

    /// Whether enough destination buffers are queued for decoding to proceed.
    pub fn ready(&self) -> bool {
        self.initialized && self.dest_num_queued.load(Ordering::Acquire) >= self.dest_queue_min
    }

    /// One non-blocking decode tick: keep the source queue full of parsed frames and collect
    /// completed source buffers.
    pub fn run(&self) -> Result<RunState, DecoderError> {
        if !self.initialized {
            return Err(DecoderError::State);
        }

        let queued = self.dest_num_queued.load(Ordering::Acquire);
        if queued < self.dest_queue_min {
            return Err(DecoderError::Starved { queued, min: self.dest_queue_min });
        }

        // Enable destination streaming once the minimum number of buffers is in place.
        {
            let mut dest = self.dest.lock().expect("decoder lock poisoned");
            if !dest.streaming {
                dest.queue.as_ref().ok_or(DecoderError::State)?.stream_on()?;
                dest.streaming = true;
                log::debug!("enabled streaming for destination queue");
            }
        }

        let mut source = self.source.lock().expect("decoder lock poisoned");
        let SourceState { parser, queue, buffers, buffer_size } = &mut *source;
        let parser = parser.as_mut().ok_or(DecoderError::State)?;
        let queue = queue.as_ref().ok_or(DecoderError::State)?;

        let mut state = RunState::Nop;

        // Queue non-busy source buffers while the parser still has frames.
        for index in 0..buffers.len() {
            if buffers[index].busy {
                continue;
            }

            if parser.finished() {
                state = RunState::Finished;
                break;
            }

            let frame = parser.parse(buffers[index].buffer.map()?, false)?;
            log::debug!("parser extracted {} bytes", frame.size);

            if frame.size == 0 {
                if parser.finished() {
                    state = RunState::Finished;
                }
                break;
            }

            let qbuf = queue
                .try_get_buffer(index)
                .map_err(|err| DecoderError::QueueBuffer(err.to_string()))?;
            qbuf.queue_with_handles(
                vec![DmaBufPlane::new(buffers[index].buffer.share_fd()?, *buffer_size as u32)],
                &[frame.size],
            )
            .map_err(|err| DecoderError::QueueBuffer(err.to_string()))?;
            buffers[index].busy = true;
            log::debug!("queued source with index {}", index);

            if state == RunState::Nop {
                state = RunState::Active;
            }
        }

        // Collect at most one completed source buffer per tick; a dequeue that would block is
        // simply retried on the next tick.
        if buffers.iter().any(|buffer| buffer.busy) {
            if let Ok(dqbuf) = queue.try_dequeue() {
                let index = dqbuf.data.index() as usize;
                buffers
                    .get_mut(index)
                    .ok_or(DecoderError::UnknownBuffer(index))?
                    .busy = false;
                log::debug!("dequeued source with index {}", index);

                if state == RunState::Nop {
                    state = RunState::Active;
                }
            }
        }

        Ok(state)
    }

    /// Queues a display page on the CAPTURE queue, binding it to a buffer index on first use.
    ///
    /// The page's buffer object backs both planes, chroma at an offset of one luma plane.
    pub fn queue_dest(&self, page: PageId, fd: &File) -> Result<(), DecoderError> {
        let mut dest = self.dest.lock().expect("decoder lock poisoned");
        let DestState { queue, registry, plane_size, .. } = &mut *dest;
        let queue = queue.as_ref().ok_or(DecoderError::State)?;

        let index = registry.assign(page)?;

        let handles = vec![
            DmaBufPlane::new(fd.try_clone().map_err(BufferError::Share)?, plane_size[0]),
            DmaBufPlane::with_offset(
                fd.try_clone().map_err(BufferError::Share)?,
                plane_size[1],
                plane_size[0],
            ),
        ];

        let qbuf = queue
            .try_get_buffer(index)
            .map_err(|err| DecoderError::QueueBuffer(err.to_string()))?;
        qbuf.queue_with_handles(handles)
            .map_err(|err| DecoderError::QueueBuffer(err.to_string()))?;

        self.dest_num_queued.fetch_add(1, Ordering::AcqRel);
        log::debug!("queued destination with index {}", index);

        Ok(())
    }

    /// Waits for a decoded picture, returning the page it landed on.
    ///
    /// Returns `None` when the wait timed out, so the caller can observe shared state and call
    /// again.
    pub fn dequeue_dest(&self) -> Result<Option<Dequeued>, DecoderError> {
        // SAFETY: the device fd stays open for as long as `self` lives.
        let fd = unsafe { BorrowedFd::borrow_raw(self.device.as_raw_fd()) };
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];

        match poll(&mut fds, PollTimeout::from(DEQUEUE_TIMEOUT_MS)) {
            Ok(0) => return Ok(None),
            Ok(_) => (),
            Err(Errno::EINTR) => return Ok(None),
            Err(err) => return Err(DecoderError::Poll(err)),
        }

        let mut dest = self.dest.lock().expect("decoder lock poisoned");
        let dqbuf = match dest.queue.as_ref().ok_or(DecoderError::State)?.try_dequeue() {
            Ok(dqbuf) => dqbuf,
            // Raced with the hardware; the next call will pick the buffer up.
            Err(_) => return Ok(None),
        };

        self.dest_num_queued.fetch_sub(1, Ordering::AcqRel);

        let index = dqbuf.data.index() as usize;
        let bytes_used = *dqbuf.data.get_first_plane().bytesused as usize;
        log::debug!("dequeued destination with index {} ({} bytes)", index, bytes_used);

        if bytes_used == 0 {
            return Ok(Some(Dequeued::Drained));
        }

        let page = dest.registry.lookup(index).ok_or(DecoderError::UnknownBuffer(index))?;
        Ok(Some(Dequeued::Frame(page)))
    }

    /// Tells the hardware the stream has ended; the remaining pictures are flushed out and the
    /// capture queue terminates with a zero-byte buffer.
    pub fn stop(&self) -> Result<(), DecoderError> {
        ioctl::decoder_cmd(&*self.device, DecoderCmd::stop())
            .map(|_: DecoderCmd| ())
            .map_err(|err| DecoderError::Stop(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: usize) -> PageId {
        // Test-local constructor; the display hands these out in production.
        crate::display::page_id_for_test(id)
    }

    #[test]
    fn registry_grows_on_demand() {
        let mut registry = DestRegistry::new(3);

        assert_eq!(registry.assign(page(10)).unwrap(), 0);
        assert_eq!(registry.assign(page(11)).unwrap(), 1);
        // Re-queueing a known page reuses its index.
        assert_eq!(registry.assign(page(10)).unwrap(), 0);
        assert_eq!(registry.assign(page(12)).unwrap(), 2);

        assert!(matches!(registry.assign(page(13)), Err(DecoderError::DestinationOverflow)));
    }

    #[test]
    fn registry_lookup() {
        let mut registry = DestRegistry::new(2);
        registry.assign(page(7)).unwrap();

        assert_eq!(registry.lookup(0), Some(page(7)));
        assert_eq!(registry.lookup(1), None);
    }
}
