// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! kmsdec, a hardware video decoder driving a DRM/KMS display directly.

use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use argh::FromArgs;

use kmsdec::buffer::BufferPool;
use kmsdec::codec;
use kmsdec::decoder::Decoder;
use kmsdec::display::ConnectorKind;
use kmsdec::display::Display;
use kmsdec::input::InputStream;
use kmsdec::pipeline;
use kmsdec::pipeline::PipelineState;
use kmsdec::CodedFormat;
use kmsdec::Resolution;

/// Size of one compressed-stream buffer; limits the maximum compressed frame size.
const INPUT_BUFFER_SIZE: usize = 1024 * 1024;
/// Number of compressed-stream buffers.
const INPUT_BUFFER_COUNT: usize = 2;

/// Decode a compressed video stream with the hardware decoder and present it on a DRM/KMS
/// display.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the compressed input file
    #[argh(positional)]
    input: PathBuf,

    /// input codec: h264, h263, mpeg4, mpeg2, mpeg1, xvid or vp8
    #[argh(option, short = 'c')]
    codec: CodedFormat,

    /// decoder video device; probed by card name when absent
    #[argh(option)]
    device: Option<PathBuf>,

    /// DRM card device; probed by driver name when absent
    #[argh(option)]
    card: Option<PathBuf>,

    /// desired display width (native mode when absent)
    #[argh(option)]
    width: Option<u32>,

    /// desired display height (native mode when absent)
    #[argh(option)]
    height: Option<u32>,

    /// connector to present on: hdmi, vga or any
    #[argh(option, default = "ConnectorKind::Hdmi")]
    connector: ConnectorKind,
}

fn queue_free_page(decoder: &Decoder, display: &mut Display) -> Result<()> {
    let page = display.get_page().context("no free display page")?;
    decoder.queue_dest(page, display.page_fd(page))?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Args = argh::from_env();

    let resolution = match (args.width, args.height) {
        (Some(width), Some(height)) => Some(Resolution { width, height }),
        (None, None) => None,
        _ => bail!("--width and --height must be given together"),
    };

    let input = InputStream::open(&args.input)
        .with_context(|| format!("error opening input file {}", args.input.display()))?;
    let parser = codec::parser_for(args.codec, input);

    let mut display =
        Display::open(args.connector, args.card.as_deref()).context("error opening display")?;
    display.init(resolution).context("error initializing display")?;

    let pool = BufferPool::new(display.card());
    let source_buffers = (0..INPUT_BUFFER_COUNT)
        .map(|_| pool.alloc(INPUT_BUFFER_SIZE))
        .collect::<Result<Vec<_>, _>>()
        .context("error allocating source buffers")?;

    let mut decoder = Decoder::open(args.device.as_deref()).context("error opening decoder")?;
    decoder.set_parser(parser)?;
    decoder.set_source(source_buffers).context("error setting up decoder source")?;
    let (num_pages, info) = decoder.init().context("error initializing decoder")?;

    display.alloc_pages(num_pages, &info, &pool).context("error allocating display pages")?;

    // The decoder needs a minimum of destination buffers queued before it produces pictures;
    // queue them here, plus one more for the presentation thread's first dequeue.
    while !decoder.ready() {
        queue_free_page(&decoder, &mut display)?;
    }
    queue_free_page(&decoder, &mut display)?;

    let state = PipelineState::new();
    pipeline::run(&decoder, &mut display, &state);

    if state.is_error() {
        bail!("decoding pipeline failed");
    }

    Ok(())
}
