// Copyright 2024 The kmsdec Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Two-thread orchestration of decoder and display.
//!
//! The decoder thread spins [`Decoder::run`] to keep the hardware fed with compressed frames.
//! The presentation thread dequeues decoded pictures, flips them onto the screen and hands the
//! retired pages back to the decoder. The only state the threads share directly is a pair of
//! sticky bits: once `finished` or `error` is set, both loops wind down.

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use crate::decoder::Decoder;
use crate::decoder::Dequeued;
use crate::decoder::RunState;
use crate::display::Display;

const FINISHED: u32 = 1 << 0;
const ERROR: u32 = 1 << 1;

/// Sticky pipeline state bits shared by both threads. Setting is monotonic; a bit, once set,
/// is never cleared.
#[derive(Debug, Default)]
pub struct PipelineState(AtomicU32);

impl PipelineState {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_finished(&self) {
        self.0.fetch_or(FINISHED, Ordering::Release);
    }

    pub fn set_error(&self) {
        self.0.fetch_or(ERROR, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.0.load(Ordering::Acquire) & FINISHED != 0
    }

    pub fn is_error(&self) -> bool {
        self.0.load(Ordering::Acquire) & ERROR != 0
    }

    pub fn should_stop(&self) -> bool {
        self.0.load(Ordering::Acquire) & (FINISHED | ERROR) != 0
    }
}

/// Runs the pipeline to completion.
///
/// The presentation loop runs on a scoped thread; the decode loop runs on the calling thread.
/// Returns once both have exited; the caller inspects `state` for the outcome.
pub fn run(decoder: &Decoder, display: &mut Display, state: &PipelineState) {
    thread::scope(|scope| {
        scope.spawn(move || presentation_loop(decoder, display, state));
        decode_loop(decoder, state);
    });
}

fn decode_loop(decoder: &Decoder, state: &PipelineState) {
    loop {
        if state.should_stop() {
            break;
        }

        match decoder.run() {
            Ok(RunState::Active) => (),
            Ok(RunState::Nop) => thread::sleep(Duration::from_millis(1)),
            Ok(RunState::Finished) => {
                log::info!("parser has extracted all frames");
                // Flush the hardware so the capture side sees a drain marker.
                match decoder.stop() {
                    Ok(()) => state.set_finished(),
                    Err(err) => {
                        log::error!("failed to stop decoder: {}", err);
                        state.set_error();
                    }
                }
                break;
            }
            Err(err) => {
                log::error!("decoder run failed: {}", err);
                state.set_error();
                break;
            }
        }
    }
}

fn presentation_loop(decoder: &Decoder, display: &mut Display, state: &PipelineState) {
    'outer: loop {
        if state.is_error() {
            break;
        }

        let page = match decoder.dequeue_dest() {
            // Timed out; re-check the shared bits.
            Ok(None) => continue,
            Ok(Some(Dequeued::Drained)) => {
                state.set_finished();
                break;
            }
            Ok(Some(Dequeued::Frame(page))) => page,
            Err(err) => {
                log::error!("destination dequeue failed: {}", err);
                state.set_error();
                break;
            }
        };

        if let Err(err) = display.issue_flip(page) {
            log::error!("page flip failed: {}", err);
            state.set_error();
            break;
        }

        // Replace the page we just consumed; every page may be held until a flip retires one.
        let next = loop {
            if let Some(page) = display.get_page() {
                break page;
            }
            if let Err(err) = display.wait_for_flip() {
                log::error!("waiting for page flip failed: {}", err);
                state.set_error();
                break 'outer;
            }
        };

        if let Err(err) = decoder.queue_dest(next, display.page_fd(next)) {
            log::error!("destination queue failed: {}", err);
            state.set_error();
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_bits_are_sticky() {
        let state = PipelineState::new();
        assert!(!state.should_stop());

        state.set_finished();
        assert!(state.is_finished());
        assert!(!state.is_error());
        assert!(state.should_stop());

        // Setting one bit never clears the other.
        state.set_error();
        assert!(state.is_finished());
        assert!(state.is_error());
    }

    #[test]
    fn error_alone_stops_the_pipeline() {
        let state = PipelineState::new();
        state.set_error();
        assert!(state.should_stop());
        assert!(!state.is_finished());
    }
}
