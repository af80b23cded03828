//! Synthetic frames and scripted collaborators for unit tests.

use std::collections::VecDeque;

use image::Luma;

use crate::error::Result;
use crate::tracker::{FrameSource, RegionLocator};
use crate::types::{Frame, Region};

/// Route `log` output through the test harness; `RUST_LOG=debug` to see it.
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Uniform frame filled with `value`.
pub(crate) fn flat_frame(width: u32, height: u32, value: u8) -> Frame {
    Frame::from_pixel(width, height, Luma([value]))
}

/// Paint a filled `w`×`h` rectangle of `value` with its top-left at (x, y).
pub(crate) fn paint_blob(frame: &mut Frame, x: u32, y: u32, w: u32, h: u32, value: u8) {
    for yy in y..(y + h).min(frame.height()) {
        for xx in x..(x + w).min(frame.width()) {
            frame.put_pixel(xx, yy, Luma([value]));
        }
    }
}

/// Dark frame with one 3×3 glint centered on each of `centers`.
pub(crate) fn glint_frame(width: u32, height: u32, centers: &[(u32, u32)]) -> Frame {
    let mut frame = flat_frame(width, height, 0);
    for &(cx, cy) in centers {
        paint_blob(&mut frame, cx - 1, cy - 1, 3, 3, 255);
    }
    frame
}

/// Hands out a fixed list of frames, then reports end-of-stream.
pub(crate) struct ScriptedSource {
    frames: VecDeque<Frame>,
    pub(crate) pulled: usize,
}

impl ScriptedSource {
    pub(crate) fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            pulled: 0,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_gray_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.pulled += 1;
        }
        Ok(frame)
    }
}

/// Replays a list of locate answers; answers `None` once the list runs out.
pub(crate) struct ScriptedLocator {
    answers: VecDeque<Option<Region>>,
    pub(crate) calls: usize,
}

impl ScriptedLocator {
    pub(crate) fn new(answers: impl IntoIterator<Item = Option<Region>>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            calls: 0,
        }
    }
}

impl RegionLocator for ScriptedLocator {
    fn locate(&mut self, _frame: &Frame) -> Option<Region> {
        self.calls += 1;
        self.answers.pop_front().flatten()
    }
}
