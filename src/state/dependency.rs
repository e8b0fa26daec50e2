//! Dependency detection.
//!
//! A stack of tracking frames. [`Observable::get`](super::Observable::get)
//! reports itself to the innermost frame; [`track`] collects what a closure
//! read, and [`ignore`] hides reads from any enclosing frame.
//!
//! Frames nest: an effect created while another effect runs gets its own
//! frame, so a region's tracking never picks up what its descendants read.

use std::cell::RefCell;

use super::observable::Observable;

struct Frame {
    reads: Option<Vec<Observable>>,
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Pops the frame it pushed, even if the tracked closure unwinds.
struct FrameGuard;

impl FrameGuard {
    fn push(reads: Option<Vec<Observable>>) -> Self {
        FRAMES.with(|frames| frames.borrow_mut().push(Frame { reads }));
        FrameGuard
    }

    fn pop(self) -> Option<Vec<Observable>> {
        let frame = FRAMES.with(|frames| frames.borrow_mut().pop());
        std::mem::forget(self);
        frame.and_then(|f| f.reads)
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            frames.borrow_mut().pop();
        });
    }
}

/// Run `f`, returning its result and every distinct observable it read.
pub fn track<R>(f: impl FnOnce() -> R) -> (R, Vec<Observable>) {
    let guard = FrameGuard::push(Some(Vec::new()));
    let result = f();
    let reads = guard.pop().unwrap_or_default();
    (result, reads)
}

/// Run `f` without letting its reads reach an enclosing frame.
pub fn ignore<R>(f: impl FnOnce() -> R) -> R {
    let guard = FrameGuard::push(None);
    let result = f();
    guard.pop();
    result
}

/// Whether a tracking frame is currently collecting reads.
pub fn is_tracking() -> bool {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .last()
            .is_some_and(|frame| frame.reads.is_some())
    })
}

/// Record a read in the innermost frame.
pub(crate) fn register_read(observable: &Observable) {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        if let Some(Frame { reads: Some(reads) }) = frames.last_mut() {
            if !reads.iter().any(|seen| seen.ptr_eq(observable)) {
                reads.push(observable.clone());
            }
        }
    });
}
