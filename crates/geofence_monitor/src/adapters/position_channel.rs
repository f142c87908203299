// Rust guideline compliant 2026-08-27

//! In-process adapter for the `PositionSink` and `PositionSource` ports.
//!
//! An empty channel cooperatively yields rather than signaling `Closed`.
//! Explicit `close()` signals end-of-stream to the reader. Designed for
//! `tokio::join!` on a `current_thread` runtime.

use std::cell::RefCell;
use std::collections::VecDeque;

use domain::{Position, PositionError, PositionSink, PositionSource};

// ---------------------------------------------------------------------------
// Inner state
// ---------------------------------------------------------------------------

/// Heap storage for queued fixes, the most recent fix, and the close flag.
#[derive(Debug)]
struct PositionChannelInner {
    queue: VecDeque<Position>,
    last: Option<Position>,
    closed: bool,
}

// ---------------------------------------------------------------------------
// PositionChannel
// ---------------------------------------------------------------------------

/// `PositionSink` + `PositionSource` adapter connecting the simulator to the
/// engine in-process.
///
/// Shares a single `RefCell` across both trait impls. Safe on
/// `current_thread` runtimes because borrows are always dropped before any
/// `.await` point inside `next_position`, preventing re-entrant borrow
/// panics.
#[derive(Debug)]
pub struct PositionChannel {
    inner: RefCell<PositionChannelInner>,
}

impl PositionChannel {
    /// Create an empty, open channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(PositionChannelInner {
                queue: VecDeque::new(),
                last: None,
                closed: false,
            }),
        }
    }

    /// Signal end-of-stream. Idempotent: safe to call multiple times.
    pub fn close(&self) {
        self.inner.borrow_mut().closed = true;
    }
}

impl Default for PositionChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSink for PositionChannel {
    /// Queue `position` for the reader if the channel is open.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Closed`] if the channel has been closed.
    async fn publish(&self, position: Position) -> Result<(), PositionError> {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            return Err(PositionError::Closed);
        }
        inner.last = Some(position.clone());
        inner.queue.push_back(position);
        Ok(())
    }
}

impl PositionSource for PositionChannel {
    /// Pop the oldest queued fix; yield and retry if empty and open.
    ///
    /// Loops via `tokio::task::yield_now` while the channel is open but
    /// empty, allowing other futures in a `tokio::join!` to make progress.
    /// The `RefCell` borrow is always released before the yield point.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Closed`] when the channel is drained and
    /// closed.
    async fn next_position(&self) -> Result<Position, PositionError> {
        loop {
            // Scope the borrow so it is dropped before yield_now().await.
            let result = {
                let mut inner = self.inner.borrow_mut();
                if let Some(fix) = inner.queue.pop_front() {
                    Some(Ok(fix))
                } else if inner.closed {
                    Some(Err(PositionError::Closed))
                } else {
                    None
                }
            }; // borrow dropped here

            match result {
                Some(r) => return r,
                None => tokio::task::yield_now().await,
            }
        }
    }

    /// Return the most recently published fix without consuming the queue.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Transport`] when nothing has been published
    /// yet.
    async fn current_position(&self) -> Result<Position, PositionError> {
        self.inner.borrow().last.clone().ok_or(PositionError::Transport {
            reason: "no fix published yet".to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
