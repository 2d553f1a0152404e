// src/encode/frame_queue.rs - Bounded raw-frame queue
//
// Core features:
// - Single-consumer, multi-producer FIFO with one mutex around
//   enqueue/dequeue/clear
// - Open/closed gate: pushes outside a running session are silent no-ops
// - Explicit capacity with drop-oldest or drop-newest overflow policy
// - Drain wait wakes on push, gate close, or timeout so the worker never
//   blocks past a stop request

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use log::debug;

use crate::encode::frame::RawFrame;

/// Default queue capacity: ~8 seconds of input at the default 15 fps.
pub const DEFAULT_QUEUE_CAPACITY: usize = 120;

/// What to do with an incoming frame when the queue is at capacity.
///
/// `DropOldest` keeps latency bounded by sacrificing the stalest pending
/// frame; `DropNewest` keeps the backlog intact and discards the arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    DropOldest,
    DropNewest,
}

struct QueueInner {
    frames: VecDeque<RawFrame>,
    open: bool,
    dropped: u64,
}

/// Bounded FIFO of raw frames awaiting encode.
///
/// Shared between arbitrary producer threads and exactly one consumer (the
/// encode worker). The gate is opened by the worker once the session reaches
/// `Running` and closed on stop; a push against a closed gate drops the
/// frame and reports it, which is not an error: callers should not need to
/// track encoder lifecycle to feed frames.
pub struct FrameQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

impl FrameQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> FrameQueue {
        FrameQueue {
            inner: Mutex::new(QueueInner {
                frames: VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY)),
                open: false,
                dropped: 0,
            }),
            available: Condvar::new(),
            capacity,
            policy,
        }
    }

    /// Enqueue a frame without blocking.
    ///
    /// Returns `true` if the frame entered the queue, `false` if it was
    /// dropped (gate closed, or drop-newest overflow). The return value is
    /// informational; a drop is part of the contract, not a failure.
    pub fn push(&self, frame: RawFrame) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.open {
            inner.dropped += 1;
            return false;
        }
        if inner.frames.len() >= self.capacity {
            inner.dropped += 1;
            match self.policy {
                OverflowPolicy::DropOldest => {
                    inner.frames.pop_front();
                }
                OverflowPolicy::DropNewest => {
                    if inner.dropped % 64 == 1 {
                        debug!("frame queue full, {} frames dropped so far", inner.dropped);
                    }
                    return false;
                }
            }
        }
        inner.frames.push_back(frame);
        drop(inner);
        self.available.notify_one();
        true
    }

    /// Take the next frame, waiting at most `timeout`.
    ///
    /// Called only by the encode worker. Returns `None` when the wait timed
    /// out or the gate closed; the worker re-checks session state and either
    /// loops or tears down.
    pub fn drain(&self, timeout: Duration) -> Option<RawFrame> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(frame) = inner.frames.pop_front() {
                return Some(frame);
            }
            if !inner.open {
                return None;
            }
            let (guard, wait) = self.available.wait_timeout(inner, timeout).unwrap();
            inner = guard;
            if wait.timed_out() {
                return inner.frames.pop_front();
            }
        }
    }

    /// Open the gate; pushes are accepted until [`close`](Self::close).
    pub fn open(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.open = true;
    }

    /// Close the gate and wake every waiting drain.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.open = false;
        drop(inner);
        self.available.notify_all();
    }

    /// Release all pending frames. Runs under the queue mutex, so no
    /// concurrent push can re-populate the queue mid-clear.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.clear();
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total frames dropped by the gate or the overflow policy.
    pub fn dropped_frames(&self) -> u64 {
        self.inner.lock().unwrap().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Instant;

    use crate::encode::frame::PixelFormat;

    fn make_frame(tag: u8) -> RawFrame {
        RawFrame::new(Bytes::from(vec![tag]), PixelFormat::Nv12, 2, 2)
    }

    #[test]
    fn test_push_drain_fifo() {
        let queue = FrameQueue::new(8, OverflowPolicy::DropOldest);
        queue.open();
        assert!(queue.push(make_frame(1)));
        assert!(queue.push(make_frame(2)));
        assert_eq!(queue.len(), 2);

        let first = queue.drain(Duration::from_millis(10)).unwrap();
        assert_eq!(first.data[0], 1);
        let second = queue.drain(Duration::from_millis(10)).unwrap();
        assert_eq!(second.data[0], 2);
        assert!(queue.drain(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_push_on_closed_gate_is_silent_noop() {
        let queue = FrameQueue::new(8, OverflowPolicy::DropOldest);
        assert!(!queue.push(make_frame(1)));
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.dropped_frames(), 1);

        queue.open();
        assert!(queue.push(make_frame(2)));
        queue.close();
        assert!(!queue.push(make_frame(3)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drop_oldest_overflow() {
        let queue = FrameQueue::new(2, OverflowPolicy::DropOldest);
        queue.open();
        queue.push(make_frame(1));
        queue.push(make_frame(2));
        queue.push(make_frame(3));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped_frames(), 1);
        // Oldest was sacrificed; 2 and 3 survive
        assert_eq!(queue.drain(Duration::from_millis(1)).unwrap().data[0], 2);
        assert_eq!(queue.drain(Duration::from_millis(1)).unwrap().data[0], 3);
    }

    #[test]
    fn test_drop_newest_overflow() {
        let queue = FrameQueue::new(2, OverflowPolicy::DropNewest);
        queue.open();
        assert!(queue.push(make_frame(1)));
        assert!(queue.push(make_frame(2)));
        assert!(!queue.push(make_frame(3)));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped_frames(), 1);
        assert_eq!(queue.drain(Duration::from_millis(1)).unwrap().data[0], 1);
    }

    #[test]
    fn test_clear_releases_everything() {
        let queue = FrameQueue::new(8, OverflowPolicy::DropOldest);
        queue.open();
        queue.push(make_frame(1));
        queue.push(make_frame(2));
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.drain(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_close_wakes_blocked_drain() {
        let queue = Arc::new(FrameQueue::new(8, OverflowPolicy::DropOldest));
        queue.open();

        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                let started = Instant::now();
                let frame = queue.drain(Duration::from_secs(10));
                (frame, started.elapsed())
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        queue.close();

        let (frame, waited) = consumer.join().unwrap();
        assert!(frame.is_none());
        // Woken by close, not by the 10s timeout
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn test_drain_receives_concurrent_push() {
        let queue = Arc::new(FrameQueue::new(8, OverflowPolicy::DropOldest));
        queue.open();

        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.drain(Duration::from_secs(10)))
        };

        std::thread::sleep(Duration::from_millis(20));
        queue.push(make_frame(9));

        let frame = consumer.join().unwrap().unwrap();
        assert_eq!(frame.data[0], 9);
    }
}
