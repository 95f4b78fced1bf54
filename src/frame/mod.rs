//! Frame handles and the buffer return protocol
//!
//! Captured frames live in a fixed pool of buffers owned by the camera
//! driver. A [`Frame`] is a checked-out buffer: the driver hands it to the
//! pipeline once per capture and the buffer must go back to the pool exactly
//! once, no matter how many consumers saw it.
//!
//! The fan-out path shares a single [`FrameRef`] (`Arc<Frame>`) between all
//! subscriber queues. Each successful enqueue is a refcount increment, each
//! consumer finishing with the frame is a decrement, and the physical
//! release to the pool happens in `Drop` when the count reaches zero. This
//! makes double-release and use-after-release unrepresentable.

use std::sync::Arc;

use bytes::Bytes;

/// Shared handle to a captured frame.
///
/// Cloning is a refcount increment; pixel data is never copied.
pub type FrameRef = Arc<Frame>;

/// Return side of the driver's buffer pool.
///
/// Implementations MUST tolerate a release arriving after the device handle
/// has been closed (a consumer may outlive a disconnect). Such late releases
/// are ignored, never a panic.
pub trait FramePool: Send + Sync + 'static {
    /// Recycle a checked-out buffer into the pool.
    fn release(&self, buf: FrameBuf);
}

/// A buffer checked out from a [`FramePool`].
#[derive(Debug)]
pub struct FrameBuf {
    /// Frame payload (JPEG bytes for an MJPEG stream)
    pub data: Bytes,
    /// Pool slot this buffer occupies
    pub slot: usize,
}

/// One captured frame, borrowed from the driver's buffer pool.
pub struct Frame {
    seq: u64,
    buf: Option<FrameBuf>,
    pool: Option<Arc<dyn FramePool>>,
}

impl Frame {
    /// Wrap a pool-owned buffer into a shared handle.
    ///
    /// Called by source adapters at capture time, before the frame enters
    /// the router. The router itself never allocates.
    pub fn pooled(seq: u64, buf: FrameBuf, pool: Arc<dyn FramePool>) -> FrameRef {
        Arc::new(Self {
            seq,
            buf: Some(buf),
            pool: Some(pool),
        })
    }

    /// Wrap heap-owned bytes into a shared handle.
    ///
    /// No pool is involved; the payload is freed by the last drop. Used by
    /// synthetic sources and tests.
    pub fn from_bytes(seq: u64, data: Bytes) -> FrameRef {
        Arc::new(Self {
            seq,
            buf: Some(FrameBuf { data, slot: 0 }),
            pool: None,
        })
    }

    /// Logical capture sequence number
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Frame payload bytes
    pub fn data(&self) -> &[u8] {
        match self.buf {
            Some(ref buf) => &buf.data,
            None => &[],
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        // Last handle gone: return the buffer to the driver's pool.
        if let (Some(buf), Some(pool)) = (self.buf.take(), self.pool.take()) {
            pool.release(buf);
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("seq", &self.seq)
            .field("len", &self.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingPool {
        released: AtomicU64,
    }

    impl FramePool for CountingPool {
        fn release(&self, _buf: FrameBuf) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn released_once_on_last_drop() {
        let pool = Arc::new(CountingPool::default());
        let frame = Frame::pooled(
            7,
            FrameBuf {
                data: Bytes::from_static(b"jpeg"),
                slot: 2,
            },
            pool.clone(),
        );

        let a = frame.clone();
        let b = frame.clone();
        drop(frame);
        drop(a);
        assert_eq!(pool.released.load(Ordering::SeqCst), 0);

        drop(b);
        assert_eq!(pool.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn heap_frame_needs_no_pool() {
        let frame = Frame::from_bytes(1, Bytes::from_static(b"\xff\xd8\xff\xd9"));
        assert_eq!(frame.seq(), 1);
        assert_eq!(frame.len(), 4);
        drop(frame); // must not panic
    }

    #[test]
    fn data_exposes_payload() {
        let pool = Arc::new(CountingPool::default());
        let frame = Frame::pooled(
            0,
            FrameBuf {
                data: Bytes::from_static(b"abc"),
                slot: 0,
            },
            pool,
        );
        assert_eq!(frame.data(), b"abc");
        assert!(!frame.is_empty());
    }
}
