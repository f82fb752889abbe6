//! Scratch Buffer Pool
//!
//! Bounded pool of byte buffers for rendering entity bodies on the success
//! path. `acquire` hands out an empty buffer that keeps the capacity it grew
//! to on earlier requests; the returned guard releases the buffer back on
//! drop along every exit path, so a `?` in the middle of a handler can never
//! leak a buffer. The pool never grows past `max_pooled` buffers; excess
//! releases simply drop their allocation.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

/// Default capacity a fresh scratch buffer starts with; entity bodies are a
/// few hundred bytes, filtered visit lists occasionally a few KiB.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Bounded pool of reusable byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    buffer_capacity: usize,
    max_pooled: usize,
}

impl BufferPool {
    pub fn new(buffer_capacity: usize, max_pooled: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_pooled)),
            buffer_capacity,
            max_pooled,
        }
    }

    /// Take a cleared buffer out of the pool, allocating one if empty.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let mut buffer = self
            .buffers
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_capacity));
        buffer.clear();
        PooledBuffer { buffer, pool: self }
    }

    fn release(&self, buffer: Vec<u8>) {
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_pooled {
            buffers.push(buffer);
        }
    }

    #[cfg(test)]
    fn pooled(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        // One buffer per worker plus headroom covers the steady state.
        Self::new(DEFAULT_BUFFER_CAPACITY, 16)
    }
}

/// Ownership guard over a pooled buffer; releases on drop.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buffer: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buffer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_reuses_released_capacity() {
        let pool = BufferPool::new(128, 4);
        let ptr = {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"hello");
            buf.as_ptr()
        };
        // Same allocation comes back, cleared.
        let buf = pool.acquire();
        assert_eq!(buf.as_ptr(), ptr);
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 128);
    }

    #[test]
    fn release_happens_on_early_exit_paths() {
        let pool = BufferPool::new(64, 4);

        fn bail(pool: &BufferPool) -> Result<(), ()> {
            let mut buf = pool.acquire();
            buf.push(1);
            Err(())
        }

        assert!(bail(&pool).is_err());
        assert_eq!(pool.pooled(), 1);
    }

    #[test]
    fn pool_is_bounded() {
        let pool = BufferPool::new(64, 2);
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        drop(a);
        drop(b);
        drop(c);
        assert_eq!(pool.pooled(), 2);
    }
}
