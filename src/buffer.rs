//! Byte buffer pooling for frame generation.
//!
//! Buffers are checked out from a [`BufferPool`] as a [`PooledBuffer`] that hands the
//! buffer back when dropped, whichever way the borrowing code exits.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;

/// Default granularity, in bytes, of [`BucketBufferPool`] capacities.
pub const DEFAULT_BUCKET_SIZE: usize = 1024;

/// Default number of idle buffers retained per bucket.
pub const DEFAULT_MAX_IDLE_PER_BUCKET: usize = 64;

/// Default upper bound of the bytes held by idle buffers across all buckets.
pub const DEFAULT_MAX_IDLE_BYTES: usize = 8 * 1024 * 1024;

/// Source of byte buffers, shared by every connection of a process.
pub trait BufferPool {
    /// Returns a zeroed buffer whose length is exactly `capacity`.
    fn acquire(&self, capacity: usize) -> Vec<u8>;

    /// Takes a buffer back.
    fn release(&self, buffer: Vec<u8>);

    /// Takes a buffer back and hands its contents to the caller as a vector it owns.
    fn release_owned(&self, buffer: Vec<u8>) -> Vec<u8> {
        let owned = buffer.to_vec();
        self.release(buffer);
        owned
    }

    /// Checks out a buffer that goes back to this pool when dropped.
    fn acquire_scoped(&self, capacity: usize) -> PooledBuffer<'_, Self>
    where
        Self: Sized,
    {
        PooledBuffer {
            buffer: Some(self.acquire(capacity)),
            pool: self,
        }
    }
}

impl<P: BufferPool> BufferPool for &P {
    fn acquire(&self, capacity: usize) -> Vec<u8> {
        (**self).acquire(capacity)
    }

    fn release(&self, buffer: Vec<u8>) {
        (**self).release(buffer)
    }

    fn release_owned(&self, buffer: Vec<u8>) -> Vec<u8> {
        (**self).release_owned(buffer)
    }
}

impl<P: BufferPool> BufferPool for std::sync::Arc<P> {
    fn acquire(&self, capacity: usize) -> Vec<u8> {
        (**self).acquire(capacity)
    }

    fn release(&self, buffer: Vec<u8>) {
        (**self).release(buffer)
    }

    fn release_owned(&self, buffer: Vec<u8>) -> Vec<u8> {
        (**self).release_owned(buffer)
    }
}

/// Pool that allocates every buffer from the heap and drops what comes back.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapBufferPool;

impl BufferPool for HeapBufferPool {
    #[inline]
    fn acquire(&self, capacity: usize) -> Vec<u8> {
        vec![0u8; capacity]
    }

    #[inline]
    fn release(&self, _buffer: Vec<u8>) {}

    #[inline]
    fn release_owned(&self, buffer: Vec<u8>) -> Vec<u8> {
        buffer
    }
}

/// Buffer checked out from a [`BufferPool`]. Dereferences to the bytes written so far
/// (see [`PooledBuffer::truncate`]) and returns the buffer to the pool on drop.
pub struct PooledBuffer<'a, P: BufferPool> {
    buffer: Option<Vec<u8>>,
    pool: &'a P,
}

impl<P: BufferPool> PooledBuffer<'_, P> {
    /// Shortens the visible bytes to `len`. The capacity stays with the buffer.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.truncate(len);
        }
    }

    /// Detaches the buffer from the pool.
    pub fn into_inner(mut self) -> Vec<u8> {
        self.buffer.take().unwrap_or_default()
    }
}

impl<P: BufferPool> Deref for PooledBuffer<'_, P> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.buffer.as_deref().unwrap_or_default()
    }
}

impl<P: BufferPool> DerefMut for PooledBuffer<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buffer.as_deref_mut().unwrap_or_default()
    }
}

impl<P: BufferPool> Debug for PooledBuffer<'_, P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer").field("len", &self.len()).finish()
    }
}

impl<P: BufferPool> Drop for PooledBuffer<'_, P> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}

/// Thread safe pool that keeps idle buffers in buckets keyed by capacity rounded up to
/// a multiple of the bucket size.
///
/// Retention is bounded twice: per bucket by buffer count and across buckets by the
/// total bytes held. Buffers released beyond either bound are dropped.
#[derive(Debug)]
pub struct BucketBufferPool {
    bucket_size: usize,
    max_idle_per_bucket: usize,
    max_idle_bytes: usize,
    idle: Mutex<Idle>,
    stats: PoolStats,
}

#[derive(Debug, Default)]
struct Idle {
    buckets: HashMap<usize, Vec<Vec<u8>>>,
    bytes: usize,
}

/// Counters of a [`BucketBufferPool`].
#[derive(Debug, Default)]
pub struct PoolStats {
    acquired: AtomicU64,
    released: AtomicU64,
    allocated: AtomicU64,
}

impl PoolStats {
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Acquisitions that could not be served from an idle buffer.
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Buffers currently checked out.
    pub fn outstanding(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }
}

impl Default for BucketBufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SIZE, DEFAULT_MAX_IDLE_PER_BUCKET)
    }
}

impl BucketBufferPool {
    pub fn new(bucket_size: usize, max_idle_per_bucket: usize) -> BucketBufferPool {
        assert!(bucket_size > 0, "bucket_size must be greater than zero");
        Self {
            bucket_size,
            max_idle_per_bucket,
            max_idle_bytes: DEFAULT_MAX_IDLE_BYTES,
            idle: Mutex::new(Idle::default()),
            stats: PoolStats::default(),
        }
    }

    pub fn with_max_idle_bytes(self, max_idle_bytes: usize) -> BucketBufferPool {
        Self { max_idle_bytes, ..self }
    }

    #[inline]
    pub const fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.lock().buckets.values().map(Vec::len).sum()
    }

    /// Bytes of capacity held by idle buffers.
    pub fn idle_bytes(&self) -> usize {
        self.lock().bytes
    }

    #[inline]
    fn bucket_of(&self, capacity: usize) -> usize {
        capacity.div_ceil(self.bucket_size).max(1) * self.bucket_size
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Idle> {
        // a panic while holding the lock cannot leave a bucket half updated
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BufferPool for BucketBufferPool {
    fn acquire(&self, capacity: usize) -> Vec<u8> {
        self.stats.acquired.fetch_add(1, Ordering::Relaxed);
        let bucket = self.bucket_of(capacity);
        let idle = {
            let mut idle = self.lock();
            let buffer = idle.buckets.get_mut(&bucket).and_then(Vec::pop);
            if buffer.is_some() {
                idle.bytes -= bucket;
            }
            buffer
        };
        let mut buffer = match idle {
            Some(buffer) => buffer,
            None => {
                trace!("allocating buffer from bucket {bucket}");
                self.stats.allocated.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(bucket)
            }
        };
        buffer.resize(capacity, 0u8);
        buffer
    }

    fn release(&self, mut buffer: Vec<u8>) {
        self.stats.released.fetch_add(1, Ordering::Relaxed);
        // buffers that grew or shrank away from their bucket are simply dropped
        let bucket = self.bucket_of(buffer.capacity());
        if bucket != buffer.capacity() {
            return;
        }
        buffer.clear();
        let mut idle = self.lock();
        if idle.bytes + bucket > self.max_idle_bytes {
            return;
        }
        let Idle { buckets, bytes } = &mut *idle;
        let retained = buckets.entry(bucket).or_default();
        if retained.len() < self.max_idle_per_bucket {
            retained.push(buffer);
            *bytes += bucket;
        }
    }
}
