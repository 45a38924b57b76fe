//! Heap probing and working-set accounting
//!
//! Every byte the pipeline holds beyond its inline state is registered with a
//! [`WorkingSet`]. Registration is tied to ownership: a [`Reservation`] or
//! [`TrackedBuffer`] gives its bytes back when dropped, on success and error
//! paths alike, so the meter's high watermark is the true peak.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ImageError;

/// Source of free-heap figures
pub trait HeapGauge {
    /// Free bytes in the allocator
    fn free_heap(&self) -> usize;

    /// Largest contiguous allocation that would currently succeed
    fn largest_free_block(&self) -> usize {
        self.free_heap()
    }
}

/// Heap gauge reporting a settable figure; clones share the value
#[derive(Debug, Clone)]
pub struct FixedHeap {
    free: Arc<AtomicUsize>,
}

impl FixedHeap {
    pub fn new(free: usize) -> Self {
        Self {
            free: Arc::new(AtomicUsize::new(free)),
        }
    }

    pub fn set(&self, free: usize) {
        self.free.store(free, Ordering::Relaxed);
    }
}

impl HeapGauge for FixedHeap {
    fn free_heap(&self) -> usize {
        self.free.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    current: AtomicUsize,
    peak: AtomicUsize,
    allocations: AtomicUsize,
}

/// Shared meter of bytes currently held by the pipeline
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    counters: Arc<Counters>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held right now
    pub fn current(&self) -> usize {
        self.counters.current.load(Ordering::Relaxed)
    }

    /// High watermark since creation or the last [`WorkingSet::reset_peak`]
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::Relaxed)
    }

    /// Number of reservations ever made
    pub fn allocations(&self) -> usize {
        self.counters.allocations.load(Ordering::Relaxed)
    }

    /// Restart the watermark from the current level
    pub fn reset_peak(&self) {
        self.counters.peak.store(self.current(), Ordering::Relaxed);
    }

    /// Register `bytes` until the returned guard drops
    pub fn reserve(&self, bytes: usize) -> Reservation {
        let now = self.counters.current.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.counters.peak.fetch_max(now, Ordering::Relaxed);
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        Reservation {
            set: self.clone(),
            bytes,
        }
    }
}

/// Bytes registered with a [`WorkingSet`], released on drop
#[derive(Debug)]
pub struct Reservation {
    set: WorkingSet,
    bytes: usize,
}

impl Reservation {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.set
            .counters
            .current
            .fetch_sub(self.bytes, Ordering::Relaxed);
    }
}

/// Fixed-capacity byte buffer whose capacity is charged to a [`WorkingSet`]
///
/// The capacity is reserved once up front and never grows; writes past it
/// fail instead of reallocating.
#[derive(Debug)]
pub struct TrackedBuffer {
    data: Vec<u8>,
    _reservation: Reservation,
}

impl TrackedBuffer {
    /// Empty buffer able to hold `capacity` bytes
    pub fn with_capacity(set: &WorkingSet, capacity: usize) -> Result<Self, ImageError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| ImageError::Memory {
                needed: capacity,
                free: 0,
            })?;
        let reservation = set.reserve(data.capacity());
        Ok(Self {
            data,
            _reservation: reservation,
        })
    }

    /// Zero-filled buffer of exactly `len` bytes, for direct reads
    pub fn zeroed(set: &WorkingSet, len: usize) -> Result<Self, ImageError> {
        let mut buffer = Self::with_capacity(set, len)?;
        buffer.data.resize(len, 0);
        Ok(buffer)
    }

    /// Append bytes without growing the allocation
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), ImageError> {
        let needed = self.data.len() + bytes.len();
        if needed > self.data.capacity() {
            return Err(ImageError::Memory {
                needed,
                free: self.data.capacity() - self.data.len(),
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
