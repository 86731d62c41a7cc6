//! Receive ring and interrupt-facing port
//!
//! The transport writes incoming bytes straight into the ring storage and
//! then publishes the index of the newest byte. The engine consumes bytes
//! from the poll loop. `head` is written only by the producer and `tail`
//! only by the consumer, so no lock is needed; the head store uses release
//! ordering so the bytes it covers are visible before the index.
//!
//! ```text
//!        tail (last read)          head (last written)
//!            │                          │
//!  ┌───┬───┬─▼─┬───┬───┬───┬───┬───┬───▼┬───┬───┐
//!  │   │   │ x │ u │ u │ u │ u │ u │ u  │   │   │
//!  └───┴───┴───┴───┴───┴───┴───┴───┴────┴───┴───┘
//!                └──── unread bytes ────┘
//! ```

use core::sync::atomic::{AtomicIsize, AtomicU8, AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::config::DEFAULT_RING_CAPACITY;
use crate::error::{Error, Result};

/// Index value meaning "nothing written/read yet"
const UNSET: isize = -1;

/// Single-producer single-consumer byte ring
///
/// `N` is the reserved storage; the active capacity (set by
/// [`RxRing::configure`]) may be smaller.
#[derive(Debug)]
pub struct RxRing<const N: usize = DEFAULT_RING_CAPACITY> {
    buffer: [AtomicU8; N],
    capacity: AtomicUsize,
    head: AtomicIsize,
    tail: AtomicIsize,
}

impl<const N: usize> Default for RxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RxRing<N> {
    /// Create an empty ring using all reserved storage
    pub const fn new() -> Self {
        Self {
            buffer: [const { AtomicU8::new(0) }; N],
            capacity: AtomicUsize::new(N),
            head: AtomicIsize::new(UNSET),
            tail: AtomicIsize::new(UNSET),
        }
    }

    /// Set the active capacity and empty the ring
    pub fn configure(&self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(Error::InvalidArgument);
        }
        if capacity > N {
            return Err(Error::OutOfMemory);
        }
        self.capacity.store(capacity, Ordering::Relaxed);
        self.reset();
        Ok(())
    }

    /// Active capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Forget all indices; the next byte is expected at index 0
    ///
    /// Only call while the producer is stopped.
    pub fn reset(&self) {
        self.head.store(UNSET, Ordering::Release);
        self.tail.store(UNSET, Ordering::Release);
    }

    /// Producer: place a byte at `index` without publishing it
    ///
    /// Mirrors a DMA engine writing into the ring storage. Out-of-range
    /// indices are ignored.
    pub fn store(&self, index: usize, byte: u8) {
        if index < self.capacity() {
            self.buffer[index].store(byte, Ordering::Relaxed);
        }
    }

    /// Producer: publish everything up to and including `newest_index`
    ///
    /// Out-of-range indices are ignored.
    pub fn push_available(&self, newest_index: usize) {
        if newest_index < self.capacity() {
            self.head.store(newest_index as isize, Ordering::Release);
        }
    }

    /// Producer: append one byte and publish it
    ///
    /// Fails with [`Error::RingOverflow`] rather than overwrite unread
    /// data.
    pub fn push(&self, byte: u8) -> Result<()> {
        let capacity = self.capacity();
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        let next = if head == UNSET {
            0
        } else {
            (head as usize + 1) % capacity
        };
        let full = if head == UNSET {
            false
        } else if tail == UNSET {
            // Index 0 is still unread
            next == 0
        } else {
            next == tail as usize
        };
        if full {
            warn!("receive ring overflow");
            return Err(Error::RingOverflow);
        }

        self.buffer[next].store(byte, Ordering::Relaxed);
        self.head.store(next as isize, Ordering::Release);
        Ok(())
    }

    /// Consumer: take the oldest unread byte
    pub fn pop(&self) -> Option<u8> {
        let head = self.head.load(Ordering::Acquire);
        if head == UNSET {
            return None;
        }

        let tail = self.tail.load(Ordering::Relaxed);
        let next = if tail == UNSET {
            0
        } else if tail == head {
            return None;
        } else {
            (tail as usize + 1) % self.capacity()
        };

        let byte = self.buffer[next].load(Ordering::Relaxed);
        self.tail.store(next as isize, Ordering::Release);
        Some(byte)
    }

    /// Number of unread bytes
    pub fn available(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        if head == UNSET {
            0
        } else if tail == UNSET {
            head as usize + 1
        } else {
            let capacity = self.capacity() as isize;
            (head - tail).rem_euclid(capacity) as usize
        }
    }

    /// True if no unread byte exists
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }
}

/// Interrupt-facing half of a display link
///
/// Holds everything the transport's completion context touches: the
/// receive ring and two one-shot signals. All methods take `&self`, so a
/// port can live in a `static` shared between interrupt handlers and the
/// engine.
///
/// ```
/// use dwin_core::Port;
///
/// static PORT: Port<64> = Port::new();
///
/// // From the UART receive-event interrupt:
/// PORT.on_rx_event(3);
/// // From the transmit-complete interrupt:
/// PORT.on_tx_complete();
/// ```
pub struct Port<const N: usize = DEFAULT_RING_CAPACITY> {
    ring: RxRing<N>,
    tx_complete: Signal<CriticalSectionRawMutex, ()>,
    fault: Signal<CriticalSectionRawMutex, ()>,
}

impl<const N: usize> Default for Port<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for Port<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Port")
            .field("ring", &self.ring)
            .field("tx_complete", &self.tx_complete.signaled())
            .field("fault", &self.fault.signaled())
            .finish()
    }
}

impl<const N: usize> Port<N> {
    /// Create an idle port
    pub const fn new() -> Self {
        Self {
            ring: RxRing::new(),
            tx_complete: Signal::new(),
            fault: Signal::new(),
        }
    }

    /// The receive ring
    pub fn ring(&self) -> &RxRing<N> {
        &self.ring
    }

    /// Receive progress: `last_index` is the position of the newest byte
    pub fn on_rx_event(&self, last_index: usize) {
        self.ring.push_available(last_index);
    }

    /// The frame handed to the transport has been sent
    pub fn on_tx_complete(&self) {
        self.tx_complete.signal(());
    }

    /// The transport reported an error
    pub fn on_error(&self) {
        self.fault.signal(());
    }

    /// True if an error has been signalled but not yet handled
    pub fn has_fault(&self) -> bool {
        self.fault.signaled()
    }

    /// Empty the ring and drop pending signals
    ///
    /// Only call while the transport is stopped.
    pub fn reset(&self) {
        self.ring.reset();
        self.tx_complete.reset();
        self.fault.reset();
    }

    pub(crate) fn take_tx_complete(&self) -> bool {
        self.tx_complete.try_take().is_some()
    }

    pub(crate) fn take_fault(&self) -> bool {
        self.fault.try_take().is_some()
    }
}
