//! Ready-gated replay queue.
//!
//! Two places in this system must hold items back until a gate opens and
//! then hand them over in arrival order: job events waiting for their
//! record, and outbound session messages waiting for the consumer's
//! readiness signal. [`ReplayQueue`] is the shared mechanism for both.

/// FIFO buffer that holds items until released, then becomes a no-op
/// passthrough.
///
/// The gate is one-way: once [`ReplayQueue::flush`] has run, the queue
/// never buffers again for its lifetime.
#[derive(Debug)]
pub struct ReplayQueue<T> {
    items: Vec<T>,
    released: bool,
}

impl<T> Default for ReplayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReplayQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            released: false,
        }
    }

    /// Offer an item to the queue.
    ///
    /// Before release the item is buffered and `None` is returned. After
    /// release the queue refuses to hold it and hands it straight back,
    /// so the caller delivers it immediately.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.released {
            Some(item)
        } else {
            self.items.push(item);
            None
        }
    }

    /// Open the gate and drain everything buffered so far, in arrival
    /// order. Subsequent calls return an empty vec.
    pub fn flush(&mut self) -> Vec<T> {
        self.released = true;
        std::mem::take(&mut self.items)
    }

    /// Whether the gate has been opened.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
