//! Counting permit pool with FIFO admission.
//!
//! Free permits live in a bounded mpsc channel. Waiters serialize on a fair
//! `tokio::sync::Mutex` around the receiver, so the caller holding the lock is
//! always the oldest waiter and the rest queue behind it in arrival order.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify, mpsc};

/// Identifier of one permit slot in a pool.
///
/// UUID v4 so slot ids in logs never read like task indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SlotId(uuid::Uuid);

impl SlotId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct PermitInner {
    slot_id: SlotId,
}

struct PoolConnection {
    pool_tx: mpsc::Sender<PermitInner>,
    pool_available: Arc<AtomicUsize>,
}

/// A held permit. Returns to its pool on drop.
#[must_use = "dropping the permit immediately releases it"]
pub struct Permit {
    slot_id: SlotId,
    acquired_at: Instant,
    inner: Option<PermitInner>,
    pool: PoolConnection,
}

impl Permit {
    fn new(inner: PermitInner, pool: PoolConnection) -> Self {
        Self {
            slot_id: inner.slot_id,
            acquired_at: Instant::now(),
            inner: Some(inner),
            pool,
        }
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    /// Time since this permit left the pool.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit")
            .field("slot_id", &self.slot_id)
            .field("held_for", &self.held_for())
            .finish()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };

        // Count first so a racing acquire never observes the token before the
        // increment and underflows the counter.
        self.pool.pool_available.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = self.pool.pool_tx.try_send(inner) {
            self.pool.pool_available.fetch_sub(1, Ordering::AcqRel);
            tracing::error!(slot = %self.slot_id, error = %e, "Failed to return permit to pool");
        } else {
            tracing::trace!(slot = %self.slot_id, "Permit returned to pool");
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PermitError {
    #[error("Permit pool closed")]
    Closed,
}

/// Pool of interchangeable permits with FIFO waiters.
///
/// Closing the pool fails every current and future `acquire`. Permits already
/// held stay valid and still return to the pool on drop.
pub struct PermitPool {
    available_rx: Mutex<mpsc::Receiver<PermitInner>>,
    available_tx: mpsc::Sender<PermitInner>,
    capacity: usize,
    available_count: Arc<AtomicUsize>,
    closed: AtomicBool,
    close_notify: Notify,
}

impl PermitPool {
    /// Create a pool with `capacity` free permits.
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        let (tx, rx) = mpsc::channel(capacity);
        let available_count = Arc::new(AtomicUsize::new(0));

        for _ in 0..capacity {
            let inner = PermitInner {
                slot_id: SlotId::new(),
            };
            // The channel is sized to capacity, so seeding cannot overflow it.
            if tx.try_send(inner).is_ok() {
                available_count.fetch_add(1, Ordering::AcqRel);
            }
        }

        Self {
            available_rx: Mutex::new(rx),
            available_tx: tx,
            capacity,
            available_count,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    fn connection(&self) -> PoolConnection {
        PoolConnection {
            pool_tx: self.available_tx.clone(),
            pool_available: Arc::clone(&self.available_count),
        }
    }

    /// Take a permit without waiting.
    ///
    /// Returns `None` when no permit is free or another caller is already
    /// queued, so a late caller never jumps the FIFO queue.
    pub fn try_acquire(&self) -> Option<Permit> {
        if self.is_closed() {
            return None;
        }
        let mut rx = self.available_rx.try_lock().ok()?;
        let inner = rx.try_recv().ok()?;
        self.available_count.fetch_sub(1, Ordering::AcqRel);
        Some(Permit::new(inner, self.connection()))
    }

    /// Wait for a permit. Callers are admitted in the order they started waiting.
    ///
    /// Fails with [`PermitError::Closed`] if the pool is closed before a
    /// permit is handed over.
    pub async fn acquire(&self) -> Result<Permit, PermitError> {
        // Register for the close signal before checking the flag so a
        // concurrent `close()` cannot slip in between.
        let closed = self.close_notify.notified();
        tokio::pin!(closed);
        closed.as_mut().enable();
        if self.is_closed() {
            return Err(PermitError::Closed);
        }

        let inner = tokio::select! {
            biased;
            _ = &mut closed => return Err(PermitError::Closed),
            inner = async {
                let mut rx = self.available_rx.lock().await;
                rx.recv().await
            } => inner.ok_or(PermitError::Closed)?,
        };

        self.available_count.fetch_sub(1, Ordering::AcqRel);
        Ok(Permit::new(inner, self.connection()))
    }

    /// Stop handing out permits and wake every waiter with `Closed`.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(
                capacity = self.capacity,
                in_use = self.in_use(),
                "Permit pool closed"
            );
        }
        self.close_notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.available_count.load(Ordering::Acquire)
    }

    /// Permits currently held by callers.
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

impl std::fmt::Debug for PermitPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermitPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .field("closed", &self.is_closed())
            .finish()
    }
}
