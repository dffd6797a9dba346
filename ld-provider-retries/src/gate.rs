//! Bounded concurrency for remote calls.
//!
//! The gate is a semaphore shared by every call site of one client. A slot is
//! held only while a remote call runs. Nested executors in the same task
//! borrow the slot already leased to that task instead of waiting for a
//! second one. Borrowers take turns, so one lease backs at most one call at a
//! time, and a backoff hands the slot back only once no borrower is mid-call.

use crate::error::{ExecError, Suspension};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::trace;

type Slot = Option<OwnedSemaphorePermit>;

/// Slot lent to the futures running under one [`ConcurrencyGate::run`].
struct Lease {
    gate: usize,
    slot: Mutex<Slot>,
}

tokio::task_local! {
    static LEASE: Arc<Lease>;
}

/// Caps the number of remote calls in flight.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ConcurrencyGate {
    /// Capacity used when none is configured.
    pub const DEFAULT_CAPACITY: usize = 1;

    /// Create a gate. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Maximum concurrent calls.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Close the gate. Pending and future acquisitions fail with [`ExecError::GateClosed`].
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.semaphore) as usize
    }

    /// The lease this task holds from this gate, if any.
    fn lease(&self) -> Option<Arc<Lease>> {
        LEASE
            .try_with(Arc::clone)
            .ok()
            .filter(|lease| lease.gate == self.id())
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Result<OwnedSemaphorePermit, ExecError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecError::Cancelled(Suspension::AwaitingSlot)),
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| ExecError::GateClosed)
            }
        }
    }

    async fn borrow<'a>(
        &self,
        lease: &'a Lease,
        cancel: &CancellationToken,
        suspension: Suspension,
    ) -> Result<MutexGuard<'a, Slot>, ExecError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecError::Cancelled(suspension)),
            slot = lease.slot.lock() => Ok(slot),
        }
    }

    /// Run `fut` under a fresh lease backed by `permit`, handing back whatever
    /// permit the lease still holds afterwards.
    async fn scoped<Fut: Future>(&self, permit: OwnedSemaphorePermit, fut: Fut) -> (Fut::Output, Slot) {
        let lease = Arc::new(Lease {
            gate: self.id(),
            slot: Mutex::new(Some(permit)),
        });
        let output = LEASE.scope(Arc::clone(&lease), fut).await;
        let permit = lease.slot.lock().await.take();
        (output, permit)
    }

    /// Run a future while holding a slot.
    ///
    /// If the current task already leases a slot from this gate, waits for its
    /// turn on that slot instead of taking a second one. Fails if `cancel`
    /// fires first or the gate is closed.
    pub async fn run<Fut>(&self, cancel: &CancellationToken, fut: Fut) -> Result<Fut::Output, ExecError>
    where
        Fut: Future,
    {
        let Some(parent) = self.lease() else {
            let permit = self.acquire(cancel).await?;
            trace!(in_flight = self.in_flight(), capacity = self.capacity, "Acquired slot");
            return Ok(self.scoped(permit, fut).await.0);
        };

        let mut slot = self.borrow(&parent, cancel, Suspension::AwaitingSlot).await?;
        let permit = match slot.take() {
            Some(permit) => permit,
            None => self.acquire(cancel).await?,
        };
        let (output, permit) = self.scoped(permit, fut).await;
        *slot = permit;
        Ok(output)
    }

    /// Run a fallible closure while holding a slot.
    pub async fn with_slot<F, Fut, T, E>(&self, cancel: &CancellationToken, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ExecError>,
    {
        self.run(cancel, f()).await?
    }

    /// Sleep between attempts without occupying a slot.
    ///
    /// If the task leases a slot from this gate, the slot goes back to the
    /// semaphore for the sleep (after any borrower mid-call finishes) and is
    /// re-acquired afterwards.
    pub async fn pause(&self, cancel: &CancellationToken, wait: Duration) -> Result<(), ExecError> {
        let lease = self.lease();
        let mut released = false;
        if let Some(lease) = &lease {
            let mut slot = self.borrow(lease, cancel, Suspension::BackingOff).await?;
            released = slot.take().is_some();
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecError::Cancelled(Suspension::BackingOff)),
            _ = sleep(wait) => {}
        }

        if let (true, Some(lease)) = (released, &lease) {
            let mut slot = self.borrow(lease, cancel, Suspension::AwaitingSlot).await?;
            if slot.is_none() {
                *slot = Some(self.acquire(cancel).await?);
            }
        }
        Ok(())
    }
}
