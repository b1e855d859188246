//! Per-seat exclusive locks.
//!
//! The availability check and the insert of the `pending` booking for one
//! seat must run as a single unit. Each `(tenant, seat)` pair gets its own
//! async mutex; unrelated seats never contend. The lock is held only until the
//! pending row is committed, never across a payment call.
//!
//! Across processes the same guarantee comes from the store (the PostgreSQL
//! exclusion constraint), so this registry only needs to be process-local.

use seatflow_core::{SeatId, TenantId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

type SeatKey = (TenantId, SeatId);

/// Entries beyond this are pruned of idle locks on the next acquire.
const PRUNE_THRESHOLD: usize = 1024;

/// Registry of per-seat async mutexes.
#[derive(Debug, Default)]
pub struct SeatLockRegistry {
    locks: Mutex<HashMap<SeatKey, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held seat lock; released on drop.
#[derive(Debug)]
pub struct SeatGuard {
    seat_id: SeatId,
    _guard: OwnedMutexGuard<()>,
}

impl SeatGuard {
    /// Locked seat.
    #[must_use]
    pub const fn seat_id(&self) -> SeatId {
        self.seat_id
    }
}

impl SeatLockRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `seat_id`.
    ///
    /// Waiters are served in FIFO order (tokio's mutex is fair), so the first
    /// request to arrive is the first to check and commit.
    pub async fn acquire(&self, tenant_id: TenantId, seat_id: SeatId) -> SeatGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry((tenant_id, seat_id)).or_default())
        };

        let guard = mutex.lock_owned().await;
        tracing::trace!(seat_id = %seat_id, "Seat lock acquired");
        SeatGuard {
            seat_id,
            _guard: guard,
        }
    }

    /// Number of seats with a registered lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no lock has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_seat_is_exclusive() {
        let registry = Arc::new(SeatLockRegistry::new());
        let tenant = TenantId::new();
        let seat = SeatId::new();

        let guard = registry.acquire(tenant, seat).await;

        let contender = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire(tenant, seat).await.seat_id() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        let acquired = tokio::time::timeout(Duration::from_secs(1), contender).await;
        assert!(matches!(acquired, Ok(Ok(id)) if id == seat));
    }

    #[tokio::test]
    async fn test_different_seats_do_not_contend() {
        let registry = SeatLockRegistry::new();
        let tenant = TenantId::new();

        let _first = registry.acquire(tenant, SeatId::new()).await;
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            registry.acquire(tenant, SeatId::new()),
        )
        .await;

        assert!(second.is_ok());
        assert_eq!(registry.len(), 2);
    }
}
