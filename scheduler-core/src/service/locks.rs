//! Per-display serialization (§5): `mark_played` and rollover for the same
//! display must not interleave. A single process-wide map of one
//! `tokio::sync::Mutex` per display stands in for the "per-row lock (or
//! equivalent)" the spec asks for — the Scheduling Store is Postgres in
//! production, but a single scheduler process also serves every poll, so
//! this in-process lock already gives the required ordering without a
//! round-trip to an advisory lock for every mark-played call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::DisplayId;

#[derive(Clone, Default)]
pub struct DisplayLocks {
    inner: Arc<SyncMutex<HashMap<DisplayId, Arc<AsyncMutex<()>>>>>,
}

impl DisplayLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `display_id`, creating it on first use.
    pub async fn acquire(&self, display_id: &DisplayId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock();
            map.entry(display_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_display_serializes_concurrent_acquires() {
        let locks = DisplayLocks::new();
        let display = DisplayId::from_string("ABC123".to_string());

        let guard = locks.acquire(&display).await;
        let locks2 = locks.clone();
        let display2 = display.clone();
        let handle = tokio::spawn(async move {
            let _second = locks2.acquire(&display2).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        drop(guard);
        handle.await.unwrap();
    }
}
