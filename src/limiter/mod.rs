//! Bounded-concurrency guard for pipeline runs.
//!
//! A counting semaphore caps simultaneous runs; a lock-guarded map keeps
//! track of which run ids currently hold a slot. Slots are handed out as
//! [`SlotGuard`]s that release on drop, so every exit path (including
//! panics and cancelled futures) gives the slot back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::constants::DEFAULT_RETRY_AFTER_SECS;

/// Snapshot of limiter occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimiterStatus {
    pub max: usize,
    pub active: usize,
    pub available: usize,
    pub active_run_ids: Vec<String>,
}

/// A held slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencySlot {
    pub run_id: String,
    pub acquired_at: DateTime<Utc>,
}

/// Returned by the fail-fast acquire when every slot is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyExceeded {
    pub status: LimiterStatus,
    pub retry_after: Duration,
}

impl std::fmt::Display for ConcurrencyExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "concurrency limit reached ({} of {} slots busy), retry after {}s",
            self.status.active,
            self.status.max,
            self.retry_after.as_secs()
        )
    }
}

#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("{0}")]
    Exceeded(ConcurrencyExceeded),

    #[error("run '{0}' already holds a slot")]
    DuplicateRun(String),

    #[error("limiter is closed")]
    Closed,
}

#[derive(Debug)]
struct Inner {
    max: usize,
    semaphore: Arc<Semaphore>,
    active: Mutex<HashMap<String, ConcurrencySlot>>,
    retry_after: Duration,
}

impl Inner {
    // A poisoned map is still structurally valid; keep serving.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConcurrencySlot>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn status(&self) -> LimiterStatus {
        let active = self.lock();
        let mut ids: Vec<String> = active.keys().cloned().collect();
        ids.sort();
        LimiterStatus {
            max: self.max,
            active: active.len(),
            available: self.semaphore.available_permits(),
            active_run_ids: ids,
        }
    }
}

/// Caps how many pipeline runs execute at once. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

impl ConcurrencyLimiter {
    pub fn new(max: usize) -> Self {
        Self::with_retry_after(max, Duration::from_secs(DEFAULT_RETRY_AFTER_SECS))
    }

    /// Limiter whose fail-fast rejections suggest `retry_after`.
    pub fn with_retry_after(max: usize, retry_after: Duration) -> Self {
        let max = max.max(1);
        Self {
            inner: Arc::new(Inner {
                max,
                semaphore: Arc::new(Semaphore::new(max)),
                active: Mutex::new(HashMap::new()),
                retry_after,
            }),
        }
    }

    pub fn max(&self) -> usize {
        self.inner.max
    }

    /// Wait for a free slot and take it.
    pub async fn acquire(&self, run_id: &str) -> Result<SlotGuard, LimiterError> {
        if self.inner.lock().contains_key(run_id) {
            return Err(LimiterError::DuplicateRun(run_id.to_string()));
        }
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LimiterError::Closed)?;
        self.register(run_id, permit)
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self, run_id: &str) -> Result<SlotGuard, LimiterError> {
        if self.inner.lock().contains_key(run_id) {
            return Err(LimiterError::DuplicateRun(run_id.to_string()));
        }
        match self.inner.semaphore.clone().try_acquire_owned() {
            Ok(permit) => self.register(run_id, permit),
            Err(TryAcquireError::NoPermits) => {
                let status = self.inner.status();
                tracing::info!(
                    run_id,
                    active = status.active,
                    max = status.max,
                    "concurrency limit reached"
                );
                Err(LimiterError::Exceeded(ConcurrencyExceeded {
                    status,
                    retry_after: self.inner.retry_after,
                }))
            }
            Err(TryAcquireError::Closed) => Err(LimiterError::Closed),
        }
    }

    /// Report whether a slot becomes obtainable within `timeout`, without keeping it.
    ///
    /// `None` checks the current state only.
    pub async fn wait_for_slot(&self, timeout: Option<Duration>) -> bool {
        let Some(timeout) = timeout else {
            return self.inner.semaphore.available_permits() > 0;
        };
        matches!(
            tokio::time::timeout(timeout, self.inner.semaphore.acquire()).await,
            Ok(Ok(_permit))
        )
    }

    pub fn status(&self) -> LimiterStatus {
        self.inner.status()
    }

    fn register(&self, run_id: &str, permit: OwnedSemaphorePermit) -> Result<SlotGuard, LimiterError> {
        let mut active = self.inner.lock();
        if active.contains_key(run_id) {
            // lost a race with another acquire for the same id; the permit drops here
            return Err(LimiterError::DuplicateRun(run_id.to_string()));
        }
        active.insert(
            run_id.to_string(),
            ConcurrencySlot {
                run_id: run_id.to_string(),
                acquired_at: Utc::now(),
            },
        );
        tracing::debug!(
            run_id,
            active = active.len(),
            max = self.inner.max,
            "slot acquired"
        );
        drop(active);
        Ok(SlotGuard {
            run_id: run_id.to_string(),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }
}

/// A held concurrency slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct SlotGuard {
    run_id: String,
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl SlotGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// When the slot was taken.
    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().get(&self.run_id).map(|s| s.acquired_at)
    }

    /// Release the slot now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut active = self.inner.lock();
        active.remove(&self.run_id);
        tracing::debug!(
            run_id = %self.run_id,
            active = active.len(),
            max = self.inner.max,
            "slot released"
        );
        // the permit field drops after this, once the map no longer lists the run
    }
}
