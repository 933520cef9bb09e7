//! Idempotency ledger
//!
//! Durable (per process lifetime) key-value store mapping a
//! caller-supplied idempotency key to the outcome of a previously
//! accepted operation. Keys are operation-scoped
//! (`place_order:<key>`, `webhook:<event_id>`) so the same ledger
//! deduplicates both checkout requests and webhook deliveries.
//!
//! # Protocol
//!
//! ```text
//! reserve(key)
//!   ├─ Fresh(permit)      first caller, proceed; permit.commit(result)
//!   │                     seals the record for the retention window
//!   ├─ Completed(result)  replay, return the stored result, never
//!   │                     re-execute the side effect
//!   └─ Err(ConcurrentRequest)  a concurrent holder did not resolve
//!                              within the bounded wait
//! ```
//!
//! A permit dropped without commit releases the key and wakes waiters,
//! so a failed execution does not wedge retries.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use shared::error::{AppError, AppResult};
use shared::util::now_millis;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
enum EntryState {
    /// A caller holds the key and is executing
    Inflight { notify: Arc<Notify> },
    /// Operation completed; result stored until expiry
    Completed { value: Value, expires_at: i64 },
}

#[derive(Debug)]
struct Inner {
    entries: DashMap<String, EntryState>,
    retention: Duration,
    wait_timeout: Duration,
}

/// Shared idempotency ledger, cheap to clone
#[derive(Debug, Clone)]
pub struct IdempotencyLedger {
    inner: Arc<Inner>,
}

/// Outcome of [`IdempotencyLedger::reserve`]
#[derive(Debug)]
pub enum Reservation {
    /// First execution; commit the result through the permit
    Fresh(Permit),
    /// Replay; the stored result of the original execution
    Completed(Value),
}

/// Exclusive hold on an idempotency key
///
/// Dropping the permit without committing releases the key.
#[derive(Debug)]
pub struct Permit {
    inner: Arc<Inner>,
    key: String,
    committed: bool,
}

impl IdempotencyLedger {
    pub fn new(retention: Duration, wait_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                retention,
                wait_timeout,
            }),
        }
    }

    /// Reserve a key, waiting (bounded) on a concurrent holder
    pub async fn reserve(&self, key: &str) -> AppResult<Reservation> {
        let deadline = tokio::time::Instant::now() + self.inner.wait_timeout;

        loop {
            // The entry guard must not be held across an await point
            let wait_on = match self.try_claim(key) {
                Claim::Fresh => {
                    return Ok(Reservation::Fresh(Permit {
                        inner: self.inner.clone(),
                        key: key.to_string(),
                        committed: false,
                    }));
                }
                Claim::Completed(value) => return Ok(Reservation::Completed(value)),
                Claim::Inflight(notify) => notify,
            };

            let notified = wait_on.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                // Final re-check: the holder may have resolved between
                // our claim attempt and the wait registration
                return match self.try_claim(key) {
                    Claim::Fresh => Ok(Reservation::Fresh(Permit {
                        inner: self.inner.clone(),
                        key: key.to_string(),
                        committed: false,
                    })),
                    Claim::Completed(value) => Ok(Reservation::Completed(value)),
                    Claim::Inflight(_) => Err(AppError::concurrent_request()
                        .with_detail("idempotency_key", key.to_string())),
                };
            }
        }
    }

    fn try_claim(&self, key: &str) -> Claim {
        use dashmap::mapref::entry::Entry;

        match self.inner.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(EntryState::Inflight {
                    notify: Arc::new(Notify::new()),
                });
                Claim::Fresh
            }
            Entry::Occupied(mut slot) => match slot.get().clone() {
                EntryState::Inflight { notify } => Claim::Inflight(notify),
                EntryState::Completed { value, expires_at } => {
                    if expires_at > now_millis() {
                        Claim::Completed(value)
                    } else {
                        // Expired record, re-execute
                        slot.insert(EntryState::Inflight {
                            notify: Arc::new(Notify::new()),
                        });
                        Claim::Fresh
                    }
                }
            },
        }
    }

    /// Number of live (non-expired) completed records, for diagnostics
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Drop expired completed records; returns how many were purged
    pub fn purge_expired(&self) -> usize {
        let now = now_millis();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, state| match state {
            EntryState::Inflight { .. } => true,
            EntryState::Completed { expires_at, .. } => *expires_at > now,
        });
        before - self.inner.entries.len()
    }
}

enum Claim {
    Fresh,
    Inflight(Arc<Notify>),
    Completed(Value),
}

impl Permit {
    /// Seal the record with the operation result and wake waiters
    pub fn commit(mut self, value: Value) {
        self.committed = true;
        let expires_at = now_millis() + self.inner.retention.as_millis() as i64;
        let previous = self
            .inner
            .entries
            .insert(self.key.clone(), EntryState::Completed { value, expires_at });
        if let Some(EntryState::Inflight { notify }) = previous {
            notify.notify_waiters();
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // Released without a result: clear the hold so a retry can
        // re-execute, and wake anyone waiting on us
        if let Some((_, EntryState::Inflight { notify })) =
            self.inner.entries.remove(&self.key)
        {
            notify.notify_waiters();
        }
    }
}
