//! Payment attempt registry
//!
//! One attempt record per authorization try against the provider,
//! indexed by attempt id, provider reference and order. The registry
//! arbitrates the webhook/poller race: whichever path first moves an
//! attempt out of PENDING wins, the loser sees a no-op.

use dashmap::DashMap;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::payment::{AttemptStatus, PaymentAttempt};
use shared::util::now_millis;

#[derive(Debug, Default)]
pub struct AttemptStore {
    attempts: DashMap<String, PaymentAttempt>,
    /// provider reference -> attempt id
    by_external_ref: DashMap<String, String>,
    /// order id -> attempt ids, in creation order
    by_order: DashMap<String, Vec<String>>,
}

impl AttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an attempt for (order, idempotency key)
    ///
    /// Re-running the saga with the same key returns the existing
    /// attempt instead of opening a second authorization. A different
    /// key while another attempt is still PENDING is rejected.
    pub fn create(
        &self,
        order_id: &str,
        idempotency_key: &str,
        amount: rust_decimal::Decimal,
        currency: &str,
    ) -> AppResult<PaymentAttempt> {
        let mut ids = self.by_order.entry(order_id.to_string()).or_default();

        for id in ids.iter() {
            if let Some(existing) = self.attempts.get(id) {
                if existing.idempotency_key == idempotency_key {
                    return Ok(existing.clone());
                }
                if !existing.status.is_terminal() {
                    return Err(AppError::with_message(
                        ErrorCode::AttemptInFlight,
                        format!("order {order_id} already has attempt {id} in flight"),
                    )
                    .with_detail("order_id", order_id)
                    .with_detail("attempt_id", id.clone()));
                }
            }
        }

        let attempt = PaymentAttempt::new(
            order_id.to_string(),
            idempotency_key.to_string(),
            amount,
            currency.to_string(),
        );
        ids.push(attempt.attempt_id.clone());
        self.attempts
            .insert(attempt.attempt_id.clone(), attempt.clone());
        Ok(attempt)
    }

    pub fn get(&self, attempt_id: &str) -> Option<PaymentAttempt> {
        self.attempts.get(attempt_id).map(|a| a.clone())
    }

    pub fn find_by_external_ref(&self, external_ref: &str) -> Option<PaymentAttempt> {
        let id = self.by_external_ref.get(external_ref)?;
        self.attempts.get(id.value()).map(|a| a.clone())
    }

    pub fn find_by_order(&self, order_id: &str) -> Vec<PaymentAttempt> {
        self.by_order
            .get(order_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.attempts.get(id).map(|a| a.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Record the provider reference once the provider assigns one
    pub fn assign_external_ref(&self, attempt_id: &str, external_ref: &str) -> AppResult<()> {
        let mut attempt = self.attempts.get_mut(attempt_id).ok_or_else(|| {
            AppError::with_message(
                ErrorCode::UnknownAttempt,
                format!("attempt {attempt_id} not found"),
            )
        })?;
        attempt.external_ref = Some(external_ref.to_string());
        attempt.updated_at = now_millis();
        self.by_external_ref
            .insert(external_ref.to_string(), attempt_id.to_string());
        Ok(())
    }

    /// Bump the retry counter after a transient provider failure
    pub fn record_retry(&self, attempt_id: &str) {
        if let Some(mut attempt) = self.attempts.get_mut(attempt_id) {
            attempt.retry_count += 1;
            attempt.updated_at = now_millis();
        }
    }

    /// Move a PENDING attempt to a terminal status
    ///
    /// Returns `true` if this call performed the move; `false` when the
    /// attempt was already resolved (the caller lost the race and must
    /// not drive order transitions).
    pub fn mark_if_pending(&self, attempt_id: &str, status: AttemptStatus) -> bool {
        let Some(mut attempt) = self.attempts.get_mut(attempt_id) else {
            return false;
        };
        if attempt.status != AttemptStatus::Pending {
            return false;
        }
        attempt.status = status;
        attempt.updated_at = now_millis();
        true
    }

    /// Unconditional status write, used for the refund bookkeeping of
    /// already-terminal attempts
    pub fn mark(&self, attempt_id: &str, status: AttemptStatus) {
        if let Some(mut attempt) = self.attempts.get_mut(attempt_id) {
            attempt.status = status;
            attempt.updated_at = now_millis();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_is_idempotent_per_key() {
        let store = AttemptStore::new();
        let a = store.create("ord-1", "k1", dec!(50.00), "EUR").unwrap();
        let b = store.create("ord-1", "k1", dec!(50.00), "EUR").unwrap();
        assert_eq!(a.attempt_id, b.attempt_id);
        assert_eq!(store.find_by_order("ord-1").len(), 1);
    }

    #[test]
    fn test_second_key_while_pending_rejected() {
        let store = AttemptStore::new();
        store.create("ord-1", "k1", dec!(50.00), "EUR").unwrap();
        let err = store.create("ord-1", "k2", dec!(50.00), "EUR").unwrap_err();
        assert_eq!(err.code, ErrorCode::AttemptInFlight);
    }

    #[test]
    fn test_new_attempt_after_terminal() {
        let store = AttemptStore::new();
        let a = store.create("ord-1", "k1", dec!(50.00), "EUR").unwrap();
        assert!(store.mark_if_pending(&a.attempt_id, AttemptStatus::Declined));

        let b = store.create("ord-1", "k2", dec!(50.00), "EUR").unwrap();
        assert_ne!(a.attempt_id, b.attempt_id);
        assert_eq!(store.find_by_order("ord-1").len(), 2);
    }

    #[test]
    fn test_external_ref_lookup() {
        let store = AttemptStore::new();
        let a = store.create("ord-1", "k1", dec!(50.00), "EUR").unwrap();
        store.assign_external_ref(&a.attempt_id, "auth_9").unwrap();

        let found = store.find_by_external_ref("auth_9").unwrap();
        assert_eq!(found.attempt_id, a.attempt_id);
        assert_eq!(found.external_ref.as_deref(), Some("auth_9"));
        assert!(store.find_by_external_ref("auth_missing").is_none());
    }

    #[test]
    fn test_mark_if_pending_single_winner() {
        let store = AttemptStore::new();
        let a = store.create("ord-1", "k1", dec!(50.00), "EUR").unwrap();

        assert!(store.mark_if_pending(&a.attempt_id, AttemptStatus::Authorized));
        // Second resolver loses the race
        assert!(!store.mark_if_pending(&a.attempt_id, AttemptStatus::Declined));
        assert_eq!(
            store.get(&a.attempt_id).unwrap().status,
            AttemptStatus::Authorized
        );
    }

    #[test]
    fn test_record_retry() {
        let store = AttemptStore::new();
        let a = store.create("ord-1", "k1", dec!(50.00), "EUR").unwrap();
        store.record_retry(&a.attempt_id);
        store.record_retry(&a.attempt_id);
        assert_eq!(store.get(&a.attempt_id).unwrap().retry_count, 2);
    }
}
