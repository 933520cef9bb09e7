//! Order persistence with optimistic concurrency
//!
//! All order mutation flows through [`OrderStore::transition`]; no
//! other code path writes order records. A failed version check forces
//! the caller to reload and retry rather than silently overwrite.

use dashmap::DashMap;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::{Order, OrderEvent, OrderTransition};
use shared::util::now_millis;

use super::machine;

/// In-process order store keyed by order id
///
/// Orders are never deleted, only terminally marked.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: DashMap<String, Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
        }
    }

    /// Persist a newly created order
    pub fn insert(&self, order: Order) {
        self.orders.insert(order.order_id.clone(), order);
    }

    /// Point lookup by order id
    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).map(|o| o.clone())
    }

    /// Range query by owner
    pub fn find_by_customer(&self, customer_id: &str) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .map(|o| o.clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    /// Apply a transition under the optimistic version check
    ///
    /// Fails with `VersionConflict` if the persisted version does not
    /// match `expected_version`, and with `IllegalTransition` if the
    /// transition is not legal from the current status. On success the
    /// new status is persisted, the version incremented, and the
    /// updated order returned together with the domain event.
    pub fn transition(
        &self,
        order_id: &str,
        transition: OrderTransition,
        expected_version: u64,
    ) -> AppResult<(Order, OrderEvent)> {
        let mut entry = self.orders.get_mut(order_id).ok_or_else(|| {
            AppError::with_message(ErrorCode::OrderNotFound, format!("order {order_id} not found"))
        })?;

        if entry.version != expected_version {
            return Err(AppError::conflict(format!(
                "order {order_id} at version {}, expected {expected_version}",
                entry.version
            ))
            .with_detail("order_id", order_id)
            .with_detail("actual_version", entry.version)
            .with_detail("expected_version", expected_version));
        }

        let from_status = entry.status;
        let Some(to_status) = machine::next_status(from_status, transition) else {
            tracing::error!(
                order_id,
                prior_status = %from_status,
                transition = %transition,
                "Illegal order transition rejected"
            );
            return Err(AppError::illegal_transition(format!(
                "transition {transition} not permitted from {from_status} for order {order_id}"
            ))
            .with_detail("order_id", order_id)
            .with_detail("prior_status", from_status.to_string())
            .with_detail("transition", transition.to_string()));
        };

        entry.status = to_status;
        entry.version += 1;
        entry.updated_at = now_millis();

        let event = OrderEvent::new(
            order_id.to_string(),
            from_status,
            to_status,
            transition,
            entry.version,
        );

        tracing::info!(
            order_id,
            from = %from_status,
            to = %to_status,
            version = entry.version,
            "Order transitioned"
        );

        Ok((entry.clone(), event))
    }

    /// Flag an order for manual reconciliation after a failed
    /// compensation; does not bump the version (not a lifecycle change)
    pub fn flag_reconciliation(&self, order_id: &str) -> AppResult<Order> {
        let mut entry = self.orders.get_mut(order_id).ok_or_else(|| {
            AppError::with_message(ErrorCode::OrderNotFound, format!("order {order_id} not found"))
        })?;
        entry.needs_reconciliation = true;
        entry.updated_at = now_millis();
        Ok(entry.clone())
    }

    /// Orders flagged for manual reconciliation (operator view)
    pub fn find_flagged(&self) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|o| o.needs_reconciliation)
            .map(|o| o.clone())
            .collect()
    }
}
