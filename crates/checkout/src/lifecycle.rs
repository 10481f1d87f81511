//! Post-checkout order lifecycle: queries, status updates, cancellation.

use chrono::{DateTime, Utc};
use common::{BuyerId, OrderId, SellerId};
use domain::{Order, OrderState};
use store::{MarketStore, OrderSummary};

use crate::error::{CheckoutError, Result};
use crate::services::notifications::{Notification, NotificationSink};

const DEFAULT_CANCEL_REASON: &str = "Cancelled by buyer";

/// Drives an order through its lifecycle after checkout.
///
/// Buyer-facing reads enforce ownership; status updates come from the
/// fulfilment side, where the caller identity is recorded but
/// authorization lives upstream. Every lifecycle write is guarded by
/// the state observed when the order was loaded, so a stale copy can
/// never overwrite a concurrent transition. Cancellation commits the
/// state change and the stock restitution as one store operation; of
/// two racing cancels exactly one releases stock.
pub struct OrderLifecycleService<S, N> {
    store: S,
    notifications: N,
}

impl<S, N> OrderLifecycleService<S, N>
where
    S: MarketStore,
    N: NotificationSink,
{
    /// Creates a new lifecycle service.
    pub fn new(store: S, notifications: N) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Loads an order on behalf of its buyer.
    pub async fn get_order(&self, order_id: OrderId, buyer_id: BuyerId) -> Result<Order> {
        let order = self.load(order_id).await?;
        if order.buyer_id() != buyer_id {
            return Err(CheckoutError::Forbidden);
        }
        Ok(order)
    }

    /// Lists the buyer's orders, most recent first.
    pub async fn list_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders_for_buyer(buyer_id).await?)
    }

    /// Lists orders containing the seller's products, most recent first.
    pub async fn list_for_seller(&self, seller_id: SellerId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders_for_seller(seller_id).await?)
    }

    /// Computes per-state counts and lifetime spend for a buyer.
    pub async fn summary(&self, buyer_id: BuyerId) -> Result<OrderSummary> {
        Ok(self.store.order_summary(buyer_id).await?)
    }

    /// Moves an order to a new lifecycle state.
    ///
    /// A `Cancelled` target is routed through the cancellation path so
    /// that stock restitution always happens, whichever entry point the
    /// caller used. Other targets are validated against the transition
    /// table and notify the buyer of the change.
    #[tracing::instrument(skip(self, note))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        actor: uuid::Uuid,
        new_state: OrderState,
        note: Option<String>,
    ) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        let observed = order.state();

        if new_state == OrderState::Cancelled {
            let reason = note.unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
            return self.do_cancel(order, reason).await;
        }

        let now = Utc::now();
        order.transition(new_state, now)?;
        if let Some(note) = note {
            order.append_note(&note, now);
        }
        self.store.update_order(&order, observed).await?;

        metrics::counter!("order_status_updates_total").increment(1);
        tracing::info!(
            %order_id,
            %actor,
            order_number = %order.order_number(),
            state = %new_state,
            "order status updated"
        );

        self.emit(
            order.buyer_id().as_uuid(),
            Notification::StatusChanged {
                order_id: order.id(),
                order_number: order.order_number().as_str().to_string(),
                state: new_state,
                message: new_state.description().to_string(),
            },
        )
        .await;

        Ok(order)
    }

    /// Cancels an order on behalf of its buyer and restores stock.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        order_id: OrderId,
        buyer_id: BuyerId,
        reason: Option<String>,
    ) -> Result<Order> {
        let order = self.load(order_id).await?;
        if order.buyer_id() != buyer_id {
            return Err(CheckoutError::Forbidden);
        }

        let reason = reason.unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
        self.do_cancel(order, reason).await
    }

    /// Records a seller-supplied delivery estimate on an order.
    ///
    /// Terminal orders reject the edit.
    #[tracing::instrument(skip(self))]
    pub async fn set_estimated_delivery(
        &self,
        order_id: OrderId,
        actor: uuid::Uuid,
        estimate: DateTime<Utc>,
    ) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        let observed = order.state();
        order.set_estimated_delivery(estimate, Utc::now())?;
        self.store.update_order(&order, observed).await?;
        Ok(order)
    }

    async fn do_cancel(&self, mut order: Order, reason: String) -> Result<Order> {
        // State change and stock restitution commit as one store
        // operation, guarded by the state loaded above. A concurrent
        // cancel (or status update) that got there first makes this
        // fail with a conflict instead of releasing stock again.
        let observed = order.state();
        order.cancel(reason.clone(), Utc::now())?;
        let missing = self.store.commit_cancellation(&order, observed).await?;

        for product_id in missing {
            // Product was deleted since the order was placed; there is
            // nothing to restore the units to.
            tracing::warn!(
                order_id = %order.id(),
                %product_id,
                "skipping stock restitution for deleted product"
            );
        }

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(
            order_id = %order.id(),
            order_number = %order.order_number(),
            "order cancelled"
        );

        self.emit(
            order.buyer_id().as_uuid(),
            Notification::OrderCancelled {
                order_id: order.id(),
                order_number: order.order_number().as_str().to_string(),
                reason,
            },
        )
        .await;

        Ok(order)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    async fn emit(&self, recipient: uuid::Uuid, notification: Notification) {
        if let Err(err) = self.notifications.emit(recipient, notification).await {
            metrics::counter!("notifications_failed_total").increment(1);
            tracing::warn!(%recipient, error = %err, "notification emission failed");
        }
    }
}
