//! Checkout coordinator: the atomic cart-to-order conversion.

use chrono::Utc;
use common::{BuyerId, OrderId};
use domain::{Order, OrderItem, OrderNumber, ShippingDetails};
use store::MarketStore;

use crate::error::{CheckoutError, Result};
use crate::services::notifications::{Notification, NotificationSink};

/// A seller is warned when a sale leaves a product's stock below this
/// many units (and above zero).
pub const LOW_STOCK_THRESHOLD: u32 = 5;

/// Orchestrates checkout: reads the cart, re-validates stock, snapshots
/// the order, commits the reservation, and clears the cart.
///
/// The commit itself (stock decrement + order insert + cart clear) is a
/// single atomic store operation, so a failure at any point leaves no
/// partial state: no half-created order, no partial stock decrement.
/// Notifications are emitted after the commit and are best-effort.
pub struct CheckoutCoordinator<S, N> {
    store: S,
    notifications: N,
}

impl<S, N> CheckoutCoordinator<S, N>
where
    S: MarketStore,
    N: NotificationSink,
{
    /// Creates a new checkout coordinator.
    pub fn new(store: S, notifications: N) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Converts the buyer's cart into an order.
    ///
    /// Fails with `EmptyCart` if there is nothing to buy, and with
    /// `InsufficientStock` naming the offending product if any line
    /// exceeds live stock, including when a concurrent checkout wins a
    /// race for the last units between validation and commit.
    #[tracing::instrument(skip(self, shipping))]
    pub async fn checkout(
        &self,
        buyer_id: BuyerId,
        shipping: ShippingDetails,
        notes: Option<String>,
    ) -> Result<Order> {
        metrics::counter!("checkout_attempts_total").increment(1);

        let result = self.run_checkout(buyer_id, shipping, notes).await;
        match &result {
            Ok(order) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    %buyer_id,
                    order_number = %order.order_number(),
                    total = %order.total(),
                    "checkout completed"
                );
            }
            Err(err) => {
                metrics::counter!("checkout_failed_total").increment(1);
                tracing::info!(%buyer_id, error = %err, "checkout failed");
            }
        }
        result
    }

    async fn run_checkout(
        &self,
        buyer_id: BuyerId,
        shipping: ShippingDetails,
        notes: Option<String>,
    ) -> Result<Order> {
        // 1. Load the cart; nothing to do if it has no items.
        let cart = self
            .store
            .get_cart(buyer_id)
            .await?
            .filter(|c| !c.is_empty())
            .ok_or(CheckoutError::EmptyCart)?;

        // 2. Re-validate every line against live stock and snapshot
        // product attributes. Cart contents may have gone stale since
        // add-time; this check gives a precise early error, and the
        // commit below re-checks atomically as the final authority.
        let mut items = Vec::with_capacity(cart.len());
        for line in cart.items() {
            let product = self
                .store
                .get_product(line.product_id)
                .await?
                .ok_or(CheckoutError::ProductNotFound(line.product_id))?;

            if product.stock < line.quantity {
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product_id,
                    available: product.stock,
                    requested: line.quantity,
                });
            }

            items.push(OrderItem::new(
                product.id,
                product.name,
                product.image,
                product.seller_id,
                product.seller_name,
                line.quantity,
                line.unit_price,
            ));
        }

        // 3. Allocate the date-scoped order number.
        let now = Utc::now();
        let today = now.date_naive();
        let sequence = self.store.next_order_sequence(today).await?;
        let order_number = OrderNumber::new(today, sequence);

        // 4-5. Build the order; the total is computed from item subtotals.
        let order = Order::create(
            OrderId::new(),
            buyer_id,
            order_number,
            items,
            shipping,
            notes,
            now,
        )?;

        // 6-7. Atomically decrement stock, insert the order, clear the cart.
        let stock_levels = self.store.commit_checkout(&order).await?;

        // 8. Best-effort notifications; failures never undo the checkout.
        self.emit(
            buyer_id.as_uuid(),
            Notification::OrderCreated {
                order_id: order.id(),
                order_number: order.order_number().as_str().to_string(),
                total: order.total(),
            },
        )
        .await;

        for seller_id in order.seller_ids() {
            self.emit(
                seller_id.as_uuid(),
                Notification::NewSale {
                    order_id: order.id(),
                    order_number: order.order_number().as_str().to_string(),
                },
            )
            .await;
        }

        for level in &stock_levels {
            if level.remaining > 0 && level.remaining < LOW_STOCK_THRESHOLD {
                self.emit(
                    level.seller_id.as_uuid(),
                    Notification::LowStock {
                        product_id: level.product_id,
                        product_name: level.product_name.clone(),
                        remaining: level.remaining,
                    },
                )
                .await;
            }
        }

        Ok(order)
    }

    async fn emit(&self, recipient: uuid::Uuid, notification: Notification) {
        if let Err(err) = self.notifications.emit(recipient, notification).await {
            metrics::counter!("notifications_failed_total").increment(1);
            tracing::warn!(%recipient, error = %err, "notification emission failed");
        }
    }
}
