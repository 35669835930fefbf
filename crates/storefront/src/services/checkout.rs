//! Checkout: cart to order, payment start and the gateway callback.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use roghan_core::{CartId, OrderStatus, PhoneNumber, UserId};

use crate::config::StorefrontConfig;
use crate::db::orders::PlaceOutcome;
use crate::db::{OrderRepository, RepositoryError};
use crate::models::order::Order;
use crate::models::user::AddressInput;
use crate::services::payment::{PaymentClient, PaymentError};

/// Path the gateway returns the customer to.
pub const CALLBACK_PATH: &str = "/checkout/callback";

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    /// Products that are inactive or short on stock.
    #[error("unavailable items: {0:?}")]
    Unavailable(Vec<String>),

    #[error("order is not payable")]
    NotPayable,

    #[error("unknown payment authority")]
    UnknownAuthority,

    #[error("payment gateway error: {0}")]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CheckoutError {
    /// Message shown to the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyCart => "سبد خرید شما خالی است.".to_string(),
            Self::Unavailable(names) => format!(
                "این کالاها موجود نیستند یا موجودی کافی ندارند: {}",
                names.join("، ")
            ),
            Self::NotPayable => "این سفارش قابل پرداخت نیست.".to_string(),
            Self::UnknownAuthority => "تراکنش پرداخت پیدا نشد.".to_string(),
            Self::Payment(_) => {
                "اتصال به درگاه پرداخت ممکن نشد. از صفحه سفارش‌ها دوباره تلاش کنید.".to_string()
            }
            Self::Repository(_) => "خطای داخلی رخ داد. دوباره تلاش کنید.".to_string(),
        }
    }
}

/// What happened on the gateway callback.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Payment verified now.
    Paid(Order),
    /// The order had already been settled by an earlier callback.
    AlreadyPaid(Order),
    /// The customer cancelled or verification failed.
    Failed(Order),
}

/// Places orders and settles payments.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    payment: &'a PaymentClient,
    config: &'a StorefrontConfig,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, payment: &'a PaymentClient, config: &'a StorefrontConfig) -> Self {
        Self {
            pool,
            payment,
            config,
        }
    }

    /// Turn the cart into a `pending_payment` order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart` or `Unavailable` when the cart cannot be ordered.
    #[instrument(skip(self, address, note), fields(user_id = %user_id))]
    pub async fn place_order(
        &self,
        cart_id: CartId,
        user_id: UserId,
        address: &AddressInput,
        note: &str,
    ) -> Result<Order, CheckoutError> {
        let outcome = OrderRepository::new(self.pool)
            .place_from_cart(cart_id, user_id, address, note, &self.config.shipping)
            .await?;

        match outcome {
            PlaceOutcome::Placed(order) => {
                tracing::info!(number = %order.number, total = %order.total, "Order placed");
                Ok(order)
            }
            PlaceOutcome::EmptyCart => Err(CheckoutError::EmptyCart),
            PlaceOutcome::Unavailable(names) => Err(CheckoutError::Unavailable(names)),
        }
    }

    /// Request a payment for an order and return the gateway URL to redirect to.
    ///
    /// # Errors
    ///
    /// Returns `NotPayable` for settled orders, `Payment` if the gateway
    /// refuses.
    #[instrument(skip(self, order, mobile), fields(number = %order.number))]
    pub async fn start_payment(
        &self,
        order: &Order,
        mobile: Option<&PhoneNumber>,
    ) -> Result<String, CheckoutError> {
        if !order.status.is_payable() {
            return Err(CheckoutError::NotPayable);
        }

        let authority = self
            .payment
            .request(
                order.total,
                &format!("سفارش {} روغن", order.number),
                &self.config.url(CALLBACK_PATH),
                mobile.map(PhoneNumber::as_str),
            )
            .await?;

        OrderRepository::new(self.pool)
            .set_authority(order.id, &authority)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => CheckoutError::NotPayable,
                other => CheckoutError::Repository(other),
            })?;

        Ok(self.payment.start_pay_url(&authority))
    }

    /// Settle the gateway's return.
    ///
    /// `status_ok` is the gateway's `Status=OK`. The order total is verified
    /// with the gateway; marking paid is guarded so a replay changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAuthority` if no order carries the authority.
    #[instrument(skip(self))]
    pub async fn handle_callback(
        &self,
        authority: &str,
        status_ok: bool,
    ) -> Result<CallbackOutcome, CheckoutError> {
        let orders = OrderRepository::new(self.pool);
        let order = orders
            .find_by_authority(authority)
            .await?
            .ok_or(CheckoutError::UnknownAuthority)?;

        if order.status.is_paid() {
            return Ok(CallbackOutcome::AlreadyPaid(order));
        }
        if order.status != OrderStatus::PendingPayment {
            return Ok(CallbackOutcome::Failed(order));
        }

        if !status_ok {
            orders.mark_failed(order.id).await?;
            tracing::info!(number = %order.number, "Payment cancelled by customer");
            return self.reload(order).await.map(CallbackOutcome::Failed);
        }

        match self.payment.verify(order.total, authority).await {
            Ok(verification) => {
                let changed = orders
                    .mark_paid(
                        order.id,
                        &verification.ref_id,
                        verification.card_pan.as_deref(),
                    )
                    .await?;
                let order = self.reload(order).await?;
                if changed {
                    tracing::info!(number = %order.number, ref_id = %verification.ref_id, "Order paid");
                    Ok(CallbackOutcome::Paid(order))
                } else {
                    Ok(CallbackOutcome::AlreadyPaid(order))
                }
            }
            Err(PaymentError::Gateway { code, message }) => {
                tracing::warn!(number = %order.number, code, message, "Payment verification refused");
                orders.mark_failed(order.id).await?;
                self.reload(order).await.map(CallbackOutcome::Failed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reload(&self, order: Order) -> Result<Order, CheckoutError> {
        Ok(OrderRepository::new(self.pool).get(order.id).await?.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message_lists_products() {
        let err = CheckoutError::Unavailable(vec!["Castrol Edge".to_string(), "Total Quartz".to_string()]);
        let message = err.user_message();
        assert!(message.contains("Castrol Edge"));
        assert!(message.contains("Total Quartz"));
    }
}
