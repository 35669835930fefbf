//! Status enums for various entities.
//!
//! Each enum maps to a PostgreSQL enum type in the `shop` schema (with the
//! `postgres` feature) and to `snake_case` strings in forms and JSON.

use serde::{Deserialize, Serialize};

/// Generates `as_str`, `Display` and `FromStr` for a unit enum from a
/// variant-to-string table.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The `snake_case` name used in the database, forms and JSON.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!("invalid {}: {s}", stringify!($name))),
                }
            }
        }
    };
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    Customer,
    /// Back-office access.
    Admin,
}

string_enum!(UserRole {
    Customer => "customer",
    Admin => "admin",
});

impl UserRole {
    /// Persian label for the admin UI.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Customer => "مشتری",
            Self::Admin => "مدیر",
        }
    }
}

/// Order lifecycle status.
///
/// ```text
/// pending_payment ──verify ok──▶ paid ──▶ processing ──▶ shipped ──▶ delivered
///        │  ▲                      │
///  verify│  │retry                 └──▶ cancelled (refund handled offline)
///   fail ▼  │
/// payment_failed ──────────────────────▶ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PendingPayment,
    PaymentFailed,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

string_enum!(OrderStatus {
    PendingPayment => "pending_payment",
    PaymentFailed => "payment_failed",
    Paid => "paid",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Persian label shown to customers and admins.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingPayment => "در انتظار پرداخت",
            Self::PaymentFailed => "پرداخت ناموفق",
            Self::Paid => "پرداخت شده",
            Self::Processing => "در حال آماده‌سازی",
            Self::Shipped => "ارسال شده",
            Self::Delivered => "تحویل شده",
            Self::Cancelled => "لغو شده",
        }
    }

    /// Whether the customer may (re)start payment for this order.
    #[must_use]
    pub const fn is_payable(self) -> bool {
        matches!(self, Self::PendingPayment | Self::PaymentFailed)
    }

    /// Whether the order has been paid for (at any later stage).
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// Transitions an admin may apply by hand.
    ///
    /// Payment outcomes (`paid`, `payment_failed`) are only ever set by the
    /// gateway callback, never manually.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Paid, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
                | (Self::PendingPayment | Self::PaymentFailed, Self::Cancelled)
        )
    }

    /// The statuses an admin can move this order to.
    #[must_use]
    pub fn next_statuses(self) -> Vec<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }
}

/// What an OTP code is being issued for.
///
/// At most one active code exists per phone number and purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.otp_purpose", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    /// Sign in (creating the account on first use).
    Login,
    /// Confirm ownership of a new phone number for an existing account.
    ChangePhone,
}

string_enum!(OtpPurpose {
    Login => "login",
    ChangePhone => "change_phone",
});

/// Moderation state of a product or car question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.question_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    #[default]
    Pending,
    Published,
    Rejected,
}

string_enum!(QuestionStatus {
    Pending => "pending",
    Published => "published",
    Rejected => "rejected",
});

impl QuestionStatus {
    /// Persian label for the admin UI.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "در انتظار بررسی",
            Self::Published => "منتشر شده",
            Self::Rejected => "رد شده",
        }
    }
}

/// Kind of storefront engagement event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.engagement_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    ProductView,
    AddToCart,
    CompareAdd,
    CheckoutStart,
    BannerClick,
}

string_enum!(EngagementKind {
    ProductView => "product_view",
    AddToCart => "add_to_cart",
    CompareAdd => "compare_add",
    CheckoutStart => "checkout_start",
    BannerClick => "banner_click",
});

impl EngagementKind {
    /// Persian label for the overview.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProductView => "بازدید محصول",
            Self::AddToCart => "افزودن به سبد",
            Self::CompareAdd => "افزودن به مقایسه",
            Self::CheckoutStart => "شروع پرداخت",
            Self::BannerClick => "کلیک روی بنر",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_roundtrip_strings() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_admin_transitions() {
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));

        // Payment results are never set by hand
        assert!(!OrderStatus::PendingPayment.can_transition_to(OrderStatus::Paid));
        // No going backwards
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Delivered.next_statuses().is_empty());
    }

    #[test]
    fn test_order_status_payable_and_paid() {
        assert!(OrderStatus::PendingPayment.is_payable());
        assert!(OrderStatus::PaymentFailed.is_payable());
        assert!(!OrderStatus::Paid.is_payable());
        assert!(OrderStatus::Shipped.is_paid());
        assert!(!OrderStatus::Cancelled.is_paid());
    }

    #[test]
    fn test_engagement_kind_json() {
        let kind: EngagementKind = serde_json::from_str("\"compare_add\"").unwrap();
        assert_eq!(kind, EngagementKind::CompareAdd);
        assert_eq!(
            serde_json::to_string(&EngagementKind::ProductView).unwrap(),
            "\"product_view\""
        );
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("super_admin".parse::<UserRole>().is_err());
    }
}
