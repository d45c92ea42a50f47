//! The order aggregate as it travels on the stream and through the read API.
//!
//! Field names match the producer's JSON schema exactly. Every struct denies
//! unknown fields so schema drift between producer and consumer surfaces as a
//! decode failure instead of silently dropped data. Missing fields fall back
//! to zero values and are reported later by the validator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{OrderUid, TransactionId};

/// Root aggregate: one order with its delivery, payment and line items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Order {
    pub order_uid: OrderUid,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    /// Creation time; the Unix epoch stands in for "absent".
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

/// Recipient and address. One per order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    /// Optional; empty when the customer gave none.
    pub email: String,
}

/// Payment record. One per order, globally keyed by `transaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Payment {
    pub transaction: TransactionId,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// A single line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    /// Discount percentage.
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

impl Order {
    /// Sum of `total_price` over all items, or `None` if it overflows `i64`.
    #[must_use]
    pub fn items_total(&self) -> Option<i64> {
        self.items
            .iter()
            .try_fold(0_i64, |acc, item| acc.checked_add(item.total_price))
    }
}
