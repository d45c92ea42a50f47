//! Sample orders for tests.
//!
//! Enabled in downstream crates through the `fixtures` feature
//! (dev-dependencies only).

use chrono::{Duration, SubsecRound, Utc};

use crate::types::{Delivery, Item, Order, OrderUid, Payment, TransactionId};

/// A fully valid order with two items.
///
/// `date_created` is one minute in the past, truncated to whole seconds so it
/// survives a round trip through `TIMESTAMPTZ` unchanged.
#[must_use]
pub fn valid_order(order_uid: &str) -> Order {
    let items = vec![
        Item {
            chrt_id: 9_934_930,
            track_number: "WBILMTESTTRACK".to_owned(),
            price: 453,
            rid: format!("{order_uid}-rid-1"),
            name: "Mascaras".to_owned(),
            sale: 30,
            size: "0".to_owned(),
            total_price: 317,
            nm_id: 2_389_212,
            brand: "Vivienne Sabo".to_owned(),
            status: 202,
        },
        Item {
            chrt_id: 9_934_931,
            track_number: "WBILMTESTTRACK".to_owned(),
            price: 1000,
            rid: format!("{order_uid}-rid-2"),
            name: "Lip balm".to_owned(),
            sale: 10,
            size: "M".to_owned(),
            total_price: 900,
            nm_id: 2_389_213,
            brand: "Carmex".to_owned(),
            status: 202,
        },
    ];

    let goods_total = items.iter().map(|item| item.total_price).sum::<i64>();

    Order {
        order_uid: OrderUid::new(order_uid),
        track_number: "WBILMTESTTRACK".to_owned(),
        entry: "WBIL".to_owned(),
        delivery: Delivery {
            name: "Test Testov".to_owned(),
            phone: "+97200000000".to_owned(),
            zip: "2639809".to_owned(),
            city: "Kiryat Mozkin".to_owned(),
            address: "Ploshad Mira 15".to_owned(),
            region: "Kraiot".to_owned(),
            email: "test@gmail.com".to_owned(),
        },
        payment: Payment {
            transaction: TransactionId::new(format!("{order_uid}-tx")),
            request_id: String::new(),
            currency: "RUB".to_owned(),
            provider: "wbpay".to_owned(),
            amount: goods_total + 1500,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_owned(),
            delivery_cost: 1500,
            goods_total,
            custom_fee: 0,
        },
        items,
        locale: "en".to_owned(),
        internal_signature: String::new(),
        customer_id: "test".to_owned(),
        delivery_service: "meest".to_owned(),
        shardkey: "9".to_owned(),
        sm_id: 99,
        date_created: (Utc::now() - Duration::minutes(1)).trunc_subsecs(0),
        oof_shard: "1".to_owned(),
    }
}

/// [`valid_order`] serialized as the producer would send it.
#[must_use]
pub fn valid_order_json(order_uid: &str) -> Vec<u8> {
    serde_json::to_vec(&valid_order(order_uid)).unwrap_or_default()
}
