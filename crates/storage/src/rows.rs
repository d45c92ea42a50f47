//! Row shapes for the four order tables and their assembly into an [`Order`].

use chrono::{DateTime, Utc};
use orderflow_core::{Delivery, Item, Order, OrderUid, Payment, TransactionId};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OrderRow {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DeliveryRow {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PaymentRow {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ItemRow {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

impl From<DeliveryRow> for Delivery {
    fn from(r: DeliveryRow) -> Self {
        Self {
            name: r.name,
            phone: r.phone,
            zip: r.zip,
            city: r.city,
            address: r.address,
            region: r.region,
            email: r.email,
        }
    }
}

impl From<PaymentRow> for Payment {
    fn from(r: PaymentRow) -> Self {
        Self {
            transaction: TransactionId::new(r.transaction),
            request_id: r.request_id,
            currency: r.currency,
            provider: r.provider,
            amount: r.amount,
            payment_dt: r.payment_dt,
            bank: r.bank,
            delivery_cost: r.delivery_cost,
            goods_total: r.goods_total,
            custom_fee: r.custom_fee,
        }
    }
}

impl From<ItemRow> for Item {
    fn from(r: ItemRow) -> Self {
        Self {
            chrt_id: r.chrt_id,
            track_number: r.track_number,
            price: r.price,
            rid: r.rid,
            name: r.name,
            sale: r.sale,
            size: r.size,
            total_price: r.total_price,
            nm_id: r.nm_id,
            brand: r.brand,
            status: r.status,
        }
    }
}

pub(crate) fn assemble(
    header: OrderRow,
    delivery: DeliveryRow,
    payment: PaymentRow,
    items: Vec<ItemRow>,
) -> Order {
    Order {
        order_uid: OrderUid::new(header.order_uid),
        track_number: header.track_number,
        entry: header.entry,
        delivery: delivery.into(),
        payment: payment.into(),
        items: items.into_iter().map(Item::from).collect(),
        locale: header.locale,
        internal_signature: header.internal_signature,
        customer_id: header.customer_id,
        delivery_service: header.delivery_service,
        shardkey: header.shardkey,
        sm_id: header.sm_id,
        date_created: header.date_created,
        oof_shard: header.oof_shard,
    }
}
