//! `PostgreSQL` order store.
//!
//! Every save runs in a single transaction:
//!
//! 1. Upsert the `orders` header by `order_uid`
//! 2. Upsert the `deliveries` row by `order_uid`
//! 3. Upsert the `payments` row by `transaction`, then drop any other payment
//!    rows still pointing at this order
//! 4. Delete all `items` of the order
//! 5. Batch-insert the current items (`ON CONFLICT DO NOTHING`)
//!
//! Dropping the transaction on any error rolls the whole write back.

use async_trait::async_trait;
use orderflow_core::{Item, Order, OrderUid};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::rows::{self, DeliveryRow, ItemRow, OrderRow, PaymentRow};
use crate::{OrderStore, RepositoryError};

/// Postgres caps bind parameters at 65535 per statement; 12 columns per item.
const MAX_ITEMS_PER_INSERT: usize = 5000;

const ITEM_COLUMNS: &str = "order_uid, chrt_id, track_number, price, rid, name, \
                            sale, size, total_price, nm_id, brand, status";

/// Order store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        upsert_header(&mut tx, order).await?;
        upsert_delivery(&mut tx, order).await?;
        upsert_payment(&mut tx, order).await?;
        replace_items(&mut tx, order).await?;

        tx.commit().await?;

        tracing::debug!(
            order_uid = %order.order_uid,
            items = order.items.len(),
            "order upserted"
        );
        Ok(())
    }

    async fn get_order(&self, order_uid: &OrderUid) -> Result<Order, RepositoryError> {
        // One snapshot for all four reads so a concurrent save is seen
        // entirely or not at all.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let header = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT order_uid, track_number, entry, locale, internal_signature, customer_id,
                   delivery_service, shardkey, sm_id, date_created, oof_shard
            FROM orders
            WHERE order_uid = $1
            ",
        )
        .bind(order_uid.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let delivery = sqlx::query_as::<_, DeliveryRow>(
            r"
            SELECT name, phone, zip, city, address, region, email
            FROM deliveries
            WHERE order_uid = $1
            ",
        )
        .bind(order_uid.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!("order {order_uid} has no delivery row"))
        })?;

        let payment = sqlx::query_as::<_, PaymentRow>(
            r"
            SELECT transaction, request_id, currency, provider, amount, payment_dt, bank,
                   delivery_cost, goods_total, custom_fee
            FROM payments
            WHERE order_uid = $1
            ",
        )
        .bind(order_uid.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let mut payments = payment.into_iter();
        let payment = match (payments.next(), payments.next()) {
            (Some(payment), None) => payment,
            (None, _) => {
                return Err(RepositoryError::DataCorruption(format!(
                    "order {order_uid} has no payment row"
                )));
            }
            (Some(_), Some(_)) => {
                return Err(RepositoryError::DataCorruption(format!(
                    "order {order_uid} has more than one payment row"
                )));
            }
        };

        let items = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT chrt_id, track_number, price, rid, name, sale, size, total_price,
                   nm_id, brand, status
            FROM items
            WHERE order_uid = $1
            ORDER BY id
            ",
        )
        .bind(order_uid.as_str())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(rows::assemble(header, delivery, payment, items))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn upsert_header(conn: &mut PgConnection, order: &Order) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO orders (
            order_uid, track_number, entry, locale, internal_signature, customer_id,
            delivery_service, shardkey, sm_id, date_created, oof_shard
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (order_uid) DO UPDATE SET
            track_number       = EXCLUDED.track_number,
            entry              = EXCLUDED.entry,
            locale             = EXCLUDED.locale,
            internal_signature = EXCLUDED.internal_signature,
            customer_id        = EXCLUDED.customer_id,
            delivery_service   = EXCLUDED.delivery_service,
            shardkey           = EXCLUDED.shardkey,
            sm_id              = EXCLUDED.sm_id,
            date_created       = EXCLUDED.date_created,
            oof_shard          = EXCLUDED.oof_shard
        ",
    )
    .bind(order.order_uid.as_str())
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shardkey)
    .bind(order.sm_id)
    .bind(order.date_created)
    .bind(&order.oof_shard)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_delivery(conn: &mut PgConnection, order: &Order) -> Result<(), RepositoryError> {
    let delivery = &order.delivery;
    sqlx::query(
        r"
        INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (order_uid) DO UPDATE SET
            name    = EXCLUDED.name,
            phone   = EXCLUDED.phone,
            zip     = EXCLUDED.zip,
            city    = EXCLUDED.city,
            address = EXCLUDED.address,
            region  = EXCLUDED.region,
            email   = EXCLUDED.email
        ",
    )
    .bind(order.order_uid.as_str())
    .bind(&delivery.name)
    .bind(&delivery.phone)
    .bind(&delivery.zip)
    .bind(&delivery.city)
    .bind(&delivery.address)
    .bind(&delivery.region)
    .bind(&delivery.email)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_payment(conn: &mut PgConnection, order: &Order) -> Result<(), RepositoryError> {
    let payment = &order.payment;
    sqlx::query(
        r"
        INSERT INTO payments (
            transaction, order_uid, request_id, currency, provider, amount, payment_dt, bank,
            delivery_cost, goods_total, custom_fee
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (transaction) DO UPDATE SET
            order_uid     = EXCLUDED.order_uid,
            request_id    = EXCLUDED.request_id,
            currency      = EXCLUDED.currency,
            provider      = EXCLUDED.provider,
            amount        = EXCLUDED.amount,
            payment_dt    = EXCLUDED.payment_dt,
            bank          = EXCLUDED.bank,
            delivery_cost = EXCLUDED.delivery_cost,
            goods_total   = EXCLUDED.goods_total,
            custom_fee    = EXCLUDED.custom_fee
        ",
    )
    .bind(payment.transaction.as_str())
    .bind(order.order_uid.as_str())
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(&mut *conn)
    .await?;

    // A resend may carry a new transaction id; the old row must not linger.
    sqlx::query("DELETE FROM payments WHERE order_uid = $1 AND transaction <> $2")
        .bind(order.order_uid.as_str())
        .bind(payment.transaction.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

async fn replace_items(conn: &mut PgConnection, order: &Order) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM items WHERE order_uid = $1")
        .bind(order.order_uid.as_str())
        .execute(&mut *conn)
        .await?;

    for chunk in order.items.chunks(MAX_ITEMS_PER_INSERT) {
        item_insert_query(&order.order_uid, chunk)
            .build()
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// One multi-row insert for `items`.
fn item_insert_query<'a>(order_uid: &'a OrderUid, items: &'a [Item]) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO items ({ITEM_COLUMNS}) "));
    builder.push_values(items, |mut row, item| {
        row.push_bind(order_uid.as_str())
            .push_bind(item.chrt_id)
            .push_bind(item.track_number.as_str())
            .push_bind(item.price)
            .push_bind(item.rid.as_str())
            .push_bind(item.name.as_str())
            .push_bind(item.sale)
            .push_bind(item.size.as_str())
            .push_bind(item.total_price)
            .push_bind(item.nm_id)
            .push_bind(item.brand.as_str())
            .push_bind(item.status);
    });
    builder.push(" ON CONFLICT DO NOTHING");
    builder
}
