//! Business invariants of an order.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use super::errors::{ErrorKind, ValidationErrors};
use crate::types::{Email, Order};

/// Currencies accepted in `payment.currency`.
pub const ALLOWED_CURRENCIES: &[&str] = &[
    "RUB", "KZT", "BYN", "KGS", "AMD", "TRY", "UZS", "AZN", "GEL",
];

/// Latest plausible `payment.payment_dt` (2100-01-01T00:00:00Z).
pub const MAX_PAYMENT_DT: i64 = 4_102_444_800;

/// How far into the future `date_created` may lie to absorb clock skew.
pub const FUTURE_SKEW_TOLERANCE: Duration = Duration::minutes(5);

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[0-9]{11}$").expect("phone pattern is valid"));

/// Validate an order against the current wall clock.
///
/// # Errors
///
/// Returns every violated invariant; see [`validate_order_at`].
pub fn validate_order(order: &Order) -> Result<(), ValidationErrors> {
    validate_order_at(order, Utc::now())
}

/// Validate an order, judging `date_created` against `now`.
///
/// Checks run to completion: the returned [`ValidationErrors`] lists every
/// violation, not just the first.
///
/// # Errors
///
/// Returns [`ValidationErrors`] if any invariant is violated.
pub fn validate_order_at(order: &Order, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    check_header(order, now, &mut errors);
    check_delivery(order, &mut errors);
    check_items(order, &mut errors);
    check_payment(order, &mut errors);

    errors.into_result()
}

fn require(errors: &mut ValidationErrors, value: &str, path: &str) {
    if value.trim().is_empty() {
        errors.add(path, ErrorKind::Required, "must not be empty");
    }
}

fn item_path(index: usize, field: &str) -> String {
    format!("items[{index}].{field}")
}

fn check_header(order: &Order, now: DateTime<Utc>, errors: &mut ValidationErrors) {
    require(errors, order.order_uid.as_str(), "order_uid");
    require(errors, &order.track_number, "track_number");
    require(errors, &order.entry, "entry");
    require(errors, &order.customer_id, "customer_id");
    require(errors, &order.delivery_service, "delivery_service");
    require(errors, &order.locale, "locale");
    require(errors, &order.shardkey, "shardkey");
    require(errors, &order.oof_shard, "oof_shard");

    if order.date_created.timestamp() <= 0 {
        errors.add("date_created", ErrorKind::Required, "missing timestamp");
    } else if order.date_created > now + FUTURE_SKEW_TOLERANCE {
        errors.add(
            "date_created",
            ErrorKind::OutOfRange,
            "timestamp in the future",
        );
    }
}

fn check_delivery(order: &Order, errors: &mut ValidationErrors) {
    let delivery = &order.delivery;

    require(errors, &delivery.name, "delivery.name");
    require(errors, &delivery.phone, "delivery.phone");
    require(errors, &delivery.city, "delivery.city");
    require(errors, &delivery.address, "delivery.address");
    require(errors, &delivery.region, "delivery.region");

    if !delivery.email.is_empty() && Email::parse(&delivery.email).is_err() {
        errors.add("delivery.email", ErrorKind::Format, "invalid email");
    }
    if !delivery.phone.is_empty() && !PHONE.is_match(&delivery.phone) {
        errors.add(
            "delivery.phone",
            ErrorKind::Format,
            "expected + followed by 11 digits",
        );
    }
}

fn check_items(order: &Order, errors: &mut ValidationErrors) {
    if order.items.is_empty() {
        errors.add("items", ErrorKind::Required, "at least one item");
        return;
    }

    let mut seen_rids = HashSet::new();
    for (i, item) in order.items.iter().enumerate() {
        if item.chrt_id <= 0 {
            errors.add(item_path(i, "chrt_id"), ErrorKind::OutOfRange, "must be > 0");
        }
        require(errors, &item.name, &item_path(i, "name"));

        for (field, value) in [
            ("price", item.price),
            ("total_price", item.total_price),
            ("sale", item.sale),
            ("status", item.status),
        ] {
            if value < 0 {
                errors.add(item_path(i, field), ErrorKind::OutOfRange, "negative");
            }
        }

        if !item.rid.is_empty() && !seen_rids.insert(item.rid.as_str()) {
            errors.add(item_path(i, "rid"), ErrorKind::Inconsistent, "duplicate rid");
        }
    }

    if order.items_total() != Some(order.payment.goods_total) {
        errors.add(
            "payment.goods_total",
            ErrorKind::Inconsistent,
            "!= sum(items.total_price)",
        );
    }
}

fn check_payment(order: &Order, errors: &mut ValidationErrors) {
    let payment = &order.payment;

    require(errors, payment.transaction.as_str(), "payment.transaction");
    require(errors, &payment.provider, "payment.provider");

    for (path, value) in [
        ("payment.amount", payment.amount),
        ("payment.delivery_cost", payment.delivery_cost),
        ("payment.goods_total", payment.goods_total),
        ("payment.custom_fee", payment.custom_fee),
    ] {
        if value < 0 {
            errors.add(path, ErrorKind::OutOfRange, "negative");
        }
    }

    let currency = payment.currency.trim().to_uppercase();
    if currency.is_empty() {
        errors.add("payment.currency", ErrorKind::Required, "must not be empty");
    } else if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        errors.add(
            "payment.currency",
            ErrorKind::Format,
            "expect 3-letter ISO code",
        );
    } else if !ALLOWED_CURRENCIES.contains(&currency.as_str()) {
        errors.add(
            "payment.currency",
            ErrorKind::Format,
            format!(
                "unsupported currency; allowed: {}",
                ALLOWED_CURRENCIES.join(",")
            ),
        );
    }

    if payment.payment_dt <= 0 || payment.payment_dt > MAX_PAYMENT_DT {
        errors.add(
            "payment.payment_dt",
            ErrorKind::OutOfRange,
            "invalid unix seconds",
        );
    }

    let expected = payment
        .goods_total
        .checked_add(payment.delivery_cost)
        .and_then(|sum| sum.checked_add(payment.custom_fee));
    if expected != Some(payment.amount) {
        errors.add(
            "payment.amount",
            ErrorKind::Inconsistent,
            "amount != goods_total + delivery_cost + custom_fee",
        );
    }
}
