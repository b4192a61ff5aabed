//! # Payment Recording
//!
//! Transaction-scoped helpers shared by the order and reversal engines.
//! A payment freezes three numbers at once: the amount actually tendered,
//! its local-currency equivalent and its reference-currency equivalent,
//! all through the order's frozen rate. Later rate changes never alter
//! what was recorded.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use bodegon_core::{
    validation::{payment_equivalents, PaymentDraft},
    Currency, ExchangeRate, Money, Payment,
};

use crate::error::DbResult;
use crate::repository::account;

/// Applies one tendered payment inside an open transaction: credits the
/// destination account and inserts the payment row with both frozen
/// equivalents.
pub(crate) async fn apply_payment_tx(
    conn: &mut SqliteConnection,
    order_id: i64,
    draft: &PaymentDraft,
    calculation_currency: Currency,
    rate: ExchangeRate,
) -> DbResult<Payment> {
    let (amount_ves, amount_ref) =
        payment_equivalents(draft.amount, draft.currency, calculation_currency, rate)?;

    account::credit_account_tx(conn, draft.destination, draft.amount, draft.currency).await?;

    let (bank_id, pos_id, cash_box_id) = draft.destination.column_ids();
    let now = Utc::now();

    let id = sqlx::query(
        r#"
        INSERT INTO payments (
            order_id, amount_cents, currency, amount_ves_cents, amount_ref_cents,
            method, reference, bank_id, pos_id, cash_box_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(order_id)
    .bind(draft.amount.cents())
    .bind(draft.currency)
    .bind(amount_ves.cents())
    .bind(amount_ref.cents())
    .bind(&draft.method)
    .bind(&draft.reference)
    .bind(bank_id)
    .bind(pos_id)
    .bind(cash_box_id)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    debug!(
        order_id,
        payment_id = id,
        amount = %draft.amount,
        currency = draft.currency.code(),
        ves = %amount_ves,
        "Payment applied"
    );

    Ok(Payment {
        id,
        order_id,
        amount_cents: draft.amount.cents(),
        currency: draft.currency,
        amount_ves_cents: amount_ves.cents(),
        amount_ref_cents: amount_ref.cents(),
        method: draft.method.clone(),
        reference: draft.reference.clone(),
        bank_id,
        pos_id,
        cash_box_id,
        created_at: now,
    })
}

/// Sum of an order's payments in local currency, inside an open
/// transaction. This is the number settlement checks compare against the
/// frozen `total_ves_cents`.
pub(crate) async fn total_paid_ves_tx(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> DbResult<Money> {
    let total: Option<i64> =
        sqlx::query_scalar("SELECT SUM(amount_ves_cents) FROM payments WHERE order_id = ?1")
            .bind(order_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(Money::from_cents(total.unwrap_or(0)))
}

/// All payments recorded against an order, inside an open transaction.
pub(crate) async fn payments_for_order_tx(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> DbResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, order_id, amount_cents, currency, amount_ves_cents, amount_ref_cents,
               method, reference, bank_id, pos_id, cash_box_id, created_at
        FROM payments
        WHERE order_id = ?1
        ORDER BY id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(payments)
}
