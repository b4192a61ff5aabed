//! # Reversal Engine
//!
//! Nothing in the ledger is ever deleted; documents are REVERSED:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Cancellation    whole order: every line's stock comes back, every  │
//! │                  payment gets a compensating Egreso to the account  │
//! │                  it originally landed on, status → Anulada          │
//! │  Partial return  chosen lines come back; refund instructions must   │
//! │                  match the returned value within tolerance;         │
//! │                  status → Devolución Parcial                        │
//! │  Adjustment      counted vs theoretical per product; deltas move    │
//! │                  stock and the valuation difference is recorded     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All money in a reversal converts through the ORDER'S frozen rate, so a
//! sale and its reversal always cancel out exactly, whatever the live
//! rate does in between.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use bodegon_core::{
    validation::{payment_equivalents, CountDraft, RefundDraft, ReturnLineDraft},
    Actor, DocumentRef, InventoryAdjustment, InventoryAdjustmentItem, LedgerError, Money,
    OrderReturn, OrderStatus, RelatedParty, ValidationError,
};

use crate::error::{DbError, DbResult};
use crate::repository::{account, order, payment, stock};

/// Engine for cancellations, partial returns and inventory adjustments.
#[derive(Debug, Clone)]
pub struct ReversalEngine {
    pool: SqlitePool,
}

impl ReversalEngine {
    pub fn new(pool: SqlitePool) -> Self {
        ReversalEngine { pool }
    }

    /// Cancels an order outright. Privileged actors only.
    ///
    /// Every line's full quantity returns to the sales floor and every
    /// payment is paid back out of the account it landed on, using the
    /// payment's frozen equivalents. Orders that already saw a partial
    /// return cannot be cancelled; keep returning lines instead.
    pub async fn cancel_order(&self, order_id: i64, actor: &Actor) -> DbResult<()> {
        if !actor.privileged {
            return Err(LedgerError::PrivilegeRequired { action: "anular orden" }.into());
        }

        let mut tx = self.pool.begin().await?;

        let order = order::fetch_order_tx(&mut tx, order_id).await?;
        if !order.status.reversible() {
            return Err(LedgerError::AlreadyProcessed {
                document: "Orden",
                id: order_id,
                status: order.status.label().to_string(),
            }
            .into());
        }

        // Every reversible status debited its stock already (dispatches
        // only become reversible once approved).
        let floor = order::fetch_sales_floor_tx(&mut tx).await?;
        let items = order::fetch_items_tx(&mut tx, order_id).await?;
        let document = DocumentRef::cancellation(order_id);
        for item in &items {
            stock::credit_tx(
                &mut tx,
                item.product_id,
                floor.id,
                item.quantity,
                &document,
                Some(RelatedParty::Client(order.client_id)),
                None,
            )
            .await?;
        }

        let payments = payment::payments_for_order_tx(&mut tx, order_id).await?;
        let description = format!("Anulación de orden {}", order.display_id());
        for p in &payments {
            let destination = p
                .destination()
                .ok_or_else(|| DbError::not_found("Cuenta del pago", p.id))?;
            account::record_applied_egreso_tx(
                &mut tx,
                &description,
                p.amount(),
                p.currency,
                p.amount_ves(),
                Money::from_cents(p.amount_ref_cents),
                destination,
                Some(&document),
                actor,
            )
            .await?;
        }

        order::update_status_tx(&mut tx, order_id, OrderStatus::Anulada).await?;
        tx.commit().await?;

        info!(
            order_id,
            payments = payments.len(),
            cancelled_by = %actor.username,
            "Order cancelled"
        );
        Ok(())
    }

    /// Returns chosen quantities from an order's lines.
    ///
    /// The refund instructions, converted through the order's frozen
    /// rate, must match the returned value within the settlement
    /// tolerance. Each line's cumulative returns never exceed what was
    /// sold.
    pub async fn return_items(
        &self,
        order_id: i64,
        lines: &[ReturnLineDraft],
        refunds: &[RefundDraft],
        reason: Option<&str>,
        actor: &Actor,
    ) -> DbResult<OrderReturn> {
        if lines.is_empty() {
            return Err(ValidationError::Required { field: "líneas" }.into());
        }
        for line in lines {
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive { field: "cantidad" }.into());
            }
        }
        for refund in refunds {
            if !refund.amount.is_positive() {
                return Err(ValidationError::MustBePositive { field: "monto del reembolso" }.into());
            }
        }

        let mut tx = self.pool.begin().await?;

        let order = order::fetch_order_tx(&mut tx, order_id).await?;
        let returnable = matches!(
            order.status,
            OrderStatus::Pagada
                | OrderStatus::Pagado
                | OrderStatus::Entregado
                | OrderStatus::DevolucionParcial
        );
        if !returnable {
            return Err(LedgerError::AlreadyProcessed {
                document: "Orden",
                id: order_id,
                status: order.status.label().to_string(),
            }
            .into());
        }

        // Value each return line at its frozen unit price. The cap is
        // checked against the cumulative request per item, so duplicate
        // lines for the same item cannot slip past it one by one.
        let items = order::fetch_items_tx(&mut tx, order_id).await?;
        let mut requested: HashMap<i64, i64> = HashMap::new();
        let mut total_value = Money::zero();
        let mut valued = Vec::with_capacity(lines.len());
        for line in lines {
            let item = items
                .iter()
                .find(|i| i.id == line.order_item_id)
                .ok_or_else(|| DbError::not_found("Línea de orden", line.order_item_id))?;

            let asked = requested.entry(item.id).or_insert(0);
            *asked += line.quantity;
            if *asked > item.returnable_quantity() {
                return Err(LedgerError::ReturnExceedsSold {
                    order_item_id: item.id,
                    remaining: item.returnable_quantity(),
                    requested: *asked,
                }
                .into());
            }

            let value = item.unit_price().multiply_quantity(line.quantity);
            total_value += value;
            valued.push((item, line.quantity, value));
        }

        // Refunds must cover exactly the returned value (± tolerance),
        // converted through the frozen rate.
        let settings = order::fetch_settings_tx(&mut tx).await?;
        let mut refunded = Money::zero();
        for refund in refunds {
            let (ves, _) = payment_equivalents(
                refund.amount,
                refund.currency,
                settings.calculation_currency,
                order.rate(),
            )?;
            refunded += ves;
        }
        if !refunded.matches(total_value) {
            return Err(LedgerError::RefundMismatch {
                expected: total_value,
                supplied: refunded,
            }
            .into());
        }

        let now = Utc::now();
        let return_id = sqlx::query(
            "INSERT INTO order_returns (order_id, total_ves_cents, reason, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(order_id)
        .bind(total_value.cents())
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let document = DocumentRef::order_return(return_id);
        let floor = order::fetch_sales_floor_tx(&mut tx).await?;
        for (item, quantity, value) in &valued {
            sqlx::query(
                r#"
                INSERT INTO order_return_items (return_id, order_item_id, quantity, value_ves_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(return_id)
            .bind(item.id)
            .bind(quantity)
            .bind(value.cents())
            .execute(&mut *tx)
            .await?;

            stock::credit_tx(
                &mut tx,
                item.product_id,
                floor.id,
                *quantity,
                &document,
                Some(RelatedParty::Client(order.client_id)),
                reason,
            )
            .await?;

            sqlx::query(
                "UPDATE order_items SET returned_quantity = returned_quantity + ?2 WHERE id = ?1",
            )
            .bind(item.id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        let description = format!("Devolución de orden {}", order.display_id());
        for refund in refunds {
            let (ves, reference) = payment_equivalents(
                refund.amount,
                refund.currency,
                settings.calculation_currency,
                order.rate(),
            )?;
            account::record_applied_egreso_tx(
                &mut tx,
                &description,
                refund.amount,
                refund.currency,
                ves,
                reference,
                refund.account,
                Some(&document),
                actor,
            )
            .await?;
        }

        order::update_status_tx(&mut tx, order_id, OrderStatus::DevolucionParcial).await?;
        tx.commit().await?;

        info!(
            order_id,
            return_id,
            value = %total_value,
            lines = valued.len(),
            "Partial return committed"
        );

        Ok(OrderReturn {
            id: return_id,
            order_id,
            total_ves_cents: total_value.cents(),
            reason: reason.map(str::to_string),
            created_at: now,
        })
    }

    /// Adjusts a warehouse to a physical count. Every counted product is
    /// compared against its theoretical level; positive deltas credit
    /// stock, negative deltas debit it, and the net valuation difference
    /// (Σ delta × unit cost, reference currency) is recorded on the
    /// adjustment.
    pub async fn adjust_inventory(
        &self,
        warehouse_id: i64,
        counts: &[CountDraft],
        reason: &str,
    ) -> DbResult<InventoryAdjustment> {
        if counts.is_empty() {
            return Err(ValidationError::Required { field: "conteos" }.into());
        }
        if reason.trim().is_empty() {
            return Err(ValidationError::Required { field: "motivo" }.into());
        }
        for count in counts {
            if count.counted_quantity < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "cantidad contada",
                    value: count.counted_quantity,
                }
                .into());
            }
        }

        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let adjustment_id = sqlx::query(
            r#"
            INSERT INTO inventory_adjustments (warehouse_id, reason, valuation_ref_cents, created_at)
            VALUES (?1, ?2, 0, ?3)
            "#,
        )
        .bind(warehouse_id)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let document = DocumentRef::adjustment(adjustment_id);
        let mut valuation = Money::zero();

        for count in counts {
            let cost: Option<i64> =
                sqlx::query_scalar("SELECT cost_usd_cents FROM products WHERE id = ?1")
                    .bind(count.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let cost = cost.ok_or_else(|| DbError::not_found("Producto", count.product_id))?;

            let theoretical: Option<i64> = sqlx::query_scalar(
                "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND warehouse_id = ?2",
            )
            .bind(count.product_id)
            .bind(warehouse_id)
            .fetch_optional(&mut *tx)
            .await?;
            let theoretical = theoretical.unwrap_or(0);
            let delta = count.counted_quantity - theoretical;

            sqlx::query(
                r#"
                INSERT INTO inventory_adjustment_items (
                    adjustment_id, product_id, theoretical_quantity, counted_quantity, delta
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(adjustment_id)
            .bind(count.product_id)
            .bind(theoretical)
            .bind(count.counted_quantity)
            .bind(delta)
            .execute(&mut *tx)
            .await?;

            if delta > 0 {
                stock::credit_tx(
                    &mut tx,
                    count.product_id,
                    warehouse_id,
                    delta,
                    &document,
                    None,
                    Some(reason),
                )
                .await?;
            } else if delta < 0 {
                stock::debit_tx(
                    &mut tx,
                    count.product_id,
                    warehouse_id,
                    -delta,
                    &document,
                    None,
                    Some(reason),
                )
                .await?;
            }

            valuation += Money::from_cents(cost).multiply_quantity(delta);
        }

        sqlx::query("UPDATE inventory_adjustments SET valuation_ref_cents = ?2 WHERE id = ?1")
            .bind(adjustment_id)
            .bind(valuation.cents())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            adjustment_id,
            warehouse_id,
            valuation = %valuation,
            products = counts.len(),
            "Inventory adjusted"
        );

        Ok(InventoryAdjustment {
            id: adjustment_id,
            warehouse_id,
            reason: reason.to_string(),
            valuation_ref_cents: valuation.cents(),
            created_at: now,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns recorded against an order, oldest first.
    pub async fn returns_for_order(&self, order_id: i64) -> DbResult<Vec<OrderReturn>> {
        let returns = sqlx::query_as::<_, OrderReturn>(
            r#"
            SELECT id, order_id, total_ves_cents, reason, created_at
            FROM order_returns
            WHERE order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(returns)
    }

    /// Lines of an inventory adjustment.
    pub async fn adjustment_items(
        &self,
        adjustment_id: i64,
    ) -> DbResult<Vec<InventoryAdjustmentItem>> {
        let items = sqlx::query_as::<_, InventoryAdjustmentItem>(
            r#"
            SELECT id, adjustment_id, product_id, theoretical_quantity, counted_quantity, delta
            FROM inventory_adjustment_items
            WHERE adjustment_id = ?1
            ORDER BY id
            "#,
        )
        .bind(adjustment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{admin, cashier, seed, Seeded};
    use bodegon_core::{
        validation::{OrderDraft, OrderLineDraft, PaymentDraft},
        AccountRef, Currency, OrderKind,
    };

    async fn cash_sale(seeded: &Seeded) -> bodegon_core::Order {
        // 5 units at $10.00 → Bs. 2000.00, paid Bs. 2000 cash.
        seeded
            .db
            .orders()
            .create_order(
                &OrderDraft {
                    client_id: seeded.cliente,
                    kind: OrderKind::Regular,
                    lines: vec![OrderLineDraft {
                        product_id: seeded.product_a,
                        quantity: 5,
                    }],
                    payments: vec![PaymentDraft {
                        amount: Money::from_cents(200_000),
                        currency: Currency::Ves,
                        destination: AccountRef::CashBox(seeded.caja),
                        method: Some("efectivo".to_string()),
                        reference: None,
                    }],
                    discount_ref: Money::zero(),
                    manual_rate: None,
                },
                &cashier(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_cancellation_round_trips_stock_and_money() {
        let seeded = seed().await;
        let order = cash_sale(&seeded).await;

        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            95
        );

        seeded
            .db
            .reversals()
            .cancel_order(order.id, &admin())
            .await
            .unwrap();

        // Stock and drawer are exactly where they started.
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            100
        );
        let caja = seeded.db.accounts().get_cash_box(seeded.caja).await.unwrap().unwrap();
        assert_eq!(caja.balance_ves_cents, 0);
        assert_eq!(
            seeded.db.orders().get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Anulada
        );

        // The restock is logged under the cancellation document.
        let document = DocumentRef::cancellation(order.id);
        let moves = seeded
            .db
            .stock()
            .movements_for_document(&document)
            .await
            .unwrap();
        assert_eq!(moves.len(), 1);

        // Cancelling again is refused.
        let err = seeded
            .db
            .reversals()
            .cancel_order(order.id, &admin())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(LedgerError::AlreadyProcessed { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancellation_requires_privilege() {
        let seeded = seed().await;
        let order = cash_sale(&seeded).await;

        assert!(matches!(
            seeded
                .db
                .reversals()
                .cancel_order(order.id, &cashier())
                .await
                .unwrap_err(),
            DbError::Ledger(LedgerError::PrivilegeRequired { .. })
        ));
    }

    #[tokio::test]
    async fn test_partial_return_with_matching_refund() {
        let seeded = seed().await;
        let order = cash_sale(&seeded).await;
        let reversals = seeded.db.reversals();
        let item = &seeded.db.orders().items(order.id).await.unwrap()[0];

        // Return 2 of 5 units: value = 2 × Bs. 400.00 = Bs. 800.00.
        let ret = reversals
            .return_items(
                order.id,
                &[ReturnLineDraft {
                    order_item_id: item.id,
                    quantity: 2,
                }],
                &[RefundDraft {
                    amount: Money::from_cents(80_000),
                    currency: Currency::Ves,
                    account: AccountRef::CashBox(seeded.caja),
                }],
                Some("producto dañado"),
                &cashier(),
            )
            .await
            .unwrap();

        assert_eq!(ret.total_ves_cents, 80_000);
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            97
        );
        let caja = seeded.db.accounts().get_cash_box(seeded.caja).await.unwrap().unwrap();
        assert_eq!(caja.balance_ves_cents, 120_000);

        let order = seeded.db.orders().get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::DevolucionParcial);
        let item = &seeded.db.orders().items(order.id).await.unwrap()[0];
        assert_eq!(item.returned_quantity, 2);
        assert_eq!(item.returnable_quantity(), 3);

        // A second return can take the remaining 3, in USD this time:
        // 3 × Bs. 400 = Bs. 1200 = $30 at the frozen rate.
        reversals
            .return_items(
                order.id,
                &[ReturnLineDraft {
                    order_item_id: item.id,
                    quantity: 3,
                }],
                &[RefundDraft {
                    amount: Money::from_cents(3_000),
                    currency: Currency::Usd,
                    account: AccountRef::CashBox(seeded.caja),
                }],
                None,
                &cashier(),
            )
            .await
            .unwrap_err();
        // The USD drawer is empty, so the refund fails and nothing moved.
        let item = &seeded.db.orders().items(order.id).await.unwrap()[0];
        assert_eq!(item.returned_quantity, 2);
    }

    #[tokio::test]
    async fn test_return_caps_at_sold_quantity() {
        let seeded = seed().await;
        let order = cash_sale(&seeded).await;
        let item = &seeded.db.orders().items(order.id).await.unwrap()[0];

        let err = seeded
            .db
            .reversals()
            .return_items(
                order.id,
                &[ReturnLineDraft {
                    order_item_id: item.id,
                    quantity: 6,
                }],
                &[RefundDraft {
                    amount: Money::from_cents(240_000),
                    currency: Currency::Ves,
                    account: AccountRef::CashBox(seeded.caja),
                }],
                None,
                &cashier(),
            )
            .await
            .unwrap_err();

        match err {
            DbError::Ledger(LedgerError::ReturnExceedsSold { remaining, requested, .. }) => {
                assert_eq!(remaining, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_return_lines_share_the_cap() {
        let seeded = seed().await;
        let order = cash_sale(&seeded).await;
        let item = &seeded.db.orders().items(order.id).await.unwrap()[0];

        // Two lines of 3 against the same 5-unit item: each passes alone,
        // together they exceed what was sold.
        let err = seeded
            .db
            .reversals()
            .return_items(
                order.id,
                &[
                    ReturnLineDraft {
                        order_item_id: item.id,
                        quantity: 3,
                    },
                    ReturnLineDraft {
                        order_item_id: item.id,
                        quantity: 3,
                    },
                ],
                &[RefundDraft {
                    amount: Money::from_cents(240_000),
                    currency: Currency::Ves,
                    account: AccountRef::CashBox(seeded.caja),
                }],
                None,
                &cashier(),
            )
            .await
            .unwrap_err();

        match err {
            DbError::Ledger(LedgerError::ReturnExceedsSold { remaining, requested, .. }) => {
                assert_eq!(remaining, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing moved.
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            95
        );
        let item = &seeded.db.orders().items(order.id).await.unwrap()[0];
        assert_eq!(item.returned_quantity, 0);
    }

    #[tokio::test]
    async fn test_refund_mismatch_rolls_back() {
        let seeded = seed().await;
        let order = cash_sale(&seeded).await;
        let item = &seeded.db.orders().items(order.id).await.unwrap()[0];

        // Returned value is Bs. 800 but the refund says Bs. 500.
        let err = seeded
            .db
            .reversals()
            .return_items(
                order.id,
                &[ReturnLineDraft {
                    order_item_id: item.id,
                    quantity: 2,
                }],
                &[RefundDraft {
                    amount: Money::from_cents(50_000),
                    currency: Currency::Ves,
                    account: AccountRef::CashBox(seeded.caja),
                }],
                None,
                &cashier(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(LedgerError::RefundMismatch { .. })
        ));

        // Nothing changed anywhere.
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            95
        );
        let item = &seeded.db.orders().items(order.id).await.unwrap()[0];
        assert_eq!(item.returned_quantity, 0);
        assert!(seeded
            .db
            .reversals()
            .returns_for_order(order.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cancel_after_partial_return_is_refused() {
        let seeded = seed().await;
        let order = cash_sale(&seeded).await;
        let item = &seeded.db.orders().items(order.id).await.unwrap()[0];

        seeded
            .db
            .reversals()
            .return_items(
                order.id,
                &[ReturnLineDraft {
                    order_item_id: item.id,
                    quantity: 1,
                }],
                &[RefundDraft {
                    amount: Money::from_cents(40_000),
                    currency: Currency::Ves,
                    account: AccountRef::CashBox(seeded.caja),
                }],
                None,
                &cashier(),
            )
            .await
            .unwrap();

        let err = seeded
            .db
            .reversals()
            .cancel_order(order.id, &admin())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(LedgerError::AlreadyProcessed { .. })
        ));
    }

    #[tokio::test]
    async fn test_inventory_adjustment_moves_deltas_and_values_them() {
        let seeded = seed().await;
        let reversals = seeded.db.reversals();

        // product_a: 100 → 97 (−3 × $6.00), product_b: 20 → 25 (+5 × $2.00).
        let adjustment = reversals
            .adjust_inventory(
                seeded.tienda,
                &[
                    CountDraft {
                        product_id: seeded.product_a,
                        counted_quantity: 97,
                    },
                    CountDraft {
                        product_id: seeded.product_b,
                        counted_quantity: 25,
                    },
                ],
                "conteo físico mensual",
            )
            .await
            .unwrap();

        assert_eq!(adjustment.valuation_ref_cents, -3 * 600 + 5 * 200);

        let stock = seeded.db.stock();
        assert_eq!(stock.level(seeded.product_a, seeded.tienda).await.unwrap(), 97);
        assert_eq!(stock.level(seeded.product_b, seeded.tienda).await.unwrap(), 25);
        assert!(stock.audit_level(seeded.product_a, seeded.tienda).await.unwrap());

        let items = reversals.adjustment_items(adjustment.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].delta, -3);
        assert_eq!(items[1].delta, 5);

        // A count matching the theoretical level moves nothing.
        let noop = reversals
            .adjust_inventory(
                seeded.tienda,
                &[CountDraft {
                    product_id: seeded.product_a,
                    counted_quantity: 97,
                }],
                "reconteo",
            )
            .await
            .unwrap();
        assert_eq!(noop.valuation_ref_cents, 0);
        assert_eq!(stock.level(seeded.product_a, seeded.tienda).await.unwrap(), 97);
    }
}
