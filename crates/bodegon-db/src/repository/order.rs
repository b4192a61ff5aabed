//! # Order Engine
//!
//! Order lifecycle: creation, incremental payments, delivery and special
//! dispatch approval.
//!
//! ## Commit paths per kind
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  contado    full payment checked up front, stock debited, payments  │
//! │             applied → Pagada, all in one transaction                │
//! │  credito    stock debited at creation; payments accumulate until    │
//! │             the paid sum settles the total → Pagada                 │
//! │  apartado   stock held at creation; paid off → Pagado; handed       │
//! │             over → Entregado                                        │
//! │  despacho   no stock moves until a privileged approval → Completada │
//! │  especial   (or a rejection → Anulada, having never touched stock). │
//! │             A privileged creator dispatches and approves in one     │
//! │             step: stock leaves at creation, status Completada.      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything an order freezes (unit prices, unit costs, the exchange
//! rate, both totals) is computed once here and never recomputed; later
//! payments convert through `exchange_rate_at_sale`, not the live rate.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use bodegon_core::{
    validation::{
        compute_totals, tendered_total_ves, validate_order_draft, OrderDraft, PaymentDraft,
        PricedLine,
    },
    Actor, CompanySettings, DocumentRef, LedgerError, Money, Order, OrderItem, OrderKind,
    OrderStatus, Payment, RelatedParty, ValidationError, Warehouse,
};

use crate::error::{DbError, DbResult};
use crate::repository::{payment, sequence, stock};

/// Engine for the order lifecycle.
#[derive(Debug, Clone)]
pub struct OrderEngine {
    pool: SqlitePool,
}

impl OrderEngine {
    pub fn new(pool: SqlitePool) -> Self {
        OrderEngine { pool }
    }

    /// Creates an order from a draft: resolves and freezes the rate,
    /// freezes catalog prices into the lines, debits stock (except for
    /// special dispatches), applies the tendered payments and commits the
    /// whole document atomically.
    ///
    /// ## Failure modes (all roll back completely)
    /// - cash sale tendered below the total → `PaymentShortfall`
    /// - any line exceeding the sales floor stock → `InsufficientStock`
    /// - discount or manual rate from a non-privileged actor →
    ///   `PrivilegeRequired`
    /// - no cached rate and no manual rate → `RateUnavailable`
    pub async fn create_order(&self, draft: &OrderDraft, actor: &Actor) -> DbResult<Order> {
        validate_order_draft(draft)?;

        if draft.discount_ref.is_positive() && !actor.privileged {
            return Err(LedgerError::PrivilegeRequired { action: "descuento" }.into());
        }
        if draft.manual_rate.is_some() && !actor.privileged {
            return Err(LedgerError::PrivilegeRequired { action: "tasa manual" }.into());
        }
        if draft.kind == OrderKind::SpecialDispatch && !draft.payments.is_empty() {
            // Dispatches document goods leaving without a sale; money
            // never moves through them.
            return Err(ValidationError::NotApplicable { field: "pagos" }.into());
        }

        let mut tx = self.pool.begin().await?;

        let settings = fetch_settings_tx(&mut tx).await?;
        let rate = match draft.manual_rate {
            Some(rate) => rate,
            None => fetch_rate_tx(&mut tx, settings.calculation_currency).await?,
        };

        let mut priced = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let (price, cost): (i64, i64) = sqlx::query_as(
                "SELECT price_usd_cents, cost_usd_cents FROM products WHERE id = ?1",
            )
            .bind(line.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Producto", line.product_id))?;

            priced.push(PricedLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_ref: Money::from_cents(price),
                unit_cost_ref: Money::from_cents(cost),
            });
        }

        let totals = compute_totals(&priced, draft.discount_ref, rate)?;
        let paid_ves =
            tendered_total_ves(&draft.payments, settings.calculation_currency, rate)?;

        if draft.kind.immediate_settlement() && !paid_ves.settles(totals.total_ves) {
            return Err(LedgerError::PaymentShortfall {
                total: totals.total_ves,
                tendered: paid_ves,
            }
            .into());
        }

        let status = initial_status(draft.kind, paid_ves, totals.total_ves, actor.privileged);
        let order_id = sequence::next_id_tx(&mut tx, draft.kind).await?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, client_id, kind, status,
                total_ves_cents, total_ref_cents, discount_ref_cents,
                exchange_rate_at_sale, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(order_id)
        .bind(draft.client_id)
        .bind(draft.kind)
        .bind(status)
        .bind(totals.total_ves.cents())
        .bind(totals.total_ref.cents())
        .bind(draft.discount_ref.cents())
        .bind(rate.scaled())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &totals.lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, product_id, quantity,
                    unit_price_ves_cents, unit_cost_ves_cents, returned_quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5, 0)
                "#,
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_ves.cents())
            .bind(line.unit_cost_ves.cents())
            .execute(&mut *tx)
            .await?;
        }

        // Special dispatches hold their stock debit until approval. A
        // privileged creator is the approver, so theirs leave stock now.
        if status != OrderStatus::PendienteAprobacion {
            let floor = fetch_sales_floor_tx(&mut tx).await?;
            let document = DocumentRef::sale(order_id);
            for line in &totals.lines {
                stock::debit_tx(
                    &mut tx,
                    line.product_id,
                    floor.id,
                    line.quantity,
                    &document,
                    Some(RelatedParty::Client(draft.client_id)),
                    None,
                )
                .await?;
            }
        }

        for payment_draft in &draft.payments {
            payment::apply_payment_tx(
                &mut tx,
                order_id,
                payment_draft,
                settings.calculation_currency,
                rate,
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            order_id,
            display_id = %bodegon_core::sequence::display_id(order_id),
            kind = ?draft.kind,
            status = status.label(),
            total_ves = %totals.total_ves,
            total_ref = %totals.total_ref,
            rate = %rate,
            "Order created"
        );

        Ok(Order {
            id: order_id,
            client_id: draft.client_id,
            kind: draft.kind,
            status,
            total_ves_cents: totals.total_ves.cents(),
            total_ref_cents: totals.total_ref.cents(),
            discount_ref_cents: draft.discount_ref.cents(),
            exchange_rate_at_sale: rate.scaled(),
            created_at: now,
        })
    }

    /// Applies one payment to a credit or layaway order. Conversions use
    /// the order's frozen rate. Transitions the order when the paid sum
    /// settles the total: Crédito → Pagada, Apartado → Pagado. Excess
    /// over the total is absorbed, never refunded automatically.
    pub async fn add_payment(
        &self,
        order_id: i64,
        draft: &PaymentDraft,
    ) -> DbResult<(Payment, OrderStatus)> {
        if !draft.amount.is_positive() {
            return Err(ValidationError::MustBePositive { field: "monto del pago" }.into());
        }

        let mut tx = self.pool.begin().await?;

        let order = fetch_order_tx(&mut tx, order_id).await?;
        if !order.status.accepts_payments() {
            return Err(LedgerError::AlreadyProcessed {
                document: "Orden",
                id: order_id,
                status: order.status.label().to_string(),
            }
            .into());
        }

        let settings = fetch_settings_tx(&mut tx).await?;
        let payment = payment::apply_payment_tx(
            &mut tx,
            order_id,
            draft,
            settings.calculation_currency,
            order.rate(),
        )
        .await?;

        let paid = payment::total_paid_ves_tx(&mut tx, order_id).await?;
        let status = if paid.settles(order.total_ves()) {
            let settled = match order.status {
                OrderStatus::Credito => OrderStatus::Pagada,
                OrderStatus::Apartado => OrderStatus::Pagado,
                other => other,
            };
            update_status_tx(&mut tx, order_id, settled).await?;
            settled
        } else {
            order.status
        };

        tx.commit().await?;

        info!(
            order_id,
            payment_id = payment.id,
            paid = %paid,
            total = %order.total_ves(),
            status = status.label(),
            "Payment recorded"
        );

        Ok((payment, status))
    }

    /// Marks a paid-off layaway as handed over: Pagado → Entregado.
    pub async fn deliver(&self, order_id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order_tx(&mut tx, order_id).await?;
        if order.status != OrderStatus::Pagado {
            return Err(LedgerError::AlreadyProcessed {
                document: "Orden",
                id: order_id,
                status: order.status.label().to_string(),
            }
            .into());
        }

        update_status_tx(&mut tx, order_id, OrderStatus::Entregado).await?;
        tx.commit().await?;

        info!(order_id, "Layaway delivered");
        Ok(())
    }

    /// Approves a pending special dispatch: debits its stock from the
    /// sales floor and completes it. Privileged actors only. Stock is
    /// checked now, not at creation, because it only leaves now.
    pub async fn approve_dispatch(&self, order_id: i64, actor: &Actor) -> DbResult<()> {
        if !actor.privileged {
            return Err(LedgerError::PrivilegeRequired {
                action: "aprobar despacho",
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let order = fetch_order_tx(&mut tx, order_id).await?;
        if order.status != OrderStatus::PendienteAprobacion {
            return Err(LedgerError::AlreadyProcessed {
                document: "Despacho",
                id: order_id,
                status: order.status.label().to_string(),
            }
            .into());
        }

        let floor = fetch_sales_floor_tx(&mut tx).await?;
        let items = fetch_items_tx(&mut tx, order_id).await?;
        let document = DocumentRef::sale(order_id);
        for item in &items {
            stock::debit_tx(
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

        update_status_tx(&mut tx, order_id, OrderStatus::Completada).await?;
        tx.commit().await?;

        info!(order_id, approved_by = %actor.username, "Dispatch approved");
        Ok(())
    }

    /// Rejects a pending special dispatch. Stock never moved, so the
    /// order simply becomes Anulada. Privileged actors only.
    pub async fn reject_dispatch(&self, order_id: i64, actor: &Actor) -> DbResult<()> {
        if !actor.privileged {
            return Err(LedgerError::PrivilegeRequired {
                action: "rechazar despacho",
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let order = fetch_order_tx(&mut tx, order_id).await?;
        if order.status != OrderStatus::PendienteAprobacion {
            return Err(LedgerError::AlreadyProcessed {
                document: "Despacho",
                id: order_id,
                status: order.status.label().to_string(),
            }
            .into());
        }

        update_status_tx(&mut tx, order_id, OrderStatus::Anulada).await?;
        tx.commit().await?;

        info!(order_id, rejected_by = %actor.username, "Dispatch rejected");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets an order by id.
    pub async fn get_order(&self, id: i64) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, client_id, kind, status,
                   total_ves_cents, total_ref_cents, discount_ref_cents,
                   exchange_rate_at_sale, created_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    /// Lines of an order, with their frozen prices and return counters.
    pub async fn items(&self, order_id: i64) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity,
                   unit_price_ves_cents, unit_cost_ves_cents, returned_quantity
            FROM order_items
            WHERE order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Payments recorded against an order.
    pub async fn payments(&self, order_id: i64) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        payment::payments_for_order_tx(&mut conn, order_id).await
    }

    /// Remaining amount due in local currency, clamped at zero.
    pub async fn due(&self, order_id: i64) -> DbResult<Money> {
        let order = self
            .get_order(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Orden", order_id))?;

        let mut conn = self.pool.acquire().await?;
        let paid = payment::total_paid_ves_tx(&mut conn, order_id).await?;
        Ok((order.total_ves() - paid).max_zero())
    }
}

/// Initial status for a freshly created order. A privileged creator's
/// dispatch is approved in the same step.
fn initial_status(
    kind: OrderKind,
    paid_ves: Money,
    total_ves: Money,
    privileged: bool,
) -> OrderStatus {
    match kind {
        OrderKind::Regular => OrderStatus::Pagada,
        OrderKind::Credit => {
            if paid_ves.settles(total_ves) {
                OrderStatus::Pagada
            } else {
                OrderStatus::Credito
            }
        }
        OrderKind::Reservation => {
            if paid_ves.settles(total_ves) {
                OrderStatus::Pagado
            } else {
                OrderStatus::Apartado
            }
        }
        OrderKind::SpecialDispatch => {
            if privileged {
                OrderStatus::Completada
            } else {
                OrderStatus::PendienteAprobacion
            }
        }
    }
}

// =============================================================================
// Transaction-scoped helpers (shared with the reversal engine)
// =============================================================================

pub(crate) async fn fetch_order_tx(conn: &mut SqliteConnection, id: i64) -> DbResult<Order> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, client_id, kind, status,
               total_ves_cents, total_ref_cents, discount_ref_cents,
               exchange_rate_at_sale, created_at
        FROM orders
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Orden", id))?;
    Ok(order)
}

pub(crate) async fn fetch_items_tx(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, quantity,
               unit_price_ves_cents, unit_cost_ves_cents, returned_quantity
        FROM order_items
        WHERE order_id = ?1
        ORDER BY id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

pub(crate) async fn update_status_tx(
    conn: &mut SqliteConnection,
    order_id: i64,
    status: OrderStatus,
) -> DbResult<()> {
    sqlx::query("UPDATE orders SET status = ?2 WHERE id = ?1")
        .bind(order_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;

    debug!(order_id, status = status.label(), "Order status updated");
    Ok(())
}

pub(crate) async fn fetch_settings_tx(conn: &mut SqliteConnection) -> DbResult<CompanySettings> {
    let settings = sqlx::query_as::<_, CompanySettings>(
        "SELECT id, name, calculation_currency FROM company_settings WHERE id = 1",
    )
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Configuración", 1))?;
    Ok(settings)
}

pub(crate) async fn fetch_rate_tx(
    conn: &mut SqliteConnection,
    currency: bodegon_core::Currency,
) -> DbResult<bodegon_core::ExchangeRate> {
    let scaled: Option<i64> =
        sqlx::query_scalar("SELECT rate_scaled FROM exchange_rates WHERE currency = ?1")
            .bind(currency)
            .fetch_optional(&mut *conn)
            .await?;

    scaled
        .map(bodegon_core::ExchangeRate::from_scaled)
        .ok_or_else(|| LedgerError::RateUnavailable { currency }.into())
}

pub(crate) async fn fetch_sales_floor_tx(conn: &mut SqliteConnection) -> DbResult<Warehouse> {
    let floor = sqlx::query_as::<_, Warehouse>(
        "SELECT id, name, sellable, created_at FROM warehouses WHERE sellable = 1 ORDER BY id LIMIT 1",
    )
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Almacén de venta", "ninguno"))?;
    Ok(floor)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{admin, cashier, seed, Seeded};
    use bodegon_core::{AccountRef, Currency, ExchangeRate};

    fn line(product_id: i64, quantity: i64) -> bodegon_core::validation::OrderLineDraft {
        bodegon_core::validation::OrderLineDraft { product_id, quantity }
    }

    fn pay(amount: i64, currency: Currency, destination: AccountRef) -> PaymentDraft {
        PaymentDraft {
            amount: Money::from_cents(amount),
            currency,
            destination,
            method: Some("efectivo".to_string()),
            reference: None,
        }
    }

    fn draft(seeded: &Seeded, kind: OrderKind, payments: Vec<PaymentDraft>) -> OrderDraft {
        OrderDraft {
            client_id: seeded.cliente,
            kind,
            // 5 units at $10.00 → $50.00 → Bs. 2000.00 at 40 Bs/$
            lines: vec![line(seeded.product_a, 5)],
            payments,
            discount_ref: Money::zero(),
            manual_rate: None,
        }
    }

    #[tokio::test]
    async fn test_cash_sale_with_mixed_currencies() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        // Bs. 1000 cash + $25 cash = Bs. 2000 total.
        let order = orders
            .create_order(
                &draft(
                    &seeded,
                    OrderKind::Regular,
                    vec![
                        pay(100_000, Currency::Ves, AccountRef::CashBox(seeded.caja)),
                        pay(2_500, Currency::Usd, AccountRef::CashBox(seeded.caja)),
                    ],
                ),
                &cashier(),
            )
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pagada);
        assert_eq!(order.total_ves_cents, 200_000);
        assert_eq!(order.total_ref_cents, 5_000);
        assert_eq!(order.display_id(), "000000001");

        // Stock debited from the sales floor.
        let stock = seeded.db.stock();
        assert_eq!(stock.level(seeded.product_a, seeded.tienda).await.unwrap(), 95);

        // Both drawers credited in their own currency.
        let caja = seeded.db.accounts().get_cash_box(seeded.caja).await.unwrap().unwrap();
        assert_eq!(caja.balance_ves_cents, 100_000);
        assert_eq!(caja.balance_usd_cents, 2_500);

        // Payments carry frozen equivalents.
        let payments = orders.payments(order.id).await.unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].amount_ves_cents, 100_000);
        assert_eq!(payments[0].amount_ref_cents, 2_500);
        assert_eq!(payments[1].amount_ves_cents, 100_000);

        assert_eq!(orders.due(order.id).await.unwrap(), Money::zero());
    }

    #[tokio::test]
    async fn test_cash_sale_shortfall_rolls_back_everything() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        let err = orders
            .create_order(
                &draft(
                    &seeded,
                    OrderKind::Regular,
                    vec![pay(150_000, Currency::Ves, AccountRef::CashBox(seeded.caja))],
                ),
                &cashier(),
            )
            .await
            .unwrap_err();

        match err {
            DbError::Ledger(LedgerError::PaymentShortfall { total, tendered }) => {
                assert_eq!(total.cents(), 200_000);
                assert_eq!(tendered.cents(), 150_000);
            }
            other => panic!("unexpected error: {other}"),
        }

        // No order, no stock change, no account change.
        assert!(orders.get_order(1).await.unwrap().is_none());
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            100
        );
        let caja = seeded.db.accounts().get_cash_box(seeded.caja).await.unwrap().unwrap();
        assert_eq!(caja.balance_ves_cents, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_no_partial_effects() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        let mut order_draft = draft(&seeded, OrderKind::Credit, vec![]);
        order_draft.lines = vec![line(seeded.product_a, 50), line(seeded.product_b, 999)];

        let err = orders.create_order(&order_draft, &cashier()).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(LedgerError::InsufficientStock { .. })
        ));

        // The first line's debit must have rolled back with the rest.
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            100
        );
        assert!(orders.get_order(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_credit_order_settles_through_payments() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        let order = orders
            .create_order(&draft(&seeded, OrderKind::Credit, vec![]), &cashier())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Credito);
        assert_eq!(order.display_id(), "200000001");
        // Stock leaves at creation for credit sales.
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            95
        );

        let (_, status) = orders
            .add_payment(
                order.id,
                &pay(120_000, Currency::Ves, AccountRef::CashBox(seeded.caja)),
            )
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::Credito);
        assert_eq!(orders.due(order.id).await.unwrap().cents(), 80_000);

        // $20 at the frozen 40 Bs/$ completes the Bs. 2000 total.
        let (_, status) = orders
            .add_payment(
                order.id,
                &pay(2_000, Currency::Usd, AccountRef::CashBox(seeded.caja)),
            )
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::Pagada);

        // A settled order accepts no further payments.
        let err = orders
            .add_payment(
                order.id,
                &pay(1_000, Currency::Ves, AccountRef::CashBox(seeded.caja)),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(LedgerError::AlreadyProcessed { .. })
        ));
    }

    #[tokio::test]
    async fn test_payments_convert_with_frozen_rate_not_live_rate() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        let order = orders
            .create_order(&draft(&seeded, OrderKind::Credit, vec![]), &cashier())
            .await
            .unwrap();

        // The live rate moves; the order's conversions must not.
        seeded
            .db
            .rates()
            .upsert_rate(Currency::Usd, ExchangeRate::from_units(80))
            .await
            .unwrap();

        let (payment, status) = orders
            .add_payment(
                order.id,
                &pay(5_000, Currency::Usd, AccountRef::CashBox(seeded.caja)),
            )
            .await
            .unwrap();

        // $50 at the frozen 40 Bs/$ = Bs. 2000, settling the order. At
        // the live 80 Bs/$ it would have been Bs. 4000.
        assert_eq!(payment.amount_ves_cents, 200_000);
        assert_eq!(status, OrderStatus::Pagada);
    }

    #[tokio::test]
    async fn test_layaway_lifecycle() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        let order = orders
            .create_order(&draft(&seeded, OrderKind::Reservation, vec![]), &cashier())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Apartado);
        assert_eq!(order.display_id(), "400000001");

        // Delivery before payoff is refused.
        assert!(matches!(
            orders.deliver(order.id).await.unwrap_err(),
            DbError::Ledger(LedgerError::AlreadyProcessed { .. })
        ));

        let (_, status) = orders
            .add_payment(
                order.id,
                &pay(200_000, Currency::Ves, AccountRef::CashBox(seeded.caja)),
            )
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::Pagado);

        orders.deliver(order.id).await.unwrap();
        assert_eq!(
            orders.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Entregado
        );
    }

    #[tokio::test]
    async fn test_dispatch_approval_moves_stock_late() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        let order = orders
            .create_order(&draft(&seeded, OrderKind::SpecialDispatch, vec![]), &cashier())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::PendienteAprobacion);
        assert_eq!(order.display_id(), "600000001");

        // Nothing moved yet.
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            100
        );

        // Approval needs privilege.
        assert!(matches!(
            orders.approve_dispatch(order.id, &cashier()).await.unwrap_err(),
            DbError::Ledger(LedgerError::PrivilegeRequired { .. })
        ));

        orders.approve_dispatch(order.id, &admin()).await.unwrap();
        assert_eq!(
            orders.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Completada
        );
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            95
        );

        // Double approval is refused.
        assert!(matches!(
            orders.approve_dispatch(order.id, &admin()).await.unwrap_err(),
            DbError::Ledger(LedgerError::AlreadyProcessed { .. })
        ));
    }

    #[tokio::test]
    async fn test_privileged_dispatch_is_approved_at_creation() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        let order = orders
            .create_order(&draft(&seeded, OrderKind::SpecialDispatch, vec![]), &admin())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Completada);

        // Creator holds approval privilege, so the stock left immediately.
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            95
        );

        // A second approval pass finds nothing pending.
        assert!(matches!(
            orders.approve_dispatch(order.id, &admin()).await.unwrap_err(),
            DbError::Ledger(LedgerError::AlreadyProcessed { .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_rejection_and_payment_ban() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        // Dispatches never carry payments.
        let err = orders
            .create_order(
                &draft(
                    &seeded,
                    OrderKind::SpecialDispatch,
                    vec![pay(1_000, Currency::Ves, AccountRef::CashBox(seeded.caja))],
                ),
                &cashier(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Ledger(LedgerError::Validation(_))));

        let order = orders
            .create_order(&draft(&seeded, OrderKind::SpecialDispatch, vec![]), &cashier())
            .await
            .unwrap();
        orders.reject_dispatch(order.id, &admin()).await.unwrap();
        assert_eq!(
            orders.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Anulada
        );
        // Rejection never touches stock.
        assert_eq!(
            seeded.db.stock().level(seeded.product_a, seeded.tienda).await.unwrap(),
            100
        );
    }

    #[tokio::test]
    async fn test_discount_and_manual_rate_require_privilege() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        let mut d = draft(&seeded, OrderKind::Credit, vec![]);
        d.discount_ref = Money::from_cents(500);
        assert!(matches!(
            orders.create_order(&d, &cashier()).await.unwrap_err(),
            DbError::Ledger(LedgerError::PrivilegeRequired { .. })
        ));

        // Privileged discount: $50 − $5 = $45 → Bs. 1800.
        let order = orders.create_order(&d, &admin()).await.unwrap();
        assert_eq!(order.total_ref_cents, 4_500);
        assert_eq!(order.total_ves_cents, 180_000);

        let mut d = draft(&seeded, OrderKind::Credit, vec![]);
        d.manual_rate = Some(ExchangeRate::from_units(42));
        assert!(matches!(
            orders.create_order(&d, &cashier()).await.unwrap_err(),
            DbError::Ledger(LedgerError::PrivilegeRequired { .. })
        ));

        let order = orders.create_order(&d, &admin()).await.unwrap();
        assert_eq!(order.exchange_rate_at_sale, 420_000);
        assert_eq!(order.total_ves_cents, 210_000);
    }

    #[tokio::test]
    async fn test_missing_rate_aborts_creation() {
        let seeded = seed().await;
        let orders = seeded.db.orders();

        // Switch calculation currency to EUR, which has no cached rate.
        seeded
            .db
            .rates()
            .set_calculation_currency(Currency::Eur)
            .await
            .unwrap();

        let err = orders
            .create_order(&draft(&seeded, OrderKind::Credit, vec![]), &cashier())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(LedgerError::RateUnavailable { .. })
        ));
    }
}
