//! # Purchase Engine
//!
//! Purchase orders and goods receptions. A purchase freezes its unit
//! costs in local currency with the rate at purchase time; the stock
//! credit happens once, at reception, against the receiving warehouse.
//! Paying a provider is an ordinary Egreso that carries the purchase as
//! its document reference, so it follows the same approval rules as any
//! other withdrawal.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use bodegon_core::{
    validation::{ManualMovementDraft, PurchaseLineDraft},
    AccountRef, Actor, Currency, DocumentRef, FlowDirection, LedgerError,
    ManualFinancialMovement, Money, Purchase, PurchaseItem, PurchaseStatus, Reception,
    RelatedParty, ValidationError,
};

use crate::error::{DbError, DbResult};
use crate::repository::account::AccountEngine;
use crate::repository::{order, stock};

/// Engine for purchase orders, receptions and provider payments.
#[derive(Debug, Clone)]
pub struct PurchaseEngine {
    pool: SqlitePool,
}

impl PurchaseEngine {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseEngine { pool }
    }

    /// Creates a pending purchase order. Line costs arrive in the
    /// reference currency and are frozen in local currency with the
    /// current rate; no stock moves yet.
    pub async fn create_purchase(
        &self,
        provider_id: i64,
        lines: &[PurchaseLineDraft],
    ) -> DbResult<Purchase> {
        if lines.is_empty() {
            return Err(ValidationError::Required { field: "líneas" }.into());
        }
        for line in lines {
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive { field: "cantidad" }.into());
            }
            if line.unit_cost_ref.is_negative() {
                return Err(ValidationError::OutOfRange {
                    field: "costo unitario",
                    value: line.unit_cost_ref.cents(),
                }
                .into());
            }
        }

        let mut tx = self.pool.begin().await?;

        let settings = order::fetch_settings_tx(&mut tx).await?;
        let rate = order::fetch_rate_tx(&mut tx, settings.calculation_currency).await?;

        let mut total = Money::zero();
        let mut frozen = Vec::with_capacity(lines.len());
        for line in lines {
            let unit_cost_ves = line.unit_cost_ref.to_local(rate);
            total += unit_cost_ves.multiply_quantity(line.quantity);
            frozen.push((line.product_id, line.quantity, unit_cost_ves));
        }

        let now = Utc::now();
        let purchase_id = sqlx::query(
            r#"
            INSERT INTO purchases (provider_id, status, total_ves_cents, exchange_rate_at_purchase, created_at)
            VALUES (?1, 'Pendiente', ?2, ?3, ?4)
            "#,
        )
        .bind(provider_id)
        .bind(total.cents())
        .bind(rate.scaled())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (product_id, quantity, unit_cost_ves) in &frozen {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (purchase_id, product_id, quantity, unit_cost_ves_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(purchase_id)
            .bind(product_id)
            .bind(quantity)
            .bind(unit_cost_ves.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(purchase_id, provider_id, total = %total, rate = %rate, "Purchase created");

        Ok(Purchase {
            id: purchase_id,
            provider_id,
            status: PurchaseStatus::Pendiente,
            total_ves_cents: total.cents(),
            exchange_rate_at_purchase: rate.scaled(),
            created_at: now,
        })
    }

    /// Receives a pending purchase into a warehouse: credits every line's
    /// stock once and completes the document. A second reception of the
    /// same purchase is refused.
    pub async fn receive_purchase(&self, purchase_id: i64, warehouse_id: i64) -> DbResult<Reception> {
        let mut tx = self.pool.begin().await?;

        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT id, provider_id, status, total_ves_cents, exchange_rate_at_purchase, created_at
            FROM purchases
            WHERE id = ?1
            "#,
        )
        .bind(purchase_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Compra", purchase_id))?;

        if purchase.status != PurchaseStatus::Pendiente {
            return Err(LedgerError::AlreadyProcessed {
                document: "Compra",
                id: purchase_id,
                status: purchase.status.label().to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let reception_id = sqlx::query(
            "INSERT INTO receptions (purchase_id, warehouse_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(purchase_id)
        .bind(warehouse_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let items = self.items_tx(&mut tx, purchase_id).await?;
        let document = DocumentRef::purchase(purchase_id);
        for item in &items {
            stock::credit_tx(
                &mut tx,
                item.product_id,
                warehouse_id,
                item.quantity,
                &document,
                Some(RelatedParty::Provider(purchase.provider_id)),
                None,
            )
            .await?;
        }

        sqlx::query("UPDATE purchases SET status = 'Completada' WHERE id = ?1")
            .bind(purchase_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(purchase_id, reception_id, warehouse_id, lines = items.len(), "Purchase received");

        Ok(Reception {
            id: reception_id,
            purchase_id,
            warehouse_id,
            created_at: now,
        })
    }

    /// Pays a provider for a purchase: an Egreso referencing the purchase
    /// document, subject to the usual withdrawal rules (privileged actors
    /// apply immediately, everyone else awaits approval).
    pub async fn pay_purchase(
        &self,
        purchase_id: i64,
        account: AccountRef,
        amount: Money,
        currency: Currency,
        actor: &Actor,
    ) -> DbResult<ManualFinancialMovement> {
        let purchase = self
            .get_purchase(purchase_id)
            .await?
            .ok_or_else(|| DbError::not_found("Compra", purchase_id))?;

        let document = DocumentRef::purchase(purchase.id);
        let draft = ManualMovementDraft {
            description: format!("Pago de compra #{}", purchase.id),
            amount,
            currency,
            direction: FlowDirection::Egreso,
            account,
            document_type: Some(document.doc_type),
            document_id: Some(document.doc_id),
        };

        AccountEngine::new(self.pool.clone())
            .record_movement(&draft, actor)
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets a purchase by id.
    pub async fn get_purchase(&self, id: i64) -> DbResult<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT id, provider_id, status, total_ves_cents, exchange_rate_at_purchase, created_at
            FROM purchases
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    /// Lines of a purchase with their frozen local-currency costs.
    pub async fn items(&self, purchase_id: i64) -> DbResult<Vec<PurchaseItem>> {
        let mut conn = self.pool.acquire().await?;
        self.items_tx(&mut conn, purchase_id).await
    }

    async fn items_tx(
        &self,
        conn: &mut sqlx::SqliteConnection,
        purchase_id: i64,
    ) -> DbResult<Vec<PurchaseItem>> {
        let items = sqlx::query_as::<_, PurchaseItem>(
            r#"
            SELECT id, purchase_id, product_id, quantity, unit_cost_ves_cents
            FROM purchase_items
            WHERE purchase_id = ?1
            ORDER BY id
            "#,
        )
        .bind(purchase_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
