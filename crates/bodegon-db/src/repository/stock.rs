//! # Stock Ledger Engine
//!
//! Per-warehouse stock levels plus the append-only movement log.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  1. Every stock change writes a movement row; movements are never   │
//! │     updated or deleted.                                             │
//! │  2. The signed sum of movements per (product, warehouse) equals the │
//! │     current stock level at every committed state.                   │
//! │  3. quantity >= 0 at every committed state. Debits are a single     │
//! │     conditional UPDATE, so two concurrent sales of the last unit    │
//! │     cannot both succeed: the second one's guard fails and its whole │
//! │     transaction rolls back.                                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `*_tx` helpers run inside the caller's transaction; the order,
//! reversal and purchase engines compose them with their own writes so a
//! document and its stock effects commit or vanish together.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use bodegon_core::{
    DocumentRef, LedgerError, Movement, MovementDirection, RelatedParty, StockLevel,
};

use crate::error::DbResult;

// =============================================================================
// Transaction-scoped primitives
// =============================================================================

/// Credits stock inside an open transaction and logs the movement.
/// Creates the stock row on first contact with a (product, warehouse)
/// pair.
pub(crate) async fn credit_tx(
    conn: &mut SqliteConnection,
    product_id: i64,
    warehouse_id: i64,
    quantity: i64,
    document: &DocumentRef,
    party: Option<RelatedParty>,
    reason: Option<&str>,
) -> DbResult<()> {
    debug_assert!(quantity > 0);

    sqlx::query(
        r#"
        INSERT INTO stock_levels (product_id, warehouse_id, quantity)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (product_id, warehouse_id)
        DO UPDATE SET quantity = quantity + excluded.quantity
        "#,
    )
    .bind(product_id)
    .bind(warehouse_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    record_movement_tx(
        conn,
        product_id,
        warehouse_id,
        MovementDirection::Entrada,
        quantity,
        document,
        party,
        reason,
    )
    .await
}

/// Debits stock inside an open transaction and logs the movement.
///
/// The decrement carries its own availability guard, so under SQLite's
/// single-writer model a committed level can never go negative. When the
/// guard fails the current level is re-read only to build the error.
pub(crate) async fn debit_tx(
    conn: &mut SqliteConnection,
    product_id: i64,
    warehouse_id: i64,
    quantity: i64,
    document: &DocumentRef,
    party: Option<RelatedParty>,
    reason: Option<&str>,
) -> DbResult<()> {
    debug_assert!(quantity > 0);

    let result = sqlx::query(
        r#"
        UPDATE stock_levels
        SET quantity = quantity - ?1
        WHERE product_id = ?2 AND warehouse_id = ?3 AND quantity >= ?1
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .bind(warehouse_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND warehouse_id = ?2",
        )
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_optional(&mut *conn)
        .await?;

        return Err(LedgerError::InsufficientStock {
            product_id,
            warehouse_id,
            available: available.unwrap_or(0),
            requested: quantity,
        }
        .into());
    }

    record_movement_tx(
        conn,
        product_id,
        warehouse_id,
        MovementDirection::Salida,
        quantity,
        document,
        party,
        reason,
    )
    .await
}

/// Appends a movement row. Private to the two primitives above so that a
/// movement can never exist without its level change (and vice versa).
#[allow(clippy::too_many_arguments)]
async fn record_movement_tx(
    conn: &mut SqliteConnection,
    product_id: i64,
    warehouse_id: i64,
    direction: MovementDirection,
    quantity: i64,
    document: &DocumentRef,
    party: Option<RelatedParty>,
    reason: Option<&str>,
) -> DbResult<()> {
    let (party_type, party_id) = match party {
        Some(p) => (Some(p.party_type()), Some(p.party_id())),
        None => (None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO movements (
            product_id, warehouse_id, direction, quantity,
            document_type, document_id,
            related_party_type, related_party_id, reason, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(product_id)
    .bind(warehouse_id)
    .bind(direction)
    .bind(quantity)
    .bind(&document.doc_type)
    .bind(document.doc_id)
    .bind(party_type)
    .bind(party_id)
    .bind(reason)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id,
        warehouse_id,
        ?direction,
        quantity,
        document = %document.doc_type,
        document_id = document.doc_id,
        "Stock movement recorded"
    );

    Ok(())
}

// =============================================================================
// Stock Engine
// =============================================================================

/// Public surface of the stock ledger: queries plus inter-warehouse
/// transfers. Sale, return, adjustment and purchase movements enter
/// through their own engines.
#[derive(Debug, Clone)]
pub struct StockEngine {
    pool: SqlitePool,
}

impl StockEngine {
    pub fn new(pool: SqlitePool) -> Self {
        StockEngine { pool }
    }

    /// Current quantity for a (product, warehouse) pair. Missing rows
    /// read as zero.
    pub async fn level(&self, product_id: i64, warehouse_id: i64) -> DbResult<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND warehouse_id = ?2",
        )
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// Total stock of a product across all warehouses (derived, never
    /// stored).
    pub async fn total(&self, product_id: i64) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity) FROM stock_levels WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// All stock rows for a warehouse.
    pub async fn levels_for_warehouse(&self, warehouse_id: i64) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT id, product_id, warehouse_id, quantity
            FROM stock_levels
            WHERE warehouse_id = ?1
            ORDER BY product_id
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(levels)
    }

    /// Movement history for a product, newest first.
    pub async fn movements(&self, product_id: i64) -> DbResult<Vec<Movement>> {
        let movements = sqlx::query_as::<_, Movement>(
            r#"
            SELECT id, product_id, warehouse_id, direction, quantity,
                   document_type, document_id,
                   related_party_type, related_party_id, reason, created_at
            FROM movements
            WHERE product_id = ?1
            ORDER BY id DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// All movements that a document produced.
    pub async fn movements_for_document(&self, document: &DocumentRef) -> DbResult<Vec<Movement>> {
        let movements = sqlx::query_as::<_, Movement>(
            r#"
            SELECT id, product_id, warehouse_id, direction, quantity,
                   document_type, document_id,
                   related_party_type, related_party_id, reason, created_at
            FROM movements
            WHERE document_type = ?1 AND document_id = ?2
            ORDER BY id
            "#,
        )
        .bind(&document.doc_type)
        .bind(document.doc_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Moves stock between warehouses: one Salida at the origin and one
    /// Entrada at the destination, both referencing the same transfer
    /// document, in one transaction.
    pub async fn transfer(
        &self,
        product_id: i64,
        from_warehouse_id: i64,
        to_warehouse_id: i64,
        quantity: i64,
    ) -> DbResult<i64> {
        if quantity <= 0 {
            return Err(bodegon_core::ValidationError::MustBePositive { field: "cantidad" }.into());
        }
        if from_warehouse_id == to_warehouse_id {
            return Err(bodegon_core::ValidationError::NotApplicable {
                field: "almacén destino",
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let transfer_id = sqlx::query(
            r#"
            INSERT INTO stock_transfers (product_id, from_warehouse_id, to_warehouse_id, quantity, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(product_id)
        .bind(from_warehouse_id)
        .bind(to_warehouse_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let document = DocumentRef::transfer(transfer_id);
        debit_tx(&mut tx, product_id, from_warehouse_id, quantity, &document, None, None).await?;
        credit_tx(&mut tx, product_id, to_warehouse_id, quantity, &document, None, None).await?;

        tx.commit().await?;

        debug!(transfer_id, product_id, from_warehouse_id, to_warehouse_id, quantity, "Transfer committed");
        Ok(transfer_id)
    }

    /// Verifies invariant 2 for one (product, warehouse) pair: signed
    /// movement sum equals the stored level. Diagnostics only.
    pub async fn audit_level(&self, product_id: i64, warehouse_id: i64) -> DbResult<bool> {
        let level = self.level(product_id, warehouse_id).await?;

        let signed_sum: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(CASE direction WHEN 'Entrada' THEN quantity ELSE -quantity END)
            FROM movements
            WHERE product_id = ?1 AND warehouse_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(signed_sum.unwrap_or(0) == level)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::seed;

    #[tokio::test]
    async fn test_credit_then_debit_updates_level_and_log() {
        let seeded = seed().await;
        let stock = seeded.db.stock();

        // Seeded with 100 units on the sales floor.
        assert_eq!(stock.level(seeded.product_a, seeded.tienda).await.unwrap(), 100);

        let mut tx = seeded.db.pool().begin().await.unwrap();
        debit_tx(
            &mut tx,
            seeded.product_a,
            seeded.tienda,
            30,
            &DocumentRef::adjustment(99),
            None,
            Some("conteo"),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(stock.level(seeded.product_a, seeded.tienda).await.unwrap(), 70);
        assert!(stock.audit_level(seeded.product_a, seeded.tienda).await.unwrap());

        let history = stock.movements(seeded.product_a).await.unwrap();
        assert_eq!(history[0].direction, MovementDirection::Salida);
        assert_eq!(history[0].signed_quantity(), -30);
        assert_eq!(history[0].reason.as_deref(), Some("conteo"));
    }

    #[tokio::test]
    async fn test_overdraft_debit_fails_and_rolls_back() {
        let seeded = seed().await;
        let stock = seeded.db.stock();

        let mut tx = seeded.db.pool().begin().await.unwrap();
        let err = debit_tx(
            &mut tx,
            seeded.product_a,
            seeded.tienda,
            101,
            &DocumentRef::sale(1),
            None,
            None,
        )
        .await
        .unwrap_err();
        tx.rollback().await.unwrap();

        match err {
            crate::error::DbError::Ledger(LedgerError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 100);
                assert_eq!(requested, 101);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing moved, nothing logged.
        assert_eq!(stock.level(seeded.product_a, seeded.tienda).await.unwrap(), 100);
        assert!(stock
            .movements_for_document(&DocumentRef::sale(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_transfer_pairs_movements_under_one_document() {
        let seeded = seed().await;
        let stock = seeded.db.stock();

        let transfer_id = stock
            .transfer(seeded.product_a, seeded.tienda, seeded.deposito, 40)
            .await
            .unwrap();

        assert_eq!(stock.level(seeded.product_a, seeded.tienda).await.unwrap(), 60);
        assert_eq!(stock.level(seeded.product_a, seeded.deposito).await.unwrap(), 40);
        assert_eq!(stock.total(seeded.product_a).await.unwrap(), 100);

        let moves = stock
            .movements_for_document(&DocumentRef::transfer(transfer_id))
            .await
            .unwrap();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].direction, MovementDirection::Salida);
        assert_eq!(moves[1].direction, MovementDirection::Entrada);
    }

    #[tokio::test]
    async fn test_transfer_guards_arguments_and_stock() {
        let seeded = seed().await;
        let stock = seeded.db.stock();

        assert!(stock
            .transfer(seeded.product_a, seeded.tienda, seeded.tienda, 5)
            .await
            .is_err());
        assert!(stock
            .transfer(seeded.product_a, seeded.tienda, seeded.deposito, 0)
            .await
            .is_err());

        // Over-transfer leaves both warehouses untouched.
        assert!(stock
            .transfer(seeded.product_a, seeded.tienda, seeded.deposito, 500)
            .await
            .is_err());
        assert_eq!(stock.level(seeded.product_a, seeded.tienda).await.unwrap(), 100);
        assert_eq!(stock.level(seeded.product_a, seeded.deposito).await.unwrap(), 0);
    }
}
