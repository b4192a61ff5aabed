//! # Document Sequence Allocation
//!
//! Order ids come from four named sequences seeded at non-overlapping
//! bases (see `bodegon_core::sequence`). Allocation is a single
//! `UPDATE ... RETURNING` inside the caller's transaction, so concurrent
//! writers can never observe the same value and a rolled-back operation
//! releases its number along with everything else.

use sqlx::SqliteConnection;
use tracing::debug;

use bodegon_core::OrderKind;

use crate::error::{DbError, DbResult};

/// Allocates the next id for the given sale kind inside an open
/// transaction.
pub(crate) async fn next_id_tx(conn: &mut SqliteConnection, kind: OrderKind) -> DbResult<i64> {
    let id: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE document_sequences
        SET current_value = current_value + 1
        WHERE name = ?1
        RETURNING current_value
        "#,
    )
    .bind(kind.sequence_name())
    .fetch_optional(&mut *conn)
    .await?;

    let id = id.ok_or_else(|| DbError::not_found("Secuencia", kind.sequence_name()))?;
    debug!(sequence = kind.sequence_name(), id, "Allocated document id");
    Ok(id)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_sequences_start_at_kind_base() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.pool().begin().await.unwrap();

        assert_eq!(next_id_tx(&mut tx, OrderKind::Regular).await.unwrap(), 1);
        assert_eq!(
            next_id_tx(&mut tx, OrderKind::Credit).await.unwrap(),
            200_000_001
        );
        assert_eq!(
            next_id_tx(&mut tx, OrderKind::Reservation).await.unwrap(),
            400_000_001
        );
        assert_eq!(
            next_id_tx(&mut tx, OrderKind::SpecialDispatch).await.unwrap(),
            600_000_001
        );

        // Consecutive allocations are monotonic per sequence.
        assert_eq!(next_id_tx(&mut tx, OrderKind::Regular).await.unwrap(), 2);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_releases_the_number() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(next_id_tx(&mut tx, OrderKind::Regular).await.unwrap(), 1);
        tx.rollback().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(next_id_tx(&mut tx, OrderKind::Regular).await.unwrap(), 1);
        tx.commit().await.unwrap();
    }
}
