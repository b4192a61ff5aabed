//! # Account Engine
//!
//! Financial accounts and free-standing manual movements.
//!
//! ## Account kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Bank          one configured currency, one running balance         │
//! │  PointOfSale   card terminal; no balance, forwards to its bank      │
//! │  CashBox       two independent drawers (VES and USD); EUR cash is   │
//! │                never accepted                                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Manual movements
//! Deposits (Ingreso) apply immediately. Withdrawals (Egreso) apply
//! immediately only for privileged actors; otherwise they are recorded as
//! `Pendiente` with no balance effect until a privileged actor approves
//! them, at which point funds are re-checked against the live balance.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use bodegon_core::{
    validation::{validate_manual_movement_draft, ManualMovementDraft},
    AccountRef, Actor, ApprovalStatus, Bank, CashBox, Currency, DocumentRef, FlowDirection,
    LedgerError, ManualFinancialMovement, Money, PointOfSale, ValidationError,
};

use crate::error::{DbError, DbResult};
use crate::repository::rate::RateRepository;

// =============================================================================
// Transaction-scoped primitives
// =============================================================================

/// Credits an account inside an open transaction. The tendered currency
/// must be one the account supports.
pub(crate) async fn credit_account_tx(
    conn: &mut SqliteConnection,
    account: AccountRef,
    amount: Money,
    currency: Currency,
) -> DbResult<()> {
    apply_to_account_tx(conn, account, amount, currency).await
}

/// Debits an account inside an open transaction. Fails with
/// [`LedgerError::InsufficientFunds`] when the balance cannot cover the
/// amount, rolling back the caller's whole operation.
pub(crate) async fn debit_account_tx(
    conn: &mut SqliteConnection,
    account: AccountRef,
    amount: Money,
    currency: Currency,
) -> DbResult<()> {
    apply_to_account_tx(conn, account, -amount, currency).await
}

/// Applies a signed delta to the balance an (account, currency) pair
/// resolves to. Negative deltas carry a funds guard in the UPDATE itself.
async fn apply_to_account_tx(
    conn: &mut SqliteConnection,
    account: AccountRef,
    delta: Money,
    currency: Currency,
) -> DbResult<()> {
    match account {
        AccountRef::Bank(id) => apply_to_bank_tx(conn, id, delta, currency, account.describe()).await,
        AccountRef::PointOfSale(id) => {
            // Terminals hold no balance; the delta lands on their bank.
            let bank_id: Option<i64> =
                sqlx::query_scalar("SELECT bank_id FROM pos_terminals WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;
            let bank_id = bank_id.ok_or_else(|| DbError::not_found("Punto de venta", id))?;
            apply_to_bank_tx(conn, bank_id, delta, currency, account.describe()).await
        }
        AccountRef::CashBox(id) => apply_to_cash_box_tx(conn, id, delta, currency).await,
    }
}

async fn apply_to_bank_tx(
    conn: &mut SqliteConnection,
    bank_id: i64,
    delta: Money,
    currency: Currency,
    label: &'static str,
) -> DbResult<()> {
    let bank_currency: Option<Currency> =
        sqlx::query_scalar("SELECT currency FROM banks WHERE id = ?1")
            .bind(bank_id)
            .fetch_optional(&mut *conn)
            .await?;
    let bank_currency = bank_currency.ok_or_else(|| DbError::not_found("Banco", bank_id))?;

    if bank_currency != currency {
        return Err(LedgerError::InvalidAccountCurrency {
            account: label,
            currency,
        }
        .into());
    }

    let result = sqlx::query(
        r#"
        UPDATE banks
        SET balance_cents = balance_cents + ?1
        WHERE id = ?2 AND balance_cents + ?1 >= 0
        "#,
    )
    .bind(delta.cents())
    .bind(bank_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available: i64 = sqlx::query_scalar("SELECT balance_cents FROM banks WHERE id = ?1")
            .bind(bank_id)
            .fetch_one(&mut *conn)
            .await?;
        return Err(LedgerError::InsufficientFunds {
            account: label,
            available: Money::from_cents(available),
            requested: delta.abs(),
        }
        .into());
    }

    debug!(bank_id, delta = %delta, currency = currency.code(), "Bank balance updated");
    Ok(())
}

async fn apply_to_cash_box_tx(
    conn: &mut SqliteConnection,
    cash_box_id: i64,
    delta: Money,
    currency: Currency,
) -> DbResult<()> {
    // Two physical drawers; EUR cash has no drawer.
    let result = match currency {
        Currency::Ves => {
            sqlx::query(
                r#"
                UPDATE cash_boxes
                SET balance_ves_cents = balance_ves_cents + ?1
                WHERE id = ?2 AND balance_ves_cents + ?1 >= 0
                "#,
            )
            .bind(delta.cents())
            .bind(cash_box_id)
            .execute(&mut *conn)
            .await?
        }
        Currency::Usd => {
            sqlx::query(
                r#"
                UPDATE cash_boxes
                SET balance_usd_cents = balance_usd_cents + ?1
                WHERE id = ?2 AND balance_usd_cents + ?1 >= 0
                "#,
            )
            .bind(delta.cents())
            .bind(cash_box_id)
            .execute(&mut *conn)
            .await?
        }
        Currency::Eur => {
            return Err(LedgerError::InvalidAccountCurrency {
                account: "caja",
                currency,
            }
            .into());
        }
    };

    if result.rows_affected() == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM cash_boxes WHERE id = ?1")
            .bind(cash_box_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Caja", cash_box_id));
        }

        let cash_box = fetch_cash_box_tx(conn, cash_box_id).await?;
        return Err(LedgerError::InsufficientFunds {
            account: "caja",
            available: cash_box.balance_for(currency).unwrap_or(Money::zero()),
            requested: delta.abs(),
        }
        .into());
    }

    debug!(cash_box_id, delta = %delta, currency = currency.code(), "Cash box drawer updated");
    Ok(())
}

async fn fetch_cash_box_tx(conn: &mut SqliteConnection, id: i64) -> DbResult<CashBox> {
    let cash_box = sqlx::query_as::<_, CashBox>(
        "SELECT id, name, balance_ves_cents, balance_usd_cents FROM cash_boxes WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Caja", id))?;
    Ok(cash_box)
}

/// Records an already-applied outflow (refund, cancellation payout,
/// purchase payment) inside the caller's transaction: debits the account
/// and inserts the approved Egreso row that documents it.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn record_applied_egreso_tx(
    conn: &mut SqliteConnection,
    description: &str,
    amount: Money,
    currency: Currency,
    amount_ves: Money,
    amount_ref: Money,
    account: AccountRef,
    document: Option<&DocumentRef>,
    actor: &Actor,
) -> DbResult<i64> {
    debit_account_tx(conn, account, amount, currency).await?;

    let (bank_id, pos_id, cash_box_id) = account.column_ids();
    let now = Utc::now();
    let id = sqlx::query(
        r#"
        INSERT INTO manual_financial_movements (
            description, amount_cents, currency, amount_ves_cents, amount_ref_cents,
            direction, status, requested_by, approved_by,
            bank_id, pos_id, cash_box_id,
            document_type, document_id, created_at, approved_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, 'Egreso', 'Aprobado', ?6, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
        "#,
    )
    .bind(description)
    .bind(amount.cents())
    .bind(currency)
    .bind(amount_ves.cents())
    .bind(amount_ref.cents())
    .bind(&actor.username)
    .bind(bank_id)
    .bind(pos_id)
    .bind(cash_box_id)
    .bind(document.map(|d| d.doc_type.as_str()))
    .bind(document.map(|d| d.doc_id))
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

// =============================================================================
// Account Engine
// =============================================================================

/// Public surface for account management and manual financial movements.
#[derive(Debug, Clone)]
pub struct AccountEngine {
    pool: SqlitePool,
}

impl AccountEngine {
    pub fn new(pool: SqlitePool) -> Self {
        AccountEngine { pool }
    }

    // =========================================================================
    // Account CRUD
    // =========================================================================

    /// Creates a bank account with a fixed currency and zero balance.
    pub async fn create_bank(
        &self,
        name: &str,
        account_number: Option<&str>,
        currency: Currency,
    ) -> DbResult<Bank> {
        if name.trim().is_empty() {
            return Err(ValidationError::Required { field: "nombre" }.into());
        }

        let id = sqlx::query(
            "INSERT INTO banks (name, account_number, currency, balance_cents) VALUES (?1, ?2, ?3, 0)",
        )
        .bind(name)
        .bind(account_number)
        .bind(currency)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(id, name, currency = currency.code(), "Bank created");

        Ok(Bank {
            id,
            name: name.to_string(),
            account_number: account_number.map(str::to_string),
            currency,
            balance_cents: 0,
        })
    }

    /// Creates a card terminal forwarding to an existing bank.
    pub async fn create_point_of_sale(&self, name: &str, bank_id: i64) -> DbResult<PointOfSale> {
        if name.trim().is_empty() {
            return Err(ValidationError::Required { field: "nombre" }.into());
        }

        let id = sqlx::query("INSERT INTO pos_terminals (name, bank_id) VALUES (?1, ?2)")
            .bind(name)
            .bind(bank_id)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(PointOfSale {
            id,
            name: name.to_string(),
            bank_id,
        })
    }

    /// Creates a cash box with both drawers at zero.
    pub async fn create_cash_box(&self, name: &str) -> DbResult<CashBox> {
        if name.trim().is_empty() {
            return Err(ValidationError::Required { field: "nombre" }.into());
        }

        let id = sqlx::query(
            "INSERT INTO cash_boxes (name, balance_ves_cents, balance_usd_cents) VALUES (?1, 0, 0)",
        )
        .bind(name)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(CashBox {
            id,
            name: name.to_string(),
            balance_ves_cents: 0,
            balance_usd_cents: 0,
        })
    }

    /// Gets a bank with its current balance.
    pub async fn get_bank(&self, id: i64) -> DbResult<Option<Bank>> {
        let bank = sqlx::query_as::<_, Bank>(
            "SELECT id, name, account_number, currency, balance_cents FROM banks WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bank)
    }

    /// Gets a cash box with its current drawer balances.
    pub async fn get_cash_box(&self, id: i64) -> DbResult<Option<CashBox>> {
        let cash_box = sqlx::query_as::<_, CashBox>(
            "SELECT id, name, balance_ves_cents, balance_usd_cents FROM cash_boxes WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cash_box)
    }

    /// Gets a card terminal.
    pub async fn get_point_of_sale(&self, id: i64) -> DbResult<Option<PointOfSale>> {
        let pos = sqlx::query_as::<_, PointOfSale>(
            "SELECT id, name, bank_id FROM pos_terminals WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(pos)
    }

    // =========================================================================
    // Manual movements
    // =========================================================================

    /// Records a manual financial movement.
    ///
    /// - `Ingreso`: applied immediately, returned as `Aprobado`.
    /// - `Egreso` by a privileged actor: applied immediately.
    /// - `Egreso` by anyone else: stored as `Pendiente` with no balance
    ///   effect until approved.
    pub async fn record_movement(
        &self,
        draft: &ManualMovementDraft,
        actor: &Actor,
    ) -> DbResult<ManualFinancialMovement> {
        validate_manual_movement_draft(draft)?;

        let settings = RateRepository::new(self.pool.clone()).settings().await?;
        let rate = RateRepository::new(self.pool.clone())
            .current_rate(settings.calculation_currency)
            .await?;
        let (amount_ves, amount_ref) = bodegon_core::validation::payment_equivalents(
            draft.amount,
            draft.currency,
            settings.calculation_currency,
            rate,
        )?;

        let immediate = match draft.direction {
            FlowDirection::Ingreso => true,
            FlowDirection::Egreso => actor.privileged,
        };

        let mut tx = self.pool.begin().await?;

        if immediate {
            match draft.direction {
                FlowDirection::Ingreso => {
                    credit_account_tx(&mut tx, draft.account, draft.amount, draft.currency).await?
                }
                FlowDirection::Egreso => {
                    debit_account_tx(&mut tx, draft.account, draft.amount, draft.currency).await?
                }
            }
        }

        let status = if immediate {
            ApprovalStatus::Aprobado
        } else {
            ApprovalStatus::Pendiente
        };
        let (bank_id, pos_id, cash_box_id) = draft.account.column_ids();
        let now = Utc::now();
        let approved_at = immediate.then_some(now);
        let approved_by = immediate.then(|| actor.username.clone());

        let id = sqlx::query(
            r#"
            INSERT INTO manual_financial_movements (
                description, amount_cents, currency, amount_ves_cents, amount_ref_cents,
                direction, status, requested_by, approved_by,
                bank_id, pos_id, cash_box_id,
                document_type, document_id, created_at, approved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&draft.description)
        .bind(draft.amount.cents())
        .bind(draft.currency)
        .bind(amount_ves.cents())
        .bind(amount_ref.cents())
        .bind(draft.direction)
        .bind(status)
        .bind(&actor.username)
        .bind(&approved_by)
        .bind(bank_id)
        .bind(pos_id)
        .bind(cash_box_id)
        .bind(&draft.document_type)
        .bind(draft.document_id)
        .bind(now)
        .bind(approved_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        info!(
            id,
            direction = ?draft.direction,
            status = status.label(),
            amount = %draft.amount,
            currency = draft.currency.code(),
            "Manual movement recorded"
        );

        Ok(ManualFinancialMovement {
            id,
            description: draft.description.clone(),
            amount_cents: draft.amount.cents(),
            currency: draft.currency,
            amount_ves_cents: amount_ves.cents(),
            amount_ref_cents: amount_ref.cents(),
            direction: draft.direction,
            status,
            requested_by: Some(actor.username.clone()),
            approved_by,
            bank_id,
            pos_id,
            cash_box_id,
            document_type: draft.document_type.clone(),
            document_id: draft.document_id,
            created_at: now,
            approved_at,
        })
    }

    /// Approves a pending withdrawal: funds are re-checked against the
    /// live balance, then debited. Privileged actors only.
    pub async fn approve_movement(
        &self,
        id: i64,
        actor: &Actor,
    ) -> DbResult<ManualFinancialMovement> {
        if !actor.privileged {
            return Err(LedgerError::PrivilegeRequired {
                action: "aprobar egreso",
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let movement = fetch_movement_tx(&mut tx, id).await?;
        if movement.status != ApprovalStatus::Pendiente {
            return Err(LedgerError::AlreadyProcessed {
                document: "Movimiento",
                id,
                status: movement.status.label().to_string(),
            }
            .into());
        }
        let account = movement
            .account()
            .ok_or_else(|| DbError::not_found("Cuenta del movimiento", id))?;

        debit_account_tx(&mut tx, account, movement.amount(), movement.currency).await?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE manual_financial_movements
            SET status = 'Aprobado', approved_by = ?2, approved_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&actor.username)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id, approved_by = %actor.username, "Withdrawal approved");

        Ok(ManualFinancialMovement {
            status: ApprovalStatus::Aprobado,
            approved_by: Some(actor.username.clone()),
            approved_at: Some(now),
            ..movement
        })
    }

    /// Rejects a pending withdrawal. No balance effect. Privileged actors
    /// only.
    pub async fn reject_movement(&self, id: i64, actor: &Actor) -> DbResult<()> {
        if !actor.privileged {
            return Err(LedgerError::PrivilegeRequired {
                action: "rechazar egreso",
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let movement = fetch_movement_tx(&mut tx, id).await?;
        if movement.status != ApprovalStatus::Pendiente {
            return Err(LedgerError::AlreadyProcessed {
                document: "Movimiento",
                id,
                status: movement.status.label().to_string(),
            }
            .into());
        }

        sqlx::query(
            r#"
            UPDATE manual_financial_movements
            SET status = 'Rechazado', approved_by = ?2, approved_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&actor.username)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id, rejected_by = %actor.username, "Withdrawal rejected");
        Ok(())
    }

    /// Gets a manual movement by id.
    pub async fn get_movement(&self, id: i64) -> DbResult<Option<ManualFinancialMovement>> {
        let movement = sqlx::query_as::<_, ManualFinancialMovement>(
            r#"
            SELECT id, description, amount_cents, currency, amount_ves_cents, amount_ref_cents,
                   direction, status, requested_by, approved_by,
                   bank_id, pos_id, cash_box_id,
                   document_type, document_id, created_at, approved_at
            FROM manual_financial_movements
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(movement)
    }

    /// Lists pending withdrawals awaiting approval, oldest first.
    pub async fn list_pending(&self) -> DbResult<Vec<ManualFinancialMovement>> {
        let movements = sqlx::query_as::<_, ManualFinancialMovement>(
            r#"
            SELECT id, description, amount_cents, currency, amount_ves_cents, amount_ref_cents,
                   direction, status, requested_by, approved_by,
                   bank_id, pos_id, cash_box_id,
                   document_type, document_id, created_at, approved_at
            FROM manual_financial_movements
            WHERE status = 'Pendiente'
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }
}

async fn fetch_movement_tx(
    conn: &mut SqliteConnection,
    id: i64,
) -> DbResult<ManualFinancialMovement> {
    let movement = sqlx::query_as::<_, ManualFinancialMovement>(
        r#"
        SELECT id, description, amount_cents, currency, amount_ves_cents, amount_ref_cents,
               direction, status, requested_by, approved_by,
               bank_id, pos_id, cash_box_id,
               document_type, document_id, created_at, approved_at
        FROM manual_financial_movements
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Movimiento", id))?;
    Ok(movement)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{admin, cashier, seed};

    fn egreso(amount: Money, currency: Currency, account: AccountRef) -> ManualMovementDraft {
        ManualMovementDraft {
            description: "Pago de servicios".to_string(),
            amount,
            currency,
            direction: FlowDirection::Egreso,
            account,
            document_type: None,
            document_id: None,
        }
    }

    #[tokio::test]
    async fn test_deposit_applies_immediately() {
        let seeded = seed().await;
        let accounts = seeded.db.accounts();

        let draft = ManualMovementDraft {
            description: "Fondo inicial de caja".to_string(),
            amount: Money::from_cents(50_000),
            currency: Currency::Ves,
            direction: FlowDirection::Ingreso,
            account: AccountRef::CashBox(seeded.caja),
            document_type: None,
            document_id: None,
        };
        let movement = accounts.record_movement(&draft, &cashier()).await.unwrap();
        assert_eq!(movement.status, ApprovalStatus::Aprobado);
        assert_eq!(movement.amount_ref_cents, 1_250); // Bs. 500 at 40 Bs/$

        let caja = accounts.get_cash_box(seeded.caja).await.unwrap().unwrap();
        assert_eq!(caja.balance_ves_cents, 50_000);
        assert_eq!(caja.balance_usd_cents, 0);
    }

    #[tokio::test]
    async fn test_withdrawal_approval_flow() {
        let seeded = seed().await;
        let accounts = seeded.db.accounts();

        // Fund the USD drawer first.
        accounts
            .record_movement(
                &ManualMovementDraft {
                    description: "Fondo".to_string(),
                    amount: Money::from_cents(10_000),
                    currency: Currency::Usd,
                    direction: FlowDirection::Ingreso,
                    account: AccountRef::CashBox(seeded.caja),
                    document_type: None,
                    document_id: None,
                },
                &admin(),
            )
            .await
            .unwrap();

        // Non-privileged withdrawal: pending, no balance effect.
        let pending = accounts
            .record_movement(
                &egreso(Money::from_cents(4_000), Currency::Usd, AccountRef::CashBox(seeded.caja)),
                &cashier(),
            )
            .await
            .unwrap();
        assert_eq!(pending.status, ApprovalStatus::Pendiente);
        assert_eq!(
            accounts.get_cash_box(seeded.caja).await.unwrap().unwrap().balance_usd_cents,
            10_000
        );
        assert_eq!(accounts.list_pending().await.unwrap().len(), 1);

        // Approval requires privilege.
        assert!(matches!(
            accounts.approve_movement(pending.id, &cashier()).await.unwrap_err(),
            DbError::Ledger(LedgerError::PrivilegeRequired { .. })
        ));

        let approved = accounts.approve_movement(pending.id, &admin()).await.unwrap();
        assert_eq!(approved.status, ApprovalStatus::Aprobado);
        assert_eq!(
            accounts.get_cash_box(seeded.caja).await.unwrap().unwrap().balance_usd_cents,
            6_000
        );

        // Second approval of the same movement is rejected.
        assert!(matches!(
            accounts.approve_movement(pending.id, &admin()).await.unwrap_err(),
            DbError::Ledger(LedgerError::AlreadyProcessed { .. })
        ));
    }

    #[tokio::test]
    async fn test_approval_rechecks_funds() {
        let seeded = seed().await;
        let accounts = seeded.db.accounts();

        accounts
            .record_movement(
                &ManualMovementDraft {
                    description: "Fondo".to_string(),
                    amount: Money::from_cents(5_000),
                    currency: Currency::Usd,
                    direction: FlowDirection::Ingreso,
                    account: AccountRef::CashBox(seeded.caja),
                    document_type: None,
                    document_id: None,
                },
                &admin(),
            )
            .await
            .unwrap();

        let pending = accounts
            .record_movement(
                &egreso(Money::from_cents(4_000), Currency::Usd, AccountRef::CashBox(seeded.caja)),
                &cashier(),
            )
            .await
            .unwrap();

        // Balance drains between request and approval.
        accounts
            .record_movement(
                &egreso(Money::from_cents(3_000), Currency::Usd, AccountRef::CashBox(seeded.caja)),
                &admin(),
            )
            .await
            .unwrap();

        let err = accounts.approve_movement(pending.id, &admin()).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(LedgerError::InsufficientFunds { .. })
        ));

        // Still pending after the failed approval.
        let still = accounts.get_movement(pending.id).await.unwrap().unwrap();
        assert_eq!(still.status, ApprovalStatus::Pendiente);
    }

    #[tokio::test]
    async fn test_rejected_withdrawal_never_touches_balance() {
        let seeded = seed().await;
        let accounts = seeded.db.accounts();

        let pending = accounts
            .record_movement(
                &egreso(Money::from_cents(1_000), Currency::Ves, AccountRef::CashBox(seeded.caja)),
                &cashier(),
            )
            .await
            .unwrap();

        accounts.reject_movement(pending.id, &admin()).await.unwrap();
        let rejected = accounts.get_movement(pending.id).await.unwrap().unwrap();
        assert_eq!(rejected.status, ApprovalStatus::Rechazado);
        assert_eq!(
            accounts.get_cash_box(seeded.caja).await.unwrap().unwrap().balance_ves_cents,
            0
        );
    }

    #[tokio::test]
    async fn test_account_currency_rules() {
        let seeded = seed().await;
        let accounts = seeded.db.accounts();

        // EUR cash never enters a cash box.
        let err = accounts
            .record_movement(
                &ManualMovementDraft {
                    description: "Depósito".to_string(),
                    amount: Money::from_cents(1_000),
                    currency: Currency::Eur,
                    direction: FlowDirection::Ingreso,
                    account: AccountRef::CashBox(seeded.caja),
                    document_type: None,
                    document_id: None,
                },
                &admin(),
            )
            .await
            .unwrap_err();
        // Rejected before the drawer: EUR isn't the calculation currency
        // either, so the equivalents step already refuses it.
        assert!(matches!(err, DbError::Ledger(LedgerError::Validation(_))));

        // A VES deposit into a USD bank fails on the account itself.
        let err = accounts
            .record_movement(
                &ManualMovementDraft {
                    description: "Depósito".to_string(),
                    amount: Money::from_cents(1_000),
                    currency: Currency::Ves,
                    direction: FlowDirection::Ingreso,
                    account: AccountRef::Bank(seeded.banco_usd),
                    document_type: None,
                    document_id: None,
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(LedgerError::InvalidAccountCurrency { .. })
        ));
    }

    #[tokio::test]
    async fn test_pos_deposit_lands_on_bank() {
        let seeded = seed().await;
        let accounts = seeded.db.accounts();

        accounts
            .record_movement(
                &ManualMovementDraft {
                    description: "Cobro con tarjeta".to_string(),
                    amount: Money::from_cents(80_000),
                    currency: Currency::Ves,
                    direction: FlowDirection::Ingreso,
                    account: AccountRef::PointOfSale(seeded.punto),
                    document_type: None,
                    document_id: None,
                },
                &admin(),
            )
            .await
            .unwrap();

        let bank = accounts.get_bank(seeded.banco_ves).await.unwrap().unwrap();
        assert_eq!(bank.balance_cents, 80_000);
    }
}
