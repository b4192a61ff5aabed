//! # Rates & Company Settings
//!
//! The ledger never fetches rates itself: an external collaborator writes
//! the latest official rate per reference currency into `exchange_rates`,
//! and every operation that needs a conversion reads the cached row. A
//! stale rate is acceptable; an absent one aborts the operation with
//! [`LedgerError::RateUnavailable`].
//!
//! Company settings live in a single row and carry the calculation
//! currency (USD or EUR) that drives totals and payment equivalents.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use bodegon_core::{CompanySettings, Currency, ExchangeRate, LedgerError, RateSnapshot};

use crate::error::{DbError, DbResult};

/// Repository for exchange-rate snapshots and company settings.
#[derive(Debug, Clone)]
pub struct RateRepository {
    pool: SqlitePool,
}

impl RateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RateRepository { pool }
    }

    /// Stores the latest rate for a currency, replacing any previous
    /// snapshot. Called by the external rate fetcher.
    pub async fn upsert_rate(&self, currency: Currency, rate: ExchangeRate) -> DbResult<()> {
        if !rate.is_valid() {
            return Err(bodegon_core::ValidationError::OutOfRange {
                field: "tasa de cambio",
                value: rate.scaled(),
            }
            .into());
        }
        if currency.is_local() {
            return Err(bodegon_core::ValidationError::CurrencyNotAllowed {
                field: "tasa de cambio",
                currency,
            }
            .into());
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO exchange_rates (currency, rate_scaled, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (currency) DO UPDATE SET
                rate_scaled = excluded.rate_scaled,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(currency)
        .bind(rate.scaled())
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(currency = currency.code(), rate = %rate, "Exchange rate updated");
        Ok(())
    }

    /// The latest snapshot for a currency, if one was ever cached.
    pub async fn get_rate(&self, currency: Currency) -> DbResult<Option<RateSnapshot>> {
        let snapshot = sqlx::query_as::<_, RateSnapshot>(
            r#"
            SELECT currency, rate_scaled, updated_at
            FROM exchange_rates
            WHERE currency = ?1
            "#,
        )
        .bind(currency)
        .fetch_optional(&self.pool)
        .await?;

        Ok(snapshot)
    }

    /// The current usable rate for a currency. Absent data is fatal to
    /// the calling operation.
    pub async fn current_rate(&self, currency: Currency) -> DbResult<ExchangeRate> {
        match self.get_rate(currency).await? {
            Some(snapshot) => {
                debug!(currency = currency.code(), rate = %snapshot.rate(), "Rate resolved");
                Ok(snapshot.rate())
            }
            None => Err(LedgerError::RateUnavailable { currency }.into()),
        }
    }

    /// The single company settings row.
    pub async fn settings(&self) -> DbResult<CompanySettings> {
        let settings = sqlx::query_as::<_, CompanySettings>(
            "SELECT id, name, calculation_currency FROM company_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Configuración", 1))?;

        Ok(settings)
    }

    /// Switches the calculation currency (USD or EUR). Takes effect for
    /// documents created afterwards; frozen documents are untouched.
    pub async fn set_calculation_currency(&self, currency: Currency) -> DbResult<()> {
        if currency.is_local() {
            return Err(bodegon_core::ValidationError::CurrencyNotAllowed {
                field: "moneda de cálculo",
                currency,
            }
            .into());
        }

        sqlx::query("UPDATE company_settings SET calculation_currency = ?1 WHERE id = 1")
            .bind(currency)
            .execute(&self.pool)
            .await?;

        info!(currency = currency.code(), "Calculation currency changed");
        Ok(())
    }

    /// Renames the company.
    pub async fn set_company_name(&self, name: &str) -> DbResult<()> {
        if name.trim().is_empty() {
            return Err(bodegon_core::ValidationError::Required { field: "nombre" }.into());
        }

        sqlx::query("UPDATE company_settings SET name = ?1 WHERE id = 1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
