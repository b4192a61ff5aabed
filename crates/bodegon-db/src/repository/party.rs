//! # Party Repository
//!
//! Clients (sale counterparties) and providers (purchase counterparties).
//! Parties are reporting metadata: movements and documents reference them,
//! but the ledger never mutates them as part of an operation.

use sqlx::SqlitePool;
use tracing::debug;

use bodegon_core::{Client, Provider, ValidationError};

use crate::error::DbResult;

/// Repository for clients and providers.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    /// Creates a client.
    pub async fn create_client(
        &self,
        name: &str,
        cedula_rif: Option<&str>,
        phone: Option<&str>,
    ) -> DbResult<Client> {
        if name.trim().is_empty() {
            return Err(ValidationError::Required { field: "nombre" }.into());
        }

        let id = sqlx::query("INSERT INTO clients (name, cedula_rif, phone) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(cedula_rif)
            .bind(phone)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        debug!(id, name, "Client created");

        Ok(Client {
            id,
            name: name.to_string(),
            cedula_rif: cedula_rif.map(str::to_string),
            phone: phone.map(str::to_string),
        })
    }

    /// Gets a client by id.
    pub async fn get_client(&self, id: i64) -> DbResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(
            "SELECT id, name, cedula_rif, phone FROM clients WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    /// Lists all clients alphabetically.
    pub async fn list_clients(&self) -> DbResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT id, name, cedula_rif, phone FROM clients ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    /// Creates a provider.
    pub async fn create_provider(
        &self,
        name: &str,
        contact: Option<&str>,
        phone: Option<&str>,
    ) -> DbResult<Provider> {
        if name.trim().is_empty() {
            return Err(ValidationError::Required { field: "nombre" }.into());
        }

        let id = sqlx::query("INSERT INTO providers (name, contact, phone) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(contact)
            .bind(phone)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        debug!(id, name, "Provider created");

        Ok(Provider {
            id,
            name: name.to_string(),
            contact: contact.map(str::to_string),
            phone: phone.map(str::to_string),
        })
    }

    /// Gets a provider by id.
    pub async fn get_provider(&self, id: i64) -> DbResult<Option<Provider>> {
        let provider = sqlx::query_as::<_, Provider>(
            "SELECT id, name, contact, phone FROM providers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(provider)
    }

    /// Lists all providers alphabetically.
    pub async fn list_providers(&self) -> DbResult<Vec<Provider>> {
        let providers = sqlx::query_as::<_, Provider>(
            "SELECT id, name, contact, phone FROM providers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(providers)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
