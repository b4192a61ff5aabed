//! # bodegon-db: Transactional Ledger Engine
//!
//! SQLite persistence and the transactional engines for the Bodegón
//! store: orders, payments, stock movements, account balances, reversals
//! and purchases.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Bodegón Data Flow                               │
//! │                                                                     │
//! │  Caller (app layer / tests)                                         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │                  bodegon-db (THIS CRATE)                    │   │
//! │  │                                                             │   │
//! │  │  ┌────────────┐   ┌────────────────┐   ┌───────────────┐   │   │
//! │  │  │  Database  │   │    Engines     │   │  Migrations   │   │   │
//! │  │  │ (pool.rs)  │◄──│ orders, stock, │   │  (embedded)   │   │   │
//! │  │  │ SqlitePool │   │ accounts, ...  │   │ 001_init.sql  │   │   │
//! │  │  └────────────┘   └────────────────┘   └───────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database (WAL mode, foreign keys on)                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Ledger engines (orders, stock, accounts, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bodegon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bodegon.db")).await?;
//! let order = db.orders().create_order(&draft, &actor).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testutil;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Engine re-exports for convenience
pub use repository::account::AccountEngine;
pub use repository::order::OrderEngine;
pub use repository::party::PartyRepository;
pub use repository::product::CatalogRepository;
pub use repository::purchase::PurchaseEngine;
pub use repository::rate::RateRepository;
pub use repository::reversal::ReversalEngine;
pub use repository::stock::StockEngine;
