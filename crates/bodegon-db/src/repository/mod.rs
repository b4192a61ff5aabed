//! # Ledger Engines
//!
//! Database engines for the Bodegón ledger.
//!
//! ## Transaction discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Every ledger operation (an order, a payment, a return, ...) runs   │
//! │  inside ONE SQLite transaction. Engines expose pool-level methods;  │
//! │  the shared building blocks (stock credits/debits, account          │
//! │  movements, sequence allocation, payment application) are           │
//! │  pub(crate) `*_tx` functions taking `&mut SqliteConnection`, so     │
//! │  engines compose them under their own transaction and a failure at  │
//! │  any step rolls back the whole document.                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Engines
//!
//! - [`rate::RateRepository`] - Exchange rates and company settings
//! - [`product::CatalogRepository`] - Products and warehouses
//! - [`party::PartyRepository`] - Clients and providers
//! - [`stock::StockEngine`] - Stock levels, movements, transfers
//! - [`account::AccountEngine`] - Accounts and manual movements
//! - [`order::OrderEngine`] - Order lifecycle
//! - [`reversal::ReversalEngine`] - Cancellations, returns, adjustments
//! - [`purchase::PurchaseEngine`] - Purchases and receptions

pub mod account;
pub mod order;
pub mod party;
pub mod payment;
pub mod product;
pub mod purchase;
pub mod rate;
pub mod reversal;
pub mod sequence;
pub mod stock;
