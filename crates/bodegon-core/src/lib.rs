//! # bodegon-core: Pure Business Logic for the Bodegón Ledger Engine
//!
//! This crate is the heart of the system: money arithmetic, exchange-rate
//! snapshots, domain types, document sequences, draft validation and order
//! math — all as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Bodegón Architecture                            │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │             ★ bodegon-core (THIS CRATE) ★                     │ │
//! │  │                                                               │ │
//! │  │  ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────────┐         │ │
//! │  │  │  types  │ │  money  │ │ sequence │ │ validation │         │ │
//! │  │  │ Order   │ │  Money  │ │ id bases │ │ drafts &   │         │ │
//! │  │  │ Movement│ │  Rates  │ │ display  │ │ order math │         │ │
//! │  │  └─────────┘ └─────────┘ └──────────┘ └────────────┘         │ │
//! │  │                                                               │ │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │ │
//! │  └──────────────────────────┬────────────────────────────────────┘ │
//! │                             │                                       │
//! │  ┌──────────────────────────▼────────────────────────────────────┐ │
//! │  │                bodegon-db (Database Layer)                     │ │
//! │  │   SQLite transactions: stock ledger, accounts, orders,         │ │
//! │  │   payments, reversals, purchases                               │ │
//! │  └────────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Integer money**: every amount is minor units in an `i64`; exchange
//!    rates are scaled integers. No floating point anywhere.
//! 2. **Frozen snapshots**: prices, costs and rates are copied into the
//!    transaction record at creation time, never recomputed.
//! 3. **Explicit errors**: all failures are typed enum variants with
//!    enough context to render a user message.

pub mod error;
pub mod money;
pub mod sequence;
pub mod types;
pub mod validation;

pub use error::{LedgerError, LedgerResult, ValidationError};
pub use money::{ExchangeRate, Money, SETTLEMENT_TOLERANCE};
pub use types::*;
