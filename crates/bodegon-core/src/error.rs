//! # Error Types
//!
//! Typed domain errors for the ledger engine.
//!
//! ## Propagation policy
//! Every failure surfaces to the caller as a typed condition carrying
//! enough context (document id, offending quantity or amount) to render a
//! user message. Nothing is silently swallowed, nothing is retried inside
//! the engine, and every failure rolls back the whole in-flight
//! transaction — no partial movement, balance mutation or document is ever
//! observable.

use thiserror::Error;

use crate::money::Money;
use crate::types::Currency;

// =============================================================================
// Ledger Error
// =============================================================================

/// Business rule violations inside ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No cached rate exists for the required currency. Fatal to the
    /// triggering operation; stale data is acceptable, absent data is not.
    #[error("No hay tasa de cambio disponible para {currency}")]
    RateUnavailable { currency: Currency },

    /// Requested debit exceeds the current stock level. Aborts the whole
    /// order-creation operation before any mutation becomes visible.
    #[error(
        "Stock insuficiente para el producto {product_id} en almacén {warehouse_id}: \
         disponible {available}, solicitado {requested}"
    )]
    InsufficientStock {
        product_id: i64,
        warehouse_id: i64,
        available: i64,
        requested: i64,
    },

    /// Total tendered (converted) is below the order total minus tolerance
    /// for an immediate-settlement sale.
    #[error("Pago insuficiente: total {total}, abonado {tendered}")]
    PaymentShortfall { total: Money, tendered: Money },

    /// Refund instructions do not sum (within tolerance) to the value of
    /// the returned or cancelled lines.
    #[error("Reembolso no coincide: valor devuelto {expected}, reembolso {supplied}")]
    RefundMismatch { expected: Money, supplied: Money },

    /// The destination account does not support the tendered currency.
    #[error("La cuenta ({account}) no acepta {currency}")]
    InvalidAccountCurrency {
        account: &'static str,
        currency: Currency,
    },

    /// The document's state machine no longer permits the action.
    #[error("{document} {id} ya fue procesado (estado: {status})")]
    AlreadyProcessed {
        document: &'static str,
        id: i64,
        status: String,
    },

    /// Account balance cannot cover a withdrawal. Checked again at
    /// approval time, since balances may drift between request and
    /// approval.
    #[error("Fondos insuficientes en {account}: disponible {available}, solicitado {requested}")]
    InsufficientFunds {
        account: &'static str,
        available: Money,
        requested: Money,
    },

    /// The acting user lacks the privilege the action requires (manual
    /// rate override, discount, immediate withdrawal, dispatch approval).
    #[error("Se requiere privilegio de administrador para: {action}")]
    PrivilegeRequired { action: &'static str },

    /// A return line exceeds the quantity still eligible for return.
    #[error(
        "Devolución excede lo vendido en la línea {order_item_id}: \
         disponible {remaining}, solicitado {requested}"
    )]
    ReturnExceedsSold {
        order_item_id: i64,
        remaining: i64,
        requested: i64,
    },

    /// Input validation failure.
    #[error("Validación: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} es obligatorio")]
    Required { field: &'static str },

    #[error("{field} debe ser positivo")]
    MustBePositive { field: &'static str },

    #[error("{field} fuera de rango: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("Moneda no permitida para {field}: {currency}")]
    CurrencyNotAllowed {
        field: &'static str,
        currency: Currency,
    },

    #[error("El descuento ({discount}) excede el subtotal ({subtotal})")]
    DiscountExceedsSubtotal { discount: Money, subtotal: Money },

    #[error("{field} no aplica para este tipo de documento")]
    NotApplicable { field: &'static str },
}

/// Convenience alias for ledger results.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================
