//! # Drafts & Order Math
//!
//! Input drafts for ledger operations plus the pure arithmetic that runs
//! on them before anything touches the database.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE - draft shape and business arithmetic         │
//! │  Layer 2: Ledger engines - stock/balance/state-machine checks       │
//! │           inside the operation's transaction                        │
//! │  Layer 3: SQLite - NOT NULL / UNIQUE / FK / CHECK constraints       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is deterministic: same draft + same rate = same totals.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::{ExchangeRate, Money};
use crate::types::{AccountRef, Currency, FlowDirection, OrderKind};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Drafts
// =============================================================================

/// One requested order line: product and quantity only. Prices are never
/// taken from the caller; they are resolved from the catalog and frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineDraft {
    pub product_id: i64,
    pub quantity: i64,
}

/// A tendered payment: amount in the currency actually handed over, and
/// the destination account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub amount: Money,
    pub currency: Currency,
    pub destination: AccountRef,
    pub method: Option<String>,
    pub reference: Option<String>,
}

/// A requested sale document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub client_id: i64,
    pub kind: OrderKind,
    pub lines: Vec<OrderLineDraft>,
    pub payments: Vec<PaymentDraft>,
    /// Discount in the reference currency. Privileged actors only.
    pub discount_ref: Money,
    /// Per-order rate override. Privileged actors only; frozen into
    /// `exchange_rate_at_sale`.
    pub manual_rate: Option<ExchangeRate>,
}

/// A requested free-standing financial movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualMovementDraft {
    pub description: String,
    pub amount: Money,
    pub currency: Currency,
    pub direction: FlowDirection,
    pub account: AccountRef,
    pub document_type: Option<String>,
    pub document_id: Option<i64>,
}

/// One line of a partial return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLineDraft {
    pub order_item_id: i64,
    pub quantity: i64,
}

/// A refund instruction accompanying a return: where the money leaves
/// from, in which currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundDraft {
    pub amount: Money,
    pub currency: Currency,
    pub account: AccountRef,
}

/// One counted product in an inventory adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountDraft {
    pub product_id: i64,
    pub counted_quantity: i64,
}

/// One line of a purchase order, costed in the reference currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLineDraft {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_cost_ref: Money,
}

// =============================================================================
// Draft validation
// =============================================================================

/// Shape checks on an order draft. Runs before any database work.
pub fn validate_order_draft(draft: &OrderDraft) -> ValidationResult<()> {
    if draft.lines.is_empty() {
        return Err(ValidationError::Required { field: "líneas" });
    }
    for line in &draft.lines {
        if line.quantity <= 0 {
            return Err(ValidationError::MustBePositive { field: "cantidad" });
        }
    }
    for payment in &draft.payments {
        if !payment.amount.is_positive() {
            return Err(ValidationError::MustBePositive { field: "monto del pago" });
        }
    }
    if draft.discount_ref.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "descuento",
            value: draft.discount_ref.cents(),
        });
    }
    if let Some(rate) = draft.manual_rate {
        if !rate.is_valid() {
            return Err(ValidationError::OutOfRange {
                field: "tasa manual",
                value: rate.scaled(),
            });
        }
    }
    Ok(())
}

/// Shape checks on a manual movement draft.
pub fn validate_manual_movement_draft(draft: &ManualMovementDraft) -> ValidationResult<()> {
    if draft.description.trim().is_empty() {
        return Err(ValidationError::Required { field: "descripción" });
    }
    if !draft.amount.is_positive() {
        return Err(ValidationError::MustBePositive { field: "monto" });
    }
    Ok(())
}

// =============================================================================
// Order math
// =============================================================================

/// A draft line joined with its catalog prices (reference currency).
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_ref: Money,
    pub unit_cost_ref: Money,
}

/// A line with price and cost frozen in local currency, ready to persist.
#[derive(Debug, Clone)]
pub struct FrozenLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_ves: Money,
    pub unit_cost_ves: Money,
}

/// Totals of an order, computed once at creation and frozen.
#[derive(Debug, Clone)]
pub struct OrderTotals {
    /// Reference-currency total after discount.
    pub total_ref: Money,
    /// Local-currency total, derived through the frozen rate.
    pub total_ves: Money,
    pub lines: Vec<FrozenLine>,
}

/// Computes order totals: line totals in the reference currency, minus the
/// discount, converted through the frozen rate; each line's unit price and
/// cost converted and frozen in local currency.
pub fn compute_totals(
    lines: &[PricedLine],
    discount_ref: Money,
    rate: ExchangeRate,
) -> ValidationResult<OrderTotals> {
    let mut subtotal_ref = Money::zero();
    let mut frozen = Vec::with_capacity(lines.len());

    for line in lines {
        subtotal_ref += line.unit_price_ref.multiply_quantity(line.quantity);
        frozen.push(FrozenLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price_ves: line.unit_price_ref.to_local(rate),
            unit_cost_ves: line.unit_cost_ref.to_local(rate),
        });
    }

    if discount_ref > subtotal_ref {
        return Err(ValidationError::DiscountExceedsSubtotal {
            discount: discount_ref,
            subtotal: subtotal_ref,
        });
    }

    let total_ref = subtotal_ref - discount_ref;
    Ok(OrderTotals {
        total_ref,
        total_ves: total_ref.to_local(rate),
        lines: frozen,
    })
}

/// Frozen currency equivalents of a tendered amount: `(local, reference)`.
///
/// Payments may be tendered in the local currency or in the calculation
/// currency; anything else is rejected before the ledger touches an
/// account.
pub fn payment_equivalents(
    amount: Money,
    currency: Currency,
    calculation_currency: Currency,
    rate: ExchangeRate,
) -> ValidationResult<(Money, Money)> {
    if currency.is_local() {
        Ok((amount, amount.to_reference(rate)))
    } else if currency == calculation_currency {
        Ok((amount.to_local(rate), amount))
    } else {
        Err(ValidationError::CurrencyNotAllowed {
            field: "pago",
            currency,
        })
    }
}

/// Sum of a draft's payments converted to local currency.
pub fn tendered_total_ves(
    payments: &[PaymentDraft],
    calculation_currency: Currency,
    rate: ExchangeRate,
) -> ValidationResult<Money> {
    let mut total = Money::zero();
    for p in payments {
        let (ves, _) = payment_equivalents(p.amount, p.currency, calculation_currency, rate)?;
        total += ves;
    }
    Ok(total)
}

// =============================================================================
// Unit Tests
// =============================================================================
