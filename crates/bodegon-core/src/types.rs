//! # Domain Types
//!
//! Core domain types for the Bodegón ledger engine.
//!
//! ## Record lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Orders, Payments, Movements, Returns and Adjustments are created   │
//! │  once and never mutated afterwards, except for status and derived   │
//! │  summary fields. Nothing is hard-deleted: documents are REVERSED    │
//! │  by compensating movements, never removed.                          │
//! │                                                                     │
//! │  Frozen snapshots: order lines copy the unit price/cost in local    │
//! │  currency at sale time, payments copy both currency equivalents,    │
//! │  and every order freezes `exchange_rate_at_sale`. Later edits to    │
//! │  products or rates never alter historical records.                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All monetary fields are stored as integer minor units (`*_cents`), the
//! convention carried through the whole workspace; accessor methods expose
//! them as [`Money`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{ExchangeRate, Money};

// =============================================================================
// Currency
// =============================================================================

/// The currencies the store operates in.
///
/// `Ves` is the local currency (cash drawers, bank balances, printed
/// totals); `Usd`/`Eur` are reference currencies (catalog prices, most
/// reporting). Which reference currency drives calculations is a company
/// setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "VES"))]
    Ves,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "USD"))]
    Usd,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "EUR"))]
    Eur,
}

impl Currency {
    /// ISO 4217 code.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Ves => "VES",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    /// Whether this is the local (balance) currency.
    #[inline]
    pub const fn is_local(&self) -> bool {
        matches!(self, Currency::Ves)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Order Kind & Status
// =============================================================================

/// Sale document types. A closed enum so the compiler enforces
/// exhaustiveness over the four materially different commit paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Cash sale: settled in full at creation.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "contado"))]
    Regular,
    /// Credit sale: partial payments until due ≤ tolerance.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "credito"))]
    Credit,
    /// Layaway: stock is held at creation, delivered once paid off.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "apartado"))]
    Reservation,
    /// Special dispatch: requires approval; stock moves on approval.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "despacho_especial"))]
    SpecialDispatch,
}

impl OrderKind {
    /// Whether the full amount must be tendered at creation.
    #[inline]
    pub const fn immediate_settlement(&self) -> bool {
        matches!(self, OrderKind::Regular)
    }

    /// Whether partial payment is permitted at creation.
    #[inline]
    pub const fn allows_partial_payment(&self) -> bool {
        matches!(self, OrderKind::Credit | OrderKind::Reservation)
    }
}

/// Order state machine. Spanish labels are the stored/printed form, kept
/// verbatim from the paper workflow:
///
/// ```text
/// regular:     Pendiente → Pagada | Anulada | Devolución Parcial
/// credit:      Pendiente → Crédito → Pagada
/// reservation: Pendiente → Apartado → Pagado → Entregado
/// dispatch:    Pendiente de Aprobación → Completada | Anulada
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum OrderStatus {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Pendiente"))]
    Pendiente,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Pagada"))]
    Pagada,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Anulada"))]
    Anulada,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Devolución Parcial"))]
    #[serde(rename = "Devolución Parcial")]
    DevolucionParcial,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Crédito"))]
    #[serde(rename = "Crédito")]
    Credito,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Apartado"))]
    Apartado,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Pagado"))]
    Pagado,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Entregado"))]
    Entregado,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Pendiente de Aprobación"))]
    #[serde(rename = "Pendiente de Aprobación")]
    PendienteAprobacion,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Completada"))]
    Completada,
}

impl OrderStatus {
    /// The stored/printed label.
    pub const fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pendiente => "Pendiente",
            OrderStatus::Pagada => "Pagada",
            OrderStatus::Anulada => "Anulada",
            OrderStatus::DevolucionParcial => "Devolución Parcial",
            OrderStatus::Credito => "Crédito",
            OrderStatus::Apartado => "Apartado",
            OrderStatus::Pagado => "Pagado",
            OrderStatus::Entregado => "Entregado",
            OrderStatus::PendienteAprobacion => "Pendiente de Aprobación",
            OrderStatus::Completada => "Completada",
        }
    }

    /// Whether further payments may be applied in this state.
    #[inline]
    pub const fn accepts_payments(&self) -> bool {
        matches!(self, OrderStatus::Credito | OrderStatus::Apartado)
    }

    /// Whether the order still holds reversible stock/payments.
    #[inline]
    pub const fn reversible(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pagada
                | OrderStatus::Credito
                | OrderStatus::Apartado
                | OrderStatus::Pagado
                | OrderStatus::Entregado
                | OrderStatus::Completada
        )
    }
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum MovementDirection {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Entrada"))]
    Entrada,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Salida"))]
    Salida,
}

impl MovementDirection {
    /// Sign applied when summing movements against a stock level.
    #[inline]
    pub const fn sign(&self) -> i64 {
        match self {
            MovementDirection::Entrada => 1,
            MovementDirection::Salida => -1,
        }
    }
}

/// Reference to the document that originated a movement.
///
/// Traceability only: the ledger never validates that the referenced
/// document exists, only that a reference is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub doc_type: String,
    pub doc_id: i64,
}

impl DocumentRef {
    pub fn new(doc_type: impl Into<String>, doc_id: i64) -> Self {
        DocumentRef {
            doc_type: doc_type.into(),
            doc_id,
        }
    }

    pub fn sale(id: i64) -> Self {
        Self::new("Orden de Venta", id)
    }

    pub fn purchase(id: i64) -> Self {
        Self::new("Orden de Compra", id)
    }

    pub fn order_return(id: i64) -> Self {
        Self::new("Devolución", id)
    }

    pub fn adjustment(id: i64) -> Self {
        Self::new("Ajuste de Inventario", id)
    }

    pub fn transfer(id: i64) -> Self {
        Self::new("Traslado", id)
    }

    pub fn cancellation(id: i64) -> Self {
        Self::new("Anulación de Orden", id)
    }
}

/// Counterparty recorded on a movement (reporting metadata).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelatedParty {
    Client(i64),
    Provider(i64),
}

impl RelatedParty {
    pub const fn party_type(&self) -> &'static str {
        match self {
            RelatedParty::Client(_) => "Cliente",
            RelatedParty::Provider(_) => "Proveedor",
        }
    }

    pub const fn party_id(&self) -> i64 {
        match self {
            RelatedParty::Client(id) | RelatedParty::Provider(id) => *id,
        }
    }
}

/// Immutable, append-only stock ledger entry: the sole source of truth for
/// stock history. The signed sum of movements per (product, warehouse)
/// must equal the current stock level at every committed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Movement {
    pub id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub direction: MovementDirection,
    pub quantity: i64,
    pub document_type: String,
    pub document_id: i64,
    pub related_party_type: Option<String>,
    pub related_party_id: Option<i64>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Quantity signed by direction.
    #[inline]
    pub const fn signed_quantity(&self) -> i64 {
        self.quantity * self.direction.sign()
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product in the catalog. Prices and costs are denominated in the
/// reference currency (USD). Stock is *derived* from per-warehouse stock
/// rows, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub barcode: String,
    pub description: Option<String>,
    pub cost_usd_cents: i64,
    pub price_usd_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_usd_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_usd_cents)
    }
}

/// A physical stock location. The first-created sellable warehouse is the
/// sales floor: customer-facing sale debits always target it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: i64,
    pub name: String,
    pub sellable: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-(product, warehouse) quantity counter. `quantity >= 0` at every
/// committed state; the decrement is an atomic conditional update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
}

// =============================================================================
// Parties
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub cedula_rif: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub contact: Option<String>,
    pub phone: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// A sale document. The id comes from the kind-specific sequence, so the
/// printed 9-digit number alone communicates the sale type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub client_id: i64,
    pub kind: OrderKind,
    pub status: OrderStatus,
    /// Total in local currency, frozen at creation.
    pub total_ves_cents: i64,
    /// Total in the reference currency, after discount.
    pub total_ref_cents: i64,
    /// Discount in the reference currency (privileged actors only).
    pub discount_ref_cents: i64,
    /// Conversion rate captured once at creation, scaled by 10 000.
    /// Never recomputed.
    pub exchange_rate_at_sale: i64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total_ves(&self) -> Money {
        Money::from_cents(self.total_ves_cents)
    }

    #[inline]
    pub fn total_ref(&self) -> Money {
        Money::from_cents(self.total_ref_cents)
    }

    #[inline]
    pub fn rate(&self) -> ExchangeRate {
        ExchangeRate::from_scaled(self.exchange_rate_at_sale)
    }

    /// External representation: the id zero-padded to 9 digits.
    pub fn display_id(&self) -> String {
        crate::sequence::display_id(self.id)
    }
}

/// An order line. Price and cost are frozen copies in local currency, not
/// references to the live product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Unit price in local currency at sale time (frozen).
    pub unit_price_ves_cents: i64,
    /// Unit cost in local currency at sale time (frozen).
    pub unit_cost_ves_cents: i64,
    /// Cumulative quantity reversed through partial returns. The original
    /// `quantity` is never decremented.
    pub returned_quantity: i64,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_ves_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    /// Units still eligible for return.
    #[inline]
    pub const fn returnable_quantity(&self) -> i64 {
        self.quantity - self.returned_quantity
    }
}

// =============================================================================
// Accounts
// =============================================================================

/// Destination of funds: exactly one of the three account kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum AccountRef {
    Bank(i64),
    PointOfSale(i64),
    CashBox(i64),
}

impl AccountRef {
    /// Splits into the three nullable foreign-key columns the schema uses.
    pub const fn column_ids(&self) -> (Option<i64>, Option<i64>, Option<i64>) {
        match self {
            AccountRef::Bank(id) => (Some(*id), None, None),
            AccountRef::PointOfSale(id) => (None, Some(*id), None),
            AccountRef::CashBox(id) => (None, None, Some(*id)),
        }
    }

    /// Rebuilds the reference from the nullable columns.
    pub const fn from_column_ids(
        bank_id: Option<i64>,
        pos_id: Option<i64>,
        cash_box_id: Option<i64>,
    ) -> Option<Self> {
        match (bank_id, pos_id, cash_box_id) {
            (Some(id), None, None) => Some(AccountRef::Bank(id)),
            (None, Some(id), None) => Some(AccountRef::PointOfSale(id)),
            (None, None, Some(id)) => Some(AccountRef::CashBox(id)),
            _ => None,
        }
    }

    pub const fn describe(&self) -> &'static str {
        match self {
            AccountRef::Bank(_) => "banco",
            AccountRef::PointOfSale(_) => "punto de venta",
            AccountRef::CashBox(_) => "caja",
        }
    }
}

/// A bank account: single configured currency, running balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Bank {
    pub id: i64,
    pub name: String,
    pub account_number: Option<String>,
    pub currency: Currency,
    pub balance_cents: i64,
}

impl Bank {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// A card terminal. Holds no balance of its own; funds land on the
/// associated bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PointOfSale {
    pub id: i64,
    pub name: String,
    pub bank_id: i64,
}

/// A cash drawer with two independent balances, one per tendered currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashBox {
    pub id: i64,
    pub name: String,
    pub balance_ves_cents: i64,
    pub balance_usd_cents: i64,
}

impl CashBox {
    /// The drawer balance for a tendered currency, if the drawer exists.
    pub const fn balance_for(&self, currency: Currency) -> Option<Money> {
        match currency {
            Currency::Ves => Some(Money::from_cents(self.balance_ves_cents)),
            Currency::Usd => Some(Money::from_cents(self.balance_usd_cents)),
            Currency::Eur => None,
        }
    }
}

// =============================================================================
// Payments & Manual Movements
// =============================================================================

/// A payment towards an order. Carries the amount in the currency actually
/// tendered plus frozen equivalents in both bookkeeping currencies,
/// computed with the rate in effect at payment time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub amount_cents: i64,
    pub currency: Currency,
    pub amount_ves_cents: i64,
    pub amount_ref_cents: i64,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub bank_id: Option<i64>,
    pub pos_id: Option<i64>,
    pub cash_box_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn amount_ves(&self) -> Money {
        Money::from_cents(self.amount_ves_cents)
    }

    pub fn destination(&self) -> Option<AccountRef> {
        AccountRef::from_column_ids(self.bank_id, self.pos_id, self.cash_box_id)
    }
}

/// Direction of a free-standing financial movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum FlowDirection {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Ingreso"))]
    Ingreso,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Egreso"))]
    Egreso,
}

/// Approval state for manual movements (and purchase documents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum ApprovalStatus {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Pendiente"))]
    Pendiente,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Aprobado"))]
    Aprobado,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Rechazado"))]
    Rechazado,
}

impl ApprovalStatus {
    /// The stored/printed label.
    pub const fn label(&self) -> &'static str {
        match self {
            ApprovalStatus::Pendiente => "Pendiente",
            ApprovalStatus::Aprobado => "Aprobado",
            ApprovalStatus::Rechazado => "Rechazado",
        }
    }
}

/// A free-standing financial entry (withdrawal, deposit, purchase payment,
/// refund) not tied to an order. Withdrawals requested by non-privileged
/// actors sit in `Pendiente` with no balance effect until approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ManualFinancialMovement {
    pub id: i64,
    pub description: String,
    pub amount_cents: i64,
    pub currency: Currency,
    pub amount_ves_cents: i64,
    pub amount_ref_cents: i64,
    pub direction: FlowDirection,
    pub status: ApprovalStatus,
    pub requested_by: Option<String>,
    pub approved_by: Option<String>,
    pub bank_id: Option<i64>,
    pub pos_id: Option<i64>,
    pub cash_box_id: Option<i64>,
    pub document_type: Option<String>,
    pub document_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl ManualFinancialMovement {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    pub fn account(&self) -> Option<AccountRef> {
        AccountRef::from_column_ids(self.bank_id, self.pos_id, self.cash_box_id)
    }
}

// =============================================================================
// Returns & Adjustments
// =============================================================================

/// Immutable record of a partial return event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderReturn {
    pub id: i64,
    pub order_id: i64,
    /// Value of the returned lines in local currency.
    pub total_ves_cents: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderReturnItem {
    pub id: i64,
    pub return_id: i64,
    pub order_item_id: i64,
    pub quantity: i64,
    /// quantity × frozen unit price, in local currency.
    pub value_ves_cents: i64,
}

/// Immutable record of a theoretical-vs-counted stock comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryAdjustment {
    pub id: i64,
    pub warehouse_id: i64,
    pub reason: String,
    /// Net valuation delta in the reference currency (Σ delta × unit cost).
    pub valuation_ref_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryAdjustmentItem {
    pub id: i64,
    pub adjustment_id: i64,
    pub product_id: i64,
    pub theoretical_quantity: i64,
    pub counted_quantity: i64,
    /// counted − theoretical. Positive credits stock, negative debits it.
    pub delta: i64,
}

// =============================================================================
// Purchasing
// =============================================================================

/// Purchase document status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum PurchaseStatus {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Pendiente"))]
    Pendiente,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Completada"))]
    Completada,
}

impl PurchaseStatus {
    /// The stored/printed label.
    pub const fn label(&self) -> &'static str {
        match self {
            PurchaseStatus::Pendiente => "Pendiente",
            PurchaseStatus::Completada => "Completada",
        }
    }
}

/// A purchase order. Unit costs are frozen in local currency with the rate
/// at purchase time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: i64,
    pub provider_id: i64,
    pub status: PurchaseStatus,
    pub total_ves_cents: i64,
    pub exchange_rate_at_purchase: i64,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    #[inline]
    pub fn total_ves(&self) -> Money {
        Money::from_cents(self.total_ves_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: i64,
    pub purchase_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Unit cost in local currency at purchase time (frozen).
    pub unit_cost_ves_cents: i64,
}

/// Goods receipt for a purchase: the moment stock is credited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reception {
    pub id: i64,
    pub purchase_id: i64,
    pub warehouse_id: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Rates & Settings
// =============================================================================

/// The most recently cached rate for a currency. Maintained by an external
/// fetch-and-cache collaborator; the ledger only reads the latest row.
/// Stale is acceptable, absent is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RateSnapshot {
    pub currency: Currency,
    pub rate_scaled: i64,
    pub updated_at: DateTime<Utc>,
}

impl RateSnapshot {
    #[inline]
    pub fn rate(&self) -> ExchangeRate {
        ExchangeRate::from_scaled(self.rate_scaled)
    }
}

/// Single-row company configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CompanySettings {
    pub id: i64,
    pub name: String,
    /// Reference currency driving price calculations (USD or EUR).
    pub calculation_currency: Currency,
}

/// Who is performing an operation. Privilege gates manual rate overrides,
/// discounts, immediate withdrawals and dispatch approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub username: String,
    pub privileged: bool,
}

impl Actor {
    pub fn privileged(username: impl Into<String>) -> Self {
        Actor {
            username: username.into(),
            privileged: true,
        }
    }

    pub fn employee(username: impl Into<String>) -> Self {
        Actor {
            username: username.into(),
            privileged: false,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
