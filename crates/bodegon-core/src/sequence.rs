//! # Document Sequences
//!
//! Order identifiers are allocated from four named sequences, one per sale
//! kind, seeded at non-overlapping bases:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  contado            000 000 001 .. 199 999 999                      │
//! │  credito            200 000 001 .. 399 999 999                      │
//! │  apartado           400 000 001 .. 599 999 999                      │
//! │  despacho_especial  600 000 001 .. 799 999 999                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because the ranges never overlap, the 9-digit zero-padded number on a
//! paper receipt is self-describing: no lookup is needed to know what kind
//! of document it is. Allocation happens inside the document's own
//! transaction, so committed ids are monotonic and gapless per sequence.

use crate::types::OrderKind;

/// Width of each sequence's id range.
pub const SEQUENCE_RANGE: i64 = 200_000_000;

/// Digits in the external display form.
pub const DISPLAY_WIDTH: usize = 9;

impl OrderKind {
    /// The database sequence this kind allocates from.
    pub const fn sequence_name(&self) -> &'static str {
        match self {
            OrderKind::Regular => "ventas_contado",
            OrderKind::Credit => "ventas_credito",
            OrderKind::Reservation => "ventas_apartado",
            OrderKind::SpecialDispatch => "ventas_despacho",
        }
    }

    /// First value of the kind's id range minus one (sequences are seeded
    /// with this value; the first allocated id is `base + 1`).
    pub const fn sequence_base(&self) -> i64 {
        match self {
            OrderKind::Regular => 0,
            OrderKind::Credit => SEQUENCE_RANGE,
            OrderKind::Reservation => 2 * SEQUENCE_RANGE,
            OrderKind::SpecialDispatch => 3 * SEQUENCE_RANGE,
        }
    }
}

/// External representation of an order id: zero-padded to 9 digits.
pub fn display_id(id: i64) -> String {
    format!("{:0width$}", id, width = DISPLAY_WIDTH)
}

/// Recovers the sale kind from a bare order id using the range bases.
/// Returns `None` for ids outside every range.
pub fn kind_for_id(id: i64) -> Option<OrderKind> {
    if id <= 0 {
        return None;
    }
    match (id - 1) / SEQUENCE_RANGE {
        0 => Some(OrderKind::Regular),
        1 => Some(OrderKind::Credit),
        2 => Some(OrderKind::Reservation),
        3 => Some(OrderKind::SpecialDispatch),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_id_is_nine_digits() {
        assert_eq!(display_id(1), "000000001");
        assert_eq!(display_id(200_000_001), "200000001");
        assert_eq!(display_id(600_000_042), "600000042");
    }

    #[test]
    fn test_bases_do_not_overlap() {
        let kinds = [
            OrderKind::Regular,
            OrderKind::Credit,
            OrderKind::Reservation,
            OrderKind::SpecialDispatch,
        ];
        for window in kinds.windows(2) {
            assert!(window[0].sequence_base() + SEQUENCE_RANGE <= window[1].sequence_base() + 1);
        }
    }

    #[test]
    fn test_kind_round_trips_through_id() {
        for kind in [
            OrderKind::Regular,
            OrderKind::Credit,
            OrderKind::Reservation,
            OrderKind::SpecialDispatch,
        ] {
            let first = kind.sequence_base() + 1;
            let last = kind.sequence_base() + SEQUENCE_RANGE;
            assert_eq!(kind_for_id(first), Some(kind));
            assert_eq!(kind_for_id(last), Some(kind));
        }
        assert_eq!(kind_for_id(0), None);
        assert_eq!(kind_for_id(-3), None);
        assert_eq!(kind_for_id(4 * SEQUENCE_RANGE + 1), None);
    }
}
