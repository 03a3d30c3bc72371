//! Cell address parsing and the canonical iteration order.
//!
//! Every category file is written in ascending address order, and the
//! comparison engine sorts its deltas the same way, so this module defines
//! the one ordering the rest of the crate relies on.

use std::cmp::Ordering;

/// Sort key for a cell address.
///
/// Parsed addresses order row-major (top-to-bottom, left-to-right), so
/// `A1 < B1 < A2`. Addresses that fail to parse are kept in a separate
/// bucket that orders *after* every parsed address (ties broken by the raw
/// string) rather than being silently folded into position one; extraction
/// records a warning when it encounters one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressKey {
    /// 1-based (row, col).
    Cell { row: u32, col: u32 },
    /// The address could not be parsed; carries the raw input.
    Unparsable(String),
}

impl AddressKey {
    /// Compute the sort key for an A1-style address.
    ///
    /// A `Sheet!` prefix and `$` absolute-reference markers are stripped
    /// before parsing.
    pub fn from_address(address: &str) -> AddressKey {
        match parse_a1(address) {
            Some((row, col)) => AddressKey::Cell { row, col },
            None => AddressKey::Unparsable(address.to_string()),
        }
    }

    pub fn is_unparsable(&self) -> bool {
        matches!(self, AddressKey::Unparsable(_))
    }

    fn rank(&self, column_major: bool) -> (u8, u32, u32, &str) {
        match self {
            AddressKey::Cell { row, col } => {
                if column_major {
                    (0, *col, *row, "")
                } else {
                    (0, *row, *col, "")
                }
            }
            AddressKey::Unparsable(raw) => (1, 0, 0, raw.as_str()),
        }
    }

    /// Column-major comparison, used for the alternate formula file
    /// ordering. Unparsable addresses still sort last.
    pub fn cmp_column_major(&self, other: &AddressKey) -> Ordering {
        self.rank(true).cmp(&other.rank(true))
    }
}

impl Ord for AddressKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank(false).cmp(&other.rank(false))
    }
}

impl PartialOrd for AddressKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parse an A1-style address into 1-based (row, col).
///
/// Accepts `$A$1` and `Sheet1!B2` forms; returns `None` for anything that
/// is not letters-then-digits after stripping those decorations.
pub fn parse_a1(address: &str) -> Option<(u32, u32)> {
    let bare = address.rsplit('!').next().unwrap_or(address);
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    let mut saw_letter = false;
    let mut saw_digit = false;

    for ch in bare.chars() {
        if ch == '$' {
            // Absolute markers are ignored for ordering purposes.
            continue;
        }
        if ch.is_ascii_alphabetic() {
            if saw_digit {
                // Letters after digits are not a cell address.
                return None;
            }
            saw_letter = true;
            let upper = ch.to_ascii_uppercase() as u8;
            col = col
                .checked_mul(26)?
                .checked_add((upper - b'A' + 1) as u32)?;
        } else if ch.is_ascii_digit() {
            saw_digit = true;
            row = row.checked_mul(10)?.checked_add((ch as u8 - b'0') as u32)?;
        } else {
            return None;
        }
    }

    if !saw_letter || !saw_digit || row == 0 || col == 0 {
        return None;
    }

    Some((row, col))
}

/// Convert a 1-based column number to its letter label (`1` → `A`, `27` → `AA`).
pub fn column_label(col: u32) -> String {
    debug_assert!(col >= 1, "column numbers are 1-based");
    let mut n = col;
    let mut label = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        label.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

/// Format 1-based (row, col) as an A1 address.
pub fn format_a1(row: u32, col: u32) -> String {
    format!("{}{}", column_label(col), row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_a1_examples() {
        assert_eq!(parse_a1("A1"), Some((1, 1)));
        assert_eq!(parse_a1("Z1"), Some((1, 26)));
        assert_eq!(parse_a1("AA1"), Some((1, 27)));
        assert_eq!(parse_a1("B10"), Some((10, 2)));
        assert_eq!(parse_a1("AAA100"), Some((100, 703)));
    }

    #[test]
    fn parse_a1_strips_decorations() {
        assert_eq!(parse_a1("$A$1"), Some((1, 1)));
        assert_eq!(parse_a1("Sheet1!B2"), Some((2, 2)));
        assert_eq!(parse_a1("My Sheet!$C$3"), Some((3, 3)));
    }

    #[test]
    fn parse_a1_rejects_malformed() {
        for bad in ["", "1A", "A0", "A", "42", "A-1", "A1A", "A 1"] {
            assert_eq!(parse_a1(bad), None, "{bad} should not parse");
        }
    }

    #[test]
    fn column_labels_round_trip() {
        for (label, n) in [("A", 1), ("Z", 26), ("AA", 27), ("AZ", 52), ("BA", 53), ("ZZ", 702)] {
            assert_eq!(column_label(n), label);
            assert_eq!(parse_a1(&format!("{label}1")), Some((1, n)));
        }
        assert_eq!(format_a1(10, 28), "AB10");
    }

    #[test]
    fn row_major_reading_order() {
        let mut keys: Vec<AddressKey> = ["A2", "B1", "A1", "C1"]
            .iter()
            .map(|a| AddressKey::from_address(a))
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                AddressKey::Cell { row: 1, col: 1 },
                AddressKey::Cell { row: 1, col: 2 },
                AddressKey::Cell { row: 1, col: 3 },
                AddressKey::Cell { row: 2, col: 1 },
            ]
        );
    }

    #[test]
    fn column_major_order_for_formula_review() {
        let a2 = AddressKey::from_address("A2");
        let b1 = AddressKey::from_address("B1");
        assert_eq!(a2.cmp_column_major(&b1), Ordering::Less);
        assert_eq!(b1.cmp(&a2), Ordering::Less);
    }

    #[test]
    fn unparsable_addresses_sort_last() {
        let mut keys = vec![
            AddressKey::from_address("???"),
            AddressKey::from_address("ZZ999"),
            AddressKey::from_address("!!!"),
            AddressKey::from_address("A1"),
        ];
        keys.sort();
        assert_eq!(keys[0], AddressKey::Cell { row: 1, col: 1 });
        assert_eq!(keys[1], AddressKey::Cell { row: 999, col: 702 });
        assert!(keys[2].is_unparsable());
        assert!(keys[3].is_unparsable());
        // Tie-break on the raw string keeps the bucket itself deterministic.
        assert_eq!(keys[2], AddressKey::Unparsable("!!!".into()));
    }
}
