//! Return reconciliation for a completed loan.
//!
//! The operator records how much of each supply line came back; whatever is
//! left over is reported to the backend as not returned.
//!
//! **Rules:**
//! - Returned quantities always stay within `0..=total_loaned`
//! - Out-of-range or non-numeric input is clamped, never rejected
//! - Lines with nothing outstanding are left out of the result

use std::collections::HashMap;

use tracing::debug;

use crate::models::{NotReturned, SupplyLine};

/// Parse operator input the way a numeric text field does: optional sign and
/// a leading run of digits, anything after is ignored. Input with no leading
/// digits is 0. Overflow saturates.
pub fn parse_quantity(raw: &str) -> i64 {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    let mut seen_digit = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(10) else {
            break;
        };
        seen_digit = true;
        value = value.saturating_mul(10).saturating_add(d as i64);
    }

    if !seen_digit {
        return 0;
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Returned-quantity map for one open reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnCalculator {
    lines: Vec<SupplyLine>,
    returned: HashMap<i64, i64>,
}

impl ReturnCalculator {
    /// Start with every line fully returned. Lines repeating a supply id are
    /// merged into the first one, with their totals summed.
    pub fn new(lines: Vec<SupplyLine>) -> Self {
        let mut merged: Vec<SupplyLine> = Vec::with_capacity(lines.len());
        for line in lines {
            match merged.iter_mut().find(|l| l.supply_id == line.supply_id) {
                Some(existing) => {
                    debug!(supply_id = line.supply_id, "merging duplicate supply line");
                    existing.total_loaned = existing
                        .total_loaned
                        .max(0)
                        .saturating_add(line.total_loaned.max(0));
                }
                None => merged.push(line),
            }
        }
        let lines = merged;

        let returned = lines
            .iter()
            .map(|line| (line.supply_id, line.total_loaned.max(0)))
            .collect();
        Self { lines, returned }
    }

    pub fn lines(&self) -> &[SupplyLine] {
        &self.lines
    }

    pub fn returned_map(&self) -> &HashMap<i64, i64> {
        &self.returned
    }

    /// Loaned total for a supply; unknown supplies have nothing to return.
    pub fn loaned(&self, supply_id: i64) -> i64 {
        self.lines
            .iter()
            .find(|line| line.supply_id == supply_id)
            .map(|line| line.total_loaned.max(0))
            .unwrap_or(0)
    }

    pub fn returned(&self, supply_id: i64) -> i64 {
        self.returned.get(&supply_id).copied().unwrap_or(0)
    }

    /// Outstanding quantity for one line, for live display next to the input.
    pub fn outstanding(&self, supply_id: i64) -> i64 {
        self.loaned(supply_id) - self.returned(supply_id)
    }

    /// Record raw operator input for a supply. Returns the stored value.
    pub fn set_returned(&mut self, supply_id: i64, raw: &str) -> i64 {
        self.set_returned_quantity(supply_id, parse_quantity(raw))
    }

    /// Record an already-parsed quantity, clamped to `0..=loaned`.
    pub fn set_returned_quantity(&mut self, supply_id: i64, quantity: i64) -> i64 {
        let max = self.loaned(supply_id);
        let stored = quantity.clamp(0, max);
        if stored != quantity {
            debug!(supply_id, requested = quantity, stored, "returned quantity clamped");
        }
        self.returned.insert(supply_id, stored);
        stored
    }

    /// Not-returned remainder per line, in supply-line order.
    pub fn compute_not_returned(&self) -> Vec<NotReturned> {
        self.lines
            .iter()
            .map(|line| NotReturned {
                supply_id: line.supply_id,
                quantity: line.total_loaned - self.returned(line.supply_id),
            })
            .filter(|item| item.quantity > 0)
            .collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.returned.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, name: &str, total: i64) -> SupplyLine {
        SupplyLine {
            supply_id: id,
            name: name.to_string(),
            unit: Some("u".to_string()),
            total_loaned: total,
            per_group: None,
        }
    }

    fn calculator() -> ReturnCalculator {
        ReturnCalculator::new(vec![line(1, "Pipetas", 10), line(2, "Matraces", 5)])
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("7"), 7);
        assert_eq!(parse_quantity("  12 "), 12);
        assert_eq!(parse_quantity("-5"), -5);
        assert_eq!(parse_quantity("3.9"), 3);
        assert_eq!(parse_quantity("8abc"), 8);
        assert_eq!(parse_quantity("abc"), 0);
        assert_eq!(parse_quantity(""), 0);
        assert_eq!(parse_quantity("-"), 0);
        assert_eq!(parse_quantity("99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_new_session_starts_fully_returned() {
        let calc = calculator();
        assert_eq!(calc.returned(1), 10);
        assert_eq!(calc.returned(2), 5);
        assert!(calc.compute_not_returned().is_empty());
    }

    #[test]
    fn test_duplicate_supply_lines_are_merged() {
        let mut calc = ReturnCalculator::new(vec![
            line(1, "Pipetas", 4),
            line(2, "Matraces", 5),
            line(1, "Pipetas", 6),
        ]);
        assert_eq!(calc.lines().len(), 2);
        assert_eq!(calc.loaned(1), 10);
        assert_eq!(calc.returned(1), 10);
        assert!(calc.compute_not_returned().is_empty());

        calc.set_returned(1, "7");
        assert_eq!(
            calc.compute_not_returned(),
            vec![NotReturned {
                supply_id: 1,
                quantity: 3
            }]
        );
    }

    #[test]
    fn test_set_returned_clamps() {
        let mut calc = calculator();
        assert_eq!(calc.set_returned(1, "-5"), 0);
        assert_eq!(calc.set_returned(1, "110"), 10);
        assert_eq!(calc.set_returned(1, "abc"), 0);
        assert_eq!(calc.set_returned(2, "4"), 4);
        assert_eq!(calc.outstanding(2), 1);
    }

    #[test]
    fn test_unknown_supply_clamps_to_zero() {
        let mut calc = calculator();
        assert_eq!(calc.set_returned(99, "3"), 0);
        assert_eq!(calc.compute_not_returned().len(), 0);
    }

    #[test]
    fn test_partial_return_scenario() {
        let mut calc = calculator();
        calc.set_returned(1, "7");
        calc.set_returned(2, "5");
        assert_eq!(
            calc.compute_not_returned(),
            vec![NotReturned {
                supply_id: 1,
                quantity: 3
            }]
        );
    }

    #[test]
    fn test_compute_not_returned_is_idempotent() {
        let mut calc = calculator();
        calc.set_returned(1, "2");
        calc.set_returned(2, "0");
        let first = calc.compute_not_returned();
        let second = calc.compute_not_returned();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].quantity, 5);
    }

    #[test]
    fn test_bounds_hold_after_any_sequence() {
        let mut calc = calculator();
        let inputs = ["4", "-1", "1000", "x", "10", "5", "-99999", "6.5", " 3"];
        for (i, raw) in inputs.iter().enumerate() {
            let id = if i % 2 == 0 { 1 } else { 2 };
            calc.set_returned(id, raw);
            for l in calc.lines() {
                let r = calc.returned(l.supply_id);
                assert!(0 <= r && r <= l.total_loaned, "{} out of range: {r}", l.name);
            }
        }
        assert!(calc.compute_not_returned().iter().all(|n| n.quantity > 0));
    }
}
