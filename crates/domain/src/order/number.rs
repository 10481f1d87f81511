//! Human-readable, date-scoped order numbers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A unique order number in the form `PED-YYYYMMDD-####`.
///
/// The numeric suffix is a per-calendar-day sequence starting at `0001`.
/// Allocation of the sequence value is the store's job (it must be an
/// atomic increment-and-read); this type only deals with formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Builds an order number from a date and that day's sequence value.
    pub fn new(date: NaiveDate, sequence: u32) -> Self {
        Self(format!("PED-{}-{:04}", date.format("%Y%m%d"), sequence))
    }

    /// Returns the order number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format() {
        let number = OrderNumber::new(date(2025, 10, 24), 1);
        assert_eq!(number.as_str(), "PED-20251024-0001");
    }

    #[test]
    fn test_zero_padding() {
        assert_eq!(
            OrderNumber::new(date(2025, 1, 2), 42).as_str(),
            "PED-20250102-0042"
        );
        assert_eq!(
            OrderNumber::new(date(2025, 1, 2), 9999).as_str(),
            "PED-20250102-9999"
        );
    }

    #[test]
    fn test_sequence_past_four_digits_still_unique() {
        let number = OrderNumber::new(date(2025, 1, 2), 10000);
        assert_eq!(number.as_str(), "PED-20250102-10000");
    }

    #[test]
    fn test_same_day_sequences_differ() {
        let d = date(2025, 6, 1);
        assert_ne!(OrderNumber::new(d, 1), OrderNumber::new(d, 2));
    }
}
