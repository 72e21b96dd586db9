//! Exact decimal prices and percentage discounts.
//!
//! The commerce API sends prices and sale percentages as JSON numbers. Both
//! are held as [`Decimal`] so cart arithmetic never accumulates float error,
//! and are written back as JSON numbers.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors from constructing a [`Price`] or [`SalePercent`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Prices cannot be negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
    /// Sale percentages must lie in 0..=100.
    #[error("sale percentage must be between 0 and 100, got {0}")]
    SaleOutOfRange(Decimal),
}

/// A non-negative amount in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest representable amount. Sums and products clamp here.
    pub const MAX: Self = Self(Decimal::MAX);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from a whole number of currency units.
    #[must_use]
    pub fn from_units(units: u32) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Apply a percentage discount.
    ///
    /// A zero discount returns the price unchanged; otherwise the result is
    /// `price × (1 − sale/100)`.
    #[must_use]
    pub fn discounted(self, sale: SalePercent) -> Self {
        if sale.is_zero() {
            return self;
        }
        Self(self.0 * (Decimal::ONE - sale.as_fraction()))
    }
}

/// Saturates at [`Price::MAX`].
impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

/// Saturates at [`Price::MAX`].
impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(quantity)))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Formats with thousands separators and at most two fractional digits,
/// e.g. `23,000` or `1,234.5`.
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.0.round_dp(2).normalize();
        let text = rounded.to_string();
        let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        if !frac.is_empty() {
            grouped.push('.');
            grouped.push_str(frac);
        }
        f.pad(&grouped)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = rust_decimal::serde::float::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

/// A percentage discount in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SalePercent(Decimal);

impl SalePercent {
    /// No discount.
    pub const NONE: Self = Self(Decimal::ZERO);

    /// Create a sale percentage.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::SaleOutOfRange` outside `0..=100`.
    pub fn new(percent: Decimal) -> Result<Self, PriceError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(PriceError::SaleOutOfRange(percent));
        }
        Ok(Self(percent))
    }

    /// Create a sale percentage from a whole number, clamped to 100.
    #[must_use]
    pub fn from_percent(percent: u8) -> Self {
        Self(Decimal::from(percent.min(100)))
    }

    /// The percentage value, e.g. `10` for 10%.
    #[must_use]
    pub const fn percent(&self) -> Decimal {
        self.0
    }

    /// Whether this is no discount at all.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    fn as_fraction(self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }
}

impl fmt::Display for SalePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

impl Serialize for SalePercent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for SalePercent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let percent = rust_decimal::serde::float::deserialize(deserializer)?;
        Self::new(percent).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sale_keeps_price() {
        let price = Price::from_units(12_900);
        assert_eq!(price.discounted(SalePercent::NONE), price);
    }

    #[test]
    fn test_sale_applies_percentage() {
        let price = Price::from_units(10_000);
        assert_eq!(
            price.discounted(SalePercent::from_percent(10)),
            Price::from_units(9_000)
        );
        assert_eq!(
            price.discounted(SalePercent::from_percent(100)),
            Price::ZERO
        );
    }

    #[test]
    fn test_fractional_sale() {
        let price = Price::from_units(1_000);
        let sale = SalePercent::new(Decimal::new(125, 1)).unwrap(); // 12.5%
        assert_eq!(price.discounted(sale).amount(), Decimal::from(875));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Price::new(Decimal::from(-1)).is_err());
        assert!(SalePercent::new(Decimal::from(101)).is_err());
        assert!(SalePercent::new(Decimal::from(-5)).is_err());
        assert_eq!(SalePercent::from_percent(150).percent(), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_sum_and_multiply() {
        let total: Price = [Price::from_units(9_000) * 2, Price::from_units(5_000) * 1]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_units(23_000));
    }

    #[test]
    fn test_arithmetic_saturates() {
        let huge: Price = serde_json::from_str("1e20").unwrap();
        assert_eq!(huge * 1_000_000_000, Price::MAX);
        assert_eq!(Price::MAX + Price::from_units(1), Price::MAX);
        let total: Price = [Price::MAX, Price::MAX].into_iter().sum();
        assert_eq!(total, Price::MAX);
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Price::from_units(23_000).to_string(), "23,000");
        assert_eq!(Price::from_units(999).to_string(), "999");
        assert_eq!(Price::from_units(1_234_567).to_string(), "1,234,567");
        assert_eq!(Price::new(Decimal::new(12_345, 1)).unwrap().to_string(), "1,234.5");
        assert_eq!(SalePercent::from_percent(15).to_string(), "15%");
    }

    #[test]
    fn test_json_numbers() {
        let price: Price = serde_json::from_str("15000").unwrap();
        assert_eq!(price, Price::from_units(15_000));
        let sale: SalePercent = serde_json::from_str("12.5").unwrap();
        assert_eq!(sale.percent(), Decimal::new(125, 1));

        assert!(serde_json::from_str::<Price>("-3").is_err());
        assert!(serde_json::from_str::<SalePercent>("120").is_err());
    }
}
