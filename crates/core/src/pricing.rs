//! Decimal price arithmetic.
//!
//! All money is `rust_decimal::Decimal` in the store currency, two decimal
//! places. Order totals are computed from the unit prices captured when the
//! order was placed, never from the live catalog.

use rust_decimal::{Decimal, RoundingStrategy};

/// Maximum promotion discount, in percent.
pub const MAX_DISCOUNT_PERCENT: i32 = 90;

/// A priced line: unit price and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Unit price times quantity.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of all line totals.
#[must_use]
pub fn order_total<'a, I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = &'a PricedLine>,
{
    lines
        .into_iter()
        .map(|line| line_total(line.unit_price, line.quantity))
        .sum()
}

/// Price after a percentage discount, rounded half-up to cents.
///
/// ```
/// use rust_decimal::Decimal;
/// use discvault_core::pricing::discounted_price;
///
/// let price = Decimal::new(1999, 2); // 19.99
/// assert_eq!(discounted_price(price, 25), Decimal::new(1499, 2)); // 14.99
/// ```
#[must_use]
pub fn discounted_price(price: Decimal, percent: i32) -> Decimal {
    let percent = percent.clamp(0, 100);
    let factor = Decimal::from(100 - percent) / Decimal::ONE_HUNDRED;
    (price * factor).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether a discount percentage may be stored on a promotion.
#[must_use]
pub const fn is_valid_discount(percent: i32) -> bool {
    percent >= 1 && percent <= MAX_DISCOUNT_PERCENT
}

/// Largest catalog price; prices are stored as `NUMERIC(10, 2)`.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Whether a price is acceptable for a catalog product.
#[must_use]
pub fn is_valid_price(price: Decimal) -> bool {
    price >= Decimal::ZERO && price <= MAX_PRICE && price.scale() <= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn test_order_total_sums_lines() {
        let lines = [
            PricedLine {
                unit_price: dec(1999),
                quantity: 2,
            },
            PricedLine {
                unit_price: dec(450),
                quantity: 3,
            },
        ];
        // 39.98 + 13.50
        assert_eq!(order_total(&lines), dec(5348));
    }

    #[test]
    fn test_order_total_empty_is_zero() {
        assert_eq!(order_total(&Vec::<PricedLine>::new()), Decimal::ZERO);
    }

    #[test]
    fn test_discount_rounding() {
        assert_eq!(discounted_price(dec(999), 10), dec(899)); // 8.991
        assert_eq!(discounted_price(dec(1005), 50), dec(503)); // 5.025 -> 5.03
        assert_eq!(discounted_price(dec(2000), 0), dec(2000));
        assert_eq!(discounted_price(dec(2000), 150), Decimal::ZERO);
    }

    #[test]
    fn test_discount_validity() {
        assert!(!is_valid_discount(0));
        assert!(is_valid_discount(1));
        assert!(is_valid_discount(MAX_DISCOUNT_PERCENT));
        assert!(!is_valid_discount(MAX_DISCOUNT_PERCENT + 1));
    }

    #[test]
    fn test_price_validity() {
        assert!(is_valid_price(dec(0)));
        assert!(is_valid_price(dec(1999)));
        assert!(!is_valid_price(dec(-1)));
        assert!(!is_valid_price(Decimal::new(19_999, 3)));
    }

    #[test]
    fn test_price_fits_storage_column() {
        assert_eq!(MAX_PRICE, Decimal::new(9_999_999_999, 2));
        assert!(is_valid_price(MAX_PRICE));
        assert!(!is_valid_price(Decimal::new(100_000_000, 0)));
    }
}
