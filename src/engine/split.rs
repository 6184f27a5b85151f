use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::fare::round_currency;
use crate::entities::Settlement;
use crate::error::{invalid_amount_error, Error};

/// Share of every finished ride kept by the platform.
pub const PLATFORM_SHARE: Decimal = dec!(0.20);

/// Largest amount a payment row holds.
pub const MAX_AMOUNT: Decimal = dec!(9999999999.99);

/// Accepts positive amounts in whole cents up to `MAX_AMOUNT`. The returned value
/// carries at most two decimal places.
pub fn checked_amount(amount: Decimal) -> Result<Decimal, Error> {
    if amount <= Decimal::ZERO || amount > MAX_AMOUNT {
        return Err(invalid_amount_error());
    }

    let cents = round_currency(amount);
    if cents != amount {
        return Err(invalid_amount_error());
    }

    Ok(cents)
}

/// Converts a client-supplied amount, rounding to cents and rejecting non-finite and
/// non-positive values.
pub fn amount_from_f64(amount: f64) -> Result<Decimal, Error> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(invalid_amount_error());
    }

    let amount = Decimal::from_f64(amount).ok_or_else(|| invalid_amount_error())?;

    checked_amount(round_currency(amount))
}

/// Splits a finished ride's amount between driver and platform. The platform share
/// is rounded to cents and the driver receives the remainder, so the two always sum
/// to `final_amount`.
pub fn split(final_amount: Decimal) -> Result<Settlement, Error> {
    let final_amount = checked_amount(final_amount)?;

    let platform_amount = round_currency(final_amount * PLATFORM_SHARE);
    let driver_amount = final_amount - platform_amount;

    Ok(Settlement {
        driver_amount,
        platform_amount,
    })
}

#[test]
fn splits_eighty_twenty() {
    let settlement = split(dec!(36.00)).unwrap();

    assert_eq!(settlement.platform_amount, dec!(7.20));
    assert_eq!(settlement.driver_amount, dec!(28.80));
}

#[test]
fn odd_cents_go_to_the_driver() {
    // 0.2 * 10.03 = 2.006 -> 2.01
    let settlement = split(dec!(10.03)).unwrap();

    assert_eq!(settlement.platform_amount, dec!(2.01));
    assert_eq!(settlement.driver_amount, dec!(8.02));
}

#[test]
fn shares_always_sum_to_total() {
    let one_cent = dec!(0.01);

    for cents in 1..=20_000i64 {
        let total = Decimal::new(cents, 2);
        let settlement = split(total).unwrap();

        assert_eq!(settlement.driver_amount + settlement.platform_amount, total);
        assert!((settlement.platform_amount - total * PLATFORM_SHARE).abs() <= one_cent);
        assert!(settlement.driver_amount >= Decimal::ZERO);
    }
}

#[test]
fn rejects_non_positive_amounts() {
    assert!(split(Decimal::ZERO).unwrap_err().is_validation_error());
    assert!(split(dec!(-5)).unwrap_err().is_validation_error());
}

#[test]
fn rejects_fractions_of_a_cent() {
    assert!(split(dec!(10.005)).unwrap_err().is_validation_error());
    assert!(split(dec!(0.001)).unwrap_err().is_validation_error());
    assert!(checked_amount(dec!(10.005)).is_err());

    let settlement = split(dec!(10.000)).unwrap();
    assert_eq!(settlement.platform_amount, dec!(2.00));
    assert_eq!(settlement.driver_amount, dec!(8.00));
    assert!(settlement.driver_amount.scale() <= 2);

    assert_eq!(checked_amount(dec!(36.000)).unwrap(), dec!(36.00));
    assert_eq!(checked_amount(dec!(36.000)).unwrap().scale(), 2);
}

#[test]
fn rejects_amounts_above_the_payment_limit() {
    assert!(checked_amount(MAX_AMOUNT).is_ok());
    assert!(split(MAX_AMOUNT).is_ok());
    assert!(split(MAX_AMOUNT + dec!(0.01)).unwrap_err().is_validation_error());
    assert!(split(Decimal::MAX).unwrap_err().is_validation_error());
}

#[test]
fn amount_intake_rejects_non_finite() {
    assert!(amount_from_f64(f64::NAN).is_err());
    assert!(amount_from_f64(f64::INFINITY).is_err());
    assert!(amount_from_f64(0.0).is_err());
    assert!(amount_from_f64(-1.5).is_err());
    assert!(amount_from_f64(0.001).is_err());
    assert_eq!(amount_from_f64(36.0).unwrap(), dec!(36.00));
    assert_eq!(amount_from_f64(12.5).unwrap(), dec!(12.50));
    assert_eq!(amount_from_f64(10.004).unwrap(), dec!(10.00));
    assert!(amount_from_f64(1.0e12).is_err());
}
