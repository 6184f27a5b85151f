use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use super::fare::round_currency;
use crate::entities::ScheduledFareQuote;
use crate::error::{invalid_distance_error, Error};
use crate::tariff::ScheduledTariff;

/// Suggested price for a pre-booked ride, from distance alone. Requesters may
/// override the suggestion with a fare of their own.
#[tracing::instrument(skip(tariff))]
pub fn estimate_scheduled_fare(
    tariff: &ScheduledTariff,
    distance_km: f64,
) -> Result<ScheduledFareQuote, Error> {
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return Err(invalid_distance_error());
    }

    let distance = Decimal::from_f64(distance_km).ok_or_else(|| invalid_distance_error())?;

    let tier = tariff.tier(distance);
    let rate_per_km = tariff.rate_for(tier);
    let total_amount = round_currency((distance * rate_per_km).max(tariff.minimum_fare));

    Ok(ScheduledFareQuote {
        rate_per_km,
        minimum_fare: tariff.minimum_fare,
        total_amount,
        tier,
    })
}

#[test]
fn short_tier_example() {
    use crate::tariff::ScheduledTier;
    use rust_decimal_macros::dec;

    let quote = estimate_scheduled_fare(&ScheduledTariff::default(), 30.0).unwrap();

    assert_eq!(quote.tier, ScheduledTier::Short);
    assert_eq!(quote.rate_per_km, dec!(2.78));
    assert_eq!(quote.total_amount, dec!(83.40));
}

#[test]
fn long_tier_example() {
    use crate::tariff::ScheduledTier;
    use rust_decimal_macros::dec;

    let quote = estimate_scheduled_fare(&ScheduledTariff::default(), 80.0).unwrap();

    assert_eq!(quote.tier, ScheduledTier::Long);
    assert_eq!(quote.rate_per_km, dec!(1.98));
    assert_eq!(quote.total_amount, dec!(158.40));
}

#[test]
fn fifty_km_is_still_short() {
    use crate::tariff::ScheduledTier;
    use rust_decimal_macros::dec;

    let quote = estimate_scheduled_fare(&ScheduledTariff::default(), 50.0).unwrap();

    assert_eq!(quote.tier, ScheduledTier::Short);
    assert_eq!(quote.total_amount, dec!(139.00));
}

#[test]
fn short_trips_pay_the_minimum() {
    use rust_decimal_macros::dec;

    let quote = estimate_scheduled_fare(&ScheduledTariff::default(), 2.0).unwrap();

    assert_eq!(quote.minimum_fare, dec!(15.00));
    assert_eq!(quote.total_amount, dec!(15.00));
}

#[test]
fn rejects_invalid_distance() {
    let tariff = ScheduledTariff::default();

    for distance in [0.0, -3.0, f64::NAN, f64::INFINITY] {
        let err = estimate_scheduled_fare(&tariff, distance).unwrap_err();
        assert!(err.is_validation_error());
    }
}
