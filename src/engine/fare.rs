use chrono::{Local, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::entities::{RideQuote, RideQuoteRequest};
use crate::tariff::TariffTable;

/// Rounds to cents, half away from zero.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Longest distance the calculator prices; longer trips are priced at this distance.
pub const MAX_DISTANCE_KM: f64 = 1_000_000.0;

/// Longest duration the calculator prices; longer trips are priced at this duration.
pub const MAX_DURATION_MIN: f64 = 1_000_000.0;

/// Negative and non-finite measurements count as zero, values above `max` count as `max`.
fn measurement(value: f64, max: f64) -> Decimal {
    if !value.is_finite() || value <= 0.0 {
        return Decimal::ZERO;
    }

    Decimal::from_f64(value.min(max)).unwrap_or(Decimal::ZERO)
}

/// Prices a ride. Deterministic for a given request; when `request.at` is absent the
/// current local time is used. Unknown categories are priced as the fallback category.
#[tracing::instrument(skip(tariffs))]
pub fn quote_ride(tariffs: &TariffTable, request: &RideQuoteRequest) -> RideQuote {
    let at = request.at.unwrap_or_else(|| Local::now().naive_local());

    quote_ride_at(tariffs, request, &at)
}

pub fn quote_ride_at(
    tariffs: &TariffTable,
    request: &RideQuoteRequest,
    at: &NaiveDateTime,
) -> RideQuote {
    let category = tariffs.category(&request.category);

    // Saturates at `Decimal::MAX`.
    let mut amount = category
        .rate_per_km
        .saturating_mul(measurement(request.distance_km, MAX_DISTANCE_KM))
        .saturating_add(
            tariffs
                .per_minute_rate
                .saturating_mul(measurement(request.duration_min, MAX_DURATION_MIN)),
        )
        .saturating_add(tariffs.per_stop_fee.saturating_mul(Decimal::from(request.stops)));

    let peak = tariffs.is_peak(at);
    if peak {
        amount = amount.saturating_mul(category.peak_multiplier);
    }

    let night = tariffs.is_night(at);
    if night {
        amount = amount.saturating_mul(tariffs.night_multiplier);
    }

    let minimum_applied = amount < category.minimum_fare;
    if minimum_applied {
        amount = category.minimum_fare;
    }

    RideQuote {
        category: category.name.clone(),
        price: round_currency(amount),
        peak,
        night,
        minimum_applied,
    }
}

#[cfg(test)]
fn request(category: &str, distance_km: f64, duration_min: f64, stops: u32, at: &str) -> RideQuoteRequest {
    RideQuoteRequest {
        category: category.into(),
        distance_km,
        duration_min,
        stops,
        at: Some(NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M").unwrap()),
    }
}

#[test]
fn peak_window_applies_category_multiplier() {
    use rust_decimal_macros::dec;

    // 2024-01-02 is a Tuesday
    let quote = quote_ride(
        &TariffTable::default(),
        &request("FlashHatch", 10.0, 20.0, 0, "2024-01-02 08:00"),
    );

    assert_eq!(quote.price, dec!(36.00));
    assert!(quote.peak);
    assert!(!quote.night);
    assert!(!quote.minimum_applied);
}

#[test]
fn night_window_applies_night_multiplier() {
    use rust_decimal_macros::dec;

    let quote = quote_ride(
        &TariffTable::default(),
        &request("FlashHatch", 10.0, 20.0, 0, "2024-01-02 23:00"),
    );

    assert_eq!(quote.price, dec!(34.50));
    assert!(!quote.peak);
    assert!(quote.night);
}

#[test]
fn off_peak_weekend_uses_base_amount() {
    use rust_decimal_macros::dec;

    // Saturday morning rush hour is not peak
    let quote = quote_ride(
        &TariffTable::default(),
        &request("FlashHatch", 10.0, 20.0, 2, "2024-01-06 08:00"),
    );

    assert_eq!(quote.price, dec!(34.00));
    assert!(!quote.peak);
}

#[test]
fn peak_and_night_compound() {
    use rust_decimal_macros::dec;

    let mut tariffs = TariffTable::default();
    tariffs.peak_windows.push(crate::tariff::HourWindow::new(22, 24));

    let quote = quote_ride(&tariffs, &request("FlashHatch", 10.0, 20.0, 0, "2024-01-02 23:00"));

    // 30 * 1.2 * 1.15
    assert_eq!(quote.price, dec!(41.40));
    assert!(quote.peak && quote.night);
}

#[test]
fn short_rides_clamp_to_category_minimum() {
    use rust_decimal_macros::dec;

    let tariffs = TariffTable::default();
    let quote = quote_ride(&tariffs, &request("FlashPremium", 0.5, 1.0, 0, "2024-01-02 12:00"));

    assert_eq!(quote.price, dec!(12.00));
    assert!(quote.minimum_applied);

    let zero = quote_ride(&tariffs, &request("FlashHatch", 0.0, 0.0, 0, "2024-01-02 12:00"));
    assert_eq!(zero.price, dec!(5.50));
}

#[test]
fn unknown_category_prices_as_fallback() {
    let tariffs = TariffTable::default();

    let unknown = quote_ride(&tariffs, &request("Helicopter", 7.3, 14.0, 1, "2024-01-03 18:15"));
    let hatch = quote_ride(&tariffs, &request("FlashHatch", 7.3, 14.0, 1, "2024-01-03 18:15"));

    assert_eq!(unknown.category, "FlashHatch");
    assert_eq!(unknown.price, hatch.price);
}

#[test]
fn invalid_measurements_count_as_zero() {
    let tariffs = TariffTable::default();

    let quote = quote_ride(
        &tariffs,
        &request("FlashSedan", f64::NAN, -12.0, 0, "2024-01-02 12:00"),
    );

    assert_eq!(quote.price, tariffs.category("FlashSedan").minimum_fare);
}

#[test]
fn oversized_distances_price_at_the_distance_cap() {
    use rust_decimal_macros::dec;

    let tariffs = TariffTable::default();
    let capped = quote_ride(
        &tariffs,
        &request("FlashHatch", MAX_DISTANCE_KM, 0.0, 0, "2024-01-02 12:00"),
    );

    for distance_km in [5.0e28, 1.0e300, f64::MAX] {
        let quote = quote_ride(
            &tariffs,
            &request("FlashHatch", distance_km, 0.0, 0, "2024-01-02 12:00"),
        );

        assert_eq!(quote.price, capped.price);
        assert!(!quote.minimum_applied);
    }

    assert_eq!(capped.price, dec!(2000000.00));
}

#[test]
fn oversized_durations_and_stops_do_not_overflow() {
    use rust_decimal_macros::dec;

    let tariffs = TariffTable::default();
    let quote = quote_ride(
        &tariffs,
        &request("FlashPremium", 5.0e28, 1.0e300, u32::MAX, "2024-01-02 23:00"),
    );

    // (3.80 * 1e6 + 0.50 * 1e6 + 2.00 * u32::MAX) * 1.15
    assert_eq!(quote.price, dec!(14823424778.50));
    assert!(quote.night);
}

#[test]
fn oversized_tariff_rates_saturate() {
    let mut tariffs = TariffTable::default();
    tariffs.categories[0].rate_per_km = Decimal::MAX;

    let quote = quote_ride(
        &tariffs,
        &request("FlashHatch", 10.0, 0.0, 0, "2024-01-02 08:00"),
    );

    assert_eq!(quote.price, Decimal::MAX);
    assert!(quote.peak);
}

#[test]
fn rounds_half_up_to_cents() {
    use rust_decimal_macros::dec;

    assert_eq!(round_currency(dec!(10.005)), dec!(10.01));
    assert_eq!(round_currency(dec!(10.004)), dec!(10.00));
    assert_eq!(round_currency(dec!(0.125)), dec!(0.13));
}

#[test]
fn price_never_below_minimum_and_is_deterministic() {
    let tariffs = TariffTable::default();
    let categories = ["FlashHatch", "FlashSedan", "FlashSUV", "FlashPremium", "bogus"];
    let times = [
        "2024-01-01 00:30",
        "2024-01-02 07:00",
        "2024-01-03 12:00",
        "2024-01-04 19:59",
        "2024-01-05 22:10",
        "2024-01-07 08:00",
    ];

    for category in categories {
        let minimum = tariffs.category(category).minimum_fare;

        for at in times {
            for distance in [0.0, 0.4, 1.0, 3.7, 12.25, 48.0] {
                for duration in [0.0, 3.0, 17.5, 60.0] {
                    for stops in 0..3 {
                        let req = request(category, distance, duration, stops, at);
                        let first = quote_ride(&tariffs, &req);
                        let second = quote_ride(&tariffs, &req);

                        assert!(first.price >= minimum);
                        assert_eq!(first, second);
                    }
                }
            }
        }
    }
}
