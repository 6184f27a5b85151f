//! Pricing constants for ride quotes and scheduled-ride estimates.
//!
//! A [`TariffTable`] is an explicit value handed to the engine; nothing in the crate
//! reads pricing from global state.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryTariff {
    pub name: String,
    pub rate_per_km: Decimal,
    pub minimum_fare: Decimal,
    pub peak_multiplier: Decimal,
}

/// Half-open hour range `[start_hour, end_hour)`. Wraps midnight when
/// `start_hour > end_hour`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl HourWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledTier {
    Short,
    Long,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTariff {
    /// Distances up to and including this bound use the short rate.
    pub short_tier_max_km: Decimal,
    pub short_rate_per_km: Decimal,
    pub long_rate_per_km: Decimal,
    pub minimum_fare: Decimal,
}

impl ScheduledTariff {
    pub fn tier(&self, distance_km: Decimal) -> ScheduledTier {
        if distance_km <= self.short_tier_max_km {
            ScheduledTier::Short
        } else {
            ScheduledTier::Long
        }
    }

    pub fn rate_for(&self, tier: ScheduledTier) -> Decimal {
        match tier {
            ScheduledTier::Short => self.short_rate_per_km,
            ScheduledTier::Long => self.long_rate_per_km,
        }
    }
}

impl Default for ScheduledTariff {
    fn default() -> Self {
        Self {
            short_tier_max_km: dec!(50),
            short_rate_per_km: dec!(2.78),
            long_rate_per_km: dec!(1.98),
            minimum_fare: dec!(15.00),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TariffTable {
    /// The first entry is the fallback for unknown categories and must be the cheapest.
    pub categories: Vec<CategoryTariff>,
    pub per_minute_rate: Decimal,
    pub per_stop_fee: Decimal,
    pub night_multiplier: Decimal,
    pub peak_windows: Vec<HourWindow>,
    pub night_window: HourWindow,
    pub scheduled: ScheduledTariff,
}

impl TariffTable {
    /// Looks a category up by name, ignoring case. Unknown names resolve to the
    /// fallback category instead of failing.
    pub fn category(&self, name: &str) -> &CategoryTariff {
        let name = name.trim();

        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .unwrap_or_else(|| self.fallback_category())
    }

    pub fn is_known_category(&self, name: &str) -> bool {
        let name = name.trim();
        self.categories
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn fallback_category(&self) -> &CategoryTariff {
        &self.categories[0]
    }

    /// Weekday rush hours, in the caller's local wall-clock time.
    pub fn is_peak(&self, at: &NaiveDateTime) -> bool {
        let weekday = !matches!(at.weekday(), Weekday::Sat | Weekday::Sun);

        weekday && self.peak_windows.iter().any(|w| w.contains(at.hour()))
    }

    pub fn is_night(&self, at: &NaiveDateTime) -> bool {
        self.night_window.contains(at.hour())
    }
}

impl Default for TariffTable {
    fn default() -> Self {
        Self {
            categories: vec![
                CategoryTariff {
                    name: "FlashHatch".into(),
                    rate_per_km: dec!(2.00),
                    minimum_fare: dec!(5.50),
                    peak_multiplier: dec!(1.20),
                },
                CategoryTariff {
                    name: "FlashSedan".into(),
                    rate_per_km: dec!(2.40),
                    minimum_fare: dec!(6.50),
                    peak_multiplier: dec!(1.20),
                },
                CategoryTariff {
                    name: "FlashSUV".into(),
                    rate_per_km: dec!(3.10),
                    minimum_fare: dec!(8.50),
                    peak_multiplier: dec!(1.25),
                },
                CategoryTariff {
                    name: "FlashPremium".into(),
                    rate_per_km: dec!(3.80),
                    minimum_fare: dec!(12.00),
                    peak_multiplier: dec!(1.30),
                },
            ],
            per_minute_rate: dec!(0.50),
            per_stop_fee: dec!(2.00),
            night_multiplier: dec!(1.15),
            peak_windows: vec![HourWindow::new(7, 10), HourWindow::new(17, 20)],
            night_window: HourWindow::new(22, 5),
            scheduled: ScheduledTariff::default(),
        }
    }
}

#[cfg(test)]
fn local(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").unwrap()
}

#[test]
fn hour_window_wraps_midnight() {
    let night = HourWindow::new(22, 5);

    assert!(night.contains(22));
    assert!(night.contains(23));
    assert!(night.contains(0));
    assert!(night.contains(4));
    assert!(!night.contains(5));
    assert!(!night.contains(21));
    assert!(!night.contains(12));
}

#[test]
fn peak_only_on_weekdays() {
    let tariffs = TariffTable::default();

    // 2024-01-02 is a Tuesday, 2024-01-06 a Saturday
    assert!(tariffs.is_peak(&local("2024-01-02", "07:00:00")));
    assert!(tariffs.is_peak(&local("2024-01-02", "09:59:59")));
    assert!(!tariffs.is_peak(&local("2024-01-02", "10:00:00")));
    assert!(tariffs.is_peak(&local("2024-01-02", "17:30:00")));
    assert!(!tariffs.is_peak(&local("2024-01-02", "20:00:00")));
    assert!(!tariffs.is_peak(&local("2024-01-06", "08:00:00")));
}

#[test]
fn night_spans_midnight() {
    let tariffs = TariffTable::default();

    assert!(tariffs.is_night(&local("2024-01-02", "22:00:00")));
    assert!(tariffs.is_night(&local("2024-01-03", "04:59:00")));
    assert!(!tariffs.is_night(&local("2024-01-03", "05:00:00")));
    assert!(!tariffs.is_night(&local("2024-01-02", "21:59:00")));
}

#[test]
fn unknown_category_falls_back_to_cheapest() {
    let tariffs = TariffTable::default();

    assert_eq!(tariffs.category("flashsuv").name, "FlashSUV");
    assert_eq!(tariffs.category("Limousine").name, "FlashHatch");
    assert!(!tariffs.is_known_category("Limousine"));

    let cheapest = tariffs
        .categories
        .iter()
        .map(|c| c.minimum_fare)
        .min()
        .unwrap();
    assert_eq!(tariffs.category("").minimum_fare, cheapest);
}

#[test]
fn scheduled_tier_boundary_is_inclusive() {
    let scheduled = ScheduledTariff::default();

    assert_eq!(scheduled.tier(dec!(50)), ScheduledTier::Short);
    assert_eq!(scheduled.tier(dec!(50.01)), ScheduledTier::Long);
    assert_eq!(scheduled.rate_for(ScheduledTier::Long), dec!(1.98));
}
