use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{Payment, Ride, Wallet};
use crate::tariff::ScheduledTier;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RideQuoteRequest {
    pub category: String,
    pub distance_km: f64,
    pub duration_min: f64,
    pub stops: u32,
    /// Local wall-clock time of the ride. Defaults to now when absent.
    pub at: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RideQuote {
    pub category: String,
    pub price: Decimal,
    pub peak: bool,
    pub night: bool,
    pub minimum_applied: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledFareQuote {
    pub rate_per_km: Decimal,
    pub minimum_fare: Decimal,
    pub total_amount: Decimal,
    pub tier: ScheduledTier,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub driver_amount: Decimal,
    pub platform_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub ride: Ride,
    pub payment: Payment,
    pub wallet: Wallet,
}
