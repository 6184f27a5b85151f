use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{
    PaymentMethod, Ride, RideQuote, RideQuoteRequest, ScheduledFareQuote, SettlementReceipt,
    Wallet,
};
use crate::error::Error;

/// Price quotes. Pure, no I/O.
pub trait QuoteAPI {
    fn quote_ride(&self, request: &RideQuoteRequest) -> RideQuote;

    fn quote_scheduled_ride(&self, distance_km: f64) -> Result<ScheduledFareQuote, Error>;
}

#[async_trait]
pub trait SettlementAPI {
    /// Finishes an in-progress ride: records the payment and credits the driver in a
    /// single unit of work, then notifies the driver. A ride is settled at most once.
    async fn finish_ride(
        &self,
        id: Uuid,
        final_amount: Decimal,
        method: PaymentMethod,
    ) -> Result<SettlementReceipt, Error>;

    async fn find_ride(&self, id: Uuid) -> Result<Ride, Error>;

    async fn find_wallet(&self, driver_id: Uuid) -> Result<Wallet, Error>;
}

pub trait API: QuoteAPI + SettlementAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
