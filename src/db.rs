mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::{NewPayment, Payment, Ride, Wallet};
use crate::error::Error;

/// A set of writes that commit or roll back together. Dropping a unit of work
/// without committing discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Moves the ride from `in_progress` to `finished`. Fails with a not-settleable
    /// error when the ride is missing or in any other state.
    async fn transition_ride_to_finished(
        &mut self,
        id: Uuid,
        final_amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Ride, Error>;

    async fn insert_payment(&mut self, fields: NewPayment) -> Result<Payment, Error>;

    /// Adds `amount` to the driver's balance and returns the new balance. The
    /// increment is additive so concurrent credits never overwrite each other.
    async fn credit_wallet(&mut self, driver_id: Uuid, amount: Decimal) -> Result<Decimal, Error>;

    async fn commit(self: Box<Self>) -> Result<(), Error>;

    async fn rollback(self: Box<Self>) -> Result<(), Error>;
}

#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, Error>;

    async fn find_ride(&self, id: Uuid) -> Result<Ride, Error>;

    async fn find_wallet(&self, driver_id: Uuid) -> Result<Wallet, Error>;

    async fn find_notification_address(&self, driver_id: Uuid) -> Result<Option<String>, Error>;
}
