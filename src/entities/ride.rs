use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_amount_error, invalid_invocation_error, not_settleable_error, Error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub status: Status,
    pub passenger_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub category: String,
    pub final_amount: Option<Decimal>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    InProgress,
    Finished,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Pending => "pending".into(),
            Self::Accepted => "accepted".into(),
            Self::InProgress => "in_progress".into(),
            Self::Finished => "finished".into(),
            Self::Cancelled => "cancelled".into(),
        }
    }
}

impl Ride {
    pub fn new(passenger_id: Uuid, category: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: Status::Pending,
            passenger_id,
            driver_id: None,
            category,
            final_amount: None,
            finished_at: None,
        }
    }

    pub fn is_settleable(&self) -> bool {
        matches!(self.status, Status::InProgress) && self.driver_id.is_some()
    }

    #[tracing::instrument]
    pub fn accept(&mut self, driver_id: Uuid) -> Result<(), Error> {
        match self.status {
            Status::Pending => {
                self.status = Status::Accepted;
                self.driver_id = Some(driver_id);
                Ok(())
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    #[tracing::instrument]
    pub fn start(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Accepted => {
                self.status = Status::InProgress;
                Ok(())
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    #[tracing::instrument]
    pub fn cancel(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending | Status::Accepted | Status::InProgress => {
                self.status = Status::Cancelled;
                Ok(())
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    /// Moves an in-progress ride to `finished`, fixing its final amount. Returns the
    /// driver to be credited. The amount is set once; a finished ride is never settleable.
    #[tracing::instrument]
    pub fn finish(&mut self, final_amount: Decimal, at: DateTime<Utc>) -> Result<Uuid, Error> {
        if final_amount <= Decimal::ZERO {
            return Err(invalid_amount_error());
        }

        match (self.status, self.driver_id) {
            (Status::InProgress, Some(driver_id)) => {
                self.status = Status::Finished;
                self.final_amount = Some(final_amount);
                self.finished_at = Some(at);
                Ok(driver_id)
            }
            _ => Err(not_settleable_error()),
        }
    }
}

#[cfg(test)]
fn in_progress_ride() -> Ride {
    let mut ride = Ride::new(Uuid::new_v4(), "FlashHatch".into());
    ride.accept(Uuid::new_v4()).unwrap();
    ride.start().unwrap();
    ride
}

#[test]
fn finish_sets_amount_once() {
    use rust_decimal_macros::dec;

    let mut ride = in_progress_ride();
    let driver_id = ride.driver_id.unwrap();

    assert!(ride.is_settleable());
    assert_eq!(ride.finish(dec!(36.00), Utc::now()).unwrap(), driver_id);
    assert_eq!(ride.status, Status::Finished);
    assert_eq!(ride.final_amount, Some(dec!(36.00)));
    assert!(!ride.is_settleable());

    let err = ride.finish(dec!(50.00), Utc::now()).unwrap_err();
    assert!(err.is_not_found_error());
    assert_eq!(ride.final_amount, Some(dec!(36.00)));
}

#[test]
fn finish_requires_in_progress() {
    use rust_decimal_macros::dec;

    let mut pending = Ride::new(Uuid::new_v4(), "FlashHatch".into());
    assert!(pending.finish(dec!(10), Utc::now()).is_err());
    assert_eq!(pending.status, Status::Pending);

    let mut cancelled = in_progress_ride();
    cancelled.cancel().unwrap();
    assert!(cancelled.finish(dec!(10), Utc::now()).is_err());
    assert_eq!(cancelled.status, Status::Cancelled);
}

#[test]
fn finish_rejects_non_positive_amount() {
    let mut ride = in_progress_ride();

    let err = ride.finish(Decimal::ZERO, Utc::now()).unwrap_err();
    assert!(err.is_validation_error());
    assert_eq!(ride.status, Status::InProgress);
}

#[test]
fn status_serializes_by_name() {
    let value = serde_json::to_value(Status::InProgress).unwrap();
    assert_eq!(value, serde_json::json!({ "name": "in_progress" }));
    assert_eq!(Status::InProgress.name(), "in_progress");
}
