use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Settlement;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    Pix,
    Wallet,
}

impl PaymentMethod {
    pub fn name(&self) -> String {
        match self {
            Self::Cash => "cash".into(),
            Self::CreditCard => "credit_card".into(),
            Self::DebitCard => "debit_card".into(),
            Self::Pix => "pix".into(),
            Self::Wallet => "wallet".into(),
        }
    }
}

/// Settlement records payments as `Pending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Pending => "pending".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Uuid,
    pub total_amount: Decimal,
    pub driver_amount: Decimal,
    pub platform_amount: Decimal,
    pub method: PaymentMethod,
    pub transaction_id: String,
}

impl NewPayment {
    pub fn new(
        ride_id: Uuid,
        passenger_id: Uuid,
        driver_id: Uuid,
        total_amount: Decimal,
        settlement: &Settlement,
        method: PaymentMethod,
    ) -> Self {
        Self {
            ride_id,
            passenger_id,
            driver_id,
            total_amount,
            driver_amount: settlement.driver_amount,
            platform_amount: settlement.platform_amount,
            method,
            transaction_id: format!("TXN-{}", Uuid::new_v4().simple()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Uuid,
    pub total_amount: Decimal,
    pub driver_amount: Decimal,
    pub platform_amount: Decimal,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(fields: NewPayment, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_id: fields.ride_id,
            passenger_id: fields.passenger_id,
            driver_id: fields.driver_id,
            total_amount: fields.total_amount,
            driver_amount: fields.driver_amount,
            platform_amount: fields.platform_amount,
            method: fields.method,
            transaction_id: fields.transaction_id,
            status: Status::Pending,
            created_at,
        }
    }
}

#[test]
fn new_payment_starts_pending_with_split() {
    use rust_decimal_macros::dec;

    let settlement = Settlement {
        driver_amount: dec!(28.80),
        platform_amount: dec!(7.20),
    };
    let fields = NewPayment::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        dec!(36.00),
        &settlement,
        PaymentMethod::Pix,
    );

    assert!(fields.transaction_id.starts_with("TXN-"));
    assert_eq!(fields.transaction_id.len(), 36);

    let payment = Payment::new(fields, Utc::now());
    assert_eq!(payment.status, Status::Pending);
    assert_eq!(
        payment.driver_amount + payment.platform_amount,
        payment.total_amount
    );
}
