use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub driver_id: Uuid,
    pub balance: Decimal,
}

impl Wallet {
    pub fn empty(driver_id: Uuid) -> Self {
        Self {
            driver_id,
            balance: Decimal::ZERO,
        }
    }
}
