mod payment;
mod quote;
mod ride;
mod wallet;

pub use payment::{NewPayment, Payment, PaymentMethod, Status as PaymentStatus};
pub use quote::{RideQuote, RideQuoteRequest, ScheduledFareQuote, Settlement, SettlementReceipt};
pub use ride::{Ride, Status as RideStatus};
pub use wallet::Wallet;
