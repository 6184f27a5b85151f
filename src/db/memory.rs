use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{SettlementStore, UnitOfWork};
use crate::entities::{NewPayment, Payment, Ride, Wallet};
use crate::error::{
    not_found_error, not_settleable_error, persistence_conflict_error, unexpected_error, Error,
};

#[derive(Debug, Default)]
struct State {
    rides: HashMap<Uuid, Ride>,
    payments: Vec<Payment>,
    paid_rides: HashSet<Uuid>,
    wallets: HashMap<Uuid, Decimal>,
    notification_addresses: HashMap<Uuid, String>,
}

/// Writes of one unit of work, applied to `State` on commit.
#[derive(Default)]
struct Staged {
    rides: HashMap<Uuid, Ride>,
    payments: Vec<Payment>,
    wallet_credits: HashMap<Uuid, Decimal>,
}

/// In-process store. Units of work hold the store lock from `begin` until they
/// finish, so they apply one at a time.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    fail_next_payment_insert: Arc<AtomicBool>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_ride(&self, ride: Ride) {
        self.state.lock().await.rides.insert(ride.id, ride);
    }

    pub async fn set_notification_address(&self, driver_id: Uuid, address: String) {
        self.state
            .lock()
            .await
            .notification_addresses
            .insert(driver_id, address);
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.clone()
    }

    /// Makes the next unit of work fail its payment insert.
    pub fn fail_next_payment_insert(&self) {
        self.fail_next_payment_insert.store(true, Ordering::SeqCst);
    }

    /// Makes the next unit of work fail its commit with a persistence conflict.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, Error> {
        let guard = self.state.clone().lock_owned().await;

        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged: Staged::default(),
            fail_payment_insert: self.fail_next_payment_insert.swap(false, Ordering::SeqCst),
            fail_commit: self.fail_next_commit.swap(false, Ordering::SeqCst),
        }))
    }

    async fn find_ride(&self, id: Uuid) -> Result<Ride, Error> {
        self.state
            .lock()
            .await
            .rides
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error())
    }

    async fn find_wallet(&self, driver_id: Uuid) -> Result<Wallet, Error> {
        let balance = self
            .state
            .lock()
            .await
            .wallets
            .get(&driver_id)
            .copied()
            .unwrap_or(Decimal::ZERO);

        Ok(Wallet { driver_id, balance })
    }

    async fn find_notification_address(&self, driver_id: Uuid) -> Result<Option<String>, Error> {
        Ok(self
            .state
            .lock()
            .await
            .notification_addresses
            .get(&driver_id)
            .cloned())
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<State>,
    staged: Staged,
    fail_payment_insert: bool,
    fail_commit: bool,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn transition_ride_to_finished(
        &mut self,
        id: Uuid,
        final_amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Ride, Error> {
        let mut ride = self
            .staged
            .rides
            .get(&id)
            .or_else(|| self.guard.rides.get(&id))
            .cloned()
            .ok_or_else(|| not_settleable_error())?;

        ride.finish(final_amount, at)?;
        self.staged.rides.insert(id, ride.clone());

        Ok(ride)
    }

    async fn insert_payment(&mut self, fields: NewPayment) -> Result<Payment, Error> {
        if self.fail_payment_insert {
            return Err(unexpected_error());
        }

        let already_paid = self.guard.paid_rides.contains(&fields.ride_id)
            || self.staged.payments.iter().any(|p| p.ride_id == fields.ride_id);
        if already_paid {
            return Err(not_settleable_error());
        }

        let payment = Payment::new(fields, Utc::now());
        self.staged.payments.push(payment.clone());

        Ok(payment)
    }

    async fn credit_wallet(&mut self, driver_id: Uuid, amount: Decimal) -> Result<Decimal, Error> {
        let credit = self
            .staged
            .wallet_credits
            .entry(driver_id)
            .or_insert(Decimal::ZERO);
        *credit += amount;
        let credit = *credit;

        let committed = self
            .guard
            .wallets
            .get(&driver_id)
            .copied()
            .unwrap_or(Decimal::ZERO);

        Ok(committed + credit)
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let Self {
            mut guard,
            staged,
            fail_commit,
            ..
        } = *self;

        if fail_commit {
            return Err(persistence_conflict_error());
        }

        let state = &mut *guard;
        state.rides.extend(staged.rides);

        for payment in staged.payments {
            state.paid_rides.insert(payment.ride_id);
            state.payments.push(payment);
        }

        for (driver_id, credit) in staged.wallet_credits {
            *state.wallets.entry(driver_id).or_insert(Decimal::ZERO) += credit;
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}

#[test]
fn credits_build_on_the_committed_balance() {
    use rust_decimal_macros::dec;

    tokio_test::block_on(async {
        let store = MemoryStore::new();
        let driver_id = Uuid::new_v4();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.credit_wallet(driver_id, dec!(8.00)).await.unwrap(), dec!(8.00));
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.credit_wallet(driver_id, dec!(2.50)).await.unwrap(), dec!(10.50));
        assert_eq!(uow.credit_wallet(driver_id, dec!(1.00)).await.unwrap(), dec!(11.50));
        uow.rollback().await.unwrap();

        assert_eq!(store.find_wallet(driver_id).await.unwrap().balance, dec!(8.00));
    });
}

#[test]
fn failed_commit_discards_staged_writes() {
    use rust_decimal_macros::dec;

    tokio_test::block_on(async {
        let store = MemoryStore::new();
        let driver_id = Uuid::new_v4();
        let mut ride = Ride::new(Uuid::new_v4(), "FlashHatch".into());
        ride.accept(driver_id).unwrap();
        ride.start().unwrap();
        let id = ride.id;
        store.insert_ride(ride).await;

        store.fail_next_commit();
        let mut uow = store.begin().await.unwrap();
        uow.transition_ride_to_finished(id, dec!(10.00), Utc::now())
            .await
            .unwrap();
        uow.credit_wallet(driver_id, dec!(8.00)).await.unwrap();

        assert!(uow.commit().await.unwrap_err().is_conflict_error());
        assert!(store.find_ride(id).await.unwrap().is_settleable());
        assert_eq!(store.find_wallet(driver_id).await.unwrap().balance, Decimal::ZERO);

        // The switch only affects one unit of work.
        let uow = store.begin().await.unwrap();
        assert!(uow.commit().await.is_ok());
    });
}
