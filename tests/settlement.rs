use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use ridefare::api::{QuoteAPI, SettlementAPI};
use ridefare::db::{MemoryStore, SettlementStore, UnitOfWork};
use ridefare::engine::Engine;
use ridefare::entities::{PaymentMethod, PaymentStatus, Ride, RideStatus};
use ridefare::error::{notification_error, Error};
use ridefare::external::Notifier;
use ridefare::tariff::TariffTable;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, address: &str, title: &str, body: &str) -> Result<(), Error> {
        self.sent
            .lock()
            .unwrap()
            .push((address.into(), title.into(), body.into()));

        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _: &str, _: &str, _: &str) -> Result<(), Error> {
        Err(notification_error())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn engine(store: &MemoryStore, notifier: Arc<dyn Notifier>) -> Engine {
    init_tracing();

    Engine::new(Arc::new(store.clone()), notifier, TariffTable::default()).unwrap()
}

async fn in_progress_ride(store: &MemoryStore, driver_id: Uuid) -> Ride {
    let mut ride = Ride::new(Uuid::new_v4(), "FlashHatch".into());
    ride.accept(driver_id).unwrap();
    ride.start().unwrap();

    store.insert_ride(ride.clone()).await;

    ride
}

#[tokio::test]
async fn finish_records_payment_and_credits_driver() {
    let store = MemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = engine(&store, notifier.clone());

    let driver_id = Uuid::new_v4();
    let ride = in_progress_ride(&store, driver_id).await;
    store
        .set_notification_address(driver_id, "ExponentPushToken[driver]".into())
        .await;

    let receipt = engine
        .finish_ride(ride.id, dec!(36.00), PaymentMethod::Pix)
        .await
        .unwrap();

    assert_eq!(receipt.ride.status, RideStatus::Finished);
    assert_eq!(receipt.ride.final_amount, Some(dec!(36.00)));
    assert!(receipt.ride.finished_at.is_some());

    assert_eq!(receipt.payment.ride_id, ride.id);
    assert_eq!(receipt.payment.passenger_id, ride.passenger_id);
    assert_eq!(receipt.payment.driver_id, driver_id);
    assert_eq!(receipt.payment.total_amount, dec!(36.00));
    assert_eq!(receipt.payment.driver_amount, dec!(28.80));
    assert_eq!(receipt.payment.platform_amount, dec!(7.20));
    assert_eq!(receipt.payment.method, PaymentMethod::Pix);
    assert_eq!(receipt.payment.status, PaymentStatus::Pending);
    assert!(receipt.payment.transaction_id.starts_with("TXN-"));

    assert_eq!(receipt.wallet.driver_id, driver_id);
    assert_eq!(receipt.wallet.balance, dec!(28.80));

    let stored = engine.find_ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::Finished);
    assert_eq!(store.payments().await.len(), 1);

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ExponentPushToken[driver]");
    assert_eq!(sent[0].1, "Ride finished");
    assert!(sent[0].2.contains("28.80"));
}

#[tokio::test]
async fn second_finish_does_not_double_credit() {
    let store = MemoryStore::new();
    let engine = engine(&store, Arc::new(RecordingNotifier::default()));

    let driver_id = Uuid::new_v4();
    let ride = in_progress_ride(&store, driver_id).await;

    engine
        .finish_ride(ride.id, dec!(20.00), PaymentMethod::Cash)
        .await
        .unwrap();

    let err = engine
        .finish_ride(ride.id, dec!(20.00), PaymentMethod::Cash)
        .await
        .unwrap_err();

    assert!(err.is_not_found_error());
    assert_eq!(store.payments().await.len(), 1);
    assert_eq!(
        engine.find_wallet(driver_id).await.unwrap().balance,
        dec!(16.00)
    );
    assert_eq!(
        engine.find_ride(ride.id).await.unwrap().final_amount,
        Some(dec!(20.00))
    );
}

#[tokio::test]
async fn unknown_ride_is_not_found() {
    let store = MemoryStore::new();
    let engine = engine(&store, Arc::new(RecordingNotifier::default()));

    let err = engine
        .finish_ride(Uuid::new_v4(), dec!(20.00), PaymentMethod::Cash)
        .await
        .unwrap_err();

    assert!(err.is_not_found_error());
    assert!(store.payments().await.is_empty());
}

#[tokio::test]
async fn rides_not_in_progress_are_not_settleable() {
    let store = MemoryStore::new();
    let engine = engine(&store, Arc::new(RecordingNotifier::default()));

    let pending = Ride::new(Uuid::new_v4(), "FlashSedan".into());
    store.insert_ride(pending.clone()).await;

    let mut cancelled = in_progress_ride(&store, Uuid::new_v4()).await;
    cancelled.cancel().unwrap();
    store.insert_ride(cancelled.clone()).await;

    for id in [pending.id, cancelled.id] {
        let err = engine
            .finish_ride(id, dec!(12.00), PaymentMethod::CreditCard)
            .await
            .unwrap_err();

        assert!(err.is_not_found_error());
    }

    assert_eq!(
        engine.find_ride(pending.id).await.unwrap().status,
        RideStatus::Pending
    );
    assert_eq!(
        engine.find_ride(cancelled.id).await.unwrap().status,
        RideStatus::Cancelled
    );
    assert!(store.payments().await.is_empty());
}

#[tokio::test]
async fn invalid_amount_fails_before_touching_the_ride() {
    let store = MemoryStore::new();
    let engine = engine(&store, Arc::new(RecordingNotifier::default()));

    let ride = in_progress_ride(&store, Uuid::new_v4()).await;

    for amount in [Decimal::ZERO, dec!(-10)] {
        let err = engine
            .finish_ride(ride.id, amount, PaymentMethod::Cash)
            .await
            .unwrap_err();

        assert!(err.is_validation_error());
    }

    assert_eq!(
        engine.find_ride(ride.id).await.unwrap().status,
        RideStatus::InProgress
    );
}

#[tokio::test]
async fn failed_payment_insert_rolls_back_ride_transition() {
    let store = MemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = engine(&store, notifier.clone());

    let driver_id = Uuid::new_v4();
    let ride = in_progress_ride(&store, driver_id).await;
    store
        .set_notification_address(driver_id, "ExponentPushToken[driver]".into())
        .await;

    store.fail_next_payment_insert();

    assert!(engine
        .finish_ride(ride.id, dec!(36.00), PaymentMethod::DebitCard)
        .await
        .is_err());

    let stored = engine.find_ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::InProgress);
    assert_eq!(stored.final_amount, None);
    assert!(store.payments().await.is_empty());
    assert_eq!(
        engine.find_wallet(driver_id).await.unwrap().balance,
        Decimal::ZERO
    );
    assert!(notifier.sent.lock().unwrap().is_empty());

    // the whole finish call can be retried
    let receipt = engine
        .finish_ride(ride.id, dec!(36.00), PaymentMethod::DebitCard)
        .await
        .unwrap();
    assert_eq!(receipt.wallet.balance, dec!(28.80));
}

#[tokio::test]
async fn fractions_of_a_cent_are_rejected() {
    let store = MemoryStore::new();
    let engine = engine(&store, Arc::new(RecordingNotifier::default()));

    let driver_id = Uuid::new_v4();
    let ride = in_progress_ride(&store, driver_id).await;

    let err = engine
        .finish_ride(ride.id, dec!(10.005), PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert!(err.is_validation_error());

    let stored = engine.find_ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::InProgress);
    assert_eq!(stored.final_amount, None);
    assert!(store.payments().await.is_empty());
    assert_eq!(
        engine.find_wallet(driver_id).await.unwrap().balance,
        Decimal::ZERO
    );

    // trailing zeros are still whole cents
    let receipt = engine
        .finish_ride(ride.id, dec!(10.000), PaymentMethod::Cash)
        .await
        .unwrap();
    assert_eq!(receipt.ride.final_amount.map(|a| a.scale()), Some(2));
    assert_eq!(receipt.payment.total_amount.scale(), 2);
    assert_eq!(receipt.payment.driver_amount, dec!(8.00));
    assert_eq!(receipt.payment.driver_amount.scale(), 2);
    assert_eq!(receipt.payment.platform_amount, dec!(2.00));
    assert_eq!(receipt.wallet.balance, dec!(8.00));
}

#[tokio::test]
async fn commit_conflict_persists_nothing() {
    let store = MemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = engine(&store, notifier.clone());

    let driver_id = Uuid::new_v4();
    let ride = in_progress_ride(&store, driver_id).await;
    store
        .set_notification_address(driver_id, "ExponentPushToken[driver]".into())
        .await;

    store.fail_next_commit();

    let err = engine
        .finish_ride(ride.id, dec!(36.00), PaymentMethod::CreditCard)
        .await
        .unwrap_err();
    assert!(err.is_conflict_error());

    let stored = engine.find_ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::InProgress);
    assert_eq!(stored.final_amount, None);
    assert!(store.payments().await.is_empty());
    assert_eq!(
        engine.find_wallet(driver_id).await.unwrap().balance,
        Decimal::ZERO
    );
    assert!(notifier.sent.lock().unwrap().is_empty());

    let receipt = engine
        .finish_ride(ride.id, dec!(36.00), PaymentMethod::CreditCard)
        .await
        .unwrap();
    assert_eq!(receipt.ride.status, RideStatus::Finished);
    assert_eq!(receipt.wallet.balance, dec!(28.80));
    assert_eq!(store.payments().await.len(), 1);
    assert_eq!(notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn dropped_unit_of_work_discards_writes() {
    let store = MemoryStore::new();
    let ride = in_progress_ride(&store, Uuid::new_v4()).await;

    {
        let mut uow = store.begin().await.unwrap();
        uow.transition_ride_to_finished(ride.id, dec!(10.00), chrono::Utc::now())
            .await
            .unwrap();
    }

    assert_eq!(
        store.find_ride(ride.id).await.unwrap().status,
        RideStatus::InProgress
    );
}

#[tokio::test]
async fn notification_failure_keeps_the_settlement() {
    let store = MemoryStore::new();
    let engine = engine(&store, Arc::new(FailingNotifier));

    let driver_id = Uuid::new_v4();
    let ride = in_progress_ride(&store, driver_id).await;
    store
        .set_notification_address(driver_id, "ExponentPushToken[driver]".into())
        .await;

    let receipt = engine
        .finish_ride(ride.id, dec!(50.00), PaymentMethod::Wallet)
        .await
        .unwrap();

    assert_eq!(receipt.wallet.balance, dec!(40.00));
    assert_eq!(
        engine.find_ride(ride.id).await.unwrap().status,
        RideStatus::Finished
    );
    assert_eq!(store.payments().await.len(), 1);
}

#[tokio::test]
async fn drivers_without_address_are_not_notified() {
    let store = MemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = engine(&store, notifier.clone());

    let ride = in_progress_ride(&store, Uuid::new_v4()).await;

    engine
        .finish_ride(ride.id, dec!(18.75), PaymentMethod::Cash)
        .await
        .unwrap();

    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_finishes_settle_once() {
    let store = MemoryStore::new();
    let engine = Arc::new(engine(&store, Arc::new(RecordingNotifier::default())));

    let driver_id = Uuid::new_v4();
    let id = in_progress_ride(&store, driver_id).await.id;

    let attempts = (0..8).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .finish_ride(id, dec!(25.00), PaymentMethod::Pix)
                .await
        })
    });

    let results = futures::future::join_all(attempts).await;
    let succeeded = results
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(|result| result.is_ok())
        .count();

    assert_eq!(succeeded, 1);
    assert_eq!(store.payments().await.len(), 1);
    assert_eq!(
        engine.find_wallet(driver_id).await.unwrap().balance,
        dec!(20.00)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rides_for_one_driver_add_up() {
    let store = MemoryStore::new();
    let engine = Arc::new(engine(&store, Arc::new(RecordingNotifier::default())));

    let driver_id = Uuid::new_v4();
    let mut rides = Vec::new();
    for _ in 0..10 {
        rides.push(in_progress_ride(&store, driver_id).await);
    }

    let settlements = rides.iter().map(|ride| {
        let engine = engine.clone();
        let id = ride.id;
        tokio::spawn(async move { engine.finish_ride(id, dec!(10.03), PaymentMethod::Cash).await })
    });

    for joined in futures::future::join_all(settlements).await {
        joined.unwrap().unwrap();
    }

    // 10 x 8.02
    assert_eq!(
        engine.find_wallet(driver_id).await.unwrap().balance,
        dec!(80.20)
    );
    assert_eq!(store.payments().await.len(), 10);
}

#[test]
fn quotes_through_the_engine() {
    use chrono::NaiveDateTime;
    use ridefare::entities::RideQuoteRequest;

    let store = MemoryStore::new();
    let engine = engine(&store, Arc::new(RecordingNotifier::default()));

    let quote = engine.quote_ride(&RideQuoteRequest {
        category: "FlashHatch".into(),
        distance_km: 10.0,
        duration_min: 20.0,
        stops: 0,
        at: Some(NaiveDateTime::parse_from_str("2024-01-02 08:00", "%Y-%m-%d %H:%M").unwrap()),
    });
    assert_eq!(quote.price, dec!(36.00));

    let scheduled = engine.quote_scheduled_ride(80.0).unwrap();
    assert_eq!(scheduled.total_amount, dec!(158.40));

    assert!(engine.quote_scheduled_ride(0.0).is_err());
}

#[test]
fn engine_requires_a_fallback_category() {
    let mut tariffs = TariffTable::default();
    tariffs.categories.clear();

    let result = Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
        tariffs,
    );

    assert!(result.is_err());
}

#[test]
fn settles_with_block_on() {
    let store = MemoryStore::new();
    let engine = engine(&store, Arc::new(RecordingNotifier::default()));

    let ride = tokio_test::block_on(in_progress_ride(&store, Uuid::new_v4()));
    let receipt =
        tokio_test::block_on(engine.finish_ride(ride.id, dec!(0.01), PaymentMethod::Cash)).unwrap();

    // a single cent stays with the driver
    assert_eq!(receipt.payment.platform_amount, dec!(0.00));
    assert_eq!(receipt.payment.driver_amount, dec!(0.01));
}
