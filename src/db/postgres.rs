use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, types::Json, Executor, Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{SettlementStore, UnitOfWork};
use crate::entities::{NewPayment, Payment, Ride, RideStatus, Wallet};
use crate::error::{not_found_error, not_settleable_error, persistence_conflict_error, Error};

type Database = Postgres;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: Pool<Database>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::new", skip_all)]
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        Self::from_pool(pool).await
    }

    #[tracing::instrument(name = "PgStore::from_pool", skip_all)]
    pub async fn from_pool(pool: Pool<Database>) -> Result<Self, Error> {
        let store = Self { pool };
        store.setup().await?;

        Ok(store)
    }

    async fn setup(&self) -> Result<(), Error> {
        self.pool
            .execute("CREATE TABLE IF NOT EXISTS rides (id UUID PRIMARY KEY, status VARCHAR NOT NULL, data JSONB NOT NULL)")
            .await?;

        self.pool
            .execute("CREATE TABLE IF NOT EXISTS payments (id UUID PRIMARY KEY, ride_id UUID NOT NULL UNIQUE, passenger_id UUID NOT NULL, driver_id UUID NOT NULL, total_amount NUMERIC(12, 2) NOT NULL, driver_amount NUMERIC(12, 2) NOT NULL, platform_amount NUMERIC(12, 2) NOT NULL, method VARCHAR NOT NULL, transaction_id VARCHAR NOT NULL UNIQUE, status VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL, CONSTRAINT fk_payment_ride FOREIGN KEY(ride_id) REFERENCES rides(id), CONSTRAINT payment_split_sum CHECK (driver_amount + platform_amount = total_amount))")
            .await?;

        self.pool
            .execute("CREATE TABLE IF NOT EXISTS wallets (driver_id UUID PRIMARY KEY, balance NUMERIC(14, 2) NOT NULL DEFAULT 0)")
            .await?;

        self.pool
            .execute("CREATE TABLE IF NOT EXISTS driver_push_tokens (driver_id UUID PRIMARY KEY, token VARCHAR NOT NULL)")
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn insert_ride(&self, ride: &Ride) -> Result<(), Error> {
        self.pool
            .execute(
                sqlx::query("INSERT INTO rides (id, status, data) VALUES ($1, $2, $3)")
                    .bind(&ride.id)
                    .bind(ride.status.name())
                    .bind(Json(ride)),
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl SettlementStore for PgStore {
    #[tracing::instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, Error> {
        let tx = self.pool.begin().await?;

        Ok(Box::new(PgUnitOfWork { tx }))
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, id: Uuid) -> Result<Ride, Error> {
        let Json(ride): Json<Ride> = self
            .pool
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&id))
            .await?
            .ok_or_else(|| not_found_error())?
            .try_get("data")?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_wallet(&self, driver_id: Uuid) -> Result<Wallet, Error> {
        let maybe_result = self
            .pool
            .fetch_optional(
                sqlx::query("SELECT balance FROM wallets WHERE driver_id = $1").bind(&driver_id),
            )
            .await?;

        match maybe_result {
            Some(row) => Ok(Wallet {
                driver_id,
                balance: row.try_get("balance")?,
            }),
            None => Ok(Wallet::empty(driver_id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_notification_address(&self, driver_id: Uuid) -> Result<Option<String>, Error> {
        let maybe_result = self
            .pool
            .fetch_optional(
                sqlx::query("SELECT token FROM driver_push_tokens WHERE driver_id = $1")
                    .bind(&driver_id),
            )
            .await?;

        match maybe_result {
            Some(row) => Ok(Some(row.try_get("token")?)),
            None => Ok(None),
        }
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Database>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[tracing::instrument(skip(self))]
    async fn transition_ride_to_finished(
        &mut self,
        id: Uuid,
        final_amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Ride, Error> {
        let Json(mut ride): Json<Ride> = self
            .tx
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1 FOR UPDATE").bind(&id))
            .await?
            .ok_or_else(|| not_settleable_error())?
            .try_get("data")?;

        ride.finish(final_amount, at)?;

        // only an in-progress row may move to finished
        let result = self
            .tx
            .execute(
                sqlx::query("UPDATE rides SET status = $2, data = $3 WHERE id = $1 AND status = $4")
                    .bind(&id)
                    .bind(ride.status.name())
                    .bind(Json(&ride))
                    .bind(RideStatus::InProgress.name()),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_settleable_error());
        }

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn insert_payment(&mut self, fields: NewPayment) -> Result<Payment, Error> {
        let payment = Payment::new(fields, Utc::now());

        self.tx
            .execute(
                sqlx::query("INSERT INTO payments (id, ride_id, passenger_id, driver_id, total_amount, driver_amount, platform_amount, method, transaction_id, status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)")
                    .bind(&payment.id)
                    .bind(&payment.ride_id)
                    .bind(&payment.passenger_id)
                    .bind(&payment.driver_id)
                    .bind(payment.total_amount)
                    .bind(payment.driver_amount)
                    .bind(payment.platform_amount)
                    .bind(payment.method.name())
                    .bind(&payment.transaction_id)
                    .bind(payment.status.name())
                    .bind(payment.created_at),
            )
            .await?;

        Ok(payment)
    }

    #[tracing::instrument(skip(self))]
    async fn credit_wallet(&mut self, driver_id: Uuid, amount: Decimal) -> Result<Decimal, Error> {
        let balance: Decimal = self
            .tx
            .fetch_one(
                sqlx::query("INSERT INTO wallets (driver_id, balance) VALUES ($1, $2) ON CONFLICT (driver_id) DO UPDATE SET balance = wallets.balance + EXCLUDED.balance RETURNING balance")
                    .bind(&driver_id)
                    .bind(amount),
            )
            .await?
            .try_get("balance")?;

        Ok(balance)
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let Self { tx } = *self;

        tx.commit().await.map_err(|err| {
            tracing::warn!(error = ?err, "failed to commit settlement");
            persistence_conflict_error()
        })
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        let Self { tx } = *self;

        tx.rollback().await?;

        Ok(())
    }
}

#[tokio::test]
#[ignore = "requires a running postgres instance"]
async fn settles_against_postgres() {
    use rust_decimal_macros::dec;

    let url = std::env::var("DATABASE_URL").unwrap();
    let store = PgStore::new(&url, 5).await.unwrap();

    let mut ride = Ride::new(Uuid::new_v4(), "FlashHatch".into());
    ride.accept(Uuid::new_v4()).unwrap();
    ride.start().unwrap();
    store.insert_ride(&ride).await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let finished = uow
        .transition_ride_to_finished(ride.id, dec!(36.00), Utc::now())
        .await
        .unwrap();
    uow.credit_wallet(finished.driver_id.unwrap(), dec!(28.80))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let wallet = store.find_wallet(ride.driver_id.unwrap()).await.unwrap();
    assert_eq!(wallet.balance, dec!(28.80));

    let mut uow = store.begin().await.unwrap();
    let err = uow
        .transition_ride_to_finished(ride.id, dec!(36.00), Utc::now())
        .await
        .unwrap_err();
    assert!(err.is_not_found_error());
}
