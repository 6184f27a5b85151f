use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::split::{checked_amount, split};
use super::Engine;
use crate::{
    api::SettlementAPI,
    db::UnitOfWork,
    entities::{NewPayment, Payment, PaymentMethod, Ride, Settlement, SettlementReceipt, Wallet},
    error::{not_settleable_error, Error},
};

#[async_trait]
impl SettlementAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn finish_ride(
        &self,
        id: Uuid,
        final_amount: Decimal,
        method: PaymentMethod,
    ) -> Result<SettlementReceipt, Error> {
        let final_amount = checked_amount(final_amount)?;
        let settlement = split(final_amount)?;

        let mut uow = self.store.begin().await?;

        let settled = settle(uow.as_mut(), id, final_amount, settlement, method).await;

        let (ride, payment, balance) = match settled {
            Ok(settled) => settled,
            Err(err) => {
                tracing::warn!(error = %err, "settlement failed, rolling back");

                if let Err(rollback_err) = uow.rollback().await {
                    tracing::error!(error = %rollback_err, "failed to roll back settlement");
                }

                return Err(err);
            }
        };

        uow.commit().await?;

        tracing::info!(
            transaction_id = %payment.transaction_id,
            driver_amount = %payment.driver_amount,
            platform_amount = %payment.platform_amount,
            "ride settled"
        );

        self.notify_driver(&payment).await;

        Ok(SettlementReceipt {
            ride,
            wallet: Wallet {
                driver_id: payment.driver_id,
                balance,
            },
            payment,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, id: Uuid) -> Result<Ride, Error> {
        self.store.find_ride(id).await
    }

    #[tracing::instrument(skip(self))]
    async fn find_wallet(&self, driver_id: Uuid) -> Result<Wallet, Error> {
        self.store.find_wallet(driver_id).await
    }
}

async fn settle(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
    final_amount: Decimal,
    settlement: Settlement,
    method: PaymentMethod,
) -> Result<(Ride, Payment, Decimal), Error> {
    let ride = uow
        .transition_ride_to_finished(id, final_amount, Utc::now())
        .await?;

    let driver_id = ride.driver_id.ok_or_else(|| not_settleable_error())?;

    let payment = uow
        .insert_payment(NewPayment::new(
            ride.id,
            ride.passenger_id,
            driver_id,
            final_amount,
            &settlement,
            method,
        ))
        .await?;

    let balance = uow.credit_wallet(driver_id, payment.driver_amount).await?;

    Ok((ride, payment, balance))
}

impl Engine {
    /// Runs after the settlement committed; failures are logged and dropped.
    #[tracing::instrument(skip_all, fields(driver_id = %payment.driver_id))]
    async fn notify_driver(&self, payment: &Payment) {
        let address = match self
            .store
            .find_notification_address(payment.driver_id)
            .await
        {
            Ok(Some(address)) => address,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "failed to look up notification address");
                return;
            }
        };

        let body = format!(
            "Your ride is finished and {} was credited to your wallet.",
            payment.driver_amount
        );

        if let Err(err) = self.notifier.notify(&address, "Ride finished", &body).await {
            tracing::warn!(error = %err, "failed to notify driver");
        }
    }
}
