pub mod fare;
pub mod scheduled;
pub mod split;

mod settlement;

use std::sync::Arc;

use crate::{
    api::{QuoteAPI, API},
    config::Config,
    db::{PgStore, SettlementStore},
    entities::{RideQuote, RideQuoteRequest, ScheduledFareQuote},
    error::{config_error, Error},
    external::{push::PushNotifier, LogNotifier, Notifier},
    tariff::TariffTable,
};

pub struct Engine {
    store: Arc<dyn SettlementStore>,
    notifier: Arc<dyn Notifier>,
    tariffs: TariffTable,
}

impl Engine {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        notifier: Arc<dyn Notifier>,
        tariffs: TariffTable,
    ) -> Result<Self, Error> {
        if tariffs.categories.is_empty() {
            return Err(config_error("tariff categories"));
        }

        Ok(Self {
            store,
            notifier,
            tariffs,
        })
    }

    #[tracing::instrument(name = "Engine::from_config", skip_all)]
    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let store = PgStore::new(&config.database_url, config.max_connections).await?;

        let notifier: Arc<dyn Notifier> = match &config.push_api_base {
            Some(api_base) => Arc::new(PushNotifier::new(
                api_base.clone(),
                config.push_api_key.clone(),
            )),
            None => {
                tracing::warn!("PUSH_API_BASE not set, driver notifications will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Self::new(Arc::new(store), notifier, TariffTable::default())
    }
}

impl QuoteAPI for Engine {
    fn quote_ride(&self, request: &RideQuoteRequest) -> RideQuote {
        fare::quote_ride(&self.tariffs, request)
    }

    fn quote_scheduled_ride(&self, distance_km: f64) -> Result<ScheduledFareQuote, Error> {
        scheduled::estimate_scheduled_fare(&self.tariffs.scheduled, distance_km)
    }
}

impl API for Engine {}
