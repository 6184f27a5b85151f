pub mod push;

use async_trait::async_trait;

use crate::error::Error;

/// Best-effort delivery of a message to a registered device address.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, address: &str, title: &str, body: &str) -> Result<(), Error>;
}

/// Notifier for deployments without a push service: messages are only logged.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    #[tracing::instrument(skip(self))]
    async fn notify(&self, address: &str, title: &str, body: &str) -> Result<(), Error> {
        tracing::info!("push delivery disabled, notification logged only");

        Ok(())
    }
}
