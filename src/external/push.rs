use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Notifier;
use crate::error::{notification_error, upstream_error, Error};

#[derive(Clone, Debug, Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
struct PushTicket {
    status: String,
    message: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct Response {
    data: PushTicket,
}

/// Sends notifications through an Expo-compatible push HTTP API.
#[derive(Clone, Debug)]
pub struct PushNotifier {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl PushNotifier {
    pub fn new(api_base: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            api_key,
        }
    }

    fn url(&self) -> String {
        format!("https://{}/--/api/v2/push/send", self.api_base)
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    #[tracing::instrument(skip(self))]
    async fn notify(&self, address: &str, title: &str, body: &str) -> Result<(), Error> {
        let message = PushMessage {
            to: address,
            title,
            body,
            sound: "default",
        };

        let mut req = self.client.post(self.url()).json(&message);

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let res = req.send().await?;

        let status_code = res.status().as_u16();

        if status_code >= 400 && status_code < 500 {
            tracing::warn!(status_code, "push request rejected");
            return Err(notification_error());
        } else if status_code != 200 {
            return Err(upstream_error());
        }

        let data: Response = res.json().await?;

        if data.data.status != "ok" {
            tracing::warn!(message = ?data.data.message, "push ticket rejected");
            return Err(notification_error());
        }

        Ok(())
    }
}

#[test]
fn push_url_uses_api_base() {
    let notifier = PushNotifier::new("exp.host".into(), None);

    assert_eq!(notifier.url(), "https://exp.host/--/api/v2/push/send");
}

#[test]
fn push_ticket_parses() {
    let data: Response = serde_json::from_str(
        r#"{"data": {"status": "error", "message": "\"ExponentPushToken[x]\" is not a registered push notification recipient"}}"#,
    )
    .unwrap();

    assert_eq!(data.data.status, "error");
    assert!(data.data.message.is_some());
}
