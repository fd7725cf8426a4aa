//! Email notifications through an HTTP mail relay.

use async_trait::async_trait;
use docketwatch_core::{CollabError, Notifier};
use serde::Serialize;
use tracing::info;

use crate::http::{HttpSettings, SyncError, ensure_success};

/// Posts `{from, to, subject, text}` to the relay's send endpoint.
pub struct EmailRelayNotifier {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    from: String,
    to: Vec<String>,
}

#[derive(Serialize)]
struct Message<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

impl EmailRelayNotifier {
    pub fn new(settings: &HttpSettings, from: String, to: Vec<String>) -> Result<Self, SyncError> {
        Ok(Self {
            client: settings.client()?,
            url: format!("{}/send", settings.trimmed_base()),
            token: settings.token.clone(),
            from,
            to,
        })
    }

    pub async fn send(&self, subject: &str, text: &str) -> Result<(), SyncError> {
        if self.to.is_empty() {
            return Err(SyncError::Unavailable("email recipients".into()));
        }
        let message = Message {
            from: &self.from,
            to: &self.to,
            subject,
            text,
        };
        let mut req = self.client.post(&self.url).json(&message);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        ensure_success(req.send().await?).await?;
        info!(subject, recipients = self.to.len(), "notification sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailRelayNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), CollabError> {
        Ok(self.send(subject, body).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_shape() {
        let to = vec!["docket@example.test".to_string()];
        let json = serde_json::to_value(Message {
            from: "bot@example.test",
            to: &to,
            subject: "New document",
            text: "body",
        })
        .unwrap();
        assert_eq!(json["to"][0], "docket@example.test");
        assert_eq!(json["subject"], "New document");
    }

    #[tokio::test]
    async fn no_recipients_is_unavailable() {
        let notifier = EmailRelayNotifier::new(
            &HttpSettings::new("http://127.0.0.1:9"),
            "bot@example.test".into(),
            Vec::new(),
        )
        .unwrap();
        let err = notifier.send("s", "b").await.unwrap_err();
        assert!(matches!(err, SyncError::Unavailable(_)));
        let err = notifier.notify("s", "b").await.unwrap_err();
        assert!(matches!(err, CollabError::Unavailable(_)));
    }
}
