//! Operator notifications.
//!
//! Both the engine and reconciliation talk to a [`Notifier`] only through
//! [`Alerts`], whose methods return `()`: a failed delivery is logged and
//! never changes what either component does next.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::NotificationConfig;
use crate::error::{GamedayError, Result};

pub trait Notifier: Send + Sync {
    fn warning(&self, title: &str, message: &str, details: &Value) -> Result<()>;
    fn error(&self, title: &str, message: &str, details: &Value) -> Result<()>;
}

/// Build the notifier named by `config.notifications`.
pub fn from_config(config: &NotificationConfig, timeout: Duration) -> Result<Box<dyn Notifier>> {
    Ok(match config {
        NotificationConfig::None => Box::new(NoopNotifier),
        NotificationConfig::Log => Box::new(LogNotifier),
        NotificationConfig::Webhook { url } => Box::new(WebhookNotifier::new(url, timeout)?),
    })
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn warning(&self, _title: &str, _message: &str, _details: &Value) -> Result<()> {
        Ok(())
    }

    fn error(&self, _title: &str, _message: &str, _details: &Value) -> Result<()> {
        Ok(())
    }
}

/// Renders alerts into the process log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warning(&self, title: &str, message: &str, details: &Value) -> Result<()> {
        tracing::warn!(title, %details, "{message}");
        Ok(())
    }

    fn error(&self, title: &str, message: &str, details: &Value) -> Result<()> {
        tracing::error!(title, %details, "{message}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    source: &'static str,
    level: &'static str,
    title: &'a str,
    message: &'a str,
    details: &'a Value,
}

/// POSTs each alert as JSON to a fixed URL.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    fn post(
        &self,
        level: &'static str,
        title: &str,
        message: &str,
        details: &Value,
    ) -> Result<()> {
        let payload = WebhookPayload {
            source: "gameday",
            level,
            title,
            message,
            details,
        };
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| GamedayError::Notify(format!("POST {}: {e}", self.url)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GamedayError::Notify(format!(
                "POST {} returned {status}",
                self.url
            )));
        }
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn warning(&self, title: &str, message: &str, details: &Value) -> Result<()> {
        self.post("warning", title, message, details)
    }

    fn error(&self, title: &str, message: &str, details: &Value) -> Result<()> {
        self.post("error", title, message, details)
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Best-effort wrapper around a notifier.
pub struct Alerts {
    inner: Box<dyn Notifier>,
}

impl Alerts {
    pub fn new(inner: Box<dyn Notifier>) -> Self {
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(NoopNotifier))
    }

    pub fn warning(&self, title: &str, message: &str, details: &Value) {
        if let Err(e) = self.inner.warning(title, message, details) {
            tracing::warn!(title, error = %e, "failed to deliver warning notification");
        }
    }

    pub fn error(&self, title: &str, message: &str, details: &Value) {
        if let Err(e) = self.inner.error(title, message, details) {
            tracing::warn!(title, error = %e, "failed to deliver error notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Failing;

    impl Notifier for Failing {
        fn warning(&self, _: &str, _: &str, _: &Value) -> Result<()> {
            Err(GamedayError::Notify("down".into()))
        }

        fn error(&self, _: &str, _: &str, _: &Value) -> Result<()> {
            Err(GamedayError::Notify("down".into()))
        }
    }

    #[test]
    fn alerts_swallow_delivery_failures() {
        let alerts = Alerts::new(Box::new(Failing));
        alerts.warning("t", "m", &json!({}));
        alerts.error("t", "m", &json!({}));
    }

    #[test]
    fn webhook_posts_json_payload() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJson(json!({
                "source": "gameday",
                "level": "error",
                "title": "ABORT box-scores",
                "details": {"workflow": "box-scores"}
            })))
            .with_status(204)
            .create();

        let url = format!("{}/hook", server.url());
        let notifier = WebhookNotifier::new(&url, Duration::from_secs(5)).unwrap();
        notifier
            .error("ABORT box-scores", "boom", &json!({"workflow": "box-scores"}))
            .unwrap();
        mock.assert();
    }

    #[test]
    fn webhook_error_status_is_reported() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("POST", "/hook").with_status(500).create();
        let url = format!("{}/hook", server.url());
        let notifier = WebhookNotifier::new(&url, Duration::from_secs(5)).unwrap();
        let err = notifier.warning("t", "m", &json!(null)).unwrap_err();
        assert!(matches!(err, GamedayError::Notify(_)));
    }

    #[test]
    fn config_selects_implementation() {
        let n = from_config(&NotificationConfig::None, Duration::from_secs(1)).unwrap();
        assert!(n.warning("t", "m", &json!({})).is_ok());
    }
}
