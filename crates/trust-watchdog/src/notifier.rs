//! Outbound alert delivery.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use trust_core::{Result, Severity, SnapshotDiff, TrustError, WatchdogAlert, WatchdogConfig};

/// JSON body POSTed for each alert.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertPayload<'a> {
    alert_id: &'a str,
    severity: Severity,
    message: &'a str,
    diff: &'a SnapshotDiff,
}

/// Delivers alerts to an HTTP endpoint, or nowhere.
#[derive(Debug, Clone)]
pub enum WebhookNotifier {
    /// POST each alert as JSON to `url`.
    Http { client: reqwest::Client, url: String },

    /// No webhook configured.
    Disabled,
}

impl WebhookNotifier {
    /// Build an HTTP notifier with a request timeout.
    pub fn http(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrustError::webhook(format!("failed to build http client: {}", e)))?;
        Ok(Self::Http {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &WatchdogConfig) -> Result<Self> {
        match config.webhook_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                Self::http(url, Duration::from_secs(config.webhook_timeout_secs))
            }
            _ => Ok(Self::Disabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// Deliver one alert. A disabled notifier succeeds without doing anything.
    pub async fn notify(&self, alert: &WatchdogAlert) -> Result<()> {
        let Self::Http { client, url } = self else {
            return Ok(());
        };

        let body = AlertPayload {
            alert_id: &alert.alert_id,
            severity: alert.severity,
            message: &alert.message,
            diff: &alert.diff,
        };

        let resp = client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TrustError::webhook(format!("failed to post alert to {}: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(TrustError::webhook(format!(
                "{} returned status {}",
                url,
                resp.status()
            )));
        }

        debug!("Delivered alert {} to {}", alert.alert_id, url);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::Value;
    use trust_core::now_utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Start a webhook endpoint at `/alerts` that answers every POST with `status`.
    pub(crate) async fn webhook_server(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    pub(crate) fn alerts_url(server: &MockServer) -> String {
        format!("{}/alerts", server.uri())
    }

    /// JSON bodies of every request the server has seen, in arrival order.
    pub(crate) async fn posted_bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }

    fn alert() -> WatchdogAlert {
        WatchdogAlert {
            alert_id: "01HALERT".to_string(),
            severity: Severity::High,
            message: "Watchdog detected changes: +1 ~0 -0".to_string(),
            diff: SnapshotDiff {
                added: vec!["new.txt".to_string()],
                removed: vec![],
                changed: vec![],
            },
            created_at: now_utc(),
        }
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let notifier = WebhookNotifier::from_config(&WatchdogConfig::default()).unwrap();
        assert!(!notifier.is_enabled());
        notifier.notify(&alert()).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_url_is_disabled() {
        let config = WatchdogConfig {
            webhook_url: Some("  ".to_string()),
            ..WatchdogConfig::default()
        };
        assert!(!WebhookNotifier::from_config(&config).unwrap().is_enabled());
    }

    #[tokio::test]
    async fn test_posts_camel_case_payload() {
        let server = webhook_server(200).await;
        let notifier = WebhookNotifier::http(alerts_url(&server), Duration::from_secs(5)).unwrap();

        notifier.notify(&alert()).await.unwrap();

        let bodies = posted_bodies(&server).await;
        assert_eq!(bodies.len(), 1);
        let body = &bodies[0];
        assert_eq!(body["alertId"], "01HALERT");
        assert_eq!(body["severity"], "high");
        assert_eq!(body["diff"]["added"][0], "new.txt");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = webhook_server(500).await;
        let notifier = WebhookNotifier::http(alerts_url(&server), Duration::from_secs(5)).unwrap();

        let err = notifier.notify(&alert()).await.unwrap_err();
        assert_eq!(err.error_code(), "WEBHOOK_ERROR");
        assert_eq!(posted_bodies(&server).await.len(), 1);
    }
}
