use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::Serialize;

use crate::constants::{PKG_VERSION, SDK_NAME};
use crate::errors::ClientError;
use crate::errors::ErrorKind::{self, MetricsFailure, RegistrationFailure};
use crate::metrics::MetricsBucket;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Registration<'a> {
    app_name: &'a str,
    instance_id: &'a str,
    sdk_version: String,
    strategies: &'a [String],
    started: DateTime<Utc>,
    interval: u128,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsReport<'a> {
    app_name: &'a str,
    instance_id: &'a str,
    bucket: &'a MetricsBucket,
}

/// Posts client registration and usage metrics to the backend.
pub struct Reporter {
    register_url: Url,
    metrics_url: Url,
    app_name: String,
    instance_id: String,
    http_client: reqwest::Client,
}

impl Reporter {
    pub fn new(
        register_url: Url,
        metrics_url: Url,
        app_name: &str,
        instance_id: &str,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            register_url,
            metrics_url,
            app_name: app_name.to_owned(),
            instance_id: instance_id.to_owned(),
            http_client,
        }
    }

    pub async fn register(
        &self,
        strategies: &[String],
        started: DateTime<Utc>,
        interval_ms: u128,
    ) -> Result<(), ClientError> {
        let body = Registration {
            app_name: &self.app_name,
            instance_id: &self.instance_id,
            sdk_version: format!("{SDK_NAME}:{PKG_VERSION}"),
            strategies,
            started,
            interval: interval_ms,
        };
        self.post(&self.register_url, &body, RegistrationFailure, "register the client")
            .await
    }

    pub async fn send_metrics(&self, bucket: &MetricsBucket) -> Result<(), ClientError> {
        let body = MetricsReport {
            app_name: &self.app_name,
            instance_id: &self.instance_id,
            bucket,
        };
        self.post(&self.metrics_url, &body, MetricsFailure, "send usage metrics")
            .await
    }

    async fn post<T: Serialize>(
        &self,
        url: &Url,
        body: &T,
        kind: ErrorKind,
        action: &str,
    ) -> Result<(), ClientError> {
        let json = match serde_json::to_string(body) {
            Ok(json) => json,
            Err(err) => {
                let msg = format!("Failed to {action}. Could not serialize the request. {err}");
                warn!(event_id = kind.as_u16(); "{}", msg);
                return Err(ClientError::new(kind, msg));
            }
        };
        let result = self
            .http_client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(json)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Succeeded to {action}");
                Ok(())
            }
            Ok(response) => {
                let msg = format!(
                    "Failed to {action}. Status code: {}",
                    response.status().as_u16()
                );
                warn!(event_id = kind.as_u16(); "{}", msg);
                Err(ClientError::new(kind, msg))
            }
            Err(err) => {
                let msg = format!("Failed to {action}. {err}");
                warn!(event_id = kind.as_u16(); "{}", msg);
                Err(ClientError::new(kind, msg))
            }
        }
    }
}
