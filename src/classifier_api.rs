//! Remote domain classifier client.
//!
//! Thin JSON POST against the classification proxy. The inference batch
//! treats every failure here as a soft miss, so this client keeps a short
//! timeout and does not retry — a slow classifier must not stall the
//! scheduling flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ScheduleError;
use crate::ports::DomainClassifier;
use crate::types::Domain;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyRequest<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    goal_title: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    domain: Option<String>,
}

/// HTTP-backed [`DomainClassifier`].
#[derive(Debug, Clone)]
pub struct ClassifierApi {
    http: reqwest::Client,
    endpoint: String,
}

impl ClassifierApi {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ScheduleError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScheduleError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl DomainClassifier for ClassifierApi {
    async fn classify(
        &self,
        title: &str,
        goal_title: Option<&str>,
    ) -> Result<Option<Domain>, ScheduleError> {
        let request = ClassifyRequest { title, goal_title };

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScheduleError::Classifier(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScheduleError::Classifier(format!("HTTP {status}")));
        }

        let body: ClassifyResponse = resp
            .json()
            .await
            .map_err(|e| ScheduleError::Classifier(e.to_string()))?;

        // Unknown labels are treated as "no opinion", not errors.
        Ok(body.domain.as_deref().and_then(Domain::parse))
    }
}
