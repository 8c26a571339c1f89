use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::AiConfig;
use crate::error::ProviderError;

/// A hosted prompt service that runs named flows on JSON input.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn run_flow(&self, flow: &str, input: Value) -> Result<Value, ProviderError>;
}

/// Posts flow input as JSON to `{endpoint}/{flow}` and returns the response
/// body. One attempt, no retries.
#[derive(Debug, Clone)]
pub struct HttpGenerationProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGenerationProvider {
    pub fn new(config: &AiConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn flow_url(&self, flow: &str) -> String {
        format!("{}/{}", self.endpoint, flow)
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn run_flow(&self, flow: &str, input: Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(self.flow_url(flow))
            .json(&input)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
