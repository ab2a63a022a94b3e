//! Generation service over HTTP.

use async_trait::async_trait;
use tracing::debug;

use postforge_scheduler::{
    GenerationError, GenerationOutcome, GenerationRequest, GenerationService,
};

/// Calls a remote generation endpoint.
pub struct HttpGenerationService {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpGenerationService {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Use a preconfigured client (proxies, TLS, timeouts).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        debug!(job_id = request.job_id, run_id = %request.run_id, "Calling generation service");

        let response = builder
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| GenerationError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
