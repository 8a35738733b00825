//! HTTP client for the remote backend agent.
//!
//! Posts the raw query to `{base_url}/agent` under a bounded deadline and
//! returns a tagged outcome: the reply text, a timeout, a non-success
//! status, or a transport fault. The deadline cancels the request itself,
//! so no connection outlives it; whether the eventual fallback result is
//! applied is still the generation guard's call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use cradle_core::config::AgentConfig;

use crate::error::AgentError;
use crate::strategy::RemoteAgent;

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    query: &'a str,
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct AgentResponse {
    response: String,
}

/// reqwest-backed implementation of [`RemoteAgent`].
pub struct HttpAgent {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpAgent {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
        }
    }

    fn classify(&self, err: reqwest::Error) -> AgentError {
        if err.is_timeout() {
            AgentError::Timeout(self.timeout_ms)
        } else {
            AgentError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl RemoteAgent for HttpAgent {
    async fn ask(&self, query: &str, user_id: &str) -> Result<String, AgentError> {
        let url = format!("{}/agent", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&AgentRequest { query, user_id })
            .timeout(Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Status(status.as_u16()));
        }

        let body: AgentResponse = response.json().await.map_err(|e| self.classify(e))?;
        Ok(body.response)
    }
}
