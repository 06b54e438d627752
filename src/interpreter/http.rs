//! HTTP client for the remote command interpreter

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{CommandInterpreter, CommandRequest, CommandResponse};
use crate::error::DispatchError;

/// Talks to `POST {base_url}/process-command`
#[derive(Debug, Clone)]
pub struct HttpInterpreter {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpInterpreter {
    /// Create a client for the interpreter at `base_url`
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server root, e.g. `http://127.0.0.1:8000`
    /// * `timeout` - Per-request timeout applied by the HTTP client
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            timeout,
        }
    }

    /// Endpoint the client posts to
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/process-command", self.base_url)
    }
}

#[async_trait]
impl CommandInterpreter for HttpInterpreter {
    async fn interpret(&self, request: &CommandRequest) -> Result<CommandResponse, DispatchError> {
        let response = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "interpreter request failed");
                if e.is_timeout() {
                    DispatchError::Timeout(self.timeout)
                } else {
                    DispatchError::Network(e)
                }
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received interpreter response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "interpreter error");
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "failed to parse interpreter response");
            DispatchError::Malformed(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = HttpInterpreter::new("http://localhost:8000/", Duration::from_secs(1));
        assert_eq!(client.endpoint(), "http://localhost:8000/process-command");
    }
}
