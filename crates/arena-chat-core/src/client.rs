//! Transport to the inference endpoint.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::Credential;
use crate::config::ChatConfig;
use crate::error::ChatError;

/// Sends one query and returns the undecoded response body.
///
/// Implementations report a non-2xx answer as [`ChatError::HttpStatus`],
/// an unreachable endpoint as [`ChatError::Transport`] and a body that is
/// not JSON as [`ChatError::MalformedResponse`].
pub trait InferenceClient: Send + Sync + 'static {
    fn talk(
        &self,
        input: &str,
        credential: &Credential,
    ) -> impl Future<Output = Result<Value, ChatError>> + Send;
}

#[derive(Debug, Serialize)]
struct TalkRequest<'a> {
    input: &'a str,
}

/// `reqwest`-backed [`InferenceClient`] posting to `{base}ai/talk`.
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    http: reqwest::Client,
    url: String,
}

impl HttpInferenceClient {
    /// Build a client for the full endpoint `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(http, url))
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        Self::new(config.talk_url())
    }

    /// Reuse an existing `reqwest` client (shared pools, custom proxies).
    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl InferenceClient for HttpInferenceClient {
    async fn talk(&self, input: &str, credential: &Credential) -> Result<Value, ChatError> {
        debug!(url = %self.url, input_len = input.len(), "posting chat query");
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(credential.token())
            .json(&TalkRequest { input })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| ChatError::MalformedResponse(format!("body is not JSON: {e}")))
    }
}
