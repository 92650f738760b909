use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::api::{ChatMessage, ChatRequest, ModelsResponse, PullRequest};
use crate::core::error::AppError;
use crate::utils::url::construct_api_url;

pub type ByteChunk = Result<Vec<u8>, reqwest::Error>;
pub type ByteStream = BoxStream<'static, ByteChunk>;

/// HTTP access to the inference daemon.
#[derive(Clone, Debug)]
pub struct TransportClient {
    client: reqwest::Client,
    base_url: String,
}

impl TransportClient {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
        })
    }

    pub async fn list_models(&self) -> Result<ModelsResponse, AppError> {
        let response = self
            .client
            .get(construct_api_url(&self.base_url, "api/tags"))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response
            .json::<ModelsResponse>()
            .await
            .map_err(|err| AppError::Protocol(format!("invalid model listing: {err}")))
    }

    pub async fn chat_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<ByteStream, AppError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages,
            stream: true,
        };
        let response = self
            .client
            .post(construct_api_url(&self.base_url, "api/chat"))
            .json(&request)
            .send()
            .await?;
        Ok(byte_stream(ensure_success(response).await?))
    }

    pub async fn pull_stream(&self, model: &str) -> Result<ByteStream, AppError> {
        let request = PullRequest {
            model: model.to_string(),
            stream: true,
        };
        let response = self
            .client
            .post(construct_api_url(&self.base_url, "api/pull"))
            .json(&request)
            .send()
            .await?;
        Ok(byte_stream(ensure_success(response).await?))
    }
}

fn byte_stream(response: reqwest::Response) -> ByteStream {
    response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
        .boxed()
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(AppError::Daemon {
        status: Some(status.as_u16()),
        message: extract_error_message(&body),
    })
}

/// Pull the `error` field out of a daemon error body, falling back to the
/// collapsed body text.
pub fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let summary = value
            .get("error")
            .and_then(|error| match error {
                serde_json::Value::String(text) => Some(text.clone()),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
            .or_else(|| value.get("message").and_then(|m| m.as_str().map(str::to_owned)));
        if let Some(summary) = summary {
            return summary.split_whitespace().collect::<Vec<_>>().join(" ");
        }
    }
    if trimmed.is_empty() {
        "<empty>".to_string()
    } else {
        trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
