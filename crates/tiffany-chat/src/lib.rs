//! Chat-completion HTTP adapter.
//!
//! Implements the core [`ChatCompletion`] port over a simple JSON API:
//! `POST {url}` with `{"message", "bot_name"}` and a bearer token, answering
//! `{"response": "..."}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tiffany_core::{errors::Error, ports::ChatCompletion, Result};

#[derive(Clone, Debug)]
pub struct ChatApiClient {
    url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    bot_name: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
}

impl ChatApiClient {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            http,
        }
    }
}

#[async_trait]
impl ChatCompletion for ChatApiClient {
    async fn complete(&self, message: &str, bot_name: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { message, bot_name })
            .send()
            .await
            .map_err(|e| Error::External(format!("chat api request error: {e}")))?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "chat api returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("chat api read error: {e}")))?;
        let reply = parse_reply(&body)?;
        tracing::debug!(has_reply = reply.is_some(), "chat api answered");
        Ok(reply)
    }
}

fn parse_reply(body: &str) -> Result<Option<String>> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    Ok(parsed
        .response
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_response_field() {
        assert_eq!(
            parse_reply(r#"{"response": " ¡Hola! "}"#).unwrap().as_deref(),
            Some("¡Hola!")
        );
    }

    #[test]
    fn missing_or_blank_response_is_none() {
        assert_eq!(parse_reply(r#"{"other": 1}"#).unwrap(), None);
        assert_eq!(parse_reply(r#"{"response": "   "}"#).unwrap(), None);
        assert_eq!(parse_reply(r#"{"response": null}"#).unwrap(), None);
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(parse_reply("<html>").is_err());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_external_error() {
        let client = ChatApiClient::new("http://127.0.0.1:9/chat", "k", reqwest::Client::new());
        let err = client.complete("hola", "Tiffany").await.unwrap_err();
        assert!(matches!(err, Error::External(_)));
    }
}
