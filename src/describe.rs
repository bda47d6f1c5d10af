use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde_json::{Value as JsonValue, json};
use std::time::Duration;

use crate::error::ReportError;

/// An image ready to be attached to a description request.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub mime: String,
    pub data: String,
}

impl EncodedImage {
    #[must_use]
    pub fn new(mime: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime: mime.into(),
            data: B64.encode(bytes),
        }
    }
}

/// Client for the multimodal `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct DescriptionClient {
    http: reqwest::Client,
    pub base: String,
    token: String,
    pub model: String,
    pub timeout: Duration,
}

impl DescriptionClient {
    #[must_use]
    pub fn new(base: String, token: String, model: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            token,
            model,
            timeout,
        }
    }

    /// Ask a single question about `image` and return the trimmed answer.
    ///
    /// # Errors
    ///
    /// `Service` if the request fails, the status is not a success or the body
    /// is not JSON; `EmptyResponse` if no candidate text came back.
    pub async fn ask(&self, image: &EncodedImage, question: &str) -> Result<String, ReportError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base.trim_end_matches('/'),
            self.model
        );

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": question },
                    { "inline_data": { "mime_type": image.mime, "data": image.data } }
                ]
            }]
        });

        tracing::debug!(model = %self.model, question, "asking description service");

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-goog-api-key", &self.token)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ReportError::Service(format!(
                "HTTP {status}: {}",
                preview(&text)
            )));
        }

        let envelope: JsonValue = serde_json::from_str(&text).map_err(|e| {
            ReportError::Service(format!("invalid response body ({e}): {}", preview(&text)))
        })?;

        extract_answer(&envelope)
    }
}

/// Pull the first candidate's text out of a `generateContent` response.
/// Multiple text parts are concatenated.
///
/// # Errors
///
/// `EmptyResponse` if there is no candidate or its text is blank.
pub fn extract_answer(envelope: &JsonValue) -> Result<String, ReportError> {
    let parts = envelope
        .pointer("/candidates/0/content/parts")
        .and_then(JsonValue::as_array)
        .ok_or(ReportError::EmptyResponse)?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(JsonValue::as_str))
        .collect();

    let answer = text.trim();
    if answer.is_empty() {
        return Err(ReportError::EmptyResponse);
    }
    Ok(answer.to_string())
}

fn preview(s: &str) -> String {
    s.chars().take(500).collect()
}
