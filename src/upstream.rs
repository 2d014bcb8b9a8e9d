//! Forwarding client for the upstream memory worker.
//!
//! Responses are relayed with their status code intact. Bodies are parsed as
//! JSON when possible, wrapped as `{"raw": <text>}` when not, and become `{}`
//! when empty. Only transport failures (connection refused, timeout, ...)
//! surface as errors.

use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::GatewayResult;
use crate::models::UpstreamResponse;

/// Worker endpoints the gateway depends on.
pub mod paths {
    pub const HEALTH: &str = "/api/health";
    pub const SEARCH: &str = "/api/search";
    pub const TIMELINE: &str = "/api/timeline";
    pub const OBSERVATIONS_BATCH: &str = "/api/observations/batch";
    pub const MEMORY_SAVE: &str = "/api/memory/save";
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    base_url: String,
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> GatewayResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: builder.build()?,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> GatewayResult<Self> {
        Self::new(config.base_url(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}{path}?{params}`. Repeated keys are sent as given.
    pub async fn get(&self, path: &str, params: &[(String, String)]) -> GatewayResult<UpstreamResponse> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).query(params).send().await?;
        read_response(response).await
    }

    /// `POST {base}{path}` with a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> GatewayResult<UpstreamResponse> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;
        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> GatewayResult<UpstreamResponse> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    Ok(UpstreamResponse {
        status,
        body: parse_body(&text),
    })
}

/// Parses an upstream body: JSON if valid, `{"raw": text}` if not, `{}` if empty.
pub fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// Flattens a JSON object into query pairs.
///
/// `null` and empty-string values are skipped; arrays become repeated keys.
pub fn to_query_pairs(data: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in data {
        match value {
            Value::Null => {}
            Value::String(s) if s.is_empty() => {}
            Value::Array(items) => {
                for item in items {
                    pairs.push((key.clone(), scalar_text(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_text(other))),
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
