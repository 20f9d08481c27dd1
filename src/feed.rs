// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

//! Transit data records and the remote sources they are fetched from.
//!
//! Records follow the TDX metro API layout so that remote responses and the
//! local fallback files decode into the same types.

use crate::config::SourceConfig;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalizedName {
    #[serde(rename = "Zh_tw")]
    pub zh_tw: String,
    #[serde(rename = "En", default)]
    pub en: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StationRecord {
    pub sequence: i32,
    #[serde(rename = "StationID")]
    pub station_id: String,
    pub station_name: LocalizedName,
    #[serde(default)]
    pub cumulative_distance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LineRecord {
    #[serde(default)]
    pub line_no: String,
    #[serde(rename = "LineID", default)]
    pub line_id: String,
    pub stations: Vec<StationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StationPosition {
    #[serde(default)]
    pub position_lon: f64,
    #[serde(default)]
    pub position_lat: f64,
    pub geo_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LocationRecord {
    #[serde(rename = "StationID", default)]
    pub station_id: String,
    pub station_name: LocalizedName,
    pub station_position: StationPosition,
}

/// Mission sheet entry keyed by station name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MissionInfo {
    pub mission: String,
    pub exit: String,
    pub difficult: i32,
    pub tips: String,
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("source reported an error: {0}")]
    ErrorPayload(String),
    #[error("unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Anything that can hand back the JSON document behind a dataset url.
#[allow(async_fn_in_trait)]
pub trait TransitFeed {
    async fn fetch(&self, url: &str) -> Result<Value, SourceError>;
}

/// Turns a raw response into records, rejecting the `{"message": ...}` shape
/// the API uses when it refuses a request.
pub fn decode_records<T: DeserializeOwned>(payload: Value) -> Result<Vec<T>, SourceError> {
    if let Some(message) = payload.get("message") {
        let message = match message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(SourceError::ErrorPayload(message));
    }

    Ok(serde_json::from_value(payload)?)
}

pub struct HttpFeed {
    client: reqwest::Client,
}

impl HttpFeed {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
            ),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client })
    }
}

impl TransitFeed for HttpFeed {
    async fn fetch(&self, url: &str) -> Result<Value, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        // rate limiting comes back as a non-2xx status with a json message body
        match response.json::<Value>().await {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
            Err(e) => Err(SourceError::Http(e)),
        }
    }
}
