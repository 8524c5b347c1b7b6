// Clash API: the remote authority that reports existing bookings a request would overcommit

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{build_http_client, ApiError, ClientError};
use crate::clash_query::ClashQuery;
use crate::config::ClientConfig;

// One conflicting booking as reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClashRecord {
    pub equipment_name: String,
    pub booking_id: u64,
    pub booking_user: String,
    pub booking_activity: String,
    pub booking_starts: DateTime<FixedOffset>,
    pub booking_ends: DateTime<FixedOffset>,
    pub you_quantity: u32,
    pub clash_quantity: u32,
    pub total_quantity: u32,
    // Total minus capacity; negative when the item is overcommitted
    pub net_quantity: i64,
}

#[async_trait]
pub trait ClashAuthority: Send + Sync {
    // Exactly one request per call; an empty result means no conflicts
    async fn check(&self, query: &ClashQuery) -> Result<Vec<ClashRecord>, ApiError>;
}

#[derive(Debug, Default, Clone)]
pub struct ClashApiStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_timeout: usize,
    pub malformed_responses: usize,
    pub clashes_reported: usize,
    pub average_response_time_ms: f64,
}

pub struct HttpClashAuthority {
    config: ClientConfig,
    http: reqwest::Client,
    stats: Mutex<ClashApiStats>,
}

impl HttpClashAuthority {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = build_http_client(&config)?;
        Ok(Self {
            config,
            http,
            stats: Mutex::new(ClashApiStats::default()),
        })
    }

    pub fn stats(&self) -> ClashApiStats {
        self.stats.lock().clone()
    }

    pub fn request_url(&self, query: &ClashQuery) -> Result<reqwest::Url, ApiError> {
        let mut url = self
            .config
            .endpoint(&self.config.clash_path)
            .map_err(|e| ApiError::ClientError(e.to_string()))?;
        url.query_pairs_mut().extend_pairs(query.to_pairs());
        Ok(url)
    }

    async fn fetch(&self, url: reqwest::Url) -> Result<Vec<ClashRecord>, ApiError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.config.timeout_ms))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.config.timeout_ms))?;

        parse_clash_response(status, &body)
    }

    fn record(&self, result: &Result<Vec<ClashRecord>, ApiError>, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut stats = self.stats.lock();
        stats.requests_sent += 1;
        stats.average_response_time_ms = (stats.average_response_time_ms
            * (stats.requests_sent - 1) as f64
            + elapsed_ms)
            / stats.requests_sent as f64;

        match result {
            Ok(records) => {
                stats.requests_succeeded += 1;
                stats.clashes_reported += records.len();
            }
            Err(err) => {
                stats.requests_failed += 1;
                match err {
                    ApiError::Timeout(_) => stats.requests_timeout += 1,
                    ApiError::MalformedResponse(_) => stats.malformed_responses += 1,
                    _ => {}
                }
            }
        }
    }
}

#[async_trait]
impl ClashAuthority for HttpClashAuthority {
    async fn check(&self, query: &ClashQuery) -> Result<Vec<ClashRecord>, ApiError> {
        let url = self.request_url(query)?;
        debug!(%url, items = query.items.len(), "requesting clash check");

        let started = Instant::now();
        let result = self.fetch(url).await;
        self.record(&result, started);

        match &result {
            Ok(records) => info!(clashes = records.len(), "clash check answered"),
            Err(err) => warn!(error = %err, "clash check failed"),
        }
        result
    }
}

// Non-success statuses are transport failures; a success body that is not a clash list is malformed
pub fn parse_clash_response(status: u16, body: &[u8]) -> Result<Vec<ClashRecord>, ApiError> {
    if !(200..300).contains(&status) {
        return Err(ApiError::from_status(status, body));
    }

    // The server encodes an empty list as null
    serde_json::from_slice::<Option<Vec<ClashRecord>>>(body)
        .map(Option::unwrap_or_default)
        .map_err(|e| ApiError::MalformedResponse(e.to_string()))
}
