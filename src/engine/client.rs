use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::types::{ErrorResponse, PlaceDocument, RawHit, SearchBody, SearchHit, SearchResponse};
use crate::config::{Config, ConfigError};

const MAX_ERROR_SNIPPET: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("search engine timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("search engine error ({code}): {message}")]
    Status { code: u16, message: String },

    #[error("malformed search engine exchange: {0}")]
    Decode(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Ranked lookup against the place index.
/// Implemented by `ElasticClient` for production; in-memory mocks are used in tests.
pub trait PlaceIndex {
    /// Runs a rendered query and returns at most `size` hits in engine relevance order.
    async fn search(
        &self,
        query: &str,
        size: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchHit>, EngineError>;
}

/// HTTP client for an Elasticsearch-compatible `_search` endpoint.
#[derive(Clone)]
pub struct ElasticClient {
    http: Client,
    search_url: Url,
}

impl ElasticClient {
    pub fn new(http: Client, config: &Config) -> Result<Self, ConfigError> {
        let mut search_url = Url::parse(&config.engine_url)?;
        search_url
            .path_segments_mut()
            .map_err(|()| {
                ConfigError::Invalid(format!(
                    "engine URL cannot carry a path: {}",
                    config.engine_url
                ))
            })?
            .pop_if_empty()
            .push(&config.index)
            .push("_search");
        debug!(url = %search_url, "search endpoint configured");
        Ok(Self { http, search_url })
    }
}

impl PlaceIndex for ElasticClient {
    async fn search(
        &self,
        query: &str,
        size: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchHit>, EngineError> {
        let query = serde_json::from_str(query)
            .map_err(|e| EngineError::Decode(format!("rendered query is not JSON: {e}")))?;
        let body = SearchBody {
            query,
            size,
            timeout: format!("{}s", timeout.as_secs().max(1)),
        };

        let response = self
            .http
            .post(self.search_url.clone())
            .header("User-Agent", crate::USER_AGENT)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|e| {
                warn!(status = %status, error = %e, "failed to read error body");
                String::new()
            });
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|body| body.reason())
                .unwrap_or_else(|| {
                    let snippet: String = text.chars().take(MAX_ERROR_SNIPPET).collect();
                    format!("HTTP {status}: {snippet}")
                });
            warn!(status = %status, %message, "search engine error");
            return Err(EngineError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(e, timeout))?;

        if body.timed_out {
            warn!(timeout_s = timeout.as_secs(), "search engine reported timeout");
            return Err(EngineError::Timeout(timeout));
        }

        let raw = body.hits.map(|h| h.hits).unwrap_or_default();
        let hits = decode_hits(raw);
        debug!(hits = hits.len(), size, "engine search complete");
        Ok(hits)
    }
}

fn classify_transport(e: reqwest::Error, timeout: Duration) -> EngineError {
    if e.is_timeout() {
        warn!(timeout_s = timeout.as_secs(), "search engine request timed out");
        EngineError::Timeout(timeout)
    } else if e.is_decode() {
        EngineError::Decode(e.to_string())
    } else {
        EngineError::Network(e)
    }
}

/// Hits whose `_source` does not decode are logged and skipped, keeping the rest.
fn decode_hits(raw: Vec<RawHit>) -> Vec<SearchHit> {
    raw.into_iter()
        .filter_map(|hit| {
            let Some(source) = hit.source else {
                warn!(id = ?hit.id, "skipping hit without _source");
                return None;
            };
            match serde_json::from_value::<PlaceDocument>(source) {
                Ok(document) => Some(SearchHit {
                    score: hit.score,
                    document,
                }),
                Err(e) => {
                    warn!(id = ?hit.id, error = %e, "skipping undecodable hit");
                    None
                }
            }
        })
        .collect()
}
