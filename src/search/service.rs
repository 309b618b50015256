use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::params::SearchRequest;
use crate::config::{Config, WGS84_SRID};
use crate::dedup::deduplicate;
use crate::engine::{EngineError, PlaceIndex, SearchHit};
use crate::format::{FormattedResult, format_hits};
use crate::query::{QueryBuilder, QueryParams, ShouldMatch};

/// Which side of the strict → loose fallback produced a hit list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Strict,
    Loose,
}

impl Pass {
    fn should_match(self) -> ShouldMatch {
        match self {
            Self::Strict => ShouldMatch::All,
            Self::Loose => ShouldMatch::Any,
        }
    }

    /// The pass to retry with after an empty result, if any.
    pub fn widen(self) -> Option<Self> {
        match self {
            Self::Strict => Some(Self::Loose),
            Self::Loose => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("search cancelled")]
    Cancelled,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub pass: Pass,
    /// Echoed from the request; coordinates are not reprojected.
    pub srid: i32,
    pub results: Vec<FormattedResult>,
}

/// Orchestrates query rendering, the engine round trips, deduplication and formatting.
///
/// Holds no per-request state. Engine calls are bounded by a semaphore shared by all
/// callers of the same service.
pub struct SearchService<I> {
    index: I,
    queries: QueryBuilder,
    timeout: Duration,
    permits: Semaphore,
}

impl<I: PlaceIndex> SearchService<I> {
    pub fn new(index: I, queries: QueryBuilder, config: &Config) -> Self {
        Self {
            index,
            queries,
            timeout: config.timeout,
            permits: Semaphore::new(
                config
                    .max_concurrent_searches
                    .clamp(1, Semaphore::MAX_PERMITS),
            ),
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, ServiceError> {
        self.search_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Strict pass first; one loose retry only when the strict pass found nothing.
    pub async fn search_cancellable(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, ServiceError> {
        debug!(query = %request.text, "search requested");

        let mut pass = Pass::Strict;
        let mut hits = self.run_pass(request, pass, cancel).await?;
        if hits.is_empty()
            && let Some(wider) = pass.widen()
        {
            debug!(from = ?pass, to = ?wider, "no hits, widening search");
            pass = wider;
            hits = self.run_pass(request, pass, cancel).await?;
        }

        if request.srid != WGS84_SRID {
            debug!(srid = request.srid, "srid passed through without reprojection");
        }

        let results = format_hits(&hits, &request.language);
        info!(
            lang = %request.language,
            limit = request.limit,
            pass = ?pass,
            results = results.len(),
            "search complete"
        );

        Ok(SearchOutcome {
            pass,
            srid: request.srid,
            results,
        })
    }

    async fn run_pass(
        &self,
        request: &SearchRequest,
        pass: Pass,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        let query = self.queries.render(&QueryParams {
            text: &request.text,
            lang: request.language.as_str(),
            should_match: pass.should_match(),
            bias: request.bias,
        });
        // Headroom for what deduplication removes.
        let fetch_size = request.limit * 2;

        let raw = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ServiceError::Cancelled),
            result = self.fetch(&query, fetch_size) => result?,
        };

        let fetched = raw.len();
        let top_score = raw.first().and_then(|h| h.score);
        let mut hits = deduplicate(raw);
        hits.truncate(request.limit);
        debug!(
            pass = ?pass,
            fetched,
            kept = hits.len(),
            top_score = ?top_score,
            "pass complete"
        );
        Ok(hits)
    }

    async fn fetch(&self, query: &str, size: usize) -> Result<Vec<SearchHit>, ServiceError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ServiceError::Cancelled)?;
        Ok(self.index.search(query, size, self.timeout).await?)
    }
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::engine::ElasticClient;
    use crate::query::shipped_templates;
    use crate::search::SearchParams;
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn end_to_end_fallback_against_engine() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/photon/_search"))
            .and(body_string_contains("100%"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timed_out": false,
                "hits": {"hits": []}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/photon/_search"))
            .and(body_string_contains("\"minimum_should_match\":-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timed_out": false,
                "hits": {"hits": [
                    {"_id": "1", "_score": 2.0, "_source": {
                        "osm_id": 1000, "category": 3,
                        "name": {"default": "Alexanderplatz"},
                        "city": {"default": "Berlin"},
                        "coordinate": {"lon": 13.4132, "lat": 52.5219},
                        "extent": {"type": "envelope", "coordinates": [[13.42, 52.52], [13.41, 52.53]]}
                    }},
                    {"_id": "2", "_score": 1.0, "_source": {"osm_id": 1001}}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config {
            engine_url: server.uri(),
            ..Default::default()
        };
        let index = ElasticClient::new(Client::new(), &config).unwrap();
        let svc = SearchService::new(index, shipped_templates(), &config);
        let request = SearchParams {
            q: Some("alexanderplatz berlin".into()),
            lang: Some("en".into()),
            ..Default::default()
        }
        .into_request(&config)
        .unwrap();

        let outcome = svc.search(&request).await.unwrap();

        assert_eq!(outcome.pass, Pass::Loose);
        let body = serde_json::to_value(&outcome.results).unwrap();
        assert_eq!(
            body,
            json!([{
                "category": 3,
                "poi_id": "g8",
                "name": "Alexanderplatz, Berlin",
                "point": {"x": 13.4132, "y": 52.5219},
                "extent": [{"x": 13.41, "y": 52.52}, {"x": 13.42, "y": 52.53}],
                "addressEntry": {"city": "Berlin"}
            }])
        );
    }
}
