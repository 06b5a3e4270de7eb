//! Article retrieval through the Serper web-search API.
//!
//! `SearchProvider` is the seam: the real `SerperClient` posts a JSON
//! query, tests swap in a canned provider. `ArticleFetcher` wraps a
//! provider and turns raw organic results into `CandidateArticle`s,
//! degrading to an empty list when a topic's search fails so one bad
//! query cannot sink a whole digest run.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::dates;
use crate::dedup::{extract_domain, normalize_title, normalize_url};
use crate::error::SearchError;
use crate::model::CandidateArticle;

pub const SERPER_BASE_URL: &str = "https://google.serper.dev/search";

/// One organic result as the provider returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    pub date: Option<String>,
}

/// A response without `organic` is malformed, not empty.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    organic: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
    gl: &'a str,
    hl: &'a str,
    tbs: &'a str,
}

// ── Provider ────────────────────────────────────────────────────────

/// Web search behind the fetcher.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Up to `max_results` organic results for a query.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError>;
}

/// Serper.dev client. Queries are pinned to US English results from
/// the last day.
pub struct SerperClient {
    http: reqwest::Client,
    api_key: secrecy::SecretString,
    base_url: String,
}

impl SerperClient {
    pub fn new(api_key: secrecy::SecretString) -> Self {
        Self::with_base_url(api_key, SERPER_BASE_URL)
    }

    /// Point the client somewhere else, mainly for tests.
    pub fn with_base_url(api_key: secrecy::SecretString, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for SerperClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        // Ask for double to survive thin result pages, capped at the
        // provider's sweet spot of 10.
        let request = SearchRequest {
            q: query,
            num: (max_results * 2).min(10),
            gl: "us",
            hl: "en",
            tbs: "qdr:d",
        };

        let response = self
            .http
            .post(&self.base_url)
            .header("X-API-KEY", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| SearchError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        let mut results = parsed.organic;
        results.truncate(max_results);
        Ok(results)
    }
}

// ── Fetcher ─────────────────────────────────────────────────────────

/// Turns topic names into candidate articles via the search provider.
#[derive(Clone)]
pub struct ArticleFetcher {
    provider: Arc<dyn SearchProvider>,
}

impl ArticleFetcher {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Search one topic and map results to candidates. Provider
    /// failures are logged and come back as an empty list.
    pub async fn fetch_topic_articles(
        &self,
        topic_name: &str,
        topic_id: &str,
        max_results: usize,
    ) -> Vec<CandidateArticle> {
        let query = format!("Latest news articles about {topic_name} in the last 24 hours");
        debug!(topic = topic_name, "Fetching articles");

        match self.provider.search(&query, max_results).await {
            Ok(results) => {
                let articles: Vec<CandidateArticle> = results
                    .into_iter()
                    .map(|result| to_candidate(result, topic_id))
                    .collect();
                info!(
                    topic = topic_name,
                    count = articles.len(),
                    "Fetched articles"
                );
                articles
            }
            Err(err) => {
                error!(topic = topic_name, error = %err, "Article fetch failed");
                Vec::new()
            }
        }
    }
}

fn to_candidate(result: SearchResult, topic_id: &str) -> CandidateArticle {
    let domain = extract_domain(&result.link);
    let published_at = match result.date.as_deref() {
        Some(text) => dates::resolve(text),
        None => Utc::now(),
    };

    CandidateArticle {
        topic_id: topic_id.to_string(),
        normalized_title: normalize_title(&result.title),
        normalized_url: normalize_url(&result.link),
        source: domain.clone(),
        domain,
        snippet: result.snippet,
        url: result.link,
        title: result.title,
        published_at,
    }
}

/// Candidates inside the recency window, newest first, capped at
/// `limit`.
pub fn recent_top(
    mut candidates: Vec<CandidateArticle>,
    window_hours: i64,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<CandidateArticle> {
    candidates.retain(|c| dates::elapsed_between(now, c.published_at).hours <= window_hours);
    candidates.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    struct CannedProvider {
        results: Vec<SearchResult>,
    }

    #[async_trait]
    impl SearchProvider for CannedProvider {
        async fn search(
            &self,
            _query: &str,
            max_results: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            let mut results = self.results.clone();
            results.truncate(max_results);
            Ok(results)
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl SearchProvider for FailingProvider {
        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            Err(SearchError::Status { status: 429 })
        }
    }

    fn result(title: &str, link: &str, date: Option<&str>) -> SearchResult {
        SearchResult {
            title: title.into(),
            link: link.into(),
            snippet: format!("About {title}"),
            date: date.map(Into::into),
        }
    }

    #[tokio::test]
    async fn maps_results_to_candidates() {
        let provider = CannedProvider {
            results: vec![result(
                "Rust 2.0 Shipped!",
                "https://WWW.Example.com/Rust-2",
                Some("4 hours ago"),
            )],
        };
        let fetcher = ArticleFetcher::new(Arc::new(provider));

        let candidates = fetcher.fetch_topic_articles("rust", "t1", 10).await;
        assert_eq!(candidates.len(), 1);

        let c = &candidates[0];
        assert_eq!(c.topic_id, "t1");
        assert_eq!(c.title, "Rust 2.0 Shipped!");
        assert_eq!(c.normalized_title, "rust 20 shipped");
        assert_eq!(c.url, "https://WWW.Example.com/Rust-2");
        assert_eq!(c.normalized_url, "https://www.example.com/rust-2");
        assert_eq!(c.domain, "example.com");
        assert_eq!(c.source, "example.com");

        let age = Utc::now().signed_duration_since(c.published_at).num_seconds();
        assert!((age - 4 * 3600).abs() <= 2, "published ~4h ago, got {age}s");
    }

    #[tokio::test]
    async fn missing_date_defaults_to_now() {
        let provider = CannedProvider {
            results: vec![result("Undated", "https://example.com/u", None)],
        };
        let fetcher = ArticleFetcher::new(Arc::new(provider));

        let candidates = fetcher.fetch_topic_articles("rust", "t1", 10).await;
        let age = Utc::now()
            .signed_duration_since(candidates[0].published_at)
            .num_seconds();
        assert!(age.abs() <= 2);
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_empty() {
        let fetcher = ArticleFetcher::new(Arc::new(FailingProvider));
        let candidates = fetcher.fetch_topic_articles("rust", "t1", 10).await;
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn respects_max_results() {
        let provider = CannedProvider {
            results: (0..8)
                .map(|i| result(&format!("Story {i}"), &format!("https://example.com/{i}"), None))
                .collect(),
        };
        let fetcher = ArticleFetcher::new(Arc::new(provider));

        let candidates = fetcher.fetch_topic_articles("rust", "t1", 3).await;
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn response_without_organic_is_an_error() {
        let err = serde_json::from_str::<SearchResponse>(r#"{"credits": 1}"#);
        assert!(err.is_err());

        let ok = serde_json::from_str::<SearchResponse>(
            r#"{"organic": [{"title": "T", "link": "https://e.com/a", "snippet": "s"}]}"#,
        )
        .unwrap();
        assert_eq!(ok.organic.len(), 1);
        assert!(ok.organic[0].date.is_none());
    }

    #[test]
    fn recent_top_filters_sorts_and_caps() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 0, 0).unwrap();
        let candidate = |id: &str, hours_old: i64| CandidateArticle {
            topic_id: "t1".into(),
            title: id.into(),
            normalized_title: id.into(),
            snippet: String::new(),
            url: format!("https://example.com/{id}"),
            normalized_url: format!("https://example.com/{id}"),
            domain: "example.com".into(),
            source: "example.com".into(),
            published_at: now - Duration::hours(hours_old),
        };

        let picked = recent_top(
            vec![
                candidate("stale", 30),
                candidate("old", 20),
                candidate("fresh", 2),
                candidate("mid", 10),
                candidate("older", 23),
            ],
            24,
            3,
            now,
        );

        let titles: Vec<&str> = picked.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh", "mid", "old"]);
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 0, 0).unwrap();
        let exact = CandidateArticle {
            topic_id: "t1".into(),
            title: "exactly 24h".into(),
            normalized_title: "exactly 24h".into(),
            snippet: String::new(),
            url: "https://example.com/x".into(),
            normalized_url: "https://example.com/x".into(),
            domain: "example.com".into(),
            source: "example.com".into(),
            published_at: now - Duration::hours(24),
        };

        assert_eq!(recent_top(vec![exact], 24, 3, now).len(), 1);
    }
}
