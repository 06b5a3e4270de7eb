//! Configuration types.

use std::time::Duration;

/// Digest run configuration.
///
/// Batch sizes and the execution budget mirror the limits the hosted cron
/// endpoint runs under; the per-topic caps bound digest size.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Topics fetched concurrently per batch.
    pub fetch_batch_size: usize,
    /// Emails sent concurrently per batch.
    pub send_batch_size: usize,
    /// Pause between send batches (SMTP rate limiting).
    pub send_batch_delay: Duration,
    /// Articles per INSERT when persisting new articles.
    pub store_batch_size: usize,
    /// Wall-clock budget for a whole run, checked at phase boundaries.
    pub max_run_time: Duration,
    /// Raw results requested from the provider per topic.
    pub max_results_per_topic: usize,
    /// Articles kept per topic after the recency filter.
    pub max_articles_per_topic: usize,
    /// Recency filter: keep articles published within this many hours.
    pub recency_window_hours: i64,
    /// Per-subscriber outcomes included in the run summary.
    pub summary_preview_limit: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            fetch_batch_size: 5,
            send_batch_size: 10,
            send_batch_delay: Duration::from_secs(1),
            store_batch_size: 50,
            max_run_time: Duration::from_secs(8 * 60), // 8 minutes
            max_results_per_topic: 10,
            max_articles_per_topic: 3,
            recency_window_hours: 24,
            summary_preview_limit: 10,
        }
    }
}
