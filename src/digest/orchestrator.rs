//! The digest run state machine.
//!
//! One cycle walks Start → LoadSubscribers → SelectDue → FetchPhase →
//! DedupPhase → AssignPhase → SendPhase → Report. A wall-clock budget
//! is checked at phase boundaries; exceeding it short-circuits to a
//! summary flagged `aborted_early`. Storage errors abort the run,
//! provider errors degrade to empty topics, and send errors become
//! per-subscriber outcomes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::batch;
use crate::config::DigestConfig;
use crate::error::{Error, Result};
use crate::fetch::{self, ArticleFetcher};
use crate::mailer::EmailTransport;
use crate::model::{Article, CandidateArticle, DeliveryLog, SubscriberPatch, SubscriberWithTopics};
use crate::render;
use crate::schedule;
use crate::store::Storage;

use super::types::{RunSummary, SchedulePreview, SendOutcome};

/// Runs digest cycles against injected collaborators.
pub struct DigestOrchestrator {
    config: DigestConfig,
    store: Arc<dyn Storage>,
    fetcher: ArticleFetcher,
    mailer: Arc<dyn EmailTransport>,
}

impl DigestOrchestrator {
    pub fn new(
        config: DigestConfig,
        store: Arc<dyn Storage>,
        fetcher: ArticleFetcher,
        mailer: Arc<dyn EmailTransport>,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            mailer,
        }
    }

    /// Run one full digest cycle and report what happened.
    pub async fn run_cycle(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let now = Utc::now();
        info!("Starting digest run");

        // LoadSubscribers
        let all = self.store.subscribers_with_topics().await?;
        let total_subscribers = all.len();

        // SelectDue
        let due = schedule::select_due(all, now);
        let due_count = due.len();
        info!(
            due = due_count,
            total = total_subscribers,
            "Selected due subscribers"
        );

        if due.is_empty() {
            return Ok(RunSummary {
                success: true,
                message: Some("No subscribers due for digest".to_string()),
                total_subscribers,
                due_subscribers: 0,
                successful: 0,
                failed: 0,
                execution_time: started.elapsed().as_millis() as u64,
                aborted_early: false,
                schedule_info: Vec::new(),
                email_results: Vec::new(),
            });
        }

        let schedule_info: Vec<SchedulePreview> =
            due.iter().map(|entry| preview_entry(entry, now)).collect();

        if self.over_budget(started) {
            warn!("Approaching execution time limit, stopping early");
            return Ok(self.aborted_summary(started, total_subscribers, due_count, schedule_info));
        }

        // FetchPhase
        let (topics, topic_subscribers) = topic_index(&due);
        let candidates = self.fetch_candidates(topics, now).await?;

        // DedupPhase
        let articles = self.resolve_articles(candidates, now).await?;

        // AssignPhase
        let mut pending = assign_articles(&due, &articles, &topic_subscribers);

        if self.over_budget(started) {
            warn!("Approaching execution time limit, stopping early");
            return Ok(self.aborted_summary(started, total_subscribers, due_count, schedule_info));
        }

        // SendPhase
        let items: Vec<(SubscriberWithTopics, Vec<Article>)> = due
            .into_iter()
            .map(|entry| {
                let assigned = pending.remove(&entry.subscriber.id).unwrap_or_default();
                (entry, assigned)
            })
            .collect();

        let outcomes = self.send_digests(items, now).await?;

        // Report
        let successful = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - successful;
        let execution_time = started.elapsed().as_millis() as u64;
        info!(
            successful,
            failed,
            execution_time_ms = execution_time,
            "Digest run completed"
        );

        let mut email_results = outcomes;
        email_results.truncate(self.config.summary_preview_limit);

        Ok(RunSummary {
            success: true,
            message: None,
            total_subscribers,
            due_subscribers: due_count,
            successful,
            failed,
            execution_time,
            aborted_early: false,
            schedule_info,
            email_results,
        })
    }

    fn over_budget(&self, started: Instant) -> bool {
        started.elapsed() > self.config.max_run_time
    }

    fn aborted_summary(
        &self,
        started: Instant,
        total_subscribers: usize,
        due_subscribers: usize,
        schedule_info: Vec<SchedulePreview>,
    ) -> RunSummary {
        RunSummary {
            success: true,
            message: Some("Stopped early due to time constraints".to_string()),
            total_subscribers,
            due_subscribers,
            successful: 0,
            failed: 0,
            execution_time: started.elapsed().as_millis() as u64,
            aborted_early: true,
            schedule_info,
            email_results: Vec::new(),
        }
    }

    /// Fetch candidates for every topic through the batch runner, then
    /// keep each topic's freshest few.
    async fn fetch_candidates(
        &self,
        topics: Vec<(String, String)>,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateArticle>> {
        let fetcher = self.fetcher.clone();
        let max_results = self.config.max_results_per_topic;
        let window_hours = self.config.recency_window_hours;
        let per_topic = self.config.max_articles_per_topic;

        let per_topic_results = batch::run_in_batches(
            topics,
            self.config.fetch_batch_size,
            Duration::ZERO,
            |(topic_id, topic_name)| {
                let fetcher = fetcher.clone();
                async move {
                    let candidates = fetcher
                        .fetch_topic_articles(&topic_name, &topic_id, max_results)
                        .await;
                    Ok::<_, Error>(fetch::recent_top(candidates, window_hours, per_topic, now))
                }
            },
        )
        .await?;

        Ok(per_topic_results.into_iter().flatten().collect())
    }

    /// Replace known candidates with their stored records and persist
    /// the rest. Stored identity wins, so reruns insert nothing new.
    async fn resolve_articles(
        &self,
        candidates: Vec<CandidateArticle>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let titles: Vec<String> = candidates.iter().map(|c| c.title.clone()).collect();
        let urls: Vec<String> = candidates.iter().map(|c| c.normalized_url.clone()).collect();
        let existing = self
            .store
            .find_articles_by_title_or_url(&titles, &urls)
            .await?;

        let mut resolved = Vec::with_capacity(candidates.len());
        let mut fresh = Vec::new();
        for candidate in candidates {
            let known = existing
                .iter()
                .find(|stored| stored.title == candidate.title && stored.url == candidate.url);
            match known {
                Some(stored) => resolved.push(stored.clone()),
                None => {
                    let article = candidate.into_article(Uuid::new_v4().to_string(), now);
                    fresh.push(article.clone());
                    resolved.push(article);
                }
            }
        }

        info!(
            new = fresh.len(),
            known = resolved.len() - fresh.len(),
            "Resolved fetched articles"
        );

        if !fresh.is_empty() {
            let store = Arc::clone(&self.store);
            let chunks: Vec<Vec<Article>> = fresh
                .chunks(self.config.store_batch_size.max(1))
                .map(|chunk| chunk.to_vec())
                .collect();
            batch::run_in_batches(chunks, 1, Duration::ZERO, |chunk| {
                let store = Arc::clone(&store);
                async move { store.add_articles(&chunk).await }
            })
            .await?;
        }

        Ok(resolved)
    }

    /// Render and send every pending digest through the batch runner.
    async fn send_digests(
        &self,
        items: Vec<(SubscriberWithTopics, Vec<Article>)>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SendOutcome>> {
        let store = Arc::clone(&self.store);
        let mailer = Arc::clone(&self.mailer);

        batch::run_in_batches(
            items,
            self.config.send_batch_size,
            self.config.send_batch_delay,
            |(entry, articles)| {
                let store = Arc::clone(&store);
                let mailer = Arc::clone(&mailer);
                async move { send_one(store, mailer, entry, articles, now).await }
            },
        )
        .await
    }
}

/// Send one digest and record the outcome.
///
/// Success-path storage writes propagate errors (they abort the run);
/// the failure-path audit log write never does.
async fn send_one(
    store: Arc<dyn Storage>,
    mailer: Arc<dyn EmailTransport>,
    entry: SubscriberWithTopics,
    articles: Vec<Article>,
    now: DateTime<Utc>,
) -> Result<SendOutcome> {
    let SubscriberWithTopics { subscriber, topics } = entry;
    let digest = render::render_digest_at(&topics, &articles, now);

    match mailer.send_digest(&subscriber.email, &digest).await {
        Ok(receipt) => {
            let patch = SubscriberPatch {
                last_sent: Some(now),
                ..Default::default()
            };
            store.update_subscriber(&subscriber.id, patch).await?;

            store
                .log_delivery(&DeliveryLog {
                    id: Uuid::new_v4().to_string(),
                    subscriber_id: subscriber.id.clone(),
                    sent_at: now,
                    article_ids: articles.iter().map(|a| a.id.clone()).collect(),
                    success: true,
                })
                .await?;

            info!(email = %subscriber.email, "Successfully sent digest");
            Ok(SendOutcome {
                subscriber_id: subscriber.id,
                email: subscriber.email,
                success: true,
                message_id: Some(receipt.message_id),
                error: None,
            })
        }
        Err(send_err) => {
            error!(email = %subscriber.email, error = %send_err, "Failed to send digest");
            let log = DeliveryLog {
                id: Uuid::new_v4().to_string(),
                subscriber_id: subscriber.id.clone(),
                sent_at: now,
                article_ids: Vec::new(),
                success: false,
            };
            if let Err(log_err) = store.log_delivery(&log).await {
                error!(error = %log_err, "Failed to log delivery");
            }
            Ok(SendOutcome {
                subscriber_id: subscriber.id,
                email: subscriber.email,
                success: false,
                message_id: None,
                error: Some(send_err.to_string()),
            })
        }
    }
}

fn preview_entry(entry: &SubscriberWithTopics, now: DateTime<Utc>) -> SchedulePreview {
    let subscriber = &entry.subscriber;
    let is_due = schedule::is_due(subscriber, now);
    let is_right_time = schedule::in_send_window(subscriber, now);

    SchedulePreview {
        id: subscriber.id.clone(),
        email: subscriber.email.clone(),
        name: subscriber.name.clone(),
        delivery_schedule: subscriber.cadence,
        last_sent: subscriber.last_sent,
        preferred_send_time: subscriber.preferred_send_time,
        topics_count: entry.topics.len(),
        is_due,
        is_right_time,
        should_send: is_due && is_right_time,
        next_run_time: schedule::next_run_time(subscriber, now),
        default_preferred_time: schedule::effective_send_time(subscriber),
    }
}

/// Unique topics across the due set (first-seen order), plus which due
/// subscribers follow each topic.
fn topic_index(
    due: &[SubscriberWithTopics],
) -> (Vec<(String, String)>, HashMap<String, Vec<String>>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut topics: Vec<(String, String)> = Vec::new();
    let mut subscribers: HashMap<String, Vec<String>> = HashMap::new();

    for entry in due {
        for topic in &entry.topics {
            if seen.insert(topic.id.clone()) {
                topics.push((topic.id.clone(), topic.name.clone()));
            }
            subscribers
                .entry(topic.id.clone())
                .or_default()
                .push(entry.subscriber.id.clone());
        }
    }

    (topics, subscribers)
}

/// Give every due subscriber a pending list (empty lists still get a
/// digest) and route each article to everyone following its topic,
/// skipping ids a subscriber already has.
fn assign_articles(
    due: &[SubscriberWithTopics],
    articles: &[Article],
    topic_subscribers: &HashMap<String, Vec<String>>,
) -> HashMap<String, Vec<Article>> {
    let mut pending: HashMap<String, Vec<Article>> = due
        .iter()
        .map(|entry| (entry.subscriber.id.clone(), Vec::new()))
        .collect();

    for article in articles {
        let Some(subscriber_ids) = topic_subscribers.get(&article.topic_id) else {
            continue;
        };
        for subscriber_id in subscriber_ids {
            if let Some(list) = pending.get_mut(subscriber_id) {
                if !list.iter().any(|a| a.id == article.id) {
                    list.push(article.clone());
                }
            }
        }
    }

    pending
}
