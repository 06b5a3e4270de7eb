//! Backend-agnostic `Storage` trait — single async interface for all
//! persistence: subscribers, topics, articles, and delivery logs.
//!
//! Lookups return `Ok(None)` when nothing matches; `Err` is reserved for
//! real storage failures. Updates on missing rows return
//! [`StorageError::NotFound`].

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{
    Article, DeliveryLog, NewSubscriber, Subscriber, SubscriberPatch, SubscriberTopic,
    SubscriberWithTopics, Topic,
};

/// Persistence surface the digest engine runs against.
#[async_trait]
pub trait Storage: Send + Sync {
    // ── Subscribers ─────────────────────────────────────────────────

    /// Insert a new subscriber with a generated id. Email must be unique.
    async fn create_subscriber(&self, new: NewSubscriber) -> Result<Subscriber, StorageError>;

    /// Get a subscriber by id.
    async fn get_subscriber(&self, id: &str) -> Result<Option<Subscriber>, StorageError>;

    /// Look up a subscriber by email address.
    async fn get_subscriber_by_email(&self, email: &str)
    -> Result<Option<Subscriber>, StorageError>;

    /// All subscribers, newest first.
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, StorageError>;

    /// Apply a partial update and return the updated subscriber.
    /// `None` fields in the patch keep their current value.
    async fn update_subscriber(
        &self,
        id: &str,
        patch: SubscriberPatch,
    ) -> Result<Subscriber, StorageError>;

    /// Delete a subscriber and its topic links.
    async fn delete_subscriber(&self, id: &str) -> Result<(), StorageError>;

    // ── Topics ──────────────────────────────────────────────────────

    /// Insert a new topic with a generated id. Name must be unique.
    async fn create_topic(&self, name: &str) -> Result<Topic, StorageError>;

    /// Get a topic by id.
    async fn get_topic(&self, id: &str) -> Result<Option<Topic>, StorageError>;

    /// Look up a topic by its exact name.
    async fn get_topic_by_name(&self, name: &str) -> Result<Option<Topic>, StorageError>;

    /// All topics, alphabetical.
    async fn list_topics(&self) -> Result<Vec<Topic>, StorageError>;

    /// Rename a topic and return the updated row.
    async fn rename_topic(&self, id: &str, name: &str) -> Result<Topic, StorageError>;

    /// Delete a topic and its subscriber links.
    async fn delete_topic(&self, id: &str) -> Result<(), StorageError>;

    // ── Subscriber ↔ topic links ────────────────────────────────────

    /// Link a subscriber to a topic. Linking twice is a no-op.
    async fn add_subscriber_topic(
        &self,
        subscriber_id: &str,
        topic_id: &str,
    ) -> Result<(), StorageError>;

    /// Remove a subscriber's link to a topic.
    async fn remove_subscriber_topic(
        &self,
        subscriber_id: &str,
        topic_id: &str,
    ) -> Result<(), StorageError>;

    /// All links joined with topic names.
    async fn list_subscriber_topics(&self) -> Result<Vec<SubscriberTopic>, StorageError>;

    /// All subscribers, each carrying its subscribed topics.
    /// Subscribers without topics are included with an empty list.
    async fn subscribers_with_topics(&self) -> Result<Vec<SubscriberWithTopics>, StorageError>;

    // ── Articles ────────────────────────────────────────────────────

    /// Insert a single article.
    async fn add_article(&self, article: &Article) -> Result<(), StorageError>;

    /// Insert a batch of articles.
    async fn add_articles(&self, articles: &[Article]) -> Result<(), StorageError>;

    /// Get an article by id.
    async fn get_article(&self, id: &str) -> Result<Option<Article>, StorageError>;

    /// First stored article whose title or normalized URL matches.
    async fn find_article_by_title_or_url(
        &self,
        title: &str,
        normalized_url: &str,
    ) -> Result<Option<Article>, StorageError>;

    /// All stored articles matching any of the given titles or
    /// normalized URLs. The deduplication lookup for a whole fetch pass.
    async fn find_articles_by_title_or_url(
        &self,
        titles: &[String],
        normalized_urls: &[String],
    ) -> Result<Vec<Article>, StorageError>;

    /// Most recently published articles, up to `limit`.
    async fn list_articles(&self, limit: usize) -> Result<Vec<Article>, StorageError>;

    /// Delete an article by id.
    async fn delete_article(&self, id: &str) -> Result<(), StorageError>;

    // ── Delivery logs ───────────────────────────────────────────────

    /// Append a delivery outcome. Logs are never updated or deleted.
    async fn log_delivery(&self, log: &DeliveryLog) -> Result<(), StorageError>;

    /// Delivery history for one subscriber, newest first.
    async fn list_deliveries(&self, subscriber_id: &str) -> Result<Vec<DeliveryLog>, StorageError>;
}
