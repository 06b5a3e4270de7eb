//! libSQL backend — async `Storage` trait implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 text, times of day as `HH:MM:SS`, and delivery article id
//! lists as JSON arrays.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params, params_from_iter};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{
    Article, Cadence, DeliveryLog, NewSubscriber, PlanTier, Subscriber, SubscriberPatch,
    SubscriberTopic, SubscriberWithTopics, Topic,
};
use crate::store::migrations;
use crate::store::traits::Storage;

/// libSQL storage backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibsqlStorage {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibsqlStorage {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StorageError::Pool(format!("Failed to create connection: {e}")))?;

        let storage = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(storage.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(storage)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StorageError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StorageError::Pool(format!("Failed to create connection: {e}")))?;

        let storage = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(storage.conn()).await?;
        Ok(storage)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Try SQLite datetime() output with fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    // Try SQLite datetime() output without fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

/// Parse a stored `HH:MM:SS` time of day.
fn parse_send_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S").ok()
}

fn format_send_time(t: NaiveTime) -> String {
    t.format("%H:%M:%S").to_string()
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

/// `?` placeholder list for a dynamic `IN (...)` clause.
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Map an execute error, promoting UNIQUE violations to `Constraint`.
fn map_execute_err(op: &str, e: libsql::Error) -> StorageError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        StorageError::Constraint(format!("{op}: {msg}"))
    } else {
        StorageError::Query(format!("{op}: {msg}"))
    }
}

/// Column order matches SUBSCRIBER_COLUMNS.
fn row_to_subscriber(row: &libsql::Row) -> Result<Subscriber, libsql::Error> {
    let plan_str: String = row.get(3)?;
    let is_admin: i64 = row.get(4)?;
    let cadence_str: String = row.get(5)?;
    let last_sent_str: Option<String> = row.get(6).ok();
    let send_time_str: Option<String> = row.get(7).ok();
    let created_str: String = row.get(8)?;

    Ok(Subscriber {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        plan: plan_str.parse().unwrap_or(PlanTier::Free),
        is_admin: is_admin != 0,
        cadence: cadence_str.parse().unwrap_or(Cadence::Daily),
        last_sent: parse_optional_datetime(&last_sent_str),
        preferred_send_time: send_time_str.as_deref().and_then(parse_send_time),
        created_at: parse_datetime(&created_str),
    })
}

/// Column order matches TOPIC_COLUMNS.
fn row_to_topic(row: &libsql::Row) -> Result<Topic, libsql::Error> {
    let created_str: String = row.get(2)?;
    Ok(Topic {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_datetime(&created_str),
    })
}

/// Column order matches the join in `list_subscriber_topics`.
fn row_to_subscriber_topic(row: &libsql::Row) -> Result<SubscriberTopic, libsql::Error> {
    let created_str: String = row.get(3)?;
    Ok(SubscriberTopic {
        subscriber_id: row.get(0)?,
        topic_id: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_datetime(&created_str),
    })
}

/// Column order matches ARTICLE_COLUMNS.
fn row_to_article(row: &libsql::Row) -> Result<Article, libsql::Error> {
    let published_str: String = row.get(9)?;
    let created_str: String = row.get(10)?;

    Ok(Article {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        title: row.get(2)?,
        normalized_title: row.get(3)?,
        snippet: row.get(4)?,
        url: row.get(5)?,
        normalized_url: row.get(6)?,
        domain: row.get(7)?,
        source: row.get(8)?,
        published_at: parse_datetime(&published_str),
        created_at: parse_datetime(&created_str),
    })
}

/// Column order matches DELIVERY_COLUMNS.
fn row_to_delivery(row: &libsql::Row) -> Result<DeliveryLog, libsql::Error> {
    let sent_str: String = row.get(2)?;
    let articles_json: String = row.get(3)?;
    let success: i64 = row.get(4)?;

    Ok(DeliveryLog {
        id: row.get(0)?,
        subscriber_id: row.get(1)?,
        sent_at: parse_datetime(&sent_str),
        article_ids: serde_json::from_str(&articles_json).unwrap_or_default(),
        success: success != 0,
    })
}

// ── Trait implementation ────────────────────────────────────────────

const SUBSCRIBER_COLUMNS: &str =
    "id, email, name, plan, is_admin, delivery_schedule, last_sent, preferred_send_time, created_at";

const TOPIC_COLUMNS: &str = "id, name, created_at";

const ARTICLE_COLUMNS: &str = "id, topic_id, title, normalized_title, snippet, url, normalized_url, domain, source, published_date, created_at";

const DELIVERY_COLUMNS: &str = "id, subscriber_id, sent_date, articles_sent, success";

#[async_trait]
impl Storage for LibsqlStorage {
    // ── Subscribers ─────────────────────────────────────────────────

    async fn create_subscriber(&self, new: NewSubscriber) -> Result<Subscriber, StorageError> {
        let conn = self.conn();
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO subscribers (id, email, name, plan, is_admin, delivery_schedule, preferred_send_time, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.clone(),
                new.email.clone(),
                new.name.clone(),
                new.plan.to_string(),
                0i64,
                new.cadence.to_string(),
                opt_text_owned(new.preferred_send_time.map(format_send_time)),
                created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| map_execute_err("create_subscriber", e))?;

        debug!(subscriber_id = %id, email = %new.email, "Subscriber created");
        Ok(Subscriber {
            id,
            email: new.email,
            name: new.name,
            plan: new.plan,
            is_admin: false,
            cadence: new.cadence,
            last_sent: None,
            preferred_send_time: new.preferred_send_time,
            created_at,
        })
    }

    async fn get_subscriber(&self, id: &str) -> Result<Option<Subscriber>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("get_subscriber: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let subscriber = row_to_subscriber(&row)
                    .map_err(|e| StorageError::Query(format!("get_subscriber row parse: {e}")))?;
                Ok(Some(subscriber))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get_subscriber: {e}"))),
        }
    }

    async fn get_subscriber_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Subscriber>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| StorageError::Query(format!("get_subscriber_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let subscriber = row_to_subscriber(&row).map_err(|e| {
                    StorageError::Query(format!("get_subscriber_by_email row parse: {e}"))
                })?;
                Ok(Some(subscriber))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get_subscriber_by_email: {e}"))),
        }
    }

    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers ORDER BY created_at DESC"),
                (),
            )
            .await
            .map_err(|e| StorageError::Query(format!("list_subscribers: {e}")))?;

        let mut subscribers = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_subscriber(&row) {
                Ok(subscriber) => subscribers.push(subscriber),
                Err(e) => {
                    tracing::warn!("Skipping subscriber row: {e}");
                }
            }
        }
        Ok(subscribers)
    }

    async fn update_subscriber(
        &self,
        id: &str,
        patch: SubscriberPatch,
    ) -> Result<Subscriber, StorageError> {
        let current =
            self.get_subscriber(id)
                .await?
                .ok_or_else(|| StorageError::NotFound {
                    entity: "subscriber".to_string(),
                    id: id.to_string(),
                })?;

        let updated = Subscriber {
            id: current.id,
            email: current.email,
            name: patch.name.unwrap_or(current.name),
            plan: patch.plan.unwrap_or(current.plan),
            is_admin: current.is_admin,
            cadence: patch.cadence.unwrap_or(current.cadence),
            last_sent: patch.last_sent.or(current.last_sent),
            preferred_send_time: patch.preferred_send_time.or(current.preferred_send_time),
            created_at: current.created_at,
        };

        let conn = self.conn();
        conn.execute(
            "UPDATE subscribers SET name = ?1, plan = ?2, delivery_schedule = ?3, last_sent = ?4, preferred_send_time = ?5 WHERE id = ?6",
            params![
                updated.name.clone(),
                updated.plan.to_string(),
                updated.cadence.to_string(),
                opt_text_owned(updated.last_sent.map(|d| d.to_rfc3339())),
                opt_text_owned(updated.preferred_send_time.map(format_send_time)),
                id,
            ],
        )
        .await
        .map_err(|e| StorageError::Query(format!("update_subscriber: {e}")))?;

        debug!(subscriber_id = %id, "Subscriber updated");
        Ok(updated)
    }

    async fn delete_subscriber(&self, id: &str) -> Result<(), StorageError> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM subscriber_topics WHERE subscriber_id = ?1",
            params![id],
        )
        .await
        .map_err(|e| StorageError::Query(format!("delete_subscriber links: {e}")))?;

        conn.execute("DELETE FROM subscribers WHERE id = ?1", params![id])
            .await
            .map_err(|e| StorageError::Query(format!("delete_subscriber: {e}")))?;

        debug!(subscriber_id = %id, "Subscriber deleted");
        Ok(())
    }

    // ── Topics ──────────────────────────────────────────────────────

    async fn create_topic(&self, name: &str) -> Result<Topic, StorageError> {
        let conn = self.conn();
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO topics (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id.clone(), name, created_at.to_rfc3339()],
        )
        .await
        .map_err(|e| map_execute_err("create_topic", e))?;

        debug!(topic_id = %id, name = %name, "Topic created");
        Ok(Topic {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    async fn get_topic(&self, id: &str) -> Result<Option<Topic>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("get_topic: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let topic = row_to_topic(&row)
                    .map_err(|e| StorageError::Query(format!("get_topic row parse: {e}")))?;
                Ok(Some(topic))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get_topic: {e}"))),
        }
    }

    async fn get_topic_by_name(&self, name: &str) -> Result<Option<Topic>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE name = ?1"),
                params![name],
            )
            .await
            .map_err(|e| StorageError::Query(format!("get_topic_by_name: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let topic = row_to_topic(&row)
                    .map_err(|e| StorageError::Query(format!("get_topic_by_name row parse: {e}")))?;
                Ok(Some(topic))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get_topic_by_name: {e}"))),
        }
    }

    async fn list_topics(&self) -> Result<Vec<Topic>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {TOPIC_COLUMNS} FROM topics ORDER BY name ASC"),
                (),
            )
            .await
            .map_err(|e| StorageError::Query(format!("list_topics: {e}")))?;

        let mut topics = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_topic(&row) {
                Ok(topic) => topics.push(topic),
                Err(e) => {
                    tracing::warn!("Skipping topic row: {e}");
                }
            }
        }
        Ok(topics)
    }

    async fn rename_topic(&self, id: &str, name: &str) -> Result<Topic, StorageError> {
        let current = self
            .get_topic(id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "topic".to_string(),
                id: id.to_string(),
            })?;

        let conn = self.conn();
        conn.execute(
            "UPDATE topics SET name = ?1 WHERE id = ?2",
            params![name, id],
        )
        .await
        .map_err(|e| map_execute_err("rename_topic", e))?;

        Ok(Topic {
            name: name.to_string(),
            ..current
        })
    }

    async fn delete_topic(&self, id: &str) -> Result<(), StorageError> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM subscriber_topics WHERE topic_id = ?1",
            params![id],
        )
        .await
        .map_err(|e| StorageError::Query(format!("delete_topic links: {e}")))?;

        conn.execute("DELETE FROM topics WHERE id = ?1", params![id])
            .await
            .map_err(|e| StorageError::Query(format!("delete_topic: {e}")))?;

        debug!(topic_id = %id, "Topic deleted");
        Ok(())
    }

    // ── Subscriber ↔ topic links ────────────────────────────────────

    async fn add_subscriber_topic(
        &self,
        subscriber_id: &str,
        topic_id: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO subscriber_topics (subscriber_id, topic_id, created_at) VALUES (?1, ?2, ?3)",
            params![subscriber_id, topic_id, Utc::now().to_rfc3339()],
        )
        .await
        .map_err(|e| StorageError::Query(format!("add_subscriber_topic: {e}")))?;
        Ok(())
    }

    async fn remove_subscriber_topic(
        &self,
        subscriber_id: &str,
        topic_id: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM subscriber_topics WHERE subscriber_id = ?1 AND topic_id = ?2",
            params![subscriber_id, topic_id],
        )
        .await
        .map_err(|e| StorageError::Query(format!("remove_subscriber_topic: {e}")))?;
        Ok(())
    }

    async fn list_subscriber_topics(&self) -> Result<Vec<SubscriberTopic>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT st.subscriber_id, st.topic_id, t.name, st.created_at
                 FROM subscriber_topics st
                 JOIN topics t ON t.id = st.topic_id
                 ORDER BY st.created_at ASC",
                (),
            )
            .await
            .map_err(|e| StorageError::Query(format!("list_subscriber_topics: {e}")))?;

        let mut links = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_subscriber_topic(&row) {
                Ok(link) => links.push(link),
                Err(e) => {
                    tracing::warn!("Skipping subscriber topic row: {e}");
                }
            }
        }
        Ok(links)
    }

    async fn subscribers_with_topics(&self) -> Result<Vec<SubscriberWithTopics>, StorageError> {
        let subscribers = self.list_subscribers().await?;
        let links = self.list_subscriber_topics().await?;

        let mut topics_by_subscriber: HashMap<String, Vec<Topic>> = HashMap::new();
        for link in links {
            topics_by_subscriber
                .entry(link.subscriber_id.clone())
                .or_default()
                .push(Topic {
                    id: link.topic_id,
                    name: link.name,
                    created_at: link.created_at,
                });
        }

        Ok(subscribers
            .into_iter()
            .map(|subscriber| {
                let topics = topics_by_subscriber
                    .remove(&subscriber.id)
                    .unwrap_or_default();
                SubscriberWithTopics { subscriber, topics }
            })
            .collect())
    }

    // ── Articles ────────────────────────────────────────────────────

    async fn add_article(&self, article: &Article) -> Result<(), StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO articles (id, topic_id, title, normalized_title, snippet, url, normalized_url, domain, source, published_date, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                article.id.clone(),
                article.topic_id.clone(),
                article.title.clone(),
                article.normalized_title.clone(),
                article.snippet.clone(),
                article.url.clone(),
                article.normalized_url.clone(),
                article.domain.clone(),
                article.source.clone(),
                article.published_at.to_rfc3339(),
                article.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| StorageError::Query(format!("add_article: {e}")))?;

        debug!(article_id = %article.id, "Article inserted");
        Ok(())
    }

    async fn add_articles(&self, articles: &[Article]) -> Result<(), StorageError> {
        for article in articles {
            self.add_article(article).await?;
        }
        if !articles.is_empty() {
            debug!(count = articles.len(), "Article batch inserted");
        }
        Ok(())
    }

    async fn get_article(&self, id: &str) -> Result<Option<Article>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("get_article: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let article = row_to_article(&row)
                    .map_err(|e| StorageError::Query(format!("get_article row parse: {e}")))?;
                Ok(Some(article))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get_article: {e}"))),
        }
    }

    async fn find_article_by_title_or_url(
        &self,
        title: &str,
        normalized_url: &str,
    ) -> Result<Option<Article>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE title = ?1 OR normalized_url = ?2 LIMIT 1"
                ),
                params![title, normalized_url],
            )
            .await
            .map_err(|e| StorageError::Query(format!("find_article_by_title_or_url: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let article = row_to_article(&row).map_err(|e| {
                    StorageError::Query(format!("find_article_by_title_or_url row parse: {e}"))
                })?;
                Ok(Some(article))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!(
                "find_article_by_title_or_url: {e}"
            ))),
        }
    }

    async fn find_articles_by_title_or_url(
        &self,
        titles: &[String],
        normalized_urls: &[String],
    ) -> Result<Vec<Article>, StorageError> {
        if titles.is_empty() && normalized_urls.is_empty() {
            return Ok(Vec::new());
        }

        // `IN ()` is invalid SQL, so build only the non-empty clauses.
        let mut clauses = Vec::new();
        if !titles.is_empty() {
            clauses.push(format!("title IN ({})", placeholders(titles.len())));
        }
        if !normalized_urls.is_empty() {
            clauses.push(format!(
                "normalized_url IN ({})",
                placeholders(normalized_urls.len())
            ));
        }
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {} ORDER BY published_date DESC",
            clauses.join(" OR ")
        );

        let values = titles.iter().cloned().chain(normalized_urls.iter().cloned());

        let conn = self.conn();
        let mut rows = conn
            .query(&sql, params_from_iter(values))
            .await
            .map_err(|e| StorageError::Query(format!("find_articles_by_title_or_url: {e}")))?;

        let mut articles = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_article(&row) {
                Ok(article) => articles.push(article),
                Err(e) => {
                    tracing::warn!("Skipping article row: {e}");
                }
            }
        }
        Ok(articles)
    }

    async fn list_articles(&self, limit: usize) -> Result<Vec<Article>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY published_date DESC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(|e| StorageError::Query(format!("list_articles: {e}")))?;

        let mut articles = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_article(&row) {
                Ok(article) => articles.push(article),
                Err(e) => {
                    tracing::warn!("Skipping article row: {e}");
                }
            }
        }
        Ok(articles)
    }

    async fn delete_article(&self, id: &str) -> Result<(), StorageError> {
        let conn = self.conn();
        conn.execute("DELETE FROM articles WHERE id = ?1", params![id])
            .await
            .map_err(|e| StorageError::Query(format!("delete_article: {e}")))?;
        Ok(())
    }

    // ── Delivery logs ───────────────────────────────────────────────

    async fn log_delivery(&self, log: &DeliveryLog) -> Result<(), StorageError> {
        let articles_json = serde_json::to_string(&log.article_ids)
            .map_err(|e| StorageError::Serialization(format!("log_delivery: {e}")))?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO delivery_logs (id, subscriber_id, sent_date, articles_sent, success) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                log.id.clone(),
                log.subscriber_id.clone(),
                log.sent_at.to_rfc3339(),
                articles_json,
                log.success as i64,
            ],
        )
        .await
        .map_err(|e| StorageError::Query(format!("log_delivery: {e}")))?;

        debug!(subscriber_id = %log.subscriber_id, success = log.success, "Delivery logged");
        Ok(())
    }

    async fn list_deliveries(&self, subscriber_id: &str) -> Result<Vec<DeliveryLog>, StorageError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {DELIVERY_COLUMNS} FROM delivery_logs WHERE subscriber_id = ?1 ORDER BY sent_date DESC"
                ),
                params![subscriber_id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("list_deliveries: {e}")))?;

        let mut logs = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_delivery(&row) {
                Ok(log) => logs.push(log),
                Err(e) => {
                    tracing::warn!("Skipping delivery row: {e}");
                }
            }
        }
        Ok(logs)
    }
}
