//! Domain records: subscribers, topics, articles, delivery logs.
//!
//! All ids are opaque strings (UUID v4 for rows this engine creates).
//! Timestamps are `DateTime<Utc>` throughout; storage backends decide
//! their own encoding.

use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a subscriber receives a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for Cadence {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!("unknown cadence: {other}")),
        }
    }
}

/// Subscriber plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Pro => write!(f, "pro"),
        }
    }
}

impl FromStr for PlanTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            other => Err(format!("unknown plan tier: {other}")),
        }
    }
}

/// A digest subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    pub name: String,
    pub plan: PlanTier,
    pub is_admin: bool,
    pub cadence: Cadence,
    /// When the last digest was successfully sent. `None` until the first send.
    pub last_sent: Option<DateTime<Utc>>,
    /// Preferred send time of day (UTC). `None` means the 17:00 default.
    pub preferred_send_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a subscriber (id and created_at are storage-assigned).
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub email: String,
    pub name: String,
    pub plan: PlanTier,
    pub cadence: Cadence,
    pub preferred_send_time: Option<NaiveTime>,
}

/// Patch-style update for a subscriber. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SubscriberPatch {
    pub name: Option<String>,
    pub plan: Option<PlanTier>,
    pub cadence: Option<Cadence>,
    pub last_sent: Option<DateTime<Utc>>,
    pub preferred_send_time: Option<NaiveTime>,
}

/// A followed topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A subscriber↔topic link row. Carries the topic name so the join
/// can be built without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberTopic {
    pub subscriber_id: String,
    pub topic_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A subscriber joined with their topic set.
#[derive(Debug, Clone)]
pub struct SubscriberWithTopics {
    pub subscriber: Subscriber,
    pub topics: Vec<Topic>,
}

/// A stored article. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub topic_id: String,
    pub title: String,
    pub normalized_title: String,
    pub snippet: String,
    pub url: String,
    pub normalized_url: String,
    pub domain: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A fetched article before it has a stored identity.
#[derive(Debug, Clone)]
pub struct CandidateArticle {
    pub topic_id: String,
    pub title: String,
    pub normalized_title: String,
    pub snippet: String,
    pub url: String,
    pub normalized_url: String,
    pub domain: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
}

impl CandidateArticle {
    /// Promote a candidate to a stored article with a fresh identity.
    pub fn into_article(self, id: String, created_at: DateTime<Utc>) -> Article {
        Article {
            id,
            topic_id: self.topic_id,
            title: self.title,
            normalized_title: self.normalized_title,
            snippet: self.snippet,
            url: self.url,
            normalized_url: self.normalized_url,
            domain: self.domain,
            source: self.source,
            published_at: self.published_at,
            created_at,
        }
    }
}

/// Audit record of one digest delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLog {
    pub id: String,
    pub subscriber_id: String,
    pub sent_at: DateTime<Utc>,
    pub article_ids: Vec<String>,
    pub success: bool,
}
