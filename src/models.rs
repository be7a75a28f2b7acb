//! Data models for scraped articles, notes and the user aggregate.
//!
//! This module defines the documents persisted by the store and the values
//! passed through the scrape pipeline:
//! - [`CandidateRecord`]: Raw extraction output, one per card element
//! - [`Article`]: A persisted candidate with a system-assigned id
//! - [`Note`]: Caller-authored free-form content attached to an article
//! - [`User`]: The singleton aggregate accumulating note ids
//! - [`ArticleWithNote`]: An article with its note populated
//! - [`ScrapeReport`]: Outcome of one scrape run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Well-known id of the single [`User`] document.
pub const SINGLETON_USER_ID: &str = "singleton";

/// Keys the store assigns itself and never takes from a note payload.
const RESERVED_NOTE_KEYS: [&str; 2] = ["id", "_id"];

/// The `{title, link, summary}` triple extracted from one card element.
///
/// Each field is `None` when its selector matched nothing, so an absent
/// sub-element stays visible until the record is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CandidateRecord {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
}

impl CandidateRecord {
    /// True when no field could be resolved.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.link.is_none() && self.summary.is_none()
    }
}

/// A persisted article.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub link: String,
    pub summary: String,
    /// Id of the attached [`Note`], if any.
    pub note: Option<Uuid>,
    pub scraped_at: DateTime<Utc>,
}

impl Article {
    /// Build a new article from a candidate, substituting `""` for absent fields.
    pub fn from_candidate(record: CandidateRecord) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: record.title.unwrap_or_default(),
            link: record.link.unwrap_or_default(),
            summary: record.summary.unwrap_or_default(),
            note: None,
            scraped_at: Utc::now(),
        }
    }
}

/// A note with caller-defined fields.
///
/// Fields are flattened into the document, so a note created from
/// `title=Hi&body=There` serializes as `{"id": ..., "title": "Hi", "body": "There"}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Note {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Note {
    /// Build a note from a caller payload, dropping reserved id keys.
    pub fn from_payload(mut fields: Map<String, Value>) -> Self {
        for key in RESERVED_NOTE_KEYS {
            fields.remove(key);
        }
        Self {
            id: Uuid::new_v4(),
            fields,
        }
    }
}

/// The singleton user aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    /// Ids of every note created, in creation order. Append-only.
    pub notes: Vec<Uuid>,
}

impl User {
    pub fn singleton() -> Self {
        Self {
            id: SINGLETON_USER_ID.to_string(),
            notes: Vec::new(),
        }
    }
}

/// An article whose `note` reference has been replaced by the note document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleWithNote {
    pub id: Uuid,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub note: Option<Note>,
    pub scraped_at: DateTime<Utc>,
}

impl ArticleWithNote {
    pub fn populate(article: Article, note: Option<Note>) -> Self {
        Self {
            id: article.id,
            title: article.title,
            link: article.link,
            summary: article.summary,
            note,
            scraped_at: article.scraped_at,
        }
    }
}

/// A candidate that could not be persisted, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRecord {
    pub record: CandidateRecord,
    pub error: String,
}

/// Outcome of one scrape run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeReport {
    /// The URL that was fetched.
    pub source: String,
    /// Number of candidates extracted and handed to the store.
    pub attempted: usize,
    /// Number of candidates persisted.
    pub succeeded: usize,
    pub errors: Vec<FailedRecord>,
}

impl ScrapeReport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}
