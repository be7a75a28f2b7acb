//! Document store for articles, notes and the user aggregate.
//!
//! # Contracts
//!
//! The pipeline and the HTTP layer depend on three narrow traits rather than
//! on the database:
//! - [`ArticleStore`]: create, list and look up articles
//! - [`NoteStore`]: create and look up notes
//! - [`UserStore`]: seed, read and append to the singleton user
//!
//! # Storage
//!
//! [`Store`] implements all three on top of sled. Each collection is its own
//! tree and every document is a JSON value keyed by its id:
//!
//! ```text
//! articles  uuid bytes      -> Article json
//! notes     uuid bytes      -> Note json
//! users     b"singleton"    -> User json
//! ```
//!
//! Article ids are UUIDv7, so iterating the `articles` tree yields creation order.

use crate::error::ScrapeError;
use crate::models::{Article, ArticleWithNote, CandidateRecord, Note, SINGLETON_USER_ID, User};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
    TransactionalTree,
};
use sled::{Db, Tree};
use std::path::Path;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Persist a candidate as a new article with a fresh id.
    async fn create(&self, record: CandidateRecord) -> Result<Article, ScrapeError>;

    /// Every stored article, oldest first.
    async fn find_all(&self) -> Result<Vec<Article>, ScrapeError>;

    /// The article with `id`, its note populated.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::NotFound`] if no article has that id.
    async fn find_by_id(&self, id: Uuid) -> Result<ArticleWithNote, ScrapeError>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    // The HTTP layer creates notes through `Store::attach_note`.
    #[allow(dead_code)]
    async fn create(&self, payload: Map<String, Value>) -> Result<Note, ScrapeError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Note>, ScrapeError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the singleton user if it does not exist yet, returning it either way.
    async fn seed_user(&self) -> Result<User, ScrapeError>;

    async fn find_user(&self) -> Result<Option<User>, ScrapeError>;

    /// Append `note_id` to the singleton user's notes.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::NotFound`] if the singleton user was never seeded.
    #[allow(dead_code)]
    async fn append_note(&self, note_id: Uuid) -> Result<User, ScrapeError>;
}

/// Handle to the sled database. Cheap to clone; all clones share one database.
#[derive(Debug, Clone)]
pub struct Store {
    db: Db,
    articles: Tree,
    notes: Tree,
    users: Tree,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScrapeError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Open a throwaway in-memory database.
    #[cfg(test)]
    pub fn temporary() -> Result<Self, ScrapeError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, ScrapeError> {
        Ok(Self {
            articles: db.open_tree("articles")?,
            notes: db.open_tree("notes")?,
            users: db.open_tree("users")?,
            db,
        })
    }

    pub fn article_count(&self) -> usize {
        self.articles.len()
    }

    /// Flush pending writes to disk.
    pub async fn flush(&self) -> Result<(), ScrapeError> {
        let bytes = self.db.flush_async().await?;
        debug!(bytes, "Flushed store");
        Ok(())
    }

    /// Create a note, link it to an article and append it to the singleton user.
    ///
    /// All three writes happen in one transaction: if the article or the user
    /// is missing nothing is written, so no orphaned note is left behind.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::NotFound`] if the article or the singleton user is missing
    /// - [`ScrapeError::Persistence`] on storage failure
    #[instrument(level = "info", skip(self, payload))]
    pub async fn attach_note(
        &self,
        article_id: Uuid,
        payload: Map<String, Value>,
    ) -> Result<User, ScrapeError> {
        let note = Note::from_payload(payload);
        let article_key = article_id.as_bytes().as_slice();

        let result = (&self.articles, &self.notes, &self.users).transaction(
            |(articles, notes, users)| {
                let mut article: Article = match articles.get(article_key)? {
                    Some(raw) => decode(&raw).map_err(ConflictableTransactionError::Abort)?,
                    None => return abort(ScrapeError::NotFound(format!("article {article_id}"))),
                };
                let user = push_note(users, note.id)?;
                insert_note(notes, &note)?;

                article.note = Some(note.id);
                articles.insert(
                    article_key,
                    encode(&article).map_err(ConflictableTransactionError::Abort)?,
                )?;
                Ok(user)
            },
        );

        let user = flatten_tx(result)?;
        info!(note_id = %note.id, notes = user.notes.len(), "Attached note");
        Ok(user)
    }
}

#[async_trait]
impl ArticleStore for Store {
    #[instrument(level = "debug", skip_all)]
    async fn create(&self, record: CandidateRecord) -> Result<Article, ScrapeError> {
        let article = Article::from_candidate(record);
        self.articles.insert(article.id.as_bytes(), encode(&article)?)?;
        debug!(id = %article.id, title = %article.title, "Stored article");
        Ok(article)
    }

    #[instrument(level = "debug", skip_all)]
    async fn find_all(&self) -> Result<Vec<Article>, ScrapeError> {
        self.articles
            .iter()
            .values()
            .map(|raw| decode(&raw?))
            .collect()
    }

    #[instrument(level = "debug", skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<ArticleWithNote, ScrapeError> {
        let raw = self
            .articles
            .get(id.as_bytes())?
            .ok_or_else(|| ScrapeError::NotFound(format!("article {id}")))?;
        let article: Article = decode(&raw)?;
        let note = match article.note {
            Some(note_id) => NoteStore::find_by_id(self, note_id).await?,
            None => None,
        };
        Ok(ArticleWithNote::populate(article, note))
    }
}

#[async_trait]
impl NoteStore for Store {
    #[instrument(level = "debug", skip_all)]
    async fn create(&self, payload: Map<String, Value>) -> Result<Note, ScrapeError> {
        let note = Note::from_payload(payload);
        flatten_tx(self.notes.transaction(|notes| insert_note(notes, &note)))?;
        Ok(note)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Note>, ScrapeError> {
        self.notes
            .get(id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }
}

#[async_trait]
impl UserStore for Store {
    #[instrument(level = "debug", skip_all)]
    async fn seed_user(&self) -> Result<User, ScrapeError> {
        let key = SINGLETON_USER_ID.as_bytes();
        let fresh = encode(&User::singleton())?;
        let result = self.users.transaction(|users| {
            if let Some(raw) = users.get(key)? {
                return decode(&raw).map_err(ConflictableTransactionError::Abort);
            }
            users.insert(key, fresh.clone())?;
            Ok(User::singleton())
        });
        flatten_tx(result)
    }

    async fn find_user(&self) -> Result<Option<User>, ScrapeError> {
        self.users
            .get(SINGLETON_USER_ID.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    #[instrument(level = "debug", skip(self))]
    async fn append_note(&self, note_id: Uuid) -> Result<User, ScrapeError> {
        flatten_tx(self.users.transaction(|users| push_note(users, note_id)))
    }
}

/// Write `note` into the notes tree of a running transaction.
fn insert_note(
    notes: &TransactionalTree,
    note: &Note,
) -> ConflictableTransactionResult<(), ScrapeError> {
    let bytes = encode(note).map_err(ConflictableTransactionError::Abort)?;
    notes.insert(note.id.as_bytes().as_slice(), bytes)?;
    Ok(())
}

/// Append `note_id` to the singleton user inside a running transaction.
fn push_note(
    users: &TransactionalTree,
    note_id: Uuid,
) -> ConflictableTransactionResult<User, ScrapeError> {
    let key = SINGLETON_USER_ID.as_bytes();
    let mut user: User = match users.get(key)? {
        Some(raw) => decode(&raw).map_err(ConflictableTransactionError::Abort)?,
        None => return abort(ScrapeError::NotFound("singleton user".to_string())),
    };
    user.notes.push(note_id);
    users.insert(key, encode(&user).map_err(ConflictableTransactionError::Abort)?)?;
    Ok(user)
}

fn encode<T: Serialize>(doc: &T) -> Result<Vec<u8>, ScrapeError> {
    Ok(serde_json::to_vec(doc)?)
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, ScrapeError> {
    Ok(serde_json::from_slice(raw)?)
}

fn abort<T>(e: ScrapeError) -> Result<T, ConflictableTransactionError<ScrapeError>> {
    Err(ConflictableTransactionError::Abort(e))
}

fn flatten_tx<T>(result: Result<T, TransactionError<ScrapeError>>) -> Result<T, ScrapeError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}
