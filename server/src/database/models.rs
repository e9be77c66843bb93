//! Database models
//!
//! Rust structs representing database entities.
//! Notes and posts share the `notes` table; `book_id = 0` marks a post.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::ops::Deref;

/// A book being read
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    /// Total page count
    pub total: i64,
    /// Pages read so far
    pub read: i64,
    pub started_at: Option<DateTime<Utc>>,
    /// Public path of the cover image, empty when none was uploaded
    pub cover: String,
    pub hidden: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book row with the number of notes visible under the query's scope
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub book: Book,
    pub notes_count: i64,
}

/// Row of the shared `notes` table
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NoteRecord {
    pub id: i64,
    pub book_id: i64,
    pub title: Option<String>,
    pub desc: Option<String>,
    /// Markdown source
    pub content: String,
    pub html_content: String,
    pub page: i64,
    pub hidden: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A note attached to a page of a book. Only produced by repository
/// queries restricted to the note partition.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Note(NoteRecord);

impl Note {
    pub(crate) fn from_record(record: NoteRecord) -> Self {
        debug_assert!(record.book_id != 0);
        Self(record)
    }
}

impl Deref for Note {
    type Target = NoteRecord;

    fn deref(&self) -> &NoteRecord {
        &self.0
    }
}

/// A free-standing post (no book). Only produced by repository queries
/// restricted to the post partition.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Post(NoteRecord);

impl Post {
    pub(crate) fn from_record(record: NoteRecord) -> Self {
        debug_assert!(record.book_id == 0);
        Self(record)
    }
}

impl Deref for Post {
    type Target = NoteRecord;

    fn deref(&self) -> &NoteRecord {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TagWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tag: Tag,
    pub targets_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated book creation
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub total: i64,
    pub read: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub cover: String,
    pub hidden: bool,
}

/// Validated partial book update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct BookChanges {
    pub title: Option<String>,
    pub total: Option<i64>,
    pub read: Option<i64>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub cover: Option<String>,
    pub hidden: Option<bool>,
    pub restore: bool,
}

/// Validated note or post creation
#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub content: String,
    pub html_content: String,
    /// Ignored for posts
    pub page: i64,
    pub hidden: bool,
    pub tags: Vec<String>,
}

/// Validated partial note or post update
#[derive(Debug, Clone, Default)]
pub struct NoteChanges {
    pub title: Option<Option<String>>,
    pub desc: Option<Option<String>>,
    pub content: Option<String>,
    pub html_content: Option<String>,
    pub page: Option<i64>,
    pub hidden: Option<bool>,
    pub restore: bool,
    /// Replaces the tag set when present
    pub tags: Option<Vec<String>>,
}
