//! Visibility scopes and the note/post partition
//!
//! Every repository query for books, notes and posts takes an explicit
//! `Visibility`; nothing is filtered implicitly.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

/// How soft-deleted rows are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trashed {
    Exclude,
    Include,
    Only,
}

/// Row visibility for hidden and soft-deleted rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub include_hidden: bool,
    pub trashed: Trashed,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::public()
    }
}

impl Visibility {
    /// Neither hidden nor soft-deleted rows.
    pub const fn public() -> Self {
        Self {
            include_hidden: false,
            trashed: Trashed::Exclude,
        }
    }

    /// Edit mode and maintenance lookups: every row.
    pub const fn everything() -> Self {
        Self {
            include_hidden: true,
            trashed: Trashed::Include,
        }
    }

    /// Soft-deleted rows only, hidden or not.
    pub const fn only_trashed() -> Self {
        Self {
            include_hidden: true,
            trashed: Trashed::Only,
        }
    }

    /// Edit mode only takes effect for authenticated callers.
    pub fn for_request(authenticated: bool, edit_mode: bool) -> Self {
        if authenticated && edit_mode {
            Self::everything()
        } else {
            Self::public()
        }
    }

    pub fn without_trashed(self) -> Self {
        Self {
            trashed: Trashed::Exclude,
            ..self
        }
    }

    pub fn is_edit_mode(&self) -> bool {
        *self == Self::everything()
    }

    pub fn admits(&self, hidden: bool, deleted_at: Option<DateTime<Utc>>) -> bool {
        if hidden && !self.include_hidden {
            return false;
        }
        match self.trashed {
            Trashed::Exclude => deleted_at.is_none(),
            Trashed::Include => true,
            Trashed::Only => deleted_at.is_some(),
        }
    }
}

/// Pushes visibility predicates onto a query whose WHERE clause is open.
pub trait VisibilityExt {
    fn push_visibility(&mut self, visibility: Visibility, alias: &str) -> &mut Self;
}

impl VisibilityExt for QueryBuilder<'_, Sqlite> {
    fn push_visibility(&mut self, visibility: Visibility, alias: &str) -> &mut Self {
        if !visibility.include_hidden {
            self.push(format!(" AND {alias}.hidden = 0"));
        }
        match visibility.trashed {
            Trashed::Exclude => {
                self.push(format!(" AND {alias}.deleted_at IS NULL"));
            }
            Trashed::Include => {}
            Trashed::Only => {
                self.push(format!(" AND {alias}.deleted_at IS NOT NULL"));
            }
        }
        self
    }
}

/// The two kinds of rows sharing the `notes` table. This is also the
/// closed set of taggable owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggableKind {
    Note,
    Post,
}

impl TaggableKind {
    /// Value stored in `taggables.target_type`; the table name for both kinds.
    pub const fn target_type(self) -> &'static str {
        "notes"
    }

    pub const fn entity(self) -> &'static str {
        match self {
            TaggableKind::Note => "Note",
            TaggableKind::Post => "Post",
        }
    }

    pub fn partition_sql(self, alias: &str) -> String {
        match self {
            TaggableKind::Note => format!(" AND {alias}.book_id != 0"),
            TaggableKind::Post => format!(" AND {alias}.book_id = 0"),
        }
    }
}
