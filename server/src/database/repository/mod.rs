//! Repository layer for database operations
//!
//! CRUD operations for every entity, split per table. Queries that touch
//! books, notes or posts always take an explicit `Visibility`; note and
//! post queries always carry their partition predicate. Multi-row writes
//! (cascading deletes, tag syncing) run in a single transaction.

mod books;
mod notes;
mod tags;
mod users;

use sqlx::SqlitePool;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
