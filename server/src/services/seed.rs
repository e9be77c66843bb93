//! Demo data
//!
//! Fills an empty database with books and page notes for local use.

use crate::config::SEED_BOOK_COUNT;
use crate::database::{NewBook, NewNote, Repository};
use crate::error::Result;
use chrono::{Duration, Utc};
use rand::Rng;

const SEED_TAGS: &[&str] = &["reading", "quotes", "ideas", "review", "history", "craft"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub books: usize,
    pub notes: usize,
}

/// Create `SEED_BOOK_COUNT` books with one to ten notes each.
pub async fn seed_demo_data(repo: &Repository) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for i in 1..=SEED_BOOK_COUNT {
        let (total, read, note_count, started_days_ago) = {
            let mut rng = rand::thread_rng();
            let total: i64 = rng.gen_range(100..=900);
            (
                total,
                rng.gen_range(0..=total),
                rng.gen_range(1..=10usize),
                rng.gen_range(1..=365i64),
            )
        };

        let book = repo
            .create_book(NewBook {
                title: format!("Sample Book {}", i),
                total,
                read,
                started_at: Some(Utc::now() - Duration::days(started_days_ago)),
                cover: String::new(),
                hidden: false,
            })
            .await?;
        summary.books += 1;

        for n in 1..=note_count {
            let (page, tags) = {
                let mut rng = rand::thread_rng();
                let page = rng.gen_range(1..=total);
                let tag = SEED_TAGS[rng.gen_range(0..SEED_TAGS.len())];
                (page, vec![tag.to_string()])
            };

            repo.create_note(
                book.id,
                NewNote {
                    title: Some(format!("Note {} on {}", n, book.title)),
                    desc: None,
                    content: format!("Thoughts on page {}.", page),
                    html_content: format!("<p>Thoughts on page {}.</p>", page),
                    page,
                    hidden: false,
                    tags,
                },
            )
            .await?;
            summary.notes += 1;
        }
    }

    tracing::info!(
        "Seeded {} books with {} notes",
        summary.books,
        summary.notes
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::filter::{QueryFilter, BOOK_FILTER};
    use crate::database::{create_memory_pool, Visibility};

    #[tokio::test]
    async fn test_seed_creates_books_with_notes() {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        let summary = seed_demo_data(&repo).await.unwrap();

        assert_eq!(summary.books, SEED_BOOK_COUNT);
        assert!(summary.notes >= SEED_BOOK_COUNT && summary.notes <= SEED_BOOK_COUNT * 10);

        let books = repo
            .list_books(Visibility::public(), &QueryFilter::defaults(&BOOK_FILTER))
            .await
            .unwrap();
        assert_eq!(books.len(), SEED_BOOK_COUNT);
        assert!(books.iter().all(|b| b.notes_count >= 1 && b.book.read <= b.book.total));
    }
}
