//! Services module
//!
//! Business logic services that coordinate between the HTTP handlers and
//! the repository. Every write is validated into a typed input first.

pub mod auth;
pub mod books;
pub mod notes;
pub mod posts;
pub mod seed;
pub mod tags;

pub use auth::{AuthService, IssuedToken};
pub use books::{BookDetail, BooksService};
pub use notes::{NoteDetail, NotePage, NoteWithBook, NotesService};
pub use posts::{PostWithTags, PostsService};
pub use seed::{seed_demo_data, SeedSummary};
pub use tags::{TagDetail, TagsService};
