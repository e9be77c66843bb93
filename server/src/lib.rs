//! booknotes library
//!
//! Reading-journal backend: books, page notes, free-standing posts and
//! tags behind a JSON/HTTP API. Exposed as a library for the binary and
//! the integration tests.

pub mod api;
pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;
pub mod validation;
