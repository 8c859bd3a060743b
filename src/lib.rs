//! Order ingestion service.
//!
//! Orders arrive as raw JSON payloads, are validated, persisted atomically to
//! Postgres and mirrored in an in-memory cache that serves lookups.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
