//! Application services layer: storage ports, errors and the ingestion pipeline.

pub mod error;
pub mod ingest;
pub mod repos;
