//! Domain layer types and invariants.

pub mod codes;
pub mod entities;
pub mod error;
pub mod sample;
pub mod validation;
