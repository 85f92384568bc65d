//! PRIMM storage abstractions.
//!
//! This crate defines the storage contract consumed by the progress core:
//! - a read-only catalog view of lessons, courses and stages
//! - per (user, stage) completion records with atomic upsert semantics
//! - per (user, course) completion records with insert-or-ignore semantics
//! - reward accounts with additive credits and monotonic levels
//!
//! Design stance:
//! - Every mutating operation is atomic at the storage level; callers never
//!   read-then-write across two calls to get correctness.
//! - Postgres is the source of truth in production; the in-memory adapter
//!   mirrors its semantics for development and tests.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::{CatalogSeed, InMemoryPrimmStorage};
pub use traits::{AccountStore, CatalogStore, CompletionStore, CourseCompletionStore, PrimmStorage};
