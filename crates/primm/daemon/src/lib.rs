//! PRIMM daemon library
//!
//! Composition root for the progress core:
//! - REST API handlers over [`primm_progress::ProgressService`]
//! - Layered configuration
//! - Storage selection and the reconcile retry worker lifecycle

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
