//! PRIMM progress core.
//!
//! Grades stage submissions, persists per-stage completion, credits coins and
//! experience, recomputes levels and cascades stage completion to course
//! completion. All state lives behind [`primm_storage::PrimmStorage`]; the
//! components here only hold an injected handle to it.
//!
//! Flow of one submission:
//! 1. [`StageGrader`] decides correctness and score.
//! 2. The completion record is upserted atomically.
//! 3. [`RewardLedger`] credits the fixed stage reward and raises the level.
//! 4. [`CourseCompletionAggregator`] re-derives course completion inline;
//!    failures go to the [`ReconcileWorker`] for retry.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod aggregator;
pub mod config;
mod error;
pub mod executor;
pub mod grader;
pub mod ledger;
pub mod reporter;
pub mod service;
pub mod worker;

pub use aggregator::CourseCompletionAggregator;
pub use config::{ProgressConfig, ReconcileConfig, RewardPolicy};
pub use error::{ProgressError, ProgressResult};
pub use executor::{CodeExecutor, ExecutionOutput, StubExecutor, TestCaseResult};
pub use grader::{Grade, StageGrader};
pub use ledger::{LedgerEntry, RewardLedger};
pub use reporter::ProgressReporter;
pub use service::{ProgressService, SubmissionOutcome};
pub use worker::{ReconcileJob, ReconcileQueue, ReconcileWorker};
