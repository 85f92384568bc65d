//! PRIMM Types - Core domain types for the PRIMM learning backend
//!
//! PRIMM (Predict, Run, Investigate, Modify, Make) structures programming
//! practice as five ordered stages per course. Teachers author lessons made of
//! courses; students submit answers per stage and collect coins, experience
//! points and levels as they complete stages and courses.
//!
//! ## Key Concepts
//!
//! - **Lesson**: top-level topic owned by a teacher, made of courses
//! - **Course**: sub-topic holding exactly one stage per PRIMM phase
//! - **Stage**: one PRIMM phase with phase-specific content and grading rule
//! - **StageCompletion**: per (user, stage) submission and correctness state
//! - **CourseCompletion**: per (user, course) completion and bonus record
//! - **UserAccount**: cumulative coins, experience points and level

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod catalog;
pub mod ids;
pub mod progress;
pub mod reward;
pub mod stage;
pub mod submission;

pub use catalog::{Course, Lesson};
pub use ids::{CourseId, LessonId, StageId, UserId};
pub use progress::{CompletionPatch, CourseCompletion, StageCompletion, UserAccount};
pub use reward::{level_for_xp, Reward, XP_PER_LEVEL};
pub use stage::{ParseStageTypeError, Stage, StageContent, StageType, TestCase, PRIMM_STAGE_COUNT};
pub use submission::{
    CourseProgress, ProgressSummary, RewardResponse, StageProgress, StageSubmissionRequest,
    SubmissionResult, SubmitInvestigateRequest, SubmitMakeRequest, SubmitModifyRequest,
    SubmitPredictRequest, SubmitRunRequest, Submission,
};
