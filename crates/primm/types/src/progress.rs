//! Completion records and user accounts
//!
//! [`StageCompletion`] is a wide record: the columns of every PRIMM phase
//! coexist and only those of the stage's own phase are ever populated.
//! Updates go through [`CompletionPatch`], which carries only the fields a
//! submission actually supplies.

use crate::{level_for_xp, CourseId, StageId, StageType, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per (user, stage) submission and completion state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCompletion {
    pub id: i64,
    pub user_id: UserId,
    pub stage_id: StageId,
    pub stage_type: StageType,

    // Predict
    pub predict_selected_answer: Option<String>,
    pub predict_is_correct: bool,

    // Run
    pub run_submitted_code: Option<String>,
    pub run_output: Option<String>,

    // Investigate
    pub investigate_reflection: Option<String>,
    pub investigate_completed: bool,

    // Modify
    pub modify_submitted_code: Option<String>,
    pub modify_output: Option<String>,
    pub modify_is_correct: bool,
    pub modify_attempts: i32,

    // Make
    pub make_submitted_code: Option<String>,
    pub make_output: Option<String>,
    pub make_is_correct: bool,
    pub make_attempts: i32,

    /// Score of the latest submission (0-100)
    pub last_score: i32,
    /// Normalized payload of the latest submission
    #[serde(default)]
    pub submission_data: Value,

    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once the per-stage reward has been claimed under first-completion policy
    pub rewarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StageCompletion {
    /// Build the record created by a first submission.
    pub fn from_patch(
        id: i64,
        user_id: UserId,
        stage_id: StageId,
        patch: &CompletionPatch,
        at: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            id,
            user_id,
            stage_id,
            stage_type: patch.stage_type,
            predict_selected_answer: None,
            predict_is_correct: false,
            run_submitted_code: None,
            run_output: None,
            investigate_reflection: None,
            investigate_completed: false,
            modify_submitted_code: None,
            modify_output: None,
            modify_is_correct: false,
            modify_attempts: 0,
            make_submitted_code: None,
            make_output: None,
            make_is_correct: false,
            make_attempts: 0,
            last_score: patch.score,
            submission_data: patch.submission_data.clone(),
            is_completed: patch.is_correct,
            completed_at: patch.is_correct.then_some(at),
            rewarded_at: None,
            created_at: at,
            updated_at: at,
        };
        record.write_phase_fields(patch);
        match patch.stage_type {
            StageType::Modify => record.modify_attempts = 1,
            StageType::Make => record.make_attempts = 1,
            _ => {}
        }
        record
    }

    /// Apply a resubmission in place.
    ///
    /// Predict, run and investigate completion is sticky: once achieved it is
    /// never cleared and keeps its first timestamp. Modify and make bump the
    /// attempt counter on every resubmission and reflect the latest result.
    pub fn apply(&mut self, patch: &CompletionPatch, at: DateTime<Utc>) {
        self.write_phase_fields(patch);
        self.last_score = patch.score;
        if !patch.submission_data.is_null() {
            self.submission_data = patch.submission_data.clone();
        }

        if patch.stage_type.tracks_attempts() {
            match patch.stage_type {
                StageType::Modify => self.modify_attempts += 1,
                _ => self.make_attempts += 1,
            }
            self.is_completed = patch.is_correct;
            self.completed_at = patch.is_correct.then_some(at);
        } else {
            if patch.is_correct && self.completed_at.is_none() {
                self.completed_at = Some(at);
            }
            self.is_completed = self.is_completed || patch.is_correct;
        }
        self.updated_at = at;
    }

    /// Attempt counter of a modify/make record; 0 for the other phases
    pub fn attempts(&self) -> i32 {
        match self.stage_type {
            StageType::Modify => self.modify_attempts,
            StageType::Make => self.make_attempts,
            _ => 0,
        }
    }

    fn write_phase_fields(&mut self, patch: &CompletionPatch) {
        match patch.stage_type {
            StageType::Predict => {
                if let Some(answer) = &patch.selected_answer {
                    self.predict_selected_answer = Some(answer.clone());
                }
                self.predict_is_correct = patch.is_correct;
            }
            StageType::Run => {
                if let Some(code) = &patch.submitted_code {
                    self.run_submitted_code = Some(code.clone());
                }
                if let Some(output) = &patch.output {
                    self.run_output = Some(output.clone());
                }
            }
            StageType::Investigate => {
                if let Some(reflection) = &patch.reflection {
                    self.investigate_reflection = Some(reflection.clone());
                }
                self.investigate_completed = self.investigate_completed || patch.is_correct;
            }
            StageType::Modify => {
                if let Some(code) = &patch.submitted_code {
                    self.modify_submitted_code = Some(code.clone());
                }
                if let Some(output) = &patch.output {
                    self.modify_output = Some(output.clone());
                }
                self.modify_is_correct = patch.is_correct;
            }
            StageType::Make => {
                if let Some(code) = &patch.submitted_code {
                    self.make_submitted_code = Some(code.clone());
                }
                if let Some(output) = &patch.output {
                    self.make_output = Some(output.clone());
                }
                self.make_is_correct = patch.is_correct;
            }
        }
    }
}

/// Fields supplied by one graded submission.
///
/// Only `Some` fields are written on update; everything else keeps its stored
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionPatch {
    pub stage_type: StageType,
    pub is_correct: bool,
    pub score: i32,
    pub selected_answer: Option<String>,
    pub submitted_code: Option<String>,
    pub output: Option<String>,
    pub reflection: Option<String>,
    pub submission_data: Value,
}

impl CompletionPatch {
    pub fn new(stage_type: StageType, is_correct: bool, score: i32) -> Self {
        Self {
            stage_type,
            is_correct,
            score,
            selected_answer: None,
            submitted_code: None,
            output: None,
            reflection: None,
            submission_data: Value::Null,
        }
    }

    pub fn with_selected_answer(mut self, answer: impl Into<String>) -> Self {
        self.selected_answer = Some(answer.into());
        self
    }

    pub fn with_submitted_code(mut self, code: impl Into<String>) -> Self {
        self.submitted_code = Some(code.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_reflection(mut self, reflection: impl Into<String>) -> Self {
        self.reflection = Some(reflection.into());
        self
    }

    pub fn with_submission_data(mut self, data: Value) -> Self {
        self.submission_data = data;
        self
    }
}

/// Per (user, course) completion record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseCompletion {
    pub id: i64,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub coins_earned: i64,
    pub created_at: DateTime<Utc>,
}

/// Gamification totals of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: UserId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub total_coins: i64,
    #[serde(default)]
    pub experience_points: i64,
    #[serde(default = "default_level")]
    pub level: i32,
}

impl UserAccount {
    pub fn new(user_id: UserId, full_name: impl Into<String>) -> Self {
        Self {
            user_id,
            full_name: full_name.into(),
            total_coins: 0,
            experience_points: 0,
            level: 1,
        }
    }

    /// Level implied by the current experience total
    pub fn derived_level(&self) -> i32 {
        level_for_xp(self.experience_points)
    }
}

fn default_level() -> i32 {
    1
}
