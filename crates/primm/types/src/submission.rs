//! Submission requests and progress responses

use crate::{CourseId, LessonId, StageId, StageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A student's answer for one stage, independent of the endpoint it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "submission_type", rename_all = "lowercase")]
pub enum Submission {
    Predict {
        selected_answer: String,
    },
    Run {
        code: String,
        /// Output already produced client-side; when absent the executor runs the code
        #[serde(default)]
        output: Option<String>,
    },
    Investigate {
        reflection: String,
    },
    Modify {
        code: String,
    },
    Make {
        code: String,
    },
}

impl Submission {
    pub fn stage_type(&self) -> StageType {
        match self {
            Submission::Predict { .. } => StageType::Predict,
            Submission::Run { .. } => StageType::Run,
            Submission::Investigate { .. } => StageType::Investigate,
            Submission::Modify { .. } => StageType::Modify,
            Submission::Make { .. } => StageType::Make,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPredictRequest {
    pub stage_id: StageId,
    pub selected_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRunRequest {
    pub stage_id: StageId,
    pub submitted_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitInvestigateRequest {
    pub stage_id: StageId,
    pub reflection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitModifyRequest {
    pub stage_id: StageId,
    pub submitted_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitMakeRequest {
    pub stage_id: StageId,
    pub submitted_code: String,
}

impl From<SubmitPredictRequest> for Submission {
    fn from(req: SubmitPredictRequest) -> Self {
        Submission::Predict {
            selected_answer: req.selected_answer,
        }
    }
}

impl From<SubmitRunRequest> for Submission {
    fn from(req: SubmitRunRequest) -> Self {
        Submission::Run {
            code: req.submitted_code,
            output: None,
        }
    }
}

impl From<SubmitInvestigateRequest> for Submission {
    fn from(req: SubmitInvestigateRequest) -> Self {
        Submission::Investigate {
            reflection: req.reflection,
        }
    }
}

impl From<SubmitModifyRequest> for Submission {
    fn from(req: SubmitModifyRequest) -> Self {
        Submission::Modify {
            code: req.submitted_code,
        }
    }
}

impl From<SubmitMakeRequest> for Submission {
    fn from(req: SubmitMakeRequest) -> Self {
        Submission::Make {
            code: req.submitted_code,
        }
    }
}

/// Generic submission body: a declared type plus the field for that type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSubmissionRequest {
    pub submission_type: Option<StageType>,
    #[serde(default)]
    pub selected_answer: Option<String>,
    #[serde(default)]
    pub code_output: Option<String>,
    #[serde(default)]
    pub reflection_text: Option<String>,
    #[serde(default)]
    pub modified_code: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl StageSubmissionRequest {
    /// Convert into a [`Submission`]; missing text fields become empty strings.
    ///
    /// Returns `None` when no submission type was declared.
    pub fn into_submission(self) -> Option<Submission> {
        let submission = match self.submission_type? {
            StageType::Predict => Submission::Predict {
                selected_answer: self.selected_answer.unwrap_or_default(),
            },
            StageType::Run => Submission::Run {
                code: self.code.unwrap_or_default(),
                output: self.code_output,
            },
            StageType::Investigate => Submission::Investigate {
                reflection: self.reflection_text.unwrap_or_default(),
            },
            StageType::Modify => Submission::Modify {
                code: self.modified_code.unwrap_or_default(),
            },
            StageType::Make => Submission::Make {
                code: self.code.unwrap_or_default(),
            },
        };
        Some(submission)
    }
}

/// Result of the generic submission path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub stage_id: StageId,
    pub submission_type: StageType,
    pub is_correct: bool,
    pub score: i32,
    pub data: Value,
    pub coins_earned: i64,
    pub xp_earned: i64,
    pub submitted_at: DateTime<Utc>,
}

/// Result of the typed submission endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardResponse {
    pub success: bool,
    pub is_correct: bool,
    pub message: String,
    pub coins_earned: i64,
    pub xp_earned: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Present when this submission moved the user to a higher level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_level: Option<i32>,
    #[serde(default)]
    pub course_completed: bool,
}

/// Completion state of one stage inside a course progress report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    pub stage_id: StageId,
    pub stage_type: StageType,
    pub order_index: i32,
    pub title: String,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A user's progress through one course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseProgress {
    pub course_id: CourseId,
    pub stages: Vec<StageProgress>,
    pub total_stages: usize,
    pub completed_count: usize,
    pub percent: i32,
    pub is_complete: bool,
    pub coins_earned: i64,
}

/// A user's progress through one lesson
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub lesson_id: LessonId,
    pub total_courses: usize,
    pub completed_courses: usize,
    pub percent: f64,
    pub coins_earned: i64,
    pub xp_earned: i64,
}
