//! PRIMM stage definitions
//!
//! A stage is one PRIMM phase inside a course. The phase-specific payload
//! lives in [`StageContent`], so the stage type is always consistent with the
//! data available for grading.

use crate::{CourseId, StageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of stages in a well-formed PRIMM course (one per phase)
pub const PRIMM_STAGE_COUNT: usize = 5;

/// The five PRIMM phases, in teaching order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    Predict,
    Run,
    Investigate,
    Modify,
    Make,
}

impl StageType {
    pub const ALL: [StageType; PRIMM_STAGE_COUNT] = [
        StageType::Predict,
        StageType::Run,
        StageType::Investigate,
        StageType::Modify,
        StageType::Make,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Predict => "predict",
            StageType::Run => "run",
            StageType::Investigate => "investigate",
            StageType::Modify => "modify",
            StageType::Make => "make",
        }
    }

    /// Position of this phase in the PRIMM sequence (1-5)
    pub fn order_index(&self) -> i32 {
        match self {
            StageType::Predict => 1,
            StageType::Run => 2,
            StageType::Investigate => 3,
            StageType::Modify => 4,
            StageType::Make => 5,
        }
    }

    /// Code-writing phases keep an attempt counter and track the latest result
    pub fn tracks_attempts(&self) -> bool {
        matches!(self, StageType::Modify | StageType::Make)
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown stage type string
#[derive(Debug, Clone, Error)]
#[error("unknown stage type `{0}`")]
pub struct ParseStageTypeError(pub String);

impl FromStr for StageType {
    type Err = ParseStageTypeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "predict" => Ok(StageType::Predict),
            "run" => Ok(StageType::Run),
            "investigate" => Ok(StageType::Investigate),
            "modify" => Ok(StageType::Modify),
            "make" => Ok(StageType::Make),
            other => Err(ParseStageTypeError(other.to_string())),
        }
    }
}

/// Input/expected-output pair used to check modify and make submissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Phase-specific stage payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage_type", rename_all = "lowercase")]
pub enum StageContent {
    Predict {
        #[serde(default)]
        options: BTreeMap<String, String>,
        /// Missing when the teacher never configured an answer key
        correct_answer: Option<String>,
    },
    Run {
        #[serde(default)]
        code_template: Option<String>,
    },
    Investigate {
        #[serde(default)]
        video_embed_url: Option<String>,
        #[serde(default)]
        guiding_questions: Vec<String>,
        #[serde(default)]
        reflection_prompt: Option<String>,
    },
    Modify {
        #[serde(default)]
        challenge: Option<String>,
        #[serde(default)]
        expected_output: Option<String>,
        #[serde(default)]
        test_cases: Vec<TestCase>,
    },
    Make {
        #[serde(default)]
        challenge: Option<String>,
        #[serde(default)]
        expected_output: Option<String>,
        #[serde(default)]
        test_cases: Vec<TestCase>,
    },
}

impl StageContent {
    pub fn stage_type(&self) -> StageType {
        match self {
            StageContent::Predict { .. } => StageType::Predict,
            StageContent::Run { .. } => StageType::Run,
            StageContent::Investigate { .. } => StageType::Investigate,
            StageContent::Modify { .. } => StageType::Modify,
            StageContent::Make { .. } => StageType::Make,
        }
    }

    /// Test cases for code-writing phases; empty for the others
    pub fn test_cases(&self) -> &[TestCase] {
        match self {
            StageContent::Modify { test_cases, .. } | StageContent::Make { test_cases, .. } => {
                test_cases
            }
            _ => &[],
        }
    }
}

/// A PRIMM stage as read from the course catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub course_id: CourseId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 1-5, unique within the course
    pub order_index: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub code_snippet: Option<String>,
    #[serde(flatten)]
    pub content: StageContent,
}

impl Stage {
    pub fn stage_type(&self) -> StageType {
        self.content.stage_type()
    }
}

fn default_true() -> bool {
    true
}
