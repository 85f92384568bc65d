//! Stage grading.
//!
//! Grading decides correctness and a 0-100 score for one submission and
//! builds the [`CompletionPatch`] the completion store applies. It has no
//! side effects beyond calling the configured [`CodeExecutor`].

use crate::executor::{CodeExecutor, TestCaseResult};
use crate::{ProgressError, ProgressResult};
use primm_types::{CompletionPatch, Stage, StageContent, StageType, Submission};
use serde_json::{json, Value};
use std::sync::Arc;

/// Result of grading one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub is_correct: bool,
    pub score: i32,
    /// Normalized submission payload echoed back to the caller and stored
    pub data: Value,
    /// Program output shown to the student, for code phases
    pub output: Option<String>,
    pub patch: CompletionPatch,
}

impl Grade {
    fn new(
        stage_type: StageType,
        is_correct: bool,
        score: i32,
        data: Value,
        output: Option<String>,
    ) -> Self {
        let patch =
            CompletionPatch::new(stage_type, is_correct, score).with_submission_data(data.clone());
        Self {
            is_correct,
            score,
            data,
            output,
            patch,
        }
    }

    fn pass_fail(is_correct: bool) -> i32 {
        if is_correct {
            100
        } else {
            0
        }
    }
}

/// Grades submissions against stage definitions.
pub struct StageGrader {
    executor: Arc<dyn CodeExecutor>,
    investigate_min_chars: usize,
}

impl StageGrader {
    pub fn new(executor: Arc<dyn CodeExecutor>, investigate_min_chars: usize) -> Self {
        Self {
            executor,
            investigate_min_chars,
        }
    }

    pub fn investigate_min_chars(&self) -> usize {
        self.investigate_min_chars
    }

    /// Grade `submission` for `stage`.
    ///
    /// Fails with `NotFound` when the submission targets another phase than
    /// the stage, and with `InvalidStage` when the stage lacks grading data.
    pub async fn grade(&self, stage: &Stage, submission: &Submission) -> ProgressResult<Grade> {
        if stage.stage_type() != submission.stage_type() {
            return Err(ProgressError::NotFound(format!(
                "{} stage {} not found",
                submission.stage_type(),
                stage.id.get()
            )));
        }

        match (&stage.content, submission) {
            (
                StageContent::Predict { correct_answer, .. },
                Submission::Predict { selected_answer },
            ) => {
                let correct_answer = correct_answer
                    .as_deref()
                    .filter(|answer| !answer.is_empty())
                    .ok_or_else(|| {
                        ProgressError::InvalidStage(format!(
                            "predict stage {} has no correct answer",
                            stage.id.get()
                        ))
                    })?;
                let is_correct = selected_answer == correct_answer;
                let data = json!({
                    "selected_answer": selected_answer,
                    "correct_answer": correct_answer,
                });
                let mut grade = Grade::new(
                    StageType::Predict,
                    is_correct,
                    Grade::pass_fail(is_correct),
                    data,
                    None,
                );
                grade.patch = grade.patch.with_selected_answer(selected_answer.clone());
                Ok(grade)
            }
            (StageContent::Run { .. }, Submission::Run { code, output }) => {
                let output = match output {
                    Some(output) => output.clone(),
                    None => self.executor.run(code).await?.stdout,
                };
                let data = json!({ "code_output": output });
                let mut grade = Grade::new(StageType::Run, true, 100, data, Some(output.clone()));
                grade.patch = grade
                    .patch
                    .with_submitted_code(code.clone())
                    .with_output(output);
                Ok(grade)
            }
            (StageContent::Investigate { .. }, Submission::Investigate { reflection }) => {
                let is_correct = reflection.trim().chars().count() >= self.investigate_min_chars;
                let data = json!({ "reflection_text": reflection });
                let mut grade = Grade::new(
                    StageType::Investigate,
                    is_correct,
                    Grade::pass_fail(is_correct),
                    data,
                    None,
                );
                grade.patch = grade.patch.with_reflection(reflection.clone());
                Ok(grade)
            }
            (StageContent::Modify { .. }, Submission::Modify { code })
            | (StageContent::Make { .. }, Submission::Make { code }) => {
                self.grade_code(stage, code).await
            }
            _ => Err(ProgressError::InvalidStage(format!(
                "stage {} content does not match its type",
                stage.id.get()
            ))),
        }
    }

    async fn grade_code(&self, stage: &Stage, code: &str) -> ProgressResult<Grade> {
        let stage_type = stage.stage_type();
        let test_cases = stage.content.test_cases();
        if test_cases.is_empty() {
            return Err(ProgressError::InvalidStage(format!(
                "{} stage {} has no test cases",
                stage_type,
                stage.id.get()
            )));
        }

        let code_key = match stage_type {
            StageType::Modify => "modified_code",
            _ => "code",
        };

        if code.trim().is_empty() {
            let data = json!({ code_key: code, "test_results": [] });
            let mut grade = Grade::new(stage_type, false, 0, data, None);
            grade.patch = grade.patch.with_submitted_code(code.to_string());
            return Ok(grade);
        }

        let results = self.executor.evaluate(code, test_cases).await?;
        let passed = results.iter().filter(|r| r.passed).count();
        // A short result list means some cases were never checked.
        let is_correct = results.len() == test_cases.len() && passed == results.len();
        let score = score_for(passed, test_cases.len());
        let output = summarize(&results, is_correct);

        let data = json!({
            code_key: code,
            "test_results": results,
            "passed": passed,
            "total": test_cases.len(),
        });
        let mut grade = Grade::new(stage_type, is_correct, score, data, Some(output.clone()));
        grade.patch = grade
            .patch
            .with_submitted_code(code.to_string())
            .with_output(output);
        Ok(grade)
    }
}

/// `100 * passed / total`, 0 when there is nothing to pass.
pub fn score_for(passed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let score = passed.min(total) * 100 / total;
    i32::try_from(score).unwrap_or(100)
}

fn summarize(results: &[TestCaseResult], all_passed: bool) -> String {
    let mut lines = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let verdict = if result.passed { "PASSED" } else { "FAILED" };
            format!("Test case {}: {}", i + 1, verdict)
        })
        .collect::<Vec<_>>();
    lines.push(if all_passed {
        "All tests passed!".to_string()
    } else {
        "Some tests failed.".to_string()
    });
    lines.join("\n")
}
