//! Code execution seam used when grading run, modify and make submissions.

use crate::ProgressResult;
use async_trait::async_trait;
use primm_types::TestCase;
use serde::{Deserialize, Serialize};

/// Output of running a submission once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub success: bool,
}

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
}

/// Sandboxed code runner.
///
/// Implementations are expected to bound time and resources themselves; the
/// grader only interprets the results.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn run(&self, code: &str) -> ProgressResult<ExecutionOutput>;

    async fn evaluate(
        &self,
        code: &str,
        test_cases: &[TestCase],
    ) -> ProgressResult<Vec<TestCaseResult>>;
}

/// Executor that never runs anything: `run` echoes the code back and every
/// test case passes with its expected output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubExecutor;

#[async_trait]
impl CodeExecutor for StubExecutor {
    async fn run(&self, code: &str) -> ProgressResult<ExecutionOutput> {
        Ok(ExecutionOutput {
            stdout: code.to_string(),
            success: true,
        })
    }

    async fn evaluate(
        &self,
        _code: &str,
        test_cases: &[TestCase],
    ) -> ProgressResult<Vec<TestCaseResult>> {
        Ok(test_cases
            .iter()
            .map(|case| TestCaseResult {
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                actual_output: case.expected_output.clone(),
                passed: true,
            })
            .collect())
    }
}
