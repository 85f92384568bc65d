//! Submission pipeline: grade, upsert, reward, level, reconcile.

use crate::aggregator::CourseCompletionAggregator;
use crate::config::{ProgressConfig, RewardPolicy};
use crate::executor::CodeExecutor;
use crate::grader::{Grade, StageGrader};
use crate::ledger::RewardLedger;
use crate::reporter::ProgressReporter;
use crate::worker::ReconcileQueue;
use crate::{ProgressError, ProgressResult};
use chrono::{DateTime, Utc};
use primm_storage::PrimmStorage;
use primm_types::{
    CourseId, CourseProgress, LessonId, ProgressSummary, Reward, RewardResponse, Stage,
    StageCompletion, StageId, StageSubmissionRequest, StageType, Submission, SubmissionResult,
    SubmitInvestigateRequest, SubmitMakeRequest, SubmitModifyRequest, SubmitPredictRequest,
    SubmitRunRequest, UserAccount, UserId,
};
use std::sync::Arc;

/// Everything one pass through the pipeline produced.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub stage: Stage,
    pub grade: Grade,
    pub record: StageCompletion,
    pub reward: Reward,
    pub new_level: Option<i32>,
    pub course_completed: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Entry point of the progress core.
pub struct ProgressService {
    storage: Arc<dyn PrimmStorage>,
    config: ProgressConfig,
    grader: StageGrader,
    ledger: RewardLedger,
    aggregator: Arc<CourseCompletionAggregator>,
    reporter: ProgressReporter,
    retry_queue: Option<ReconcileQueue>,
}

impl ProgressService {
    pub fn new(
        storage: Arc<dyn PrimmStorage>,
        executor: Arc<dyn CodeExecutor>,
        config: ProgressConfig,
    ) -> Self {
        Self {
            grader: StageGrader::new(executor, config.investigate_min_chars),
            ledger: RewardLedger::new(storage.clone()),
            aggregator: Arc::new(CourseCompletionAggregator::new(storage.clone())),
            reporter: ProgressReporter::new(storage.clone()),
            storage,
            config,
            retry_queue: None,
        }
    }

    /// Hand failed inline reconciliations to a [`ReconcileWorker`](crate::ReconcileWorker).
    pub fn with_retry_queue(mut self, queue: ReconcileQueue) -> Self {
        self.retry_queue = Some(queue);
        self
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    pub fn aggregator(&self) -> Arc<CourseCompletionAggregator> {
        self.aggregator.clone()
    }

    /// Generic submission path.
    pub async fn submit_stage(
        &self,
        user_id: UserId,
        stage_id: StageId,
        request: StageSubmissionRequest,
    ) -> ProgressResult<SubmissionResult> {
        let submission = request.into_submission().ok_or_else(|| {
            ProgressError::NotFound(format!(
                "stage {} not found for untyped submission",
                stage_id.get()
            ))
        })?;
        let outcome = self.process(user_id, stage_id, submission).await?;
        Ok(SubmissionResult {
            stage_id,
            submission_type: outcome.stage.stage_type(),
            is_correct: outcome.grade.is_correct,
            score: outcome.grade.score,
            data: outcome.grade.data,
            coins_earned: outcome.reward.coins,
            xp_earned: outcome.reward.xp,
            submitted_at: outcome.submitted_at,
        })
    }

    pub async fn submit_predict(
        &self,
        user_id: UserId,
        request: SubmitPredictRequest,
    ) -> ProgressResult<RewardResponse> {
        self.submit_typed(user_id, request.stage_id, request.into()).await
    }

    pub async fn submit_run(
        &self,
        user_id: UserId,
        request: SubmitRunRequest,
    ) -> ProgressResult<RewardResponse> {
        self.submit_typed(user_id, request.stage_id, request.into()).await
    }

    pub async fn submit_investigate(
        &self,
        user_id: UserId,
        request: SubmitInvestigateRequest,
    ) -> ProgressResult<RewardResponse> {
        self.submit_typed(user_id, request.stage_id, request.into()).await
    }

    pub async fn submit_modify(
        &self,
        user_id: UserId,
        request: SubmitModifyRequest,
    ) -> ProgressResult<RewardResponse> {
        self.submit_typed(user_id, request.stage_id, request.into()).await
    }

    pub async fn submit_make(
        &self,
        user_id: UserId,
        request: SubmitMakeRequest,
    ) -> ProgressResult<RewardResponse> {
        self.submit_typed(user_id, request.stage_id, request.into()).await
    }

    pub async fn stage_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
    ) -> ProgressResult<Option<StageCompletion>> {
        self.reporter.stage_completion(user_id, stage_id).await
    }

    pub async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> ProgressResult<CourseProgress> {
        self.reporter.course_progress(user_id, course_id).await
    }

    pub async fn lesson_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> ProgressResult<ProgressSummary> {
        self.reporter.lesson_progress(user_id, lesson_id).await
    }

    pub async fn account(&self, user_id: UserId) -> ProgressResult<UserAccount> {
        self.storage
            .get_account(user_id)
            .await
            .map_err(ProgressError::storage("load account"))?
            .ok_or_else(|| ProgressError::NotFound(format!("account {} not found", user_id.get())))
    }

    async fn submit_typed(
        &self,
        user_id: UserId,
        stage_id: StageId,
        submission: Submission,
    ) -> ProgressResult<RewardResponse> {
        let outcome = self.process(user_id, stage_id, submission).await?;
        Ok(RewardResponse {
            success: true,
            is_correct: outcome.grade.is_correct,
            message: message_for(&outcome, self.config.investigate_min_chars),
            coins_earned: outcome.reward.coins,
            xp_earned: outcome.reward.xp,
            output: outcome.grade.output.clone(),
            new_level: outcome.new_level,
            course_completed: outcome.course_completed,
        })
    }

    /// Run one submission through the whole pipeline.
    pub async fn process(
        &self,
        user_id: UserId,
        stage_id: StageId,
        submission: Submission,
    ) -> ProgressResult<SubmissionOutcome> {
        let stage = self
            .storage
            .get_stage(stage_id)
            .await
            .map_err(ProgressError::storage("load stage"))?
            .ok_or_else(|| {
                ProgressError::NotFound(format!(
                    "{} stage {} not found",
                    submission.stage_type(),
                    stage_id.get()
                ))
            })?;

        let grade = self.grader.grade(&stage, &submission).await?;
        let submitted_at = Utc::now();
        let record = self
            .storage
            .upsert_completion(user_id, stage_id, grade.patch.clone(), submitted_at)
            .await
            .map_err(ProgressError::storage("upsert stage completion"))?;

        tracing::info!(
            user_id = %user_id,
            stage_id = %stage_id,
            stage_type = %stage.stage_type(),
            is_correct = grade.is_correct,
            score = grade.score,
            attempt = record.attempts(),
            "Stage submission graded"
        );

        let rewarded = self.apply_reward(user_id, &stage, &grade, submitted_at).await;
        if let Err(error) = &rewarded {
            tracing::warn!(
                user_id = %user_id,
                stage_id = %stage.id,
                error = %error,
                "Reward step failed"
            );
        }

        // The completion is already stored, so the course is reconciled even
        // when the reward step failed.
        let course_completed = if record.is_completed {
            self.reconcile_course(user_id, stage.course_id).await
        } else {
            false
        };
        let (reward, new_level) = rewarded?;

        Ok(SubmissionOutcome {
            stage,
            grade,
            record,
            reward,
            new_level,
            course_completed,
            submitted_at,
        })
    }

    async fn apply_reward(
        &self,
        user_id: UserId,
        stage: &Stage,
        grade: &Grade,
        at: DateTime<Utc>,
    ) -> ProgressResult<(Reward, Option<i32>)> {
        if !grade.is_correct {
            return Ok((Reward::NONE, None));
        }
        let reward = Reward::for_stage(stage.stage_type());
        match self.config.reward_policy {
            RewardPolicy::EveryCorrectSubmission => {
                let entry = self.ledger.award(user_id, reward).await?;
                Ok((reward, entry.new_level))
            }
            RewardPolicy::FirstCompletion => {
                match self.ledger.award_once(user_id, stage.id, reward, at).await? {
                    Some(entry) => Ok((reward, entry.new_level)),
                    None => Ok((Reward::NONE, None)),
                }
            }
        }
    }

    /// Inline reconciliation. Failures never fail the submission; they are
    /// logged and queued for retry.
    async fn reconcile_course(&self, user_id: UserId, course_id: CourseId) -> bool {
        match self.aggregator.reconcile(user_id, course_id).await {
            Ok(is_complete) => is_complete,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    course_id = %course_id,
                    error = %e,
                    "Inline course reconciliation failed"
                );
                match &self.retry_queue {
                    Some(queue) => {
                        queue.enqueue(user_id, course_id);
                    }
                    None => tracing::error!(
                        user_id = %user_id,
                        course_id = %course_id,
                        "No reconcile worker configured; course completion not retried"
                    ),
                }
                false
            }
        }
    }
}

fn message_for(outcome: &SubmissionOutcome, investigate_min_chars: usize) -> String {
    let correct = outcome.grade.is_correct;
    let base = match (outcome.stage.stage_type(), correct) {
        (StageType::Predict, true) => "Correct answer, well done!".to_string(),
        (StageType::Predict, false) => "Wrong answer. Try again!".to_string(),
        (StageType::Run, _) => "Code ran successfully!".to_string(),
        (StageType::Investigate, true) => "Reflection saved!".to_string(),
        (StageType::Investigate, false) => format!(
            "Reflection saved, but it needs at least {investigate_min_chars} characters \
             to complete this stage."
        ),
        (StageType::Modify | StageType::Make, true) => "All test cases passed!".to_string(),
        (StageType::Modify | StageType::Make, false) => {
            "Some test cases failed. Try again!".to_string()
        }
    };
    if outcome.course_completed && correct {
        format!("{base} Course completed!")
    } else {
        base
    }
}
