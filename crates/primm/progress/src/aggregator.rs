//! Course completion reconciliation.

use crate::{ProgressError, ProgressResult};
use chrono::Utc;
use primm_storage::PrimmStorage;
use primm_types::{CourseId, StageId, UserId, PRIMM_STAGE_COUNT};
use std::sync::Arc;

/// Re-derives course completion from stage completion records and grants
/// the one-time course bonus.
pub struct CourseCompletionAggregator {
    storage: Arc<dyn PrimmStorage>,
}

impl CourseCompletionAggregator {
    pub fn new(storage: Arc<dyn PrimmStorage>) -> Self {
        Self { storage }
    }

    /// Returns whether the course is complete for the user.
    ///
    /// Safe to call any number of times, concurrently too: the bonus is
    /// credited only by the call that creates the course completion record.
    pub async fn reconcile(&self, user_id: UserId, course_id: CourseId) -> ProgressResult<bool> {
        let course = self
            .storage
            .get_course(course_id)
            .await
            .map_err(ProgressError::storage("load course"))?
            .ok_or_else(|| {
                ProgressError::NotFound(format!("course {} not found", course_id.get()))
            })?;

        let stages = self
            .storage
            .list_course_stages(course_id)
            .await
            .map_err(ProgressError::storage("list course stages"))?;
        if stages.is_empty() {
            return Ok(false);
        }
        if stages.len() != PRIMM_STAGE_COUNT {
            tracing::warn!(
                course_id = %course_id,
                stages = stages.len(),
                "Course does not have one stage per PRIMM phase"
            );
        }

        let stage_ids = stages.iter().map(|s| s.id).collect::<Vec<StageId>>();
        let completions = self
            .storage
            .list_completions(user_id, &stage_ids)
            .await
            .map_err(ProgressError::storage("list stage completions"))?;
        let completed = completions.iter().filter(|c| c.is_completed).count();
        if completed < stages.len() {
            tracing::debug!(
                user_id = %user_id,
                course_id = %course_id,
                completed,
                total = stages.len(),
                "Course not yet complete"
            );
            return Ok(false);
        }

        let awarded = self
            .storage
            .award_course_completion(user_id, course_id, course.coin_reward, Utc::now())
            .await
            .map_err(ProgressError::storage("award course completion"))?;
        if let Some(record) = awarded {
            tracing::info!(
                user_id = %user_id,
                course_id = %course_id,
                coins = record.coins_earned,
                "Course completed, bonus credited"
            );
        }
        Ok(true)
    }
}
