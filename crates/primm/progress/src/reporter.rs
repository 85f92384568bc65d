//! Read-only progress aggregation for dashboards.

use crate::{ProgressError, ProgressResult};
use primm_storage::PrimmStorage;
use primm_types::{
    CourseId, CourseProgress, LessonId, ProgressSummary, Reward, StageCompletion, StageId,
    StageProgress, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only progress queries over stage and course completion records.
pub struct ProgressReporter {
    storage: Arc<dyn PrimmStorage>,
}

impl ProgressReporter {
    pub fn new(storage: Arc<dyn PrimmStorage>) -> Self {
        Self { storage }
    }

    pub async fn stage_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
    ) -> ProgressResult<Option<StageCompletion>> {
        self.storage
            .get_completion(user_id, stage_id)
            .await
            .map_err(ProgressError::storage("load stage completion"))
    }

    /// Per-stage completion of one course.
    pub async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> ProgressResult<CourseProgress> {
        self.storage
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
        let stage_ids = stages.iter().map(|s| s.id).collect::<Vec<_>>();
        let completions = self
            .storage
            .list_completions(user_id, &stage_ids)
            .await
            .map_err(ProgressError::storage("list stage completions"))?
            .into_iter()
            .map(|c| (c.stage_id, c))
            .collect::<HashMap<_, _>>();

        let stages = stages
            .iter()
            .map(|stage| {
                let completion = completions.get(&stage.id).filter(|c| c.is_completed);
                StageProgress {
                    stage_id: stage.id,
                    stage_type: stage.stage_type(),
                    order_index: stage.order_index,
                    title: stage.title.clone(),
                    is_completed: completion.is_some(),
                    completed_at: completion.and_then(|c| c.completed_at),
                }
            })
            .collect::<Vec<_>>();
        let completed_count = stages.iter().filter(|s| s.is_completed).count();

        let course_completion = self
            .storage
            .get_course_completion(user_id, course_id)
            .await
            .map_err(ProgressError::storage("load course completion"))?;

        Ok(CourseProgress {
            course_id,
            total_stages: stages.len(),
            completed_count,
            percent: percent(completed_count, stages.len()),
            is_complete: course_completion.as_ref().is_some_and(|c| c.is_completed),
            coins_earned: course_completion.map_or(0, |c| c.coins_earned),
            stages,
        })
    }

    /// Course-level completion of one lesson. Inactive courses are ignored.
    pub async fn lesson_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> ProgressResult<ProgressSummary> {
        self.storage
            .get_lesson(lesson_id)
            .await
            .map_err(ProgressError::storage("load lesson"))?
            .ok_or_else(|| {
                ProgressError::NotFound(format!("lesson {} not found", lesson_id.get()))
            })?;

        let courses = self
            .storage
            .list_lesson_courses(lesson_id)
            .await
            .map_err(ProgressError::storage("list lesson courses"))?
            .into_iter()
            .filter(|c| c.is_active)
            .collect::<Vec<_>>();
        let course_ids = courses.iter().map(|c| c.id).collect::<Vec<_>>();

        let course_completions = self
            .storage
            .list_course_completions(user_id, &course_ids)
            .await
            .map_err(ProgressError::storage("list course completions"))?;
        let completed_courses = course_completions
            .iter()
            .filter(|c| c.is_completed)
            .count();
        let coins_earned = course_completions.iter().map(|c| c.coins_earned).sum();

        let mut xp_earned = 0;
        for course_id in &course_ids {
            let stages = self
                .storage
                .list_course_stages(*course_id)
                .await
                .map_err(ProgressError::storage("list course stages"))?;
            let stage_ids = stages.iter().map(|s| s.id).collect::<Vec<_>>();
            let completions = self
                .storage
                .list_completions(user_id, &stage_ids)
                .await
                .map_err(ProgressError::storage("list stage completions"))?;
            xp_earned += completions
                .iter()
                .filter(|c| c.is_completed)
                .map(|c| Reward::for_stage(c.stage_type).xp)
                .sum::<i64>();
        }

        let total_courses = courses.len();
        let percent = if total_courses == 0 {
            0.0
        } else {
            completed_courses as f64 * 100.0 / total_courses as f64
        };

        Ok(ProgressSummary {
            lesson_id,
            total_courses,
            completed_courses,
            percent,
            coins_earned,
            xp_earned,
        })
    }
}

/// Integer percentage, 0 when `total` is 0.
fn percent(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    i32::try_from(completed * 100 / total).unwrap_or(100)
}
