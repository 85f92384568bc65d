use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primm_types::{
    CompletionPatch, Course, CourseCompletion, CourseId, Lesson, LessonId, Reward, Stage,
    StageCompletion, StageId, UserAccount, UserId,
};

/// Read-only view of the authoring catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_stage(&self, stage_id: StageId) -> StorageResult<Option<Stage>>;

    /// All stages of a course ordered by `order_index`.
    async fn list_course_stages(&self, course_id: CourseId) -> StorageResult<Vec<Stage>>;

    async fn get_course(&self, course_id: CourseId) -> StorageResult<Option<Course>>;

    async fn get_lesson(&self, lesson_id: LessonId) -> StorageResult<Option<Lesson>>;

    /// All courses of a lesson ordered by `order_index`, active or not.
    async fn list_lesson_courses(&self, lesson_id: LessonId) -> StorageResult<Vec<Course>>;
}

/// Storage interface for per (user, stage) completion records.
#[async_trait]
pub trait CompletionStore: Send + Sync {
    /// Insert or update the record for (user, stage) in one atomic step and
    /// return the stored state.
    async fn upsert_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
        patch: CompletionPatch,
        at: DateTime<Utc>,
    ) -> StorageResult<StageCompletion>;

    async fn get_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
    ) -> StorageResult<Option<StageCompletion>>;

    async fn list_completions(
        &self,
        user_id: UserId,
        stage_ids: &[StageId],
    ) -> StorageResult<Vec<StageCompletion>>;

    /// Mark the per-stage reward as claimed and credit it to the account in
    /// one atomic step. Returns the credited account, or `None` when the
    /// reward was already claimed, in which case nothing is credited. When
    /// the credit fails the claim is not recorded.
    async fn claim_and_credit(
        &self,
        user_id: UserId,
        stage_id: StageId,
        reward: Reward,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<UserAccount>>;
}

/// Storage interface for per (user, course) completion records.
#[async_trait]
pub trait CourseCompletionStore: Send + Sync {
    /// Create the course completion record and credit `coins` to the account
    /// in one transaction. Returns `None` when the record already existed, in
    /// which case nothing is credited.
    async fn award_course_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
        coins: i64,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<CourseCompletion>>;

    async fn get_course_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> StorageResult<Option<CourseCompletion>>;

    async fn list_course_completions(
        &self,
        user_id: UserId,
        course_ids: &[CourseId],
    ) -> StorageResult<Vec<CourseCompletion>>;
}

/// Storage interface for reward accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, user_id: UserId) -> StorageResult<Option<UserAccount>>;

    /// Add coins and experience; fails with `NotFound` for unknown users.
    async fn credit_account(
        &self,
        user_id: UserId,
        coins: i64,
        xp: i64,
    ) -> StorageResult<UserAccount>;

    /// Store `max(current level, level)`.
    async fn raise_level(&self, user_id: UserId, level: i32) -> StorageResult<UserAccount>;
}

/// Unified storage bundle used by the progress core.
pub trait PrimmStorage:
    CatalogStore + CompletionStore + CourseCompletionStore + AccountStore + Send + Sync
{
}

impl<T> PrimmStorage for T where
    T: CatalogStore + CompletionStore + CourseCompletionStore + AccountStore + Send + Sync
{
}
