//! In-memory reference implementation of the PRIMM storage traits.
//!
//! This adapter is deterministic and test-friendly. Each operation holds the
//! write lock of the tables it touches for its whole duration, which gives the
//! same atomicity as the statement-level upserts of the PostgreSQL adapter.

use crate::traits::{AccountStore, CatalogStore, CompletionStore, CourseCompletionStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primm_types::{
    CompletionPatch, Course, CourseCompletion, CourseId, Lesson, LessonId, Reward, Stage,
    StageCompletion, StageId, UserAccount, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// Catalog and account fixtures loaded into the in-memory adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub accounts: Vec<UserAccount>,
}

impl CatalogSeed {
    /// Read a JSON seed file.
    pub fn from_json_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StorageError::InvalidInput(format!("cannot read seed {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// In-memory PRIMM storage adapter.
#[derive(Debug, Default)]
pub struct InMemoryPrimmStorage {
    lessons: RwLock<HashMap<LessonId, Lesson>>,
    courses: RwLock<HashMap<CourseId, Course>>,
    stages: RwLock<HashMap<StageId, Stage>>,
    completions: RwLock<HashMap<(UserId, StageId), StageCompletion>>,
    course_completions: RwLock<HashMap<(UserId, CourseId), CourseCompletion>>,
    accounts: RwLock<HashMap<UserId, UserAccount>>,
    next_completion_id: AtomicI64,
    next_course_completion_id: AtomicI64,
}

impl InMemoryPrimmStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: CatalogSeed) -> Self {
        Self {
            lessons: RwLock::new(seed.lessons.into_iter().map(|l| (l.id, l)).collect()),
            courses: RwLock::new(seed.courses.into_iter().map(|c| (c.id, c)).collect()),
            stages: RwLock::new(seed.stages.into_iter().map(|s| (s.id, s)).collect()),
            accounts: RwLock::new(seed.accounts.into_iter().map(|a| (a.user_id, a)).collect()),
            ..Self::default()
        }
    }

    pub async fn insert_lesson(&self, lesson: Lesson) {
        self.lessons.write().await.insert(lesson.id, lesson);
    }

    pub async fn insert_course(&self, course: Course) {
        self.courses.write().await.insert(course.id, course);
    }

    pub async fn insert_stage(&self, stage: Stage) {
        self.stages.write().await.insert(stage.id, stage);
    }

    pub async fn insert_account(&self, account: UserAccount) {
        self.accounts.write().await.insert(account.user_id, account);
    }

    /// Number of completion records stored for (user, stage); at most one.
    pub async fn completion_count(&self, user_id: UserId, stage_id: StageId) -> usize {
        let completions = self.completions.read().await;
        completions
            .keys()
            .filter(|(user, stage)| *user == user_id && *stage == stage_id)
            .count()
    }
}

#[async_trait]
impl CatalogStore for InMemoryPrimmStorage {
    async fn get_stage(&self, stage_id: StageId) -> StorageResult<Option<Stage>> {
        Ok(self.stages.read().await.get(&stage_id).cloned())
    }

    async fn list_course_stages(&self, course_id: CourseId) -> StorageResult<Vec<Stage>> {
        let stages = self.stages.read().await;
        let mut values = stages
            .values()
            .filter(|stage| stage.course_id == course_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|stage| (stage.order_index, stage.id));
        Ok(values)
    }

    async fn get_course(&self, course_id: CourseId) -> StorageResult<Option<Course>> {
        Ok(self.courses.read().await.get(&course_id).cloned())
    }

    async fn get_lesson(&self, lesson_id: LessonId) -> StorageResult<Option<Lesson>> {
        Ok(self.lessons.read().await.get(&lesson_id).cloned())
    }

    async fn list_lesson_courses(&self, lesson_id: LessonId) -> StorageResult<Vec<Course>> {
        let courses = self.courses.read().await;
        let mut values = courses
            .values()
            .filter(|course| course.lesson_id == lesson_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|course| (course.order_index, course.id));
        Ok(values)
    }
}

#[async_trait]
impl CompletionStore for InMemoryPrimmStorage {
    async fn upsert_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
        patch: CompletionPatch,
        at: DateTime<Utc>,
    ) -> StorageResult<StageCompletion> {
        let mut completions = self.completions.write().await;
        let record = match completions.get_mut(&(user_id, stage_id)) {
            Some(existing) => {
                if existing.stage_type != patch.stage_type {
                    return Err(StorageError::Conflict(format!(
                        "completion {}/{} holds {} data, got {}",
                        user_id, stage_id, existing.stage_type, patch.stage_type
                    )));
                }
                existing.apply(&patch, at);
                existing.clone()
            }
            None => {
                let id = self.next_completion_id.fetch_add(1, Ordering::SeqCst) + 1;
                let record = StageCompletion::from_patch(id, user_id, stage_id, &patch, at);
                completions.insert((user_id, stage_id), record.clone());
                record
            }
        };
        Ok(record)
    }

    async fn get_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
    ) -> StorageResult<Option<StageCompletion>> {
        Ok(self.completions.read().await.get(&(user_id, stage_id)).cloned())
    }

    async fn list_completions(
        &self,
        user_id: UserId,
        stage_ids: &[StageId],
    ) -> StorageResult<Vec<StageCompletion>> {
        let completions = self.completions.read().await;
        Ok(stage_ids
            .iter()
            .filter_map(|stage_id| completions.get(&(user_id, *stage_id)).cloned())
            .collect())
    }

    async fn claim_and_credit(
        &self,
        user_id: UserId,
        stage_id: StageId,
        reward: Reward,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<UserAccount>> {
        let mut completions = self.completions.write().await;
        let record = completions.get_mut(&(user_id, stage_id)).ok_or_else(|| {
            StorageError::NotFound(format!(
                "completion {}/{} not found",
                user_id.get(),
                stage_id.get()
            ))
        })?;
        if record.rewarded_at.is_some() {
            return Ok(None);
        }

        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&user_id).ok_or_else(|| {
            StorageError::NotFound(format!("account {} not found", user_id.get()))
        })?;
        account.total_coins += reward.coins;
        account.experience_points += reward.xp;
        record.rewarded_at = Some(at);
        Ok(Some(account.clone()))
    }
}

#[async_trait]
impl CourseCompletionStore for InMemoryPrimmStorage {
    async fn award_course_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
        coins: i64,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<CourseCompletion>> {
        let mut course_completions = self.course_completions.write().await;
        if course_completions.contains_key(&(user_id, course_id)) {
            return Ok(None);
        }

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::NotFound(format!("account {} not found", user_id.get())))?;
        account.total_coins += coins;

        let record = CourseCompletion {
            id: self.next_course_completion_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id,
            course_id,
            is_completed: true,
            completed_at: Some(at),
            coins_earned: coins,
            created_at: at,
        };
        course_completions.insert((user_id, course_id), record.clone());
        Ok(Some(record))
    }

    async fn get_course_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> StorageResult<Option<CourseCompletion>> {
        Ok(self
            .course_completions
            .read()
            .await
            .get(&(user_id, course_id))
            .cloned())
    }

    async fn list_course_completions(
        &self,
        user_id: UserId,
        course_ids: &[CourseId],
    ) -> StorageResult<Vec<CourseCompletion>> {
        let course_completions = self.course_completions.read().await;
        Ok(course_ids
            .iter()
            .filter_map(|course_id| course_completions.get(&(user_id, *course_id)).cloned())
            .collect())
    }
}

#[async_trait]
impl AccountStore for InMemoryPrimmStorage {
    async fn get_account(&self, user_id: UserId) -> StorageResult<Option<UserAccount>> {
        Ok(self.accounts.read().await.get(&user_id).cloned())
    }

    async fn credit_account(
        &self,
        user_id: UserId,
        coins: i64,
        xp: i64,
    ) -> StorageResult<UserAccount> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::NotFound(format!("account {} not found", user_id.get())))?;
        account.total_coins += coins;
        account.experience_points += xp;
        Ok(account.clone())
    }

    async fn raise_level(&self, user_id: UserId, level: i32) -> StorageResult<UserAccount> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::NotFound(format!("account {} not found", user_id.get())))?;
        account.level = account.level.max(level);
        Ok(account.clone())
    }
}
