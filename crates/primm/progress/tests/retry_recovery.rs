use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primm_progress::{
    ProgressConfig, ProgressError, ProgressService, ReconcileConfig, ReconcileWorker,
    RewardPolicy, StubExecutor,
};
use primm_storage::{
    AccountStore, CatalogStore, CompletionStore, CourseCompletionStore, InMemoryPrimmStorage,
    StorageError, StorageResult,
};
use primm_types::{
    CompletionPatch, Course, CourseCompletion, CourseId, Lesson, LessonId, Reward, Stage,
    StageCompletion, StageContent, StageId, SubmitPredictRequest, SubmitRunRequest, UserAccount,
    UserId,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STUDENT: UserId = UserId(9);
const COURSE: CourseId = CourseId(5);

/// In-memory storage whose next `credit_account` call fails with a backend
/// error.
struct FlakyCreditStorage {
    inner: InMemoryPrimmStorage,
    fail_next_credit: AtomicBool,
}

impl FlakyCreditStorage {
    fn new(inner: InMemoryPrimmStorage) -> Self {
        Self {
            inner,
            fail_next_credit: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl CatalogStore for FlakyCreditStorage {
    async fn get_stage(&self, stage_id: StageId) -> StorageResult<Option<Stage>> {
        self.inner.get_stage(stage_id).await
    }

    async fn list_course_stages(&self, course_id: CourseId) -> StorageResult<Vec<Stage>> {
        self.inner.list_course_stages(course_id).await
    }

    async fn get_course(&self, course_id: CourseId) -> StorageResult<Option<Course>> {
        self.inner.get_course(course_id).await
    }

    async fn get_lesson(&self, lesson_id: LessonId) -> StorageResult<Option<Lesson>> {
        self.inner.get_lesson(lesson_id).await
    }

    async fn list_lesson_courses(&self, lesson_id: LessonId) -> StorageResult<Vec<Course>> {
        self.inner.list_lesson_courses(lesson_id).await
    }
}

#[async_trait]
impl CompletionStore for FlakyCreditStorage {
    async fn upsert_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
        patch: CompletionPatch,
        at: DateTime<Utc>,
    ) -> StorageResult<StageCompletion> {
        self.inner.upsert_completion(user_id, stage_id, patch, at).await
    }

    async fn get_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
    ) -> StorageResult<Option<StageCompletion>> {
        self.inner.get_completion(user_id, stage_id).await
    }

    async fn list_completions(
        &self,
        user_id: UserId,
        stage_ids: &[StageId],
    ) -> StorageResult<Vec<StageCompletion>> {
        self.inner.list_completions(user_id, stage_ids).await
    }

    async fn claim_and_credit(
        &self,
        user_id: UserId,
        stage_id: StageId,
        reward: Reward,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<UserAccount>> {
        self.inner.claim_and_credit(user_id, stage_id, reward, at).await
    }
}

#[async_trait]
impl CourseCompletionStore for FlakyCreditStorage {
    async fn award_course_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
        coins: i64,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<CourseCompletion>> {
        self.inner
            .award_course_completion(user_id, course_id, coins, at)
            .await
    }

    async fn get_course_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> StorageResult<Option<CourseCompletion>> {
        self.inner.get_course_completion(user_id, course_id).await
    }

    async fn list_course_completions(
        &self,
        user_id: UserId,
        course_ids: &[CourseId],
    ) -> StorageResult<Vec<CourseCompletion>> {
        self.inner.list_course_completions(user_id, course_ids).await
    }
}

#[async_trait]
impl AccountStore for FlakyCreditStorage {
    async fn get_account(&self, user_id: UserId) -> StorageResult<Option<UserAccount>> {
        self.inner.get_account(user_id).await
    }

    async fn credit_account(
        &self,
        user_id: UserId,
        coins: i64,
        xp: i64,
    ) -> StorageResult<UserAccount> {
        if self.fail_next_credit.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Backend("connection reset".to_string()));
        }
        self.inner.credit_account(user_id, coins, xp).await
    }

    async fn raise_level(&self, user_id: UserId, level: i32) -> StorageResult<UserAccount> {
        self.inner.raise_level(user_id, level).await
    }
}

fn course() -> Course {
    Course {
        id: COURSE,
        lesson_id: LessonId::new(1),
        title: "Conditionals".to_string(),
        description: String::new(),
        order_index: 1,
        coin_reward: 150,
        is_active: true,
    }
}

fn single_stage(id: i64, content: StageContent) -> Stage {
    Stage {
        id: StageId::new(id),
        course_id: COURSE,
        title: format!("stage {id}"),
        description: String::new(),
        order_index: 1,
        is_active: true,
        code_snippet: Some("print(3 * 2)".to_string()),
        content,
    }
}

fn run_stage() -> Stage {
    single_stage(51, StageContent::Run { code_template: None })
}

fn predict_stage() -> Stage {
    single_stage(
        52,
        StageContent::Predict {
            options: BTreeMap::from([
                ("A".to_string(), "5".to_string()),
                ("B".to_string(), "6".to_string()),
            ]),
            correct_answer: Some("B".to_string()),
        },
    )
}

fn run_request() -> SubmitRunRequest {
    SubmitRunRequest {
        stage_id: StageId::new(51),
        submitted_code: "print(3 * 2)".to_string(),
    }
}

fn predict_request() -> SubmitPredictRequest {
    SubmitPredictRequest {
        stage_id: StageId::new(52),
        selected_answer: "B".to_string(),
    }
}

#[tokio::test]
async fn failed_stage_credit_still_completes_course() {
    let inner = InMemoryPrimmStorage::new();
    inner.insert_course(course()).await;
    inner.insert_stage(run_stage()).await;
    inner.insert_account(UserAccount::new(STUDENT, "Ayu")).await;
    let storage = Arc::new(FlakyCreditStorage::new(inner));
    let service = ProgressService::new(
        storage.clone(),
        Arc::new(StubExecutor),
        ProgressConfig::default(),
    );

    let result = service.submit_run(STUDENT, run_request()).await;
    assert!(matches!(result, Err(ProgressError::Storage { .. })));

    // The course was reconciled although the stage reward was not credited.
    let awarded = storage.get_course_completion(STUDENT, COURSE).await.unwrap();
    assert_eq!(awarded.map(|c| c.coins_earned), Some(150));
    let account = storage.get_account(STUDENT).await.unwrap().unwrap();
    assert_eq!(account.total_coins, 150);
    assert_eq!(account.experience_points, 0);

    let response = service.submit_run(STUDENT, run_request()).await.unwrap();
    assert_eq!(response.coins_earned, 50);
    assert!(response.course_completed);
    let account = storage.get_account(STUDENT).await.unwrap().unwrap();
    assert_eq!(account.total_coins, 200);
    assert_eq!(account.experience_points, 20);
}

#[tokio::test]
async fn first_completion_reward_survives_a_failed_credit() {
    let storage = Arc::new(InMemoryPrimmStorage::new());
    storage.insert_course(course()).await;
    storage.insert_stage(predict_stage()).await;
    let config = ProgressConfig {
        reward_policy: RewardPolicy::FirstCompletion,
        ..ProgressConfig::default()
    };
    let service = ProgressService::new(storage.clone(), Arc::new(StubExecutor), config);

    // No account yet, so the credit fails and the claim must not stick.
    let result = service.submit_predict(STUDENT, predict_request()).await;
    assert!(matches!(result, Err(ProgressError::NotFound(_))));
    let record = storage
        .get_completion(STUDENT, StageId::new(52))
        .await
        .unwrap()
        .unwrap();
    assert!(record.is_completed);
    assert!(record.rewarded_at.is_none());

    storage.insert_account(UserAccount::new(STUDENT, "Ayu")).await;
    let response = service.submit_predict(STUDENT, predict_request()).await.unwrap();
    assert_eq!(response.coins_earned, 50);
    assert_eq!(response.xp_earned, 20);
    assert!(response.course_completed);

    let account = storage.get_account(STUDENT).await.unwrap().unwrap();
    assert_eq!(account.total_coins, 200);
    assert_eq!(account.experience_points, 20);

    let again = service.submit_predict(STUDENT, predict_request()).await.unwrap();
    assert_eq!(again.coins_earned, 0);
}

#[tokio::test]
async fn failed_inline_reconcile_is_retried_by_worker() {
    let storage = Arc::new(InMemoryPrimmStorage::new());
    storage.insert_stage(run_stage()).await;
    storage.insert_account(UserAccount::new(STUDENT, "Ayu")).await;

    let service = ProgressService::new(
        storage.clone(),
        Arc::new(StubExecutor),
        ProgressConfig::default(),
    );
    let reconcile = ReconcileConfig {
        max_attempts: 50,
        initial_backoff_ms: 2,
        max_backoff_ms: 10,
        queue_capacity: 4,
        shutdown_grace_ms: 1000,
    };
    let (worker, rx) = ReconcileWorker::new(service.aggregator(), reconcile);
    let service = service.with_retry_queue(worker.queue());
    let handle = tokio::spawn(worker.clone().start(rx));

    // The course row is missing, so the inline reconcile fails and is queued.
    let response = service.submit_run(STUDENT, run_request()).await.unwrap();
    assert!(!response.course_completed);
    assert_eq!(response.coins_earned, 50);

    storage.insert_course(course()).await;
    let mut awarded = None;
    for _ in 0..100 {
        awarded = storage.get_course_completion(STUDENT, COURSE).await.unwrap();
        if awarded.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(awarded.map(|c| c.coins_earned), Some(150));

    worker.stop().await;
    handle.await.unwrap();
    let account = storage.get_account(STUDENT).await.unwrap().unwrap();
    assert_eq!(account.total_coins, 200);
}
