//! PostgreSQL adapter for PRIMM storage.
//!
//! This adapter is the transactional source of truth. Completion upserts are
//! single `INSERT ... ON CONFLICT DO UPDATE` statements, and the course bonus
//! is inserted and credited inside one transaction, so concurrent submissions
//! for the same user never double count.

use crate::traits::{AccountStore, CatalogStore, CompletionStore, CourseCompletionStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primm_types::{
    CompletionPatch, Course, CourseCompletion, CourseId, Lesson, LessonId, Reward, Stage,
    StageCompletion, StageContent, StageId, StageType, TestCase, UserAccount, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::BTreeMap;

const STAGE_COLUMNS: &str = r#"
    id, course_id, stage_type, title, description, order_index, is_active, code_snippet,
    predict_options, correct_answer, run_code_template,
    video_embed_url, guiding_questions, reflection_prompt,
    modify_challenge, modify_expected_output, modify_test_cases,
    make_challenge, make_expected_output, make_test_cases
"#;

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresPrimmStorage {
    pool: PgPool,
}

impl PostgresPrimmStorage {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                full_name TEXT NOT NULL DEFAULT '',
                total_coins BIGINT NOT NULL DEFAULT 0,
                experience_points BIGINT NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 1
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS lessons (
                id BIGSERIAL PRIMARY KEY,
                teacher_id BIGINT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                difficulty TEXT NOT NULL DEFAULT '',
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS courses (
                id BIGSERIAL PRIMARY KEY,
                lesson_id BIGINT NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                order_index INTEGER NOT NULL,
                coin_reward BIGINT NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS primm_stages (
                id BIGSERIAL PRIMARY KEY,
                course_id BIGINT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
                stage_type TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                order_index INTEGER NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                code_snippet TEXT,
                predict_options JSONB,
                correct_answer TEXT,
                run_code_template TEXT,
                video_embed_url TEXT,
                guiding_questions JSONB,
                reflection_prompt TEXT,
                modify_challenge TEXT,
                modify_expected_output TEXT,
                modify_test_cases JSONB,
                make_challenge TEXT,
                make_expected_output TEXT,
                make_test_cases JSONB,
                UNIQUE (course_id, order_index)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_stage_completions (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                stage_id BIGINT NOT NULL REFERENCES primm_stages(id) ON DELETE CASCADE,
                predict_selected_answer TEXT,
                predict_is_correct BOOLEAN NOT NULL DEFAULT FALSE,
                run_submitted_code TEXT,
                run_output TEXT,
                investigate_reflection TEXT,
                investigate_completed BOOLEAN NOT NULL DEFAULT FALSE,
                modify_submitted_code TEXT,
                modify_output TEXT,
                modify_is_correct BOOLEAN NOT NULL DEFAULT FALSE,
                modify_attempts INTEGER NOT NULL DEFAULT 0,
                make_submitted_code TEXT,
                make_output TEXT,
                make_is_correct BOOLEAN NOT NULL DEFAULT FALSE,
                make_attempts INTEGER NOT NULL DEFAULT 0,
                is_completed BOOLEAN NOT NULL DEFAULT FALSE,
                completed_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (user_id, stage_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_course_completions (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                course_id BIGINT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
                is_completed BOOLEAN NOT NULL DEFAULT TRUE,
                completed_at TIMESTAMPTZ,
                coins_earned BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL,
                UNIQUE (user_id, course_id)
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }

        // Columns missing from databases created by earlier releases.
        let upgrades = [
            "ALTER TABLE user_stage_completions \
             ADD COLUMN IF NOT EXISTS stage_type TEXT NOT NULL DEFAULT 'predict'",
            "ALTER TABLE user_stage_completions \
             ADD COLUMN IF NOT EXISTS last_score INTEGER NOT NULL DEFAULT 0",
            "ALTER TABLE user_stage_completions \
             ADD COLUMN IF NOT EXISTS submission_data JSONB NOT NULL DEFAULT 'null'::jsonb",
            "ALTER TABLE user_stage_completions ADD COLUMN IF NOT EXISTS rewarded_at TIMESTAMPTZ",
        ];
        for stmt in upgrades {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema upgrade failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresPrimmStorage {
    async fn get_stage(&self, stage_id: StageId) -> StorageResult<Option<Stage>> {
        let row = sqlx::query(&format!(
            "SELECT {STAGE_COLUMNS} FROM primm_stages WHERE id = $1"
        ))
        .bind(stage_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(stage_row_to_record).transpose()
    }

    async fn list_course_stages(&self, course_id: CourseId) -> StorageResult<Vec<Stage>> {
        let rows = sqlx::query(&format!(
            "SELECT {STAGE_COLUMNS} FROM primm_stages WHERE course_id = $1 \
             ORDER BY order_index ASC, id ASC"
        ))
        .bind(course_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(stage_row_to_record).collect()
    }

    async fn get_course(&self, course_id: CourseId) -> StorageResult<Option<Course>> {
        let row = sqlx::query(
            r#"
            SELECT id, lesson_id, title, description, order_index, coin_reward, is_active
            FROM courses
            WHERE id = $1
            "#,
        )
        .bind(course_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(course_row_to_record).transpose()
    }

    async fn get_lesson(&self, lesson_id: LessonId) -> StorageResult<Option<Lesson>> {
        let row = sqlx::query(
            r#"
            SELECT id, teacher_id, title, description, category, difficulty, is_active
            FROM lessons
            WHERE id = $1
            "#,
        )
        .bind(lesson_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(lesson_row_to_record).transpose()
    }

    async fn list_lesson_courses(&self, lesson_id: LessonId) -> StorageResult<Vec<Course>> {
        let rows = sqlx::query(
            r#"
            SELECT id, lesson_id, title, description, order_index, coin_reward, is_active
            FROM courses
            WHERE lesson_id = $1
            ORDER BY order_index ASC, id ASC
            "#,
        )
        .bind(lesson_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(course_row_to_record).collect()
    }
}

#[async_trait]
impl CompletionStore for PostgresPrimmStorage {
    async fn upsert_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
        patch: CompletionPatch,
        at: DateTime<Utc>,
    ) -> StorageResult<StageCompletion> {
        // The insert branch carries exactly what a first submission stores;
        // the update branch merges it into the existing row.
        let fresh = StageCompletion::from_patch(0, user_id, stage_id, &patch, at);
        let row = sqlx::query(
            r#"
            INSERT INTO user_stage_completions AS c (
                user_id, stage_id, stage_type,
                predict_selected_answer, predict_is_correct,
                run_submitted_code, run_output,
                investigate_reflection, investigate_completed,
                modify_submitted_code, modify_output, modify_is_correct, modify_attempts,
                make_submitted_code, make_output, make_is_correct, make_attempts,
                last_score, submission_data, is_completed, completed_at, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $22
            )
            ON CONFLICT (user_id, stage_id) DO UPDATE SET
                predict_selected_answer =
                    COALESCE(EXCLUDED.predict_selected_answer, c.predict_selected_answer),
                predict_is_correct = CASE WHEN EXCLUDED.stage_type = 'predict'
                    THEN EXCLUDED.predict_is_correct ELSE c.predict_is_correct END,
                run_submitted_code = COALESCE(EXCLUDED.run_submitted_code, c.run_submitted_code),
                run_output = COALESCE(EXCLUDED.run_output, c.run_output),
                investigate_reflection =
                    COALESCE(EXCLUDED.investigate_reflection, c.investigate_reflection),
                investigate_completed = c.investigate_completed OR EXCLUDED.investigate_completed,
                modify_submitted_code =
                    COALESCE(EXCLUDED.modify_submitted_code, c.modify_submitted_code),
                modify_output = COALESCE(EXCLUDED.modify_output, c.modify_output),
                modify_is_correct = CASE WHEN EXCLUDED.stage_type = 'modify'
                    THEN EXCLUDED.modify_is_correct ELSE c.modify_is_correct END,
                modify_attempts = c.modify_attempts + EXCLUDED.modify_attempts,
                make_submitted_code = COALESCE(EXCLUDED.make_submitted_code, c.make_submitted_code),
                make_output = COALESCE(EXCLUDED.make_output, c.make_output),
                make_is_correct = CASE WHEN EXCLUDED.stage_type = 'make'
                    THEN EXCLUDED.make_is_correct ELSE c.make_is_correct END,
                make_attempts = c.make_attempts + EXCLUDED.make_attempts,
                last_score = EXCLUDED.last_score,
                submission_data = CASE WHEN jsonb_typeof(EXCLUDED.submission_data) = 'null'
                    THEN c.submission_data ELSE EXCLUDED.submission_data END,
                is_completed = CASE WHEN EXCLUDED.stage_type IN ('modify', 'make')
                    THEN EXCLUDED.is_completed ELSE c.is_completed OR EXCLUDED.is_completed END,
                completed_at = CASE WHEN EXCLUDED.stage_type IN ('modify', 'make')
                    THEN EXCLUDED.completed_at
                    ELSE COALESCE(c.completed_at, EXCLUDED.completed_at) END,
                updated_at = EXCLUDED.updated_at
            WHERE c.stage_type = EXCLUDED.stage_type
            RETURNING *
            "#,
        )
        .bind(user_id.get())
        .bind(stage_id.get())
        .bind(patch.stage_type.as_str())
        .bind(fresh.predict_selected_answer)
        .bind(fresh.predict_is_correct)
        .bind(fresh.run_submitted_code)
        .bind(fresh.run_output)
        .bind(fresh.investigate_reflection)
        .bind(fresh.investigate_completed)
        .bind(fresh.modify_submitted_code)
        .bind(fresh.modify_output)
        .bind(fresh.modify_is_correct)
        .bind(fresh.modify_attempts)
        .bind(fresh.make_submitted_code)
        .bind(fresh.make_output)
        .bind(fresh.make_is_correct)
        .bind(fresh.make_attempts)
        .bind(fresh.last_score)
        .bind(fresh.submission_data)
        .bind(fresh.is_completed)
        .bind(fresh.completed_at)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        match row {
            Some(row) => completion_row_to_record(row),
            None => Err(StorageError::Conflict(format!(
                "completion {}/{} holds data of another stage type than {}",
                user_id, stage_id, patch.stage_type
            ))),
        }
    }

    async fn get_completion(
        &self,
        user_id: UserId,
        stage_id: StageId,
    ) -> StorageResult<Option<StageCompletion>> {
        let row = sqlx::query(
            "SELECT * FROM user_stage_completions WHERE user_id = $1 AND stage_id = $2",
        )
        .bind(user_id.get())
        .bind(stage_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(completion_row_to_record).transpose()
    }

    async fn list_completions(
        &self,
        user_id: UserId,
        stage_ids: &[StageId],
    ) -> StorageResult<Vec<StageCompletion>> {
        let ids = stage_ids.iter().map(|id| id.get()).collect::<Vec<_>>();
        let rows = sqlx::query(
            "SELECT * FROM user_stage_completions WHERE user_id = $1 AND stage_id = ANY($2)",
        )
        .bind(user_id.get())
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(completion_row_to_record).collect()
    }

    async fn claim_and_credit(
        &self,
        user_id: UserId,
        stage_id: StageId,
        reward: Reward,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<UserAccount>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let claimed = sqlx::query(
            r#"
            UPDATE user_stage_completions
            SET rewarded_at = $3
            WHERE user_id = $1 AND stage_id = $2 AND rewarded_at IS NULL
            "#,
        )
        .bind(user_id.get())
        .bind(stage_id.get())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if claimed.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            if self.get_completion(user_id, stage_id).await?.is_none() {
                return Err(StorageError::NotFound(format!(
                    "completion {}/{} not found",
                    user_id.get(),
                    stage_id.get()
                )));
            }
            return Ok(None);
        }

        // Returning early drops `tx`, which rolls the claim back.
        let row = sqlx::query(
            r#"
            UPDATE users
            SET total_coins = total_coins + $2, experience_points = experience_points + $3
            WHERE id = $1
            RETURNING id, full_name, total_coins, experience_points, level
            "#,
        )
        .bind(user_id.get())
        .bind(reward.coins)
        .bind(reward.xp)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?
        .ok_or_else(|| StorageError::NotFound(format!("account {} not found", user_id.get())))?;
        let account = account_row_to_record(row)?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Some(account))
    }
}

#[async_trait]
impl CourseCompletionStore for PostgresPrimmStorage {
    async fn award_course_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
        coins: i64,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<CourseCompletion>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let row = sqlx::query(
            r#"
            INSERT INTO user_course_completions
                (user_id, course_id, is_completed, completed_at, coins_earned, created_at)
            VALUES
                ($1, $2, TRUE, $3, $4, $3)
            ON CONFLICT (user_id, course_id) DO NOTHING
            RETURNING id, user_id, course_id, is_completed, completed_at, coins_earned, created_at
            "#,
        )
        .bind(user_id.get())
        .bind(course_id.get())
        .bind(at)
        .bind(coins)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record = course_completion_row_to_record(row)?;

        let credited = sqlx::query("UPDATE users SET total_coins = total_coins + $2 WHERE id = $1")
            .bind(user_id.get())
            .bind(coins)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if credited.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("account {} not found", user_id.get())));
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Some(record))
    }

    async fn get_course_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> StorageResult<Option<CourseCompletion>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, course_id, is_completed, completed_at, coins_earned, created_at
            FROM user_course_completions
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(user_id.get())
        .bind(course_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(course_completion_row_to_record).transpose()
    }

    async fn list_course_completions(
        &self,
        user_id: UserId,
        course_ids: &[CourseId],
    ) -> StorageResult<Vec<CourseCompletion>> {
        let ids = course_ids.iter().map(|id| id.get()).collect::<Vec<_>>();
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, course_id, is_completed, completed_at, coins_earned, created_at
            FROM user_course_completions
            WHERE user_id = $1 AND course_id = ANY($2)
            "#,
        )
        .bind(user_id.get())
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(course_completion_row_to_record).collect()
    }
}

#[async_trait]
impl AccountStore for PostgresPrimmStorage {
    async fn get_account(&self, user_id: UserId) -> StorageResult<Option<UserAccount>> {
        let row = sqlx::query(
            "SELECT id, full_name, total_coins, experience_points, level FROM users WHERE id = $1",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(account_row_to_record).transpose()
    }

    async fn credit_account(
        &self,
        user_id: UserId,
        coins: i64,
        xp: i64,
    ) -> StorageResult<UserAccount> {
        let row = sqlx::query(
            r#"
            UPDATE users
            SET total_coins = total_coins + $2, experience_points = experience_points + $3
            WHERE id = $1
            RETURNING id, full_name, total_coins, experience_points, level
            "#,
        )
        .bind(user_id.get())
        .bind(coins)
        .bind(xp)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?
        .ok_or_else(|| StorageError::NotFound(format!("account {} not found", user_id.get())))?;
        account_row_to_record(row)
    }

    async fn raise_level(&self, user_id: UserId, level: i32) -> StorageResult<UserAccount> {
        let row = sqlx::query(
            r#"
            UPDATE users
            SET level = GREATEST(level, $2)
            WHERE id = $1
            RETURNING id, full_name, total_coins, experience_points, level
            "#,
        )
        .bind(user_id.get())
        .bind(level)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?
        .ok_or_else(|| StorageError::NotFound(format!("account {} not found", user_id.get())))?;
        account_row_to_record(row)
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StorageError::Backend(e.to_string()))
}

fn json_column<T: serde::de::DeserializeOwned + Default>(
    row: &PgRow,
    column: &str,
) -> StorageResult<T> {
    let value: Option<serde_json::Value> = get(row, column)?;
    match value {
        Some(value) if !value.is_null() => {
            serde_json::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
        }
        _ => Ok(T::default()),
    }
}

fn parse_stage_type(raw: &str) -> StorageResult<StageType> {
    raw.parse::<StageType>()
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

fn stage_row_to_record(row: PgRow) -> StorageResult<Stage> {
    let stage_type: String = get(&row, "stage_type")?;
    let content = match parse_stage_type(&stage_type)? {
        StageType::Predict => StageContent::Predict {
            options: json_column::<BTreeMap<String, String>>(&row, "predict_options")?,
            correct_answer: get(&row, "correct_answer")?,
        },
        StageType::Run => StageContent::Run {
            code_template: get(&row, "run_code_template")?,
        },
        StageType::Investigate => StageContent::Investigate {
            video_embed_url: get(&row, "video_embed_url")?,
            guiding_questions: json_column::<Vec<String>>(&row, "guiding_questions")?,
            reflection_prompt: get(&row, "reflection_prompt")?,
        },
        StageType::Modify => StageContent::Modify {
            challenge: get(&row, "modify_challenge")?,
            expected_output: get(&row, "modify_expected_output")?,
            test_cases: json_column::<Vec<TestCase>>(&row, "modify_test_cases")?,
        },
        StageType::Make => StageContent::Make {
            challenge: get(&row, "make_challenge")?,
            expected_output: get(&row, "make_expected_output")?,
            test_cases: json_column::<Vec<TestCase>>(&row, "make_test_cases")?,
        },
    };

    Ok(Stage {
        id: StageId::new(get(&row, "id")?),
        course_id: CourseId::new(get(&row, "course_id")?),
        title: get(&row, "title")?,
        description: get(&row, "description")?,
        order_index: get(&row, "order_index")?,
        is_active: get(&row, "is_active")?,
        code_snippet: get(&row, "code_snippet")?,
        content,
    })
}

fn course_row_to_record(row: PgRow) -> StorageResult<Course> {
    Ok(Course {
        id: CourseId::new(get(&row, "id")?),
        lesson_id: LessonId::new(get(&row, "lesson_id")?),
        title: get(&row, "title")?,
        description: get(&row, "description")?,
        order_index: get(&row, "order_index")?,
        coin_reward: get(&row, "coin_reward")?,
        is_active: get(&row, "is_active")?,
    })
}

fn lesson_row_to_record(row: PgRow) -> StorageResult<Lesson> {
    Ok(Lesson {
        id: LessonId::new(get(&row, "id")?),
        teacher_id: UserId::new(get(&row, "teacher_id")?),
        title: get(&row, "title")?,
        description: get(&row, "description")?,
        category: get(&row, "category")?,
        difficulty: get(&row, "difficulty")?,
        is_active: get(&row, "is_active")?,
    })
}

fn completion_row_to_record(row: PgRow) -> StorageResult<StageCompletion> {
    let stage_type: String = get(&row, "stage_type")?;
    Ok(StageCompletion {
        id: get(&row, "id")?,
        user_id: UserId::new(get(&row, "user_id")?),
        stage_id: StageId::new(get(&row, "stage_id")?),
        stage_type: parse_stage_type(&stage_type)?,
        predict_selected_answer: get(&row, "predict_selected_answer")?,
        predict_is_correct: get(&row, "predict_is_correct")?,
        run_submitted_code: get(&row, "run_submitted_code")?,
        run_output: get(&row, "run_output")?,
        investigate_reflection: get(&row, "investigate_reflection")?,
        investigate_completed: get(&row, "investigate_completed")?,
        modify_submitted_code: get(&row, "modify_submitted_code")?,
        modify_output: get(&row, "modify_output")?,
        modify_is_correct: get(&row, "modify_is_correct")?,
        modify_attempts: get(&row, "modify_attempts")?,
        make_submitted_code: get(&row, "make_submitted_code")?,
        make_output: get(&row, "make_output")?,
        make_is_correct: get(&row, "make_is_correct")?,
        make_attempts: get(&row, "make_attempts")?,
        last_score: get(&row, "last_score")?,
        submission_data: get(&row, "submission_data")?,
        is_completed: get(&row, "is_completed")?,
        completed_at: get(&row, "completed_at")?,
        rewarded_at: get(&row, "rewarded_at")?,
        created_at: get(&row, "created_at")?,
        updated_at: get(&row, "updated_at")?,
    })
}

fn course_completion_row_to_record(row: PgRow) -> StorageResult<CourseCompletion> {
    Ok(CourseCompletion {
        id: get(&row, "id")?,
        user_id: UserId::new(get(&row, "user_id")?),
        course_id: CourseId::new(get(&row, "course_id")?),
        is_completed: get(&row, "is_completed")?,
        completed_at: get(&row, "completed_at")?,
        coins_earned: get(&row, "coins_earned")?,
        created_at: get(&row, "created_at")?,
    })
}

fn account_row_to_record(row: PgRow) -> StorageResult<UserAccount> {
    Ok(UserAccount {
        user_id: UserId::new(get(&row, "id")?),
        full_name: get(&row, "full_name")?,
        total_coins: get(&row, "total_coins")?,
        experience_points: get(&row, "experience_points")?,
        level: get(&row, "level")?,
    })
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    StorageError::Backend(err.to_string())
}
