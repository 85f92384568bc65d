//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        // Submissions
        .route("/stages/:id/submit", post(handlers::submit_stage))
        .route("/progress/submit/predict", post(handlers::submit_predict))
        .route("/progress/submit/run", post(handlers::submit_run))
        .route("/progress/submit/investigate", post(handlers::submit_investigate))
        .route("/progress/submit/modify", post(handlers::submit_modify))
        .route("/progress/submit/make", post(handlers::submit_make))
        // Progress
        .route("/stages/:id/my-completion", get(handlers::get_stage_completion))
        .route("/courses/:id/my-progress", get(handlers::get_course_progress))
        .route("/lessons/:id/my-progress", get(handlers::get_lesson_progress))
        .route("/me", get(handlers::get_account));

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use primm_progress::{ProgressConfig, ProgressService, StubExecutor};
    use primm_storage::{CatalogSeed, InMemoryPrimmStorage};
    use primm_types::{
        Course, CourseId, Lesson, LessonId, Stage, StageContent, StageId, UserAccount, UserId,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let seed = CatalogSeed {
            lessons: vec![Lesson {
                id: LessonId::new(1),
                teacher_id: UserId::new(100),
                title: "Intro".to_string(),
                description: String::new(),
                category: String::new(),
                difficulty: String::new(),
                is_active: true,
            }],
            courses: vec![Course {
                id: CourseId::new(1),
                lesson_id: LessonId::new(1),
                title: "Printing".to_string(),
                description: String::new(),
                order_index: 1,
                coin_reward: 100,
                is_active: true,
            }],
            stages: vec![
                Stage {
                    id: StageId::new(1),
                    course_id: CourseId::new(1),
                    title: "Guess the output".to_string(),
                    description: String::new(),
                    order_index: 1,
                    is_active: true,
                    code_snippet: Some("print(2 * 3)".to_string()),
                    content: StageContent::Predict {
                        options: Default::default(),
                        correct_answer: Some("B".to_string()),
                    },
                },
                Stage {
                    id: StageId::new(5),
                    course_id: CourseId::new(1),
                    title: "Make it".to_string(),
                    description: String::new(),
                    order_index: 5,
                    is_active: true,
                    code_snippet: None,
                    content: StageContent::Make {
                        challenge: None,
                        expected_output: None,
                        test_cases: vec![],
                    },
                },
            ],
            accounts: vec![UserAccount::new(UserId::new(7), "Putri")],
        };
        let storage = Arc::new(InMemoryPrimmStorage::from_seed(seed));
        let service =
            ProgressService::new(storage, Arc::new(StubExecutor), ProgressConfig::default());
        create_router(AppState::new(Arc::new(service)), true)
    }

    fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        builder
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn get_as(uri: &str, user: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-user-id", user)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_returns_200() {
        let resp = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "healthy");
    }

    #[tokio::test]
    async fn submission_without_identity_is_unauthorized() {
        let resp = test_router()
            .oneshot(post_json(
                "/api/v1/progress/submit/predict",
                None,
                json!({ "stage_id": 1, "selected_answer": "B" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn typed_predict_submission_rewards_caller() {
        let app = test_router();
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/v1/progress/submit/predict",
                Some("7"),
                json!({ "stage_id": 1, "selected_answer": "B" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["is_correct"], true);
        assert_eq!(body["coins_earned"], 50);
        assert_eq!(body["xp_earned"], 20);

        let me = app.oneshot(get_as("/api/v1/me", "7")).await.unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        let me = json_body(me).await;
        assert_eq!(me["total_coins"], 50);
        assert_eq!(me["xp_to_next_level"], 80);
    }

    #[tokio::test]
    async fn generic_submission_returns_score() {
        let resp = test_router()
            .oneshot(post_json(
                "/api/v1/stages/1/submit",
                Some("7"),
                json!({ "submission_type": "predict", "selected_answer": "C" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["is_correct"], false);
        assert_eq!(body["score"], 0);
        assert_eq!(body["coins_earned"], 0);
    }

    #[tokio::test]
    async fn mismatched_stage_type_is_404() {
        let resp = test_router()
            .oneshot(post_json(
                "/api/v1/progress/submit/run",
                Some("7"),
                json!({ "stage_id": 1, "submitted_code": "print(1)" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stage_without_test_cases_is_422() {
        let resp = test_router()
            .oneshot(post_json(
                "/api/v1/progress/submit/make",
                Some("7"),
                json!({ "stage_id": 5, "submitted_code": "print(1)" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(resp).await["code"], "INVALID_STAGE");
    }

    #[tokio::test]
    async fn completion_lookup_before_submission_is_404() {
        let resp = test_router()
            .oneshot(get_as("/api/v1/stages/1/my-completion", "7"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn course_and_lesson_progress_are_served() {
        let app = test_router();
        app.clone()
            .oneshot(post_json(
                "/api/v1/progress/submit/predict",
                Some("7"),
                json!({ "stage_id": 1, "selected_answer": "B" }),
            ))
            .await
            .unwrap();

        let course = app
            .clone()
            .oneshot(get_as("/api/v1/courses/1/my-progress", "7"))
            .await
            .unwrap();
        assert_eq!(course.status(), StatusCode::OK);
        let course = json_body(course).await;
        assert_eq!(course["completed_count"], 1);
        assert_eq!(course["total_stages"], 2);
        assert_eq!(course["percent"], 50);

        let lesson = app
            .oneshot(get_as("/api/v1/lessons/1/my-progress", "7"))
            .await
            .unwrap();
        assert_eq!(lesson.status(), StatusCode::OK);
        let lesson = json_body(lesson).await;
        assert_eq!(lesson["total_courses"], 1);
        assert_eq!(lesson["completed_courses"], 0);
    }
}
