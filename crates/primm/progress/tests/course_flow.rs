use primm_progress::{ProgressConfig, ProgressService, StubExecutor};
use primm_storage::{AccountStore, CatalogSeed, CourseCompletionStore, InMemoryPrimmStorage};
use primm_types::{
    Course, CourseId, Lesson, LessonId, Stage, StageContent, StageId, StageSubmissionRequest,
    StageType, SubmitInvestigateRequest, SubmitMakeRequest, SubmitModifyRequest,
    SubmitPredictRequest, SubmitRunRequest, TestCase, UserAccount, UserId,
};
use std::collections::BTreeMap;
use std::sync::Arc;

const STUDENT: UserId = UserId(7);
const REFLECTION: &str = "The loop runs once per item and prints each value.";

fn stage_id(course: i64, stage_type: StageType) -> StageId {
    StageId::new(course * 10 + i64::from(stage_type.order_index()))
}

fn stage(course: i64, stage_type: StageType) -> Stage {
    let test_cases = vec![TestCase {
        input: "3".to_string(),
        expected_output: "6".to_string(),
        description: Some("doubles input".to_string()),
    }];
    let content = match stage_type {
        StageType::Predict => StageContent::Predict {
            options: BTreeMap::from([
                ("A".to_string(), "5".to_string()),
                ("B".to_string(), "6".to_string()),
            ]),
            correct_answer: Some("B".to_string()),
        },
        StageType::Run => StageContent::Run {
            code_template: Some("print(3 * 2)".to_string()),
        },
        StageType::Investigate => StageContent::Investigate {
            video_embed_url: None,
            guiding_questions: vec!["What does the loop do?".to_string()],
            reflection_prompt: None,
        },
        StageType::Modify => StageContent::Modify {
            challenge: Some("Double the input".to_string()),
            expected_output: Some("6".to_string()),
            test_cases: test_cases.clone(),
        },
        StageType::Make => StageContent::Make {
            challenge: Some("Write it from scratch".to_string()),
            expected_output: Some("6".to_string()),
            test_cases,
        },
    };
    Stage {
        id: stage_id(course, stage_type),
        course_id: CourseId::new(course),
        title: format!("{stage_type} {course}"),
        description: String::new(),
        order_index: stage_type.order_index(),
        is_active: true,
        code_snippet: Some("for x in xs: print(x * 2)".to_string()),
        content,
    }
}

fn seed() -> CatalogSeed {
    let courses = (1..=4)
        .map(|id| Course {
            id: CourseId::new(id),
            lesson_id: LessonId::new(1),
            title: format!("Course {id}"),
            description: String::new(),
            order_index: id as i32,
            coin_reward: 200,
            is_active: true,
        })
        .collect();
    let stages = (1..=4)
        .flat_map(|course| StageType::ALL.into_iter().map(move |t| stage(course, t)))
        .collect();
    CatalogSeed {
        lessons: vec![Lesson {
            id: LessonId::new(1),
            teacher_id: UserId::new(1),
            title: "Python basics".to_string(),
            description: String::new(),
            category: "programming".to_string(),
            difficulty: "beginner".to_string(),
            is_active: true,
        }],
        courses,
        stages,
        accounts: vec![UserAccount::new(STUDENT, "Siti")],
    }
}

fn setup() -> (ProgressService, Arc<InMemoryPrimmStorage>) {
    let storage = Arc::new(InMemoryPrimmStorage::from_seed(seed()));
    let service = ProgressService::new(
        storage.clone(),
        Arc::new(StubExecutor),
        ProgressConfig::default(),
    );
    (service, storage)
}

async fn complete_stage(service: &ProgressService, course: i64, stage_type: StageType) -> bool {
    let id = stage_id(course, stage_type);
    let response = match stage_type {
        StageType::Predict => {
            service
                .submit_predict(
                    STUDENT,
                    SubmitPredictRequest {
                        stage_id: id,
                        selected_answer: "B".to_string(),
                    },
                )
                .await
        }
        StageType::Run => {
            service
                .submit_run(
                    STUDENT,
                    SubmitRunRequest {
                        stage_id: id,
                        submitted_code: "print(3 * 2)".to_string(),
                    },
                )
                .await
        }
        StageType::Investigate => {
            service
                .submit_investigate(
                    STUDENT,
                    SubmitInvestigateRequest {
                        stage_id: id,
                        reflection: REFLECTION.to_string(),
                    },
                )
                .await
        }
        StageType::Modify => {
            service
                .submit_modify(
                    STUDENT,
                    SubmitModifyRequest {
                        stage_id: id,
                        submitted_code: "print(int(input()) * 2)".to_string(),
                    },
                )
                .await
        }
        StageType::Make => {
            service
                .submit_make(
                    STUDENT,
                    SubmitMakeRequest {
                        stage_id: id,
                        submitted_code: "n = int(input())\nprint(n + n)".to_string(),
                    },
                )
                .await
        }
    }
    .unwrap();
    assert!(response.is_correct, "{stage_type} should be graded correct");
    response.course_completed
}

#[tokio::test]
async fn course_completes_only_after_all_five_stages() {
    let (service, storage) = setup();

    for stage_type in &StageType::ALL[..4] {
        assert!(!complete_stage(&service, 1, *stage_type).await);
    }
    let progress = service.course_progress(STUDENT, CourseId::new(1)).await.unwrap();
    assert_eq!(progress.completed_count, 4);
    assert_eq!(progress.percent, 80);
    assert!(!progress.is_complete);

    assert!(complete_stage(&service, 1, StageType::Make).await);

    let progress = service.course_progress(STUDENT, CourseId::new(1)).await.unwrap();
    assert!(progress.is_complete);
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.coins_earned, 200);

    // Stage rewards 50 + 50 + 30 + 75 + 100 plus the 200 coin course bonus.
    let account = storage.get_account(STUDENT).await.unwrap().unwrap();
    assert_eq!(account.total_coins, 505);
    assert_eq!(account.experience_points, 135);
    assert_eq!(account.level, 2);
}

#[tokio::test]
async fn course_bonus_is_granted_once_across_reconciliations() {
    let (service, storage) = setup();
    for stage_type in StageType::ALL {
        complete_stage(&service, 1, stage_type).await;
    }

    let aggregator = service.aggregator();
    assert!(aggregator.reconcile(STUDENT, CourseId::new(1)).await.unwrap());
    assert!(aggregator.reconcile(STUDENT, CourseId::new(1)).await.unwrap());

    let record = storage
        .get_course_completion(STUDENT, CourseId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.coins_earned, 200);
    let account = storage.get_account(STUDENT).await.unwrap().unwrap();
    assert_eq!(account.total_coins, 505);
}

#[tokio::test]
async fn concurrent_reconciliations_grant_bonus_once() {
    let (service, storage) = setup();
    for stage_type in StageType::ALL {
        complete_stage(&service, 2, stage_type).await;
    }

    let aggregator = service.aggregator();
    let handles = (0..8)
        .map(|_| {
            let aggregator = aggregator.clone();
            tokio::spawn(async move { aggregator.reconcile(STUDENT, CourseId::new(2)).await })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    let account = storage.get_account(STUDENT).await.unwrap().unwrap();
    assert_eq!(account.total_coins, 505);
}

#[tokio::test]
async fn correct_predict_through_generic_path_earns_fixed_reward() {
    let (service, storage) = setup();

    let result = service
        .submit_stage(
            STUDENT,
            stage_id(1, StageType::Predict),
            StageSubmissionRequest {
                submission_type: Some(StageType::Predict),
                selected_answer: Some("B".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(result.is_correct);
    assert_eq!(result.score, 100);
    assert_eq!(result.coins_earned, 50);
    assert_eq!(result.xp_earned, 20);
    assert_eq!(result.data["selected_answer"], "B");
    let account = storage.get_account(STUDENT).await.unwrap().unwrap();
    assert_eq!(account.total_coins, 50);
}

#[tokio::test]
async fn short_reflection_is_not_rewarded() {
    let (service, storage) = setup();

    let response = service
        .submit_investigate(
            STUDENT,
            SubmitInvestigateRequest {
                stage_id: stage_id(1, StageType::Investigate),
                reflection: "too short!".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(!response.is_correct);
    assert_eq!(response.coins_earned, 0);
    assert_eq!(response.xp_earned, 0);
    let account = storage.get_account(STUDENT).await.unwrap().unwrap();
    assert_eq!(account.total_coins, 0);
    let record = service
        .stage_completion(STUDENT, stage_id(1, StageType::Investigate))
        .await
        .unwrap()
        .unwrap();
    assert!(!record.is_completed);
}

#[tokio::test]
async fn generic_path_uses_same_reflection_threshold() {
    let (service, _) = setup();

    let result = service
        .submit_stage(
            STUDENT,
            stage_id(1, StageType::Investigate),
            StageSubmissionRequest {
                submission_type: Some(StageType::Investigate),
                reflection_text: Some("exactly twenty chars".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(result.is_correct);
    assert_eq!(result.coins_earned, 30);
}

#[tokio::test]
async fn resubmissions_keep_one_record_and_count_attempts() {
    let (service, storage) = setup();
    let id = stage_id(3, StageType::Make);

    for expected in 1..=4 {
        service
            .submit_make(
                STUDENT,
                SubmitMakeRequest {
                    stage_id: id,
                    submitted_code: format!("print({expected})"),
                },
            )
            .await
            .unwrap();
        let record = service.stage_completion(STUDENT, id).await.unwrap().unwrap();
        assert_eq!(record.make_attempts, expected);
    }
    assert_eq!(storage.completion_count(STUDENT, id).await, 1);
}

#[tokio::test]
async fn empty_make_submission_clears_completion() {
    let (service, _) = setup();
    let id = stage_id(3, StageType::Make);

    complete_stage(&service, 3, StageType::Make).await;
    let response = service
        .submit_make(
            STUDENT,
            SubmitMakeRequest {
                stage_id: id,
                submitted_code: String::new(),
            },
        )
        .await
        .unwrap();

    assert!(!response.is_correct);
    let record = service.stage_completion(STUDENT, id).await.unwrap().unwrap();
    assert!(!record.is_completed);
    assert!(record.completed_at.is_none());
    assert_eq!(record.make_attempts, 2);
}

#[tokio::test]
async fn lesson_progress_reports_half_done() {
    let (service, _) = setup();
    for course in [1, 3] {
        for stage_type in StageType::ALL {
            complete_stage(&service, course, stage_type).await;
        }
    }

    let summary = service.lesson_progress(STUDENT, LessonId::new(1)).await.unwrap();
    assert_eq!(summary.total_courses, 4);
    assert_eq!(summary.completed_courses, 2);
    assert_eq!(summary.percent, 50.0);
    assert_eq!(summary.coins_earned, 400);
    assert_eq!(summary.xp_earned, 270);
}

#[tokio::test]
async fn unknown_stage_is_not_found() {
    let (service, _) = setup();
    let result = service
        .submit_run(
            STUDENT,
            SubmitRunRequest {
                stage_id: StageId::new(999),
                submitted_code: "print(1)".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(primm_progress::ProgressError::NotFound(_))));
}
