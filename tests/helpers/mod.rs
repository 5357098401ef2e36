use axum::Router;
pub(crate) use axum_test::TestServer;
use learning_progress_server::catalog::Catalog;
use learning_progress_server::engine::LearningEngine;
use learning_progress_server::init_test_router;
use learning_progress_server::store::MemoryStore;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

pub const COURSE_ID: &str = "rust-basics";
pub const COURSE_CREDITS: u64 = 50;
pub const QUIZ_ID: &str = "rust-basics-quiz";
pub const NO_QUIZ_COURSE_ID: &str = "rust-intro";
pub const BIG_COURSE_ID: &str = "rust-async";
pub const BIG_QUIZ_ID: &str = "rust-async-quiz";
pub const BIG_COURSE_CREDITS: u64 = 500;

const QUESTIONS: [(&str, &str); 5] = [
    ("Which keyword declares an immutable binding?", "let"),
    ("Which type owns a heap string?", "String"),
    ("Which trait enables {:?} formatting?", "Debug"),
    ("Which macro formats into a String?", "format!"),
    ("Which operator propagates errors?", "?"),
];

// test infra setup

pub fn test_catalog() -> Catalog {
    let questions: Vec<Value> = QUESTIONS
        .iter()
        .map(|(question, answer)| {
            json!({
                "question": question,
                "options": [answer, "none of these"],
                "correct_answer": answer,
            })
        })
        .collect();

    let document = json!({
        "courses": [
            {"course_id": COURSE_ID, "title": "Rust Basics", "credits": COURSE_CREDITS, "duration_minutes": 45},
            {"course_id": NO_QUIZ_COURSE_ID, "title": "Rust Intro", "credits": 10, "duration_minutes": 5},
            {"course_id": BIG_COURSE_ID, "title": "Async Rust", "credits": BIG_COURSE_CREDITS, "duration_minutes": 120}
        ],
        "quizzes": [
            {
                "quiz_id": QUIZ_ID,
                "course_id": COURSE_ID,
                "title": "Rust Basics Quiz",
                "questions": questions,
                "total_marks": 5,
                "passing_marks": 3
            },
            {
                "quiz_id": BIG_QUIZ_ID,
                "course_id": BIG_COURSE_ID,
                "questions": [
                    {"question": "Which runtime do we use?", "options": ["tokio", "none"], "correct_answer": "tokio"}
                ],
                "total_marks": 1,
                "passing_marks": 1
            }
        ]
    });

    Catalog::from_json_str(&document.to_string()).expect("Fixture catalog is invalid")
}

pub fn setup_test_environment() -> TestServer {
    let engine = LearningEngine::new(Arc::new(MemoryStore::new()), Arc::new(test_catalog()));
    let app: Router = init_test_router(engine);
    TestServer::new(app).expect("Failed to create TestServer")
}

// endpoint helpers

/// Answers to the fixture quiz with the first `correct` questions answered right.
pub fn quiz_answers(correct: usize) -> HashMap<String, String> {
    QUESTIONS
        .iter()
        .enumerate()
        .map(|(i, (question, answer))| {
            let option = if i < correct { *answer } else { "none of these" };
            (question.to_string(), option.to_string())
        })
        .collect()
}

pub async fn start_course(server: &TestServer, student_id: &str, course_id: &str) {
    let response = server
        .post("/progress/start")
        .add_query_param("student_id", student_id)
        .add_query_param("course_id", course_id)
        .await;
    assert!(
        response.status_code().is_success(),
        "Failed to start course: {}",
        response.text()
    );
}

pub async fn complete_video(server: &TestServer, student_id: &str, course_id: &str) {
    let response = server
        .put("/progress/video-complete")
        .add_query_param("student_id", student_id)
        .add_query_param("course_id", course_id)
        .add_query_param("watch_duration", 45)
        .await;
    assert!(
        response.status_code().is_success(),
        "Failed to complete video: {}",
        response.text()
    );
}

pub async fn submit_quiz(
    server: &TestServer,
    student_id: &str,
    quiz_id: &str,
    answers: HashMap<String, String>,
) -> axum_test::TestResponse {
    server
        .post("/progress/submit-quiz")
        .json(&json!({
            "student_id": student_id,
            "quiz_id": quiz_id,
            "answers": answers,
        }))
        .await
}

/// Starts the course, completes the video and passes the fixture quiz with full marks.
#[allow(dead_code)]
pub async fn pass_course(server: &TestServer, student_id: &str) {
    start_course(server, student_id, COURSE_ID).await;
    complete_video(server, student_id, COURSE_ID).await;
    let response = submit_quiz(server, student_id, QUIZ_ID, quiz_answers(5)).await;
    assert!(
        response.status_code().is_success(),
        "Failed to pass quiz: {}",
        response.text()
    );
}
