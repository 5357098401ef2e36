use crate::engine::{LearningEngine, QuizSubmissionResult};
use crate::errors::AppError;
use crate::model::{ProgressKey, ProgressView, Quiz};
use crate::payloads::{CourseParams, StudentParams, SubmitQuizPayload, WatchParams};
use crate::response::ApiResponse;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Starts a course for a student. Idempotent: an existing record is returned unchanged.
///
/// Query Parameters: `CourseParams`
///
/// Returns (wrapped in `ApiResponse`)
/// * `ProgressView`: the new record (201 Created) or the existing one (200 OK).
/// * `404 Not Found`: If the course is not in the catalog.
/// * `422 Unprocessable Entity`: If the ids are empty or too long.
#[instrument(skip(engine))]
pub async fn start_course(
    State(engine): State<LearningEngine>,
    Query(params): Query<CourseParams>,
) -> Result<ApiResponse<ProgressView>, AppError> {
    params.validate()?;
    info!(
        "Attempting to start course {} for student {}",
        params.course_id, params.student_id
    );

    if engine.catalog().course(&params.course_id).is_none() {
        warn!("Start requested for unknown course {}", params.course_id);
        return Err(AppError::NotFound(format!(
            "Course with ID {} not found",
            params.course_id
        )));
    }

    let (progress, created) = engine.tracker.start(&params.key()).await?;
    if created {
        Ok(ApiResponse::created(progress))
    } else {
        Ok(ApiResponse::ok(progress))
    }
}

/// Records watched minutes without completing the video.
///
/// Query Parameters: `WatchParams`
///
/// Returns (wrapped in `ApiResponse`)
/// * `ProgressView`: the updated record (200 OK).
/// * `404 Not Found`: If the course was not started.
#[instrument(skip(engine))]
pub async fn record_watch_time(
    State(engine): State<LearningEngine>,
    Query(params): Query<WatchParams>,
) -> Result<ApiResponse<ProgressView>, AppError> {
    params.validate()?;
    debug!("Watch time heartbeat: {:?}", params);

    let progress = engine
        .tracker
        .record_watch_time(&params.key(), params.watch_duration)
        .await?;
    Ok(ApiResponse::ok(progress))
}

/// Marks the course video as complete, unlocking the quiz.
///
/// Query Parameters: `WatchParams`
///
/// Returns (wrapped in `ApiResponse`)
/// * `ProgressView`: the updated record with `quiz_unlocked = true` (200 OK).
/// * `404 Not Found`: If the course was not started.
#[instrument(skip(engine))]
pub async fn complete_video(
    State(engine): State<LearningEngine>,
    Query(params): Query<WatchParams>,
) -> Result<ApiResponse<ProgressView>, AppError> {
    params.validate()?;
    info!(
        "Marking video complete for course {} student {}",
        params.course_id, params.student_id
    );

    let progress = engine
        .tracker
        .mark_video_complete(&params.key(), params.watch_duration)
        .await?;
    Ok(ApiResponse::ok(progress))
}

/// Lists every progress record of a student, ordered by course id.
#[instrument(skip(engine))]
pub async fn get_my_progress(
    State(engine): State<LearningEngine>,
    Query(params): Query<StudentParams>,
) -> Result<ApiResponse<Vec<ProgressView>>, AppError> {
    params.validate()?;

    let progress = engine.tracker.list_progress(&params.student_id).await?;
    info!(
        "Fetched {} progress records for student {}",
        progress.len(),
        params.student_id
    );
    Ok(ApiResponse::ok(progress))
}

/// Progress of a student in one course.
///
/// Returns (wrapped in `ApiResponse`)
/// * `ProgressView` (200 OK).
/// * `404 Not Found`: If the course was not started.
#[instrument(skip(engine))]
pub async fn get_course_progress(
    State(engine): State<LearningEngine>,
    Path(course_id): Path<String>,
    Query(params): Query<StudentParams>,
) -> Result<ApiResponse<ProgressView>, AppError> {
    params.validate()?;

    let key = ProgressKey::new(params.student_id, course_id);
    let progress = engine.tracker.get_progress(&key).await?;
    Ok(ApiResponse::ok(progress))
}

/// Serves the course quiz without answers once it is unlocked.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Quiz` without correct answers (200 OK).
/// * `404 Not Found`: If the course has no quiz or was not started.
/// * `412 Precondition Failed`: If the video is not completed yet.
#[instrument(skip(engine))]
pub async fn get_quiz(
    State(engine): State<LearningEngine>,
    Query(params): Query<CourseParams>,
) -> Result<ApiResponse<Quiz>, AppError> {
    params.validate()?;

    let quiz = engine.unlocked_quiz(&params.key()).await?;
    Ok(ApiResponse::ok(quiz))
}

/// Grades a quiz submission and applies rewards.
///
/// Request Body: `SubmitQuizPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `QuizSubmissionResult`: score, total, passed, credits_earned, new_level, new_badges (200 OK).
/// * `404 Not Found`: If the quiz does not exist or the course was not started.
/// * `412 Precondition Failed`: If the video is not completed yet.
/// * `422 Unprocessable Entity`: If not every question was answered exactly once.
#[instrument(skip(engine, payload))]
pub async fn submit_quiz(
    State(engine): State<LearningEngine>,
    Json(payload): Json<SubmitQuizPayload>,
) -> Result<ApiResponse<QuizSubmissionResult>, AppError> {
    payload.validate()?;
    info!(
        "Quiz submission for quiz {} by student {}",
        payload.quiz_id, payload.student_id
    );
    debug!("Submit quiz payload: {:?}", payload);

    let result = engine
        .submit_quiz(&payload.student_id, &payload.quiz_id, &payload.answers)
        .await?;
    Ok(ApiResponse::ok(result))
}
