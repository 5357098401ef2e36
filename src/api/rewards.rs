use crate::engine::LearningEngine;
use crate::errors::AppError;
use crate::model::{Badge, EarnedBadge, LeaderboardEntry, RewardStats};
use crate::payloads::{LeaderboardParams, StudentParams};
use crate::response::ApiResponse;
use axum::extract::{Query, State};
use tracing::{info, instrument};
use validator::Validate;

/// Credits, level and completion counters of a student.
///
/// Returns (wrapped in `ApiResponse`)
/// * `RewardStats` (200 OK). Students without activity get zero credits at level 1.
#[instrument(skip(engine))]
pub async fn get_stats(
    State(engine): State<LearningEngine>,
    Query(params): Query<StudentParams>,
) -> Result<ApiResponse<RewardStats>, AppError> {
    params.validate()?;

    let stats = engine.rewards.stats(&params.student_id).await?;
    Ok(ApiResponse::ok(stats))
}

/// Badges earned by a student, with the time each was earned.
#[instrument(skip(engine))]
pub async fn get_my_badges(
    State(engine): State<LearningEngine>,
    Query(params): Query<StudentParams>,
) -> Result<ApiResponse<Vec<EarnedBadge>>, AppError> {
    params.validate()?;

    let badges = engine.badges.earned_badges(&params.student_id).await?;
    info!(
        "Student {} holds {} badges",
        params.student_id,
        badges.len()
    );
    Ok(ApiResponse::ok(badges))
}

/// The badge catalog.
#[instrument(skip(engine))]
pub async fn get_all_badges(
    State(engine): State<LearningEngine>,
) -> Result<ApiResponse<Vec<Badge>>, AppError> {
    Ok(ApiResponse::ok(engine.badges.catalog_badges().to_vec()))
}

/// Students ranked by total credits.
#[instrument(skip(engine))]
pub async fn get_leaderboard(
    State(engine): State<LearningEngine>,
    Query(params): Query<LeaderboardParams>,
) -> Result<ApiResponse<Vec<LeaderboardEntry>>, AppError> {
    let entries = engine.rewards.leaderboard(params.limit()).await?;
    Ok(ApiResponse::ok(entries))
}
