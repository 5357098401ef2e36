use crate::catalog::Catalog;
use crate::errors::AppError;
use crate::model::{
    GradeResult, LeaderboardEntry, ProgressKey, QuizTransition, RewardStats, level_for_credits,
};
use crate::store::ProgressStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Result of applying one graded attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub score: u32,
    pub total: u32,
    pub passed: bool,
    /// Zero unless this attempt was the course's first pass.
    pub credits_earned: u64,
    pub new_level: u64,
}

/// Converts passing results into credits. Levels are derived from credits, never stored.
#[derive(Clone)]
pub struct RewardsEngine {
    store: Arc<dyn ProgressStore>,
    catalog: Arc<Catalog>,
}

impl RewardsEngine {
    pub fn new(store: Arc<dyn ProgressStore>, catalog: Arc<Catalog>) -> Self {
        Self { store, catalog }
    }

    pub async fn apply_quiz_result(
        &self,
        key: &ProgressKey,
        result: &GradeResult,
    ) -> Result<QuizOutcome, AppError> {
        let course = self.catalog.course(&key.course_id).ok_or_else(|| {
            AppError::NotFound(format!("Course with ID {} not found", key.course_id))
        })?;

        let application = self
            .store
            .apply_quiz_result(key, result, course.credits, Utc::now())
            .await?;

        let new_level = level_for_credits(application.total_credits);
        match application.transition {
            QuizTransition::FirstPass { credits } => info!(
                "{} passed with {}/{}: +{} credits, total {} (level {})",
                key, result.score, result.total, credits, application.total_credits, new_level
            ),
            QuizTransition::Failed => info!(
                "{} failed with {}/{}, retake allowed",
                key, result.score, result.total
            ),
            QuizTransition::AlreadyPassed => info!(
                "{} resubmitted after passing ({}/{}), no credits awarded",
                key, result.score, result.total
            ),
        }

        Ok(QuizOutcome {
            score: result.score,
            total: result.total,
            passed: result.passed,
            credits_earned: application.transition.credits_earned(),
            new_level,
        })
    }

    pub async fn stats(&self, student_id: &str) -> Result<RewardStats, AppError> {
        let account = self.store.account(student_id).await?;
        Ok(RewardStats::from(&account))
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, AppError> {
        let balances = self.store.top_balances(limit).await?;
        Ok(balances
            .into_iter()
            .zip(1u32..)
            .map(|(balance, rank)| LeaderboardEntry {
                rank,
                level: level_for_credits(balance.total_credits),
                student_id: balance.student_id,
                total_credits: balance.total_credits,
            })
            .collect())
    }
}
