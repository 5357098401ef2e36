//! Durable keyed state behind the engine.
//!
//! Every mutation of a progress record is serialized per `ProgressKey`: backends run the
//! precondition checks and the write under one lock (or one row-locking transaction), so the
//! "video completed" and "already passed" checks cannot race with a concurrent writer.

use crate::errors::AppError;
use crate::model::{
    Account, BadgeAward, CreditBalance, GradeResult, ProgressKey, QuizTransition,
    StudentCourseProgress, WatchUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of applying a graded attempt to a record and its account, as one atomic step.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizApplication {
    pub progress: StudentCourseProgress,
    pub transition: QuizTransition,
    /// Account balance after the step.
    pub total_credits: u64,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Creates the record if absent. Returns the stored record and whether it was created.
    async fn start_progress(
        &self,
        key: &ProgressKey,
        now: DateTime<Utc>,
    ) -> Result<(StudentCourseProgress, bool), AppError>;

    async fn progress(&self, key: &ProgressKey)
    -> Result<Option<StudentCourseProgress>, AppError>;

    async fn list_progress(&self, student_id: &str)
    -> Result<Vec<StudentCourseProgress>, AppError>;

    /// Applies a watch-time update. Returns the stored record and whether it changed.
    /// `NotFound` when the record does not exist.
    async fn update_watch(
        &self,
        key: &ProgressKey,
        update: WatchUpdate,
        now: DateTime<Utc>,
    ) -> Result<(StudentCourseProgress, bool), AppError>;

    /// Applies a graded attempt and credits the account on a first pass.
    /// `NotFound` without a record, `PreconditionFailed` while the quiz is locked.
    async fn apply_quiz_result(
        &self,
        key: &ProgressKey,
        result: &GradeResult,
        course_credits: u64,
        now: DateTime<Utc>,
    ) -> Result<QuizApplication, AppError>;

    /// Committed account state. Students without any credit get an empty account.
    async fn account(&self, student_id: &str) -> Result<Account, AppError>;

    /// Grants the given badges, skipping those already held. Returns only the new awards.
    async fn grant_badges(
        &self,
        student_id: &str,
        badge_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<BadgeAward>, AppError>;

    /// Balances ordered by credits descending, then student id.
    async fn top_balances(&self, limit: usize) -> Result<Vec<CreditBalance>, AppError>;
}

pub(crate) fn progress_not_found(key: &ProgressKey) -> AppError {
    AppError::NotFound(format!(
        "Progress not found for {}. Start the course first.",
        key
    ))
}
