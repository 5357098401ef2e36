//! The progress and rewards engine.
//!
//! Control flow of a quiz submission: the tracker checks the unlock rule, the evaluator grades,
//! the rewards engine applies the result, and badge evaluation runs afterwards as a separate
//! step over committed state.

use crate::catalog::Catalog;
use crate::errors::AppError;
use crate::model::{EarnedBadge, ProgressKey, Quiz};
use crate::store::ProgressStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod badges;
pub mod evaluator;
pub mod rewards;
pub mod tracker;

pub use badges::BadgeAssigner;
pub use rewards::{QuizOutcome, RewardsEngine};
pub use tracker::ProgressTracker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSubmissionResult {
    #[serde(flatten)]
    pub outcome: QuizOutcome,
    pub new_badges: Vec<EarnedBadge>,
}

#[derive(Clone)]
pub struct LearningEngine {
    pub tracker: ProgressTracker,
    pub rewards: RewardsEngine,
    pub badges: BadgeAssigner,
    catalog: Arc<Catalog>,
}

impl LearningEngine {
    pub fn new(store: Arc<dyn ProgressStore>, catalog: Arc<Catalog>) -> Self {
        Self {
            tracker: ProgressTracker::new(store.clone()),
            rewards: RewardsEngine::new(store.clone(), catalog.clone()),
            badges: BadgeAssigner::new(store, catalog.clone()),
            catalog,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn find_quiz(&self, quiz_id: &str) -> Result<&Quiz, AppError> {
        self.catalog
            .quiz(quiz_id)
            .ok_or_else(|| AppError::NotFound(format!("Quiz with ID {} not found", quiz_id)))
    }

    /// The course quiz without its answers, once the student has unlocked it.
    pub async fn unlocked_quiz(&self, key: &ProgressKey) -> Result<Quiz, AppError> {
        let quiz = self.catalog.quiz_for_course(&key.course_id).ok_or_else(|| {
            AppError::NotFound(format!("Course with ID {} has no quiz", key.course_id))
        })?;
        self.tracker.ensure_quiz_unlocked(key).await?;
        Ok(quiz.clone())
    }

    pub async fn submit_quiz(
        &self,
        student_id: &str,
        quiz_id: &str,
        answers: &HashMap<String, String>,
    ) -> Result<QuizSubmissionResult, AppError> {
        let quiz = self.find_quiz(quiz_id)?;
        let key = ProgressKey::new(student_id, &quiz.course_id);

        self.tracker.ensure_quiz_unlocked(&key).await?;

        let result = evaluator::grade(quiz, answers)?;
        debug!("Graded quiz {} for {}: {:?}", quiz_id, key, result);

        let outcome = self.rewards.apply_quiz_result(&key, &result).await?;

        // The result above is committed; a missed grant is picked up by the next evaluation.
        let new_badges = match self.badges.evaluate(student_id).await {
            Ok(badges) => badges,
            Err(err) => {
                warn!("Badge evaluation failed for student {}: {}", student_id, err);
                Vec::new()
            }
        };

        Ok(QuizSubmissionResult {
            outcome,
            new_badges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Account, BadgeAward, Course, CreditBalance, GradeResult, Question, StudentCourseProgress,
        WatchUpdate, default_badges,
    };
    use crate::store::{MemoryStore, QuizApplication};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    /// Memory store whose badge grants always fail.
    #[derive(Default)]
    struct BadgeOutageStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ProgressStore for BadgeOutageStore {
        async fn start_progress(
            &self,
            key: &ProgressKey,
            now: DateTime<Utc>,
        ) -> Result<(StudentCourseProgress, bool), AppError> {
            self.inner.start_progress(key, now).await
        }

        async fn progress(
            &self,
            key: &ProgressKey,
        ) -> Result<Option<StudentCourseProgress>, AppError> {
            self.inner.progress(key).await
        }

        async fn list_progress(
            &self,
            student_id: &str,
        ) -> Result<Vec<StudentCourseProgress>, AppError> {
            self.inner.list_progress(student_id).await
        }

        async fn update_watch(
            &self,
            key: &ProgressKey,
            update: WatchUpdate,
            now: DateTime<Utc>,
        ) -> Result<(StudentCourseProgress, bool), AppError> {
            self.inner.update_watch(key, update, now).await
        }

        async fn apply_quiz_result(
            &self,
            key: &ProgressKey,
            result: &GradeResult,
            course_credits: u64,
            now: DateTime<Utc>,
        ) -> Result<QuizApplication, AppError> {
            self.inner
                .apply_quiz_result(key, result, course_credits, now)
                .await
        }

        async fn account(&self, student_id: &str) -> Result<Account, AppError> {
            self.inner.account(student_id).await
        }

        async fn grant_badges(
            &self,
            _student_id: &str,
            _badge_ids: &[String],
            _now: DateTime<Utc>,
        ) -> Result<Vec<BadgeAward>, AppError> {
            Err(AppError::InternalServerError(anyhow!("badge table unavailable")))
        }

        async fn top_balances(&self, limit: usize) -> Result<Vec<CreditBalance>, AppError> {
            self.inner.top_balances(limit).await
        }
    }

    fn catalog() -> Catalog {
        let course = Course {
            course_id: "c1".to_string(),
            title: String::new(),
            credits: 50,
            duration_minutes: 10,
        };
        let quiz = Quiz {
            quiz_id: "q1".to_string(),
            course_id: "c1".to_string(),
            title: String::new(),
            questions: vec![Question {
                question: "2 + 2".to_string(),
                options: vec!["3".to_string(), "4".to_string()],
                correct_option: "4".to_string(),
            }],
            total_marks: 1,
            passing_marks: 1,
        };
        Catalog::new(vec![course], vec![quiz], default_badges()).unwrap()
    }

    #[tokio::test]
    async fn test_pass_reported_when_badge_grant_fails() {
        let store = Arc::new(BadgeOutageStore::default());
        let engine = LearningEngine::new(store.clone(), Arc::new(catalog()));
        let key = ProgressKey::new("s1", "c1");
        engine.tracker.start(&key).await.unwrap();
        engine.tracker.mark_video_complete(&key, 10).await.unwrap();

        let answers = HashMap::from([("2 + 2".to_string(), "4".to_string())]);
        let result = engine.submit_quiz("s1", "q1", &answers).await.unwrap();

        assert!(result.outcome.passed);
        assert_eq!(result.outcome.credits_earned, 50);
        assert!(result.new_badges.is_empty());
        assert_eq!(store.account("s1").await.unwrap().total_credits, 50);
    }
}
