use crate::errors::AppError;
use crate::model::quiz::GradeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a progress record. At most one record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgressKey {
    pub student_id: String,
    pub course_id: String,
}

impl ProgressKey {
    pub fn new(student_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            course_id: course_id.into(),
        }
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "student {} / course {}", self.student_id, self.course_id)
    }
}

/// Lifecycle of one student's interaction with one course.
///
/// `NotStarted` has no stored record; every other state is derived from the record's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    NotStarted,
    Started,
    VideoCompleted,
    QuizFailed,
    QuizPassed,
}

impl ProgressState {
    /// Percent-complete band. Quiz pass dominates video completion, which dominates watch time.
    pub fn percent_complete(self, watch_duration: u32) -> u8 {
        match self {
            ProgressState::QuizPassed => 100,
            ProgressState::VideoCompleted | ProgressState::QuizFailed => 60,
            ProgressState::Started if watch_duration > 0 => 30,
            ProgressState::Started | ProgressState::NotStarted => 0,
        }
    }
}

/// Watch-time mutation requested by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchUpdate {
    /// Heartbeat: raise the watched minutes without completing the video.
    Heartbeat(u32),
    /// Mark the video as fully watched.
    Complete(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentCourseProgress {
    pub student_id: String,
    pub course_id: String,
    /// Minutes watched, never decreases.
    pub watch_duration: u32,
    pub video_completed: bool,
    pub quiz_passed: bool,
    pub quiz_score: Option<u32>,
    pub quiz_attempts: u32,
    pub credits_earned: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed: DateTime<Utc>,
}

/// What applying a graded attempt did to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizTransition {
    /// Failed attempt recorded; retake allowed.
    Failed,
    /// First pass for this course; credits must be added to the account.
    FirstPass { credits: u64 },
    /// Attempt after the course was already passed; nothing but the attempt counter changes.
    AlreadyPassed,
}

impl QuizTransition {
    pub fn credits_earned(self) -> u64 {
        match self {
            QuizTransition::FirstPass { credits } => credits,
            QuizTransition::Failed | QuizTransition::AlreadyPassed => 0,
        }
    }
}

impl StudentCourseProgress {
    pub fn new(key: &ProgressKey, now: DateTime<Utc>) -> Self {
        Self {
            student_id: key.student_id.clone(),
            course_id: key.course_id.clone(),
            watch_duration: 0,
            video_completed: false,
            quiz_passed: false,
            quiz_score: None,
            quiz_attempts: 0,
            credits_earned: 0,
            started_at: now,
            completed_at: None,
            last_accessed: now,
        }
    }

    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(&self.student_id, &self.course_id)
    }

    pub fn state(&self) -> ProgressState {
        if self.quiz_passed {
            ProgressState::QuizPassed
        } else if self.quiz_attempts > 0 {
            ProgressState::QuizFailed
        } else if self.video_completed {
            ProgressState::VideoCompleted
        } else {
            ProgressState::Started
        }
    }

    pub fn percent_complete(&self) -> u8 {
        self.state().percent_complete(self.watch_duration)
    }

    /// Whether quiz submissions are accepted for this record.
    pub fn quiz_unlocked(&self) -> bool {
        self.video_completed
    }

    pub fn ensure_quiz_unlocked(&self) -> Result<(), AppError> {
        if self.quiz_unlocked() {
            Ok(())
        } else {
            Err(AppError::PreconditionFailed(format!(
                "Quiz for course {} is locked. Complete the video first.",
                self.course_id
            )))
        }
    }

    /// Applies a watch-time update. Returns `true` when the record changed.
    ///
    /// Once a quiz attempt exists the record's video state is frozen and updates are ignored.
    pub fn apply_watch_update(&mut self, update: WatchUpdate, now: DateTime<Utc>) -> bool {
        if matches!(
            self.state(),
            ProgressState::QuizFailed | ProgressState::QuizPassed
        ) {
            return false;
        }

        let (minutes, complete) = match update {
            WatchUpdate::Heartbeat(minutes) => (minutes, false),
            WatchUpdate::Complete(minutes) => (minutes, true),
        };

        let watch_duration = self.watch_duration.max(minutes);
        let video_completed = self.video_completed || complete;
        if watch_duration == self.watch_duration && video_completed == self.video_completed {
            return false;
        }

        self.watch_duration = watch_duration;
        self.video_completed = video_completed;
        self.last_accessed = now;
        true
    }

    /// Applies a graded attempt. Fails with `PreconditionFailed` while the quiz is locked,
    /// leaving the record untouched.
    pub fn apply_quiz_result(
        &mut self,
        result: &GradeResult,
        course_credits: u64,
        now: DateTime<Utc>,
    ) -> Result<QuizTransition, AppError> {
        self.ensure_quiz_unlocked()?;

        self.quiz_attempts = self.quiz_attempts.saturating_add(1);
        self.last_accessed = now;

        if self.quiz_passed {
            return Ok(QuizTransition::AlreadyPassed);
        }

        self.quiz_score = Some(result.score);
        if !result.passed {
            return Ok(QuizTransition::Failed);
        }

        self.quiz_passed = true;
        self.completed_at = Some(now);
        self.credits_earned = course_credits;
        Ok(QuizTransition::FirstPass {
            credits: course_credits,
        })
    }
}

/// Read projection returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressView {
    #[serde(flatten)]
    pub progress: StudentCourseProgress,
    pub state: ProgressState,
    pub percent_complete: u8,
    pub quiz_unlocked: bool,
}

impl From<StudentCourseProgress> for ProgressView {
    fn from(progress: StudentCourseProgress) -> Self {
        Self {
            state: progress.state(),
            percent_complete: progress.percent_complete(),
            quiz_unlocked: progress.quiz_unlocked(),
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> StudentCourseProgress {
        StudentCourseProgress::new(&ProgressKey::new("s1", "c1"), Utc::now())
    }

    fn graded(score: u32, passed: bool) -> GradeResult {
        GradeResult {
            score,
            total: 5,
            passed,
        }
    }

    #[test]
    fn test_percent_complete_bands() {
        let mut progress = fresh();
        assert_eq!(progress.percent_complete(), 0);

        progress.apply_watch_update(WatchUpdate::Heartbeat(4), Utc::now());
        assert_eq!(progress.percent_complete(), 30);

        progress.apply_watch_update(WatchUpdate::Complete(10), Utc::now());
        assert_eq!(progress.percent_complete(), 60);

        progress
            .apply_quiz_result(&graded(4, true), 50, Utc::now())
            .unwrap();
        assert_eq!(progress.percent_complete(), 100);
    }

    #[test]
    fn test_quiz_passed_dominates_other_flags() {
        assert_eq!(ProgressState::QuizPassed.percent_complete(0), 100);
        assert_eq!(ProgressState::VideoCompleted.percent_complete(0), 60);
        assert_eq!(ProgressState::NotStarted.percent_complete(12), 0);
    }

    #[test]
    fn test_watch_duration_never_decreases() {
        let mut progress = fresh();
        progress.apply_watch_update(WatchUpdate::Heartbeat(20), Utc::now());
        let changed = progress.apply_watch_update(WatchUpdate::Complete(5), Utc::now());

        assert!(changed);
        assert_eq!(progress.watch_duration, 20);
        assert!(progress.video_completed);
    }

    #[test]
    fn test_repeated_completion_is_noop() {
        let mut progress = fresh();
        progress.apply_watch_update(WatchUpdate::Complete(30), Utc::now());
        let before = progress.clone();

        assert!(!progress.apply_watch_update(WatchUpdate::Complete(30), Utc::now()));
        assert_eq!(progress, before);
    }

    #[test]
    fn test_quiz_locked_before_video() {
        let mut progress = fresh();
        let before = progress.clone();

        let err = progress
            .apply_quiz_result(&graded(5, true), 50, Utc::now())
            .unwrap_err();

        assert!(matches!(err, AppError::PreconditionFailed(_)));
        assert_eq!(progress, before);
    }

    #[test]
    fn test_failed_then_passed_then_retake() {
        let mut progress = fresh();
        progress.apply_watch_update(WatchUpdate::Complete(30), Utc::now());

        let failed = progress
            .apply_quiz_result(&graded(1, false), 50, Utc::now())
            .unwrap();
        assert_eq!(failed, QuizTransition::Failed);
        assert_eq!(progress.state(), ProgressState::QuizFailed);
        assert_eq!(progress.quiz_score, Some(1));

        let passed = progress
            .apply_quiz_result(&graded(4, true), 50, Utc::now())
            .unwrap();
        assert_eq!(passed, QuizTransition::FirstPass { credits: 50 });
        assert!(progress.completed_at.is_some());

        let retake = progress
            .apply_quiz_result(&graded(0, false), 50, Utc::now())
            .unwrap();
        assert_eq!(retake, QuizTransition::AlreadyPassed);
        assert_eq!(retake.credits_earned(), 0);
        assert!(progress.quiz_passed);
        assert_eq!(progress.quiz_score, Some(4));
        assert_eq!(progress.quiz_attempts, 3);
    }

    #[test]
    fn test_watch_updates_ignored_after_quiz_attempt() {
        let mut progress = fresh();
        progress.apply_watch_update(WatchUpdate::Complete(30), Utc::now());
        progress
            .apply_quiz_result(&graded(1, false), 50, Utc::now())
            .unwrap();

        assert!(!progress.apply_watch_update(WatchUpdate::Heartbeat(90), Utc::now()));
        assert_eq!(progress.watch_duration, 30);
    }
}
