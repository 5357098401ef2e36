pub mod account;
pub mod badge;
pub mod course;
pub mod progress;
pub mod quiz;

pub use account::{
    Account, CREDITS_PER_LEVEL, CreditBalance, LeaderboardEntry, RewardStats,
    credits_to_next_level, level_for_credits,
};
pub use badge::{Badge, BadgeAward, BadgeRule, EarnedBadge, default_badges};
pub use course::Course;
pub use progress::{
    ProgressKey, ProgressState, ProgressView, QuizTransition, StudentCourseProgress, WatchUpdate,
};
pub use quiz::{GradeResult, Question, Quiz};
