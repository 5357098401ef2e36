use crate::model::badge::BadgeAward;
use serde::{Deserialize, Serialize};

pub const CREDITS_PER_LEVEL: u64 = 500;

/// Level derived from cumulative credits: one level per 500 credits, starting at 1.
pub fn level_for_credits(total_credits: u64) -> u64 {
    total_credits / CREDITS_PER_LEVEL + 1
}

/// Credits still missing before the next level is reached.
pub fn credits_to_next_level(total_credits: u64) -> u64 {
    level_for_credits(total_credits) * CREDITS_PER_LEVEL - total_credits
}

/// Committed account state of a student. The level is never stored, only derived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    pub student_id: String,
    pub total_credits: u64,
    pub completed_courses: u64,
    pub badges: Vec<BadgeAward>,
}

impl Account {
    pub fn empty(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            ..Self::default()
        }
    }

    pub fn level(&self) -> u64 {
        level_for_credits(self.total_credits)
    }

    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges.iter().any(|award| award.badge_id == badge_id)
    }
}

/// Snapshot served by `/rewards/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStats {
    pub total_credits: u64,
    pub level: u64,
    pub credits_to_next_level: u64,
    pub completed_courses: u64,
    pub total_badges: u64,
}

impl From<&Account> for RewardStats {
    fn from(account: &Account) -> Self {
        Self {
            total_credits: account.total_credits,
            level: account.level(),
            credits_to_next_level: credits_to_next_level(account.total_credits),
            completed_courses: account.completed_courses,
            total_badges: account.badges.len() as u64,
        }
    }
}

/// Credit balance as kept by the store, used for ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditBalance {
    pub student_id: String,
    pub total_credits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub student_id: String,
    pub total_credits: u64,
    pub level: u64,
}
