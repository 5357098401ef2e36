use crate::model::account::Account;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unlock condition of a badge, evaluated against committed account state only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BadgeRule {
    Credits { threshold: u64 },
    Level { threshold: u64 },
    CoursesCompleted { count: u64 },
}

impl BadgeRule {
    pub fn is_satisfied(&self, account: &Account) -> bool {
        match *self {
            BadgeRule::Credits { threshold } => account.total_credits >= threshold,
            BadgeRule::Level { threshold } => account.level() >= threshold,
            BadgeRule::CoursesCompleted { count } => account.completed_courses >= count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub badge_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub icon: String,
    #[serde(default = "default_rarity")]
    pub rarity: String,
    pub rule: BadgeRule,
}

fn default_rarity() -> String {
    "common".to_string()
}

/// One-time grant of a badge. Unique per (student_id, badge_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeAward {
    pub student_id: String,
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
}

/// Catalog badge joined with the student's award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnedBadge {
    #[serde(flatten)]
    pub badge: Badge,
    pub earned_at: DateTime<Utc>,
}

/// Badge catalog used when the catalog document does not provide one.
pub fn default_badges() -> Vec<Badge> {
    let badge = |id: &str, name: &str, description: &str, icon: &str, rarity: &str, rule| Badge {
        badge_id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        rarity: rarity.to_string(),
        rule,
    };

    vec![
        badge(
            "first-steps",
            "First Steps",
            "Complete your first course",
            "🎯",
            "common",
            BadgeRule::CoursesCompleted { count: 1 },
        ),
        badge(
            "knowledge-seeker",
            "Knowledge Seeker",
            "Earn 500 credits",
            "📚",
            "rare",
            BadgeRule::Credits { threshold: 500 },
        ),
        badge(
            "rising-star",
            "Rising Star",
            "Reach Level 3",
            "⭐",
            "rare",
            BadgeRule::Level { threshold: 3 },
        ),
        badge(
            "master-learner",
            "Master Learner",
            "Earn 1000 credits",
            "🏅",
            "epic",
            BadgeRule::Credits { threshold: 1000 },
        ),
        badge(
            "legend",
            "Legend",
            "Reach Level 5",
            "👑",
            "legendary",
            BadgeRule::Level { threshold: 5 },
        ),
    ]
}
