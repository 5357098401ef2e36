use crate::catalog::Catalog;
use crate::errors::AppError;
use crate::model::{Account, Badge, EarnedBadge};
use crate::store::ProgressStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Badges whose rule holds for the account and which the account does not own yet.
pub fn pending_badges<'a>(badges: &'a [Badge], account: &Account) -> Vec<&'a Badge> {
    badges
        .iter()
        .filter(|badge| !account.has_badge(&badge.badge_id) && badge.rule.is_satisfied(account))
        .collect()
}

/// Grants catalog badges against committed account state. Safe to re-run at any time.
#[derive(Clone)]
pub struct BadgeAssigner {
    store: Arc<dyn ProgressStore>,
    catalog: Arc<Catalog>,
}

impl BadgeAssigner {
    pub fn new(store: Arc<dyn ProgressStore>, catalog: Arc<Catalog>) -> Self {
        Self { store, catalog }
    }

    /// Returns only the badges granted by this call.
    pub async fn evaluate(&self, student_id: &str) -> Result<Vec<EarnedBadge>, AppError> {
        let account = self.store.account(student_id).await?;
        let pending: Vec<String> = pending_badges(self.catalog.badges(), &account)
            .into_iter()
            .map(|badge| badge.badge_id.clone())
            .collect();

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let awards = self
            .store
            .grant_badges(student_id, &pending, Utc::now())
            .await?;
        for award in &awards {
            info!("Awarded badge {} to student {}", award.badge_id, student_id);
        }

        Ok(awards
            .into_iter()
            .filter_map(|award| {
                self.catalog.badge(&award.badge_id).map(|badge| EarnedBadge {
                    badge: badge.clone(),
                    earned_at: award.earned_at,
                })
            })
            .collect())
    }

    pub async fn earned_badges(&self, student_id: &str) -> Result<Vec<EarnedBadge>, AppError> {
        let account = self.store.account(student_id).await?;
        Ok(account
            .badges
            .into_iter()
            .filter_map(|award| match self.catalog.badge(&award.badge_id) {
                Some(badge) => Some(EarnedBadge {
                    badge: badge.clone(),
                    earned_at: award.earned_at,
                }),
                None => {
                    warn!(
                        "Student {} holds badge {} which is no longer in the catalog",
                        student_id, award.badge_id
                    );
                    None
                }
            })
            .collect())
    }

    pub fn catalog_badges(&self) -> &[Badge] {
        self.catalog.badges()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BadgeAward, default_badges};

    #[test]
    fn test_pending_skips_owned_and_unsatisfied() {
        let badges = default_badges();
        let account = Account {
            student_id: "s1".to_string(),
            total_credits: 550,
            completed_courses: 2,
            badges: vec![BadgeAward {
                student_id: "s1".to_string(),
                badge_id: "first-steps".to_string(),
                earned_at: Utc::now(),
            }],
        };

        let ids: Vec<_> = pending_badges(&badges, &account)
            .into_iter()
            .map(|b| b.badge_id.as_str())
            .collect();
        assert_eq!(ids, vec!["knowledge-seeker"]);
    }

    #[test]
    fn test_nothing_pending_for_new_student() {
        let badges = default_badges();
        assert!(pending_badges(&badges, &Account::empty("s1")).is_empty());
    }
}
