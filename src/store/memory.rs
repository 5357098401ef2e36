use super::{ProgressStore, QuizApplication, progress_not_found};
use crate::errors::AppError;
use crate::model::{
    Account, BadgeAward, CreditBalance, GradeResult, ProgressKey, QuizTransition,
    StudentCourseProgress, WatchUpdate,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct AccountRecord {
    total_credits: u64,
    completed_courses: u64,
    badges: BTreeMap<String, DateTime<Utc>>,
}

/// In-process store. Each progress record sits behind its own mutex so writers on different
/// keys never wait on each other; the outer map lock is only held to find or insert a slot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    progress: RwLock<HashMap<ProgressKey, Arc<Mutex<StudentCourseProgress>>>>,
    accounts: Mutex<HashMap<String, AccountRecord>>,
}

fn poisoned(what: &str) -> AppError {
    AppError::InternalServerError(anyhow!("{} lock poisoned", what))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &ProgressKey) -> Result<Option<Arc<Mutex<StudentCourseProgress>>>, AppError> {
        let map = self.progress.read().map_err(|_| poisoned("progress map"))?;
        Ok(map.get(key).cloned())
    }

    fn lock_record(
        slot: &Mutex<StudentCourseProgress>,
    ) -> Result<MutexGuard<'_, StudentCourseProgress>, AppError> {
        slot.lock().map_err(|_| poisoned("progress record"))
    }

    fn lock_accounts(&self) -> Result<MutexGuard<'_, HashMap<String, AccountRecord>>, AppError> {
        self.accounts.lock().map_err(|_| poisoned("accounts"))
    }

    fn student_slots(
        &self,
        student_id: &str,
    ) -> Result<Vec<Arc<Mutex<StudentCourseProgress>>>, AppError> {
        let map = self.progress.read().map_err(|_| poisoned("progress map"))?;
        let mut slots: Vec<_> = map
            .iter()
            .filter(|(key, _)| key.student_id == student_id)
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect();
        slots.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(slots.into_iter().map(|(_, slot)| slot).collect())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn start_progress(
        &self,
        key: &ProgressKey,
        now: DateTime<Utc>,
    ) -> Result<(StudentCourseProgress, bool), AppError> {
        let slot = {
            let mut map = self.progress.write().map_err(|_| poisoned("progress map"))?;
            match map.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let record = StudentCourseProgress::new(key, now);
                    map.insert(key.clone(), Arc::new(Mutex::new(record.clone())));
                    debug!("Inserted progress record for {}", key);
                    return Ok((record, true));
                }
            }
        };

        let existing = Self::lock_record(&slot)?.clone();
        Ok((existing, false))
    }

    async fn progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<StudentCourseProgress>, AppError> {
        let Some(slot) = self.slot(key)? else {
            return Ok(None);
        };
        let record = Self::lock_record(&slot)?.clone();
        Ok(Some(record))
    }

    async fn list_progress(
        &self,
        student_id: &str,
    ) -> Result<Vec<StudentCourseProgress>, AppError> {
        let slots = self.student_slots(student_id)?;
        let mut records = Vec::with_capacity(slots.len());
        for slot in &slots {
            records.push(Self::lock_record(slot)?.clone());
        }
        Ok(records)
    }

    async fn update_watch(
        &self,
        key: &ProgressKey,
        update: WatchUpdate,
        now: DateTime<Utc>,
    ) -> Result<(StudentCourseProgress, bool), AppError> {
        let slot = self.slot(key)?.ok_or_else(|| progress_not_found(key))?;
        let mut record = Self::lock_record(&slot)?;
        let changed = record.apply_watch_update(update, now);
        Ok((record.clone(), changed))
    }

    async fn apply_quiz_result(
        &self,
        key: &ProgressKey,
        result: &GradeResult,
        course_credits: u64,
        now: DateTime<Utc>,
    ) -> Result<QuizApplication, AppError> {
        let slot = self.slot(key)?.ok_or_else(|| progress_not_found(key))?;
        // The record lock is held until the account is credited.
        let mut record = Self::lock_record(&slot)?;

        let mut updated = record.clone();
        let transition = updated.apply_quiz_result(result, course_credits, now)?;

        let mut accounts = self.lock_accounts()?;
        let total_credits = match transition {
            QuizTransition::FirstPass { credits } => {
                let account = accounts.entry(key.student_id.clone()).or_default();
                account.total_credits = account.total_credits.checked_add(credits).ok_or_else(
                    || AppError::InternalServerError(anyhow!("credit balance overflow")),
                )?;
                account.completed_courses += 1;
                account.total_credits
            }
            QuizTransition::Failed | QuizTransition::AlreadyPassed => accounts
                .get(&key.student_id)
                .map_or(0, |account| account.total_credits),
        };
        drop(accounts);

        *record = updated.clone();
        Ok(QuizApplication {
            progress: updated,
            transition,
            total_credits,
        })
    }

    async fn account(&self, student_id: &str) -> Result<Account, AppError> {
        // Credits and completions only change together under this lock.
        let accounts = self.lock_accounts()?;
        let mut account = Account::empty(student_id);
        if let Some(record) = accounts.get(student_id) {
            account.total_credits = record.total_credits;
            account.completed_courses = record.completed_courses;
            account.badges = record
                .badges
                .iter()
                .map(|(badge_id, earned_at)| BadgeAward {
                    student_id: student_id.to_string(),
                    badge_id: badge_id.clone(),
                    earned_at: *earned_at,
                })
                .collect();
        }
        Ok(account)
    }

    async fn grant_badges(
        &self,
        student_id: &str,
        badge_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<BadgeAward>, AppError> {
        let mut accounts = self.lock_accounts()?;
        let account = accounts.entry(student_id.to_string()).or_default();

        let mut granted = Vec::new();
        for badge_id in badge_ids {
            if account.badges.contains_key(badge_id) {
                continue;
            }
            account.badges.insert(badge_id.clone(), now);
            granted.push(BadgeAward {
                student_id: student_id.to_string(),
                badge_id: badge_id.clone(),
                earned_at: now,
            });
        }
        Ok(granted)
    }

    async fn top_balances(&self, limit: usize) -> Result<Vec<CreditBalance>, AppError> {
        let accounts = self.lock_accounts()?;
        let mut balances: Vec<_> = accounts
            .iter()
            .map(|(student_id, record)| CreditBalance {
                student_id: student_id.clone(),
                total_credits: record.total_credits,
            })
            .collect();
        drop(accounts);

        balances.sort_by(|a, b| {
            b.total_credits
                .cmp(&a.total_credits)
                .then_with(|| a.student_id.cmp(&b.student_id))
        });
        balances.truncate(limit);
        Ok(balances)
    }
}
