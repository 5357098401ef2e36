use super::{ProgressStore, QuizApplication, progress_not_found};
use crate::errors::AppError;
use crate::model::{
    Account, BadgeAward, CreditBalance, GradeResult, ProgressKey, StudentCourseProgress,
    WatchUpdate,
};
use crate::schema::{
    accounts::dsl as ac_dsl, badge_awards::dsl as ba_dsl, student_course_progress::dsl as scp_dsl,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_diesel::Runtime;
use deadpool_diesel::postgres::{Manager, Pool};
use diesel::prelude::*;
use tracing::{debug, error, info};

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::student_course_progress)]
#[diesel(primary_key(student_id, course_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ProgressRow {
    student_id: String,
    course_id: String,
    watch_duration: i32,
    video_completed: bool,
    quiz_passed: bool,
    quiz_score: Option<i32>,
    quiz_attempts: i32,
    credits_earned: i64,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    last_accessed: DateTime<Utc>,
}

impl TryFrom<ProgressRow> for StudentCourseProgress {
    type Error = anyhow::Error;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        Ok(Self {
            watch_duration: u32::try_from(row.watch_duration).context("negative watch_duration")?,
            video_completed: row.video_completed,
            quiz_passed: row.quiz_passed,
            quiz_score: row
                .quiz_score
                .map(u32::try_from)
                .transpose()
                .context("negative quiz_score")?,
            quiz_attempts: u32::try_from(row.quiz_attempts).context("negative quiz_attempts")?,
            credits_earned: u64::try_from(row.credits_earned).context("negative credits_earned")?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            last_accessed: row.last_accessed,
            student_id: row.student_id,
            course_id: row.course_id,
        })
    }
}

impl TryFrom<&StudentCourseProgress> for ProgressRow {
    type Error = anyhow::Error;

    fn try_from(progress: &StudentCourseProgress) -> Result<Self, Self::Error> {
        Ok(Self {
            student_id: progress.student_id.clone(),
            course_id: progress.course_id.clone(),
            watch_duration: i32::try_from(progress.watch_duration)
                .context("watch_duration out of range")?,
            video_completed: progress.video_completed,
            quiz_passed: progress.quiz_passed,
            quiz_score: progress
                .quiz_score
                .map(i32::try_from)
                .transpose()
                .context("quiz_score out of range")?,
            quiz_attempts: i32::try_from(progress.quiz_attempts)
                .context("quiz_attempts out of range")?,
            credits_earned: i64::try_from(progress.credits_earned)
                .context("credits_earned out of range")?,
            started_at: progress.started_at,
            completed_at: progress.completed_at,
            last_accessed: progress.last_accessed,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::badge_awards)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct BadgeAwardRow {
    student_id: String,
    badge_id: String,
    earned_at: DateTime<Utc>,
}

impl From<BadgeAwardRow> for BadgeAward {
    fn from(row: BadgeAwardRow) -> Self {
        Self {
            student_id: row.student_id,
            badge_id: row.badge_id,
            earned_at: row.earned_at,
        }
    }
}

fn to_u64(value: i64, what: &str) -> anyhow::Result<u64> {
    u64::try_from(value).with_context(|| format!("negative {} in database", what))
}

/// Postgres-backed store. Mutations lock the progress row (`FOR UPDATE`) inside a
/// transaction before checking any precondition.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn connect(conn_str: &str, max_size: u32) -> anyhow::Result<Self> {
        info!("Initializing database pool...");
        let manager = Manager::new(conn_str, Runtime::Tokio1);
        let pool = Pool::builder(manager)
            .max_size(max_size as usize)
            .build()
            .context("Failed to initialize database pool")?;
        Ok(Self::new(pool))
    }

    async fn transaction<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await.map_err(|pool_err| {
            error!(
                "Failed to get DB connection object from pool: {:?}",
                pool_err
            );
            AppError::from(pool_err)
        })?;
        debug!("DB connection object obtained from pool for interaction");

        conn.interact(move |conn_sync| conn_sync.transaction(op))
            .await?
    }

    /// Read-only transaction with a stable snapshot across its queries.
    async fn snapshot<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await?;
        conn.interact(move |conn_sync| {
            conn_sync
                .build_transaction()
                .read_only()
                .repeatable_read()
                .run(op)
        })
        .await?
    }
}

fn lock_progress(conn: &mut PgConnection, key: &ProgressKey) -> Result<ProgressRow, AppError> {
    scp_dsl::student_course_progress
        .find((key.student_id.as_str(), key.course_id.as_str()))
        .select(ProgressRow::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| progress_not_found(key))
}

fn save_progress(conn: &mut PgConnection, progress: &StudentCourseProgress) -> Result<(), AppError> {
    let row = ProgressRow::try_from(progress)?;
    let rows_affected = diesel::update(
        scp_dsl::student_course_progress
            .find((progress.student_id.as_str(), progress.course_id.as_str())),
    )
    .set(&row)
    .execute(conn)?;

    if rows_affected != 1 {
        error!(
            "Expected 1 progress row to be updated for {}, got {}",
            progress.key(),
            rows_affected
        );
        return Err(AppError::InternalServerError(anyhow::anyhow!(
            "Progress update affected {} rows, expected 1",
            rows_affected
        )));
    }
    Ok(())
}

fn ensure_account(
    conn: &mut PgConnection,
    student_id: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    diesel::insert_into(ac_dsl::accounts)
        .values((
            ac_dsl::student_id.eq(student_id),
            ac_dsl::total_credits.eq(0_i64),
            ac_dsl::updated_at.eq(now),
        ))
        .on_conflict(ac_dsl::student_id)
        .do_nothing()
        .execute(conn)?;
    Ok(())
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn start_progress(
        &self,
        key: &ProgressKey,
        now: DateTime<Utc>,
    ) -> Result<(StudentCourseProgress, bool), AppError> {
        let key = key.clone();
        self.transaction(move |conn| {
            let row = ProgressRow::try_from(&StudentCourseProgress::new(&key, now))?;
            let inserted = diesel::insert_into(scp_dsl::student_course_progress)
                .values(&row)
                .on_conflict((scp_dsl::student_id, scp_dsl::course_id))
                .do_nothing()
                .execute(conn)?;

            let stored = scp_dsl::student_course_progress
                .find((key.student_id.as_str(), key.course_id.as_str()))
                .select(ProgressRow::as_select())
                .first(conn)?;
            Ok((StudentCourseProgress::try_from(stored)?, inserted == 1))
        })
        .await
    }

    async fn progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<StudentCourseProgress>, AppError> {
        let key = key.clone();
        self.snapshot(move |conn| {
            let row = scp_dsl::student_course_progress
                .find((key.student_id.as_str(), key.course_id.as_str()))
                .select(ProgressRow::as_select())
                .first(conn)
                .optional()?;
            match row {
                Some(row) => Ok(Some(StudentCourseProgress::try_from(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_progress(
        &self,
        student_id: &str,
    ) -> Result<Vec<StudentCourseProgress>, AppError> {
        let student_id = student_id.to_string();
        self.snapshot(move |conn| {
            let rows = scp_dsl::student_course_progress
                .filter(scp_dsl::student_id.eq(student_id.as_str()))
                .order(scp_dsl::course_id.asc())
                .select(ProgressRow::as_select())
                .load(conn)?;
            rows.into_iter()
                .map(|row| StudentCourseProgress::try_from(row).map_err(AppError::from))
                .collect()
        })
        .await
    }

    async fn update_watch(
        &self,
        key: &ProgressKey,
        update: WatchUpdate,
        now: DateTime<Utc>,
    ) -> Result<(StudentCourseProgress, bool), AppError> {
        let key = key.clone();
        self.transaction(move |conn| {
            let mut progress = StudentCourseProgress::try_from(lock_progress(conn, &key)?)?;
            let changed = progress.apply_watch_update(update, now);
            if changed {
                save_progress(conn, &progress)?;
            }
            Ok((progress, changed))
        })
        .await
    }

    async fn apply_quiz_result(
        &self,
        key: &ProgressKey,
        result: &GradeResult,
        course_credits: u64,
        now: DateTime<Utc>,
    ) -> Result<QuizApplication, AppError> {
        let key = key.clone();
        let result = *result;
        self.transaction(move |conn| {
            let mut progress = StudentCourseProgress::try_from(lock_progress(conn, &key)?)?;
            let transition = progress.apply_quiz_result(&result, course_credits, now)?;
            save_progress(conn, &progress)?;

            let credits = i64::try_from(transition.credits_earned())
                .context("course credits out of range")?;
            let total_credits = if credits > 0 {
                diesel::insert_into(ac_dsl::accounts)
                    .values((
                        ac_dsl::student_id.eq(key.student_id.as_str()),
                        ac_dsl::total_credits.eq(credits),
                        ac_dsl::updated_at.eq(now),
                    ))
                    .on_conflict(ac_dsl::student_id)
                    .do_update()
                    .set((
                        ac_dsl::total_credits.eq(ac_dsl::total_credits + credits),
                        ac_dsl::updated_at.eq(now),
                    ))
                    .returning(ac_dsl::total_credits)
                    .get_result::<i64>(conn)?
            } else {
                ac_dsl::accounts
                    .find(key.student_id.as_str())
                    .select(ac_dsl::total_credits)
                    .first::<i64>(conn)
                    .optional()?
                    .unwrap_or(0)
            };

            Ok(QuizApplication {
                progress,
                transition,
                total_credits: to_u64(total_credits, "total_credits")?,
            })
        })
        .await
    }

    async fn account(&self, student_id: &str) -> Result<Account, AppError> {
        let student_id = student_id.to_string();
        self.snapshot(move |conn| {
            let total_credits = ac_dsl::accounts
                .find(student_id.as_str())
                .select(ac_dsl::total_credits)
                .first::<i64>(conn)
                .optional()?
                .unwrap_or(0);

            let completed_courses = scp_dsl::student_course_progress
                .filter(scp_dsl::student_id.eq(student_id.as_str()))
                .filter(scp_dsl::quiz_passed.eq(true))
                .count()
                .get_result::<i64>(conn)?;

            let badges = ba_dsl::badge_awards
                .filter(ba_dsl::student_id.eq(student_id.as_str()))
                .order((ba_dsl::earned_at.asc(), ba_dsl::badge_id.asc()))
                .select(BadgeAwardRow::as_select())
                .load(conn)?
                .into_iter()
                .map(BadgeAward::from)
                .collect();

            Ok(Account {
                total_credits: to_u64(total_credits, "total_credits")?,
                completed_courses: to_u64(completed_courses, "completed course count")?,
                badges,
                student_id,
            })
        })
        .await
    }

    async fn grant_badges(
        &self,
        student_id: &str,
        badge_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<BadgeAward>, AppError> {
        if badge_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<BadgeAwardRow> = badge_ids
            .iter()
            .map(|badge_id| BadgeAwardRow {
                student_id: student_id.to_string(),
                badge_id: badge_id.clone(),
                earned_at: now,
            })
            .collect();
        let student_id = student_id.to_string();

        self.transaction(move |conn| {
            ensure_account(conn, &student_id, now)?;
            let granted = diesel::insert_into(ba_dsl::badge_awards)
                .values(&rows)
                .on_conflict_do_nothing()
                .returning(BadgeAwardRow::as_returning())
                .get_results(conn)?;
            Ok(granted.into_iter().map(BadgeAward::from).collect())
        })
        .await
    }

    async fn top_balances(&self, limit: usize) -> Result<Vec<CreditBalance>, AppError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.snapshot(move |conn| {
            ac_dsl::accounts
                .select((ac_dsl::student_id, ac_dsl::total_credits))
                .order((ac_dsl::total_credits.desc(), ac_dsl::student_id.asc()))
                .limit(limit)
                .load::<(String, i64)>(conn)?
                .into_iter()
                .map(|(student_id, total_credits)| -> Result<CreditBalance, AppError> {
                    Ok(CreditBalance {
                        total_credits: to_u64(total_credits, "total_credits")?,
                        student_id,
                    })
                })
                .collect()
        })
        .await
    }
}
