use crate::errors::AppError;
use crate::model::{ProgressKey, ProgressView, StudentCourseProgress, WatchUpdate};
use crate::store::{ProgressStore, progress_not_found};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Starts, advances and reads progress records. Owns the unlock rule.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Creates the record if absent; an existing record is returned untouched.
    pub async fn start(&self, key: &ProgressKey) -> Result<(ProgressView, bool), AppError> {
        let (progress, created) = self.store.start_progress(key, Utc::now()).await?;
        if created {
            info!("Started progress for {}", key);
        } else {
            info!("Progress for {} already exists, returning it", key);
        }
        Ok((progress.into(), created))
    }

    /// Records watched minutes without completing the video.
    pub async fn record_watch_time(
        &self,
        key: &ProgressKey,
        watch_duration: u32,
    ) -> Result<ProgressView, AppError> {
        let (progress, _) = self
            .store
            .update_watch(key, WatchUpdate::Heartbeat(watch_duration), Utc::now())
            .await?;
        Ok(progress.into())
    }

    /// Marks the course video as watched, which unlocks the quiz.
    pub async fn mark_video_complete(
        &self,
        key: &ProgressKey,
        watch_duration: u32,
    ) -> Result<ProgressView, AppError> {
        let (progress, changed) = self
            .store
            .update_watch(key, WatchUpdate::Complete(watch_duration), Utc::now())
            .await?;
        if changed {
            info!(
                "Video completed for {} ({} minutes watched), quiz unlocked",
                key, progress.watch_duration
            );
        } else {
            debug!("Video completion for {} left the record unchanged", key);
        }
        Ok(progress.into())
    }

    pub async fn get_progress(&self, key: &ProgressKey) -> Result<ProgressView, AppError> {
        self.store
            .progress(key)
            .await?
            .map(ProgressView::from)
            .ok_or_else(|| progress_not_found(key))
    }

    pub async fn list_progress(&self, student_id: &str) -> Result<Vec<ProgressView>, AppError> {
        let records = self.store.list_progress(student_id).await?;
        Ok(records.into_iter().map(ProgressView::from).collect())
    }

    /// Returns the record when quiz submission is unlocked for it.
    pub async fn ensure_quiz_unlocked(
        &self,
        key: &ProgressKey,
    ) -> Result<StudentCourseProgress, AppError> {
        let progress = self
            .store
            .progress(key)
            .await?
            .ok_or_else(|| progress_not_found(key))?;
        progress.ensure_quiz_unlocked()?;
        Ok(progress)
    }
}
