//! Persistence seam for learner records, daily logs, evidence and exam results.

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{DailyLog, EvidenceKind, EvidenceRecord, EvidenceStatus, ExamResult, UserProgress};

/// Fields written when evidence is (re)evaluated or reviewed.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: EvidenceStatus,
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub reviewed_on: Option<NaiveDate>,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Create the learner on first contact; existing records are returned untouched.
    async fn ensure_user(
        &self,
        user_id: i64,
        username: &str,
        today: NaiveDate,
    ) -> anyhow::Result<UserProgress>;

    async fn user(&self, user_id: i64) -> anyhow::Result<Option<UserProgress>>;

    /// Learners with any hours or projects, most recently studied first.
    async fn active_users(&self) -> anyhow::Result<Vec<UserProgress>>;

    /// Adds hours to the totals and merges them into today's log.
    async fn record_study(
        &self,
        user_id: i64,
        hours: f64,
        today: NaiveDate,
    ) -> anyhow::Result<UserProgress>;

    async fn record_project(&self, user_id: i64) -> anyhow::Result<UserProgress>;

    async fn record_concept(&self, user_id: i64) -> anyhow::Result<UserProgress>;

    /// Moves the learner to `week` and restarts the week clock.
    async fn set_week(&self, user_id: i64, week: i32, today: NaiveDate) -> anyhow::Result<()>;

    async fn study_history(&self, user_id: i64, days: usize) -> anyhow::Result<Vec<DailyLog>>;

    /// Writes the content for (user, week, kind) and resets its status to pending review.
    async fn upsert_evidence(
        &self,
        user_id: i64,
        week: i32,
        kind: EvidenceKind,
        content: &str,
        today: NaiveDate,
    ) -> anyhow::Result<EvidenceRecord>;

    /// Returns false when no evidence exists for (user, week, kind).
    async fn set_evidence_status(
        &self,
        user_id: i64,
        week: i32,
        kind: EvidenceKind,
        update: &StatusUpdate,
    ) -> anyhow::Result<bool>;

    async fn week_evidence(&self, user_id: i64, week: i32) -> anyhow::Result<Vec<EvidenceRecord>>;

    /// Highest stored attempt for (user, week) plus one.
    async fn next_attempt(&self, user_id: i64, week: i32) -> anyhow::Result<i32>;

    async fn insert_exam_result(&self, result: &ExamResult) -> anyhow::Result<()>;

    async fn latest_exam_result(
        &self,
        user_id: i64,
        week: i32,
    ) -> anyhow::Result<Option<ExamResult>>;

    /// All attempts for (user, week), oldest first.
    async fn exam_attempts(&self, user_id: i64, week: i32) -> anyhow::Result<Vec<ExamResult>>;
}

pub fn unknown_user(user_id: i64) -> anyhow::Error {
    anyhow::anyhow!("learner {user_id} is not enrolled; run `start` first")
}
