use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseError;

pub const PROJECT_POINTS: f64 = 1.0;
pub const CONCEPT_POINTS: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct UserProgress {
    pub user_id: i64,
    pub username: String,
    pub start_date: NaiveDate,
    pub current_week: i32,
    pub week_started_on: NaiveDate,
    pub total_points: f64,
    pub projects_completed: i32,
    pub concepts_mastered: i32,
    pub total_hours: f64,
    pub study_days: i32,
    pub current_streak: i32,
    pub last_study_date: Option<NaiveDate>,
}

impl UserProgress {
    pub fn new(user_id: i64, username: &str, today: NaiveDate) -> Self {
        Self {
            user_id,
            username: username.to_string(),
            start_date: today,
            current_week: 1,
            week_started_on: today,
            total_points: 0.0,
            projects_completed: 0,
            concepts_mastered: 0,
            total_hours: 0.0,
            study_days: 0,
            current_streak: 0,
            last_study_date: None,
        }
    }

    /// Streak as seen on `today`: a gap of more than one day breaks it.
    pub fn streak_on(&self, today: NaiveDate) -> i32 {
        match self.last_study_date {
            Some(last) if today - last <= Duration::days(1) => self.current_streak,
            _ => 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.total_hours > 0.0 || self.projects_completed > 0
    }

    pub fn apply_study(&mut self, hours: f64, today: NaiveDate) {
        self.total_hours += hours;

        if self.last_study_date == Some(today) {
            return;
        }

        self.study_days += 1;
        self.current_streak = match self.last_study_date {
            Some(last) if today - last == Duration::days(1) => self.current_streak + 1,
            _ => 1,
        };
        self.last_study_date = Some(today);
    }

    pub fn apply_project(&mut self) {
        self.projects_completed += 1;
        self.total_points += PROJECT_POINTS;
    }

    pub fn apply_concept(&mut self) {
        self.concepts_mastered += 1;
        self.total_points += CONCEPT_POINTS;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyLog {
    pub user_id: i64,
    pub date: NaiveDate,
    pub hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    ScreenshotProject,
    DeployedUrl,
    GithubRepository,
    CodeExplanation,
    MobileTest,
}

impl EvidenceKind {
    pub fn all() -> [EvidenceKind; 5] {
        [
            EvidenceKind::ScreenshotProject,
            EvidenceKind::DeployedUrl,
            EvidenceKind::GithubRepository,
            EvidenceKind::CodeExplanation,
            EvidenceKind::MobileTest,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::ScreenshotProject => "screenshot_project",
            EvidenceKind::DeployedUrl => "deployed_url",
            EvidenceKind::GithubRepository => "github_repository",
            EvidenceKind::CodeExplanation => "code_explanation",
            EvidenceKind::MobileTest => "mobile_test",
        }
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceKind {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EvidenceKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| ParseError::UnknownEvidenceType(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    Missing,
    PendingReview,
    Approved,
    Invalid,
}

impl EvidenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceStatus::Missing => "missing",
            EvidenceStatus::PendingReview => "pending_review",
            EvidenceStatus::Approved => "approved",
            EvidenceStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceStatus {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "missing" => Ok(EvidenceStatus::Missing),
            "pending_review" => Ok(EvidenceStatus::PendingReview),
            "approved" => Ok(EvidenceStatus::Approved),
            "invalid" => Ok(EvidenceStatus::Invalid),
            other => Err(ParseError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub week: i32,
    pub kind: EvidenceKind,
    pub content: String,
    pub status: EvidenceStatus,
    pub submitted_on: NaiveDate,
    pub reviewed_on: Option<NaiveDate>,
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

/// Status of one required evidence type within a week.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceState {
    pub status: EvidenceStatus,
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

impl EvidenceState {
    pub fn missing() -> Self {
        Self {
            status: EvidenceStatus::Missing,
            score: None,
            feedback: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub status: EvidenceStatus,
    pub message: String,
    pub auto_validated: bool,
}

impl ValidationOutcome {
    pub fn approved(message: impl Into<String>) -> Self {
        Self {
            status: EvidenceStatus::Approved,
            message: message.into(),
            auto_validated: true,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: EvidenceStatus::Invalid,
            message: message.into(),
            auto_validated: true,
        }
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            status: EvidenceStatus::PendingReview,
            message: message.into(),
            auto_validated: false,
        }
    }
}

/// Answers keyed by question index ("0", "1", ...).
pub type Answers = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct ExamResult {
    pub id: Uuid,
    pub user_id: i64,
    pub week: i32,
    pub attempt_number: i32,
    pub score: f64,
    pub passed: bool,
    pub answers: Answers,
    pub taken_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub score: f64,
    pub passed: bool,
    pub correct_count: usize,
    pub auto_question_count: usize,
    pub pending_review_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn consecutive_days_extend_streak() {
        let mut user = UserProgress::new(1, "ana", day(1));
        user.apply_study(1.0, day(1));
        user.apply_study(0.5, day(1));
        user.apply_study(2.0, day(2));

        assert_eq!(user.study_days, 2);
        assert_eq!(user.current_streak, 2);
        assert!((user.total_hours - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn gap_restarts_streak() {
        let mut user = UserProgress::new(1, "ana", day(1));
        user.apply_study(1.0, day(1));
        user.apply_study(1.0, day(2));
        user.apply_study(1.0, day(5));

        assert_eq!(user.current_streak, 1);
        assert_eq!(user.study_days, 3);
    }

    #[test]
    fn observed_streak_drops_after_missed_day() {
        let mut user = UserProgress::new(1, "ana", day(1));
        user.apply_study(1.0, day(1));
        user.apply_study(1.0, day(2));

        assert_eq!(user.streak_on(day(3)), 2);
        assert_eq!(user.streak_on(day(4)), 0);
    }

    #[test]
    fn points_follow_projects_and_concepts() {
        let mut user = UserProgress::new(1, "ana", day(1));
        user.apply_project();
        user.apply_concept();
        user.apply_concept();
        user.apply_concept();

        let expected = user.projects_completed as f64 + 0.5 * user.concepts_mastered as f64;
        assert!((user.total_points - expected).abs() < f64::EPSILON);
        assert!((user.total_points - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn activity_needs_hours_or_projects() {
        let mut user = UserProgress::new(1, "ana", day(1));
        assert!(!user.is_active());
        user.apply_concept();
        assert!(!user.is_active());
        user.apply_project();
        assert!(user.is_active());

        let mut studied = UserProgress::new(2, "ben", day(1));
        studied.apply_study(0.5, day(1));
        assert!(studied.is_active());
    }

    #[test]
    fn evidence_kinds_parse_from_wire_names() {
        for kind in EvidenceKind::all() {
            assert_eq!(kind.as_str().parse::<EvidenceKind>().unwrap(), kind);
        }
        assert!("video".parse::<EvidenceKind>().is_err());
        assert_eq!(
            "pending_review".parse::<EvidenceStatus>().unwrap(),
            EvidenceStatus::PendingReview
        );
    }
}
