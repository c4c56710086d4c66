//! Evidence intake, automatic checks and the advancement rule built on them.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::bail;
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::curriculum::Curriculum;
use crate::http::LinkChecker;
use crate::models::{EvidenceKind, EvidenceState, EvidenceStatus, ValidationOutcome};
use crate::store::{ProgressStore, StatusUpdate};

const DEFAULT_PAGE_SIGNATURES: [&str; 4] = [
    "welcome to nginx",
    "default web page",
    "it works!",
    "apache default page",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
}

impl Decision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryMetadata {
    #[serde(default)]
    size: u64,
}

pub struct EvidenceValidator {
    store: Arc<dyn ProgressStore>,
    links: Arc<dyn LinkChecker>,
    curriculum: Arc<Curriculum>,
    repo_api: String,
    url_scheme: Regex,
    repository_url: Regex,
}

impl EvidenceValidator {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        links: Arc<dyn LinkChecker>,
        curriculum: Arc<Curriculum>,
        repo_api: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            links,
            curriculum,
            repo_api: repo_api.trim_end_matches('/').to_string(),
            url_scheme: Regex::new(r"^https?://")?,
            repository_url: Regex::new(r"^https://github\.com/([^/\s?#]+)/([^/\s?#]+)")?,
        })
    }

    /// Stores the evidence as pending, runs the check for its type and persists the outcome.
    pub async fn submit(
        &self,
        user_id: i64,
        week: i32,
        kind: EvidenceKind,
        content: &str,
        today: NaiveDate,
    ) -> anyhow::Result<ValidationOutcome> {
        let content = content.trim();
        self.store
            .upsert_evidence(user_id, week, kind, content, today)
            .await?;

        let outcome = self.validate(kind, content).await;
        let update = StatusUpdate {
            status: outcome.status,
            score: None,
            feedback: Some(outcome.message.clone()),
            reviewed_on: outcome.auto_validated.then_some(today),
        };
        self.store
            .set_evidence_status(user_id, week, kind, &update)
            .await?;

        info!(user_id, week, kind = %kind, status = %outcome.status, "evidence evaluated");
        Ok(outcome)
    }

    pub async fn validate(&self, kind: EvidenceKind, content: &str) -> ValidationOutcome {
        match kind {
            EvidenceKind::DeployedUrl => self.validate_deployed_url(content).await,
            EvidenceKind::GithubRepository => self.validate_repository(content).await,
            EvidenceKind::ScreenshotProject => {
                ValidationOutcome::pending("Screenshot received. It will be reviewed manually.")
            }
            EvidenceKind::CodeExplanation | EvidenceKind::MobileTest => {
                ValidationOutcome::pending("Evidence submitted. Manual review required.")
            }
        }
    }

    async fn validate_deployed_url(&self, url: &str) -> ValidationOutcome {
        if !self.url_scheme.is_match(url) {
            return ValidationOutcome::invalid("The URL must start with http:// or https://");
        }

        match self.links.fetch(url).await {
            Ok(page) if page.status == 200 => {
                if looks_like_default_page(&page.body) {
                    ValidationOutcome::invalid(
                        "The URL shows a default server page, not your project",
                    )
                } else {
                    ValidationOutcome::approved("URL validated")
                }
            }
            Ok(page) => ValidationOutcome::invalid(format!(
                "The URL is not reachable (HTTP {})",
                page.status
            )),
            Err(err) => {
                warn!(url, error = %err, "deployed url check failed");
                ValidationOutcome::pending(format!(
                    "Could not check the URL ({err}). Manual review required."
                ))
            }
        }
    }

    async fn validate_repository(&self, url: &str) -> ValidationOutcome {
        let Some(captures) = self.repository_url.captures(url) else {
            return ValidationOutcome::invalid(
                "Must be a GitHub repository URL (https://github.com/<owner>/<repo>)",
            );
        };
        let owner = &captures[1];
        let repo = captures[2].trim_end_matches(".git");
        let api_url = format!("{}/repos/{owner}/{repo}", self.repo_api);

        match self.links.fetch(&api_url).await {
            Ok(page) if page.status == 200 => {
                match serde_json::from_str::<RepositoryMetadata>(&page.body) {
                    Ok(metadata) if metadata.size == 0 => {
                        ValidationOutcome::invalid("The repository is empty")
                    }
                    Ok(_) => ValidationOutcome::approved("GitHub repository validated"),
                    Err(err) => {
                        warn!(url, error = %err, "unreadable repository metadata");
                        ValidationOutcome::pending(
                            "Could not read the repository details. Manual review required.",
                        )
                    }
                }
            }
            Ok(_) => ValidationOutcome::invalid("Repository not found or private"),
            Err(err) => {
                warn!(url, error = %err, "repository check failed");
                ValidationOutcome::pending(format!(
                    "Could not check the repository ({err}). Manual review required."
                ))
            }
        }
    }

    /// Required evidence types for the week, with "missing" for anything never submitted.
    pub async fn week_status(
        &self,
        user_id: i64,
        week: i32,
    ) -> anyhow::Result<BTreeMap<EvidenceKind, EvidenceState>> {
        let records = self.store.week_evidence(user_id, week).await?;

        let status = self
            .curriculum
            .required_evidence(week)
            .into_iter()
            .map(|kind| {
                let state = records
                    .iter()
                    .find(|record| record.kind == kind)
                    .map(|record| EvidenceState {
                        status: record.status,
                        score: record.score,
                        feedback: record.feedback.clone(),
                    })
                    .unwrap_or_else(EvidenceState::missing);
                (kind, state)
            })
            .collect();

        Ok(status)
    }

    /// Mentor decision on a submitted piece of evidence.
    #[allow(clippy::too_many_arguments)]
    pub async fn review(
        &self,
        user_id: i64,
        week: i32,
        kind: EvidenceKind,
        approved: bool,
        score: Option<f64>,
        feedback: Option<String>,
        today: NaiveDate,
    ) -> anyhow::Result<EvidenceStatus> {
        let status = if approved {
            EvidenceStatus::Approved
        } else {
            EvidenceStatus::Invalid
        };
        let update = StatusUpdate {
            status,
            score,
            feedback,
            reviewed_on: Some(today),
        };

        if !self
            .store
            .set_evidence_status(user_id, week, kind, &update)
            .await?
        {
            bail!("no {kind} evidence submitted for week {week}");
        }

        info!(user_id, week, kind = %kind, status = %status, "evidence reviewed");
        Ok(status)
    }

    /// Week 1 is always open. Any later week needs every required evidence type of the
    /// previous week approved and a passed latest exam for it.
    pub async fn can_advance(&self, user_id: i64, target_week: i32) -> anyhow::Result<Decision> {
        let previous_week = target_week - 1;
        if previous_week < 1 {
            return Ok(Decision::allow("First week"));
        }

        let missing: Vec<&str> = self
            .week_status(user_id, previous_week)
            .await?
            .iter()
            .filter(|(_, state)| state.status != EvidenceStatus::Approved)
            .map(|(kind, _)| kind.as_str())
            .collect();

        if !missing.is_empty() {
            return Ok(Decision::deny(format!(
                "Missing approved evidence for week {previous_week}: {}",
                missing.join(", ")
            )));
        }

        let latest = self.store.latest_exam_result(user_id, previous_week).await?;
        if !latest.is_some_and(|result| result.passed) {
            return Ok(Decision::deny(format!(
                "You must pass the week {previous_week} exam"
            )));
        }

        Ok(Decision::allow("Ready to advance"))
    }
}

fn looks_like_default_page(body: &str) -> bool {
    let body = body.to_lowercase();
    DEFAULT_PAGE_SIGNATURES
        .iter()
        .any(|signature| body.contains(signature))
}
