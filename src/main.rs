use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Local;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod config;
mod curriculum;
mod db;
mod error;
mod evidence;
mod exam;
mod gate;
mod http;
mod models;
mod notify;
mod report;
mod scheduler;
mod stats;
mod store;

use crate::config::Settings;
use crate::curriculum::Curriculum;
use crate::db::PgStore;
use crate::evidence::EvidenceValidator;
use crate::exam::ExamEngine;
use crate::gate::AdvancementGate;
use crate::http::HttpLinkChecker;
use crate::models::{EvidenceKind, UserProgress};
use crate::notify::{ConsoleNotifier, Notifier, TelegramNotifier};
use crate::scheduler::{Job, Scheduler};
use crate::store::{unknown_user, ProgressStore};

#[derive(Parser)]
#[command(name = "study-mentor")]
#[command(about = "Week-by-week study mentor with evidence-gated advancement", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Learner the command acts for
    #[arg(long, global = true)]
    user: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Enrol a demo learner with some history
    Seed,
    /// Enrol the learner and show the welcome message
    Start {
        #[arg(long)]
        username: String,
    },
    /// Show this week's curriculum
    Week,
    /// Show level, points, pace and badges
    Progress,
    /// Show this week's objectives and points target
    Objectives,
    /// Preview the week after this one
    Next,
    /// Log study hours for today
    Study { hours: f64 },
    /// Record a completed project or mastered concept
    Complete {
        #[arg(value_enum)]
        what: Completion,
    },
    /// List recent study sessions
    History {
        #[arg(long, default_value_t = 7)]
        days: usize,
    },
    /// Submit evidence for the current week
    Evidence { kind: EvidenceKind, content: String },
    /// Approve or reject submitted evidence
    #[command(group(
        ArgGroup::new("decision")
            .args(["approve", "reject"])
            .required(true)
    ))]
    Review {
        kind: EvidenceKind,
        #[arg(long)]
        week: Option<i32>,
        #[arg(long)]
        approve: bool,
        #[arg(long)]
        reject: bool,
        #[arg(long)]
        score: Option<f64>,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Take the weekly exam
    Exam {
        #[command(subcommand)]
        action: ExamAction,
    },
    /// Evidence and exam status for a week
    Status {
        #[arg(long)]
        week: Option<i32>,
    },
    /// Move to the next week when its requirements are met
    Advance,
    /// Place the learner in a given week, bypassing the gate
    SetWeek { week: i32 },
    /// Phrase of the day
    Motivation,
    /// Generate a markdown progress report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Run one reminder sweep now
    Remind {
        #[arg(value_enum)]
        job: RemindJob,
    },
    /// Run the reminder scheduler until stopped
    Schedule,
}

#[derive(Subcommand)]
enum ExamAction {
    /// Show the questions and the attempt number
    Start {
        #[arg(long)]
        week: Option<i32>,
    },
    /// Check a single answer
    Answer {
        index: usize,
        answer: String,
        #[arg(long)]
        week: Option<i32>,
    },
    /// Grade a full attempt given as INDEX=ANSWER pairs
    Submit {
        #[arg(long = "answer", required = true)]
        answers: Vec<String>,
        #[arg(long)]
        week: Option<i32>,
    },
    /// Show every attempt for a week
    Result {
        #[arg(long)]
        week: Option<i32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Completion {
    Project,
    Concept,
}

#[derive(Clone, Copy, ValueEnum)]
enum RemindJob {
    Daily,
    Motivation,
    WeeklyCheck,
}

impl From<RemindJob> for Job {
    fn from(job: RemindJob) -> Self {
        match job {
            RemindJob::Daily => Job::DailyReminder,
            RemindJob::Motivation => Job::Motivation,
            RemindJob::WeeklyCheck => Job::WeeklyCheck,
        }
    }
}

fn require_user(user: Option<i64>) -> anyhow::Result<i64> {
    user.context("this command needs --user <id>")
}

async fn learner(store: &dyn ProgressStore, user: Option<i64>) -> anyhow::Result<UserProgress> {
    let user_id = require_user(user)?;
    store
        .user(user_id)
        .await?
        .ok_or_else(|| unknown_user(user_id))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = cli.settings;
    let curriculum = Arc::new(
        Curriculum::load(settings.curriculum.as_deref()).context("failed to load curriculum")?,
    );

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    if let Commands::InitDb = cli.command {
        db::init_db(&pool).await?;
        println!("Schema ready.");
        return Ok(());
    }

    let pg = Arc::new(PgStore::new(pool));
    let store: Arc<dyn ProgressStore> = pg.clone();
    let links = Arc::new(HttpLinkChecker::new(settings.http_timeout())?);
    let validator = Arc::new(EvidenceValidator::new(
        store.clone(),
        links,
        curriculum.clone(),
        &settings.repo_api,
    )?);
    let exams = ExamEngine::new(
        store.clone(),
        curriculum.clone(),
        settings.exam_threshold,
        settings.max_attempts,
    );
    let gate = Arc::new(AdvancementGate::new(
        store.clone(),
        validator.clone(),
        curriculum.total_weeks,
    ));
    let today = Local::now().date_naive();

    match cli.command {
        Commands::InitDb => {}
        Commands::Seed => {
            let user_id = db::seed(&pg, today).await?;
            println!("Seed data inserted for learner {user_id}.");
        }
        Commands::Start { username } => {
            let user_id = require_user(cli.user)?;
            let user = store.ensure_user(user_id, &username, today).await?;
            println!("{}", report::welcome(&user, &curriculum));
        }
        Commands::Week => {
            let user = learner(store.as_ref(), cli.user).await?;
            let scheduled =
                gate::scheduled_week(user.start_date, today, curriculum.total_weeks);
            println!("{}", report::week_message(&curriculum, &user, scheduled));
        }
        Commands::Progress => {
            let user = learner(store.as_ref(), cli.user).await?;
            println!("{}", report::progress_message(&user, &curriculum, today));
        }
        Commands::Objectives => {
            let user = learner(store.as_ref(), cli.user).await?;
            println!("{}", report::objectives_message(&user, &curriculum));
        }
        Commands::Next => {
            let user = learner(store.as_ref(), cli.user).await?;
            println!("{}", report::next_week_message(&user, &curriculum));
        }
        Commands::Study { hours } => {
            if !hours.is_finite() || hours <= 0.0 {
                bail!("hours must be a positive number");
            }
            let user_id = learner(store.as_ref(), cli.user).await?.user_id;
            let user = store.record_study(user_id, hours, today).await?;
            println!("{}", report::study_logged(hours, &user, today));
        }
        Commands::Complete { what } => {
            let user_id = learner(store.as_ref(), cli.user).await?.user_id;
            let message = match what {
                Completion::Project => {
                    let user = store.record_project(user_id).await?;
                    report::project_completed(&user, &curriculum)
                }
                Completion::Concept => {
                    let user = store.record_concept(user_id).await?;
                    report::concept_completed(&user, &curriculum)
                }
            };
            println!("{message}");
        }
        Commands::History { days } => {
            let user = learner(store.as_ref(), cli.user).await?;
            let logs = store.study_history(user.user_id, days).await?;
            println!("{}", report::history_message(&logs));
        }
        Commands::Evidence { kind, content } => {
            let user = learner(store.as_ref(), cli.user).await?;
            let outcome = validator
                .submit(user.user_id, user.current_week, kind, &content, today)
                .await?;
            println!(
                "{}",
                report::evidence_outcome(kind, user.current_week, &outcome, &curriculum)
            );
        }
        Commands::Review {
            kind,
            week,
            approve,
            reject: _,
            score,
            feedback,
        } => {
            let user = learner(store.as_ref(), cli.user).await?;
            let week = week.unwrap_or(user.current_week);
            let status = validator
                .review(user.user_id, week, kind, approve, score, feedback, today)
                .await?;
            println!("{kind} for week {week} marked {status}.");
        }
        Commands::Exam { action } => {
            let user = learner(store.as_ref(), cli.user).await?;
            match action {
                ExamAction::Start { week } => {
                    let week = week.unwrap_or(user.current_week);
                    let start = exams.start(user.user_id, week).await?;
                    println!("{}", report::exam_intro(week, &start));
                }
                ExamAction::Answer {
                    index,
                    answer,
                    week,
                } => {
                    let week = week.unwrap_or(user.current_week);
                    let feedback = exams.check_answer(week, index, &answer)?;
                    println!("{}", report::answer_feedback(&feedback));
                }
                ExamAction::Submit { answers, week } => {
                    let week = week.unwrap_or(user.current_week);
                    let answers = exam::parse_answers(&answers)?;
                    let (result, score) = exams.submit(user.user_id, week, answers, today).await?;
                    println!(
                        "{}",
                        report::exam_result(week, &result, &score, exams.threshold())
                    );
                }
                ExamAction::Result { week } => {
                    let week = week.unwrap_or(user.current_week);
                    let attempts = exams.attempts(user.user_id, week).await?;
                    if attempts.is_empty() {
                        println!("No attempts recorded for week {week}.");
                    }
                    for attempt in &attempts {
                        println!(
                            "- attempt #{} on {}: {}",
                            attempt.attempt_number,
                            attempt.taken_on,
                            report::latest_result_line(Some(attempt))
                        );
                    }
                }
            }
        }
        Commands::Status { week } => {
            let user = learner(store.as_ref(), cli.user).await?;
            let week = week.unwrap_or(user.current_week);
            let evidence = validator.week_status(user.user_id, week).await?;
            let latest = exams.latest_result(user.user_id, week).await?;
            let decision = gate.can_advance(user.user_id, week + 1).await?;
            println!(
                "{}",
                report::validation_status(week, &evidence, latest.as_ref(), &decision)
            );
        }
        Commands::Advance => {
            let user = learner(store.as_ref(), cli.user).await?;
            let outcome = gate.advance(user.user_id, today).await?;
            println!("{}", report::advance_message(&outcome, &curriculum));
        }
        Commands::SetWeek { week } => {
            if week < 1 || week > curriculum.total_weeks {
                bail!("week must be between 1 and {}", curriculum.total_weeks);
            }
            let user = learner(store.as_ref(), cli.user).await?;
            store.set_week(user.user_id, week, today).await?;
            println!("Learner {} placed in week {week}.", user.user_id);
        }
        Commands::Motivation => {
            let user = learner(store.as_ref(), cli.user).await?;
            let phrase = curriculum.phrase_for(today);
            println!("{}", report::motivation_message(&user, phrase));
        }
        Commands::Report { out } => {
            let user = learner(store.as_ref(), cli.user).await?;
            let evidence = validator
                .week_status(user.user_id, user.current_week)
                .await?;
            let latest = exams
                .latest_result(user.user_id, user.current_week)
                .await?;
            let history = store.study_history(user.user_id, 14).await?;
            let report = report::build_report(
                &user,
                &curriculum,
                &evidence,
                latest.as_ref(),
                &history,
                today,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Remind { job } => {
            let scheduler = build_scheduler(&settings, store, gate, curriculum)?;
            let summary = scheduler.run_job(job.into(), today).await?;
            println!(
                "Sent {}, failed {}, reset {}.",
                summary.sent, summary.failed, summary.reset
            );
        }
        Commands::Schedule => {
            let scheduler = build_scheduler(&settings, store, gate, curriculum)?;
            scheduler.run(settings.schedule()).await?;
        }
    }

    Ok(())
}

fn build_scheduler(
    settings: &Settings,
    store: Arc<dyn ProgressStore>,
    gate: Arc<AdvancementGate>,
    curriculum: Arc<Curriculum>,
) -> anyhow::Result<Scheduler> {
    let notifier: Arc<dyn Notifier> = match &settings.telegram_bot_token {
        Some(token) => Arc::new(TelegramNotifier::new(token, settings.http_timeout())?),
        None => Arc::new(ConsoleNotifier),
    };

    Ok(Scheduler::new(
        store,
        gate,
        curriculum,
        notifier,
        settings.deadline_days,
        settings.http_timeout(),
    ))
}
