//! Reminder sweeps and the once-a-minute loop that triggers them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::{info, warn};

use crate::curriculum::Curriculum;
use crate::gate::AdvancementGate;
use crate::models::UserProgress;
use crate::notify::Notifier;
use crate::report;
use crate::store::ProgressStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    DailyReminder,
    Motivation,
    WeeklyCheck,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Job::DailyReminder => "daily-reminder",
            Job::Motivation => "motivation",
            Job::WeeklyCheck => "weekly-check",
        };
        f.write_str(name)
    }
}

/// Local times at which each job fires.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub daily_reminder: NaiveTime,
    pub motivation: NaiveTime,
    pub weekly_check: NaiveTime,
}

impl Schedule {
    fn jobs(&self) -> [(Job, NaiveTime); 3] {
        [
            (Job::DailyReminder, self.daily_reminder),
            (Job::Motivation, self.motivation),
            (Job::WeeklyCheck, self.weekly_check),
        ]
    }

    /// Jobs whose minute matches `now` and that have not fired on this date yet.
    /// Marks the returned jobs as fired.
    pub fn due(&self, now: NaiveDateTime, fired: &mut HashMap<Job, NaiveDate>) -> Vec<Job> {
        let today = now.date();
        let mut due = Vec::new();

        for (job, at) in self.jobs() {
            let same_minute = now.hour() == at.hour() && now.minute() == at.minute();
            if same_minute && fired.get(&job) != Some(&today) {
                fired.insert(job, today);
                due.push(job);
            }
        }

        due
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SweepSummary {
    pub sent: usize,
    pub failed: usize,
    pub reset: usize,
}

pub struct Scheduler {
    store: Arc<dyn ProgressStore>,
    gate: Arc<AdvancementGate>,
    curriculum: Arc<Curriculum>,
    notifier: Arc<dyn Notifier>,
    deadline_days: i64,
    send_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        gate: Arc<AdvancementGate>,
        curriculum: Arc<Curriculum>,
        notifier: Arc<dyn Notifier>,
        deadline_days: i64,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gate,
            curriculum,
            notifier,
            deadline_days,
            send_timeout,
        }
    }

    async fn deliver(&self, user_id: i64, text: &str) -> anyhow::Result<()> {
        match tokio::time::timeout(self.send_timeout, self.notifier.send(user_id, text)).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("send to {user_id} timed out"),
        }
    }

    async fn broadcast<F>(&self, job: Job, render: F) -> anyhow::Result<SweepSummary>
    where
        F: Fn(&UserProgress) -> String,
    {
        let users = self.store.active_users().await?;
        let mut summary = SweepSummary::default();

        for user in &users {
            match self.deliver(user.user_id, &render(user)).await {
                Ok(()) => summary.sent += 1,
                Err(err) => {
                    warn!(user_id = user.user_id, %job, error = %err, "send failed");
                    summary.failed += 1;
                }
            }
        }

        info!(%job, sent = summary.sent, failed = summary.failed, "sweep finished");
        Ok(summary)
    }

    pub async fn send_daily_reminders(&self, today: NaiveDate) -> anyhow::Result<SweepSummary> {
        let total_weeks = self.curriculum.total_weeks;
        self.broadcast(Job::DailyReminder, |user| {
            report::daily_reminder(user, total_weeks, today)
        })
        .await
    }

    pub async fn send_motivation(&self, today: NaiveDate) -> anyhow::Result<SweepSummary> {
        let phrase = self.curriculum.phrase_for(today);
        self.broadcast(Job::Motivation, |user| report::motivation_message(user, phrase))
            .await
    }

    /// Moves stalled learners back one week and tells them why.
    pub async fn weekly_check(&self, today: NaiveDate) -> anyhow::Result<SweepSummary> {
        let users = self.store.active_users().await?;
        let mut summary = SweepSummary::default();

        for user in &users {
            let reset = match self
                .gate
                .reset_if_stalled(user, today, self.deadline_days)
                .await
            {
                Ok(reset) => reset,
                Err(err) => {
                    warn!(user_id = user.user_id, error = %err, "weekly check failed");
                    summary.failed += 1;
                    continue;
                }
            };

            let Some(previous) = reset else {
                continue;
            };
            summary.reset += 1;

            let notice = report::reset_notice(user.current_week, previous);
            match self.deliver(user.user_id, &notice).await {
                Ok(()) => summary.sent += 1,
                Err(err) => {
                    warn!(user_id = user.user_id, error = %err, "reset notice not delivered");
                    summary.failed += 1;
                }
            }
        }

        info!(
            job = %Job::WeeklyCheck,
            reset = summary.reset,
            failed = summary.failed,
            "sweep finished"
        );
        Ok(summary)
    }

    pub async fn run_job(&self, job: Job, today: NaiveDate) -> anyhow::Result<SweepSummary> {
        match job {
            Job::DailyReminder => self.send_daily_reminders(today).await,
            Job::Motivation => self.send_motivation(today).await,
            Job::WeeklyCheck => self.weekly_check(today).await,
        }
    }

    /// Runs until the process is stopped.
    pub async fn run(&self, schedule: Schedule) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        let mut fired = HashMap::new();

        info!(?schedule, "scheduler started");
        loop {
            interval.tick().await;
            let now = Local::now().naive_local();

            for job in schedule.due(now, &mut fired) {
                if let Err(err) = self.run_job(job, now.date()).await {
                    warn!(%job, error = %err, "sweep aborted");
                }
            }
        }
    }
}
