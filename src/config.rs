use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use clap::Args;

use crate::scheduler::Schedule;

/// Settings shared by every subcommand; each one can come from the environment.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Bot token for outbound reminders; messages go to stdout without it
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Curriculum TOML file replacing the built-in program
    #[arg(long, env = "MENTOR_CURRICULUM")]
    pub curriculum: Option<PathBuf>,

    #[arg(long, env = "MENTOR_EXAM_THRESHOLD", default_value_t = 0.70)]
    pub exam_threshold: f64,

    #[arg(long, env = "MENTOR_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: i32,

    #[arg(long, env = "MENTOR_HTTP_TIMEOUT_SECS", default_value_t = 10)]
    pub http_timeout_secs: u64,

    /// Base URL of the repository metadata API
    #[arg(long, env = "MENTOR_REPO_API", default_value = "https://api.github.com")]
    pub repo_api: String,

    /// Days a week may stay unfinished before the weekly check moves the learner back
    #[arg(long, env = "MENTOR_DEADLINE_DAYS", default_value_t = 7)]
    pub deadline_days: i64,

    #[arg(long, env = "MENTOR_DAILY_REMINDER", default_value = "09:00", value_parser = parse_clock)]
    pub daily_reminder: NaiveTime,

    #[arg(long, env = "MENTOR_MOTIVATION_REMINDER", default_value = "20:00", value_parser = parse_clock)]
    pub motivation_reminder: NaiveTime,

    #[arg(long, env = "MENTOR_WEEKLY_CHECK", default_value = "23:59", value_parser = parse_clock)]
    pub weekly_check: NaiveTime,
}

impl Settings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            daily_reminder: self.daily_reminder,
            motivation: self.motivation_reminder,
            weekly_check: self.weekly_check,
        }
    }
}

fn parse_clock(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|err| format!("expected HH:MM, got `{raw}`: {err}"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn clock_values_parse() {
        assert_eq!(
            parse_clock("09:00").unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert_eq!(
            parse_clock(" 23:59 ").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
        assert!(parse_clock("25:00").is_err());
        assert!(parse_clock("nine").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let harness = Harness::try_parse_from([
            "study-mentor",
            "--database-url",
            "postgres://localhost/mentor",
            "--exam-threshold",
            "0.8",
            "--daily-reminder",
            "07:30",
        ])
        .unwrap();
        let settings = harness.settings;

        assert_eq!(settings.database_url, "postgres://localhost/mentor");
        assert!((settings.exam_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(
            settings.schedule().daily_reminder,
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
        assert_eq!(settings.http_timeout(), Duration::from_secs(10));
    }
}
