use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use tracing::info;

use crate::error::{Result, SubdubError};

/// Next occurrence of a wall-clock time of day (`HH:MM:SS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: NaiveDateTime,
}

impl Deadline {
    pub fn parse(time: &str) -> Result<Self> {
        Self::parse_from(time, Local::now().naive_local())
    }

    /// A time already past today refers to tomorrow.
    pub fn parse_from(time: &str, now: NaiveDateTime) -> Result<Self> {
        let time_of_day = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S").map_err(|_| {
            SubdubError::Config(format!("Invalid time '{}'. Expected HH:MM:SS", time))
        })?;

        let mut at = now.date().and_time(time_of_day);
        if at < now {
            at += ChronoDuration::days(1);
        }
        Ok(Self { at })
    }

    pub fn at(&self) -> NaiveDateTime {
        self.at
    }

    pub fn has_passed(&self) -> bool {
        self.passed_at(Local::now().naive_local())
    }

    pub fn passed_at(&self, now: NaiveDateTime) -> bool {
        now > self.at
    }

    /// Sleep until the deadline is reached.
    pub async fn wait(&self) {
        let remaining = (self.at - Local::now().naive_local()).to_std().unwrap_or_default();
        if remaining.is_zero() {
            return;
        }

        info!("Waiting until {} ({}s)", self.at.format("%Y-%m-%d %H:%M:%S"), remaining.as_secs());
        tokio::time::sleep(remaining).await;
    }
}
