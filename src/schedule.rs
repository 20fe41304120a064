// Wall-clock alignment for scheduled evaluations

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// When evaluations fire: `offset_secs` after every `interval_minutes`
/// boundary of the UTC day
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_minutes: u32,
    pub offset_secs: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        // XX:00:05, XX:15:05, XX:30:05, XX:45:05 for 15-minute bars
        Self {
            interval_minutes: 15,
            offset_secs: 5,
        }
    }
}

impl ScheduleConfig {
    pub fn period(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_minutes == 0 {
            anyhow::bail!("schedule.interval_minutes must be positive");
        }
        if i64::from(self.offset_secs) >= self.period().num_seconds() {
            anyhow::bail!(
                "schedule.offset_secs ({}) must be shorter than the interval ({} min)",
                self.offset_secs,
                self.interval_minutes
            );
        }
        Ok(())
    }

    /// First scheduled time at or after `now`
    pub fn next_run(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let period = self.period().num_seconds().max(1);
        let offset = i64::from(self.offset_secs);

        let secs = now.timestamp();
        let phase = (secs - offset).rem_euclid(period);
        let on_mark = phase == 0 && now.timestamp_subsec_nanos() == 0;
        if on_mark {
            return now;
        }

        let next_secs = secs - phase + period;
        DateTime::from_timestamp(next_secs, 0).unwrap_or(now)
    }

    /// Delay from `now` until the next scheduled time
    pub fn delay_until_next(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_run(now) - now).to_std().unwrap_or_default()
    }
}
