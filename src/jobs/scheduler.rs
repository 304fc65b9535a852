//! Time-based triggers for the mail jobs.
//!
//! The last run of each job is kept in the `job_runs` table. On startup a job
//! whose slot passed while the process was down runs once to catch up, and a
//! slot is claimed with a conditional upsert so it fires at most once even if
//! several instances share the database.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Timelike, Utc};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use super::{Job, JobError, JobQueue};
use crate::config::ScheduleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Daily { hour: u32, minute: u32 },
    /// Months without `day` (e.g. the 31st) are skipped.
    Monthly { day: u32, hour: u32, minute: u32 },
}

impl Schedule {
    /// First trigger strictly after `after`, evaluated in local time `offset`.
    /// `None` if the schedule can never fire.
    pub fn next_after(&self, after: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&offset);

        let at = |date: NaiveDate, hour: u32, minute: u32| {
            date.and_hms_opt(hour, minute, 0)
                .and_then(|naive| offset.from_local_datetime(&naive).single())
        };

        match *self {
            Schedule::Daily { hour, minute } => {
                let mut date = local.date_naive();
                for _ in 0..2 {
                    let candidate = at(date, hour, minute)?;
                    if candidate > local {
                        return Some(candidate.with_timezone(&Utc));
                    }
                    date = date.succ_opt()?;
                }
                None
            }
            Schedule::Monthly { day, hour, minute } => {
                let (mut year, mut month) = (local.year(), local.month());
                for _ in 0..13 {
                    if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                        let candidate = at(date, hour, minute)?;
                        if candidate > local {
                            return Some(candidate.with_timezone(&Utc));
                        }
                    }
                    if month == 12 {
                        year += 1;
                        month = 1;
                    } else {
                        month += 1;
                    }
                }
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduledJob {
    pub job: Job,
    pub schedule: Schedule,
}

pub struct Scheduler {
    pool: SqlitePool,
    queue: JobQueue,
    offset: FixedOffset,
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new(pool: SqlitePool, queue: JobQueue, offset: FixedOffset, jobs: Vec<ScheduledJob>) -> Self {
        Self {
            pool,
            queue,
            offset,
            jobs,
        }
    }

    /// Daily reminder and monthly report, at the configured times.
    pub fn from_config(pool: SqlitePool, queue: JobQueue, config: &ScheduleConfig) -> Self {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "Invalid scheduler UTC offset {} minutes, using UTC",
                config.utc_offset_minutes
            );
            Utc.fix()
        });

        let jobs = vec![
            ScheduledJob {
                job: Job::DailyReminder,
                schedule: Schedule::Daily {
                    hour: config.reminder_hour,
                    minute: config.reminder_minute,
                },
            },
            ScheduledJob {
                job: Job::MonthlyReport,
                schedule: Schedule::Monthly {
                    day: config.report_day,
                    hour: config.report_hour,
                    minute: config.report_minute,
                },
            },
        ];

        Self::new(pool, queue, offset, jobs)
    }

    pub async fn run(self) {
        info!(offset = %self.offset, "Scheduler started");

        let now = Utc::now();
        for scheduled in &self.jobs {
            if let Err(e) = self.catch_up(scheduled, now).await {
                error!(job = scheduled.job.name(), error = %e, "catch-up failed");
            }
        }

        let mut cursor = now;
        loop {
            let upcoming: Vec<(DateTime<Utc>, &ScheduledJob)> = self
                .jobs
                .iter()
                .filter_map(|s| s.schedule.next_after(cursor, self.offset).map(|at| (at, s)))
                .collect();

            let Some(next) = upcoming.iter().map(|(at, _)| *at).min() else {
                warn!("No schedulable jobs, scheduler stopping");
                return;
            };

            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            for (at, scheduled) in upcoming.iter().filter(|(at, _)| *at == next) {
                if let Err(e) = self.fire(scheduled, *at).await {
                    error!(job = scheduled.job.name(), error = %e, "scheduled run failed");
                }
            }
            cursor = next;
        }
    }

    /// Runs a job once if a slot passed since its last recorded run.
    /// A job with no history only gets a baseline row.
    pub async fn catch_up(&self, scheduled: &ScheduledJob, now: DateTime<Utc>) -> Result<bool, JobError> {
        let name = scheduled.job.name();
        let now = now.with_nanosecond(0).unwrap_or(now);

        match last_run(&self.pool, name).await? {
            None => {
                claim(&self.pool, name, now).await?;
                Ok(false)
            }
            Some(last) => match scheduled.schedule.next_after(last, self.offset) {
                Some(missed) if missed <= now => {
                    info!(job = name, %missed, "running missed job");
                    self.fire(scheduled, now).await
                }
                _ => Ok(false),
            },
        }
    }

    /// Claims the slot at `at` and enqueues the job. Returns false if the slot
    /// was already claimed.
    async fn fire(&self, scheduled: &ScheduledJob, at: DateTime<Utc>) -> Result<bool, JobError> {
        let name = scheduled.job.name();
        if !claim(&self.pool, name, at).await? {
            info!(job = name, %at, "slot already run, skipping");
            return Ok(false);
        }
        self.queue.enqueue(scheduled.job)?;
        Ok(true)
    }
}

pub async fn last_run(pool: &SqlitePool, job_name: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar("SELECT last_run_at FROM job_runs WHERE job_name = ?")
        .bind(job_name)
        .fetch_optional(pool)
        .await
}

/// Records `at` as the job's last run unless a run at or after `at` is
/// already recorded.
async fn claim(pool: &SqlitePool, job_name: &str, at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO job_runs (job_name, last_run_at) VALUES (?, ?)
        ON CONFLICT(job_name) DO UPDATE SET last_run_at = excluded.last_run_at
        WHERE job_runs.last_run_at < excluded.last_run_at
        "#,
    )
    .bind(job_name)
    .bind(at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_later_today() {
        // 02:00 UTC is 07:30 IST; 09:00 IST is 03:30 UTC.
        let next = Schedule::Daily { hour: 9, minute: 0 }.next_after(utc(2025, 3, 10, 2, 0), ist());
        assert_eq!(next, Some(utc(2025, 3, 10, 3, 30)));
    }

    #[test]
    fn daily_rolls_to_tomorrow_at_exact_slot() {
        let schedule = Schedule::Daily { hour: 9, minute: 0 };
        let next = schedule.next_after(utc(2025, 3, 10, 3, 30), ist());
        assert_eq!(next, Some(utc(2025, 3, 11, 3, 30)));
    }

    #[test]
    fn monthly_next_month_and_year_wrap() {
        let schedule = Schedule::Monthly { day: 1, hour: 10, minute: 0 };
        assert_eq!(
            schedule.next_after(utc(2025, 12, 5, 0, 0), ist()),
            Some(utc(2026, 1, 1, 4, 30))
        );
    }

    #[test]
    fn monthly_skips_short_months() {
        let schedule = Schedule::Monthly { day: 31, hour: 0, minute: 0 };
        let next = schedule
            .next_after(utc(2025, 4, 1, 0, 0), FixedOffset::east_opt(0).unwrap())
            .unwrap();
        assert_eq!(next, utc(2025, 5, 31, 0, 0));
    }

    #[test]
    fn invalid_times_never_fire() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert_eq!(Schedule::Daily { hour: 24, minute: 0 }.next_after(utc(2025, 1, 1, 0, 0), offset), None);
        assert_eq!(
            Schedule::Monthly { day: 32, hour: 1, minute: 0 }.next_after(utc(2025, 1, 1, 0, 0), offset),
            None
        );
    }
}
