//! The recurring-job scheduler.
//!
//! A background thread that turns wall-clock time into queue messages.
//! It holds no state beyond "when did each entry last fire" and performs
//! no business logic. We assume any process can die at any time; a
//! missed tick is simply picked up at the next occurrence, and a second
//! scheduler racing this one just enqueues a duplicate job, which the
//! handlers already tolerate.

use std::{panic::catch_unwind, process, thread, time::Duration as StdDuration};

use chrono::{NaiveDateTime, NaiveTime, Timelike, Utc};
use dealforge_common::{
    db,
    prelude::*,
    queue::{enqueue_job, queues, EnqueueOptions},
};

/// How a recurring job repeats.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cadence {
    /// Once an hour, at the given minute.
    Hourly {
        /// Minute of the hour, 0..60.
        minute: u32,
    },
    /// Once a day, at the given UTC time.
    Daily {
        /// Hour of the day, 0..24.
        hour: u32,
        /// Minute of the hour, 0..60.
        minute: u32,
    },
}

impl Cadence {
    /// The first occurrence strictly after `t`.
    pub fn next_after(self, t: NaiveDateTime) -> NaiveDateTime {
        match self {
            Cadence::Hourly { minute } => {
                let at = t
                    .with_minute(minute)
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))
                    .unwrap_or(t);
                if at > t {
                    at
                } else {
                    at + chrono::Duration::hours(1)
                }
            }
            Cadence::Daily { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0)
                    .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).expect("midnight"));
                let at = t.date().and_time(time);
                if at > t {
                    at
                } else {
                    at + chrono::Duration::days(1)
                }
            }
        }
    }
}

/// One recurring job.
pub struct ScheduleEntry {
    /// Name, for logging.
    pub name: &'static str,
    /// Queue to enqueue on.
    pub queue: &'static str,
    /// Job name to enqueue.
    pub job_name: &'static str,
    /// Payload to enqueue.
    pub payload: serde_json::Value,
    /// When the job repeats.
    pub cadence: Cadence,
}

/// The fixed schedule this deployment runs.
fn default_schedule() -> Vec<ScheduleEntry> {
    vec![
        // Nightly catalog refresh, after the US-evening ingestion rush.
        ScheduleEntry {
            name: "nightly-recommendation-refresh",
            queue: queues::RECOMMENDATION_REFRESH,
            job_name: "refresh-recommendations",
            payload: serde_json::json!({ "reason": "nightly" }),
            cadence: Cadence::Daily { hour: 9, minute: 0 },
        },
        // Hourly rewards accrual sweep.
        ScheduleEntry {
            name: "hourly-rewards-accrual",
            queue: queues::REWARDS,
            job_name: "accrue-rewards",
            payload: serde_json::json!({ "reason": "hourly" }),
            cadence: Cadence::Hourly { minute: 15 },
        },
    ]
}

/// Spawn the scheduler thread. Runs indefinitely.
pub fn start_scheduler() -> Result<thread::JoinHandle<()>> {
    let builder = thread::Builder::new().name("scheduler".to_owned());
    builder
        .spawn(run_scheduler_wrapper)
        .context("could not create scheduler thread")
}

/// Run the scheduler, and abort the process if it panics. A silently
/// dead scheduler means recurring jobs just stop, which is far worse
/// than a noisy restart.
fn run_scheduler_wrapper() {
    if let Err(err) = catch_unwind(run_scheduler) {
        let msg = if let Some(msg) = err.downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = err.downcast_ref::<String>() {
            msg.as_str()
        } else {
            "an unknown panic occurred"
        };
        error!("SCHEDULER PANIC, aborting: {}", msg);
        eprintln!("SCHEDULER PANIC, aborting: {}", msg);
        process::abort();
    }
}

fn run_scheduler() {
    let entries = default_schedule();
    let mut next_fire: Vec<NaiveDateTime> = {
        let now = Utc::now().naive_utc();
        entries.iter().map(|e| e.cadence.next_after(now)).collect()
    };

    loop {
        let now = Utc::now().naive_utc();
        for (entry, fire_at) in entries.iter().zip(next_fire.iter_mut()) {
            if now >= *fire_at {
                // Retry on the next tick if the database is away; the
                // occurrence is only consumed once the enqueue lands.
                match enqueue_entry(entry) {
                    Ok(()) => *fire_at = entry.cadence.next_after(now),
                    Err(err) => {
                        error!(entry = entry.name, "could not enqueue (will retry): {:#}", err);
                    }
                }
            }
        }
        thread::sleep(StdDuration::from_secs(30));
    }
}

fn enqueue_entry(entry: &ScheduleEntry) -> Result<()> {
    let mut conn = db::connect()?;
    let job = enqueue_job(
        entry.queue,
        entry.job_name,
        entry.payload.clone(),
        EnqueueOptions::default(),
        &mut conn,
    )?;
    info!(entry = entry.name, job = %job.id, "scheduled job enqueued");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 29)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .expect("bad test date")
    }

    #[test]
    fn hourly_fires_at_the_minute_or_next_hour() {
        let cadence = Cadence::Hourly { minute: 15 };
        assert_eq!(cadence.next_after(at(10, 0, 0)), at(10, 15, 0));
        assert_eq!(cadence.next_after(at(10, 15, 0)), at(11, 15, 0));
        assert_eq!(cadence.next_after(at(10, 20, 0)), at(11, 15, 0));
    }

    #[test]
    fn daily_fires_today_or_tomorrow() {
        let cadence = Cadence::Daily { hour: 9, minute: 0 };
        assert_eq!(cadence.next_after(at(3, 0, 0)), at(9, 0, 0));
        assert_eq!(cadence.next_after(at(9, 0, 0)), at(9, 0, 0) + chrono::Duration::days(1));
        assert_eq!(cadence.next_after(at(23, 59, 59)), at(9, 0, 0) + chrono::Duration::days(1));
    }

    #[test]
    fn occurrences_are_strictly_increasing() {
        let cadence = Cadence::Hourly { minute: 0 };
        let mut t = at(0, 30, 0);
        for _ in 0..24 {
            let next = cadence.next_after(t);
            assert!(next > t);
            t = next;
        }
    }
}
