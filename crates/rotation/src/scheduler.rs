//! Cron-driven scheduler loop.
//!
//! Computes the next trigger strictly after "now", sleeps until then, runs
//! the rotator once, and repeats. A run that overruns its next trigger is
//! not caught up: the following trigger is always computed from the time
//! the run finished.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use tracing::info;

use crate::error::SchedulerError;
use crate::orchestrator::Rotator;

/// Weekday names indexed by standard cron number (0 and 7 are both Sunday).
const DOW_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// A parsed cron schedule together with its source expression.
#[derive(Debug, Clone)]
pub struct RotationSchedule {
    expr: String,
    schedules: Vec<Schedule>,
}

impl RotationSchedule {
    pub fn parse(expr: &str) -> Result<Self, SchedulerError> {
        let schedules = parse_cron(expr).map_err(|source| SchedulerError::InvalidCron {
            expr: expr.to_string(),
            source,
        })?;
        Ok(Self {
            expr: expr.to_string(),
            schedules,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        next_run_after(&self.schedules, now)
    }
}

/// Parse a cron expression, auto-prepending "0 " for 5-field expressions.
///
/// The `cron` crate requires 6 fields (sec min hr dom mon dow), numbers
/// weekdays 1-7 from Sunday and requires day-of-month AND day-of-week to
/// match. Standard 5-field cron (min hr dom mon dow, 0-7 from Sunday) fires
/// when EITHER day field matches if both are restricted, so such an
/// expression becomes two schedules. 6/7-field input is passed through
/// unchanged as a single schedule.
pub fn parse_cron(expr: &str) -> Result<Vec<Schedule>, cron::error::Error> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() != 5 {
        return Ok(vec![Schedule::from_str(expr)?]);
    }

    let (minute, hour, dom, month) = (parts[0], parts[1], parts[2], parts[3]);
    let dow = standard_day_of_week(parts[4]);
    let six_field = |dom: &str, dow: &str| format!("0 {minute} {hour} {dom} {month} {dow}");

    if is_unrestricted(dom) || is_unrestricted(parts[4]) {
        Ok(vec![Schedule::from_str(&six_field(dom, &dow))?])
    } else {
        Ok(vec![
            Schedule::from_str(&six_field(dom, "*"))?,
            Schedule::from_str(&six_field("*", &dow))?,
        ])
    }
}

/// Earliest trigger of any schedule strictly after `now`, in `now`'s time zone.
pub fn next_run_after<Tz: TimeZone>(
    schedules: &[Schedule],
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    schedules
        .iter()
        .filter_map(|schedule| schedule.after(now).next())
        .min()
}

fn is_unrestricted(field: &str) -> bool {
    matches!(field, "*" | "?")
}

/// Rewrite numeric weekdays of a standard cron field as names, which the
/// `cron` crate reads unambiguously. Numeric ranges are expanded to name
/// lists, since `5-7` would otherwise become the backwards range `FRI-SUN`.
fn standard_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(standard_day_of_week_item)
        .collect::<Vec<_>>()
        .join(",")
}

fn standard_day_of_week_item(item: &str) -> String {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (item, None),
    };

    let bounds = range
        .split_once('-')
        .and_then(|(start, end)| start.parse::<usize>().ok().zip(end.parse::<usize>().ok()))
        .filter(|(start, end)| start <= end && *end < DOW_NAMES.len());

    if let Some((start, end)) = bounds {
        let step = match step.map(str::parse::<usize>) {
            None => 1,
            Some(Ok(n)) if n > 0 => n,
            Some(_) => return item.to_string(),
        };
        let mut names: Vec<&str> = Vec::new();
        for n in (start..=end).step_by(step) {
            if !names.contains(&DOW_NAMES[n]) {
                names.push(DOW_NAMES[n]);
            }
        }
        return names.join(",");
    }

    let name = match range.parse::<usize>() {
        Ok(n) if n < DOW_NAMES.len() => DOW_NAMES[n].to_string(),
        _ => range.to_string(),
    };
    match step {
        Some(step) => format!("{name}/{step}"),
        None => name,
    }
}

/// Run the rotator on `schedule` until the process is terminated.
///
/// Only returns if the schedule has no future trigger left.
pub async fn run_scheduler(
    schedule: &RotationSchedule,
    rotator: &Rotator,
) -> Result<(), SchedulerError> {
    info!(cron = schedule.expr(), "snapshot scheduler started");

    loop {
        let now = Local::now();
        let next_run = schedule
            .next_after(&now)
            .ok_or_else(|| SchedulerError::Exhausted(schedule.expr().to_string()))?;

        info!(
            "Next snapshot scheduled at {}",
            next_run.format("%Y-%m-%d %H:%M:%S")
        );

        let wait = (next_run - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        rotator.run().await;
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use autosnap_compute::{AuthenticatedClient, ComputeError};
    use autosnap_core::{Instance, Snapshot};
    use autosnap_notify::Dispatcher;
    use chrono::Utc;

    /// Provider with no instances that counts how often it was polled.
    #[derive(Default)]
    struct EmptyFleet {
        polls: AtomicUsize,
    }

    #[async_trait]
    impl AuthenticatedClient for EmptyFleet {
        async fn list_instances(&self) -> Result<Vec<Instance>, ComputeError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
        async fn list_snapshots(&self, _: &str) -> Result<Vec<Snapshot>, ComputeError> {
            Ok(Vec::new())
        }
        async fn create_snapshot(
            &self,
            _: &str,
            _: Option<&str>,
            _: &str,
        ) -> Result<Snapshot, ComputeError> {
            Err(ComputeError::Parse("not used".into()))
        }
        async fn delete_snapshot(&self, _: &str, _: &str) -> Result<(), ComputeError> {
            Ok(())
        }
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn next(expr: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        let schedules = parse_cron(expr).unwrap();
        next_run_after(&schedules, &now).unwrap()
    }

    #[test]
    fn test_parse_cron_six_field() {
        let schedules = parse_cron("0 */5 * * * *").unwrap();
        assert_eq!(schedules.len(), 1);
        let next = schedules[0].upcoming(Utc).next();
        assert!(next.is_some(), "should compute a next fire time");
    }

    #[test]
    fn test_parse_cron_invalid() {
        assert!(parse_cron("not a cron").is_err());
        assert!(matches!(
            RotationSchedule::parse("61 * * * *"),
            Err(SchedulerError::InvalidCron { .. })
        ));
    }

    #[test]
    fn daily_trigger_later_today() {
        assert_eq!(next("0 3 * * *", at(2024, 1, 1, 2, 59, 59)), at(2024, 1, 1, 3, 0, 0));
    }

    #[test]
    fn trigger_is_strictly_after_now() {
        assert_eq!(next("0 3 * * *", at(2024, 1, 1, 3, 0, 0)), at(2024, 1, 2, 3, 0, 0));
    }

    #[test]
    fn step_minutes() {
        assert_eq!(next("*/15 * * * *", at(2024, 1, 1, 10, 7, 30)), at(2024, 1, 1, 10, 15, 0));
    }

    #[test]
    fn standard_weekday_numbers() {
        // 2024-01-01 is a Monday.
        assert_eq!(next("0 3 * * 1", at(2024, 1, 7, 12, 0, 0)), at(2024, 1, 8, 3, 0, 0));
        assert_eq!(next("0 3 * * 0", at(2024, 1, 1, 0, 0, 0)), at(2024, 1, 7, 3, 0, 0));
        assert_eq!(next("0 3 * * 7", at(2024, 1, 1, 0, 0, 0)), at(2024, 1, 7, 3, 0, 0));
        assert_eq!(next("0 3 * * 1-5", at(2024, 1, 6, 0, 0, 0)), at(2024, 1, 8, 3, 0, 0));
    }

    #[test]
    fn weekday_ranges_ending_on_sunday() {
        // 2024-01-06 is a Saturday.
        assert_eq!(next("0 3 * * 1-7", at(2024, 1, 6, 0, 0, 0)), at(2024, 1, 6, 3, 0, 0));
        assert_eq!(next("0 3 * * 1-7", at(2024, 1, 6, 4, 0, 0)), at(2024, 1, 7, 3, 0, 0));
        assert_eq!(next("0 3 * * 5-7", at(2024, 1, 1, 0, 0, 0)), at(2024, 1, 5, 3, 0, 0));
        assert_eq!(next("0 3 * * 5-7", at(2024, 1, 6, 4, 0, 0)), at(2024, 1, 7, 3, 0, 0));
        assert!(RotationSchedule::parse("0 3 * * 0-7").is_ok());
    }

    #[test]
    fn restricted_day_of_month_and_weekday_fire_on_either() {
        // 15th of the month or any Monday; 2024-01-08 is the next Monday.
        assert_eq!(next("0 3 15 * 1", at(2024, 1, 2, 0, 0, 0)), at(2024, 1, 8, 3, 0, 0));
        // 1st of the month or any Sunday. Thursday 2024-02-01 comes before Sunday the 4th.
        assert_eq!(next("0 3 1 * 0", at(2024, 1, 2, 0, 0, 0)), at(2024, 1, 7, 3, 0, 0));
        assert_eq!(next("0 3 1 * 0", at(2024, 1, 28, 4, 0, 0)), at(2024, 2, 1, 3, 0, 0));
        assert_eq!(parse_cron("0 3 1 * 0").unwrap().len(), 2);
        assert_eq!(parse_cron("0 3 1 * *").unwrap().len(), 1);
    }

    #[test]
    fn day_of_week_translation() {
        assert_eq!(standard_day_of_week("*"), "*");
        assert_eq!(standard_day_of_week("0,6"), "SUN,SAT");
        assert_eq!(standard_day_of_week("1-5/2"), "MON,WED,FRI");
        assert_eq!(standard_day_of_week("5-7"), "FRI,SAT,SUN");
        assert_eq!(standard_day_of_week("0-7"), "SUN,MON,TUE,WED,THU,FRI,SAT");
        assert_eq!(standard_day_of_week("*/2"), "*/2");
        assert_eq!(standard_day_of_week("mon"), "mon");
        assert_eq!(standard_day_of_week("mon-fri"), "mon-fri");
    }

    #[test]
    fn exhausted_schedule_has_no_next_run() {
        let schedule = RotationSchedule::parse("0 0 0 1 1 * 2000").unwrap();
        assert!(schedule.next_after(&Utc::now()).is_none());
    }

    #[tokio::test]
    async fn exhausted_schedule_stops_the_loop_without_running() {
        let fleet = Arc::new(EmptyFleet::default());
        let rotator = Rotator::new(fleet.clone(), Arc::new(Dispatcher::new(Vec::new())), "desc");
        let schedule = RotationSchedule::parse("0 0 0 1 1 * 2000").unwrap();

        let result = run_scheduler(&schedule, &rotator).await;

        assert!(matches!(result, Err(SchedulerError::Exhausted(ref e)) if e == "0 0 0 1 1 * 2000"));
        assert_eq!(fleet.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_runs_the_rotator_on_each_trigger() {
        let fleet = Arc::new(EmptyFleet::default());
        let rotator = Rotator::new(fleet.clone(), Arc::new(Dispatcher::new(Vec::new())), "desc");
        // Every second (6-field form).
        let schedule = RotationSchedule::parse("* * * * * *").unwrap();

        let result =
            tokio::time::timeout(Duration::from_secs(3), run_scheduler(&schedule, &rotator)).await;

        assert!(result.is_err(), "scheduler loop never returns on its own");
        assert!(fleet.polls.load(Ordering::SeqCst) >= 1);
    }
}
