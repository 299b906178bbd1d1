//! Computing the next occurrence of a `TriggerSpec`.

use chrono::{TimeZone, Utc};
use cron::Schedule;
use cron_kernel::error::CronError;
use cron_kernel::trigger::TriggerSpec;
use std::str::FromStr;

/// The next due time at or after `after_ms`, or `None` if the spec has no
/// further occurrences (a one-shot already fired, or an `Every` past its
/// `end_at_ms`).
pub fn next_occurrence(spec: &TriggerSpec, after_ms: u64) -> Result<Option<u64>, CronError> {
    match spec {
        TriggerSpec::At { run_at_ms } => {
            if *run_at_ms >= after_ms {
                Ok(Some(*run_at_ms))
            } else {
                // A past `At` is a misfire concern at push time, not here;
                // once consumed it has no further occurrences.
                Ok(None)
            }
        }
        TriggerSpec::Every {
            period_ms,
            start_at_ms,
            end_at_ms,
        } => {
            if *period_ms == 0 {
                return Err(CronError::configuration("Every trigger period_ms must be > 0"));
            }
            let start = start_at_ms.unwrap_or(0);
            let next = if after_ms <= start {
                start
            } else {
                let elapsed = after_ms - start;
                let ticks = elapsed.div_ceil(*period_ms);
                start + ticks * period_ms
            };
            match end_at_ms {
                Some(end) if next > *end => Ok(None),
                _ => Ok(Some(next)),
            }
        }
        TriggerSpec::Cron { expression } => {
            let schedule = Schedule::from_str(expression)
                .map_err(|e| CronError::configuration(format!("invalid cron expression '{expression}': {e}")))?;
            let after = Utc
                .timestamp_millis_opt(after_ms as i64)
                .single()
                .ok_or_else(|| CronError::configuration("after_ms out of range for a timestamp"))?;
            // `Schedule::after` is exclusive; step back 1ms so an occurrence
            // exactly at `after_ms` is not skipped.
            let probe = after - chrono::Duration::milliseconds(1);
            Ok(schedule.after(&probe).next().map(|dt| dt.timestamp_millis() as u64))
        }
        _ => Err(CronError::configuration("unsupported TriggerSpec variant")),
    }
}

/// Compute the *first* occurrence of a freshly-scheduled trigger: the
/// `run_at` itself for a one-shot `At`, otherwise the next occurrence at or
/// after the current clock.
pub fn first_occurrence(spec: &TriggerSpec, now_ms: u64) -> Result<u64, CronError> {
    match spec {
        TriggerSpec::At { run_at_ms } => Ok(*run_at_ms),
        _ => next_occurrence(spec, now_ms)?.ok_or_else(|| {
            CronError::configuration("trigger spec has no occurrences at or after now")
        }),
    }
}
