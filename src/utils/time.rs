//! Server-local day arithmetic. Every tracker takes `now` from its caller;
//! this is the only place that reads the wall clock.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Wall-clock "now" in server-local time, truncated to whole seconds.
pub fn local_now() -> NaiveDateTime {
    truncate_to_seconds(Local::now().naive_local())
}

pub fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

/// 23:59:59 of `date`.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| start_of_day(date))
}

/// Start of the day after `date`; used as an exclusive upper bound.
pub fn start_of_next_day(date: NaiveDate) -> NaiveDateTime {
    date.succ_opt()
        .map(start_of_day)
        .unwrap_or_else(|| end_of_day(date))
}
