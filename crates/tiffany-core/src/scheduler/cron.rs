//! Minimal 5-field cron expressions (`min hour dom mon dow`), local time.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Local, Timelike};

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CronExpr {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

/// Allowed values as a bitmask; bit `n` set means value `n` matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Field {
    bits: u64,
    wildcard: bool,
}

impl FromStr for CronExpr {
    type Err = Error;

    fn from_str(expr: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = parts.as_slice() else {
            return Err(Error::Config(format!(
                "cron expression needs 5 fields, got {}: {expr:?}",
                parts.len()
            )));
        };

        let mut day_of_week = Field::parse(dow, 0, 7)?;
        // 7 is an alias for Sunday.
        if day_of_week.bits & (1 << 7) != 0 {
            day_of_week.bits = (day_of_week.bits & !(1 << 7)) | 1;
        }
        day_of_week.wildcard |= day_of_week.bits == 0x7f;

        Ok(Self {
            minute: Field::parse(minute, 0, 59)?,
            hour: Field::parse(hour, 0, 23)?,
            day_of_month: Field::parse(dom, 1, 31)?,
            month: Field::parse(month, 1, 12)?,
            day_of_week,
        })
    }
}

impl CronExpr {
    pub fn matches(&self, dt: DateTime<Local>) -> bool {
        if !(self.minute.contains(dt.minute())
            && self.hour.contains(dt.hour())
            && self.month.contains(dt.month()))
        {
            return false;
        }

        let dom = self.day_of_month.contains(dt.day());
        let dow = self
            .day_of_week
            .contains(dt.weekday().num_days_from_sunday());

        // When both day fields are restricted, either one matching is enough.
        match (self.day_of_month.wildcard, self.day_of_week.wildcard) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }

    /// First matching minute strictly after `now`, searching up to a year ahead.
    pub fn next_after(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        let mut t = (now + Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;

        const MINUTES_PER_YEAR: usize = 366 * 24 * 60;
        for _ in 0..MINUTES_PER_YEAR {
            if self.matches(t) {
                return Some(t);
            }
            t += Duration::minutes(1);
        }
        None
    }
}

impl Field {
    fn parse(raw: &str, min: u32, max: u32) -> Result<Self> {
        let mut bits = 0u64;
        for part in raw.split(',') {
            bits |= Self::parse_part(part.trim(), min, max)?;
        }

        let full = (min..=max).fold(0u64, |acc, v| acc | (1 << v));
        Ok(Self {
            bits,
            wildcard: raw.trim() == "*" || bits == full,
        })
    }

    fn parse_part(part: &str, min: u32, max: u32) -> Result<u64> {
        let invalid = || Error::Config(format!("invalid cron field: {part:?}"));

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (
                a.parse().map_err(|_| invalid())?,
                b.parse().map_err(|_| invalid())?,
            )
        } else {
            let v: u32 = range.parse().map_err(|_| invalid())?;
            // `5/15` means "from 5 to max, every 15".
            (v, if step > 1 { max } else { v })
        };

        if start < min || end > max || start > end {
            return Err(invalid());
        }

        Ok((start..=end)
            .step_by(step as usize)
            .fold(0u64, |acc, v| acc | (1 << v)))
    }

    fn contains(&self, v: u32) -> bool {
        v < 64 && self.bits & (1 << v) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn hourly_matches_top_of_hour_only() {
        let expr: CronExpr = "0 * * * *".parse().unwrap();
        assert!(expr.matches(at(2026, 1, 1, 10, 0)));
        assert!(!expr.matches(at(2026, 1, 1, 10, 1)));
    }

    #[test]
    fn steps_ranges_and_lists() {
        let expr: CronExpr = "*/15 9-17 * * 1,3,5".parse().unwrap();
        // 2026-01-05 is a Monday.
        assert!(expr.matches(at(2026, 1, 5, 9, 45)));
        assert!(!expr.matches(at(2026, 1, 5, 18, 0)));
        assert!(!expr.matches(at(2026, 1, 6, 9, 0)));
    }

    #[test]
    fn seven_is_sunday() {
        let expr: CronExpr = "0 12 * * 7".parse().unwrap();
        // 2026-01-04 is a Sunday.
        assert!(expr.matches(at(2026, 1, 4, 12, 0)));
    }

    #[test]
    fn restricted_dom_and_dow_use_or() {
        let expr: CronExpr = "0 0 1 * 1".parse().unwrap();
        assert!(expr.matches(at(2026, 1, 1, 0, 0))); // 1st, a Thursday
        assert!(expr.matches(at(2026, 1, 5, 0, 0))); // a Monday
        assert!(!expr.matches(at(2026, 1, 6, 0, 0)));
    }

    #[test]
    fn next_after_rounds_to_following_match() {
        let expr: CronExpr = "*/5 * * * *".parse().unwrap();
        let now = Local.with_ymd_and_hms(2026, 1, 1, 10, 1, 30).unwrap();
        let next = expr.next_after(now).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (10, 5, 0));

        let six_hourly: CronExpr = "0 */6 * * *".parse().unwrap();
        let next = six_hourly.next_after(at(2026, 1, 1, 6, 0)).unwrap();
        assert_eq!((next.hour(), next.minute()), (12, 0));
    }

    #[test]
    fn rejects_malformed_expressions() {
        for bad in ["", "* * * *", "60 * * * *", "*/0 * * * *", "a * * * *", "5-1 * * * *"] {
            assert!(bad.parse::<CronExpr>().is_err(), "{bad:?} should fail");
        }
    }
}
