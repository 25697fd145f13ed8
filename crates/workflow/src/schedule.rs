//! Rose's weekly routine, used to frame what she is doing "right now".
//!
//! Slots are written compactly: a day field in cron day-of-week syntax
//! (`0`=Sun .. `6`=Sat, `*`, `N-M`, `N,M`) and an `HH:MM-HH:MM` window.
//! Windows may wrap past midnight (`22:00-07:00`). The first matching slot wins.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};

/// One recurring activity.
#[derive(Debug, Clone)]
pub struct ScheduleSlot {
    days: Vec<u32>,
    start: NaiveTime,
    end: NaiveTime,
    activity: String,
}

impl ScheduleSlot {
    /// Parse a slot from its day field and time window.
    pub fn parse(days: &str, window: &str, activity: impl Into<String>) -> Result<Self, String> {
        let days = parse_days(days)?;
        let (start, end) = window
            .split_once('-')
            .ok_or_else(|| format!("Expected HH:MM-HH:MM, got {window}"))?;
        Ok(Self {
            days,
            start: parse_time(start)?,
            end: parse_time(end)?,
            activity: activity.into(),
        })
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    fn matches(&self, at: &NaiveDateTime) -> bool {
        let dow = at.weekday().num_days_from_sunday();
        if !self.days.contains(&dow) {
            return false;
        }
        let t = NaiveTime::from_hms_opt(at.hour(), at.minute(), 0).unwrap_or(self.start);
        if self.start <= self.end {
            t >= self.start && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| format!("Invalid time {s}: {e}"))
}

fn parse_days(field: &str) -> Result<Vec<u32>, String> {
    let mut values = Vec::new();
    for part in field.split(',') {
        let part = part.trim();
        if part == "*" {
            values.extend(0..=6);
        } else if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start
                .parse()
                .map_err(|_| format!("Invalid range start: {start}"))?;
            let end: u32 = end.parse().map_err(|_| format!("Invalid range end: {end}"))?;
            if start > end || end > 6 {
                return Err(format!("Range {start}-{end} invalid for 0-6"));
            }
            values.extend(start..=end);
        } else {
            let v: u32 = part.parse().map_err(|_| format!("Invalid day: {part}"))?;
            if v > 6 {
                return Err(format!("{v} out of range 0-6"));
            }
            values.push(v);
        }
    }
    values.sort();
    values.dedup();
    if values.is_empty() {
        return Err("Day field produced no values".into());
    }
    Ok(values)
}

const ROSE_ROUTINE: &[(&str, &str, &str)] = &[
    ("*", "23:00-07:00", "sleeping, or half-asleep and answering from bed"),
    ("1-5", "07:00-08:30", "having coffee on the balcony before work"),
    ("1-5", "08:30-12:30", "working in the community greenhouse, repotting seedlings"),
    ("1-5", "12:30-13:30", "eating lunch on the bench outside the greenhouse"),
    ("1-5", "13:30-17:30", "running soil tests and logging plant growth at the greenhouse"),
    ("1-5", "17:30-19:00", "cycling home the long way along the river"),
    ("1,3", "19:00-21:00", "at a pottery class, hands covered in clay"),
    ("2,4,5", "19:00-21:00", "cooking dinner and listening to old jazz records"),
    ("1-5", "21:00-23:00", "reading poetry on the sofa with a cup of tea"),
    ("6", "07:00-12:00", "at the farmers' market picking out flowers and bread"),
    ("6", "12:00-18:00", "restoring an old bicycle in the garage"),
    ("0", "07:00-12:00", "on a long morning hike in the hills"),
    ("0", "12:00-18:00", "visiting family for a slow Sunday lunch"),
    ("0,6", "18:00-23:00", "out with friends at a small wine bar downtown"),
];

/// An ordered list of slots.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    slots: Vec<ScheduleSlot>,
}

impl Schedule {
    pub fn new(slots: Vec<ScheduleSlot>) -> Self {
        Self { slots }
    }

    /// Rose's default week.
    pub fn rose() -> Self {
        let slots = ROSE_ROUTINE
            .iter()
            .filter_map(|(days, window, activity)| ScheduleSlot::parse(days, window, *activity).ok())
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// What Rose is doing at `at`, if anything is scheduled.
    pub fn activity_at(&self, at: NaiveDateTime) -> Option<&str> {
        self.slots
            .iter()
            .find(|slot| slot.matches(&at))
            .map(ScheduleSlot::activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn built_in_routine_parses_completely() {
        assert_eq!(Schedule::rose().len(), ROSE_ROUTINE.len());
    }

    #[test]
    fn weekday_working_hours() {
        // 2026-02-23 is a Monday.
        let s = Schedule::rose();
        assert_eq!(
            s.activity_at(at(2026, 2, 23, 9, 30)),
            Some("working in the community greenhouse, repotting seedlings")
        );
    }

    #[test]
    fn weekend_differs_from_weekday() {
        let s = Schedule::rose();
        // 2026-02-28 is a Saturday.
        assert_eq!(
            s.activity_at(at(2026, 2, 28, 9, 30)),
            Some("at the farmers' market picking out flowers and bread")
        );
    }

    #[test]
    fn overnight_window_wraps() {
        let s = Schedule::rose();
        let sleeping = Some("sleeping, or half-asleep and answering from bed");
        assert_eq!(s.activity_at(at(2026, 2, 23, 23, 30)), sleeping);
        assert_eq!(s.activity_at(at(2026, 2, 24, 3, 0)), sleeping);
        assert_ne!(s.activity_at(at(2026, 2, 24, 7, 0)), sleeping);
    }

    #[test]
    fn window_end_is_exclusive() {
        let slot = ScheduleSlot::parse("*", "09:00-10:00", "x").unwrap();
        let s = Schedule::new(vec![slot]);
        assert!(s.activity_at(at(2026, 2, 23, 9, 0)).is_some());
        assert!(s.activity_at(at(2026, 2, 23, 10, 0)).is_none());
    }

    #[test]
    fn day_field_syntax() {
        assert_eq!(parse_days("1-5").unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(parse_days("0,6").unwrap(), vec![0, 6]);
        assert_eq!(parse_days("*").unwrap().len(), 7);
        assert!(parse_days("7").is_err());
        assert!(parse_days("5-1").is_err());
        assert!(parse_days("mon").is_err());
    }

    #[test]
    fn invalid_window() {
        assert!(ScheduleSlot::parse("*", "09:00", "x").is_err());
        assert!(ScheduleSlot::parse("*", "25:00-26:00", "x").is_err());
    }

    #[test]
    fn empty_schedule_has_no_activity() {
        assert!(Schedule::default().activity_at(at(2026, 2, 23, 9, 0)).is_none());
    }
}
