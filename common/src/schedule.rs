use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::types::Mode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid schedule time `{0}` (expected HH:MM)")]
    InvalidTime(String),
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayGroup {
    Weekdays,
    Weekends,
}

impl DayGroup {
    pub fn contains(self, weekday: Weekday) -> bool {
        let weekend = matches!(weekday, Weekday::Sat | Weekday::Sun);
        match self {
            Self::Weekdays => !weekend,
            Self::Weekends => weekend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub time: String,
    pub temperature: f32,
}

impl ScheduleItem {
    pub fn new(time: impl Into<String>, temperature: f32) -> Self {
        Self {
            time: time.into(),
            temperature,
        }
    }

    /// Parses `H:MM` / `HH:MM` local wall-clock time; seconds are always zero.
    pub fn time_of_day(&self) -> Result<NaiveTime, ScheduleError> {
        let invalid = || ScheduleError::InvalidTime(self.time.clone());
        let (hour, minute) = self.time.trim().split_once(':').ok_or_else(invalid)?;

        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u32>().map_err(|_| invalid())?;
        let minute = minute.parse::<u32>().map_err(|_| invalid())?;

        NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklySchedule {
    pub weekdays: Vec<ScheduleItem>,
    pub weekends: Vec<ScheduleItem>,
}

impl WeeklySchedule {
    pub fn entries(&self) -> impl Iterator<Item = (DayGroup, &ScheduleItem)> {
        self.weekdays
            .iter()
            .map(|item| (DayGroup::Weekdays, item))
            .chain(self.weekends.iter().map(|item| (DayGroup::Weekends, item)))
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        for (_, item) in self.entries() {
            item.time_of_day()?;
        }
        Ok(())
    }

    /// Earliest upcoming change after `now` across both day groups. Malformed entries never fire.
    pub fn next_fire<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<(DateTime<Tz>, f32)> {
        self.entries()
            .filter_map(|(days, item)| {
                let time = item.time_of_day().ok()?;
                next_occurrence(now, days, time).map(|at| (at, item.temperature))
            })
            .min_by_key(|(at, _)| at.timestamp())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub timezone: String,
    pub heating: WeeklySchedule,
    pub cooling: WeeklySchedule,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Los_Angeles".to_string(),
            heating: WeeklySchedule::default(),
            cooling: WeeklySchedule::default(),
        }
    }
}

impl ScheduleConfig {
    pub fn for_mode(&self, mode: Mode) -> Option<&WeeklySchedule> {
        match mode {
            Mode::Heating => Some(&self.heating),
            Mode::Cooling => Some(&self.cooling),
            Mode::Off => None,
        }
    }

    pub fn parse_timezone(&self) -> Result<Tz, ScheduleError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ScheduleError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        self.parse_timezone()?;
        self.heating.validate()?;
        self.cooling.validate()
    }
}

/// Next local `time` on a day in `days` that lies strictly after `after`.
///
/// Local times skipped by a DST transition are dropped for that day; ambiguous ones resolve to
/// the earlier instant.
pub fn next_occurrence<Tz: TimeZone>(
    after: &DateTime<Tz>,
    days: DayGroup,
    time: NaiveTime,
) -> Option<DateTime<Tz>> {
    let timezone = after.timezone();
    let today = after.date_naive();

    for day_offset in 0..=7 {
        let date = today + Duration::days(day_offset);
        if !days.contains(date.weekday()) {
            continue;
        }

        let Some(candidate) = timezone
            .from_local_datetime(&date.and_time(time))
            .earliest()
        else {
            continue;
        };

        if candidate > *after {
            return Some(candidate);
        }
    }

    None
}
