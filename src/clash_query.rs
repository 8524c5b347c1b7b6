// Clash query builder: turns the on-screen time fields and a roster snapshot into a canonical query
// Pure and deterministic; no I/O happens here

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::roster::{RosterEntry, RosterKind};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid time specification: {0}")]
    InvalidTimeSpec(String),
}

// Raw time fields as they sit in the booking form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpecInput {
    pub manual: bool,
    pub date: Option<String>,
    pub week_commencing: Option<String>,
    pub day: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl TimeSpecInput {
    pub fn manual(date: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            manual: true,
            date: Some(date.to_string()),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
            ..Default::default()
        }
    }

    pub fn recurring(week_commencing: &str, day: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            manual: false,
            week_commencing: Some(week_commencing.to_string()),
            day: Some(day.to_string()),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
            ..Default::default()
        }
    }

    // The fields exactly as typed, in form order; the manual marker only when the form carries it
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = [
            ("date", &self.date),
            ("week_commencing", &self.week_commencing),
            ("day", &self.day),
            ("start_time", &self.start_time),
            ("end_time", &self.end_time),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect();

        if self.manual {
            pairs.push(("manual".to_string(), "true".to_string()));
        }
        pairs
    }

    pub fn resolve(&self) -> Result<TimeSpec, QueryError> {
        let manual_complete = present(&self.date) && present(&self.start_time) && present(&self.end_time);
        let slot_complete = present(&self.week_commencing)
            && present(&self.day)
            && present(&self.start_time)
            && present(&self.end_time);

        if self.manual {
            if !manual_complete {
                return Err(QueryError::InvalidTimeSpec(
                    "manual booking needs a date, start time and end time".to_string(),
                ));
            }
            self.resolve_manual()
        } else if slot_complete {
            self.resolve_recurring()
        } else if manual_complete {
            self.resolve_manual()
        } else {
            Err(QueryError::InvalidTimeSpec(
                "neither a manual window nor a timetable slot is fully specified".to_string(),
            ))
        }
    }

    fn resolve_manual(&self) -> Result<TimeSpec, QueryError> {
        let date = parse_date(field(&self.date))?;
        let (start, end) = parse_window(field(&self.start_time), field(&self.end_time))?;
        Ok(TimeSpec::Manual { date, start, end })
    }

    fn resolve_recurring(&self) -> Result<TimeSpec, QueryError> {
        let given = parse_date(field(&self.week_commencing))?;
        let day = parse_day(field(&self.day))?;
        let (start, end) = parse_window(field(&self.start_time), field(&self.end_time))?;
        Ok(TimeSpec::Recurring {
            week_commencing: week_commencing(given),
            day,
            start,
            end,
        })
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or_default()
}

fn parse_date(raw: &str) -> Result<NaiveDate, QueryError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| QueryError::InvalidTimeSpec(format!("bad date {:?}: {}", raw, e)))
}

fn parse_time(raw: &str) -> Result<NaiveTime, QueryError> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|e| QueryError::InvalidTimeSpec(format!("bad time {:?}: {}", raw, e)))
}

fn parse_window(start: &str, end: &str) -> Result<(NaiveTime, NaiveTime), QueryError> {
    let start = parse_time(start)?;
    let end = parse_time(end)?;
    if end <= start {
        return Err(QueryError::InvalidTimeSpec(format!(
            "end time {} is not after start time {}",
            end.format(TIME_FORMAT),
            start.format(TIME_FORMAT)
        )));
    }
    Ok((start, end))
}

pub fn parse_day(raw: &str) -> Result<Weekday, QueryError> {
    match raw.to_lowercase().as_str() {
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        "sunday" => Ok(Weekday::Sun),
        _ => Err(QueryError::InvalidTimeSpec(format!("unknown day {:?}", raw))),
    }
}

pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

// Monday of the week containing the given date
pub fn week_commencing(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    Manual {
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    },
    Recurring {
        week_commencing: NaiveDate,
        day: Weekday,
        start: NaiveTime,
        end: NaiveTime,
    },
}

impl TimeSpec {
    pub fn is_manual(&self) -> bool {
        matches!(self, TimeSpec::Manual { .. })
    }

    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        match *self {
            TimeSpec::Manual { start, end, .. } | TimeSpec::Recurring { start, end, .. } => {
                (start, end)
            }
        }
    }

    // Calendar date the booking lands on
    pub fn date(&self) -> NaiveDate {
        match *self {
            TimeSpec::Manual { date, .. } => date,
            TimeSpec::Recurring {
                week_commencing,
                day,
                ..
            } => week_commencing + Duration::days(day.num_days_from_monday() as i64),
        }
    }

    // Field encoding shared by the clash query and the native form submission
    // The manual marker is only present for manual windows; the server applies slot rules otherwise
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let (start, end) = self.window();
        let mut pairs = Vec::with_capacity(4);
        match *self {
            TimeSpec::Manual { date, .. } => {
                pairs.push(("date".to_string(), date.format(DATE_FORMAT).to_string()));
            }
            TimeSpec::Recurring {
                week_commencing,
                day,
                ..
            } => {
                pairs.push((
                    "week_commencing".to_string(),
                    week_commencing.format(DATE_FORMAT).to_string(),
                ));
                pairs.push(("day".to_string(), day_name(day).to_string()));
            }
        }
        pairs.push(("start_time".to_string(), start.format(TIME_FORMAT).to_string()));
        pairs.push(("end_time".to_string(), end.format(TIME_FORMAT).to_string()));
        if self.is_manual() {
            pairs.push(("manual".to_string(), "true".to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityParam {
    pub key: String,
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClashQuery {
    pub time: TimeSpec,
    pub items: Vec<QuantityParam>,
}

impl ClashQuery {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.time.to_pairs();
        pairs.extend(
            self.items
                .iter()
                .map(|item| (item.key.clone(), item.quantity.to_string())),
        );
        pairs
    }
}

// Zero quantities are kept: they tell the server an item is no longer needed
pub fn build_query(
    time: &TimeSpecInput,
    kind: RosterKind,
    snapshot: &[RosterEntry],
) -> Result<ClashQuery, QueryError> {
    let time = time.resolve()?;
    let items = snapshot
        .iter()
        .map(|entry| QuantityParam {
            key: format!("{}{}", kind.quantity_prefix(), entry.item_id),
            item_id: entry.item_id.clone(),
            quantity: entry.quantity,
        })
        .collect();

    Ok(ClashQuery { time, items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::ItemRoster;
    use test_case::test_case;

    fn expected(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ruler_roster() -> ItemRoster {
        let mut roster = ItemRoster::new(RosterKind::Extra);
        roster.add_item("ruler", "30cm ruler", 10);
        roster.update_quantity(1, 3);
        roster
    }

    #[test]
    fn test_manual_query_encoding() {
        let roster = ruler_roster();
        let input = TimeSpecInput::manual("2024-03-12", "09:15", "10:00");
        let query = build_query(&input, roster.kind(), &roster.snapshot()).unwrap();

        assert_eq!(
            query.to_pairs(),
            expected(&[
                ("date", "2024-03-12"),
                ("start_time", "09:15"),
                ("end_time", "10:00"),
                ("manual", "true"),
                ("eqty_ruler", "3"),
            ])
        );
    }

    #[test]
    fn test_recurring_query_has_no_manual_marker() {
        let roster = ruler_roster();
        // Wednesday; normalised to the Monday of that week
        let input = TimeSpecInput::recurring("2024-03-13", "Friday", "13:30", "14:25");
        let query = build_query(&input, roster.kind(), &roster.snapshot()).unwrap();

        assert_eq!(
            query.to_pairs(),
            expected(&[
                ("week_commencing", "2024-03-11"),
                ("day", "friday"),
                ("start_time", "13:30"),
                ("end_time", "14:25"),
                ("eqty_ruler", "3"),
            ])
        );
        assert!(query.to_pairs().iter().all(|(k, _)| k != "manual"));
        assert_eq!(query.time.date(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn test_zero_quantity_lines_are_included() {
        let mut roster = ruler_roster();
        roster.add_item("beaker", "250ml beaker", 20);
        roster.update_quantity(2, 0);

        let input = TimeSpecInput::manual("2024-03-12", "09:15", "10:00");
        let query = build_query(&input, RosterKind::Core, &roster.snapshot()).unwrap();
        assert_eq!(query.items.len(), 2);
        assert_eq!(query.items[1].key, "qty_beaker");
        assert_eq!(query.items[1].quantity, 0);
    }

    #[test]
    fn test_build_query_is_deterministic() {
        let mut roster = ruler_roster();
        roster.add_item("beaker", "250ml beaker", 20);
        roster.add_item("burner", "Bunsen burner", 15);
        let input = TimeSpecInput::recurring("2024-03-11", "monday", "09:00", "10:00");

        let first = build_query(&input, roster.kind(), &roster.snapshot()).unwrap();
        for _ in 0..10 {
            let again = build_query(&input, roster.kind(), &roster.snapshot()).unwrap();
            assert_eq!(first, again);
            assert_eq!(first.to_pairs(), again.to_pairs());
        }
    }

    #[test]
    fn test_empty_roster_still_builds() {
        let input = TimeSpecInput::manual("2024-03-12", "09:15", "10:00");
        let query = build_query(&input, RosterKind::Extra, &[]).unwrap();
        assert!(query.items.is_empty());
    }

    #[test]
    fn test_complete_manual_window_without_marker() {
        let input = TimeSpecInput {
            manual: false,
            ..TimeSpecInput::manual("2024-03-12", "09:15", "10:00")
        };
        assert!(input.resolve().unwrap().is_manual());
    }

    #[test_case(TimeSpecInput::default(); "#1 Nothing filled in")]
    #[test_case(TimeSpecInput { date: None, ..TimeSpecInput::manual("2024-03-12", "09:15", "10:00") }; "#2 Manual without date")]
    #[test_case(TimeSpecInput { day: None, ..TimeSpecInput::recurring("2024-03-11", "monday", "09:00", "10:00") }; "#3 Slot without day")]
    #[test_case(TimeSpecInput::manual("12/03/2024", "09:15", "10:00"); "#4 Bad date format")]
    #[test_case(TimeSpecInput::manual("2024-03-12", "9.15", "10:00"); "#5 Bad time format")]
    #[test_case(TimeSpecInput::manual("2024-03-12", "10:00", "09:15"); "#6 End before start")]
    #[test_case(TimeSpecInput::manual("2024-03-12", "10:00", "10:00"); "#7 Empty window")]
    #[test_case(TimeSpecInput::recurring("2024-03-11", "someday", "09:00", "10:00"); "#8 Unknown day")]
    #[test_case(TimeSpecInput { start_time: Some("  ".to_string()), ..TimeSpecInput::manual("2024-03-12", "09:15", "10:00") }; "#9 Blank start time")]
    fn test_invalid_time_specs(input: TimeSpecInput) {
        let result = build_query(&input, RosterKind::Extra, &ruler_roster().snapshot());
        assert!(matches!(result, Err(QueryError::InvalidTimeSpec(_))));
    }

    #[test_case("2024-03-11", "2024-03-11"; "#1 Already Monday")]
    #[test_case("2024-03-17", "2024-03-11"; "#2 Sunday belongs to the previous Monday")]
    #[test_case("2024-03-01", "2024-02-26"; "#3 Crosses a month boundary")]
    fn test_week_commencing(given: &str, expected: &str) {
        let given = NaiveDate::parse_from_str(given, DATE_FORMAT).unwrap();
        let expected = NaiveDate::parse_from_str(expected, DATE_FORMAT).unwrap();
        assert_eq!(week_commencing(given), expected);
    }

    #[test]
    fn test_day_names_round_trip_through_parser() {
        for day in [Weekday::Mon, Weekday::Wed, Weekday::Sun] {
            assert_eq!(parse_day(day_name(day)).unwrap(), day);
        }
        assert_eq!(parse_day("THURSDAY").unwrap(), Weekday::Thu);
    }
}
