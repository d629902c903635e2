//! Attendance calendar reads and per-day period writes.

use chrono::{DateTime, FixedOffset, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::day_cache::KnownDay;
use crate::error::{Result, ValidationError};
use crate::session::Session;
use crate::transport::Request;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    #[default]
    Work,
    Break,
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodType::Work => write!(f, "work"),
            PeriodType::Break => write!(f, "break"),
        }
    }
}

/// One attendance period as read from a calendar or supplied by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(with = "timestamp")]
    pub start: DateTime<FixedOffset>,
    #[serde(with = "timestamp")]
    pub end: DateTime<FixedOffset>,
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, alias = "type")]
    pub period_type: Option<PeriodType>,
}

impl Period {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self {
            id: None,
            start,
            end,
            project_id: None,
            comment: None,
            period_type: None,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end.signed_duration_since(self.start)
    }

    pub fn kind(&self) -> PeriodType {
        self.period_type.unwrap_or_default()
    }
}

/// A period in the exact shape the day write endpoint accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WirePeriod {
    pub id: Uuid,
    #[serde(serialize_with = "wire_time")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "wire_time")]
    pub end: DateTime<Utc>,
    pub project_id: Option<u64>,
    pub comment: Option<String>,
    pub period_type: PeriodType,
}

impl WirePeriod {
    /// UTC, whole seconds, a fresh id when absent and `work` by default.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidTimeRange`] unless `end > start`.
    pub fn from_period(period: &Period) -> Result<Self, ValidationError> {
        let start = period.start.with_timezone(&Utc).trunc_subsecs(0);
        let end = period.end.with_timezone(&Utc).trunc_subsecs(0);
        if end <= start {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self {
            id: period.id.unwrap_or_else(Uuid::new_v4),
            start,
            end,
            project_id: period.project_id,
            comment: period.comment.clone(),
            period_type: period.kind(),
        })
    }
}

fn wire_time<S: serde::Serializer>(time: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format("%Y-%m-%dT%H:%M:%SZ"))
}

#[derive(Debug, Serialize)]
struct SetDayRequest<'a> {
    employee_id: u64,
    periods: &'a [WirePeriod],
}

/// One calendar day as returned by the timesheet read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timecard {
    #[serde(default)]
    pub day_id: Option<Uuid>,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_off_day: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub periods: Vec<Period>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub break_duration_minutes: i64,
    #[serde(default)]
    pub target_hours: Option<TargetHours>,
    #[serde(default)]
    pub overtime: Option<Overtime>,
    #[serde(default)]
    pub time_off: Option<TimeOff>,
    #[serde(default)]
    pub approval: Option<Approval>,
}

impl Timecard {
    /// Sum of work periods.
    pub fn worked(&self) -> chrono::Duration {
        self.periods
            .iter()
            .filter(|p| p.kind() == PeriodType::Work)
            .map(Period::duration)
            .fold(chrono::Duration::zero(), |acc, d| acc + d)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetHours {
    pub effective_work_duration_minutes: i64,
    pub effective_break_duration_minutes: Option<i64>,
    pub contractual_work_duration_minutes: i64,
    pub contractual_break_duration_minutes: i64,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overtime {
    pub overtime_minutes: Option<i64>,
    pub pending_minutes: Option<i64>,
    pub cliff_minutes: Option<i64>,
    pub total_overtime_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeOff {
    pub aggregated_duration_minutes: i64,
    pub items: Vec<TimeOffItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeOffItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub duration_minutes: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Approval {
    pub status: String,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CalendarData {
    Wrapped { timecards: Vec<Timecard> },
    Bare(Vec<Timecard>),
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 and zone-less `YYYY-MM-DDTHH:MM:SS[.f]`, the latter as UTC.
mod timestamp {
    use chrono::{DateTime, FixedOffset, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<FixedOffset>, String> {
        let raw = raw.trim();
        if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
            return Ok(time);
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc().fixed_offset())
            .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
    }
}

pub use timestamp::parse as parse_timestamp;

impl Session {
    /// Timecards of `employee_id` for `start..=end`.
    ///
    /// Reading the logged-in user's own calendar also records the day
    /// identifiers it reveals.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotLoggedIn`](crate::CoreError::NotLoggedIn),
    /// [`ValidationError::InvalidValue`] when `start > end`, transport and
    /// envelope errors.
    pub fn calendar(&self, employee_id: u64, start: NaiveDate, end: NaiveDate) -> Result<Vec<Timecard>> {
        let me = self.require_login()?;
        if start > end {
            return Err(ValidationError::InvalidValue {
                field: "date range".to_string(),
                message: format!("start {start} is after end {end}"),
            }
            .into());
        }
        let timecards = self.fetch_timecards(employee_id, start, end)?;
        if employee_id == me {
            self.day_ids.record_range(&known_days(&timecards), start, end);
        }
        Ok(timecards)
    }

    /// [`calendar`](Self::calendar) of the logged-in user.
    ///
    /// # Errors
    ///
    /// Same as [`calendar`](Self::calendar).
    pub fn my_calendar(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Timecard>> {
        let me = self.require_login()?;
        self.calendar(me, start, end)
    }

    /// Does not touch the day cache; called while the cache is locked.
    fn fetch_timecards(&self, employee_id: u64, start: NaiveDate, end: NaiveDate) -> Result<Vec<Timecard>> {
        let path = format!(
            "{}?start_date={}&end_date={}",
            self.endpoints.calendar_path(employee_id),
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT),
        );
        let data: CalendarData = self.fetch(Request::get(path))?;
        let timecards = match data {
            CalendarData::Wrapped { timecards } | CalendarData::Bare(timecards) => timecards,
        };
        debug!(employee_id, %start, %end, days = timecards.len(), "fetched calendar");
        Ok(timecards)
    }

    /// Day identifier for `date`, prefetching its month or minting one.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotLoggedIn`](crate::CoreError::NotLoggedIn) or the
    /// prefetch error.
    pub fn day_id(&self, date: NaiveDate) -> Result<Uuid> {
        let me = self.require_login()?;
        self.day_ids.get_or_create(date, |start, end| {
            self.fetch_timecards(me, start, end)
                .map(|timecards| known_days(&timecards))
        })
    }

    /// Replace all periods of `date` with `periods`.
    ///
    /// Returns the periods exactly as sent.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidTimeRange`] for a period that does not end
    /// after it starts (before any network call), then login, day-id and
    /// remote errors.
    pub fn set_day_periods(&self, date: NaiveDate, periods: &[Period]) -> Result<Vec<WirePeriod>> {
        let employee_id = self.require_login()?;
        let wire = periods
            .iter()
            .map(WirePeriod::from_period)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let day_id = self.day_id(date)?;
        let request = Request::put(self.endpoints.day_path(day_id)).json(&SetDayRequest {
            employee_id,
            periods: &wire,
        })?;
        self.execute(request)?;
        info!(%date, %day_id, periods = wire.len(), "updated attendance day");
        Ok(wire)
    }

    /// Remove all periods of `date`.
    ///
    /// Some deployments reject this; the rejection surfaces as the remote
    /// error.
    ///
    /// # Errors
    ///
    /// Login, day-id and remote errors.
    pub fn delete_day_periods(&self, date: NaiveDate) -> Result<()> {
        self.require_login()?;
        let day_id = self.day_id(date)?;
        self.execute(Request::delete(self.endpoints.day_path(day_id)))?;
        info!(%date, %day_id, "deleted attendance day");
        Ok(())
    }
}

fn known_days(timecards: &[Timecard]) -> Vec<KnownDay> {
    timecards
        .iter()
        .filter_map(|card| {
            card.day_id.map(|day_id| KnownDay {
                date: card.date,
                day_id,
            })
        })
        .collect()
}
