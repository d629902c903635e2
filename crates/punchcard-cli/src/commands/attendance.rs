use std::collections::BTreeMap;
use std::error::Error;
use std::io::Read;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone};
use clap::Subcommand;
use punchcard_core::day_cache::month_bounds;
use punchcard_core::duration::{format_duration, parse_duration};
use punchcard_core::{OutputFormat, Period, PeriodType, Session, WirePeriod};
use serde_json::json;
use tracing::{info, warn};

use crate::context::Context;
use crate::output::{period_line, print_json, print_timecards};

#[derive(Subcommand)]
pub enum AttendanceAction {
    /// Show the attendance calendar (default: the current month)
    Calendar {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Replace whole days with periods read as a stream of JSON objects
    Set {
        /// Input file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        file: String,
    },
    /// Append a work period to a day
    Add {
        /// Day, YYYY-MM-DD
        date: NaiveDate,
        /// Project name or id, or `none`
        project: String,
        /// Duration such as `1h30m` or `1:30`
        duration: String,
        /// Start time HH:MM instead of the end of the last period
        #[arg(long, value_parser = parse_start_time)]
        start_time: Option<NaiveTime>,
        /// Period comment
        #[arg(long)]
        comment: Option<String>,
    },
    /// Remove all periods of a day
    #[command(visible_aliases = ["rm", "delete"])]
    Remove {
        /// Day, YYYY-MM-DD
        date: NaiveDate,
    },
}

fn parse_start_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| format!("'{raw}' is not HH:MM: {e}"))
}

pub fn run(action: AttendanceAction, ctx: &Context) -> Result<(), Box<dyn Error>> {
    match action {
        AttendanceAction::Calendar { start, end } => calendar(ctx, start, end),
        AttendanceAction::Set { file } => set(ctx, &file),
        AttendanceAction::Add {
            date,
            project,
            duration,
            start_time,
            comment,
        } => add(ctx, date, &project, &duration, start_time, comment),
        AttendanceAction::Remove { date } => {
            let session = ctx.session()?;
            session.delete_day_periods(date)?;
            match ctx.output {
                OutputFormat::Json => print_json(&json!({ "date": date, "removed": true }))?,
                OutputFormat::Pretty => println!("Removed all periods of {date}"),
            }
            Ok(())
        }
    }
}

fn calendar(
    ctx: &Context,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), Box<dyn Error>> {
    let (month_start, month_end) = month_bounds(Local::now().date_naive());
    let start = start.unwrap_or(month_start);
    let end = end.unwrap_or(if start > month_end { start } else { month_end });

    let session = ctx.session()?;
    let timecards = session.my_calendar(start, end)?;
    match ctx.output {
        OutputFormat::Json => print_json(&timecards)?,
        OutputFormat::Pretty => print_timecards(&timecards, &project_names(&session)),
    }
    Ok(())
}

/// Project names for display; an unreadable list only costs the names.
fn project_names(session: &Session) -> BTreeMap<u64, String> {
    match session.projects() {
        Ok(projects) => projects
            .into_iter()
            .map(|p| (p.id, p.attributes.name))
            .collect(),
        Err(e) => {
            warn!(error = %e, "cannot read project names");
            BTreeMap::new()
        }
    }
}

fn set(ctx: &Context, file: &str) -> Result<(), Box<dyn Error>> {
    let input = if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file)?
    };
    let minimum = ctx.config.minimum_period_duration()?;
    let days = group_by_day(read_periods(&input)?, minimum);
    if days.is_empty() {
        return Err("missing attendance periods, provide JSON objects on stdin or with --file".into());
    }

    // Reject the whole input before writing any day.
    for periods in days.values() {
        for period in periods {
            WirePeriod::from_period(period)?;
        }
    }

    let session = ctx.session()?;
    let mut written = Vec::with_capacity(days.len());
    for (date, periods) in &days {
        let wire = session.set_day_periods(*date, periods)?;
        info!(%date, periods = wire.len(), "day written");
        written.push((*date, wire));
    }

    match ctx.output {
        OutputFormat::Json => {
            let summary: Vec<_> = written
                .iter()
                .map(|(date, wire)| json!({ "date": date, "periods": wire }))
                .collect();
            print_json(&summary)?;
        }
        OutputFormat::Pretty => {
            for (date, wire) in &written {
                println!("{date}: {} period(s) written", wire.len());
            }
        }
    }
    Ok(())
}

/// Concatenated or whitespace-separated JSON period objects.
fn read_periods(input: &str) -> Result<Vec<Period>, serde_json::Error> {
    serde_json::Deserializer::from_str(input)
        .into_iter::<Period>()
        .collect()
}

/// Periods keyed by the date they start on in their own offset, too-short
/// ones dropped.
fn group_by_day(periods: Vec<Period>, minimum: chrono::Duration) -> BTreeMap<NaiveDate, Vec<Period>> {
    let mut days: BTreeMap<NaiveDate, Vec<Period>> = BTreeMap::new();
    for period in periods {
        if period.duration() < minimum {
            warn!(
                start = %period.start,
                end = %period.end,
                minimum = %format_duration(minimum),
                "skipping period shorter than the minimum"
            );
            continue;
        }
        let date = period.start.date_naive();
        days.entry(date).or_default().push(period);
    }
    days
}

fn add(
    ctx: &Context,
    date: NaiveDate,
    project: &str,
    duration: &str,
    start_time: Option<NaiveTime>,
    comment: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let duration = parse_duration(duration)?;
    if duration <= chrono::Duration::zero() {
        return Err(format!("duration '{}' must be positive", format_duration(duration)).into());
    }
    let standard_start = ctx.config.standard_start_time()?;

    let session = ctx.session()?;
    let project_id = if project.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(session.lookup_project(project)?.id)
    };

    let mut periods = session
        .my_calendar(date, date)?
        .into_iter()
        .find(|card| card.date == date)
        .map(|card| card.periods)
        .unwrap_or_default();

    let start = next_start(date, &periods, start_time, standard_start)?;
    let mut period = Period::new(start, start + duration);
    period.project_id = project_id;
    period.comment = comment;
    period.period_type = Some(PeriodType::Work);
    let line = period_line(&period, &BTreeMap::new());
    periods.push(period);

    let wire = session.set_day_periods(date, &periods)?;
    match ctx.output {
        OutputFormat::Json => print_json(&json!({ "date": date, "periods": wire }))?,
        OutputFormat::Pretty => println!("{date}: added {line}"),
    }
    Ok(())
}

/// Explicit start time, else the end of the last period, else the
/// configured standard start.
fn next_start(
    date: NaiveDate,
    periods: &[Period],
    start_time: Option<NaiveTime>,
    standard_start: Option<NaiveTime>,
) -> Result<DateTime<FixedOffset>, Box<dyn Error>> {
    if let Some(time) = start_time {
        return local_time(date, time);
    }
    if let Some(end) = periods.iter().map(|p| p.end).max() {
        return Ok(end);
    }
    match standard_start {
        Some(time) => local_time(date, time),
        None => Err(format!(
            "{date} has no periods yet; pass --start-time or set standard_start_time"
        )
        .into()),
    }
}

fn local_time(date: NaiveDate, time: NaiveTime) -> Result<DateTime<FixedOffset>, Box<dyn Error>> {
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|t| t.fixed_offset())
        .ok_or_else(|| format!("{date} {time} does not exist in the local time zone").into())
}
