use std::collections::BTreeMap;
use std::error::Error;

use punchcard_core::duration::format_duration;
use punchcard_core::{Period, Timecard};
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One line per day, one indented line per period.
pub fn print_timecards(timecards: &[Timecard], project_names: &BTreeMap<u64, String>) {
    for card in timecards {
        let mut line = format!("{}  {:<10}", card.date.format("%a %Y-%m-%d"), card.state);
        if card.is_off_day {
            line.push_str("  off");
        }
        if !card.periods.is_empty() {
            line.push_str(&format!("  {}", format_duration(card.worked())));
        }
        if let Some(time_off) = &card.time_off {
            for item in &time_off.items {
                line.push_str(&format!("  [{}]", item.name));
            }
        }
        println!("{}", line.trim_end());
        for period in &card.periods {
            println!("    {}", period_line(period, project_names));
        }
    }
}

pub fn period_line(period: &Period, project_names: &BTreeMap<u64, String>) -> String {
    let mut line = format!(
        "{}-{}  {:<5}",
        period.start.format("%H:%M"),
        period.end.format("%H:%M"),
        period.kind().to_string()
    );
    if let Some(id) = period.project_id {
        match project_names.get(&id) {
            Some(name) => line.push_str(&format!("  {name}")),
            None => line.push_str(&format!("  #{id}")),
        }
    }
    if let Some(comment) = period.comment.as_deref().filter(|c| !c.is_empty()) {
        line.push_str(&format!("  \"{comment}\""));
    }
    line
}
