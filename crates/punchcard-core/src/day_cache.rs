//! Day-identifier cache.
//!
//! The remote attendance API addresses each calendar day by a UUID that the
//! client has to supply when the day does not exist remotely yet. The cache
//! remembers, per date, either the known remote identifier or the fact that
//! there is none, so each month is queried at most once per process.
//!
//! # Lifecycle
//!
//! ```text
//! missing ──prefetch──▶ Some(remote id)
//!    │                  None ──mint──▶ Some(fresh v4)
//! ```
//!
//! A present entry is never re-queried. `Some` is never overwritten.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{Datelike, Days, NaiveDate};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::Result;

/// A day the remote side already knows, as reported by a calendar read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownDay {
    pub date: NaiveDate,
    pub day_id: Uuid,
}

/// Date → day identifier, safe to share between threads.
#[derive(Debug, Default)]
pub struct DayIdCache {
    days: Mutex<BTreeMap<NaiveDate, Option<Uuid>>>,
}

impl DayIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the date was never looked up, `Some(None)` when it is
    /// confirmed to have no remote identifier.
    pub fn get(&self, date: NaiveDate) -> Option<Option<Uuid>> {
        self.lock().get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Record a calendar read covering `start..=end`.
    pub fn record_range(&self, known: &[KnownDay], start: NaiveDate, end: NaiveDate) {
        record(&mut self.lock(), known, start, end);
    }

    /// Identifier for `date`, prefetching its month on a miss and minting a
    /// fresh one when the remote side has none.
    ///
    /// `fetch(month_start, month_end)` must not touch this cache. The lock
    /// is held across the whole sequence, so concurrent callers for the same
    /// date all observe the first resolution.
    ///
    /// # Errors
    ///
    /// Propagates the fetch error; the cache is left as it was.
    pub fn get_or_create<F>(&self, date: NaiveDate, fetch: F) -> Result<Uuid>
    where
        F: FnOnce(NaiveDate, NaiveDate) -> Result<Vec<KnownDay>>,
    {
        let mut days = self.lock();

        if let Some(Some(id)) = days.get(&date) {
            return Ok(*id);
        }

        if !days.contains_key(&date) {
            let (start, end) = month_bounds(date);
            debug!(%date, %start, %end, "day id unknown, prefetching month");
            let known = fetch(start, end)?;
            record(&mut days, &known, start, end);
        }

        let slot = days.entry(date).or_insert(None);
        if let Some(id) = *slot {
            return Ok(id);
        }
        let id = Uuid::new_v4();
        trace!(%date, %id, "minted day id");
        *slot = Some(id);
        Ok(id)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<NaiveDate, Option<Uuid>>> {
        self.days.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn record(
    days: &mut BTreeMap<NaiveDate, Option<Uuid>>,
    known: &[KnownDay],
    start: NaiveDate,
    end: NaiveDate,
) {
    for day in known {
        match days.entry(day.date) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_none() {
                    entry.insert(Some(day.day_id));
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Some(day.day_id));
            }
        }
    }
    for date in start.iter_days().take_while(|d| *d <= end) {
        days.entry(date).or_insert(None);
    }
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let next_month = start
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    let end = next_month.checked_sub_days(Days::new(1)).unwrap_or(date);
    (start, end)
}
