use crate::aggregate::{self, ConcentrationPoint, Summary};
use crate::bucket::Granularity;
use crate::cache::RangeCache;
use crate::config::Settings;
use crate::filter::{self, RowFilter, RowSort};
use crate::history::History;
use crate::model::{AggregateRow, BucketRow, DateRange, GroupMode, ListeningEvent};
use std::sync::Arc;
use time::{Date, Month, OffsetDateTime};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePeriod {
    All,
    Last12Months,
    LastMonth,
    /// Whole days, both ends inclusive.
    Custom { from: Date, to: Date },
}

impl TimePeriod {
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Last12Months => "Last 12 Months",
            Self::LastMonth => "Last Month",
            Self::Custom { .. } => "Custom",
        }
    }

    /// Resolves against the bounds of the loaded data.
    pub fn resolve(self, data: DateRange) -> DateRange {
        match self {
            Self::All => data,
            Self::Last12Months => DateRange::new(months_back(data.to, 12), data.to),
            Self::LastMonth => DateRange::new(months_back(data.to, 1), data.to),
            Self::Custom { from, to } => DateRange::new(
                from.midnight().assume_utc(),
                to.with_time(time::macros::time!(23:59:59.999)).assume_utc(),
            ),
        }
    }
}

/// Calendar months back, clamping the day to the target month's length.
pub fn months_back(at: OffsetDateTime, months: u32) -> OffsetDateTime {
    let index = i64::from(at.year()) * 12 + i64::from(u8::from(at.month())) - 1 - i64::from(months);
    let year = index.div_euclid(12) as i32;
    let Ok(month) = Month::try_from((index.rem_euclid(12) + 1) as u8) else {
        return at;
    };
    (1..=at.day())
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())
        .map(|date| at.replace_date(date))
        .unwrap_or(at)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeChange {
    /// Back to the full dataset; nothing needs recomputing.
    Immediate,
    /// The caller should show a pending state and apply on its next tick.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeTicket {
    pub generation: u64,
    pub range: DateRange,
    pub change: RangeChange,
}

/// Pull interface over one loaded history. Single-threaded: callers own the
/// engine and every query runs to completion on the calling thread.
#[derive(Debug)]
pub struct StatsEngine {
    history: History,
    active: Option<DateRange>,
    requested_generation: u64,
    committed_generation: u64,
    rows: RangeCache<Vec<AggregateRow>>,
    buckets: RangeCache<Vec<BucketRow>>,
    summaries: RangeCache<Summary>,
    curves: RangeCache<Vec<ConcentrationPoint>>,
}

impl StatsEngine {
    pub fn new(history: History, settings: &Settings) -> Self {
        let active = history.bounds();
        Self {
            history,
            active,
            requested_generation: 0,
            committed_generation: 0,
            rows: new_cache(settings),
            buckets: new_cache(settings),
            summaries: new_cache(settings),
            curves: new_cache(settings),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn data_bounds(&self) -> Option<DateRange> {
        self.history.bounds()
    }

    pub fn active_range(&self) -> Option<DateRange> {
        self.active
    }

    pub fn events_in(&self, range: DateRange) -> &[ListeningEvent] {
        self.history.in_range(range)
    }

    /// `None` when no events are loaded.
    pub fn request_period(&mut self, period: TimePeriod) -> Option<RangeTicket> {
        let bounds = self.data_bounds()?;
        let range = period.resolve(bounds);
        Some(self.request_range(range))
    }

    pub fn request_range(&mut self, range: DateRange) -> RangeTicket {
        self.requested_generation += 1;
        let change = if Some(range) == self.data_bounds() {
            RangeChange::Immediate
        } else {
            RangeChange::Deferred
        };
        RangeTicket {
            generation: self.requested_generation,
            range,
            change,
        }
    }

    pub fn is_calculating(&self) -> bool {
        self.requested_generation > self.committed_generation
    }

    /// Runs the summary for the ticket's range and makes it the active range,
    /// unless a newer ticket was already applied.
    pub fn apply(&mut self, ticket: RangeTicket) -> bool {
        if ticket.generation <= self.committed_generation {
            debug!(generation = ticket.generation, "superseded range change dropped");
            return false;
        }
        self.summary(ticket.range);
        self.active = Some(ticket.range);
        self.committed_generation = ticket.generation;
        true
    }

    /// Ranked rows for the range, then filtered and sorted. Ranking always
    /// covers every entity in the range, whatever the filter.
    pub fn aggregate_rows(
        &mut self,
        mode: GroupMode,
        range: DateRange,
        row_filter: &RowFilter,
        sort: RowSort,
    ) -> Vec<AggregateRow> {
        let events = self.history.in_range(range);
        if events.is_empty() {
            return Vec::new();
        }
        let ranked = self.rows.cached(
            |events| aggregate::aggregate_rows(events, mode),
            events,
            range,
            &[mode],
        );
        filter::select_rows(&ranked, mode, row_filter, sort)
    }

    /// Bucket rows for the range, or for one row's plays when drilling down.
    /// The drilled row must come from `aggregate_rows` in the given mode.
    pub fn bucket_rows(
        &mut self,
        granularity: Granularity,
        range: DateRange,
        drill: Option<(GroupMode, &AggregateRow)>,
    ) -> Arc<Vec<BucketRow>> {
        let (events, drill_key) = match drill {
            Some((mode, row)) => {
                let track = match mode {
                    GroupMode::Tracks => row.track_name.as_str(),
                    GroupMode::Artists => "",
                };
                (
                    row.source_events.as_slice(),
                    Some((mode, row.artist_name.as_str(), track)),
                )
            }
            None => (self.history.in_range(range), None),
        };
        self.buckets.cached(
            |events| aggregate::bucket_rows(events, granularity, range),
            events,
            range,
            &(granularity, drill_key),
        )
    }

    pub fn summary(&mut self, range: DateRange) -> Arc<Summary> {
        let events = self.history.in_range(range);
        self.summaries
            .cached(aggregate::summarize, events, range, &[] as &[u8])
    }

    /// Concentration curve over the active range.
    pub fn concentration_curve(&mut self, mode: GroupMode) -> Arc<Vec<ConcentrationPoint>> {
        let Some(range) = self.active else {
            return Arc::new(Vec::new());
        };
        let events = self.history.in_range(range);
        self.curves.cached(
            |events| aggregate::concentration_curve(events, mode),
            events,
            range,
            &[mode],
        )
    }

    pub fn variety_score(&mut self, mode: GroupMode) -> Option<f64> {
        aggregate::variety_score(&self.concentration_curve(mode))
    }
}

fn new_cache<T>(settings: &Settings) -> RangeCache<T> {
    RangeCache::new(settings.cache_capacity).with_fingerprint(settings.cache_fingerprint)
}
