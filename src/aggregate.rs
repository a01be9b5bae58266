use crate::bucket::{self, Granularity};
use crate::model::{AggregateRow, BucketRow, DateRange, GroupMode, ListeningEvent, round_minutes};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, Clone)]
pub struct Group<'a, K> {
    pub key: K,
    pub count: u64,
    pub sum_ms: u64,
    /// Members in input order; the first one is the display representative.
    pub members: Vec<&'a ListeningEvent>,
}

impl<K> Group<'_, K> {
    pub fn representative(&self) -> Option<&ListeningEvent> {
        self.members.first().copied()
    }
}

/// Groups in order of first encounter.
pub fn group_by<'a, K, F>(events: &'a [ListeningEvent], key_fn: F) -> Vec<Group<'a, K>>
where
    K: Eq + Hash + Clone,
    F: Fn(&'a ListeningEvent) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Group<'a, K>> = Vec::new();
    for event in events {
        let key = key_fn(event);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Group {
                key,
                count: 0,
                sum_ms: 0,
                members: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.count += 1;
        group.sum_ms = group.sum_ms.saturating_add(event.ms_played);
        group.members.push(event);
    }
    groups
}

/// Play count descending, then listening time descending. The sort is
/// stable, so full ties keep encounter order.
pub fn rank_groups<K>(groups: &mut [Group<'_, K>]) {
    groups.sort_by(|a, b| b.count.cmp(&a.count).then(b.sum_ms.cmp(&a.sum_ms)));
}

pub fn entity_key(mode: GroupMode, event: &ListeningEvent) -> (&str, &str) {
    match mode {
        GroupMode::Tracks => (event.artist_name.as_str(), event.track_name.as_str()),
        GroupMode::Artists => (event.artist_name.as_str(), ""),
    }
}

pub fn ranked_groups(events: &[ListeningEvent], mode: GroupMode) -> Vec<Group<'_, (&str, &str)>> {
    let mut groups = group_by(events, |event| entity_key(mode, event));
    rank_groups(&mut groups);
    groups
}

pub fn aggregate_rows(events: &[ListeningEvent], mode: GroupMode) -> Vec<AggregateRow> {
    ranked_groups(events, mode)
        .into_iter()
        .enumerate()
        .filter_map(|(position, group)| {
            let first = group.representative()?;
            Some(AggregateRow {
                rank: position + 1,
                primary_key: mode.primary_key(first),
                track_name: first.track_name.clone(),
                artist_name: first.artist_name.clone(),
                play_count: group.count,
                total_ms: group.sum_ms,
                source_events: group.members.iter().copied().cloned().collect(),
            })
        })
        .collect()
}

/// Bucket rows covering the whole range, one per bucket, with empty
/// placeholders where nothing was played. No events means no rows.
pub fn bucket_rows(
    events: &[ListeningEvent],
    granularity: Granularity,
    range: DateRange,
) -> Vec<BucketRow> {
    if range.is_empty() || events.is_empty() {
        return Vec::new();
    }
    let real: Vec<BucketRow> = group_by(events, |event| granularity.key(event.local_time))
        .into_iter()
        .map(|group| BucketRow {
            bucket_key: group.key,
            total_minutes: round_minutes(group.sum_ms),
            play_count: group.count,
            top_track: most_played(&group.members, |event| event.track_name.as_str()),
            top_artist: most_played(&group.members, |event| event.artist_name.as_str()),
        })
        .collect();

    // local keys can sit a few hours outside the UTC range, so widen to them
    let since = events
        .iter()
        .map(|event| wall_clock(event.local_time))
        .fold(range.since, OffsetDateTime::min);
    let to = events
        .iter()
        .map(|event| wall_clock(event.local_time))
        .fold(range.to, OffsetDateTime::max);
    bucket::fill_gaps(real, &granularity.enumerate(wall_clock(since), wall_clock(to)))
}

fn wall_clock(at: OffsetDateTime) -> OffsetDateTime {
    at.replace_offset(UtcOffset::UTC)
}

fn most_played<'a, F>(members: &[&'a ListeningEvent], key_fn: F) -> String
where
    F: Fn(&'a ListeningEvent) -> &'a str,
{
    let mut counts: Vec<(&str, u64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for event in members {
        let key = key_fn(*event);
        match index.get(key) {
            Some(slot) => counts[*slot].1 += 1,
            None => {
                index.insert(key, counts.len());
                counts.push((key, 1));
            }
        }
    }
    let mut best: Option<(&str, u64)> = None;
    for (key, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_minutes: u64,
    pub total_play_count: u64,
    pub distinct_tracks: usize,
    pub distinct_artists: usize,
    pub top_tracks_share_percent: f64,
    pub top_artists_share_percent: f64,
    pub equivalents: Equivalents,
}

impl Summary {
    pub fn duration_text(&self) -> String {
        let minutes = self.total_minutes;
        format!(
            "{} days, {} hours and {} minutes",
            minutes / 1440,
            minutes / 60 % 24,
            minutes % 60
        )
    }
}

/// Total listening time restated in other units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Equivalents {
    pub abbey_road_plays: f64,
    pub lotr_trilogy_viewings: f64,
    pub light_travel_km: f64,
    pub babies_born: f64,
    pub awake_year_percent: f64,
}

impl Equivalents {
    pub fn from_minutes(minutes: f64) -> Self {
        Self {
            abbey_road_plays: round_to(minutes / 47.0, 1),
            lotr_trilogy_viewings: round_to(minutes / 725.0, 1),
            light_travel_km: round_to(minutes * 17_987_547.48, 0),
            babies_born: round_to(minutes * 250.0, 0),
            awake_year_percent: round_to(minutes / 3504.0, 2),
        }
    }
}

pub const SUMMARY_TOP_PERCENT: u64 = 10;

pub fn summarize(events: &[ListeningEvent]) -> Summary {
    let total_ms = events
        .iter()
        .fold(0_u64, |total, event| total.saturating_add(event.ms_played));
    let tracks = ranked_groups(events, GroupMode::Tracks);
    let artists = ranked_groups(events, GroupMode::Artists);
    Summary {
        total_minutes: round_minutes(total_ms),
        total_play_count: events.len() as u64,
        distinct_tracks: tracks.len(),
        distinct_artists: artists.len(),
        top_tracks_share_percent: top_share_percent(&tracks, events.len(), SUMMARY_TOP_PERCENT),
        top_artists_share_percent: top_share_percent(&artists, events.len(), SUMMARY_TOP_PERCENT),
        equivalents: Equivalents::from_minutes(total_ms as f64 / 60_000.0),
    }
}

/// Share of all plays held by the top `percent` of ranked entities, as a
/// percentage with one decimal.
pub fn top_share_percent<K>(ranked: &[Group<'_, K>], total: usize, percent: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let take = (ranked.len() as u64 * percent + 50) / 100;
    let plays: u64 = ranked.iter().take(take as usize).map(|group| group.count).sum();
    round_to(plays as f64 / total as f64 * 100.0, 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConcentrationPoint {
    /// Percent of distinct entities, 0..=100.
    pub x: u32,
    pub cumulative_plays: u64,
    /// Percent of all plays, two decimals.
    pub share: f64,
}

/// Point `x` holds the plays of the top `ceil(x * D / 100)` entities, so the
/// curve runs from `(0, 0)` to `(100, total)`. Empty input gives no points.
pub fn concentration_curve(events: &[ListeningEvent], mode: GroupMode) -> Vec<ConcentrationPoint> {
    let counts: Vec<u64> = ranked_groups(events, mode)
        .iter()
        .map(|group| group.count)
        .collect();
    if counts.is_empty() {
        return Vec::new();
    }
    let distinct = counts.len() as u64;
    let total = events.len() as f64;
    let mut prefix = Vec::with_capacity(counts.len() + 1);
    prefix.push(0_u64);
    for count in &counts {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + count);
    }

    (0..=100_u32)
        .map(|x| {
            let take = (u64::from(x) * distinct).div_ceil(100) as usize;
            let cumulative_plays = prefix[take];
            ConcentrationPoint {
                x,
                cumulative_plays,
                share: js_round(cumulative_plays as f64 / total * 10_000.0) / 100.0,
            }
        })
        .collect()
}

/// 100 for a perfectly even spread, close to 0 when one entity has every play.
pub fn variety_score(points: &[ConcentrationPoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let excess: f64 = points
        .iter()
        .map(|point| point.share - f64::from(point.x))
        .sum();
    Some(round_to((5000.0 - excess) / 50.0, 2))
}

/// Half-up rounding to `precision` decimals, matching the published figures.
pub fn round_to(value: f64, precision: i32) -> f64 {
    let scale = 10_f64.powi(precision);
    js_round(value * scale) / scale
}

fn js_round(value: f64) -> f64 {
    (value + 0.5).floor()
}
