use crate::model::{AggregateRow, GroupMode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Rank,
    Artist,
    Track,
    Plays,
    Minutes,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Self::Rank,
        Self::Artist,
        Self::Track,
        Self::Plays,
        Self::Minutes,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Rank => "rank",
            Self::Artist => "artistName",
            Self::Track => "trackName",
            Self::Plays => "playCount",
            Self::Minutes => "totalMinutes",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Self::Rank => "#",
            Self::Artist => "Artist Name",
            Self::Track => "Track Name",
            Self::Plays => "Play Count",
            Self::Minutes => "Listening Time (minutes)",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rank" => Some(Self::Rank),
            "artist" => Some(Self::Artist),
            "track" => Some(Self::Track),
            "plays" => Some(Self::Plays),
            "minutes" | "time" => Some(Self::Minutes),
            _ => None,
        }
    }

    pub fn visible_in(self, mode: GroupMode) -> bool {
        !(self == Self::Track && mode == GroupMode::Artists)
    }

    pub fn cell(self, row: &AggregateRow) -> String {
        match self {
            Self::Rank => row.rank.to_string(),
            Self::Artist => row.artist_name.clone(),
            Self::Track => row.track_name.clone(),
            Self::Plays => row.play_count.to_string(),
            Self::Minutes => row.total_minutes().to_string(),
        }
    }

    /// Ascending order for this column.
    pub fn compare(self, a: &AggregateRow, b: &AggregateRow) -> Ordering {
        match self {
            Self::Rank => a.rank.cmp(&b.rank),
            Self::Artist => compare_text(&a.artist_name, &b.artist_name),
            Self::Track => compare_text(&a.track_name, &b.track_name),
            Self::Plays => a.play_count.cmp(&b.play_count),
            Self::Minutes => a.total_ms.cmp(&b.total_ms),
        }
    }
}

/// Visible columns for a group mode, in display and export order.
pub fn columns(mode: GroupMode) -> Vec<Column> {
    Column::ALL
        .into_iter()
        .filter(|column| column.visible_in(mode))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Inclusive bounds; a missing bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NumericRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl NumericRange {
    pub fn contains(&self, value: u64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct RowFilter {
    pub search: String,
    pub plays: NumericRange,
    pub minutes: NumericRange,
}

impl RowFilter {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.plays == NumericRange::default()
            && self.minutes == NumericRange::default()
    }

    pub fn matches(&self, row: &AggregateRow, mode: GroupMode) -> bool {
        self.matches_search(row, mode)
            && self.plays.contains(row.play_count)
            && self.minutes.contains(row.total_minutes())
    }

    fn matches_search(&self, row: &AggregateRow, mode: GroupMode) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        row.artist_name.to_lowercase().contains(&needle)
            || (mode == GroupMode::Tracks && row.track_name.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RowSort {
    pub column: Option<Column>,
    pub direction: SortDirection,
}

/// Filters ranked rows, then sorts them. Ranks are left as assigned by the
/// ranking pass; equal sort keys fall back to rank order.
pub fn select_rows(
    ranked: &[AggregateRow],
    mode: GroupMode,
    filter: &RowFilter,
    sort: RowSort,
) -> Vec<AggregateRow> {
    let mut rows: Vec<AggregateRow> = if filter.is_empty() {
        ranked.to_vec()
    } else {
        ranked
            .iter()
            .filter(|row| filter.matches(row, mode))
            .cloned()
            .collect()
    };
    if let Some(column) = sort.column {
        rows.sort_by(|a, b| {
            sort.direction
                .apply(column.compare(a, b))
                .then(a.rank.cmp(&b.rank))
        });
    }
    rows
}

pub fn paginate<T>(rows: &[T], page: usize, page_size: usize) -> &[T] {
    if page_size == 0 {
        return rows;
    }
    let start = page.saturating_mul(page_size).min(rows.len());
    let end = start.saturating_add(page_size).min(rows.len());
    &rows[start..end]
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    len.div_ceil(page_size).max(1)
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(rank: usize, artist: &str, track: &str, plays: u64, minutes: u64) -> AggregateRow {
        AggregateRow {
            rank,
            primary_key: format!("{artist} - {track}"),
            track_name: track.to_string(),
            artist_name: artist.to_string(),
            play_count: plays,
            total_ms: minutes * 60_000,
            source_events: Vec::new(),
        }
    }

    fn ranked() -> Vec<AggregateRow> {
        vec![
            row(1, "Neon", "Night Drive", 12, 40),
            row(2, "Blue", "Ocean Room", 9, 55),
            row(3, "Björk", "Joga", 9, 30),
            row(4, "neon", "Skyline", 2, 8),
        ]
    }

    #[test]
    fn artist_mode_hides_track_column() {
        assert_eq!(
            columns(GroupMode::Artists),
            vec![Column::Rank, Column::Artist, Column::Plays, Column::Minutes]
        );
        assert_eq!(columns(GroupMode::Tracks).len(), 5);
    }

    #[test]
    fn blank_filter_passes_every_row() {
        let blank = RowFilter {
            search: String::from("   "),
            ..RowFilter::default()
        };
        assert!(blank.is_empty());
        assert_eq!(
            select_rows(&ranked(), GroupMode::Tracks, &blank, RowSort::default()),
            ranked()
        );

        let bounded = RowFilter {
            plays: NumericRange {
                min: Some(1),
                max: None,
            },
            ..RowFilter::default()
        };
        assert!(!bounded.is_empty());
    }

    #[test]
    fn search_is_case_insensitive_and_respects_mode() {
        let filter = RowFilter {
            search: String::from("NEON"),
            ..RowFilter::default()
        };
        let rows = select_rows(&ranked(), GroupMode::Tracks, &filter, RowSort::default());
        assert_eq!(rows.len(), 2);

        let filter = RowFilter {
            search: String::from("ocean"),
            ..RowFilter::default()
        };
        assert_eq!(
            select_rows(&ranked(), GroupMode::Tracks, &filter, RowSort::default()).len(),
            1
        );
        assert!(select_rows(&ranked(), GroupMode::Artists, &filter, RowSort::default()).is_empty());

        let filter = RowFilter {
            search: String::from("BJÖ"),
            ..RowFilter::default()
        };
        assert_eq!(
            select_rows(&ranked(), GroupMode::Tracks, &filter, RowSort::default())[0].rank,
            3
        );
    }

    #[test]
    fn numeric_ranges_are_inclusive_and_conjunctive() {
        let filter = RowFilter {
            search: String::new(),
            plays: NumericRange {
                min: Some(9),
                max: None,
            },
            minutes: NumericRange {
                min: None,
                max: Some(40),
            },
        };
        let ranks: Vec<usize> = select_rows(&ranked(), GroupMode::Tracks, &filter, RowSort::default())
            .iter()
            .map(|row| row.rank)
            .collect();
        assert_eq!(ranks, vec![1, 3]);
    }

    #[test]
    fn filtering_keeps_assigned_ranks() {
        let filter = RowFilter {
            search: String::from("blue"),
            ..RowFilter::default()
        };
        let rows = select_rows(&ranked(), GroupMode::Tracks, &filter, RowSort::default());
        assert_eq!(rows[0].rank, 2);
    }

    #[test]
    fn column_sort_falls_back_to_rank() {
        let sort = RowSort {
            column: Some(Column::Plays),
            direction: SortDirection::Descending,
        };
        let ranks: Vec<usize> = select_rows(&ranked(), GroupMode::Tracks, &RowFilter::default(), sort)
            .iter()
            .map(|row| row.rank)
            .collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);

        let sort = RowSort {
            column: Some(Column::Artist),
            direction: SortDirection::Ascending,
        };
        let artists: Vec<String> = select_rows(&ranked(), GroupMode::Tracks, &RowFilter::default(), sort)
            .into_iter()
            .map(|row| row.artist_name)
            .collect();
        assert_eq!(artists, vec!["Björk", "Blue", "Neon", "neon"]);
    }

    #[test]
    fn pages_are_clamped() {
        let rows: Vec<u32> = (0..45).collect();
        assert_eq!(paginate(&rows, 0, 20).len(), 20);
        assert_eq!(paginate(&rows, 2, 20), &rows[40..45]);
        assert!(paginate(&rows, 7, 20).is_empty());
        assert_eq!(page_count(rows.len(), 20), 3);
        assert_eq!(page_count(0, 20), 1);
    }
}
