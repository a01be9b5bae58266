use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

pub const MS_PER_MINUTE: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListeningEvent {
    pub track_name: String,
    pub artist_name: String,
    /// Absolute instant of the play, always UTC.
    pub timestamp: OffsetDateTime,
    /// Same instant in the listener's offset. Bucket keys are read from this.
    pub local_time: OffsetDateTime,
    pub ms_played: u64,
}

impl ListeningEvent {
    pub fn utc(
        track_name: impl Into<String>,
        artist_name: impl Into<String>,
        timestamp: OffsetDateTime,
        ms_played: u64,
    ) -> Self {
        let timestamp = timestamp.to_offset(time::UtcOffset::UTC);
        Self {
            track_name: track_name.into(),
            artist_name: artist_name.into(),
            timestamp,
            local_time: timestamp,
            ms_played,
        }
    }

    pub fn display_time(&self) -> String {
        self.local_time
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]"
            ))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLegacyRecord {
    pub end_time: String,
    pub artist_name: String,
    pub track_name: String,
    pub ms_played: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawExtendedRecord {
    pub ts: String,
    pub ms_played: u64,
    pub master_metadata_track_name: Option<String>,
    pub master_metadata_album_artist_name: Option<String>,
    #[serde(default)]
    pub conn_country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    #[default]
    Tracks,
    Artists,
}

impl GroupMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Tracks => "Favourite tracks",
            Self::Artists => "Favourite artists",
        }
    }

    pub fn primary_key(self, event: &ListeningEvent) -> String {
        match self {
            Self::Tracks => format!("{} - {}", event.artist_name, event.track_name),
            Self::Artists => event.artist_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub rank: usize,
    pub primary_key: String,
    pub track_name: String,
    pub artist_name: String,
    pub play_count: u64,
    pub total_ms: u64,
    pub source_events: Vec<ListeningEvent>,
}

impl AggregateRow {
    pub fn total_minutes(&self) -> u64 {
        round_minutes(self.total_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketRow {
    pub bucket_key: i64,
    pub total_minutes: u64,
    pub play_count: u64,
    pub top_track: String,
    pub top_artist: String,
}

impl BucketRow {
    pub fn empty(bucket_key: i64) -> Self {
        Self {
            bucket_key,
            total_minutes: 0,
            play_count: 0,
            top_track: String::new(),
            top_artist: String::new(),
        }
    }
}

/// Inclusive range of absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub since: OffsetDateTime,
    pub to: OffsetDateTime,
}

impl DateRange {
    pub fn new(since: OffsetDateTime, to: OffsetDateTime) -> Self {
        Self { since, to }
    }

    pub fn checked(
        since: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Self, crate::error::EmptyRangeError> {
        if since > to {
            return Err(crate::error::EmptyRangeError { since, to });
        }
        Ok(Self { since, to })
    }

    pub fn is_empty(&self) -> bool {
        self.since > self.to
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.since <= instant && instant <= self.to
    }
}

/// Rounds half up, like the published minute totals.
pub fn round_minutes(ms: u64) -> u64 {
    ms / MS_PER_MINUTE + u64::from(ms % MS_PER_MINUTE >= MS_PER_MINUTE / 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn minutes_round_half_up() {
        assert_eq!(round_minutes(29_999), 0);
        assert_eq!(round_minutes(30_000), 1);
        assert_eq!(round_minutes(180_000), 3);
        assert_eq!(round_minutes(u64::MAX), u64::MAX / MS_PER_MINUTE + 1);
    }

    #[test]
    fn display_time_uses_wall_clock() {
        let mut event = ListeningEvent::utc("Song", "Band", datetime!(2024-03-01 22:30 UTC), 1);
        event.local_time = event.timestamp.to_offset(time::macros::offset!(+1));
        assert_eq!(event.display_time(), "2024-03-01 23:30");
    }

    #[test]
    fn inverted_range_is_rejected() {
        let since = datetime!(2024-02-01 0:00 UTC);
        let to = datetime!(2024-01-01 0:00 UTC);
        assert!(DateRange::checked(since, to).is_err());
        assert!(DateRange::new(since, to).is_empty());
    }
}
