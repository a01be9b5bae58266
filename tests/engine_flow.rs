use std::fs;
use std::path::Path;
use tempfile::tempdir;
use time::macros::datetime;
use tune_history::aggregate;
use tune_history::bucket::Granularity;
use tune_history::cache::RangeCache;
use tune_history::config::Settings;
use tune_history::engine::{StatsEngine, TimePeriod};
use tune_history::export::{self, ExportFormat};
use tune_history::filter::{RowFilter, RowSort};
use tune_history::history::load_paths;
use tune_history::model::{AggregateRow, DateRange, GroupMode, ListeningEvent};
use tune_history::timezone::ZoneResolver;

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("write export");
}

#[test]
fn duplicate_play_is_dropped_and_artists_rank_by_time() {
    let dir = tempdir().expect("tempdir");
    write(
        dir.path(),
        "StreamingHistory0.json",
        r#"[
            {"endTime": "2024-01-10 08:00", "artistName": "A", "trackName": "a", "msPlayed": 180000},
            {"endTime": "2024-01-10 08:00", "artistName": "A", "trackName": "a", "msPlayed": 180000},
            {"endTime": "2024-01-11 09:30", "artistName": "B", "trackName": "b", "msPlayed": 60000}
        ]"#,
    );

    let report = load_paths(&[dir.path().to_path_buf()], &mut ZoneResolver::new());
    assert_eq!(report.history.len(), 2);
    assert_eq!(report.duplicates, 1);

    let mut engine = StatsEngine::new(report.history, &Settings::default());
    let range = engine.data_bounds().expect("data");
    let rows = engine.aggregate_rows(
        GroupMode::Artists,
        range,
        &RowFilter::default(),
        RowSort::default(),
    );
    let ranked: Vec<(usize, &str, u64, u64)> = rows
        .iter()
        .map(|row| (row.rank, row.artist_name.as_str(), row.play_count, row.total_ms))
        .collect();
    assert_eq!(ranked, vec![(1, "A", 1, 180_000), (2, "B", 1, 60_000)]);
}

#[test]
fn legacy_and_extended_files_load_together() {
    let dir = tempdir().expect("tempdir");
    write(
        dir.path(),
        "StreamingHistory0.json",
        r#"[{"endTime": "2023-12-31 22:15", "artistName": "Neon", "trackName": "Drive", "msPlayed": 240000}]"#,
    );
    let nested = dir.path().join("extended");
    fs::create_dir(&nested).expect("mkdir");
    write(
        &nested,
        "Streaming_History_Audio_2024.json",
        r#"[
            {"ts": "2024-02-01T12:00:00Z", "ms_played": 120000,
             "master_metadata_track_name": "Drive", "master_metadata_album_artist_name": "Neon",
             "conn_country": "PL"},
            {"ts": "2024-02-01T13:00:00Z", "ms_played": 1800000,
             "master_metadata_track_name": null, "master_metadata_album_artist_name": null,
             "conn_country": "PL"},
            {"ts": "2024-02-02T13:00:00Z", "master_metadata_track_name": "Broken"}
        ]"#,
    );
    write(dir.path(), "notes.json", "[]");
    write(dir.path(), "StreamingHistory1.json", "{ not json");

    let report = load_paths(&[dir.path().to_path_buf()], &mut ZoneResolver::new());
    assert_eq!(report.loaded_files.len(), 2);
    assert_eq!(report.file_errors.len(), 1);
    assert_eq!(report.non_music, 1);
    assert_eq!(report.skipped_records(), 1);
    assert_eq!(report.history.len(), 2);

    let extended = &report.history.events()[1];
    assert_eq!(extended.timestamp, datetime!(2024-02-01 12:00 UTC));
    assert_eq!(extended.display_time(), "2024-02-01 13:00");

    let mut engine = StatsEngine::new(report.history, &Settings::default());
    let range = engine.data_bounds().expect("data");
    let rows = engine.aggregate_rows(
        GroupMode::Tracks,
        range,
        &RowFilter::default(),
        RowSort::default(),
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].primary_key, "Neon - Drive");
    assert_eq!(rows[0].play_count, 2);
    assert_eq!(rows[0].total_minutes(), 6);

    let summary = engine.summary(range);
    assert_eq!(summary.total_minutes, 6);
    assert_eq!(summary.distinct_tracks, 1);
    assert_eq!(summary.distinct_artists, 1);
}

#[test]
fn month_buckets_cover_the_whole_range() {
    let events = vec![
        ListeningEvent::utc("a", "A", datetime!(2024-01-05 10:00 UTC), 60_000),
        ListeningEvent::utc("b", "B", datetime!(2024-03-10 10:00 UTC), 120_000),
    ];
    let range = DateRange::new(datetime!(2024-01-01 0:00 UTC), datetime!(2024-03-15 0:00 UTC));
    let rows = aggregate::bucket_rows(&events, Granularity::Month, range);

    let keys: Vec<i64> = rows.iter().map(|row| row.bucket_key).collect();
    assert_eq!(keys, vec![202401, 202402, 202403]);
    assert_eq!(rows[1].play_count, 0);
    assert_eq!(rows[2].total_minutes, 2);
    assert_eq!(rows[2].top_artist, "B");
}

#[test]
fn equal_length_inputs_share_a_cached_result() {
    let range = DateRange::new(datetime!(2024-01-01 0:00 UTC), datetime!(2024-02-01 0:00 UTC));
    let first = vec![ListeningEvent::utc("a", "A", datetime!(2024-01-02 8:00 UTC), 60_000)];
    let second = vec![ListeningEvent::utc("z", "Z", datetime!(2024-01-03 8:00 UTC), 90_000)];

    let mut cache: RangeCache<Vec<AggregateRow>> = RangeCache::new(10);
    let compute = |events: &[ListeningEvent]| aggregate::aggregate_rows(events, GroupMode::Artists);
    let fresh = cache.cached(compute, &first, range, &[GroupMode::Artists]);
    let stale = cache.cached(compute, &second, range, &[GroupMode::Artists]);
    assert_eq!(stale[0].artist_name, "A");
    assert_eq!(fresh, stale);
    assert_eq!(cache.hits(), 1);

    let mut strict: RangeCache<Vec<AggregateRow>> = RangeCache::new(10).with_fingerprint(true);
    strict.cached(compute, &first, range, &[GroupMode::Artists]);
    let recomputed = strict.cached(compute, &second, range, &[GroupMode::Artists]);
    assert_eq!(recomputed[0].artist_name, "Z");
}

#[test]
fn period_change_then_csv_export() {
    let dir = tempdir().expect("tempdir");
    write(
        dir.path(),
        "StreamingHistory0.json",
        r#"[
            {"endTime": "2022-06-01 10:00", "artistName": "Old", "trackName": "Tune", "msPlayed": 300000},
            {"endTime": "2024-05-20 10:00", "artistName": "New", "trackName": "Song", "msPlayed": 90000},
            {"endTime": "2024-06-01 10:00", "artistName": "New", "trackName": "Song", "msPlayed": 90000}
        ]"#,
    );
    let report = load_paths(&[dir.path().to_path_buf()], &mut ZoneResolver::new());
    let mut engine = StatsEngine::new(report.history, &Settings::default());

    let ticket = engine.request_period(TimePeriod::LastMonth).expect("data");
    assert!(engine.is_calculating());
    assert!(engine.apply(ticket));
    let range = engine.active_range().expect("active");

    let rows = engine.aggregate_rows(
        GroupMode::Tracks,
        range,
        &RowFilter::default(),
        RowSort::default(),
    );
    let mut out = Vec::new();
    export::write_rows(&mut out, &rows, GroupMode::Tracks, ExportFormat::Csv).expect("csv");
    assert_eq!(
        String::from_utf8(out).expect("utf8"),
        "#,Artist Name,Track Name,Play Count,Listening Time (minutes)\n1,New,Song,2,3\n"
    );
}
