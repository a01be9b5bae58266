#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;
use tune_history::aggregate;
use tune_history::bucket::Granularity;
use tune_history::history::History;
use tune_history::model::GroupMode;
use tune_history::normalize::parse_export;
use tune_history::timezone::ZoneResolver;

fuzz_target!(|data: &[u8]| {
    let mut resolver = ZoneResolver::new();
    let Ok(file) = parse_export(Path::new("StreamingHistory0.json"), data, &mut resolver) else {
        return;
    };
    let history = History::from_events(file.events);
    let Some(range) = history.bounds() else {
        return;
    };
    let events = history.in_range(range);
    let rows = aggregate::aggregate_rows(events, GroupMode::Artists);
    assert_eq!(
        rows.iter().map(|row| row.play_count).sum::<u64>(),
        events.len() as u64
    );
    let curve = aggregate::concentration_curve(events, GroupMode::Tracks);
    assert!(curve.windows(2).all(|pair| pair[0].share <= pair[1].share));
    for granularity in Granularity::ALL {
        let _ = aggregate::bucket_rows(events, granularity, range);
    }
});
