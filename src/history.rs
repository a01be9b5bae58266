use crate::error::{ParseError, SchemaError, UnmappedTimezoneWarning};
use crate::model::{DateRange, ListeningEvent};
use crate::normalize;
use crate::timezone::ZoneResolver;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const EXPORT_PREFIXES: &[&str] = &["StreamingHistory", "Streaming_History_Audio"];

/// Canonical, deduplicated and chronologically ordered events.
#[derive(Debug, Clone, Default)]
pub struct History {
    events: Vec<ListeningEvent>,
}

impl History {
    pub fn from_events(mut events: Vec<ListeningEvent>) -> Self {
        // stable: equal timestamps keep input order, so the first copy survives
        events.sort_by_key(|event| event.timestamp);
        let before = events.len();
        let mut seen: HashSet<(OffsetDateTime, String)> = HashSet::with_capacity(events.len());
        events.retain(|event| seen.insert((event.timestamp, event.track_name.clone())));
        if before != events.len() {
            debug!(removed = before - events.len(), "dropped duplicate plays");
        }
        Self { events }
    }

    pub fn events(&self) -> &[ListeningEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn data_since(&self) -> Option<OffsetDateTime> {
        self.events.first().map(|event| event.timestamp)
    }

    pub fn data_to(&self) -> Option<OffsetDateTime> {
        self.events.last().map(|event| event.timestamp)
    }

    pub fn bounds(&self) -> Option<DateRange> {
        Some(DateRange::new(self.data_since()?, self.data_to()?))
    }

    /// Events whose absolute timestamp lies in the inclusive range.
    pub fn in_range(&self, range: DateRange) -> &[ListeningEvent] {
        if range.is_empty() {
            return &[];
        }
        let start = self
            .events
            .partition_point(|event| event.timestamp < range.since);
        let end = self
            .events
            .partition_point(|event| event.timestamp <= range.to);
        &self.events[start..end.max(start)]
    }
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub history: History,
    pub loaded_files: Vec<PathBuf>,
    pub ignored_files: Vec<PathBuf>,
    pub file_errors: Vec<ParseError>,
    pub schema_errors: Vec<(PathBuf, SchemaError)>,
    pub timezone_warnings: Vec<UnmappedTimezoneWarning>,
    pub non_music: usize,
    pub duplicates: usize,
}

impl LoadReport {
    pub fn skipped_records(&self) -> usize {
        self.schema_errors.len()
    }
}

pub fn is_export_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    is_json && EXPORT_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Expands directories into the export files they contain, sorted by path.
pub fn discover(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut accepted = Vec::new();
    let mut ignored = Vec::new();
    for root in paths {
        if root.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| is_export_file(path))
                .collect();
            found.sort();
            accepted.extend(found);
        } else if is_export_file(root) {
            accepted.push(root.clone());
        } else {
            warn!(file = %root.display(), "not a streaming history export, ignoring");
            ignored.push(root.clone());
        }
    }
    (accepted, ignored)
}

pub fn load_paths(paths: &[PathBuf], resolver: &mut ZoneResolver) -> LoadReport {
    let (files, ignored_files) = discover(paths);
    let mut report = LoadReport {
        ignored_files,
        ..LoadReport::default()
    };
    let mut events = Vec::new();

    for path in files {
        let parsed = fs::read(&path)
            .map_err(|source| ParseError::Io {
                path: path.clone(),
                source,
            })
            .and_then(|bytes| normalize::parse_export(&path, &bytes, resolver));
        match parsed {
            Ok(file) => {
                events.extend(file.events);
                report.non_music += file.non_music;
                report.schema_errors.extend(
                    file.schema_errors
                        .into_iter()
                        .map(|err| (path.clone(), err)),
                );
                report.loaded_files.push(path);
            }
            Err(err) => {
                warn!(%err, "rejected export file");
                report.file_errors.push(err);
            }
        }
    }

    let total = events.len();
    report.history = History::from_events(events);
    report.duplicates = total - report.history.len();
    report.timezone_warnings = resolver.warnings();
    info!(
        files = report.loaded_files.len(),
        events = report.history.len(),
        duplicates = report.duplicates,
        "listening history loaded"
    );
    report
}
