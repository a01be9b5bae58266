use crate::error::{ParseError, SchemaError};
use crate::model::{ListeningEvent, RawExtendedRecord, RawLegacyRecord};
use crate::timezone::ZoneResolver;
use serde_json::{Map, Value};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::debug;

const EXTENDED_FIELDS: [&str; 3] = ["ts", "ms_played", "master_metadata_track_name"];

#[derive(Debug, Default)]
pub struct NormalizedFile {
    pub events: Vec<ListeningEvent>,
    pub schema_errors: Vec<SchemaError>,
    /// Podcasts, ads and other entries without track or artist metadata.
    pub non_music: usize,
}

pub fn parse_export(
    path: &Path,
    bytes: &[u8],
    resolver: &mut ZoneResolver,
) -> Result<NormalizedFile, ParseError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|source| ParseError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Array(records) = value else {
        return Err(ParseError::Shape {
            path: path.to_path_buf(),
        });
    };

    let mut out = NormalizedFile::default();
    for (index, record) in records.iter().enumerate() {
        match normalize_record(index, record, resolver) {
            Ok(Some(event)) => out.events.push(event),
            Ok(None) => out.non_music += 1,
            Err(err) => out.schema_errors.push(err),
        }
    }
    debug!(
        file = %path.display(),
        events = out.events.len(),
        skipped = out.schema_errors.len(),
        non_music = out.non_music,
        "normalized export file"
    );
    Ok(out)
}

pub fn is_extended(record: &Map<String, Value>) -> bool {
    EXTENDED_FIELDS.iter().all(|field| record.contains_key(*field))
}

/// `Ok(None)` means the record is valid but not music.
pub fn normalize_record(
    index: usize,
    record: &Value,
    resolver: &mut ZoneResolver,
) -> Result<Option<ListeningEvent>, SchemaError> {
    let Value::Object(fields) = record else {
        return Err(schema_error(index, "record is not an object"));
    };
    if is_extended(fields) {
        let raw: RawExtendedRecord = serde_json::from_value(record.clone())
            .map_err(|err| schema_error(index, err.to_string()))?;
        normalize_extended(index, raw, resolver)
    } else {
        let raw: RawLegacyRecord = serde_json::from_value(record.clone())
            .map_err(|err| schema_error(index, err.to_string()))?;
        normalize_legacy(index, raw).map(Some)
    }
}

/// `endTime` carries no zone; the export writes it in UTC and it is kept so.
pub fn normalize_legacy(index: usize, raw: RawLegacyRecord) -> Result<ListeningEvent, SchemaError> {
    let parsed = PrimitiveDateTime::parse(
        raw.end_time.trim(),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
    )
    .map_err(|err| schema_error(index, format!("bad endTime {:?}: {err}", raw.end_time)))?;
    Ok(ListeningEvent::utc(
        raw.track_name,
        raw.artist_name,
        parsed.assume_utc(),
        raw.ms_played,
    ))
}

pub fn normalize_extended(
    index: usize,
    raw: RawExtendedRecord,
    resolver: &mut ZoneResolver,
) -> Result<Option<ListeningEvent>, SchemaError> {
    let (Some(track_name), Some(artist_name)) = (
        raw.master_metadata_track_name,
        raw.master_metadata_album_artist_name,
    ) else {
        return Ok(None);
    };
    let timestamp = OffsetDateTime::parse(raw.ts.trim(), &Rfc3339)
        .map_err(|err| schema_error(index, format!("bad ts {:?}: {err}", raw.ts)))?
        .checked_to_offset(UtcOffset::UTC)
        .ok_or_else(|| schema_error(index, format!("ts {:?} is out of range in UTC", raw.ts)))?;
    let country = raw.conn_country.unwrap_or_default();
    Ok(Some(ListeningEvent {
        track_name,
        artist_name,
        timestamp,
        local_time: resolver.to_local(timestamp, &country),
        ms_played: raw.ms_played,
    }))
}

fn schema_error(index: usize, reason: impl Into<String>) -> SchemaError {
    SchemaError {
        index,
        reason: reason.into(),
    }
}
