use crate::error::ExportError;
use crate::filter::columns;
use crate::model::{AggregateRow, BucketRow, GroupMode};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackRecord<'a> {
    rank: usize,
    artist_name: &'a str,
    track_name: &'a str,
    play_count: u64,
    total_minutes: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtistRecord<'a> {
    rank: usize,
    artist_name: &'a str,
    play_count: u64,
    total_minutes: u64,
}

pub fn write_rows<W: Write>(
    mut out: W,
    rows: &[AggregateRow],
    mode: GroupMode,
    format: ExportFormat,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => {
            let visible = columns(mode);
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(visible.iter().map(|column| column.header()))?;
            for row in rows {
                writer.write_record(visible.iter().map(|column| column.cell(row)))?;
            }
            writer.flush()?;
        }
        ExportFormat::Json => {
            match mode {
                GroupMode::Tracks => {
                    let records: Vec<TrackRecord> = rows
                        .iter()
                        .map(|row| TrackRecord {
                            rank: row.rank,
                            artist_name: &row.artist_name,
                            track_name: &row.track_name,
                            play_count: row.play_count,
                            total_minutes: row.total_minutes(),
                        })
                        .collect();
                    serde_json::to_writer_pretty(&mut out, &records)?;
                }
                GroupMode::Artists => {
                    let records: Vec<ArtistRecord> = rows
                        .iter()
                        .map(|row| ArtistRecord {
                            rank: row.rank,
                            artist_name: &row.artist_name,
                            play_count: row.play_count,
                            total_minutes: row.total_minutes(),
                        })
                        .collect();
                    serde_json::to_writer_pretty(&mut out, &records)?;
                }
            }
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}

pub fn write_buckets<W: Write>(
    mut out: W,
    rows: &[BucketRow],
    format: ExportFormat,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut out, rows)?;
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}
