//! Segment history as CSV: one row per segment, scalar columns first and the
//! per-key maps as compact JSON cells.

use std::io::Write;

use serde::Serialize;

use crate::combat::segment::Segment;
use crate::error::PersistError;

#[derive(Debug, Serialize)]
struct SegmentCsvRow {
    index: u32,
    start_time: f64,
    end_time: f64,
    event_count: u32,
    total_damage: i64,
    dps: f64,
    rng_index_start: i64,
    rng_index_end: i64,
    damage_by_source: String,
    damage_by_type: String,
    resource_flow: String,
    tag_counters: String,
}

impl SegmentCsvRow {
    fn from_segment(segment: &Segment) -> Result<Self, serde_json::Error> {
        Ok(Self {
            index: segment.index,
            start_time: segment.start_time,
            end_time: segment.end_time,
            event_count: segment.event_count,
            total_damage: segment.total_damage,
            dps: segment.dps(),
            rng_index_start: segment.rng_index_start,
            rng_index_end: segment.rng_index_end,
            damage_by_source: serde_json::to_string(&segment.damage_by_source)?,
            damage_by_type: serde_json::to_string(&segment.damage_by_type)?,
            resource_flow: serde_json::to_string(&segment.resource_flow)?,
            tag_counters: serde_json::to_string(&segment.tag_counters)?,
        })
    }
}

/// Writes `segments` with a header row. An empty slice still writes the header.
pub fn write_segments_csv<W: Write>(writer: W, segments: &[Segment]) -> Result<(), PersistError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record([
        "index",
        "start_time",
        "end_time",
        "event_count",
        "total_damage",
        "dps",
        "rng_index_start",
        "rng_index_end",
        "damage_by_source",
        "damage_by_type",
        "resource_flow",
        "tag_counters",
    ])?;
    for segment in segments {
        csv_writer.serialize(SegmentCsvRow::from_segment(segment)?)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Renders segments to an in-memory CSV string.
pub fn segments_to_csv_string(segments: &[Segment]) -> Result<String, PersistError> {
    let mut buffer = Vec::new();
    write_segments_csv(&mut buffer, segments)?;
    String::from_utf8(buffer).map_err(|err| {
        PersistError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}
