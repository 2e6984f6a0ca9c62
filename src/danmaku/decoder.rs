//! Chat-log (XML) decoding.
//!
//! A log file is a flat sequence of `<d>` records below a root element,
//! each carrying the positional `p` attribute
//! (`time,type,size,color,serverTimestamp,poolId,senderIdEncoded,rowId`),
//! a free-text body and an optional `raw` attribute with nested JSON
//! (see [`super::raw`]). Recordings also embed a recorder-info element
//! with room / title / start-time metadata.
//!
//! Decoding favors availability over strictness: malformed records are
//! dropped and counted, never fatal. Only a file-level read or structural
//! XML failure surfaces as an error.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use tracing::{debug, info};

use super::event::{decode_color, normalize_media_url, sort_events_by_time, DanmakuEvent, EventKind};
use super::{lanes, raw};
use crate::error::{ReplayError, ReplayResult};

/// Element name of a single chat record.
const RECORD_TAG: &[u8] = b"d";
/// Element name of the recorder metadata header.
const RECORD_INFO_TAG: &[u8] = b"BililiveRecorderRecordInfo";

/// Header metadata embedded in a chat log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogMetadata {
    pub room_id: Option<u64>,
    pub streamer: Option<String>,
    pub title: Option<String>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Recorded media length in seconds, authoritative when present.
    pub declared_duration: Option<f64>,
}

/// Result of decoding one chat log: header metadata plus the
/// time-sorted, lane-assigned event sequence.
#[derive(Debug, Clone, Default)]
pub struct DecodedLog {
    pub metadata: LogMetadata,
    pub events: Vec<DanmakuEvent>,
    /// Records dropped due to malformed fields.
    pub dropped: usize,
}

/// A `<d>` record while its body text is still being collected.
#[derive(Debug, Default)]
struct PendingRecord {
    p: Option<String>,
    raw: Option<String>,
    body: String,
    malformed: bool,
}

/// Decode a chat log from a file.
///
/// The file read is async; parsing itself is synchronous and happens once
/// per segment activation.
pub async fn decode_log_file(path: impl AsRef<Path>) -> ReplayResult<DecodedLog> {
    let path = path.as_ref();
    let xml = tokio::fs::read_to_string(path).await?;
    let decoded = parse_log_str(&xml)?;
    info!(
        "📺 [DECODER] {}: {} events decoded, {} dropped",
        path.display(),
        decoded.events.len(),
        decoded.dropped
    );
    Ok(decoded)
}

/// Read only the recorder-info header of a log file.
///
/// Used by the scanner to pick up declared durations and titles without
/// materializing the event sequence.
pub async fn read_log_metadata(path: impl AsRef<Path>) -> ReplayResult<LogMetadata> {
    let xml = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_metadata_str(&xml)
}

/// Parse a complete chat log from an XML string.
///
/// The returned sequence is sorted ascending by time and has lanes
/// assigned. Unsortable input does not exist: sorting is unconditional.
pub fn parse_log_str(xml: &str) -> ReplayResult<DecodedLog> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    let mut decoded = DecodedLog::default();
    let mut pending: Option<PendingRecord> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                if e.name().as_ref() == RECORD_TAG {
                    pending = Some(begin_record(&e));
                } else if e.name().as_ref() == RECORD_INFO_TAG {
                    decoded.metadata = read_record_info(&e);
                }
            }
            Event::Empty(e) => {
                if e.name().as_ref() == RECORD_TAG {
                    // body-less record (stickers have no text)
                    finish_record(begin_record(&e), &mut decoded);
                } else if e.name().as_ref() == RECORD_INFO_TAG {
                    decoded.metadata = read_record_info(&e);
                }
            }
            Event::Text(t) => {
                if let Some(record) = pending.as_mut() {
                    match t.unescape() {
                        Ok(text) => record.body.push_str(&text),
                        Err(_) => record.malformed = true,
                    }
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == RECORD_TAG {
                    if let Some(record) = pending.take() {
                        finish_record(record, &mut decoded);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    sort_events_by_time(&mut decoded.events);
    lanes::assign_lanes(&mut decoded.events);

    if decoded.dropped > 0 {
        debug!(
            "📺 [DECODER] dropped {} malformed records ({} kept)",
            decoded.dropped,
            decoded.events.len()
        );
    }

    Ok(decoded)
}

/// Parse only the recorder-info header from an XML string.
///
/// Stops at the first chat record; a log without a header yields the
/// default (all-`None`) metadata.
pub fn parse_metadata_str(xml: &str) -> ReplayResult<LogMetadata> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                if e.name().as_ref() == RECORD_INFO_TAG {
                    return Ok(read_record_info(&e));
                }
                if e.name().as_ref() == RECORD_TAG {
                    break;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(LogMetadata::default())
}

/// Collect the attributes of a `<d>` element.
fn begin_record(element: &BytesStart<'_>) -> PendingRecord {
    let mut record = PendingRecord::default();
    for attr in element.attributes() {
        let attr = match attr {
            Ok(a) => a,
            Err(_) => {
                record.malformed = true;
                continue;
            }
        };
        match attr.key.as_ref() {
            b"p" => match attr.unescape_value() {
                Ok(v) => record.p = Some(v.into_owned()),
                Err(_) => record.malformed = true,
            },
            b"raw" => {
                // 壊れたraw属性はレコード落ちではなくメタデータなし扱い
                if let Ok(v) = attr.unescape_value() {
                    record.raw = Some(v.into_owned());
                }
            }
            _ => {}
        }
    }
    record
}

/// Turn a completed record into an event, or count it as dropped.
fn finish_record(record: PendingRecord, decoded: &mut DecodedLog) {
    match build_event(record) {
        Some(event) => decoded.events.push(event),
        None => decoded.dropped += 1,
    }
}

/// Build one event from a pending record. `None` means the record is
/// malformed and must be dropped.
fn build_event(record: PendingRecord) -> Option<DanmakuEvent> {
    if record.malformed {
        return None;
    }
    let p = record.p?;
    let fields: Vec<&str> = p.split(',').collect();
    if fields.len() < 8 {
        return None;
    }

    let time: f64 = fields[0].trim().parse().ok()?;
    if !time.is_finite() || time < 0.0 {
        return None;
    }
    let color: u32 = fields[3].trim().parse().ok()?;
    let server_timestamp: i64 = fields[4].trim().parse().ok()?;
    // opaque carry-through fields are parsed leniently
    let pool_id: u32 = fields[5].trim().parse().unwrap_or(0);
    let sender_id = fields[6].trim().to_string();
    let row_id = fields[7].trim().to_string();

    let extras = record
        .raw
        .as_deref()
        .map(raw::extract)
        .unwrap_or_default();

    let content = record.body;
    let (kind, media_ref) = match extras.sticker_url {
        Some(url) => (EventKind::Sticker, Some(url)),
        None => {
            // 本文が単独のエモートトークンならその画像を参照する
            let single = extras
                .emotes
                .as_ref()
                .and_then(|map| map.get(content.trim()))
                .cloned()
                .map(|url| normalize_media_url(&url));
            (EventKind::Text, single)
        }
    };

    Some(DanmakuEvent {
        time,
        kind,
        content,
        media_ref,
        color: decode_color(color),
        sender_name: extras.sender_name.unwrap_or_default(),
        sender_id,
        medal: extras.medal,
        emotes: extras.emotes,
        pool_id,
        row_id,
        server_timestamp,
        lane: 0,
    })
}

/// Read the recorder-info element attributes. Every field is optional;
/// unparsable values are treated as absent.
fn read_record_info(element: &BytesStart<'_>) -> LogMetadata {
    let mut meta = LogMetadata::default();
    for attr in element.attributes().flatten() {
        let Ok(value) = attr.unescape_value() else {
            continue;
        };
        match attr.key.as_ref() {
            b"roomid" => meta.room_id = value.trim().parse().ok(),
            b"name" => meta.streamer = non_empty(&value),
            b"title" => meta.title = non_empty(&value),
            b"start_time" => {
                meta.start_time = chrono::DateTime::parse_from_rfc3339(value.trim())
                    .ok()
                    .map(|t| t.with_timezone(&chrono::Utc));
            }
            b"duration" => {
                meta.declared_duration = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite() && *d > 0.0);
            }
            _ => {}
        }
    }
    meta
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
