//! Recording file name parsing.
//!
//! Recorder output follows a fixed grammar:
//! `<prefix>-<roomId>-<YYYYMMDD>-<HHMMSS>-<seq>[-<title>].<ext>`
//! Sidecar files share the base name with `.xml` (chat log) and
//! `.jpg`/`.png` (cover image) extensions.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::{ReplayError, ReplayResult};

/// 動画として扱う拡張子
pub const MEDIA_EXTENSIONS: &[&str] = &["flv", "mp4", "mkv", "ts"];

/// 配信ルームの識別子
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display,
)]
pub struct RoomId(pub u64);

/// Fields recovered from a recording file name.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingName {
    pub prefix: String,
    pub room_id: RoomId,
    pub start_time: NaiveDateTime,
    /// Trailing millisecond/sequence discriminator, meaning varies by recorder version.
    pub sequence: u64,
    pub title: Option<String>,
    pub extension: String,
}

/// Parse a bare file name (no directory components).
pub fn parse_recording_name(file_name: &str) -> ReplayResult<RecordingName> {
    // prefixは最短一致。タイトル側はハイフンもドットも含みうる
    let pattern = Regex::new(
        r"^(?P<prefix>.+?)-(?P<room>\d+)-(?P<date>\d{8})-(?P<time>\d{6})-(?P<seq>\d+)(?:-(?P<title>.+))?\.(?P<ext>[^.]+)$",
    )
    .unwrap();

    let caps = pattern
        .captures(file_name)
        .ok_or_else(|| ReplayError::invalid_name(file_name))?;

    let room_id = caps["room"]
        .parse()
        .map(RoomId)
        .map_err(|_: std::num::ParseIntError| ReplayError::invalid_name(file_name))?;
    let sequence: u64 = caps["seq"]
        .parse()
        .map_err(|_| ReplayError::invalid_name(file_name))?;

    let start_time = NaiveDateTime::parse_from_str(
        &format!("{} {}", &caps["date"], &caps["time"]),
        "%Y%m%d %H%M%S",
    )
    .map_err(|_| ReplayError::invalid_name(file_name))?;

    Ok(RecordingName {
        prefix: caps["prefix"].to_string(),
        room_id,
        start_time,
        sequence,
        title: caps.name("title").map(|m| m.as_str().to_string()),
        extension: caps["ext"].to_string(),
    })
}

/// Parse the file name component of a media path.
pub fn parse_media_path(path: &Path) -> ReplayResult<RecordingName> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ReplayError::invalid_name(path.to_string_lossy()))?;
    parse_recording_name(file_name)
}

/// Whether the path carries one of the known media extensions.
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_lowercase();
            MEDIA_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Expected chat-log sidecar path for a media file.
pub fn log_sidecar(media_path: &Path) -> PathBuf {
    media_path.with_extension("xml")
}

/// Candidate cover-image sidecar paths, in preference order.
pub fn cover_sidecars(media_path: &Path) -> Vec<PathBuf> {
    vec![
        media_path.with_extension("jpg"),
        media_path.with_extension("png"),
    ]
}
