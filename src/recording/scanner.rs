//! Recording directory scanner.
//!
//! Walks one directory of recorder output, pairs media files with their
//! sidecars, pulls declared durations and titles out of chat-log headers,
//! and groups the result into sessions. Files that do not match the naming
//! grammar are skipped, never fatal.

use std::path::Path;

use glob::glob;
use tracing::{debug, info, warn};

use crate::danmaku::decoder;
use crate::error::{ReplayError, ReplayResult};
use crate::recording::naming::{self, MEDIA_EXTENSIONS};
use crate::recording::segment::{group_into_sessions, Segment, Session};

/// Scan a directory of recordings and return its sessions, oldest first.
pub async fn scan_directory(dir: &Path) -> ReplayResult<Vec<Session>> {
    if !dir.is_dir() {
        return Err(ReplayError::no_data(format!(
            "recording directory not found: {}",
            dir.display()
        )));
    }

    let mut segments = Vec::new();
    for ext in MEDIA_EXTENSIONS {
        let pattern = dir.join(format!("*.{}", ext));
        let pattern = pattern.to_string_lossy().into_owned();
        let entries = glob(&pattern)
            .map_err(|e| ReplayError::invalid_format(format!("bad scan pattern: {}", e)))?;

        for entry in entries {
            match entry {
                Ok(path) => {
                    if let Some(segment) = build_segment(&path).await {
                        segments.push(segment);
                    }
                }
                Err(e) => warn!("⚠️ [SCANNER] Unreadable entry skipped: {}", e),
            }
        }
    }

    let media_count = segments.len();
    let sessions = group_into_sessions(segments);
    info!(
        "📺 [SCANNER] {}: {} media files in {} sessions",
        dir.display(),
        media_count,
        sessions.len()
    );
    Ok(sessions)
}

/// Assemble one segment from a media path, or None if the name does not parse.
async fn build_segment(media_path: &Path) -> Option<Segment> {
    let name = match naming::parse_media_path(media_path) {
        Ok(name) => name,
        Err(e) => {
            debug!("[SCANNER] Skipping unrecognized file: {}", e);
            return None;
        }
    };

    let log_candidate = naming::log_sidecar(media_path);
    let log_path = if file_exists(&log_candidate).await {
        Some(log_candidate)
    } else {
        None
    };

    let mut cover_path = None;
    for candidate in naming::cover_sidecars(media_path) {
        if file_exists(&candidate).await {
            cover_path = Some(candidate);
            break;
        }
    }

    // ログのメタデータがあればタイトルと申告尺はそちらを優先する
    let mut title = name.title.clone();
    let mut declared_duration = None;
    if let Some(log) = &log_path {
        match decoder::read_log_metadata(log).await {
            Ok(metadata) => {
                if let Some(log_title) = metadata.title.filter(|t| !t.is_empty()) {
                    title = Some(log_title);
                }
                declared_duration = metadata.declared_duration;
            }
            Err(e) => {
                warn!(
                    "⚠️ [SCANNER] Failed to read log metadata from {}: {}",
                    log.display(),
                    e
                );
            }
        }
    }

    Some(Segment {
        media_path: media_path.to_path_buf(),
        log_path,
        cover_path,
        room_id: name.room_id,
        start_time: name.start_time,
        title,
        declared_duration,
        measured_duration: None,
    })
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RoomId;
    use std::fs;
    use tempfile::tempdir;

    const LOG_WITH_METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<i>
<BililiveRecorderRecordInfo roomid="21986" name="配信者" title="雑談" start_time="2023-04-15T20:00:00.000+08:00" duration="1800.5" />
<d p="1.00,1,25,16777215,1681560001000,0,abc,100" user="視聴者A">こんばんは</d>
<d p="3.50,1,25,16777215,1681560003000,0,def,101" user="視聴者B">わこつ</d>
</i>"#;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[tokio::test]
    async fn test_scan_groups_media_with_sidecars() {
        let dir = tempdir().unwrap();
        let base = dir.path();

        touch(&base.join("rec-21986-20230415-200000-0-雑談.flv"));
        fs::write(
            base.join("rec-21986-20230415-200000-0-雑談.xml"),
            LOG_WITH_METADATA,
        )
        .unwrap();
        touch(&base.join("rec-21986-20230415-200000-0-雑談.jpg"));
        // 後続ファイル（ログなし）
        touch(&base.join("rec-21986-20230415-203000-0-雑談.flv"));
        // 対象外のファイル
        touch(&base.join("notes.txt"));
        touch(&base.join("orphan.xml"));

        let sessions = scan_directory(base).await.unwrap();
        assert_eq!(sessions.len(), 1);

        let session = &sessions[0];
        assert_eq!(session.room_id, RoomId(21986));
        assert_eq!(session.title.as_deref(), Some("雑談"));
        assert_eq!(session.len(), 2);

        let first = &session.segments[0];
        assert!(first.log_path.is_some());
        assert!(first.cover_path.is_some());
        assert_eq!(first.declared_duration, Some(1800.5));

        let second = &session.segments[1];
        assert!(second.log_path.is_none());
        assert_eq!(second.declared_duration, None);
    }

    #[tokio::test]
    async fn test_log_title_overrides_filename_title() {
        let dir = tempdir().unwrap();
        let base = dir.path();

        // ファイル名のタイトルとログのタイトルが食い違う場合はログが勝つ
        touch(&base.join("rec-21986-20230415-200000-0-ファイル名タイトル.flv"));
        fs::write(
            base.join("rec-21986-20230415-200000-0-ファイル名タイトル.xml"),
            LOG_WITH_METADATA,
        )
        .unwrap();

        let sessions = scan_directory(base).await.unwrap();
        assert_eq!(sessions[0].title.as_deref(), Some("雑談"));
    }

    #[tokio::test]
    async fn test_sessions_split_by_gap() {
        let dir = tempdir().unwrap();
        let base = dir.path();

        touch(&base.join("rec-1-20230415-100000-0.flv"));
        touch(&base.join("rec-1-20230415-150000-0.flv"));

        let sessions = scan_directory(base).await.unwrap();
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_mixed_extensions_are_all_collected() {
        let dir = tempdir().unwrap();
        let base = dir.path();

        touch(&base.join("rec-1-20230415-100000-0.flv"));
        touch(&base.join("rec-1-20230415-103000-0.mp4"));
        touch(&base.join("rec-1-20230415-110000-0.mkv"));

        let sessions = scan_directory(base).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].len(), 3);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(scan_directory(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_directory_yields_no_sessions() {
        let dir = tempdir().unwrap();
        let sessions = scan_directory(dir.path()).await.unwrap();
        assert!(sessions.is_empty());
    }
}
