//! セグメントとセッションのドメインモデル
//!
//! セグメント = 動画ファイル1本とそのサイドカー。セッション = 同一
//! 配信に属するセグメントの並び。ファイルスキャン時に一度だけ構築し、
//! 以後は実測尺の補正以外は書き換えない。

use std::path::PathBuf;

use chrono::{Duration, NaiveDateTime};

use super::naming::RoomId;
use crate::timeline::{SegmentTiming, Timeline};

/// これ以上離れたファイルは別セッション扱いになる間隔（秒）
pub const SESSION_GAP_SECS: f64 = 3600.0;

/// 録画ファイル1本分
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub media_path: PathBuf,
    /// チャットログのサイドカー。なければコメントなしで再生する
    pub log_path: Option<PathBuf>,
    pub cover_path: Option<PathBuf>,
    pub room_id: RoomId,
    /// ファイル名から得た録画開始時刻
    pub start_time: NaiveDateTime,
    /// ログメタデータのタイトル。なければファイル名のタイトル
    pub title: Option<String>,
    /// ログメタデータに書かれた尺
    pub declared_duration: Option<f64>,
    /// 実メディアから観測された尺。再生が進むと埋まる
    pub measured_duration: Option<f64>,
}

impl Segment {
    /// タイムライン再構成への入力
    pub fn timing(&self) -> SegmentTiming {
        SegmentTiming {
            declared: self.declared_duration,
            start_time: Some(self.start_time),
            measured: self.measured_duration,
        }
    }

    /// 申告尺から見たファイル終端時刻。申告がなければ開始時刻そのもの
    pub fn declared_end(&self) -> NaiveDateTime {
        let millis = (self.declared_duration.unwrap_or(0.0) * 1000.0) as i64;
        self.start_time + Duration::milliseconds(millis)
    }
}

/// ひと続きの配信を構成するセグメント列
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub room_id: RoomId,
    pub title: Option<String>,
    pub segments: Vec<Segment>,
}

impl Session {
    /// 再開位置の保存などに使う安定キー
    pub fn id(&self) -> String {
        match self.start_time() {
            Some(start) => format!("{}-{}", self.room_id, start.format("%Y%m%d-%H%M%S")),
            None => format!("{}-empty", self.room_id),
        }
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.segments.first().map(|s| s.start_time)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 現在のセグメント情報からタイムラインを構築する
    pub fn timeline(&self) -> Timeline {
        let timings: Vec<SegmentTiming> = self.segments.iter().map(|s| s.timing()).collect();
        Timeline::from_timings(&timings)
    }
}

/// セグメント列をセッションへまとめる
///
/// 同じ部屋・同じタイトルで、前ファイルの終端から次ファイルの開始までが
/// 1時間以内なら同一セッション。入力順は問わない（内部でソートする）。
pub fn group_into_sessions(mut segments: Vec<Segment>) -> Vec<Session> {
    segments.sort_by(|a, b| (a.room_id, a.start_time).cmp(&(b.room_id, b.start_time)));

    let mut sessions: Vec<Session> = Vec::new();
    for segment in segments {
        let starts_new = match sessions.last() {
            None => true,
            Some(current) => {
                current.room_id != segment.room_id
                    || current.title != segment.title
                    || current
                        .segments
                        .last()
                        .map(|prev| gap_secs(prev, &segment) > SESSION_GAP_SECS)
                        .unwrap_or(true)
            }
        };

        if starts_new {
            sessions.push(Session {
                room_id: segment.room_id,
                title: segment.title.clone(),
                segments: vec![segment],
            });
        } else if let Some(current) = sessions.last_mut() {
            current.segments.push(segment);
        }
    }
    sessions
}

/// 前ファイルの申告上の終端から次ファイルの開始までの間隔（秒）
fn gap_secs(prev: &Segment, next: &Segment) -> f64 {
    (next.start_time - prev.declared_end()).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn segment(room_id: u64, title: Option<&str>, h: u32, m: u32, declared: Option<f64>) -> Segment {
        let start_time = NaiveDate::from_ymd_opt(2023, 4, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap();
        Segment {
            media_path: PathBuf::from(format!("rec-{}-20230415-{:02}{:02}00-0.flv", room_id, h, m)),
            log_path: None,
            cover_path: None,
            room_id: RoomId(room_id),
            start_time,
            title: title.map(String::from),
            declared_duration: declared,
            measured_duration: None,
        }
    }

    #[test]
    fn test_consecutive_files_form_one_session() {
        let sessions = group_into_sessions(vec![
            segment(1, Some("雑談"), 20, 0, Some(1800.0)),
            segment(1, Some("雑談"), 20, 30, Some(1800.0)),
            segment(1, Some("雑談"), 21, 0, Some(1800.0)),
        ]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].len(), 3);
    }

    #[test]
    fn test_gap_is_measured_from_declared_end() {
        // 開始間隔は75分だが、前ファイルの尺30分を引いた空白は45分
        let sessions = group_into_sessions(vec![
            segment(1, Some("雑談"), 20, 0, Some(1800.0)),
            segment(1, Some("雑談"), 21, 15, Some(1800.0)),
        ]);
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_gap_over_one_hour_splits() {
        let sessions = group_into_sessions(vec![
            segment(1, Some("雑談"), 10, 0, Some(1800.0)),
            // 10:30終了 → 11:31開始で3660秒の空白
            segment(1, Some("雑談"), 11, 31, Some(1800.0)),
        ]);
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_missing_declared_duration_counts_from_start() {
        // 申告尺なし → 終端は開始時刻。90分差は分割
        let sessions = group_into_sessions(vec![
            segment(1, Some("雑談"), 10, 0, None),
            segment(1, Some("雑談"), 11, 30, None),
        ]);
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_title_change_splits() {
        let sessions = group_into_sessions(vec![
            segment(1, Some("午前の部"), 10, 0, Some(1800.0)),
            segment(1, Some("午後の部"), 10, 30, Some(1800.0)),
        ]);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].title.as_deref(), Some("午前の部"));
        assert_eq!(sessions[1].title.as_deref(), Some("午後の部"));
    }

    #[test]
    fn test_rooms_never_mix() {
        let sessions = group_into_sessions(vec![
            segment(1, Some("雑談"), 10, 0, Some(1800.0)),
            segment(2, Some("雑談"), 10, 10, Some(1800.0)),
        ]);
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let sessions = group_into_sessions(vec![
            segment(1, Some("雑談"), 21, 0, Some(1800.0)),
            segment(1, Some("雑談"), 20, 0, Some(1800.0)),
            segment(1, Some("雑談"), 20, 30, Some(1800.0)),
        ]);
        assert_eq!(sessions.len(), 1);
        let starts: Vec<_> = sessions[0].segments.iter().map(|s| s.start_time).collect();
        assert!(starts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_session_id_is_stable() {
        let session = Session {
            room_id: RoomId(21986),
            title: Some("雑談".to_string()),
            segments: vec![segment(21986, Some("雑談"), 20, 0, Some(1800.0))],
        };
        assert_eq!(session.id(), "21986-20230415-200000");
    }

    #[test]
    fn test_session_timeline_uses_segment_timings() {
        let session = Session {
            room_id: RoomId(1),
            title: None,
            segments: vec![
                segment(1, None, 20, 0, Some(1800.0)),
                segment(1, None, 20, 30, Some(1500.0)),
            ],
        };
        let timeline = session.timeline();
        assert_eq!(timeline.total_duration(), 3300.0);
    }
}
