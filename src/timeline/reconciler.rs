//! 仮想グローバルタイムラインの再構成
//!
//! セグメントごとの申告尺・実測尺を突き合わせ、セッション全体を貫く
//! 単調なグローバル時間軸を組み立てる。グローバル時間 ⇄
//! (セグメント番号, ローカル時間) の相互変換はすべてここを通る。
//!
//! 尺の優先順位: 申告尺 → 次セグメントの開始時刻差からの推定 →
//! 実測尺 → 0。申告尺を表示グリッドのアンカーとして扱うのは、
//! 実測値が後から届いてもシークバーが跳ねないようにするため。

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// セグメント境界をまたぐシークで次セグメントへ食い込まないための余白（秒）
pub const SEEK_EPSILON: f64 = 0.01;

/// タイムライン再構成への入力となる1セグメント分の時刻情報
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentTiming {
    /// チャットログのメタデータに書かれた尺。存在すれば最優先
    pub declared: Option<f64>,
    /// ファイル名から得た録画開始時刻。隣接差分で尺を推定する
    pub start_time: Option<NaiveDateTime>,
    /// 実メディア再生から観測された尺。非同期に後から届く
    pub measured: Option<f64>,
}

/// グローバル時間軸上の1セグメント分の区間
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

/// シーク解決結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeekTarget {
    pub segment_index: usize,
    pub local_time: f64,
    /// 現在ロード中のセグメントと異なる場合true（セグメント切替が必要）
    pub requires_switch: bool,
}

/// セッション全体のタイムライン
///
/// 尺が1つでも変わったら全体を作り直す（部分更新はしない）。
/// エントリ列は常に連続かつ単調: `entries[i].end == entries[i+1].start`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// セグメント時刻情報からタイムラインを構築する
    pub fn from_timings(timings: &[SegmentTiming]) -> Self {
        let durations: Vec<f64> = (0..timings.len())
            .map(|i| resolve_duration(timings, i))
            .collect();
        Self::from_durations(&durations)
    }

    /// 確定済みの尺リストからタイムラインを構築する
    pub fn from_durations(durations: &[f64]) -> Self {
        let mut entries = Vec::with_capacity(durations.len());
        let mut cursor = 0.0;
        for &duration in durations {
            let duration = if duration.is_finite() && duration > 0.0 {
                duration
            } else {
                0.0
            };
            entries.push(TimelineEntry {
                start: cursor,
                end: cursor + duration,
                duration,
            });
            cursor += duration;
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// セッション全体の長さ（秒）
    pub fn total_duration(&self) -> f64 {
        self.entries.last().map(|e| e.end).unwrap_or(0.0)
    }

    /// グローバル時間を (セグメント番号, ローカル時間) へ解決する
    ///
    /// 範囲を超えた時間は最後のエントリへクランプされる。尺0のエントリは
    /// 区間を持たないため自然に読み飛ばされる。
    pub fn global_to_local(&self, global: f64) -> (usize, f64) {
        if self.entries.is_empty() {
            return (0, 0.0);
        }
        let global = global.max(0.0);
        let index = self.entries.partition_point(|e| e.end <= global);
        let index = index.min(self.entries.len() - 1);
        (index, global - self.entries[index].start)
    }

    /// (セグメント番号, ローカル時間) をグローバル時間へ戻す
    pub fn local_to_global(&self, index: usize, local: f64) -> f64 {
        self.entries
            .get(index)
            .map(|e| e.start + local)
            .unwrap_or(local)
    }

    /// グローバル時間へのシークを解決する
    ///
    /// ローカル時間は `[0, 尺 - ε]` にクランプし、境界ぴったりのシークが
    /// 次セグメントへ滑り込むのを防ぐ。
    pub fn seek_target(&self, global: f64, active_index: usize) -> SeekTarget {
        let (segment_index, local) = self.global_to_local(global);
        let duration = self
            .entry(segment_index)
            .map(|e| e.duration)
            .unwrap_or(0.0);
        let upper = (duration - SEEK_EPSILON).max(0.0);
        SeekTarget {
            segment_index,
            local_time: local.clamp(0.0, upper),
            requires_switch: segment_index != active_index,
        }
    }
}

/// 1セグメントの尺を優先順位に従って解決する
fn resolve_duration(timings: &[SegmentTiming], index: usize) -> f64 {
    let timing = &timings[index];

    if let Some(declared) = timing.declared.filter(|d| d.is_finite() && *d > 0.0) {
        return declared;
    }

    // 次セグメントのファイル開始時刻との差から推定する
    if let (Some(this_start), Some(next)) = (timing.start_time, timings.get(index + 1)) {
        if let Some(next_start) = next.start_time {
            let gap = (next_start - this_start).num_milliseconds() as f64 / 1000.0;
            if gap > 0.0 {
                return gap;
            }
        }
    }

    if let Some(measured) = timing.measured.filter(|d| d.is_finite() && *d > 0.0) {
        return measured;
    }

    0.0
}
