//! スクロール表示用レーン割り当て
//!
//! 描画時にテキストが重ならないよう、各イベントへ固定16レーンのうち
//! 1本を貪欲に割り当てる。区間グラフ彩色の近似で、コストは
//! O(イベント数 × レーン数)。

use super::event::DanmakuEvent;

/// 表示レーン数
pub const LANE_COUNT: usize = 16;

/// 1イベントがレーンを占有する秒数。実際の描画時間とは独立の固定値
pub const LANE_OCCUPANCY_SECS: f64 = 3.0;

/// ソート済みイベント列へレーンをin-placeで割り当てる
///
/// 昇順前提。各レーンの解放時刻を保持し、先頭から順に空きを探す
/// first-fit。空きがなければ最も早く解放されるレーンを再利用する
/// （重なりを許容し、イベントは捨てない）。解放時刻が並んだ場合は
/// `server_timestamp mod レーン数` で決定的にタイブレークする。
pub fn assign_lanes(events: &mut [DanmakuEvent]) {
    let mut free_at = [f64::NEG_INFINITY; LANE_COUNT];

    for event in events.iter_mut() {
        let lane = pick_lane(&free_at, event.time, event.server_timestamp);
        event.lane = lane;
        free_at[lane] = event.time + LANE_OCCUPANCY_SECS;
    }
}

fn pick_lane(free_at: &[f64; LANE_COUNT], time: f64, server_timestamp: i64) -> usize {
    // first-fit: 低いレーン番号を安定して優先する
    for (lane, free) in free_at.iter().enumerate() {
        if *free <= time {
            return lane;
        }
    }

    // 全レーン使用中: 最も早く空くレーンを強制再利用
    let mut best = 0;
    let mut best_free = free_at[0];
    for (lane, free) in free_at.iter().enumerate().skip(1) {
        if *free < best_free {
            best = lane;
            best_free = *free;
        }
    }

    // 同時刻に複数レーンが空く場合の最終タイブレーク
    let preferred = server_timestamp.rem_euclid(LANE_COUNT as i64) as usize;
    if free_at[preferred] == best_free {
        return preferred;
    }

    best
}
