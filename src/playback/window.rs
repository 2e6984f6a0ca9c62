//! 画面上に「いま見えている」コメント集合の算出
//!
//! ソート済みイベント列に対して前進カーソルを保持し、毎フレーム
//! O(可視窓) で可視集合を返す。カーソルはフレームをまたいで呼び出し側が
//! 保持する明示的な状態で、リセットは結果を変えずコストだけを変える。
//!
//! 各イベントの表示寿命は本文の長さで決まる。長文ほど係数が小さく
//! なり、画面上に長く留まる。

use crate::danmaku::{DanmakuEvent, DanmakuFilter};

/// スクロール速度1.0・係数1.0のときの基準表示寿命（秒）
pub const BASE_LIFETIME_SECS: f64 = 16.0;
/// スクロール速度設定の下限
pub const MIN_SCROLL_SPEED: f64 = 0.5;
/// 到着直前イベントまで先読みする幅（秒）
pub const SCAN_LOOKAHEAD_SECS: f64 = 0.5;
/// 最長文・最低速度のときの寿命上限。カーソル前進の安全側境界に使う
pub const MAX_EVENT_LIFETIME_SECS: f64 =
    BASE_LIFETIME_SECS / (MIN_SCROLL_SPEED * MIN_LENGTH_FACTOR);

/// 10文字以上の本文に適用される長さ係数の下限
const MIN_LENGTH_FACTOR: f64 = 0.75;
/// カーソルがこれ以上「先」を指していたら巻き戻しシークとみなす（秒）
const STALE_CURSOR_SLACK_SECS: f64 = 10.0;

/// 本文の文字数から長さ係数を求める。1文字で1.0、10文字以上で0.75
fn length_factor(char_count: usize) -> f64 {
    let clamped = char_count.clamp(1, 10) as f64;
    1.0 - 0.25 * (clamped - 1.0) / 9.0
}

fn sanitize_speed(scroll_speed: f64) -> f64 {
    if scroll_speed.is_finite() {
        scroll_speed.max(MIN_SCROLL_SPEED)
    } else {
        1.0
    }
}

/// イベント1件の表示寿命（秒）
pub fn event_lifetime_secs(event: &DanmakuEvent, scroll_speed: f64) -> f64 {
    let speed = sanitize_speed(scroll_speed);
    BASE_LIFETIME_SECS / (speed * length_factor(event.content.chars().count()))
}

/// 到着済みかつ寿命内かの判定
pub fn is_event_visible(event: &DanmakuEvent, now: f64, scroll_speed: f64) -> bool {
    event.time <= now && event.time >= now - event_lifetime_secs(event, scroll_speed)
}

/// フレームをまたいで保持する前進カーソル
///
/// アクティブなイベント列が差し替わったら必ず [`reset`](Self::reset)
/// すること。列がソート済みであることだけが正しさの前提。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityWindow {
    cursor: usize,
}

impl VisibilityWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// カーソルを先頭へ戻す（イベント列の差し替え時・シーク確定時）
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// 現在時刻 `now`（セグメントローカル秒）で見えているイベントの添字を返す
    pub fn visible_indices(
        &mut self,
        events: &[DanmakuEvent],
        now: f64,
        scroll_speed: f64,
        filter: &DanmakuFilter,
    ) -> Vec<usize> {
        if events.is_empty() {
            self.cursor = 0;
            return Vec::new();
        }

        // どの速度設定でも可視でありえない最古時刻。前進はこの境界まで
        let horizon = now - MAX_EVENT_LIFETIME_SECS;

        // 巻き戻しシーク後はカーソルが未来を指したままになる。検出したら
        // 先頭からやり直す（結果は同じ、コストだけが変わる）
        if self.cursor >= events.len()
            || events[self.cursor].time > horizon + STALE_CURSOR_SLACK_SECS
        {
            self.cursor = 0;
        }

        while self.cursor < events.len() && events[self.cursor].time < horizon {
            self.cursor += 1;
        }

        let mut visible = Vec::new();
        for (offset, event) in events[self.cursor..].iter().enumerate() {
            if event.time > now + SCAN_LOOKAHEAD_SECS {
                // ソート済みなのでここで打ち切れる
                break;
            }
            if event.time > now {
                // 先読み範囲。到着前なので可視集合には入れない
                continue;
            }
            if event.time >= now - event_lifetime_secs(event, scroll_speed)
                && filter.matches(event)
            {
                visible.push(self.cursor + offset);
            }
        }
        visible
    }

    /// [`visible_indices`](Self::visible_indices) の参照返し版
    pub fn visible_events<'a>(
        &mut self,
        events: &'a [DanmakuEvent],
        now: f64,
        scroll_speed: f64,
        filter: &DanmakuFilter,
    ) -> Vec<&'a DanmakuEvent> {
        self.visible_indices(events, now, scroll_speed, filter)
            .into_iter()
            .map(|i| &events[i])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(time: f64, content: &str) -> DanmakuEvent {
        DanmakuEvent {
            time,
            content: content.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_length_factor_bounds() {
        assert_eq!(length_factor(1), 1.0);
        assert_eq!(length_factor(0), 1.0);
        assert_eq!(length_factor(10), 0.75);
        assert_eq!(length_factor(100), 0.75);
        // 中間は線形
        let mid = length_factor(5);
        assert!((mid - (1.0 - 0.25 * 4.0 / 9.0)).abs() < 1e-12);
    }

    #[test]
    fn test_lifetime_uses_char_count_not_bytes() {
        // 「あ」はUTF-8で3バイトだが1文字として数える
        let short = event_at(0.0, "あ");
        let long = event_at(0.0, "ああああああああああ");
        assert_eq!(event_lifetime_secs(&short, 1.0), BASE_LIFETIME_SECS);
        assert!(event_lifetime_secs(&long, 1.0) > event_lifetime_secs(&short, 1.0));
    }

    #[test]
    fn test_max_lifetime_constant_matches_formula() {
        // 最低速度0.5・最長文のとき寿命は最大になる
        let long = event_at(0.0, "0123456789");
        let lifetime = event_lifetime_secs(&long, MIN_SCROLL_SPEED);
        assert!((lifetime - MAX_EVENT_LIFETIME_SECS).abs() < 1e-9);
        assert!((MAX_EVENT_LIFETIME_SECS - 42.666666).abs() < 1e-3);
    }

    #[test]
    fn test_visibility_boundary() {
        // 1文字・速度8.0 → 寿命ちょうど2.0秒
        let event = event_at(5.0, "a");
        assert_eq!(event_lifetime_secs(&event, 8.0), 2.0);
        assert!(is_event_visible(&event, 6.9, 8.0));
        assert!(!is_event_visible(&event, 7.1, 8.0));
        assert!(!is_event_visible(&event, 4.9, 8.0));
    }

    #[test]
    fn test_window_matches_boundary_property() {
        let events = vec![event_at(5.0, "a")];
        let filter = DanmakuFilter::new();

        let mut window = VisibilityWindow::new();
        assert_eq!(window.visible_indices(&events, 6.9, 8.0, &filter), vec![0]);

        let mut window = VisibilityWindow::new();
        assert!(window.visible_indices(&events, 7.1, 8.0, &filter).is_empty());

        let mut window = VisibilityWindow::new();
        assert!(window.visible_indices(&events, 4.9, 8.0, &filter).is_empty());
    }

    #[test]
    fn test_lookahead_examines_but_excludes_unarrived() {
        let events = vec![event_at(5.0, "a"), event_at(5.3, "b"), event_at(5.6, "c")];
        let mut window = VisibilityWindow::new();
        let filter = DanmakuFilter::new();
        let visible = window.visible_indices(&events, 5.0, 1.0, &filter);
        assert_eq!(visible, vec![0]);
    }

    #[test]
    fn test_cursor_advances_past_expired_events() {
        let events = vec![event_at(1.0, "a"), event_at(5.0, "b"), event_at(100.0, "c")];
        let mut window = VisibilityWindow::new();
        let filter = DanmakuFilter::new();

        let visible = window.visible_indices(&events, 5.0, 1.0, &filter);
        assert_eq!(visible, vec![0, 1]);
        assert_eq!(window.cursor(), 0);

        // 50秒時点で先頭2件はどの速度でも可視になりえない
        let visible = window.visible_indices(&events, 50.0, 1.0, &filter);
        assert!(visible.is_empty());
        assert_eq!(window.cursor(), 2);
    }

    #[test]
    fn test_stale_cursor_recovers_after_backward_seek() {
        let events: Vec<_> = (0..100).map(|i| event_at(i as f64, "x")).collect();
        let mut window = VisibilityWindow::new();
        let filter = DanmakuFilter::new();

        // 99秒まで進めてカーソルを前進させる
        let visible = window.visible_indices(&events, 99.0, 1.0, &filter);
        assert!(window.cursor() > 0);
        assert_eq!(visible.len(), 17); // 83..=99秒（寿命16秒）

        // 5秒へ巻き戻し。カーソルが未来を指したままでも正しく復帰する
        let visible = window.visible_indices(&events, 5.0, 1.0, &filter);
        assert_eq!(visible.len(), 6); // 0..=5秒
        assert_eq!(visible[0], 0);
    }

    #[test]
    fn test_cursor_past_end_resets() {
        let events = vec![event_at(1.0, "a")];
        let mut window = VisibilityWindow::new();
        let filter = DanmakuFilter::new();

        // 全イベント消滅まで進める
        window.visible_indices(&events, 500.0, 1.0, &filter);
        assert_eq!(window.cursor(), 1);

        // 巻き戻してもカーソルが範囲外のまま死なない
        let visible = window.visible_indices(&events, 2.0, 1.0, &filter);
        assert_eq!(visible, vec![0]);
    }

    #[test]
    fn test_filtered_events_do_not_block_cursor() {
        let mut filter = DanmakuFilter::new();
        filter.add_blocked_word("spam".to_string());
        let events = vec![event_at(1.0, "spam spam"), event_at(1.5, "hello")];
        let mut window = VisibilityWindow::new();

        let visible = window.visible_indices(&events, 2.0, 1.0, &filter);
        assert_eq!(visible, vec![1]);
    }

    #[test]
    fn test_medal_filter_applies_per_candidate() {
        let mut filter = DanmakuFilter::new();
        filter.set_min_medal_level(Some(5));
        let mut privileged = event_at(1.0, "hi");
        privileged.medal = Some(crate::danmaku::Medal {
            name: "航海士".to_string(),
            level: 21,
            color: None,
        });
        let plain = event_at(1.2, "hi");
        let events = vec![privileged, plain];

        let mut window = VisibilityWindow::new();
        let visible = window.visible_indices(&events, 2.0, 1.0, &filter);
        assert_eq!(visible, vec![0]);
    }

    #[test]
    fn test_empty_sequence() {
        let mut window = VisibilityWindow::new();
        let filter = DanmakuFilter::new();
        assert!(window.visible_indices(&[], 10.0, 1.0, &filter).is_empty());
        assert_eq!(window.cursor(), 0);
    }

    #[test]
    fn test_repeated_calls_are_idempotent() {
        let events = vec![event_at(1.0, "a"), event_at(2.0, "b"), event_at(3.0, "c")];
        let mut window = VisibilityWindow::new();
        let filter = DanmakuFilter::new();
        let first = window.visible_indices(&events, 3.0, 1.0, &filter);
        let second = window.visible_indices(&events, 3.0, 1.0, &filter);
        assert_eq!(first, second);
    }

    #[test]
    fn test_slow_speed_keeps_events_longer() {
        let events = vec![event_at(0.0, "0123456789")];
        let mut window = VisibilityWindow::new();
        let filter = DanmakuFilter::new();

        // 速度1.0では寿命21.3秒 → 30秒時点で不可視
        assert!(window.visible_indices(&events, 30.0, 1.0, &filter).is_empty());
        // 最低速度では寿命42.7秒 → まだ見えている
        let mut window = VisibilityWindow::new();
        assert_eq!(
            window.visible_indices(&events, 30.0, MIN_SCROLL_SPEED, &filter),
            vec![0]
        );
    }

    #[test]
    fn test_speed_below_minimum_is_clamped() {
        let event = event_at(0.0, "a");
        assert_eq!(
            event_lifetime_secs(&event, 0.01),
            event_lifetime_secs(&event, MIN_SCROLL_SPEED)
        );
    }
}
