//! 再生エンジン
//!
//! デコーダ・タイムライン・クロック・可視窓を束ねる司令塔。メディア
//! プレイヤー（コラボレータ）から届く粗い再生位置とユーザー操作を受け、
//! フレームごとに描画すべきコメント集合を返す。
//!
//! ロック規約: 内部状態はひとつの `RwLock` にまとめ、await をまたいで
//! ロックを保持しない。デコード完了時は世代カウンタを照合し、その間に
//! セグメントが切り替わっていたら結果を捨てる。

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::danmaku::{decoder, DanmakuEvent};
use crate::error::{ReplayError, ReplayResult};
use crate::playback::clock::PlaybackClock;
use crate::playback::window::VisibilityWindow;
use crate::recording::Session;
use crate::store::PlayerSettings;
use crate::timeline::{segment_density, session_density, SeekTarget, Timeline};

/// 1フレーム分の出力
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSnapshot {
    /// 平滑化済みのセグメントローカル時刻
    pub time: f64,
    /// いま画面に出すべきイベント（時刻昇順）
    pub visible: Vec<DanmakuEvent>,
}

struct EngineState {
    session: Option<Session>,
    timeline: Timeline,
    active_index: usize,
    /// アクティブセグメントのデコード済みイベント列
    events: Vec<DanmakuEvent>,
    window: VisibilityWindow,
    clock: PlaybackClock,
    settings: PlayerSettings,
    /// セグメント切替の世代。デコード結果の鮮度判定に使う
    epoch: u64,
}

/// 再生エンジン本体
pub struct ReplayEngine {
    state: RwLock<EngineState>,
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayEngine {
    pub fn new() -> Self {
        Self::with_settings(PlayerSettings::default())
    }

    pub fn with_settings(mut settings: PlayerSettings) -> Self {
        settings.filter.rebuild_cache();
        Self {
            state: RwLock::new(EngineState {
                session: None,
                timeline: Timeline::default(),
                active_index: 0,
                events: Vec::new(),
                window: VisibilityWindow::new(),
                clock: PlaybackClock::new(),
                settings,
                epoch: 0,
            }),
        }
    }

    /// セッションを読み込み、先頭セグメントをアクティブにする
    pub async fn load_session(&self, session: Session) -> ReplayResult<()> {
        if session.is_empty() {
            return Err(ReplayError::no_data("session has no segments"));
        }

        {
            let mut state = self.state.write();
            state.timeline = session.timeline();
            info!(
                "📺 [ENGINE] Session loaded: {} ({} segments, {:.1}s)",
                session.id(),
                session.len(),
                state.timeline.total_duration()
            );
            state.session = Some(session);
            state.active_index = 0;
            state.events.clear();
            state.window.reset();
            state.clock.reset();
            state.epoch += 1;
        }

        self.activate_segment(0).await
    }

    /// 指定セグメントをアクティブにし、チャットログをデコードする
    ///
    /// デコード中に別の切替が走った場合、遅れて完了した側の結果は捨てる。
    pub async fn activate_segment(&self, index: usize) -> ReplayResult<()> {
        let (log_path, token) = {
            let mut state = self.state.write();
            let session = state
                .session
                .as_ref()
                .ok_or_else(|| ReplayError::no_data("no session loaded"))?;
            let segment = session.segments.get(index).ok_or(ReplayError::SegmentOutOfRange {
                index,
                count: session.segments.len(),
            })?;
            let log_path = segment.log_path.clone();
            state.epoch += 1;
            (log_path, state.epoch)
        };

        // デコードはロック外。ログ欠損や破損はコメントなしで続行する
        let events = match &log_path {
            Some(path) => match decoder::decode_log_file(path).await {
                Ok(decoded) => decoded.events,
                Err(e) => {
                    warn!(
                        "⚠️ [ENGINE] Chat log decode failed, playing without chat: {}",
                        e
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut state = self.state.write();
        if state.epoch != token {
            debug!("🗑️ [ENGINE] Stale decode discarded for segment {}", index);
            return Ok(());
        }

        info!(
            "📺 [ENGINE] Segment {} active: {} events",
            index,
            events.len()
        );
        state.events = events;
        state.active_index = index;
        state.window.reset();
        state.clock.reset();
        Ok(())
    }

    /// 毎フレームの問い合わせ。生の再生位置から可視集合を得る
    pub fn frame(&self, raw_local_time: f64) -> FrameSnapshot {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let now = state.clock.tick(raw_local_time);
        let indices = state.window.visible_indices(
            &state.events,
            now,
            state.settings.scroll_speed,
            &state.settings.filter,
        );
        FrameSnapshot {
            time: now,
            visible: indices.into_iter().map(|i| state.events[i].clone()).collect(),
        }
    }

    pub fn play(&self, raw_local_time: f64) {
        self.state.write().clock.play(raw_local_time);
    }

    pub fn pause(&self) {
        self.state.write().clock.pause();
    }

    pub fn set_rate(&self, rate: f64) {
        self.state.write().clock.set_rate(rate);
    }

    /// ドラッグ中のシークプレビュー。状態は一切変えない
    pub fn preview_seek(&self, global_time: f64) -> SeekTarget {
        let state = self.state.read();
        state.timeline.seek_target(global_time, state.active_index)
    }

    /// シークを確定する。必要ならセグメントを切り替える
    pub async fn commit_seek(&self, global_time: f64) -> ReplayResult<SeekTarget> {
        let target = self.preview_seek(global_time);

        if target.requires_switch {
            self.activate_segment(target.segment_index).await?;
        }

        let mut state = self.state.write();
        state.clock.seek(target.local_time);
        state.window.reset();
        debug!(
            "⏩ [ENGINE] Seek committed: global {:.2}s -> segment {} @ {:.2}s",
            global_time, target.segment_index, target.local_time
        );
        Ok(target)
    }

    /// 実測尺の報告。タイムラインを丸ごと作り直す
    pub fn report_measured_duration(&self, index: usize, duration: f64) -> ReplayResult<()> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ReplayError::invalid_format(format!(
                "measured duration must be positive, got {}",
                duration
            )));
        }

        let mut state = self.state.write();
        {
            let session = state
                .session
                .as_mut()
                .ok_or_else(|| ReplayError::no_data("no session loaded"))?;
            let count = session.segments.len();
            let segment = session
                .segments
                .get_mut(index)
                .ok_or(ReplayError::SegmentOutOfRange { index, count })?;
            segment.measured_duration = Some(duration);
        }

        // 差し替えは一括。途中状態は外から見えない
        let timeline = state
            .session
            .as_ref()
            .map(|s| s.timeline())
            .unwrap_or_default();
        state.timeline = timeline;
        debug!(
            "🔄 [ENGINE] Timeline rebuilt after measured duration: segment {} = {:.1}s (total {:.1}s)",
            index,
            duration,
            state.timeline.total_duration()
        );
        Ok(())
    }

    /// セグメントローカル時刻をグローバル時刻へ
    pub fn global_position(&self, raw_local_time: f64) -> f64 {
        let state = self.state.read();
        state.timeline.local_to_global(state.active_index, raw_local_time)
    }

    pub fn total_duration(&self) -> f64 {
        self.state.read().timeline.total_duration()
    }

    pub fn active_index(&self) -> usize {
        self.state.read().active_index
    }

    pub fn timeline(&self) -> Timeline {
        self.state.read().timeline.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.read().session.as_ref().map(|s| s.id())
    }

    pub fn settings(&self) -> PlayerSettings {
        self.state.read().settings.clone()
    }

    /// 設定の差し替え。フィルターキャッシュも張り直す
    pub fn update_settings(&self, mut settings: PlayerSettings) {
        settings.filter.rebuild_cache();
        self.state.write().settings = settings;
    }

    /// アクティブセグメントのコメント密度（100ビン）
    pub fn active_segment_density(&self) -> Vec<f32> {
        let state = self.state.read();
        let duration = state
            .timeline
            .entry(state.active_index)
            .map(|e| e.duration)
            .unwrap_or(0.0);
        let times: Vec<f64> = state.events.iter().map(|e| e.time).collect();
        segment_density(&times, duration)
    }

    /// セッション全体のコメント密度（200ビン）
    ///
    /// 各セグメントのログを順に読み、ローカル時刻をエントリ開始で
    /// オフセットして集計する。ログのないセグメントは空白のまま
    /// オフセットだけ進む。
    pub async fn session_density(&self) -> ReplayResult<Vec<f32>> {
        let (segments, entries, total) = {
            let state = self.state.read();
            let session = state
                .session
                .as_ref()
                .ok_or_else(|| ReplayError::no_data("no session loaded"))?;
            (
                session.segments.clone(),
                state.timeline.entries().to_vec(),
                state.timeline.total_duration(),
            )
        };

        let mut global_times = Vec::new();
        for (segment, entry) in segments.iter().zip(entries.iter()) {
            let Some(log_path) = &segment.log_path else {
                continue;
            };
            match decoder::decode_log_file(log_path).await {
                Ok(decoded) => {
                    global_times.extend(decoded.events.iter().map(|e| entry.start + e.time));
                }
                Err(e) => {
                    warn!(
                        "⚠️ [ENGINE] Density scan skipped {}: {}",
                        log_path.display(),
                        e
                    );
                }
            }
        }

        Ok(session_density(&global_times, total))
    }
}
