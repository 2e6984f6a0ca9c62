//! 再生時刻の平滑化クロック
//!
//! メディアプレイヤーが報告する生の再生位置は更新間隔が粗く、そのまま
//! 使うとコメントの流れがカクつく。報告値が変わらない間だけ壁時計で
//! 外挿し、変わった瞬間に必ず報告値へスナップする。報告値が常に正で、
//! クロックは勝手に先走らない。

use std::time::Instant;

use tracing::debug;

/// クロックの内部状態
#[derive(Debug, Clone, Copy, PartialEq)]
enum ClockState {
    /// 停止中。tick は生値をそのまま返す
    Idle,
    /// 再生中。アンカーからの経過壁時間で外挿する
    Running {
        base: f64,
        base_at: Instant,
        last_raw: f64,
    },
}

/// 生の再生位置を滑らかな表示時刻へ変換するクロック
///
/// play / pause / seek / セグメント切替のたびにアンカーを完全に
/// リセットする。不連続点をまたいで外挿が残ると表示時刻が飛ぶため。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    state: ClockState,
    rate: f64,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            state: ClockState::Idle,
            rate: 1.0,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ClockState::Running { .. })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// 再生開始。生値にアンカーを張り直す
    pub fn play(&mut self, raw: f64) {
        self.play_at(raw, Instant::now());
    }

    pub fn play_at(&mut self, raw: f64, now: Instant) {
        let raw = sanitize(raw);
        debug!("▶️ [CLOCK] play: anchor={:.3}", raw);
        self.state = ClockState::Running {
            base: raw,
            base_at: now,
            last_raw: raw,
        };
    }

    /// 一時停止。以後の tick は生値をそのまま返す
    pub fn pause(&mut self) {
        debug!("⏸️ [CLOCK] pause");
        self.state = ClockState::Idle;
    }

    /// シークまたはセグメント切替。再生状態は維持し、アンカーだけ張り直す
    pub fn seek(&mut self, raw: f64) {
        self.seek_at(raw, Instant::now());
    }

    pub fn seek_at(&mut self, raw: f64, now: Instant) {
        let raw = sanitize(raw);
        debug!("⏩ [CLOCK] seek: anchor={:.3}", raw);
        if self.is_running() {
            self.state = ClockState::Running {
                base: raw,
                base_at: now,
                last_raw: raw,
            };
        }
    }

    /// アンカーを破棄して停止状態へ戻す（セグメント切替時など）
    ///
    /// 再生速度は平滑化状態ではなく設定なので維持する。
    pub fn reset(&mut self) {
        self.state = ClockState::Idle;
    }

    /// 再生速度の変更。現在の表示時刻を新アンカーにして飛びを防ぐ
    pub fn set_rate(&mut self, rate: f64) {
        self.set_rate_at(rate, Instant::now());
    }

    pub fn set_rate_at(&mut self, rate: f64, now: Instant) {
        if !rate.is_finite() || rate <= 0.0 {
            debug!("⚠️ [CLOCK] ignoring invalid rate: {}", rate);
            return;
        }
        if let ClockState::Running {
            base,
            base_at,
            last_raw,
        } = self.state
        {
            let current = base + now.duration_since(base_at).as_secs_f64() * self.rate;
            self.state = ClockState::Running {
                base: current,
                base_at: now,
                last_raw,
            };
        }
        self.rate = rate;
    }

    /// 生の再生位置から表示時刻を得る
    ///
    /// 生値が前回から1ミリでも動いていればスナップ、動いていなければ
    /// アンカーからの外挿値を返す。
    pub fn tick(&mut self, raw: f64) -> f64 {
        self.tick_at(raw, Instant::now())
    }

    pub fn tick_at(&mut self, raw: f64, now: Instant) -> f64 {
        let raw = sanitize(raw);
        match self.state {
            ClockState::Idle => raw,
            ClockState::Running {
                base,
                base_at,
                last_raw,
            } => {
                if raw != last_raw {
                    // 生値が動いた。常にそちらが正
                    self.state = ClockState::Running {
                        base: raw,
                        base_at: now,
                        last_raw: raw,
                    };
                    raw
                } else {
                    base + now.duration_since(base_at).as_secs_f64() * self.rate
                }
            }
        }
    }
}

fn sanitize(raw: f64) -> f64 {
    if raw.is_finite() && raw >= 0.0 {
        raw
    } else {
        0.0
    }
}
