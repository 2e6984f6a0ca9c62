//! プレイヤー設定の永続化
//!
//! 設定は必ず「保存値 + デフォルト」のマージを通して読み込む。
//! 保存側のフィールドが欠けていても、壊れていても、常に完全な
//! 設定構造体が得られる。

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{KvStore, StoreError, StoreHelper};
use crate::danmaku::DanmakuFilter;
use crate::playback::MIN_SCROLL_SPEED;

/// 設定の保存キー
pub const SETTINGS_KEY: &str = "player.settings";

/// プレイヤー表示設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// コメントのスクロール速度（1.0が標準、下限0.5）
    pub scroll_speed: f64,
    /// コメントの不透明度（0.0〜1.0）
    pub opacity: f64,
    /// フォント倍率
    pub font_scale: f64,
    /// 表示フィルター
    #[serde(default)]
    pub filter: DanmakuFilter,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            scroll_speed: 1.0,
            opacity: 0.8,
            font_scale: 1.0,
            filter: DanmakuFilter::default(),
        }
    }
}

impl PlayerSettings {
    /// 範囲外の値をデフォルトまたは境界へ丸め、フィルターキャッシュを再構築する
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.scroll_speed.is_finite() {
            self.scroll_speed = defaults.scroll_speed;
        }
        self.scroll_speed = self.scroll_speed.max(MIN_SCROLL_SPEED);

        if self.opacity.is_finite() {
            self.opacity = self.opacity.clamp(0.0, 1.0);
        } else {
            self.opacity = defaults.opacity;
        }

        if !self.font_scale.is_finite() || self.font_scale <= 0.0 {
            self.font_scale = defaults.font_scale;
        }

        self.filter.rebuild_cache();
        self
    }

    /// ストアから設定を読み込む
    ///
    /// 欠損・破損はデフォルトで埋める。読み込みが再生を止めることはない。
    pub async fn load<S: KvStore + ?Sized>(store: &S) -> PlayerSettings {
        match StoreHelper::get_typed::<PartialPlayerSettings, S>(store, SETTINGS_KEY).await {
            Ok(Some(partial)) => partial.merge_with_defaults(&PlayerSettings::default()),
            Ok(None) => PlayerSettings::default(),
            Err(e) => {
                warn!("⚠️ Failed to load player settings, using defaults: {}", e);
                PlayerSettings::default()
            }
        }
    }

    /// ストアへ設定を保存する
    pub async fn save<S: KvStore + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        StoreHelper::set_typed(store, SETTINGS_KEY, self).await
    }
}

/// 保存形式の設定（全フィールド任意）
///
/// 古いバージョンが書いたファイルや手で編集されたファイルを、
/// 欠けたフィールドごと受け入れるための読み込み専用の型。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialPlayerSettings {
    pub scroll_speed: Option<f64>,
    pub opacity: Option<f64>,
    pub font_scale: Option<f64>,
    pub filter: Option<DanmakuFilter>,
}

impl PartialPlayerSettings {
    /// 保存値をデフォルトへ重ねて完全な設定を作る
    pub fn merge_with_defaults(self, defaults: &PlayerSettings) -> PlayerSettings {
        PlayerSettings {
            scroll_speed: self.scroll_speed.unwrap_or(defaults.scroll_speed),
            opacity: self.opacity.unwrap_or(defaults.opacity),
            font_scale: self.font_scale.unwrap_or(defaults.font_scale),
            filter: self.filter.unwrap_or_else(|| defaults.filter.clone()),
        }
        .sanitized()
    }
}
