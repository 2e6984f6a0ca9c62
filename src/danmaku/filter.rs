//! 弾幕表示フィルター
//!
//! キーワードブロックリストとメダルレベル閾値の2条件。どちらか一方でも
//! 引っかかれば非表示になる（AND合成ではなく除外の合成）。

use serde::{Deserialize, Serialize};

use super::event::DanmakuEvent;

/// 弾幕フィルター構造体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DanmakuFilter {
    /// メダルレベル閾値（Noneで無効。設定時は未満を非表示、メダルなしは0扱い）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_medal_level: Option<u32>,
    /// ブロックキーワード（本文への大小文字無視の部分一致で非表示）
    pub blocked_words: Vec<String>,

    // パフォーマンス最適化用キャッシュ
    #[serde(skip)]
    lowercased_words: Vec<String>,
}

impl DanmakuFilter {
    /// 新しいフィルターを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// すべてのフィルターをクリア
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// デシリアライズ後にキャッシュを再構築する
    ///
    /// `blocked_words` はserdeで往復するがキャッシュは往復しないため、
    /// ストアから読み込んだ直後に必ず呼ぶこと。
    pub fn rebuild_cache(&mut self) {
        self.lowercased_words = self.blocked_words.iter().map(|w| w.to_lowercase()).collect();
    }

    /// ブロックキーワードを追加（最適化版）
    pub fn add_blocked_word(&mut self, word: String) {
        self.lowercased_words.push(word.to_lowercase());
        self.blocked_words.push(word);
    }

    /// ブロックキーワードを削除（最適化版）
    pub fn remove_blocked_word(&mut self, word: &str) {
        if let Some(pos) = self.blocked_words.iter().position(|w| w == word) {
            self.blocked_words.remove(pos);
            self.lowercased_words.remove(pos);
        }
    }

    /// メダルレベル閾値を設定
    pub fn set_min_medal_level(&mut self, level: Option<u32>) {
        self.min_medal_level = level;
    }

    /// イベントが表示条件を満たすかチェック（最適化版）
    pub fn matches(&self, event: &DanmakuEvent) -> bool {
        // キーワードブロック（最適化済み）
        if !self.lowercased_words.is_empty() {
            let content_lower = event.content.to_lowercase();
            let blocked = self
                .lowercased_words
                .iter()
                .any(|word| content_lower.contains(word));
            if blocked {
                return false;
            }
        }

        // メダルレベル閾値（メダルなしはレベル0）
        if let Some(min_level) = self.min_medal_level {
            if event.medal_level() < min_level {
                return false;
            }
        }

        true
    }

    /// フィルター適用してイベントリストを取得
    pub fn filter_events(&self, events: &[DanmakuEvent]) -> Vec<DanmakuEvent> {
        events
            .iter()
            .filter(|event| self.matches(event))
            .cloned()
            .collect()
    }

    /// アクティブなフィルター数を取得
    pub fn active_filter_count(&self) -> usize {
        let mut count = 0;
        if !self.blocked_words.is_empty() {
            count += 1;
        }
        if self.min_medal_level.is_some() {
            count += 1;
        }
        count
    }

    /// フィルターが有効かどうか
    pub fn is_active(&self) -> bool {
        self.active_filter_count() > 0
    }

    /// ブロックキーワードのリストを取得
    pub fn blocked_words(&self) -> &[String] {
        &self.blocked_words
    }
}
