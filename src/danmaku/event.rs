use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 色未指定を表すセンチネル値（純白として描画する）
pub const DEFAULT_COLOR: u32 = 0xFFFFFF;

/// 弾幕イベントの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EventKind {
    #[default]
    Text,
    Sticker,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Text => "text",
            EventKind::Sticker => "sticker",
        }
    }
}

/// 視聴者ロイヤリティバッジ（ファンメダル）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medal {
    pub name: String,
    pub level: u32,
    /// メダルの縁色。視聴者ごとの上書き値が旧フィールドより優先される
    pub color: Option<u32>,
}

/// 1件の弾幕イベント
///
/// デコード後は `lane` 以外不変。`time` はセグメント先頭からの秒数で、
/// 同値の重複を許す昇順キー。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DanmakuEvent {
    pub time: f64,
    pub kind: EventKind,
    pub content: String,
    /// ステッカー画像、または単独エモートのURL（常にhttps化済み）
    pub media_ref: Option<String>,
    pub color: u32,
    pub sender_name: String,
    pub sender_id: String,
    pub medal: Option<Medal>,
    /// プレースホルダートークン → 画像URL
    pub emotes: Option<HashMap<String, String>>,
    pub pool_id: u32,
    pub row_id: String,
    pub server_timestamp: i64,
    /// 表示レーン。デコード後のレーン割り当てで設定される
    pub lane: usize,
}

impl DanmakuEvent {
    /// メダルレベルを取得（メダルなしは0扱い）
    pub fn medal_level(&self) -> u32 {
        self.medal.as_ref().map(|m| m.level).unwrap_or(0)
    }

    /// de-dup / 安定キー用の識別子
    pub fn stable_key(&self) -> String {
        if self.row_id.is_empty() {
            format!("{}:{}", self.server_timestamp, self.sender_id)
        } else {
            self.row_id.clone()
        }
    }
}

/// 昇順ソート（NaNは末尾送り）。デコーダは入力順を信用せず必ずこれを通す
pub fn sort_events_by_time(events: &mut [DanmakuEvent]) {
    events.sort_by(|a, b| {
        a.time
            .partial_cmp(&b.time)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// 画像URLをhttpsの絶対形式に正規化する。冪等
///
/// `//host/...` と `http://...` は `https://` に書き換え、それ以外は
/// そのまま返す。
pub fn normalize_media_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    }
}

/// 生の色値をデコードする。0は「色なし」のセンチネルで白に落とす
pub fn decode_color(raw: u32) -> u32 {
    if raw == 0 {
        DEFAULT_COLOR
    } else {
        raw
    }
}
