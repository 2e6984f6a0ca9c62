//! セッションごとの再開位置
//!
//! 再開位置はグローバル時間で保存する。セグメントの実測尺が後から
//! 補正されてもグローバル座標なら意味を保てるため。エントリ数は
//! MRU順で上限100件に刈り込む。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{KvStore, StoreError, StoreHelper};

/// 再開位置の保存キー
pub const RESUME_KEY: &str = "playback.resume";
/// 保持する再開位置の上限件数
pub const RESUME_CAP: usize = 100;

/// 1セッション分の再開位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeEntry {
    pub session_id: String,
    /// セッション先頭からのグローバル秒
    pub global_time: f64,
    pub updated_at: DateTime<Utc>,
}

/// 全再開位置をMRU順（先頭が最新）で読み込む。欠損・破損は空扱い
pub async fn load_resume_entries<S: KvStore + ?Sized>(store: &S) -> Vec<ResumeEntry> {
    match StoreHelper::get_typed::<Vec<ResumeEntry>, S>(store, RESUME_KEY).await {
        Ok(Some(entries)) => entries,
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("⚠️ Failed to load resume entries: {}", e);
            Vec::new()
        }
    }
}

/// 指定セッションの再開位置を取得
pub async fn resume_position<S: KvStore + ?Sized>(store: &S, session_id: &str) -> Option<f64> {
    load_resume_entries(store)
        .await
        .iter()
        .find(|e| e.session_id == session_id)
        .map(|e| e.global_time)
}

/// 再開位置を記録する（既存エントリは先頭へ移動、上限超過分は切り捨て）
pub async fn record_resume_position<S: KvStore + ?Sized>(
    store: &S,
    session_id: &str,
    global_time: f64,
) -> Result<(), StoreError> {
    if !global_time.is_finite() || global_time < 0.0 {
        return Err(StoreError::Validation(format!(
            "Invalid resume position: {}",
            global_time
        )));
    }

    let mut entries = load_resume_entries(store).await;
    entries.retain(|e| e.session_id != session_id);
    entries.insert(
        0,
        ResumeEntry {
            session_id: session_id.to_string(),
            global_time,
            updated_at: Utc::now(),
        },
    );
    entries.truncate(RESUME_CAP);

    StoreHelper::set_typed(store, RESUME_KEY, &entries).await?;
    debug!(
        "💾 Resume position recorded: {} @ {:.1}s ({} entries)",
        session_id,
        global_time,
        entries.len()
    );
    Ok(())
}

/// 指定セッションの再開位置を消す（最後まで見終わったときなど）
pub async fn clear_resume_position<S: KvStore + ?Sized>(
    store: &S,
    session_id: &str,
) -> Result<(), StoreError> {
    let mut entries = load_resume_entries(store).await;
    let before = entries.len();
    entries.retain(|e| e.session_id != session_id);
    if entries.len() != before {
        StoreHelper::set_typed(store, RESUME_KEY, &entries).await?;
    }
    Ok(())
}
