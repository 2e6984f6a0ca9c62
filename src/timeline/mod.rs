//! タイムライン関連モジュール
//!
//! セッションを貫く仮想グローバル時間軸の構築と、シークバー表示用の
//! コメント密度プロファイル生成を担当する。

pub mod density;
pub mod reconciler;

pub use density::*;
pub use reconciler::*;
