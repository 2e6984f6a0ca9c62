//! 録画ファイル関連モジュール
//!
//! ファイル名の解析、サイドカーの対応付け、セッションへのグループ化を
//! 担当する。ここで組み立てたセッションが再生エンジンの入力になる。

pub mod naming;
pub mod scanner;
pub mod segment;

pub use naming::*;
pub use scanner::*;
pub use segment::*;
