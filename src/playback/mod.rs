//! 再生制御
//!
//! 平滑化クロック・可視窓・エンジン本体。

pub mod clock;
pub mod engine;
pub mod window;

pub use clock::*;
pub use engine::*;
pub use window::*;
