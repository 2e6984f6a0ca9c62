// 共通ユーティリティ関数

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 強化されたログ初期化
pub fn init_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    subscriber.try_init()?;

    Ok(())
}

/// ファイル出力つきログ初期化（日次ローテーション）
///
/// 返されたガードを破棄すると未書き込み分がフラッシュされるため、
/// main の終わりまで保持すること。
pub fn init_file_logging() -> anyhow::Result<WorkerGuard> {
    let project_dirs = directories::ProjectDirs::from("dev", "danrev", "danrev")
        .ok_or_else(|| anyhow::anyhow!("ホームディレクトリを特定できません"))?;
    let log_dir = project_dirs.data_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "danrev.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(false)
            .compact(),
    );

    subscriber.try_init()?;

    tracing::info!("📁 ログ出力先: {}", log_dir.display());
    Ok(guard)
}

/// 秒数を時計表記へ（1時間未満は M:SS、以上は H:MM:SS）
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// 長いタイトルを一覧表示用に切り詰める
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let kept: String = title.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept)
}
