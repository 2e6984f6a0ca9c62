//! danrev - 録画チャットログの照会CLI
//!
//! 録画ディレクトリのセッション一覧、チャットログの内容確認、
//! コメント密度ヒストグラムの表示を行う。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use danrev::timeline::{density_profile, SEGMENT_SMOOTH_RADIUS};
use danrev::util::{format_clock, truncate_title};
use danrev::{decode_log_file, scan_directory, EventKind};

#[derive(Parser)]
#[command(name = "danrev")]
#[command(about = "Inspect danmaku recordings and chat logs")]
#[command(version)]
struct Args {
    /// ログをファイルへ出力する（日次ローテーション）
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a recording directory and list sessions
    Scan {
        /// 録画ディレクトリ
        dir: PathBuf,
    },

    /// Show metadata and event counts for one chat log
    Inspect {
        /// チャットログ (.xml)
        log: PathBuf,
    },

    /// Print a comment density histogram for one chat log
    Density {
        /// チャットログ (.xml)
        log: PathBuf,

        /// ビン数
        #[arg(long, default_value_t = 50)]
        bins: usize,

        /// バーの最大幅（文字数）
        #[arg(long, default_value_t = 60)]
        width: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // tokio-consoleの初期化（プロファイリング用）
    #[cfg(feature = "debug-tokio")]
    console_subscriber::init();

    let args = Args::parse();

    #[cfg(not(feature = "debug-tokio"))]
    let _log_guard = if args.log_file {
        Some(danrev::util::init_file_logging()?)
    } else {
        danrev::util::init_logging()?;
        None
    };

    match args.command {
        Command::Scan { dir } => cmd_scan(&dir).await,
        Command::Inspect { log } => cmd_inspect(&log).await,
        Command::Density { log, bins, width } => cmd_density(&log, bins, width).await,
    }
}

async fn cmd_scan(dir: &Path) -> Result<()> {
    let sessions = scan_directory(dir)
        .await
        .with_context(|| format!("failed to scan {}", dir.display()))?;

    if sessions.is_empty() {
        println!("録画が見つかりませんでした: {}", dir.display());
        return Ok(());
    }

    for session in &sessions {
        let timeline = session.timeline();
        println!(
            "📺 {}  {}  [{} セグメント / {}]",
            session.id(),
            truncate_title(session.title.as_deref().unwrap_or("(無題)"), 24),
            session.len(),
            format_clock(timeline.total_duration())
        );
        for (i, (segment, entry)) in session
            .segments
            .iter()
            .zip(timeline.entries())
            .enumerate()
        {
            println!(
                "   {:>2}. {}  +{:<8} {:<8} {}",
                i,
                segment.start_time.format("%m-%d %H:%M:%S"),
                format_clock(entry.start),
                format_clock(entry.duration),
                if segment.log_path.is_some() { "💬" } else { "" }
            );
        }
    }
    Ok(())
}

async fn cmd_inspect(log: &Path) -> Result<()> {
    let decoded = decode_log_file(log)
        .await
        .with_context(|| format!("failed to decode {}", log.display()))?;

    let meta = &decoded.metadata;
    println!("チャットログ: {}", log.display());
    if let Some(room_id) = meta.room_id {
        println!("  ルーム    : {}", room_id);
    }
    if let Some(streamer) = &meta.streamer {
        println!("  配信者    : {}", streamer);
    }
    if let Some(title) = &meta.title {
        println!("  タイトル  : {}", title);
    }
    if let Some(start) = meta.start_time {
        println!("  開始時刻  : {}", start.format("%Y-%m-%d %H:%M:%S %Z"));
    }
    if let Some(duration) = meta.declared_duration {
        println!("  申告尺    : {}", format_clock(duration));
    }

    println!(
        "  イベント  : {} 件（{} 件破棄）",
        decoded.events.len(),
        decoded.dropped
    );
    if let (Some(first), Some(last)) = (decoded.events.first(), decoded.events.last()) {
        println!(
            "  時刻範囲  : {} 〜 {}",
            format_clock(first.time),
            format_clock(last.time)
        );
    }
    let stickers = decoded
        .events
        .iter()
        .filter(|e| e.kind == EventKind::Sticker)
        .count();
    if stickers > 0 {
        println!("  ステッカー: {} 件", stickers);
    }
    Ok(())
}

async fn cmd_density(log: &Path, bins: usize, width: usize) -> Result<()> {
    if bins == 0 {
        anyhow::bail!("--bins must be at least 1");
    }

    let decoded = decode_log_file(log)
        .await
        .with_context(|| format!("failed to decode {}", log.display()))?;

    // 尺はメタデータ優先、なければ最後のコメント時刻で代用
    let duration = decoded
        .metadata
        .declared_duration
        .or_else(|| decoded.events.last().map(|e| e.time))
        .unwrap_or(0.0);

    if duration <= 0.0 || decoded.events.is_empty() {
        println!("表示できる密度がありません: {}", log.display());
        return Ok(());
    }

    let times: Vec<f64> = decoded.events.iter().map(|e| e.time).collect();
    let profile = density_profile(&times, duration, bins, SEGMENT_SMOOTH_RADIUS);
    let bin_width = duration / bins as f64;

    println!(
        "コメント密度: {} 件 / {}（{} ビン）",
        decoded.events.len(),
        format_clock(duration),
        bins
    );
    for (i, value) in profile.iter().enumerate() {
        let bar_len = (value * width as f32).round() as usize;
        println!(
            "{:>8} |{}",
            format_clock(bin_width * i as f64),
            "█".repeat(bar_len)
        );
    }
    Ok(())
}
