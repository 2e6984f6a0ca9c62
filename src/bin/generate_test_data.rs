//! 開発用テストデータ生成ツール
//!
//! セッション分割・密度表示・シーク動作を手元で確認するための
//! 録画ディレクトリ（ダミーメディア + チャットログ）を生成する。
//!
//! 使い方: cargo run --bin generate_test_data [出力先] [シード]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::path::Path;

const ROOM_ID: u64 = 21986;
const STREAMER: &str = "テスト配信者";

const PHRASES: &[&str] = &[
    "わこつ",
    "こんばんは",
    "草",
    "かわいい",
    "8888888",
    "初見です",
    "うまい",
    "それな",
    "待ってた",
    "おつかれさま",
    "nice",
    "今日も来た",
];

const VIEWERS: &[&str] = &["航海士A", "viewer_42", "夜更かし勢", "常連さん", "提督B"];

/// (日付, 時刻, 申告尺, タイトル, エポックms)
/// 先頭2本は連続、3本目は1時間超の間隔でセッションが分かれる
const SEGMENTS: &[(&str, &str, f64, &str, i64)] = &[
    ("20230415", "200000", 1800.0, "晚間雑談", 1_681_560_000_000),
    ("20230415", "203000", 1500.0, "晚間雑談", 1_681_561_800_000),
    ("20230415", "223000", 900.0, "深夜の続き", 1_681_569_000_000),
];

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let out_dir = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("demos/recordings");
    let seed: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(42);

    let mut rng = StdRng::seed_from_u64(seed);
    std::fs::create_dir_all(out_dir)?;

    for (i, (date, time, duration, title, epoch_ms)) in SEGMENTS.iter().enumerate() {
        let base = format!("录制-{}-{}-{}-{}-{}", ROOM_ID, date, time, i, title);
        let media = Path::new(out_dir).join(format!("{}.flv", base));

        // ダミーメディア。再生はできないがスキャナは拾う
        std::fs::write(&media, b"FLV\x01\x05placeholder")?;
        if i == 0 {
            std::fs::write(media.with_extension("jpg"), b"placeholder cover")?;
        }

        let start_rfc3339 = format!(
            "{}-{}-{}T{}:{}:{}.000+08:00",
            &date[0..4],
            &date[4..6],
            &date[6..8],
            &time[0..2],
            &time[2..4],
            &time[4..6]
        );
        let log = media.with_extension("xml");
        let count = write_chat_log(&log, title, &start_rfc3339, *duration, *epoch_ms, &mut rng)?;
        println!("  {} ({} レコード)", log.display(), count);
    }

    println!("✅ テストデータを生成しました: {}", out_dir);
    println!("   確認: cargo run --bin danrev -- scan {}", out_dir);
    Ok(())
}

/// バースト（盛り上がり）つきのチャットログを1本書き出す
fn write_chat_log(
    path: &Path,
    title: &str,
    start_rfc3339: &str,
    duration: f64,
    epoch_ms: i64,
    rng: &mut StdRng,
) -> anyhow::Result<usize> {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<i>\n");
    xml.push_str(&format!(
        "<BililiveRecorderRecordInfo roomid=\"{}\" name=\"{}\" title=\"{}\" start_time=\"{}\" duration=\"{}\" />\n",
        ROOM_ID, STREAMER, title, start_rfc3339, duration
    ));

    // 一様なベースライン + 数カ所のバースト
    let mut times: Vec<f64> = Vec::new();
    for _ in 0..(duration / 12.0) as usize {
        times.push(rng.gen_range(0.0..duration));
    }
    for _ in 0..rng.gen_range(2..5) {
        let center = rng.gen_range(0.0..duration);
        for _ in 0..rng.gen_range(20..60) {
            let t = center + rng.gen_range(-25.0..25.0);
            if (0.0..duration).contains(&t) {
                times.push(t);
            }
        }
    }
    times.sort_by(|a, b| a.partial_cmp(b).unwrap());

    for (i, t) in times.iter().enumerate() {
        let ts = epoch_ms + (*t * 1000.0) as i64;
        let uid = rng.gen_range(10_000u64..999_999);
        let sender = VIEWERS[rng.gen_range(0..VIEWERS.len())];
        let color: u32 = if rng.gen_range(0..10) < 8 {
            16777215
        } else {
            [9055202u32, 5816798, 14893055][rng.gen_range(0..3)]
        };

        if i % 31 == 30 {
            // ステッカー（本文なし・自己閉じタグ）
            let raw = json!([
                [0, 1, 25, 0, ts, 0, 0, "", 0, 0, 0, "", 0,
                 {"url": format!("//i0.hdslb.com/sticker/official_{}.png", i % 7),
                  "emoticon_unique": format!("official_{}", i % 7)},
                 "{}", {"extra": "{}"}],
                "",
                [uid, sender],
                []
            ]);
            xml.push_str(&format!(
                "<d p=\"{:.3},1,25,0,{},0,{:x},{}\" raw=\"{}\"/>\n",
                t,
                ts,
                uid,
                i,
                escape_attr(&raw.to_string())
            ));
            continue;
        }

        let (body, extra) = if i % 19 == 18 {
            // 単独エモート
            (
                "[dog]".to_string(),
                json!({"emots": {"[dog]": {"url": "//i0.hdslb.com/emote/dog.png", "width": 20, "height": 20}}})
                    .to_string(),
            )
        } else {
            (
                PHRASES[rng.gen_range(0..PHRASES.len())].to_string(),
                "{\"emots\":null}".to_string(),
            )
        };

        let medal = if i % 7 < 3 {
            json!([rng.gen_range(1..28), "航海", STREAMER, ROOM_ID, 6126494])
        } else {
            json!([])
        };

        let raw = json!([
            [0, 1, 25, color, ts, 0, 0, "", 0, 0, 0, "", 0, "{}", "{}", {"extra": extra}],
            body,
            [uid, sender],
            medal
        ]);
        xml.push_str(&format!(
            "<d p=\"{:.3},1,25,{},{},0,{:x},{}\" raw=\"{}\">{}</d>\n",
            t,
            color,
            ts,
            uid,
            i,
            escape_attr(&raw.to_string()),
            body
        ));
    }

    xml.push_str("</i>\n");
    let count = times.len();
    std::fs::write(path, xml)?;
    Ok(count)
}

/// XML属性値用のエスケープ
fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
