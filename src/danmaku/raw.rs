//! Nested metadata extraction from the `raw` attribute of a chat record.
//!
//! The payload is a versioned, positionally-indexed JSON array whose shape
//! varies across recorder versions and is inconsistently populated. Every
//! accessor here is a pure function returning `Option`; results are merged
//! in priority order and a shape mismatch simply yields defaults. Nothing
//! in this module can fail a decode.

use serde_json::Value;
use std::collections::HashMap;

use super::event::{normalize_media_url, Medal};

/// Everything the raw payload can contribute to an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExtras {
    pub sender_name: Option<String>,
    pub medal: Option<Medal>,
    /// Sticker image URL, already normalized to https.
    pub sticker_url: Option<String>,
    /// Placeholder token -> normalized image URL.
    pub emotes: Option<HashMap<String, String>>,
}

impl RawExtras {
    pub fn is_empty(&self) -> bool {
        self.sender_name.is_none()
            && self.medal.is_none()
            && self.sticker_url.is_none()
            && self.emotes.is_none()
    }
}

/// Extract all known metadata from a raw payload string.
///
/// Unparsable JSON or an unrecognized shape returns an empty `RawExtras`.
pub fn extract(raw: &str) -> RawExtras {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return RawExtras::default(),
    };

    let packet = match packet_view(&value) {
        Some(p) => p,
        None => return RawExtras::default(),
    };

    let mut extras = RawExtras {
        sender_name: sender_name(packet),
        medal: medal(packet),
        sticker_url: sticker_url(packet),
        emotes: None,
    };

    if let Some(extra) = extra_payload(packet) {
        // 視聴者ごとのメダル色上書きは旧来の色より優先される
        if let (Some(medal), Some(color)) = (extras.medal.as_mut(), medal_color_override(&extra)) {
            medal.color = Some(color);
        }
        extras.emotes = emote_map(&extra);
    }

    extras
}

/// Locate the info packet: an array whose first element is an array and
/// whose second is a string, possibly behind a single-element wrapper.
fn packet_view(value: &Value) -> Option<&Value> {
    if is_packet(value) {
        return Some(value);
    }
    let arr = value.as_array()?;
    if arr.len() == 1 && is_packet(&arr[0]) {
        return Some(&arr[0]);
    }
    None
}

fn is_packet(value: &Value) -> bool {
    value
        .as_array()
        .map(|a| a.len() >= 2 && a[0].is_array() && a[1].is_string())
        .unwrap_or(false)
}

/// Sender name lives at packet[2][1].
fn sender_name(packet: &Value) -> Option<String> {
    let name = packet.get(2)?.get(1)?.as_str()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Loyalty medal lives at packet[3]: `[level, name, _, _, legacy_color, ...]`.
/// An empty array means the sender wears no medal.
fn medal(packet: &Value) -> Option<Medal> {
    let slot = packet.get(3)?.as_array()?;
    if slot.len() < 2 {
        return None;
    }
    let level = slot[0].as_u64()? as u32;
    let name = slot[1].as_str()?.to_string();
    let color = slot.get(4).and_then(|c| c.as_u64()).map(|c| c as u32);
    Some(Medal { name, level, color })
}

/// Sticker records carry an object with a `url` field at packet[0][13];
/// plain text records have a non-object placeholder there.
fn sticker_url(packet: &Value) -> Option<String> {
    let slot = packet.get(0)?.get(13)?;
    let url = slot.as_object()?.get("url")?.as_str()?;
    Some(normalize_media_url(url))
}

/// packet[0][15] holds an object whose `extra` field is itself a JSON
/// string with per-viewer data.
fn extra_payload(packet: &Value) -> Option<Value> {
    let extra_str = packet
        .get(0)?
        .get(15)?
        .as_object()?
        .get("extra")?
        .as_str()?;
    serde_json::from_str(extra_str).ok()
}

/// Per-viewer medal border color at extra.user.medal.color.
fn medal_color_override(extra: &Value) -> Option<u32> {
    extra
        .get("user")?
        .get("medal")?
        .get("color")?
        .as_u64()
        .map(|c| c as u32)
}

/// Emote map at extra.emots: token -> { url, ... }. May be null.
fn emote_map(extra: &Value) -> Option<HashMap<String, String>> {
    let emots = extra.get("emots")?.as_object()?;
    let mut map = HashMap::new();
    for (token, entry) in emots {
        if let Some(url) = entry.get("url").and_then(|u| u.as_str()) {
            map.insert(token.clone(), normalize_media_url(url));
        }
    }
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_packet() -> Value {
        json!([
            [0, 1, 25, 16777215, 1700000000000i64, 0, 0, "", 0, 0, 0, "", 0, "{}", "{}", {
                "extra": "{\"send_from_me\":false,\"color\":16777215,\"emots\":null,\"user\":{\"uid\":42,\"medal\":{\"name\":\"航海\",\"level\":21,\"color\":1725515}}}"
            }],
            "こんにちは",
            [42, "navigator", 0, 0, 0, 10000, 1, ""],
            [21, "航海", "captain", 21013, 6126494, "", 0, 6126494, 6126494, 6126494, 0, 1, 100]
        ])
    }

    #[test]
    fn test_packet_detection() {
        let packet = text_packet();
        assert!(is_packet(&packet));
        assert!(packet_view(&packet).is_some());

        // 単一要素のラッパーを剥がす
        let wrapped = json!([text_packet()]);
        assert!(!is_packet(&wrapped));
        assert!(packet_view(&wrapped).is_some());

        assert!(packet_view(&json!({"a": 1})).is_none());
        assert!(packet_view(&json!([1, 2, 3])).is_none());
        assert!(packet_view(&json!([])).is_none());
    }

    #[test]
    fn test_sender_and_medal_extraction() {
        let extras = extract(&text_packet().to_string());
        assert_eq!(extras.sender_name.as_deref(), Some("navigator"));

        let medal = extras.medal.expect("medal present");
        assert_eq!(medal.name, "航海");
        assert_eq!(medal.level, 21);
        // extra.user.medal.color (1725515) beats the legacy slot color (6126494)
        assert_eq!(medal.color, Some(1725515));
    }

    #[test]
    fn test_legacy_color_without_override() {
        let packet = json!([
            [0, 1, 25, 0, 1700000000000i64, 0, 0, "", 0, 0, 0, "", 0, "{}", "{}", {"extra": "{}"}],
            "text",
            [7, "someone"],
            [3, "fans", "streamer", 1234, 9272486]
        ]);
        let extras = extract(&packet.to_string());
        let medal = extras.medal.expect("medal present");
        assert_eq!(medal.color, Some(9272486));
    }

    #[test]
    fn test_empty_medal_slot_means_no_medal() {
        let packet = json!([
            [0, 1, 25, 0, 0, 0, 0, "", 0, 0, 0, "", 0, "{}", "{}", {"extra": "{}"}],
            "text",
            [7, "someone"],
            []
        ]);
        let extras = extract(&packet.to_string());
        assert!(extras.medal.is_none());
        assert_eq!(extras.sender_name.as_deref(), Some("someone"));
    }

    #[test]
    fn test_sticker_url_extraction() {
        let packet = json!([
            [0, 1, 25, 0, 0, 0, 0, "", 0, 0, 0, "", 0,
             {"url": "http://i0.hdslb.com/sticker/ab12.png", "emoticon_unique": "official_147"},
             "{}", {"extra": "{}"}],
            "[официальный]",
            [7, "someone"],
            []
        ]);
        let extras = extract(&packet.to_string());
        assert_eq!(
            extras.sticker_url.as_deref(),
            Some("https://i0.hdslb.com/sticker/ab12.png")
        );
    }

    #[test]
    fn test_emote_map_extraction() {
        let extra = json!({
            "emots": {
                "[dog]": {"url": "//i0.hdslb.com/emote/dog.png", "width": 20},
                "[cat]": {"url": "https://i0.hdslb.com/emote/cat.png"}
            }
        })
        .to_string();
        let packet = json!([
            [0, 1, 25, 0, 0, 0, 0, "", 0, 0, 0, "", 0, "{}", "{}", {"extra": extra}],
            "[dog][cat]",
            [7, "someone"],
            []
        ]);
        let extras = extract(&packet.to_string());
        let emotes = extras.emotes.expect("emotes present");
        assert_eq!(
            emotes.get("[dog]").map(String::as_str),
            Some("https://i0.hdslb.com/emote/dog.png")
        );
        assert_eq!(
            emotes.get("[cat]").map(String::as_str),
            Some("https://i0.hdslb.com/emote/cat.png")
        );
    }

    #[test]
    fn test_null_emots_is_absent() {
        let packet = json!([
            [0, 1, 25, 0, 0, 0, 0, "", 0, 0, 0, "", 0, "{}", "{}",
             {"extra": "{\"emots\":null}"}],
            "text",
            [7, "someone"],
            []
        ]);
        let extras = extract(&packet.to_string());
        assert!(extras.emotes.is_none());
    }

    #[test]
    fn test_garbage_degrades_to_empty() {
        assert!(extract("not json at all").is_empty());
        assert!(extract("{\"info\": 1}").is_empty());
        assert!(extract("[]").is_empty());
        assert!(extract("42").is_empty());
        // 壊れたextraフィールドは他の抽出結果に影響しない
        let packet = json!([
            [0, 1, 25, 0, 0, 0, 0, "", 0, 0, 0, "", 0, "{}", "{}", {"extra": "{broken"}],
            "text",
            [7, "someone"],
            []
        ]);
        let extras = extract(&packet.to_string());
        assert_eq!(extras.sender_name.as_deref(), Some("someone"));
        assert!(extras.emotes.is_none());
    }
}
