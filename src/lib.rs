pub mod danmaku;
pub mod error;
pub mod playback;
pub mod recording;
pub mod store;
pub mod timeline;
pub mod util;

// Re-export the main error types for convenience
pub use error::{ReplayError, ReplayResult};

// Re-export decoding entry points for convenience
pub use danmaku::{
    decode_log_file, parse_log_str, read_log_metadata, DanmakuEvent, DanmakuFilter, DecodedLog,
    EventKind, LogMetadata,
};

// Re-export recording discovery
pub use recording::{
    group_into_sessions, parse_recording_name, scan_directory, RoomId, Segment, Session,
};

// Re-export playback engine
pub use playback::{FrameSnapshot, PlaybackClock, ReplayEngine, VisibilityWindow};

// Re-export timeline types
pub use timeline::{SeekTarget, Timeline, TimelineEntry};

// Re-export persistence layer
pub use store::{KvStore, MemoryStore, PlayerSettings, StoreError, TomlKvStore};
