pub mod chapter;
pub mod snapshot;
pub mod video;
pub mod window;

pub use chapter::{Chapter, ChapterId};
pub use snapshot::Snapshot;
pub use video::{ParseVideoRefError, VideoId, VideoMetadata, VideoRef};
pub use window::{Attribution, WatchedWindow, Window};
