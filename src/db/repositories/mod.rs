pub mod snapshots;
pub mod videos;
