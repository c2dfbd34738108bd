use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::chapter::Chapter;

/// Canonical numeric video id (the platform's archive id). Keys snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub i64);

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "av{}", self.0)
    }
}

/// How a caller names a video: numeric archive id or `BV` string id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VideoRef {
    Aid(VideoId),
    Bvid(String),
}

impl VideoRef {
    pub fn aid(aid: i64) -> Self {
        VideoRef::Aid(VideoId(aid))
    }

    pub fn bvid(bvid: impl Into<String>) -> Self {
        VideoRef::Bvid(bvid.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            VideoRef::Aid(_) => false,
            VideoRef::Bvid(bvid) => bvid.trim().is_empty(),
        }
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoRef::Aid(aid) => write!(f, "{aid}"),
            VideoRef::Bvid(bvid) => f.write_str(bvid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid video reference '{0}': expected a numeric id, av<digits> or BV<id>")]
pub struct ParseVideoRefError(pub String);

impl FromStr for VideoRef {
    type Err = ParseVideoRefError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        let prefix = value.get(..2).filter(|_| value.len() > 2);
        if prefix.is_some_and(|p| p.eq_ignore_ascii_case("bv")) {
            return Ok(VideoRef::Bvid(value.to_string()));
        }

        let digits = match prefix {
            Some(p) if p.eq_ignore_ascii_case("av") => &value[2..],
            _ => value,
        };

        digits
            .parse::<i64>()
            .ok()
            .filter(|aid| *aid > 0)
            .map(VideoRef::aid)
            .ok_or_else(|| ParseVideoRefError(raw.to_string()))
    }
}

impl Serialize for VideoRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VideoRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// What the metadata supplier knows about a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_id: VideoId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bvid: Option<String>,
    #[serde(default)]
    pub title: String,
    pub chapters: Vec<Chapter>,
}

impl VideoMetadata {
    pub fn matches(&self, video: &VideoRef) -> bool {
        match video {
            VideoRef::Aid(aid) => *aid == self.video_id,
            VideoRef::Bvid(bvid) => self.bvid.as_deref() == Some(bvid.as_str()),
        }
    }
}
