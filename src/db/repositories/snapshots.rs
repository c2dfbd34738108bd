use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    helpers::{clamp_storable, format_datetime, is_storable, parse_datetime},
    Database,
};
use crate::models::{ChapterId, Snapshot, VideoId};
use crate::sources::SnapshotStore;

fn row_to_snapshot(row: &Row) -> Result<Snapshot> {
    let recorded_at: String = row.get("recorded_at")?;
    Ok(Snapshot {
        id: Some(row.get("id")?),
        video_id: VideoId(row.get("aid")?),
        chapter_id: ChapterId(row.get("cid")?),
        offset_secs: row.get("offset_secs")?,
        captured_at: parse_datetime(&recorded_at, "recorded_at")?,
    })
}

impl Database {
    /// Appends a snapshot and returns its row id.
    pub async fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<i64> {
        if !is_storable(snapshot.captured_at) {
            bail!(
                "snapshot captured at {} is outside years 0000-9999",
                snapshot.captured_at.to_rfc3339()
            );
        }
        let record = snapshot.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO snapshots (aid, cid, offset_secs, recorded_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.video_id.0,
                    record.chapter_id.0,
                    record.offset_secs,
                    format_datetime(record.captured_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn latest_snapshot(&self, video: VideoId) -> Result<Option<Snapshot>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, aid, cid, offset_secs, recorded_at
                 FROM snapshots
                 WHERE aid = ?1
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT 1",
            )?;

            let mut rows = stmt.query(params![video.0])?;
            let snapshot = match rows.next()? {
                Some(row) => Some(row_to_snapshot(row)?),
                None => None,
            };
            Ok(snapshot)
        })
        .await
    }
}

#[async_trait]
impl SnapshotStore for Database {
    async fn query_range(
        &self,
        video: VideoId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        let from = format_datetime(clamp_storable(from));
        let to = format_datetime(clamp_storable(to));
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, aid, cid, offset_secs, recorded_at
                 FROM snapshots
                 WHERE aid = ?1 AND recorded_at BETWEEN ?2 AND ?3
                 ORDER BY recorded_at ASC, id ASC",
            )?;

            let mut rows = stmt.query(params![video.0, from, to])?;
            let mut snapshots = Vec::new();
            while let Some(row) = rows.next()? {
                snapshots.push(row_to_snapshot(row)?);
            }
            Ok(snapshots)
        })
        .await
    }
}
