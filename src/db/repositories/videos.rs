use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    helpers::{format_datetime, to_u32},
    Database,
};
use crate::error::VideoNotFound;
use crate::models::{Chapter, ChapterId, VideoId, VideoMetadata, VideoRef};
use crate::sources::MetadataSupplier;

fn row_to_chapter(row: &Row) -> Result<Chapter> {
    let page: i64 = row.get("page")?;
    Ok(Chapter {
        id: ChapterId(row.get("cid")?),
        ordinal: to_u32(page, "page")?,
        duration_secs: row.get("duration_secs")?,
        title: row.get("title")?,
    })
}

fn load_video(conn: &Connection, video: &VideoRef) -> Result<Option<VideoMetadata>> {
    let header: Option<(i64, Option<String>, String)> = match video {
        VideoRef::Aid(aid) => conn
            .query_row(
                "SELECT aid, bvid, title FROM videos WHERE aid = ?1",
                params![aid.0],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?,
        VideoRef::Bvid(bvid) => conn
            .query_row(
                "SELECT aid, bvid, title FROM videos WHERE bvid = ?1",
                params![bvid],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?,
    };

    let Some((aid, bvid, title)) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT cid, page, title, duration_secs
         FROM chapters
         WHERE aid = ?1
         ORDER BY page ASC",
    )?;
    let mut rows = stmt.query(params![aid])?;
    let mut chapters = Vec::new();
    while let Some(row) = rows.next()? {
        chapters.push(row_to_chapter(row)?);
    }

    Ok(Some(VideoMetadata {
        video_id: VideoId(aid),
        bvid,
        title,
        chapters,
    }))
}

impl Database {
    /// Stores a video and replaces its chapter list.
    pub async fn upsert_video(&self, metadata: &VideoMetadata) -> Result<()> {
        let record = metadata.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO videos (aid, bvid, title, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(aid) DO UPDATE SET
                     bvid = excluded.bvid,
                     title = excluded.title,
                     updated_at = excluded.updated_at",
                params![
                    record.video_id.0,
                    record.bvid,
                    record.title,
                    format_datetime(Utc::now()),
                ],
            )
            .with_context(|| format!("failed to upsert video {}", record.video_id))?;

            tx.execute("DELETE FROM chapters WHERE aid = ?1", params![record.video_id.0])?;
            {
                let mut insert = tx.prepare(
                    "INSERT INTO chapters (aid, cid, page, title, duration_secs)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for chapter in &record.chapters {
                    insert
                        .execute(params![
                            record.video_id.0,
                            chapter.id.0,
                            chapter.ordinal,
                            chapter.title,
                            chapter.duration_secs,
                        ])
                        .with_context(|| {
                            format!(
                                "failed to store chapter {} of video {}",
                                chapter.id, record.video_id
                            )
                        })?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_video(&self, video: &VideoRef) -> Result<Option<VideoMetadata>> {
        let video = video.clone();
        self.execute(move |conn| load_video(conn, &video)).await
    }

    pub async fn list_videos(&self) -> Result<Vec<VideoId>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT aid FROM videos ORDER BY aid ASC")?;
            let mut rows = stmt.query([])?;
            let mut ids = Vec::new();
            while let Some(row) = rows.next()? {
                ids.push(VideoId(row.get(0)?));
            }
            Ok(ids)
        })
        .await
    }
}

#[async_trait]
impl MetadataSupplier for Database {
    async fn get_chapters(&self, video: &VideoRef) -> Result<VideoMetadata> {
        match self.get_video(video).await? {
            Some(metadata) => Ok(metadata),
            None => Err(VideoNotFound(video.clone()).into()),
        }
    }
}
