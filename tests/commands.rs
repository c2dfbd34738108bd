use std::path::Path;

use clap::Parser;
use watchtime_lib::{
    cli::{execute, Cli},
    settings::SettingsStore,
    ChapterId, Database, VideoId, VideoRef,
};

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("watchtime.sqlite3");
        SettingsStore::new(dir.path().join("watchtime.json"))
            .unwrap()
            .update(|s| s.database_path = db_path)
            .unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_str().unwrap().to_string()
    }

    async fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        let config = self.path("watchtime.json");
        let mut argv = vec!["watchtime", "--config", config.as_str()];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let mut out = Vec::new();
        execute(cli, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn database(&self) -> Database {
        Database::new(self.dir.path().join("watchtime.sqlite3")).unwrap()
    }
}

fn write(path: &str, contents: &str) {
    std::fs::write(Path::new(path), contents).unwrap();
}

const TWO_VIDEOS: &str = r#"[
  {"video_id": 170001, "bvid": "BV17x411w7KC", "title": "lecture",
   "chapters": [{"id": 11, "ordinal": 1, "duration_secs": 600},
                {"id": 12, "ordinal": 2, "duration_secs": 300}]},
  {"video_id": 42,
   "chapters": [{"id": 1, "ordinal": 1, "duration_secs": 60}]}
]"#;

#[tokio::test]
async fn import_accepts_an_array_of_videos() {
    let ws = Workspace::new();
    let file = ws.path("videos.json");
    write(&file, TWO_VIDEOS);

    let out = ws.run(&["import-chapters", "--file", &file]).await.unwrap();
    assert_eq!(out.lines().count(), 2);

    let db = ws.database();
    assert_eq!(db.list_videos().await.unwrap(), vec![VideoId(42), VideoId(170001)]);
    let lecture = db.get_video(&VideoRef::bvid("BV17x411w7KC")).await.unwrap().unwrap();
    assert_eq!(lecture.chapters.len(), 2);
}

#[tokio::test]
async fn import_accepts_a_single_document() {
    let ws = Workspace::new();
    let file = ws.path("one.json");
    write(
        &file,
        r#"{"video_id": 7, "chapters": [{"id": 70, "ordinal": 1, "duration_secs": 120}]}"#,
    );

    ws.run(&["import-chapters", "--file", &file]).await.unwrap();
    assert!(ws.database().get_video(&VideoRef::aid(7)).await.unwrap().is_some());
}

#[tokio::test]
async fn import_rejects_invalid_chapter_lists() {
    let ws = Workspace::new();
    let file = ws.path("broken.json");
    write(
        &file,
        r#"{"video_id": 9, "chapters": [{"id": 1, "ordinal": 1, "duration_secs": 60},
                                        {"id": 2, "ordinal": 1, "duration_secs": 60}]}"#,
    );

    let err = ws.run(&["import-chapters", "--file", &file]).await.unwrap_err();
    assert!(format!("{err:#}").contains("ordinal 1"));
    assert!(ws.database().get_video(&VideoRef::aid(9)).await.unwrap().is_none());
}

#[tokio::test]
async fn record_appends_snapshots_and_resolves_bvid() {
    let ws = Workspace::new();
    let file = ws.path("videos.json");
    write(&file, TWO_VIDEOS);
    ws.run(&["import-chapters", "--file", &file]).await.unwrap();

    let first: i64 = ws
        .run(&[
            "record", "--video", "av42", "--chapter", "1", "--offset", "15", "--at",
            "2025-06-01T20:00:00Z",
        ])
        .await
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let second: i64 = ws
        .run(&[
            "record", "--video", "BV17x411w7KC", "--chapter", "12", "--offset", "30", "--at",
            "2025-06-01T20:05:00Z",
        ])
        .await
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(second > first);

    let db = ws.database();
    let latest = db.latest_snapshot(VideoId(170001)).await.unwrap().unwrap();
    assert_eq!(latest.id, Some(second));
    assert_eq!(latest.chapter_id, ChapterId(12));
    assert_eq!(latest.offset_secs, 30);
    assert_eq!(db.latest_snapshot(VideoId(42)).await.unwrap().unwrap().offset_secs, 15);
}

#[tokio::test]
async fn record_with_unknown_bvid_fails() {
    let ws = Workspace::new();
    let err = ws
        .run(&["record", "--video", "BV1unknown", "--chapter", "1", "--offset", "0"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("import its chapters first"));
}
