//! Bulk loader for the dataset JSON file.
//!
//! Recreates both tables, then inserts videos (and their nested snapshots)
//! in batches, one transaction per batch.

use crate::db::schema;
use crate::error::{BotError, Result};
use crate::models::{Dataset, VideoRecord, VideoSnapshot};
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::path::Path;
use tracing::info;

/// Videos per transaction.
pub const VIDEO_BATCH_SIZE: usize = 100;

// 12 bind parameters per snapshot row; Postgres caps a statement at 65535.
const SNAPSHOT_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub videos_loaded: usize,
    pub snapshots_loaded: usize,
    pub videos_in_db: i64,
    pub snapshots_in_db: i64,
}

pub async fn read_dataset(path: &Path) -> Result<Dataset> {
    info!(path = %path.display(), "Reading dataset");
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content)
        .map_err(|e| BotError::Dataset(format!("{}: {}", path.display(), e)))
}

/// Replace the contents of `videos` and `video_snapshots` with `dataset`.
pub async fn load_dataset(pool: &PgPool, dataset: Dataset) -> Result<LoadSummary> {
    schema::recreate_tables(pool).await?;

    let total = dataset.videos.len();
    info!(total, "Found videos to load");

    let mut summary = LoadSummary::default();
    for batch in dataset.videos.chunks(VIDEO_BATCH_SIZE) {
        summary.snapshots_loaded += insert_batch(pool, batch).await?;
        summary.videos_loaded += batch.len();

        let done = summary.videos_loaded;
        if done % 500 == 0 || done == total {
            info!(done, total, progress = done * 100 / total, "Loaded videos");
        }
    }

    info!(
        videos = summary.videos_loaded,
        snapshots = summary.snapshots_loaded,
        "Load finished"
    );

    summary.videos_in_db = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
        .fetch_one(pool)
        .await?;
    summary.snapshots_in_db = sqlx::query_scalar("SELECT COUNT(*) FROM video_snapshots")
        .fetch_one(pool)
        .await?;

    info!(
        videos = summary.videos_in_db,
        snapshots = summary.snapshots_in_db,
        "Verified row counts"
    );
    Ok(summary)
}

async fn insert_batch(pool: &PgPool, batch: &[VideoRecord]) -> Result<usize> {
    let mut tx = pool.begin().await?;

    let mut videos: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO videos (id, creator_id, video_created_at, views_count, likes_count, \
         comments_count, reports_count, created_at, updated_at) ",
    );
    videos.push_values(batch, |mut row, record| {
        let video = &record.video;
        row.push_bind(video.id)
            .push_bind(video.creator_id.clone())
            .push_bind(video.video_created_at)
            .push_bind(video.views_count)
            .push_bind(video.likes_count)
            .push_bind(video.comments_count)
            .push_bind(video.reports_count)
            .push_bind(video.created_at)
            .push_bind(video.updated_at);
    });
    videos.build().execute(&mut *tx).await?;

    let snapshots: Vec<VideoSnapshot> = batch
        .iter()
        .flat_map(|record| {
            let video_id = record.video.id;
            record
                .snapshots
                .iter()
                .cloned()
                .map(move |snapshot| snapshot.into_snapshot(video_id))
        })
        .collect();

    for chunk in snapshots.chunks(SNAPSHOT_CHUNK_SIZE) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO video_snapshots (id, video_id, views_count, likes_count, comments_count, \
             reports_count, delta_views_count, delta_likes_count, delta_comments_count, \
             delta_reports_count, created_at, updated_at) ",
        );
        builder.push_values(chunk, |mut row, snapshot| {
            row.push_bind(snapshot.id.clone())
                .push_bind(snapshot.video_id)
                .push_bind(snapshot.views_count)
                .push_bind(snapshot.likes_count)
                .push_bind(snapshot.comments_count)
                .push_bind(snapshot.reports_count)
                .push_bind(snapshot.delta_views_count)
                .push_bind(snapshot.delta_likes_count)
                .push_bind(snapshot.delta_comments_count)
                .push_bind(snapshot.delta_reports_count)
                .push_bind(snapshot.created_at)
                .push_bind(snapshot.updated_at);
        });
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(snapshots.len())
}
