//! DDL for the two relations the bot answers questions about.

use sqlx::PgPool;
use tracing::info;

pub const DROP_TABLES: [&str; 2] = [
    "DROP TABLE IF EXISTS video_snapshots CASCADE",
    "DROP TABLE IF EXISTS videos CASCADE",
];

pub const CREATE_VIDEOS: &str = r#"
CREATE TABLE videos (
    id UUID PRIMARY KEY,
    creator_id VARCHAR,
    video_created_at TIMESTAMPTZ,
    views_count BIGINT,
    likes_count BIGINT,
    comments_count BIGINT,
    reports_count BIGINT,
    created_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ
)"#;

pub const CREATE_VIDEO_SNAPSHOTS: &str = r#"
CREATE TABLE video_snapshots (
    id VARCHAR PRIMARY KEY,
    video_id UUID REFERENCES videos (id),
    views_count BIGINT,
    likes_count BIGINT,
    comments_count BIGINT,
    reports_count BIGINT,
    delta_views_count BIGINT,
    delta_likes_count BIGINT,
    delta_comments_count BIGINT,
    delta_reports_count BIGINT,
    created_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ
)"#;

pub const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX idx_video_snapshots_video_created ON video_snapshots (video_id, created_at)",
    "CREATE INDEX idx_videos_creator ON videos (creator_id)",
];

/// Drop and recreate both tables in one transaction.
pub async fn recreate_tables(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    info!("Dropping existing tables");
    for statement in DROP_TABLES {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    sqlx::query(CREATE_VIDEOS).execute(&mut *tx).await?;
    sqlx::query(CREATE_VIDEO_SNAPSHOTS).execute(&mut *tx).await?;
    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    info!("Tables recreated");
    Ok(())
}
