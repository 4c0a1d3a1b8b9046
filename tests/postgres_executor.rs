//! Runs only when `TEST_DATABASE_URL` points at a scratch Postgres.
//! Every test works in its own schema, which is dropped afterwards.

use async_trait::async_trait;
use metrics_sql_bot::db::{load_dataset, ExecutionOutcome, PgStore, QueryExecutor, ScalarStore};
use metrics_sql_bot::llm::Translator;
use metrics_sql_bot::models::Dataset;
use metrics_sql_bot::pipeline::{Pipeline, RunOutcome};
use metrics_sql_bot::TranslationError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const DATASET: &str = r#"{
  "videos": [
    {
      "id": "0b7f7a6e-8d2a-4a8e-9f53-3c1f3b1c2d4e",
      "creator_id": "aca1061a9d324ecf8c3fa2bb32d7be63",
      "video_created_at": "2025-11-27T22:30:00Z",
      "views_count": 1000,
      "likes_count": 40,
      "comments_count": 3,
      "reports_count": 0,
      "created_at": "2025-11-27T22:30:00Z",
      "updated_at": "2025-12-01T00:00:00Z",
      "snapshots": [
        {
          "id": "s-1",
          "views_count": 400,
          "likes_count": 10,
          "comments_count": 1,
          "reports_count": 0,
          "delta_views_count": 400,
          "delta_likes_count": 10,
          "delta_comments_count": 1,
          "delta_reports_count": 0,
          "created_at": "2025-11-28T10:00:00Z",
          "updated_at": "2025-11-28T10:00:00Z"
        },
        {
          "id": "s-2",
          "views_count": 1000,
          "likes_count": 40,
          "comments_count": 3,
          "reports_count": 0,
          "delta_views_count": 600,
          "delta_likes_count": 30,
          "delta_comments_count": 2,
          "delta_reports_count": 0,
          "created_at": "2025-11-28T11:00:00Z",
          "updated_at": "2025-11-28T11:00:00Z"
        }
      ]
    },
    {
      "id": "5c1d2e3f-4a5b-6c7d-8e9f-0a1b2c3d4e5f",
      "creator_id": 7,
      "video_created_at": "2025-11-29T08:00:00Z",
      "views_count": 300,
      "likes_count": 2,
      "comments_count": 0,
      "reports_count": 1,
      "created_at": "2025-11-29T08:00:00Z",
      "updated_at": "2025-11-29T08:00:00Z"
    },
    {
      "id": "9e8d7c6b-5a49-4837-a625-140f1e2d3c4b",
      "creator_id": "aca1061a9d324ecf8c3fa2bb32d7be63",
      "video_created_at": "2025-11-28T23:30:00Z",
      "views_count": 500,
      "likes_count": 11,
      "comments_count": 1,
      "reports_count": 0,
      "created_at": "2025-11-28T23:30:00Z",
      "updated_at": "2025-11-28T23:30:00Z"
    }
  ]
}"#;

const DATED_COUNT: &str = "SELECT COUNT(*) FROM videos \
    WHERE CAST(video_created_at AT TIME ZONE 'UTC' AS DATE) = '2025-11-28';";

struct Scratch {
    admin: PgPool,
    pool: PgPool,
    schema: String,
}

impl Scratch {
    async fn cleanup(self) {
        self.pool.close().await;
        let drop = format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema);
        self.admin.execute(drop.as_str()).await.unwrap();
        self.admin.close().await;
    }
}

async fn scratch() -> Option<Scratch> {
    scratch_with(4).await
}

async fn scratch_with(max_connections: u32) -> Option<Scratch> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return None;
        }
    };

    let schema = format!("bot_test_{}", Uuid::new_v4().simple());
    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    admin
        .execute(format!("CREATE SCHEMA {}", schema).as_str())
        .await
        .unwrap();

    let search_path = format!("SET search_path TO {}", schema);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                conn.execute(search_path.as_str()).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .unwrap();

    let dataset: Dataset = serde_json::from_str(DATASET).unwrap();
    load_dataset(&pool, dataset).await.unwrap();

    Some(Scratch {
        admin,
        pool,
        schema,
    })
}

fn store(pool: &PgPool) -> PgStore {
    PgStore::new(pool.clone(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_loader_counts_rows() {
    let Some(scratch) = scratch().await else {
        return;
    };

    let videos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
        .fetch_one(&scratch.pool)
        .await
        .unwrap();
    let snapshots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM video_snapshots")
        .fetch_one(&scratch.pool)
        .await
        .unwrap();
    assert_eq!(videos, 3);
    assert_eq!(snapshots, 2);

    let creator: String = sqlx::query_scalar(
        "SELECT creator_id FROM videos WHERE id = '5c1d2e3f-4a5b-6c7d-8e9f-0a1b2c3d4e5f'",
    )
    .fetch_one(&scratch.pool)
    .await
    .unwrap();
    assert_eq!(creator, "7");

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_scalars_come_back_as_text() {
    let Some(scratch) = scratch().await else {
        return;
    };
    let executor = QueryExecutor::new(Arc::new(store(&scratch.pool)));

    assert_eq!(
        executor.execute("SELECT COUNT(*) FROM videos;").await,
        ExecutionOutcome::Scalar("3".to_string())
    );
    assert_eq!(
        executor.execute("SELECT SUM(delta_views_count) FROM video_snapshots").await,
        ExecutionOutcome::Scalar("1000".to_string())
    );
    assert_eq!(
        executor
            .execute(
                "SELECT COUNT(*) FROM videos \
                 WHERE CAST(video_created_at AT TIME ZONE 'UTC' AS DATE) = '2025-11-27'"
            )
            .await,
        ExecutionOutcome::Scalar("1".to_string())
    );
    assert_eq!(
        executor.execute("SELECT creator_id FROM videos ORDER BY views_count DESC LIMIT 1").await,
        ExecutionOutcome::Scalar("aca1061a9d324ecf8c3fa2bb32d7be63".to_string())
    );

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_no_rows_and_null_are_default() {
    let Some(scratch) = scratch().await else {
        return;
    };
    let executor = QueryExecutor::new(Arc::new(store(&scratch.pool)));

    assert_eq!(
        executor.execute("SELECT views_count FROM videos WHERE false").await,
        ExecutionOutcome::Default
    );
    assert_eq!(
        executor.execute("SELECT SUM(views_count) FROM videos WHERE false").await,
        ExecutionOutcome::Default
    );

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_bad_sql_is_default() {
    let Some(scratch) = scratch().await else {
        return;
    };
    let executor = QueryExecutor::new(Arc::new(store(&scratch.pool)));

    assert_eq!(
        executor.execute("SELECT no_such_column FROM videos").await,
        ExecutionOutcome::Default
    );
    // The pool is still usable afterwards.
    assert_eq!(
        executor.execute("SELECT COUNT(*) FROM videos").await,
        ExecutionOutcome::Scalar("3".to_string())
    );

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_writes_fail_inside_read_only_transaction() {
    let Some(scratch) = scratch().await else {
        return;
    };
    let store = store(&scratch.pool);

    let result = store
        .fetch_scalar("WITH gone AS (DELETE FROM videos RETURNING 1) SELECT COUNT(*) FROM gone")
        .await;
    assert!(result.is_err());

    let videos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
        .fetch_one(&scratch.pool)
        .await
        .unwrap();
    assert_eq!(videos, 3);

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_statement_timeout_is_enforced() {
    let Some(scratch) = scratch().await else {
        return;
    };
    let store = PgStore::new(scratch.pool.clone(), Duration::from_secs(1));

    let result = store.fetch_scalar("SELECT pg_sleep(5)").await;
    assert!(result.is_err());

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_scalar_rendering_matches_reply_format() {
    let Some(scratch) = scratch().await else {
        return;
    };
    let store = store(&scratch.pool);

    let cases = [
        ("SELECT true", "True"),
        ("SELECT 2.0::float8", "2.0"),
        ("SELECT 12.50::numeric", "12.50"),
        ("SELECT SUM(views_count) FROM videos", "1800"),
        (
            "SELECT MIN(created_at) FROM video_snapshots",
            "2025-11-28 10:00:00+00:00",
        ),
        ("SELECT DATE '2025-11-28'", "2025-11-28"),
        ("SELECT '0b7f7a6e-8d2a-4a8e-9f53-3c1f3b1c2d4e'::uuid", "0b7f7a6e-8d2a-4a8e-9f53-3c1f3b1c2d4e"),
    ];
    for (sql, expected) in cases {
        assert_eq!(
            store.fetch_scalar(sql).await.unwrap().as_deref(),
            Some(expected),
            "{}",
            sql
        );
    }

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_stacked_commands_are_refused_by_the_database() {
    let Some(scratch) = scratch().await else {
        return;
    };
    let executor = QueryExecutor::new(Arc::new(store(&scratch.pool)));

    // A `--` inside a literal hides the rest of the line from comment stripping.
    let outcome = executor
        .execute("SELECT '--'; COMMIT; DROP TABLE videos; -- '")
        .await;
    assert_eq!(outcome, ExecutionOutcome::Default);

    let videos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
        .fetch_one(&scratch.pool)
        .await
        .unwrap();
    assert_eq!(videos, 3);

    scratch.cleanup().await;
}

struct FixedSql(&'static str);

#[async_trait]
impl Translator for FixedSql {
    async fn translate(&self, _question: &str) -> Result<String, TranslationError> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn test_dated_count_question_against_database() {
    let Some(scratch) = scratch().await else {
        return;
    };
    let pipeline = Pipeline::new(
        Arc::new(FixedSql(DATED_COUNT)),
        QueryExecutor::new(Arc::new(store(&scratch.pool))),
    );

    let outcome = pipeline.answer("Сколько видео вышло 28 ноября 2025?").await;
    assert_eq!(
        outcome,
        RunOutcome::Answered(ExecutionOutcome::Scalar("1".to_string()))
    );
    assert_eq!(outcome.reply_text(), "1");

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_cancelled_run_returns_its_connection() {
    let Some(scratch) = scratch_with(1).await else {
        return;
    };
    let store = Arc::new(PgStore::new(scratch.pool.clone(), Duration::from_secs(1)));

    let dropped = tokio::time::timeout(
        Duration::from_millis(200),
        store.fetch_scalar("SELECT pg_sleep(5)"),
    )
    .await;
    assert!(dropped.is_err());

    let aborted = {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_scalar("SELECT pg_sleep(5)").await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    aborted.abort();
    assert!(aborted.await.unwrap_err().is_cancelled());

    let started = std::time::Instant::now();
    let value = store.fetch_scalar("SELECT 1").await.unwrap();
    assert_eq!(value.as_deref(), Some("1"));
    assert!(started.elapsed() < Duration::from_secs(5));

    scratch.cleanup().await;
}
