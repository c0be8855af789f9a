//! Database access for prato-sync
//!
//! The embedded SQLite database stands in for the document store: one table
//! per record family, status fields stored in place on each row.

pub mod store;

pub use store::{RecordStore, SqliteRecordStore};

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (or create) the database file and ensure the tables exist
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Pinned to a single connection: every `sqlite::memory:` connection is a
/// separate database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create record tables if they don't exist
///
/// `synced` is nullable on purpose: NULL (never attempted), 0, 1.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipes_generated (
            id TEXT PRIMARY KEY,
            recipe_name TEXT NOT NULL,
            query TEXT,
            full_recipe TEXT,
            user_id TEXT NOT NULL,
            created_at TEXT,
            calories INTEGER,
            image_url TEXT,
            preparation_time INTEGER,
            servings INTEGER,
            synced INTEGER,
            synced_at TEXT,
            sync_error TEXT,
            last_sync_attempt TEXT,
            recipe_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS favorite_items (
            path TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            name TEXT,
            recipe_name TEXT,
            response TEXT,
            full_recipe TEXT,
            added_at TEXT,
            query TEXT,
            image_url TEXT,
            list_id TEXT,
            synced INTEGER,
            synced_at TEXT,
            sync_error TEXT,
            last_sync_attempt TEXT,
            recipe_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_favorite_items_collection ON favorite_items (collection, synced)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (recipes_generated, favorite_items)");

    Ok(())
}
