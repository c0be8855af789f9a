//! Record store
//!
//! `RecordStore` is the seam between the relay and the document store. The
//! relay never reaches a global client: a handle is built once in `main` and
//! passed everywhere, so tests can hand in an in-memory database and a frozen
//! clock.
//!
//! Status writes take their timestamps from the store's own clock
//! (server-assigned), never from the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prato_common::events::{EventBus, SyncEvent};
use prato_common::path::ITEMS_COLLECTION;
use prato_common::records::{
    FavoritedRecipe, GeneratedRecipe, RecordKey, SyncStatus, UnsyncedPredicate,
};
use prato_common::{Clock, DocumentPath, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Storage operations the relay needs
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new generated recipe and announce it
    async fn insert_generated(&self, record: &GeneratedRecipe) -> Result<()>;

    /// Insert a new favorited item and announce it
    async fn insert_favorited(&self, record: &FavoritedRecipe) -> Result<()>;

    async fn get_generated(&self, id: &str) -> Result<Option<GeneratedRecipe>>;

    async fn get_favorited(&self, path: &DocumentPath) -> Result<Option<FavoritedRecipe>>;

    /// Up to `limit` generated recipes matching `predicate`, oldest first
    async fn unsynced_generated(
        &self,
        predicate: UnsyncedPredicate,
        limit: u32,
    ) -> Result<Vec<GeneratedRecipe>>;

    /// Up to `limit` favorited items matching `predicate` across every user
    /// and list (collection-group query), oldest first
    async fn unsynced_favorited(
        &self,
        predicate: UnsyncedPredicate,
        limit: u32,
    ) -> Result<Vec<FavoritedRecipe>>;

    /// `synced=true, syncedAt=now, recipeId=remote_id` (+ `listId` for favorites)
    async fn write_success(&self, key: &RecordKey, remote_id: &str) -> Result<DateTime<Utc>>;

    /// `synced=false, syncError=message, lastSyncAttempt=now`
    async fn write_failure(&self, key: &RecordKey, message: &str) -> Result<DateTime<Utc>>;

    /// Stamp every record `synced=true, syncedAt=now` in one atomic write
    ///
    /// Returns the number of records stamped. On error nothing is written.
    async fn stamp_synced(&self, keys: &[RecordKey]) -> Result<usize>;
}

/// SQLite-backed record store
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, event_bus: EventBus) -> Self {
        Self {
            pool,
            clock,
            event_bus,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn announce_created(&self, key: RecordKey) {
        self.event_bus.emit_lossy(SyncEvent::RecordCreated {
            key,
            timestamp: self.clock.now(),
        });
    }
}

fn predicate_sql(predicate: UnsyncedPredicate) -> &'static str {
    match predicate {
        UnsyncedPredicate::ExplicitlyFalse => "synced = 0",
        UnsyncedPredicate::NotTrue => "synced IS NOT 1",
    }
}

fn format_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339())
}

fn parse_ts(column: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
        })
        .transpose()
}

fn map_insert_error(e: sqlx::Error, key: &RecordKey) -> Error {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return Error::InvalidInput(format!("Record already exists: {}", key));
        }
    }
    Error::Database(e)
}

fn status_from_row(row: &SqliteRow) -> Result<SyncStatus> {
    Ok(SyncStatus {
        synced: row.get("synced"),
        synced_at: parse_ts("synced_at", row.get("synced_at"))?,
        sync_error: row.get("sync_error"),
        last_sync_attempt: parse_ts("last_sync_attempt", row.get("last_sync_attempt"))?,
        recipe_id: row.get("recipe_id"),
    })
}

fn generated_from_row(row: &SqliteRow) -> Result<GeneratedRecipe> {
    Ok(GeneratedRecipe {
        id: row.get("id"),
        recipe_name: row.get("recipe_name"),
        query: row.get("query"),
        full_recipe: row.get("full_recipe"),
        user_id: row.get("user_id"),
        created_at: parse_ts("created_at", row.get("created_at"))?,
        calories: row.get("calories"),
        image_url: row.get("image_url"),
        preparation_time: row.get("preparation_time"),
        servings: row.get("servings"),
        status: status_from_row(row)?,
    })
}

fn favorited_from_row(row: &SqliteRow) -> Result<FavoritedRecipe> {
    let path: String = row.get("path");
    Ok(FavoritedRecipe {
        path: DocumentPath::new(path),
        name: row.get("name"),
        recipe_name: row.get("recipe_name"),
        response: row.get("response"),
        full_recipe: row.get("full_recipe"),
        added_at: parse_ts("added_at", row.get("added_at"))?,
        query: row.get("query"),
        image_url: row.get("image_url"),
        list_id: row.get("list_id"),
        status: status_from_row(row)?,
    })
}

const GENERATED_COLUMNS: &str = "id, recipe_name, query, full_recipe, user_id, created_at, \
     calories, image_url, preparation_time, servings, \
     synced, synced_at, sync_error, last_sync_attempt, recipe_id";

const FAVORITED_COLUMNS: &str = "path, name, recipe_name, response, full_recipe, added_at, \
     query, image_url, list_id, \
     synced, synced_at, sync_error, last_sync_attempt, recipe_id";

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_generated(&self, record: &GeneratedRecipe) -> Result<()> {
        let key = RecordKey::Generated(record.id.clone());

        sqlx::query(
            r#"
            INSERT INTO recipes_generated (
                id, recipe_name, query, full_recipe, user_id, created_at,
                calories, image_url, preparation_time, servings,
                synced, synced_at, sync_error, last_sync_attempt, recipe_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.recipe_name)
        .bind(&record.query)
        .bind(&record.full_recipe)
        .bind(&record.user_id)
        .bind(format_ts(record.created_at))
        .bind(record.calories)
        .bind(&record.image_url)
        .bind(record.preparation_time)
        .bind(record.servings)
        .bind(record.status.synced)
        .bind(format_ts(record.status.synced_at))
        .bind(&record.status.sync_error)
        .bind(format_ts(record.status.last_sync_attempt))
        .bind(&record.status.recipe_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &key))?;

        tracing::debug!(record = %key, "Generated recipe stored");
        self.announce_created(key);
        Ok(())
    }

    async fn insert_favorited(&self, record: &FavoritedRecipe) -> Result<()> {
        record.path.validate_document()?;
        let key = RecordKey::Favorited(record.path.clone());
        let collection = record.path.collection().unwrap_or(ITEMS_COLLECTION);

        sqlx::query(
            r#"
            INSERT INTO favorite_items (
                path, collection, name, recipe_name, response, full_recipe,
                added_at, query, image_url, list_id,
                synced, synced_at, sync_error, last_sync_attempt, recipe_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.path.as_str())
        .bind(collection)
        .bind(&record.name)
        .bind(&record.recipe_name)
        .bind(&record.response)
        .bind(&record.full_recipe)
        .bind(format_ts(record.added_at))
        .bind(&record.query)
        .bind(&record.image_url)
        .bind(&record.list_id)
        .bind(record.status.synced)
        .bind(format_ts(record.status.synced_at))
        .bind(&record.status.sync_error)
        .bind(format_ts(record.status.last_sync_attempt))
        .bind(&record.status.recipe_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &key))?;

        tracing::debug!(record = %key, "Favorited recipe stored");
        self.announce_created(key);
        Ok(())
    }

    async fn get_generated(&self, id: &str) -> Result<Option<GeneratedRecipe>> {
        let sql = format!("SELECT {GENERATED_COLUMNS} FROM recipes_generated WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(generated_from_row).transpose()
    }

    async fn get_favorited(&self, path: &DocumentPath) -> Result<Option<FavoritedRecipe>> {
        let sql = format!("SELECT {FAVORITED_COLUMNS} FROM favorite_items WHERE path = ?");
        let row = sqlx::query(&sql)
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(favorited_from_row).transpose()
    }

    async fn unsynced_generated(
        &self,
        predicate: UnsyncedPredicate,
        limit: u32,
    ) -> Result<Vec<GeneratedRecipe>> {
        let sql = format!(
            "SELECT {GENERATED_COLUMNS} FROM recipes_generated WHERE {} ORDER BY rowid LIMIT ?",
            predicate_sql(predicate)
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(generated_from_row).collect()
    }

    async fn unsynced_favorited(
        &self,
        predicate: UnsyncedPredicate,
        limit: u32,
    ) -> Result<Vec<FavoritedRecipe>> {
        let sql = format!(
            "SELECT {FAVORITED_COLUMNS} FROM favorite_items \
             WHERE collection = ? AND {} ORDER BY rowid LIMIT ?",
            predicate_sql(predicate)
        );
        let rows = sqlx::query(&sql)
            .bind(ITEMS_COLLECTION)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(favorited_from_row).collect()
    }

    async fn write_success(&self, key: &RecordKey, remote_id: &str) -> Result<DateTime<Utc>> {
        let now = self.clock.now();

        let result = match key {
            RecordKey::Generated(id) => {
                sqlx::query(
                    "UPDATE recipes_generated SET synced = 1, synced_at = ?, recipe_id = ? WHERE id = ?",
                )
                .bind(now.to_rfc3339())
                .bind(remote_id)
                .bind(id)
                .execute(&self.pool)
                .await?
            }
            RecordKey::Favorited(path) => {
                sqlx::query(
                    "UPDATE favorite_items SET synced = 1, synced_at = ?, recipe_id = ?, list_id = ? WHERE path = ?",
                )
                .bind(now.to_rfc3339())
                .bind(remote_id)
                .bind(path.list_id())
                .bind(path.as_str())
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Record not found: {}", key)));
        }
        Ok(now)
    }

    async fn write_failure(&self, key: &RecordKey, message: &str) -> Result<DateTime<Utc>> {
        let now = self.clock.now();

        let result = match key {
            RecordKey::Generated(id) => {
                sqlx::query(
                    "UPDATE recipes_generated SET synced = 0, sync_error = ?, last_sync_attempt = ? WHERE id = ?",
                )
                .bind(message)
                .bind(now.to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await?
            }
            RecordKey::Favorited(path) => {
                sqlx::query(
                    "UPDATE favorite_items SET synced = 0, sync_error = ?, last_sync_attempt = ? WHERE path = ?",
                )
                .bind(message)
                .bind(now.to_rfc3339())
                .bind(path.as_str())
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Record not found: {}", key)));
        }
        Ok(now)
    }

    async fn stamp_synced(&self, keys: &[RecordKey]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let mut stamped = 0usize;

        for key in keys {
            let result = match key {
                RecordKey::Generated(id) => {
                    sqlx::query("UPDATE recipes_generated SET synced = 1, synced_at = ? WHERE id = ?")
                        .bind(&now)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?
                }
                RecordKey::Favorited(path) => {
                    sqlx::query("UPDATE favorite_items SET synced = 1, synced_at = ? WHERE path = ?")
                        .bind(&now)
                        .bind(path.as_str())
                        .execute(&mut *tx)
                        .await?
                }
            };

            // A vanished record fails the whole batch, like a bulk update would
            if result.rows_affected() == 0 {
                return Err(Error::NotFound(format!("Record not found: {}", key)));
            }
            stamped += 1;
        }

        tx.commit().await?;
        Ok(stamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use chrono::TimeZone;
    use prato_common::records::{NewFavoritedRecipe, NewGeneratedRecipe};
    use prato_common::FixedClock;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 5, 13, 41, 28).unwrap()
    }

    async fn store_with_clock() -> (SqliteRecordStore, Arc<FixedClock>, EventBus) {
        let pool = init_memory_pool().await.unwrap();
        let clock = Arc::new(FixedClock::new(t0()));
        let bus = EventBus::new(100);
        let store = SqliteRecordStore::new(pool, clock.clone(), bus.clone());
        (store, clock, bus)
    }

    fn generated(id: &str, synced: Option<bool>) -> GeneratedRecipe {
        NewGeneratedRecipe {
            recipe_name: format!("Recipe {id}"),
            user_id: "u1".to_string(),
            query: Some("q".to_string()),
            created_at: Some(t0()),
            calories: Some(420),
            synced,
            ..Default::default()
        }
        .into_record(id.to_string())
    }

    fn favorited(user: &str, item: &str, synced: Option<bool>) -> FavoritedRecipe {
        NewFavoritedRecipe {
            name: Some(format!("Fav {item}")),
            synced,
            ..Default::default()
        }
        .into_record(DocumentPath::favorite_item(user, "l1", item))
    }

    #[tokio::test]
    async fn test_insert_and_get_generated_round_trip() {
        let (store, _clock, _bus) = store_with_clock().await;
        let record = generated("g1", Some(false));

        store.insert_generated(&record).await.unwrap();
        let loaded = store.get_generated("g1").await.unwrap().unwrap();

        assert_eq!(loaded, record);
        assert!(store.get_generated("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_announces_record_created() {
        let (store, _clock, bus) = store_with_clock().await;
        let mut rx = bus.subscribe();

        store.insert_favorited(&favorited("alice", "r1", None)).await.unwrap();

        match rx.try_recv().unwrap() {
            SyncEvent::RecordCreated { key, timestamp } => {
                assert_eq!(
                    key,
                    RecordKey::Favorited(DocumentPath::favorite_item("alice", "l1", "r1"))
                );
                assert_eq!(timestamp, t0());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_invalid_input() {
        let (store, _clock, _bus) = store_with_clock().await;
        store.insert_generated(&generated("g1", None)).await.unwrap();

        let err = store.insert_generated(&generated("g1", None)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_explicitly_false_excludes_absent() {
        let (store, _clock, _bus) = store_with_clock().await;
        store.insert_generated(&generated("absent", None)).await.unwrap();
        store.insert_generated(&generated("false", Some(false))).await.unwrap();
        store.insert_generated(&generated("true", Some(true))).await.unwrap();

        let ids: Vec<String> = store
            .unsynced_generated(UnsyncedPredicate::ExplicitlyFalse, 100)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["false"]);
    }

    #[tokio::test]
    async fn test_not_true_includes_absent() {
        let (store, _clock, _bus) = store_with_clock().await;
        store.insert_favorited(&favorited("a", "absent", None)).await.unwrap();
        store.insert_favorited(&favorited("b", "false", Some(false))).await.unwrap();
        store.insert_favorited(&favorited("c", "true", Some(true))).await.unwrap();

        let ids: Vec<String> = store
            .unsynced_favorited(UnsyncedPredicate::NotTrue, 50)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.path.document_id().to_string())
            .collect();
        assert_eq!(ids, vec!["absent", "false"]);
    }

    #[tokio::test]
    async fn test_unsynced_query_respects_limit() {
        let (store, _clock, _bus) = store_with_clock().await;
        for i in 0..5 {
            store
                .insert_generated(&generated(&format!("g{i}"), Some(false)))
                .await
                .unwrap();
        }

        let page = store
            .unsynced_generated(UnsyncedPredicate::ExplicitlyFalse, 3)
            .await
            .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].id, "g0");
    }

    #[tokio::test]
    async fn test_collection_group_query_ignores_other_collections() {
        let (store, _clock, _bus) = store_with_clock().await;
        store.insert_favorited(&favorited("a", "r1", Some(false))).await.unwrap();

        let mut archived = favorited("a", "r2", Some(false));
        archived.path = DocumentPath::new("users/a/favoriteLists/l1/archive/r2");
        store.insert_favorited(&archived).await.unwrap();

        let page = store
            .unsynced_favorited(UnsyncedPredicate::ExplicitlyFalse, 100)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].path.document_id(), "r1");
    }

    #[tokio::test]
    async fn test_write_success_sets_only_status_fields() {
        let (store, clock, _bus) = store_with_clock().await;
        let record = favorited("alice", "r1", Some(false));
        store.insert_favorited(&record).await.unwrap();

        clock.advance(chrono::Duration::seconds(5));
        let key = RecordKey::Favorited(record.path.clone());
        let at = store.write_success(&key, "R9").await.unwrap();

        let loaded = store.get_favorited(&record.path).await.unwrap().unwrap();
        assert_eq!(loaded.status.synced, Some(true));
        assert_eq!(loaded.status.recipe_id.as_deref(), Some("R9"));
        assert_eq!(loaded.status.synced_at, Some(at));
        assert_eq!(at, t0() + chrono::Duration::seconds(5));
        assert_eq!(loaded.list_id.as_deref(), Some("l1"));
        assert_eq!(loaded.name, record.name);
    }

    #[tokio::test]
    async fn test_write_to_missing_record_is_not_found() {
        let (store, _clock, _bus) = store_with_clock().await;
        let key = RecordKey::Generated("ghost".to_string());

        assert!(matches!(
            store.write_success(&key, "R1").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.write_failure(&key, "boom").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stamp_synced_is_all_or_nothing() {
        let (store, _clock, _bus) = store_with_clock().await;
        store.insert_generated(&generated("g1", None)).await.unwrap();

        let keys = vec![
            RecordKey::Generated("g1".to_string()),
            RecordKey::Generated("ghost".to_string()),
        ];
        assert!(store.stamp_synced(&keys).await.is_err());

        // Rolled back: g1 untouched
        let g1 = store.get_generated("g1").await.unwrap().unwrap();
        assert_eq!(g1.status.synced, None);
        assert_eq!(g1.status.synced_at, None);
    }

    #[tokio::test]
    async fn test_stamp_synced_marks_both_families() {
        let (store, _clock, _bus) = store_with_clock().await;
        store.insert_generated(&generated("g1", None)).await.unwrap();
        let fav = favorited("bob", "r1", Some(false));
        store.insert_favorited(&fav).await.unwrap();

        let keys = vec![
            RecordKey::Generated("g1".to_string()),
            RecordKey::Favorited(fav.path.clone()),
        ];
        assert_eq!(store.stamp_synced(&keys).await.unwrap(), 2);
        assert_eq!(store.stamp_synced(&[]).await.unwrap(), 0);

        let g1 = store.get_generated("g1").await.unwrap().unwrap();
        assert_eq!(g1.status.synced, Some(true));
        assert_eq!(g1.status.synced_at, Some(t0()));
        // Scheduled stamping assigns no remote id
        assert_eq!(g1.status.recipe_id, None);
    }
}
