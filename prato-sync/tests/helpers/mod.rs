//! Shared fixtures for prato-sync integration tests
//!
//! - `FakeApi`: downstream recipe API served by axum on an ephemeral port,
//!   recording every request it receives
//! - `CountingStore`: SQLite store that counts reads
//! - `FailingStore`: wraps a store and rejects status writes on demand
//! - `TestApp`: app state wired to both, with a frozen clock

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, Uri},
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use prato_common::events::EventBus;
use prato_common::records::{FavoritedRecipe, GeneratedRecipe, RecordKey, UnsyncedPredicate};
use prato_common::{Clock, DocumentPath, Error, FixedClock, Result};
use serde_json::{json, Value};

use prato_sync::db::{init_memory_pool, RecordStore, SqliteRecordStore};
use prato_sync::delivery::DeliveryClient;
use prato_sync::{build_router, AppState};

/// Frozen "now" used by every test clock
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 5, 13, 41, 28).unwrap()
}

// =============================================================================
// Fake downstream API
// =============================================================================

#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub body: Value,
}

#[derive(Clone)]
pub struct FakeApi {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
    reply: Arc<Mutex<(StatusCode, Value)>>,
}

async fn record_request(
    State(api): State<FakeApi>,
    uri: Uri,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    api.received.lock().unwrap().push(ReceivedRequest {
        path: uri.path().to_string(),
        body,
    });
    let (status, reply) = api.reply.lock().unwrap().clone();
    (status, Json(reply))
}

impl FakeApi {
    /// Start serving; replies `200 {"status":"accepted","recipe_id":"R9"}` until told otherwise
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let api = FakeApi {
            addr,
            received: Arc::new(Mutex::new(Vec::new())),
            reply: Arc::new(Mutex::new((
                StatusCode::OK,
                json!({"status": "accepted", "recipe_id": "R9"}),
            ))),
        };

        let router = Router::new()
            .fallback(record_request)
            .with_state(api.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        api
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn respond_with(&self, status: StatusCode, body: Value) {
        *self.reply.lock().unwrap() = (status, body);
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }
}

// =============================================================================
// Counting store
// =============================================================================

/// Delegates to SQLite and counts every read
pub struct CountingStore {
    inner: SqliteRecordStore,
    reads: AtomicUsize,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn insert_generated(&self, record: &GeneratedRecipe) -> Result<()> {
        self.inner.insert_generated(record).await
    }

    async fn insert_favorited(&self, record: &FavoritedRecipe) -> Result<()> {
        self.inner.insert_favorited(record).await
    }

    async fn get_generated(&self, id: &str) -> Result<Option<GeneratedRecipe>> {
        self.count_read();
        self.inner.get_generated(id).await
    }

    async fn get_favorited(&self, path: &DocumentPath) -> Result<Option<FavoritedRecipe>> {
        self.count_read();
        self.inner.get_favorited(path).await
    }

    async fn unsynced_generated(
        &self,
        predicate: UnsyncedPredicate,
        limit: u32,
    ) -> Result<Vec<GeneratedRecipe>> {
        self.count_read();
        self.inner.unsynced_generated(predicate, limit).await
    }

    async fn unsynced_favorited(
        &self,
        predicate: UnsyncedPredicate,
        limit: u32,
    ) -> Result<Vec<FavoritedRecipe>> {
        self.count_read();
        self.inner.unsynced_favorited(predicate, limit).await
    }

    async fn write_success(&self, key: &RecordKey, remote_id: &str) -> Result<DateTime<Utc>> {
        self.inner.write_success(key, remote_id).await
    }

    async fn write_failure(&self, key: &RecordKey, message: &str) -> Result<DateTime<Utc>> {
        self.inner.write_failure(key, message).await
    }

    async fn stamp_synced(&self, keys: &[RecordKey]) -> Result<usize> {
        self.inner.stamp_synced(keys).await
    }
}

// =============================================================================
// Failing store
// =============================================================================

/// Delegates to another store; status writes fail while their switch is on
pub struct FailingStore {
    inner: Arc<dyn RecordStore>,
    fail_success: AtomicBool,
    fail_failure: AtomicBool,
    failure_writes: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            fail_success: AtomicBool::new(false),
            fail_failure: AtomicBool::new(false),
            failure_writes: AtomicUsize::new(0),
        }
    }

    pub fn reject_success_writes(&self) {
        self.fail_success.store(true, Ordering::SeqCst);
    }

    pub fn reject_failure_writes(&self) {
        self.fail_failure.store(true, Ordering::SeqCst);
    }

    /// `write_failure` calls seen, rejected or not
    pub fn failure_writes(&self) -> usize {
        self.failure_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn insert_generated(&self, record: &GeneratedRecipe) -> Result<()> {
        self.inner.insert_generated(record).await
    }

    async fn insert_favorited(&self, record: &FavoritedRecipe) -> Result<()> {
        self.inner.insert_favorited(record).await
    }

    async fn get_generated(&self, id: &str) -> Result<Option<GeneratedRecipe>> {
        self.inner.get_generated(id).await
    }

    async fn get_favorited(&self, path: &DocumentPath) -> Result<Option<FavoritedRecipe>> {
        self.inner.get_favorited(path).await
    }

    async fn unsynced_generated(
        &self,
        predicate: UnsyncedPredicate,
        limit: u32,
    ) -> Result<Vec<GeneratedRecipe>> {
        self.inner.unsynced_generated(predicate, limit).await
    }

    async fn unsynced_favorited(
        &self,
        predicate: UnsyncedPredicate,
        limit: u32,
    ) -> Result<Vec<FavoritedRecipe>> {
        self.inner.unsynced_favorited(predicate, limit).await
    }

    async fn write_success(&self, key: &RecordKey, remote_id: &str) -> Result<DateTime<Utc>> {
        if self.fail_success.load(Ordering::SeqCst) {
            return Err(Error::Internal("success write rejected".to_string()));
        }
        self.inner.write_success(key, remote_id).await
    }

    async fn write_failure(&self, key: &RecordKey, message: &str) -> Result<DateTime<Utc>> {
        self.failure_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_failure.load(Ordering::SeqCst) {
            return Err(Error::Internal("failure write rejected".to_string()));
        }
        self.inner.write_failure(key, message).await
    }

    async fn stamp_synced(&self, keys: &[RecordKey]) -> Result<usize> {
        self.inner.stamp_synced(keys).await
    }
}

// =============================================================================
// Test application
// =============================================================================

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<CountingStore>,
    pub clock: Arc<FixedClock>,
    pub event_bus: EventBus,
    pub api: FakeApi,
}

impl TestApp {
    /// In-memory store, frozen clock, fake downstream API
    pub async fn start() -> Self {
        let api = FakeApi::start().await;
        Self::with_api_url(api.clone(), &api.base_url()).await
    }

    /// Like `start`, but the client points at `api_url` instead of the fake
    pub async fn with_api_url(api: FakeApi, api_url: &str) -> Self {
        let pool = init_memory_pool().await.unwrap();
        let clock = Arc::new(FixedClock::new(t0()));
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let event_bus = EventBus::new(100);

        let store = Arc::new(CountingStore {
            inner: SqliteRecordStore::new(pool, clock_dyn.clone(), event_bus.clone()),
            reads: AtomicUsize::new(0),
        });
        let store_dyn: Arc<dyn RecordStore> = store.clone();

        let client = DeliveryClient::new(api_url, None).unwrap();
        let state = AppState::new(store_dyn, client, clock_dyn, event_bus.clone());

        Self {
            state,
            store,
            clock,
            event_bus,
            api,
        }
    }

    /// Like `start`, but status writes go through a `FailingStore`
    ///
    /// `store` still reaches the records directly for setup and read-back.
    pub async fn with_failing_writes() -> (Self, Arc<FailingStore>) {
        let mut app = Self::start().await;
        let inner: Arc<dyn RecordStore> = app.store.clone();
        let failing = Arc::new(FailingStore::new(inner));
        let failing_dyn: Arc<dyn RecordStore> = failing.clone();

        app.state = AppState::new(
            failing_dyn,
            app.state.client.clone(),
            app.state.clock.clone(),
            app.event_bus.clone(),
        );
        (app, failing)
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

// =============================================================================
// Request helpers
// =============================================================================

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
