//! Shared fixtures for regalo-srv integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use regalo_common::db::models::{AssignmentRecord, CatalogEntry, NewAssignment};
use regalo_common::db::{frases, init::init_database};
use regalo_common::time::Clock;
use regalo_srv::config::{CatalogMissPolicy, GiftSettings, VariantPolicy};
use regalo_srv::engine::{AssignmentEngine, AssignmentStore, EngineConfig, PhraseDraw, SqliteStore};
use regalo_srv::identity::{IdentityProvider, SqliteIdentityProvider};
use regalo_srv::AppState;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Temporary database with the standard phrase 7 seeded
pub struct TestDb {
    pub dir: TempDir,
    pub pool: SqlitePool,
}

pub async fn test_db(phrases: &[(i64, &str)]) -> TestDb {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = init_database(&dir.path().join("regalo.db"))
        .await
        .expect("database init");

    let entries: Vec<CatalogEntry> = phrases
        .iter()
        .map(|(id, text)| CatalogEntry {
            id: *id,
            text: text.to_string(),
        })
        .collect();
    frases::seed_catalog(&pool, &entries).await.expect("seed");

    TestDb { dir, pool }
}

/// Draws replayed from a script, repeating the last value when exhausted
pub struct ScriptedDraw {
    phrases: Vec<i64>,
    variants: Vec<usize>,
    phrase_calls: AtomicUsize,
    variant_calls: AtomicUsize,
}

impl ScriptedDraw {
    pub fn new(phrases: &[i64], variants: &[usize]) -> Self {
        Self {
            phrases: phrases.to_vec(),
            variants: variants.to_vec(),
            phrase_calls: AtomicUsize::new(0),
            variant_calls: AtomicUsize::new(0),
        }
    }

    pub fn phrase_calls(&self) -> usize {
        self.phrase_calls.load(Ordering::SeqCst)
    }
}

impl PhraseDraw for ScriptedDraw {
    fn phrase_id(&self, _catalog_size: i64) -> i64 {
        let n = self.phrase_calls.fetch_add(1, Ordering::SeqCst);
        self.phrases[n.min(self.phrases.len() - 1)]
    }

    fn variant_index(&self, _variant_count: usize) -> usize {
        let n = self.variant_calls.fetch_add(1, Ordering::SeqCst);
        self.variants[n.min(self.variants.len() - 1)]
    }
}

pub fn engine_config(variant_policy: VariantPolicy, on_catalog_miss: CatalogMissPolicy) -> EngineConfig {
    EngineConfig {
        catalog_size: 50,
        variant_policy,
        on_catalog_miss,
        fallback_phrase: regalo_srv::config::DEFAULT_FALLBACK_PHRASE.to_string(),
    }
}

pub fn scripted_engine(
    pool: &SqlitePool,
    draw: Arc<dyn PhraseDraw>,
    config: EngineConfig,
) -> AssignmentEngine {
    let store = Arc::new(SqliteStore::new(pool.clone()));
    AssignmentEngine::new(store.clone(), store, draw, config)
}

/// Store that reads normally but fails every write, like a full disk
pub struct ReadOnlyStore(pub SqliteStore);

#[async_trait]
impl AssignmentStore for ReadOnlyStore {
    async fn get_assignment(&self, uid: &str) -> regalo_common::Result<Option<AssignmentRecord>> {
        self.0.get_assignment(uid).await
    }

    async fn create_if_absent(
        &self,
        _new: &NewAssignment,
    ) -> regalo_common::Result<(AssignmentRecord, bool)> {
        Err(regalo_common::Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk I/O error",
        )))
    }
}

/// Engine whose assignment writes always fail
pub fn read_only_engine(pool: &SqlitePool, draw: Arc<dyn PhraseDraw>, config: EngineConfig) -> AssignmentEngine {
    let store = SqliteStore::new(pool.clone());
    AssignmentEngine::new(
        Arc::new(store.clone()),
        Arc::new(ReadOnlyStore(store)),
        draw,
        config,
    )
}

/// Identity provider that is always down
pub struct DownIdentityProvider;

#[async_trait]
impl IdentityProvider for DownIdentityProvider {
    async fn acquire_identity(&self, _presented: Option<&str>) -> regalo_srv::Result<String> {
        Err(regalo_srv::Error::Identity("provider unreachable".to_string()))
    }
}

/// Settings with short timers so tests don't wait on the real beat
pub fn fast_settings(variant_policy: VariantPolicy, on_catalog_miss: CatalogMissPolicy) -> GiftSettings {
    GiftSettings {
        variant_policy,
        on_catalog_miss,
        opening_delay: Duration::from_millis(20),
        countdown_tick: Duration::from_millis(20),
        stream_grace: Duration::from_millis(20),
        ..GiftSettings::default()
    }
}

pub fn app_state(
    db: &TestDb,
    draw: Arc<dyn PhraseDraw>,
    settings: GiftSettings,
    clock: Arc<dyn Clock>,
) -> AppState {
    let engine = Arc::new(scripted_engine(&db.pool, draw, EngineConfig::from(&settings)));
    let identities = Arc::new(SqliteIdentityProvider::new(db.pool.clone()));
    AppState::new(engine, identities, settings, clock)
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
