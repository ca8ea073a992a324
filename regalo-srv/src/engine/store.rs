//! Store seams used by the assignment engine, with their SQLite implementation

use async_trait::async_trait;
use regalo_common::db::models::{AssignmentRecord, NewAssignment, PhraseRecord};
use regalo_common::db::{frases, usuarios};
use sqlx::SqlitePool;

/// Read access to the phrase catalog
#[async_trait]
pub trait PhraseCatalog: Send + Sync {
    async fn get_phrase(&self, id: i64) -> regalo_common::Result<Option<PhraseRecord>>;
}

/// Assignment persistence keyed by identity
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get_assignment(&self, uid: &str) -> regalo_common::Result<Option<AssignmentRecord>>;

    /// Create unless present; returns the stored record and whether it was created
    async fn create_if_absent(
        &self,
        new: &NewAssignment,
    ) -> regalo_common::Result<(AssignmentRecord, bool)>;
}

/// Both stores over one SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhraseCatalog for SqliteStore {
    async fn get_phrase(&self, id: i64) -> regalo_common::Result<Option<PhraseRecord>> {
        frases::get_phrase(&self.pool, id).await
    }
}

#[async_trait]
impl AssignmentStore for SqliteStore {
    async fn get_assignment(&self, uid: &str) -> regalo_common::Result<Option<AssignmentRecord>> {
        usuarios::get_assignment(&self.pool, uid).await
    }

    async fn create_if_absent(
        &self,
        new: &NewAssignment,
    ) -> regalo_common::Result<(AssignmentRecord, bool)> {
        usuarios::insert_assignment_if_absent(&self.pool, new).await
    }
}
