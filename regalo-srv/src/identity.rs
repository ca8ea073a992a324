//! Anonymous identity provider
//!
//! Identities are opaque UUID tokens. The browser keeps its token in local
//! storage and presents it on each visit; a token the store does not know is
//! replaced with a freshly issued one.

use async_trait::async_trait;
use regalo_common::db::identidades;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Supplies a stable anonymous identity
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn acquire_identity(&self, presented: Option<&str>) -> Result<String>;
}

/// Identity provider backed by the `identidades` table
#[derive(Clone)]
pub struct SqliteIdentityProvider {
    pool: SqlitePool,
}

impl SqliteIdentityProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for SqliteIdentityProvider {
    async fn acquire_identity(&self, presented: Option<&str>) -> Result<String> {
        let (uid, issued) = identidades::acquire_identity(&self.pool, presented)
            .await
            .map_err(|e| Error::Identity(e.to_string()))?;

        if issued {
            info!("Issued anonymous identity {}", uid);
        } else {
            debug!("Returning visitor {}", uid);
        }

        Ok(uid)
    }
}
