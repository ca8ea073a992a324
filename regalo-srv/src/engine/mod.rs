//! Assignment engine
//!
//! Binds exactly one (phrase, variant) pair to each anonymous identity. The
//! first resolution for an identity draws and persists; every later one
//! returns the stored record without drawing.

pub mod draw;
pub mod store;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{CatalogMissPolicy, GiftSettings, VariantPolicy};
use crate::error::{Error, Result};
use crate::variants::{self, VariantDescriptor, VARIANT_COUNT};
use regalo_common::db::models::{AssignmentRecord, NewAssignment};

pub use draw::{PhraseDraw, RandomDraw};
pub use store::{AssignmentStore, PhraseCatalog, SqliteStore};

/// Where a resolved assignment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentOrigin {
    /// Read back from the store
    Existing,
    /// Drawn and persisted by this call
    Created,
    /// Catalog miss under the fallback policy; nothing was persisted
    Fallback,
}

/// Resolved assignment for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub identity: String,
    pub phrase_id: i64,
    pub phrase_text: String,
    pub variant_index: usize,
    pub origin: AssignmentOrigin,
    /// Store timestamp; `None` for fallback assignments
    pub assigned_at: Option<DateTime<Utc>>,
}

impl Assignment {
    /// The variant for this assignment
    pub fn variant(&self) -> &'static VariantDescriptor {
        // variant_index is validated when the assignment is built
        &variants::VARIANTES[self.variant_index.min(VARIANT_COUNT - 1)]
    }

    fn from_record(record: AssignmentRecord, origin: AssignmentOrigin) -> Self {
        let variant_index = match usize::try_from(record.variante_index) {
            Ok(i) if i < VARIANT_COUNT => i,
            _ => {
                warn!(
                    "Stored variant index {} for {} out of range, showing variant 0",
                    record.variante_index, record.uid
                );
                0
            }
        };

        Self {
            identity: record.uid,
            phrase_id: record.frase_id,
            phrase_text: record.frase_texto,
            variant_index,
            origin,
            assigned_at: Some(record.fecha),
        }
    }
}

/// Engine policies
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub catalog_size: i64,
    pub variant_policy: VariantPolicy,
    pub on_catalog_miss: CatalogMissPolicy,
    pub fallback_phrase: String,
}

impl From<&GiftSettings> for EngineConfig {
    fn from(settings: &GiftSettings) -> Self {
        Self {
            catalog_size: settings.catalog_size,
            variant_policy: settings.variant_policy,
            on_catalog_miss: settings.on_catalog_miss,
            fallback_phrase: settings.fallback_phrase.clone(),
        }
    }
}

/// Loads or creates the assignment for an identity
pub struct AssignmentEngine {
    catalog: Arc<dyn PhraseCatalog>,
    store: Arc<dyn AssignmentStore>,
    draw: Arc<dyn PhraseDraw>,
    config: EngineConfig,
}

impl AssignmentEngine {
    pub fn new(
        catalog: Arc<dyn PhraseCatalog>,
        store: Arc<dyn AssignmentStore>,
        draw: Arc<dyn PhraseDraw>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            draw,
            config,
        }
    }

    /// Engine over one SQLite store with thread-RNG draws
    pub fn with_sqlite(store: SqliteStore, config: EngineConfig) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store, Arc::new(RandomDraw), config)
    }

    /// Return the identity's assignment, creating it on first call
    pub async fn resolve_assignment(&self, identity: &str) -> Result<Assignment> {
        let existing = self
            .store
            .get_assignment(identity)
            .await
            .map_err(|e| Error::StoreRead(e.to_string()))?;

        if let Some(record) = existing {
            debug!("Returning stored assignment for {}", identity);
            return Ok(Assignment::from_record(record, AssignmentOrigin::Existing));
        }

        let phrase_id = self.draw.phrase_id(self.config.catalog_size);
        let variant_index = self.select_variant(phrase_id);

        let phrase = self
            .catalog
            .get_phrase(phrase_id)
            .await
            .map_err(|e| Error::StoreRead(e.to_string()))?;

        let Some(phrase) = phrase else {
            return self.on_catalog_miss(identity, phrase_id, variant_index);
        };

        let new = NewAssignment {
            uid: identity.to_string(),
            frase_id: phrase_id,
            frase_texto: phrase.text,
            variante_index: variant_index as i64,
        };

        let (record, created) = self
            .store
            .create_if_absent(&new)
            .await
            .map_err(|e| Error::StoreWrite(e.to_string()))?;

        if created {
            info!(
                "Assigned phrase {} / variant {} to {}",
                record.frase_id, record.variante_index, identity
            );
            Ok(Assignment::from_record(record, AssignmentOrigin::Created))
        } else {
            // Another visit for this identity wrote between our read and write
            info!("Concurrent first visit for {}, keeping stored assignment", identity);
            Ok(Assignment::from_record(record, AssignmentOrigin::Existing))
        }
    }

    /// Variant index for a freshly drawn phrase
    pub fn select_variant(&self, phrase_id: i64) -> usize {
        match self.config.variant_policy {
            VariantPolicy::DerivedFromPhraseId => variants::variant_index_for_phrase(phrase_id),
            VariantPolicy::IndependentDraw => {
                self.draw.variant_index(VARIANT_COUNT).min(VARIANT_COUNT - 1)
            }
        }
    }

    fn on_catalog_miss(
        &self,
        identity: &str,
        phrase_id: i64,
        variant_index: usize,
    ) -> Result<Assignment> {
        match self.config.on_catalog_miss {
            CatalogMissPolicy::Fallback => {
                warn!(
                    "Phrase {} missing from catalog, showing fallback phrase to {}",
                    phrase_id, identity
                );
                Ok(Assignment {
                    identity: identity.to_string(),
                    phrase_id,
                    phrase_text: self.config.fallback_phrase.clone(),
                    variant_index,
                    origin: AssignmentOrigin::Fallback,
                    assigned_at: None,
                })
            }
            CatalogMissPolicy::Fail => {
                warn!("Phrase {} missing from catalog, failing resolution for {}", phrase_id, identity);
                Err(Error::CatalogMiss { phrase_id })
            }
        }
    }
}
