//! Phrase catalog queries (`frases` table)

use crate::db::models::{CatalogEntry, PhraseRecord};
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::info;

/// Look up one phrase by id; `None` when the catalog has no such entry
pub async fn get_phrase(pool: &SqlitePool, id: i64) -> Result<Option<PhraseRecord>> {
    let record = sqlx::query_as::<_, PhraseRecord>(
        "SELECT id, texto, veces_asignada FROM frases WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Number of phrases in the catalog
pub async fn count_phrases(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM frases")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Check a catalog before seeding
///
/// Every id must lie in `1..=catalog_size`, appear once, and carry
/// non-empty text.
pub fn validate_catalog(entries: &[CatalogEntry], catalog_size: i64) -> Result<()> {
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.id < 1 || entry.id > catalog_size {
            return Err(Error::InvalidCatalog(format!(
                "phrase id {} outside 1..={}",
                entry.id, catalog_size
            )));
        }
        if entry.text.trim().is_empty() {
            return Err(Error::InvalidCatalog(format!(
                "phrase id {} has empty text",
                entry.id
            )));
        }
        if !seen.insert(entry.id) {
            return Err(Error::InvalidCatalog(format!(
                "phrase id {} appears more than once",
                entry.id
            )));
        }
    }

    Ok(())
}

/// Write the whole catalog in one transaction
///
/// Each document is replaced with its text and a zeroed `veces_asignada`,
/// so re-running overwrites rather than accumulates.
pub async fn seed_catalog(pool: &SqlitePool, entries: &[CatalogEntry]) -> Result<usize> {
    let mut tx = pool.begin().await?;

    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO frases (id, texto, veces_asignada)
            VALUES (?, ?, 0)
            ON CONFLICT(id) DO UPDATE SET texto = excluded.texto, veces_asignada = 0
            "#,
        )
        .bind(entry.id)
        .bind(&entry.text)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!("Seeded {} phrases into catalog", entries.len());

    Ok(entries.len())
}
