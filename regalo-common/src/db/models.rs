//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the phrase catalog (`frases` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PhraseRecord {
    pub id: i64,
    #[sqlx(rename = "texto")]
    #[serde(rename = "texto", alias = "text")]
    pub text: String,
    #[serde(default)]
    pub veces_asignada: i64,
}

/// Catalog entry as read by the seed loader (`{id, texto}`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    #[serde(rename = "texto", alias = "text")]
    pub text: String,
}

/// The phrase and variant bound to one identity (`usuarios` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    #[serde(skip)]
    pub uid: String,
    pub frase_id: i64,
    pub frase_texto: String,
    pub variante_index: i64,
    pub fecha: DateTime<Utc>,
}

/// Fields written when an assignment is created; `fecha` is stamped by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub uid: String,
    pub frase_id: i64,
    pub frase_texto: String,
    pub variante_index: i64,
}
