//! Assignment queries (`usuarios` table)

use crate::db::models::{AssignmentRecord, NewAssignment};
use crate::{Error, Result};
use sqlx::SqlitePool;

/// Read the assignment stored for `uid`, if any
pub async fn get_assignment(pool: &SqlitePool, uid: &str) -> Result<Option<AssignmentRecord>> {
    let record = sqlx::query_as::<_, AssignmentRecord>(
        "SELECT uid, frase_id, frase_texto, variante_index, fecha FROM usuarios WHERE uid = ?",
    )
    .bind(uid)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Create the assignment for `uid` unless one already exists
///
/// Returns the stored record and whether this call created it. When another
/// visit for the same identity wrote first, its record is returned untouched.
pub async fn insert_assignment_if_absent(
    pool: &SqlitePool,
    new: &NewAssignment,
) -> Result<(AssignmentRecord, bool)> {
    let result = sqlx::query(
        r#"
        INSERT INTO usuarios (uid, frase_id, frase_texto, variante_index)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(uid) DO NOTHING
        "#,
    )
    .bind(&new.uid)
    .bind(new.frase_id)
    .bind(&new.frase_texto)
    .bind(new.variante_index)
    .execute(pool)
    .await?;

    let created = result.rows_affected() == 1;
    let record = get_assignment(pool, &new.uid)
        .await?
        .ok_or_else(|| Error::Inconsistent(format!("assignment for {} vanished after write", new.uid)))?;

    Ok((record, created))
}

/// Number of stored assignments for `uid` (0 or 1)
pub async fn count_assignments(pool: &SqlitePool, uid: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usuarios WHERE uid = ?")
        .bind(uid)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
