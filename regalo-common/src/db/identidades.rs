//! Anonymous identity queries (`identidades` table)

use crate::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Return `presented` if it names a known identity, refreshing its
/// `last_seen_at`; otherwise issue and record a new one.
///
/// Returns the identity and whether it was newly issued.
pub async fn acquire_identity(pool: &SqlitePool, presented: Option<&str>) -> Result<(String, bool)> {
    if let Some(uid) = presented.map(str::trim).filter(|s| !s.is_empty()) {
        let touched = sqlx::query(
            "UPDATE identidades SET last_seen_at = CURRENT_TIMESTAMP WHERE uid = ?",
        )
        .bind(uid)
        .execute(pool)
        .await?;

        if touched.rows_affected() == 1 {
            return Ok((uid.to_string(), false));
        }
    }

    let uid = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO identidades (uid) VALUES (?)")
        .bind(&uid)
        .execute(pool)
        .await?;

    Ok((uid, true))
}
