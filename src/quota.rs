//! Per-user storage accounting.
//!
//! Each user row carries three counters: `storage_limit`, `storage_used`
//! (bytes billed for stored images) and `storage_reserved` (bytes held by
//! upload batches that are still processing). Every change is a single
//! conditional `UPDATE`, so concurrent batches of the same user serialize
//! on the row instead of racing a read-then-write.
//!
//! An upload batch goes through `try_reserve` before any file is stored,
//! then either `commit` (inside the transaction that inserts its image
//! rows) or `release`.

use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{debug, info, warn};

use crate::{Result, ShelfError};

/// Bytes held for an in-flight upload batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    pub user_id: i64,
    pub bytes: i64,
}

/// Snapshot of a user's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct QuotaUsage {
    pub storage_limit: i64,
    pub storage_used: i64,
    pub storage_reserved: i64,
}

impl QuotaUsage {
    /// Bytes that may still be reserved.
    pub fn available(&self) -> i64 {
        (self.storage_limit - self.storage_used - self.storage_reserved).max(0)
    }
}

/// Atomic operations on the storage counters.
pub struct QuotaLedger<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuotaLedger<'a> {
    /// Create a ledger over the given pool.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Current counters of a user.
    pub async fn usage(&self, user_id: i64) -> Result<QuotaUsage> {
        sqlx::query_as::<_, QuotaUsage>(
            "SELECT storage_limit, storage_used, storage_reserved FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?
        .ok_or_else(|| ShelfError::NotFound("user".to_string()))
    }

    /// Hold `bytes` for a batch if `used + reserved + bytes <= limit`.
    ///
    /// Fails with `QuotaExceeded` without changing anything otherwise.
    pub async fn try_reserve(&self, user_id: i64, bytes: i64) -> Result<Reservation> {
        if bytes < 0 {
            return Err(ShelfError::Validation(
                "reservation must not be negative".to_string(),
            ));
        }

        let result = sqlx::query(
            "UPDATE users SET storage_reserved = storage_reserved + ?1
             WHERE id = ?2 AND storage_used + storage_reserved + ?1 <= storage_limit",
        )
        .bind(bytes)
        .bind(user_id)
        .execute(self.pool)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            let usage = self.usage(user_id).await?;
            info!(
                user_id,
                requested = bytes,
                available = usage.available(),
                "Upload rejected by quota"
            );
            return Err(ShelfError::QuotaExceeded {
                requested: bytes,
                available: usage.available(),
            });
        }

        debug!(user_id, bytes, "Reserved storage");
        Ok(Reservation { user_id, bytes })
    }

    /// Convert a reservation into `billed` used bytes in one statement.
    ///
    /// The billed total may differ from the reservation. When it is larger
    /// the difference must still fit under the limit, otherwise nothing
    /// changes and `QuotaExceeded` is returned, carrying what the batch
    /// could have been billed. Meant to run inside the transaction that
    /// persists the batch.
    pub async fn commit(
        conn: &mut SqliteConnection,
        reservation: &Reservation,
        billed: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET
                 storage_used = storage_used + ?1,
                 storage_reserved = MAX(storage_reserved - ?2, 0),
                 updated_at = datetime('now')
             WHERE id = ?3
               AND (?1 <= ?2 OR storage_used + MAX(storage_reserved - ?2, 0) + ?1 <= storage_limit)",
        )
        .bind(billed)
        .bind(reservation.bytes)
        .bind(reservation.user_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            // Room left for this batch: its own reservation counts as free.
            let available: i64 = sqlx::query_scalar(
                "SELECT MAX(storage_limit - storage_used - MAX(storage_reserved - ?, 0), 0)
                 FROM users WHERE id = ?",
            )
            .bind(reservation.bytes)
            .bind(reservation.user_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?
            .ok_or_else(|| ShelfError::NotFound("user".to_string()))?;

            info!(
                user_id = reservation.user_id,
                requested = billed,
                available,
                "Batch rejected by quota at commit"
            );
            return Err(ShelfError::QuotaExceeded {
                requested: billed,
                available,
            });
        }
        Ok(())
    }

    /// Drop an unused reservation.
    pub async fn release(&self, reservation: Reservation) -> Result<()> {
        sqlx::query(
            "UPDATE users SET storage_reserved = MAX(storage_reserved - ?, 0) WHERE id = ?",
        )
        .bind(reservation.bytes)
        .bind(reservation.user_id)
        .execute(self.pool)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;
        debug!(user_id = reservation.user_id, bytes = reservation.bytes, "Released reservation");
        Ok(())
    }

    /// Give back `bytes` of used storage, never going below zero.
    pub async fn reclaim<'e>(
        executor: impl SqliteExecutor<'e>,
        user_id: i64,
        bytes: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET storage_used = MAX(storage_used - ?, 0), updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(bytes.max(0))
        .bind(user_id)
        .execute(executor)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(())
    }

    /// Change a user's limit. Existing usage above the new limit is kept;
    /// it only blocks further uploads.
    pub async fn set_limit(&self, user_id: i64, limit: i64) -> Result<QuotaUsage> {
        if limit < 0 {
            return Err(ShelfError::Validation(
                "storage limit must not be negative".to_string(),
            ));
        }
        let result = sqlx::query(
            "UPDATE users SET storage_limit = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(limit)
        .bind(user_id)
        .execute(self.pool)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(ShelfError::NotFound("user".to_string()));
        }
        info!(user_id, limit, "Storage limit changed");
        self.usage(user_id).await
    }

    /// Zero every reservation. Only valid while no upload is running,
    /// i.e. at startup after a crash left batches unfinished.
    pub async fn clear_stale_reservations(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE users SET storage_reserved = 0 WHERE storage_reserved <> 0")
            .execute(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        if result.rows_affected() > 0 {
            warn!(
                users = result.rows_affected(),
                "Cleared storage reservations left by unfinished uploads"
            );
        }
        Ok(result.rows_affected())
    }
}
