//! User repository for imgshelf.

use sqlx::{QueryBuilder, SqlitePool};

use super::user::{NewUser, User, UserUpdate};
use crate::{Result, ShelfError};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, storage_limit, \
     storage_used, storage_reserved, created_at, updated_at";

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// Returns the created user with the assigned ID.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let result = match new_user.storage_limit {
            Some(limit) => {
                sqlx::query(
                    "INSERT INTO users (username, email, password_hash, role, storage_limit)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&new_user.username)
                .bind(&new_user.email)
                .bind(&new_user.password_hash)
                .bind(new_user.role.as_str())
                .bind(limit)
                .execute(self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "INSERT INTO users (username, email, password_hash, role) VALUES (?, ?, ?, ?)",
                )
                .bind(&new_user.username)
                .bind(&new_user.email)
                .bind(&new_user.password_hash)
                .bind(new_user.role.as_str())
                .execute(self.pool)
                .await
            }
        }
        .map_err(|e| ShelfError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ShelfError::NotFound("user".to_string()))
    }

    /// Create a user that becomes admin if the table is still empty.
    ///
    /// The emptiness check and the insert are one statement, so of two
    /// concurrent first registrations only one gets the admin role. Other
    /// users get `new_user.role`.
    pub async fn create_first_admin(&self, new_user: &NewUser) -> Result<User> {
        let (limit_column, limit_value) = match new_user.storage_limit {
            Some(_) => (", storage_limit", ", ?5"),
            None => ("", ""),
        };
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role{limit_column})
             SELECT ?1, ?2, ?3,
                    CASE WHEN EXISTS (SELECT 1 FROM users) THEN ?4 ELSE 'admin' END{limit_value}"
        );

        let mut query = sqlx::query(&sql)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str());
        if let Some(limit) = new_user.storage_limit {
            query = query.bind(limit);
        }
        let result = query
            .execute(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ShelfError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ? COLLATE NOCASE");
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Get a user by email address (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        );
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Check if a username is already taken.
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? COLLATE NOCASE)",
        )
        .bind(username)
        .fetch_one(self.pool)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(exists)
    }

    /// Check if an email address is already registered.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? COLLATE NOCASE)",
        )
        .bind(email)
        .fetch_one(self.pool)
        .await
        .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(exists)
    }

    /// Count all users.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(count)
    }

    /// List all users ordered by username.
    pub async fn list_all(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        Ok(users)
    }

    /// Update a user.
    ///
    /// Returns the updated user, or None if not found.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE users SET updated_at = datetime('now')");

        if let Some(ref username) = update.username {
            query.push(", username = ");
            query.push_bind(username);
        }
        if let Some(ref email) = update.email {
            query.push(", email = ");
            query.push_bind(email);
        }
        if let Some(ref password_hash) = update.password_hash {
            query.push(", password_hash = ");
            query.push_bind(password_hash);
        }
        if let Some(role) = update.role {
            query.push(", role = ");
            query.push_bind(role.as_str());
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a user row.
    ///
    /// Fails while images uploaded by the user still exist.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| ShelfError::Database(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }
}

/// Check whether a database error is a uniqueness violation on `column`.
pub fn is_unique_violation(err: &ShelfError, column: &str) -> bool {
    matches!(err, ShelfError::Database(msg)
        if msg.contains("UNIQUE") && msg.contains(&format!("users.{column}")))
}
