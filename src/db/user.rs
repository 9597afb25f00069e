//! User model for imgshelf.

use std::fmt;
use std::str::FromStr;

/// User role for permission management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Regular account.
    #[default]
    User,
    /// Administrator, may manage any folder or image.
    Admin,
}

impl Role {
    /// Convert role to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A registered user with storage accounting.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login username (unique, case-insensitive).
    pub username: String,
    /// Email address.
    pub email: String,
    /// Password hash (Argon2).
    pub password_hash: String,
    /// User role.
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Quota in bytes.
    pub storage_limit: i64,
    /// Bytes billed for stored images.
    pub storage_used: i64,
    /// Bytes held by in-flight upload batches.
    pub storage_reserved: i64,
    /// Account creation timestamp.
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
}

impl User {
    /// Check if this user is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Bytes still available for new uploads.
    pub fn storage_available(&self) -> i64 {
        (self.storage_limit - self.storage_used - self.storage_reserved).max(0)
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Password hash (should be pre-hashed with Argon2).
    pub password_hash: String,
    /// User role (defaults to User).
    pub role: Role,
    /// Initial quota in bytes.
    pub storage_limit: Option<i64>,
}

impl NewUser {
    /// Create a new user with minimal required fields.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: Role::User,
            storage_limit: None,
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Set the initial storage limit.
    pub fn with_storage_limit(mut self, limit: i64) -> Self {
        self.storage_limit = Some(limit);
        self
    }
}

/// Builder for updating a user.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

impl UserUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the email address.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the password hash.
    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    /// Set the role.
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_strings() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("sysop".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn test_new_user_builder() {
        let user = NewUser::new("alice", "alice@example.com", "hash")
            .with_role(Role::Admin)
            .with_storage_limit(1024);
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.storage_limit, Some(1024));
    }

    #[test]
    fn test_user_update_builder() {
        assert!(UserUpdate::new().is_empty());
        let update = UserUpdate::new().email("new@example.com").role(Role::Admin);
        assert!(!update.is_empty());
        assert_eq!(update.email.as_deref(), Some("new@example.com"));
        assert!(update.username.is_none());
    }

    #[test]
    fn test_storage_available_clamps() {
        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            storage_limit: 100,
            storage_used: 80,
            storage_reserved: 40,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(user.storage_available(), 0);
    }
}
