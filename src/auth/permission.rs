//! Ownership checks for folders and images.
//!
//! The pipeline components receive an already authenticated
//! [`ActingUser`] and decide for themselves whether it may touch a
//! resource: owners and admins manage, anyone reads a public folder.

use crate::db::Role;
use crate::gallery::Folder;
use crate::{Result, ShelfError};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser {
    pub id: i64,
    pub role: Role,
}

impl ActingUser {
    /// Create a new acting user.
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    /// Check if the caller is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owner or admin may modify a resource owned by `owner_id`.
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }
}

/// Fail with a permission error unless `actor` may manage the resource.
pub fn ensure_can_manage(actor: &ActingUser, owner_id: i64, what: &str) -> Result<()> {
    if actor.can_manage(owner_id) {
        Ok(())
    } else {
        Err(ShelfError::Permission(format!(
            "not authorized to modify this {what}"
        )))
    }
}

/// Public folders are readable by anyone, private ones by owner or admin.
pub fn can_read_folder(actor: Option<&ActingUser>, folder: &Folder) -> bool {
    folder.is_public || actor.is_some_and(|a| a.can_manage(folder.user_id))
}

/// Fail with a permission error unless `actor` may read `folder`.
pub fn ensure_can_read_folder(actor: Option<&ActingUser>, folder: &Folder) -> Result<()> {
    if can_read_folder(actor, folder) {
        Ok(())
    } else {
        Err(ShelfError::Permission(
            "not authorized to view this folder".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(owner: i64, is_public: bool) -> Folder {
        Folder {
            id: 1,
            name: "holiday".to_string(),
            user_id: owner,
            is_public,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_can_manage() {
        let owner = ActingUser::new(1, Role::User);
        let other = ActingUser::new(2, Role::User);
        let admin = ActingUser::new(3, Role::Admin);

        assert!(owner.can_manage(1));
        assert!(!other.can_manage(1));
        assert!(admin.can_manage(1));
    }

    #[test]
    fn test_ensure_can_manage_message() {
        let other = ActingUser::new(2, Role::User);
        let err = ensure_can_manage(&other, 1, "image").unwrap_err();
        assert!(matches!(err, ShelfError::Permission(msg) if msg.contains("image")));
    }

    #[test]
    fn test_folder_read_rule() {
        let private = folder(1, false);
        let public = folder(1, true);
        let owner = ActingUser::new(1, Role::User);
        let other = ActingUser::new(2, Role::User);
        let admin = ActingUser::new(9, Role::Admin);

        assert!(can_read_folder(None, &public));
        assert!(!can_read_folder(None, &private));
        assert!(can_read_folder(Some(&owner), &private));
        assert!(!can_read_folder(Some(&other), &private));
        assert!(can_read_folder(Some(&admin), &private));
        assert!(ensure_can_read_folder(Some(&other), &private).is_err());
    }
}
