//! Owner-only write policy for feature tables.

#![forbid(unsafe_code)]

use fstore_remote::{IdentityService, ObjectDetails};
use fstore_result::Result;
use fstore_types::UserId;

/// Decides whether the caller may edit or annotate repository objects.
///
/// Editing is stricter than the object ACL: only the owner may write, even
/// when the ACL would allow group members to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionGuard {
    user: UserId,
}

impl PermissionGuard {
    pub fn new(user: UserId) -> Self {
        Self { user }
    }

    /// Resolve the caller once from the identity service.
    pub fn from_identity<I: IdentityService + ?Sized>(identity: &I) -> Result<Self> {
        Ok(Self::new(identity.current_user()?))
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn can_edit(&self, details: &ObjectDetails) -> bool {
        details.owner == self.user && details.permissions.can_edit
    }

    pub fn can_annotate(&self, details: &ObjectDetails) -> bool {
        details.permissions.can_annotate
    }
}
