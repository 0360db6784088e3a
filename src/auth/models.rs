use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles known to the gallery.
///
/// The order of variants matters: it defines the privilege hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A regular account: manages its own gallery.
    User = 0,
    /// Manages every account.
    Admin = 1,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    /// The admin role belongs to exactly one email (case-insensitive).
    pub fn for_email(email: &str, admin_email: &str) -> Self {
        if is_admin_email(email, admin_email) {
            Role::Admin
        } else {
            Role::User
        }
    }

    /// Returns `true` if `self` has at least the required role.
    pub fn has_access(&self, required: Role) -> bool {
        *self >= required
    }
}

/// Case-insensitive comparison against the configured admin email.
pub fn is_admin_email(email: &str, admin_email: &str) -> bool {
    email.trim().eq_ignore_ascii_case(admin_email.trim())
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The caller of a request, as established by the session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role.has_access(Role::Admin)
    }

    /// Owners may act on their own gallery; the admin may act on any.
    pub fn can_manage(&self, uid: &str) -> bool {
        self.user_id == uid || self.is_admin()
    }
}
