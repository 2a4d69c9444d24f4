//! Authenticated caller identity.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Role claim carried by the caller's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Parses a role claim. Unknown roles are treated as plain users.
    pub fn from_claim(claim: &str) -> Self {
        match claim {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// The authenticated user on whose behalf an operation runs.
///
/// Carries the caller's bearer token so that service-to-service calls made
/// on the user's behalf can forward it.
#[derive(Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub token: Option<String>,
}

impl Requester {
    pub fn new(user_id: UserId, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
            token: None,
        }
    }

    /// Attaches the bearer token this requester authenticated with.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns true if the requester owns a record or is an admin.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.user_id == owner || self.is_admin()
    }
}

impl std::fmt::Debug for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requester")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_claim() {
        assert_eq!(Role::from_claim("admin"), Role::Admin);
        assert_eq!(Role::from_claim("user"), Role::User);
        assert_eq!(Role::from_claim("superuser"), Role::User);
    }

    #[test]
    fn test_can_access() {
        let owner = UserId::new();
        let user = Requester::new(owner, "a@example.com", Role::User);
        let stranger = Requester::new(UserId::new(), "b@example.com", Role::User);
        let admin = Requester::new(UserId::new(), "root@example.com", Role::Admin);

        assert!(user.can_access(owner));
        assert!(!stranger.can_access(owner));
        assert!(admin.can_access(owner));
    }

    #[test]
    fn test_debug_redacts_token() {
        let requester =
            Requester::new(UserId::new(), "a@example.com", Role::User).with_token("secret-token");
        let debug = format!("{requester:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}
