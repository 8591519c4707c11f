use std::sync::RwLock;

use gatherly_core::types::EntityId;
use serde::{Deserialize, Serialize};

/// The signed-in organizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: EntityId,
    pub email: String,
}

/// Source of the current user. Authentication itself happens elsewhere.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<Identity>;
}

/// Fixed identity, settable at runtime (sign-in / sign-out in tests and
/// embedding hosts).
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user: RwLock<Option<Identity>>,
}

impl StaticIdentity {
    pub fn signed_in(id: impl Into<EntityId>, email: impl Into<String>) -> Self {
        Self {
            user: RwLock::new(Some(Identity {
                id: id.into(),
                email: email.into(),
            })),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set(&self, user: Option<Identity>) {
        if let Ok(mut slot) = self.user.write() {
            *slot = user;
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<Identity> {
        self.user.read().ok().and_then(|u| u.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_and_out() {
        let identity = StaticIdentity::anonymous();
        assert!(identity.current_user().is_none());

        identity.set(Some(Identity {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
        }));
        assert_eq!(identity.current_user().unwrap().id, "u1");

        identity.set(None);
        assert!(identity.current_user().is_none());
    }
}
