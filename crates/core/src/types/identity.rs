//! Authentication state as seen by the cart.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Signed-in/signed-out signal supplied by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "user_id", rename_all = "snake_case")]
pub enum Identity {
    /// Anonymous session; the cart lives on the device only.
    #[default]
    SignedOut,
    /// Authenticated session for a stable user id.
    SignedIn(UserId),
}

impl Identity {
    /// The signed-in user, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::SignedOut => None,
            Self::SignedIn(user_id) => Some(user_id),
        }
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }
}

impl From<Option<UserId>> for Identity {
    fn from(user_id: Option<UserId>) -> Self {
        user_id.map_or(Self::SignedOut, Self::SignedIn)
    }
}
