//! Identity gate in front of the chat surface.
//!
//! Chat is only enabled for a signed-in user. The pipeline itself never
//! looks at the identity; callers check it once before creating a
//! [`Conversation`](crate::Conversation).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Environment variable read by [`EnvIdentity`].
pub const USER_ENV_VAR: &str = "CHATRAG_USER";

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier of the signed-in user.
    pub user_id: String,
}

impl Identity {
    /// Create an identity for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

/// Source of the current user's identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the signed-in user, or `None` when nobody is signed in.
    async fn current(&self) -> Result<Option<Identity>>;
}

/// Resolve the current identity, failing when nobody is signed in.
///
/// # Errors
///
/// Returns [`RagError::Unauthenticated`] when the provider reports no user,
/// and propagates provider failures.
pub async fn require_identity(provider: &dyn IdentityProvider) -> Result<Identity> {
    provider.current().await?.ok_or_else(|| {
        RagError::Unauthenticated("sign in to start chatting".to_string())
    })
}

/// A fixed identity, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    /// A provider that always reports `user_id` as signed in.
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self(Some(Identity::new(user_id)))
    }

    /// A provider that never reports a user.
    pub fn signed_out() -> Self {
        Self(None)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current(&self) -> Result<Option<Identity>> {
        Ok(self.0.clone())
    }
}

/// Reads the user id from [`USER_ENV_VAR`]. Blank counts as signed out.
#[derive(Debug, Clone, Default)]
pub struct EnvIdentity;

#[async_trait]
impl IdentityProvider for EnvIdentity {
    async fn current(&self) -> Result<Option<Identity>> {
        Ok(std::env::var(USER_ENV_VAR)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Identity::new))
    }
}
