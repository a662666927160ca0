use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yatra_shared::Masked;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Vendor,
    Admin,
    SuperAdmin,
}

/// Profile cached from the identity provider and the backend `/auth/me` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub email: Masked<String>,
    pub name: String,
    #[serde(default)]
    pub phone: Option<Masked<String>>,
    #[serde(default)]
    pub role: Role,
}

/// An authenticated session. The bearer token is attached to every mutating backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: Masked<String>,
    pub user: UserProfile,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: String, user: UserProfile) -> CoreResult<Self> {
        if token.trim().is_empty() {
            return Err(CoreError::IdentityError("empty bearer token".to_string()));
        }
        if user.uid.trim().is_empty() {
            return Err(CoreError::IdentityError("profile has no uid".to_string()));
        }

        Ok(Self {
            token: Masked::new(token),
            user,
            signed_in_at: Utc::now(),
        })
    }

    pub fn bearer(&self) -> &str {
        self.token.expose()
    }
}

/// Source of the current session, injected into the booking pipeline
pub trait SessionProvider: Send + Sync {
    fn current_session(&self) -> Option<Session>;
}

/// Fixed session, mostly useful for headless runs and tests
pub struct StaticSessionProvider {
    session: Option<Session>,
}

impl StaticSessionProvider {
    pub fn new(session: Option<Session>) -> Self {
        Self { session }
    }
}

impl SessionProvider for StaticSessionProvider {
    fn current_session(&self) -> Option<Session> {
        self.session.clone()
    }
}
