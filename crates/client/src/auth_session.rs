//! Authentication session with persistent token storage.

use std::fmt;
use std::sync::Arc;

use petadmin_shared::AdminProfile;

use crate::storage::{self, KeyValueStore};

pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";

/// Token store handle. Cloning shares the underlying storage.
#[derive(Clone)]
pub struct AuthSession {
    store: Arc<dyn KeyValueStore>,
}

impl AuthSession {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist a freshly issued token and the admin profile that came with it.
    pub fn login(&self, token: &str, profile: Option<&AdminProfile>) {
        if !self.store.set(TOKEN_KEY, token) {
            tracing::warn!("failed to persist auth token");
        }
        match profile {
            Some(profile) => {
                storage::save(self.store.as_ref(), USER_KEY, profile);
            }
            None => self.store.remove(USER_KEY),
        }
    }

    /// Clear token and cached profile.
    pub fn logout(&self) {
        self.store.remove(TOKEN_KEY);
        self.store.remove(USER_KEY);
    }

    pub fn token(&self) -> Option<String> {
        self.store
            .get(TOKEN_KEY)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    pub fn profile(&self) -> Option<AdminProfile> {
        storage::load(self.store.as_ref(), USER_KEY)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
