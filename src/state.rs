// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::accounts::AccountService;
use crate::auth::{Clock, PasswordHasher, SessionAuthority};
use crate::config::ServerConfig;
use crate::storage::{AuthStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuthStore>,
    pub sessions: Arc<SessionAuthority>,
    pub accounts: Arc<AccountService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire the session authority and account flows over one store.
    pub fn new<S: AuthStore + 'static>(
        store: Arc<S>,
        config: ServerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session_store: Arc<dyn SessionStore> = store.clone();
        let store: Arc<dyn AuthStore> = store;

        let sessions = Arc::new(SessionAuthority::new(session_store, clock.clone()));
        let accounts = Arc::new(AccountService::new(
            store.clone(),
            sessions.clone(),
            clock,
            PasswordHasher::new(config.bcrypt_cost),
            config.app_base_url.clone(),
        ));

        Self {
            store,
            sessions,
            accounts,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
impl AppState {
    /// In-memory state with a cheap bcrypt cost.
    pub fn for_tests(clock: Arc<dyn Clock>) -> Self {
        use crate::config::BCRYPT_COST_ENV;
        use crate::storage::InMemoryStore;

        let config = ServerConfig::from_lookup(|name| {
            (name == BCRYPT_COST_ENV).then(|| "4".to_string())
        })
        .unwrap();
        Self::new(Arc::new(InMemoryStore::new()), config, clock)
    }
}
