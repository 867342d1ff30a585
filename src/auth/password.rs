// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! bcrypt password hashing, run on the blocking thread pool.

use std::sync::{Arc, OnceLock};

use super::AuthError;

/// Production work factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Plaintext behind the decoy hash checked when no account matches.
const DECOY_PASSWORD: &str = "decoy password for unknown accounts";

/// Salted adaptive password hasher.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// Hash at `cost`, computed on first use.
    decoy_hash: Arc<OnceLock<String>>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            decoy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Hash `password` with a fresh salt.
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| AuthError::Internal(format!("failed to hash password: {e}")))
    }

    /// Check `password` against a stored hash.
    ///
    /// A malformed stored hash counts as a mismatch.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {e}")))?;

        match outcome {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                Ok(false)
            }
        }
    }

    /// Run a full verification against a decoy hash, so a login for an
    /// unknown email costs as much as a wrong password.
    pub async fn verify_absent(&self, password: &str) {
        let password = password.to_owned();
        let cost = self.cost;
        let decoy = Arc::clone(&self.decoy_hash);
        let outcome = tokio::task::spawn_blocking(move || {
            let hash = match decoy.get() {
                Some(hash) => hash,
                None => {
                    let fresh = bcrypt::hash(DECOY_PASSWORD, cost)?;
                    decoy.get_or_init(|| fresh)
                }
            };
            bcrypt::verify(password, hash).map(|_| ())
        })
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Decoy password check failed"),
            Err(e) => tracing::warn!(error = %e, "Decoy verification task failed"),
        }
    }

    #[cfg(test)]
    pub(crate) fn has_decoy(&self) -> bool {
        self.decoy_hash.get().is_some()
    }
}
