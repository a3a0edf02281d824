//! The connected-peer registry: who is currently logged in upstream.
//!
//! One registry exists per process. It is shared (`Arc<PeerRegistry>`)
//! between every session bridge, which adds its identity when the chat
//! network confirms registration and removes it when the session ends,
//! and the HTTP layer, which lists it for `/api/connected-users`.
//!
//! # Ownership
//!
//! The same identity can be held by more than one session at once, e.g.
//! a reconnecting client whose old session hasn't seen its `close` yet.
//! Each identity therefore carries a count of the sessions holding it:
//! `add` takes a hold, `remove` releases one, and the identity is listed
//! until the last hold is released.
//!
//! # Concurrency note
//!
//! The map sits behind a `tokio::sync::RwLock`: `add`/`remove` take the
//! write lock so counts stay exact even when sessions race, and `list`
//! takes the read lock and returns a copy. A snapshot can be stale the
//! moment it is returned.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

/// Identities with an Active session, each with its number of holders.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<BTreeMap<String, usize>>,
}

impl PeerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a hold on `identity`.
    ///
    /// Returns `true` if the identity was not listed before.
    pub async fn add(&self, identity: &str) -> bool {
        let mut peers = self.peers.write().await;
        let holders = peers.entry(identity.to_owned()).or_insert(0);
        *holders += 1;
        let inserted = *holders == 1;
        if inserted {
            tracing::info!(identity, "peer registered");
        } else {
            tracing::debug!(identity, holders = *holders, "peer already registered");
        }
        inserted
    }

    /// Releases one hold on `identity`. Removing an absent identity is a
    /// no-op.
    ///
    /// Returns `true` if that was the last hold and the identity is no
    /// longer listed.
    pub async fn remove(&self, identity: &str) -> bool {
        let mut peers = self.peers.write().await;
        let Some(holders) = peers.get_mut(identity) else {
            return false;
        };
        *holders -= 1;
        if *holders > 0 {
            tracing::debug!(identity, holders = *holders, "peer still held by another session");
            return false;
        }
        peers.remove(identity);
        tracing::info!(identity, "peer deregistered");
        true
    }

    /// Returns a sorted snapshot of the current identities.
    pub async fn list(&self) -> Vec<String> {
        self.peers.read().await.keys().cloned().collect()
    }

    /// Returns `true` if `identity` is currently registered.
    pub async fn contains(&self, identity: &str) -> bool {
        self.peers.read().await.contains_key(identity)
    }

    /// Returns the number of registered identities.
    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Returns `true` if nobody is registered.
    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
