//! The viewing user's identity.
//!
//! Identity is established by whatever signs the user in, outside this
//! crate, and published here as an observable value. A session waits for
//! it before connecting and never changes it afterwards.

use std::time::Duration;

use cardroom_protocol::UserId;
use tokio::sync::watch;

/// Observable "who is signed in" cell.
///
/// Cloning shares the same cell.
#[derive(Debug, Clone)]
pub struct IdentityCell {
    tx: watch::Sender<Option<UserId>>,
}

impl Default for IdentityCell {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityCell {
    /// An empty cell: nobody is signed in yet.
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(None),
        }
    }

    /// A cell that already holds `user`.
    pub fn signed_in(user: UserId) -> Self {
        Self {
            tx: watch::Sender::new(Some(user)),
        }
    }

    pub fn set(&self, user: UserId) {
        self.tx.send_replace(Some(user));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<UserId> {
        *self.tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }

    /// Resolves with the identity as soon as one is present.
    pub async fn wait(&self) -> UserId {
        let mut rx = self.tx.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if let Some(user) = current {
                return user;
            }
            // The sender lives in `self`, so this cannot fail while we
            // are borrowed.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Like [`wait`](Self::wait), but gives up after `limit`.
    pub async fn wait_for(&self, limit: Duration) -> Option<UserId> {
        tokio::time::timeout(limit, self.wait()).await.ok()
    }
}
