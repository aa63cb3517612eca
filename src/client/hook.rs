//! Async driver for the store-user state machine.
//!
//! ARCHITECTURE
//! ============
//! `StoreUserHook` owns a `SyncMachine` behind a mutex. Every input setter
//! reconciles the machine; an `IssueSync` effect spawns the sync call on the
//! tokio runtime. The spawned task only holds a weak reference back to the
//! hook, so a dropped hook never receives a late completion. Status changes
//! are published through a `watch` channel for the UI to observe.
//!
//! Setters must be called from within a tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::api::UserSyncClient;
use super::machine::{BridgeStatus, Effect, SyncMachine, SyncStatus};
use crate::services::user_store::UserId;

struct Inner {
    machine: SyncMachine,
    client: Arc<dyn UserSyncClient>,
    in_flight: Option<(u64, JoinHandle<()>)>,
}

impl Inner {
    fn install_client(&mut self, client: Arc<dyn UserSyncClient>) {
        if !same_client(&self.client, &client) {
            self.client = client;
            self.machine.replace_client();
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    status_tx: watch::Sender<SyncStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Machine transitions are single assignments; poisoning leaves no partial state.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn publish(&self, status: SyncStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    fn finish(&self, ticket: u64, result: Result<UserId, String>) {
        let status = {
            let mut inner = self.lock();
            if !inner.machine.complete(ticket, result) {
                debug!(ticket, "dropping stale sync completion");
                return;
            }
            if inner.in_flight.as_ref().is_some_and(|(t, _)| *t == ticket) {
                inner.in_flight = None;
            }
            inner.machine.status()
        };
        self.publish(status);
    }
}

/// Keeps the signed-in identity synced with the backend and reports readiness.
pub struct StoreUserHook {
    shared: Arc<Shared>,
}

impl StoreUserHook {
    #[must_use]
    pub fn new(client: Arc<dyn UserSyncClient>) -> Self {
        let machine = SyncMachine::new();
        let (status_tx, _) = watch::channel(machine.status());
        let shared = Arc::new(Shared { inner: Mutex::new(Inner { machine, client, in_flight: None }), status_tx });
        Self { shared }
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        *self.shared.status_tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.shared.status_tx.subscribe()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.shared.lock().machine.user_id()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().machine.last_error().map(str::to_owned)
    }

    pub fn set_bridge(&self, bridge: BridgeStatus) {
        self.drive(|inner| {
            inner.machine.set_bridge(bridge);
            inner.machine.reconcile()
        });
    }

    pub fn set_frontend_user(&self, user_id: Option<String>) {
        self.drive(|inner| {
            inner.machine.set_frontend_user(user_id);
            inner.machine.reconcile()
        });
    }

    /// Install a different sync client. Re-syncs if it is not the same one.
    pub fn set_client(&self, client: Arc<dyn UserSyncClient>) {
        self.drive(|inner| {
            inner.install_client(client);
            inner.machine.reconcile()
        });
    }

    /// Switch client and frontend user together, reconciling once.
    pub fn set_session(&self, client: Arc<dyn UserSyncClient>, user_id: Option<String>) {
        self.drive(|inner| {
            inner.install_client(client);
            inner.machine.set_frontend_user(user_id);
            inner.machine.reconcile()
        });
    }

    /// Drop the frontend user and the bridge session together, reconciling once.
    pub fn sign_out(&self) {
        self.drive(|inner| {
            inner.machine.set_bridge(BridgeStatus::default());
            inner.machine.set_frontend_user(None);
            inner.machine.reconcile()
        });
    }

    /// Re-issue the sync after a failure.
    pub fn retry(&self) {
        self.drive(|inner| inner.machine.retry());
    }

    fn drive(&self, step: impl FnOnce(&mut Inner) -> Effect) {
        let status = {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            let effect = step(inner);

            // Cancel a call whose ticket the machine no longer waits on.
            let pending = inner.machine.pending_ticket();
            if inner.in_flight.as_ref().is_some_and(|(t, _)| Some(*t) != pending) {
                if let Some((ticket, handle)) = inner.in_flight.take() {
                    debug!(ticket, "cancelling superseded sync");
                    handle.abort();
                }
            }

            if let Effect::IssueSync { ticket } = effect {
                let handle = spawn_sync(Arc::downgrade(&self.shared), inner.client.clone(), ticket);
                inner.in_flight = Some((ticket, handle));
                inner.machine.dispatched(ticket);
            }
            inner.machine.status()
        };
        self.shared.publish(status);
    }
}

impl Drop for StoreUserHook {
    fn drop(&mut self) {
        let status = {
            let mut inner = self.shared.lock();
            if let Some((_, handle)) = inner.in_flight.take() {
                handle.abort();
            }
            inner.machine.teardown();
            inner.machine.status()
        };
        self.shared.publish(status);
    }
}

fn spawn_sync(shared: Weak<Shared>, client: Arc<dyn UserSyncClient>, ticket: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = client.store_user().await;
        if let Err(e) = &result {
            error!(error = %e, ticket, "user sync failed");
        }
        if let Some(shared) = shared.upgrade() {
            shared.finish(ticket, result.map_err(|e| e.to_string()));
        }
    })
}

fn same_client(a: &Arc<dyn UserSyncClient>, b: &Arc<dyn UserSyncClient>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
#[path = "hook_test.rs"]
mod tests;
