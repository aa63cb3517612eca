//! Store-user state machine.
//!
//! DESIGN
//! ======
//! The hook watches three inputs: the backend auth bridge, the frontend
//! user's id, and which sync client is installed. Together the bridge's
//! authenticated flag, the user id and the client generation form the
//! *watch key*. `reconcile` compares the key with the one it last acted on;
//! any difference clears the cached user id, invalidates the in-flight
//! ticket, and issues a fresh sync when the bridge is authenticated.
//!
//! Completions carry the ticket they were issued with. A completion whose
//! ticket is no longer current belongs to an abandoned identity and is
//! dropped, so a stale id can never mark a new identity as ready.

use serde::Serialize;

use crate::services::user_store::UserId;

/// Status reported by the backend auth bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStatus {
    pub is_loading: bool,
    pub is_authenticated: bool,
}

/// Readiness exposed to the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_loading: bool,
    pub is_authenticated: bool,
}

impl SyncStatus {
    pub const LOADING: Self = Self { is_loading: true, is_authenticated: false };
    pub const READY: Self = Self { is_loading: false, is_authenticated: true };
    pub const SIGNED_OUT: Self = Self { is_loading: false, is_authenticated: false };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Bridge reports no authenticated session.
    Unauthenticated,
    /// Sync decided on for this identity, call not yet dispatched.
    Authenticating { ticket: u64 },
    /// Sync call dispatched, awaiting the result.
    Syncing { ticket: u64 },
    /// Sync returned an id for the current identity.
    Synced { user_id: UserId },
    /// Sync call failed. Not ready until `retry` succeeds or the key changes.
    Failed { error: String },
}

/// Side effect the driver must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    IssueSync { ticket: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WatchKey {
    authenticated: bool,
    frontend_user: Option<String>,
    client_generation: u64,
}

#[derive(Debug)]
pub struct SyncMachine {
    bridge: BridgeStatus,
    frontend_user: Option<String>,
    client_generation: u64,
    acted_on: Option<WatchKey>,
    phase: Phase,
    next_ticket: u64,
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bridge: BridgeStatus::default(),
            frontend_user: None,
            client_generation: 0,
            acted_on: None,
            phase: Phase::Unauthenticated,
            next_ticket: 0,
        }
    }

    // -------------------------------------------------------------------------
    // inputs
    // -------------------------------------------------------------------------

    pub fn set_bridge(&mut self, bridge: BridgeStatus) {
        self.bridge = bridge;
    }

    pub fn set_frontend_user(&mut self, user_id: Option<String>) {
        self.frontend_user = user_id;
    }

    /// Record that a different sync client was installed.
    pub fn replace_client(&mut self) {
        self.client_generation += 1;
    }

    // -------------------------------------------------------------------------
    // transitions
    // -------------------------------------------------------------------------

    /// Re-evaluate after any input change.
    pub fn reconcile(&mut self) -> Effect {
        let key = self.watch_key();
        if self.acted_on.as_ref() == Some(&key) {
            return Effect::None;
        }

        let authenticated = key.authenticated;
        self.acted_on = Some(key);
        if !authenticated {
            self.phase = Phase::Unauthenticated;
            return Effect::None;
        }
        self.issue()
    }

    /// The driver has handed the call for `ticket` to the runtime.
    pub fn dispatched(&mut self, ticket: u64) {
        if self.phase == (Phase::Authenticating { ticket }) {
            self.phase = Phase::Syncing { ticket };
        }
    }

    /// Apply a sync result. Returns `false` if `ticket` is stale.
    pub fn complete(&mut self, ticket: u64, result: Result<UserId, String>) -> bool {
        if self.pending_ticket() != Some(ticket) {
            return false;
        }
        self.phase = match result {
            Ok(user_id) => Phase::Synced { user_id },
            Err(error) => Phase::Failed { error },
        };
        true
    }

    /// Re-issue the sync after a failure. No-op in any other phase.
    pub fn retry(&mut self) -> Effect {
        if matches!(self.phase, Phase::Failed { .. }) && self.bridge.is_authenticated {
            return self.issue();
        }
        Effect::None
    }

    /// Forget everything derived from the watch key, as on unmount. The next
    /// `reconcile` starts over.
    pub fn teardown(&mut self) {
        self.acted_on = None;
        self.phase = Phase::Unauthenticated;
    }

    fn issue(&mut self) -> Effect {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.phase = Phase::Authenticating { ticket };
        Effect::IssueSync { ticket }
    }

    // -------------------------------------------------------------------------
    // outputs
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let ready = self.user_id().is_some();
        SyncStatus {
            is_loading: self.bridge.is_loading || (self.bridge.is_authenticated && !ready),
            is_authenticated: self.bridge.is_authenticated && ready,
        }
    }

    /// Cached id, only while it still belongs to the current watch key.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self.phase {
            Phase::Synced { user_id } if self.acted_on.as_ref() == Some(&self.watch_key()) => Some(user_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub fn pending_ticket(&self) -> Option<u64> {
        match self.phase {
            Phase::Authenticating { ticket } | Phase::Syncing { ticket } => Some(ticket),
            _ => None,
        }
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed { error } => Some(error),
            _ => None,
        }
    }

    fn watch_key(&self) -> WatchKey {
        WatchKey {
            authenticated: self.bridge.is_authenticated,
            frontend_user: self.frontend_user.clone(),
            client_generation: self.client_generation,
        }
    }
}

#[cfg(test)]
#[path = "machine_test.rs"]
mod tests;
