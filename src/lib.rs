//! Settle: identity sync between an external identity provider and the
//! `users` table.
//!
//! ARCHITECTURE
//! ============
//! The server half (`routes`, `services`, `identity`, `db`) exposes the
//! store-user mutation over HTTP. The client half (`client`) is the hook
//! that drives that mutation from observed auth state and reports readiness
//! to whatever renders the UI.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod routes;
pub mod services;
pub mod state;
