//! GitHub Issues + Projects v2 synchronization.
//!
//! - [`outbound`] pushes local task mutations to GitHub (best-effort,
//!   never failing the local write).
//! - [`inbound`] applies verified webhook deliveries to local tasks via an
//!   idempotent upsert.
//! - [`client`] is the typed REST/GraphQL wrapper both directions share.
//! - [`status`] holds the bit-exact status↔label mapping contract.
//! - [`project`] resolves a project's typed Status field and its items.
//! - [`signature`] authenticates webhook payloads.

pub mod client;
pub mod inbound;
pub mod outbound;
pub mod project;
pub mod signature;
pub mod status;
