//! Service modules for Pinboard.
//!
//! The GitHub sync engine lives under [`github`]: outbound propagation of
//! local task mutations, inbound webhook processing, and the supporting
//! client/mapping/verification pieces. [`token_vault`] protects the
//! per-board access tokens at rest, and [`events`] fans out local change
//! notifications after inbound writes.

pub mod config;
pub mod events;
pub mod github;
pub mod token_vault;
