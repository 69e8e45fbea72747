//! authsync authentik - Remote identity client for the authentik API
//!
//! [`AuthentikClient`] implements every per-kind trait of
//! [`authsync_core::IdentityApi`] on top of the authentik v3 REST API.
//! The client never retries: failures are classified as
//! `RemoteUnavailable` or `RemoteRejected` and handed back to the caller.

pub mod client;
pub mod config;
mod http;


pub use client::AuthentikClient;
pub use config::AuthentikConfig;
