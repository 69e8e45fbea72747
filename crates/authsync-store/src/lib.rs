//! Local resource store for authsync
//!
//! The reconciliation engine treats the store as a black box behind
//! [`authsync_core::ResourceStore`]. This crate provides the in-memory
//! implementation used by the operator binary and by tests, plus the YAML
//! manifest loader that seeds it.

pub mod manifest;
pub mod memory;

#[cfg(test)]
mod tests;

pub use manifest::{load_dir, load_str, Manifest, ManifestMeta};
pub use memory::MemoryStore;
