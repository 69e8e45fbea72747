//! Per-kind capability sets plugged into the orchestrator

mod application;
mod group;
mod provider;
mod user;

pub use application::ApplicationKind;
pub use group::GroupKind;
pub use provider::ProviderKind;
pub use user::UserKind;
