//! authsync Reconcile - Converges local identity resources onto authentik
//!
//! Every reconciliation runs the same state machine ([`Reconciler`]),
//! parameterized by a per-kind capability set ([`ReconcileKind`]):
//!
//! - live records: lookup, resolve dependencies and create if absent, then
//!   synchronize set-valued relationships and attach the finalizer
//! - deleting records: delete the remote object, then release the finalizer
//!
//! The [`Controller`] drives reconciliations from store events and owns
//! redelivery; the engine itself never retries.

pub mod controller;
pub mod finalizer;
pub mod kinds;
pub mod membership;
pub mod orchestrator;
pub mod resolver;


pub use controller::{Controller, ControllerConfig};
pub use finalizer::Finalizer;
pub use kinds::{ApplicationKind, GroupKind, ProviderKind, UserKind};
pub use membership::{MembershipChanges, MembershipDiff, MembershipTarget};
pub use orchestrator::{
    build_reconcilers, Reconcile, ReconcileKind, ReconcileOutcome, Reconciler, ReconcilerConfig,
    UpdatePolicy,
};
pub use resolver::{DependencyResolver, ProviderDependencies};
