//! authsync Core - Domain types and traits for the identity reconciliation engine

pub mod error;
pub mod ids;
pub mod models;
pub mod remote;
pub mod traits;


pub use error::*;
pub use ids::*;
pub use models::*;
pub use remote::*;
pub use traits::*;
