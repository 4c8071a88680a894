//! Shared domain engine for order fulfillment and procurement reconciliation
//!
//! Everything in this crate is pure: status transition tables, gate
//! evaluation over snapshots, quantity conversion, payment application and
//! quote pricing. Persistence lives in the backend.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
