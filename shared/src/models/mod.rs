//! Domain models for the fulfillment and procurement engine

mod activity;
mod commodity;
mod finance;
mod opportunity;
mod procurement;
mod purchase_order;
mod quote;
mod sales_order;
mod shipment;
pub mod state_machine;

pub use activity::*;
pub use commodity::*;
pub use finance::*;
pub use opportunity::*;
pub use procurement::*;
pub use purchase_order::*;
pub use quote::*;
pub use sales_order::*;
pub use shipment::*;
pub use state_machine::{Status, Transition};
