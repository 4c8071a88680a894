//! HTTP request handlers

mod audit;
mod conversion;
mod health;
mod ledger;
mod opportunity;
mod procurement;
mod purchase_order;
mod reconciliation;
mod sales_order;
mod shipment;

pub use audit::*;
pub use conversion::*;
pub use health::*;
pub use ledger::*;
pub use opportunity::*;
pub use procurement::*;
pub use purchase_order::*;
pub use reconciliation::*;
pub use sales_order::*;
pub use shipment::*;
