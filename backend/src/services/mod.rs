//! Business logic services for the Trade Fulfillment Engine

pub mod audit;
pub mod conversion;
pub mod ledger;
pub mod notification;
pub mod opportunity;
pub mod procurement;
pub mod purchase_order;
pub mod reconciliation;
pub mod sales_order;
pub mod shipment;

pub use audit::AuditService;
pub use conversion::ConversionService;
pub use ledger::LedgerService;
pub use notification::NotificationService;
pub use opportunity::OpportunityService;
pub use procurement::ProcurementService;
pub use purchase_order::PurchaseOrderService;
pub use reconciliation::ReconciliationService;
pub use sales_order::SalesOrderService;
pub use shipment::ShipmentService;
