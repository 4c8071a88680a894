//! Route definitions for the Trade Fulfillment Engine
//!
//! Reads are open; every mutating handler takes a `CurrentActor`, so a
//! request without a valid `X-Actor-Id` header is rejected with 401.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/opportunities", opportunity_routes())
        .nest("/samples", sample_routes())
        .nest("/sales-orders", sales_order_routes())
        .nest("/projects", project_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/shipments", shipment_routes())
        .nest("/invoices", invoice_routes())
        .nest("/bills", bill_routes())
        .nest("/ledger", ledger_routes())
        // Calculators
        .route("/conversions", post(handlers::convert_quantity))
        .route("/quotes", post(handlers::calculate_quote_handler))
        // Audit trail
        .route(
            "/activities/:entity_type/:entity_id",
            get(handlers::list_activities),
        )
}

/// Opportunity routes
fn opportunity_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_opportunities).post(handlers::create_opportunity),
        )
        .route(
            "/:opportunity_id",
            get(handlers::get_opportunity).put(handlers::update_opportunity),
        )
        .route("/:opportunity_id/status", post(handlers::set_opportunity_status))
        .route("/:opportunity_id/project", post(handlers::link_opportunity_project))
        .route(
            "/:opportunity_id/samples",
            get(handlers::list_samples).post(handlers::add_sample),
        )
}

fn sample_routes() -> Router<AppState> {
    Router::new().route("/:sample_id/status", post(handlers::set_sample_status))
}

/// Sales order routes, including invoices raised against an order
fn sales_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_sales_orders).post(handlers::create_sales_order),
        )
        .route("/:sales_order_id", get(handlers::get_sales_order))
        .route(
            "/:sales_order_id/transition",
            post(handlers::transition_sales_order),
        )
        .route(
            "/:sales_order_id/invoices",
            get(handlers::list_invoices).post(handlers::create_invoice),
        )
        .route("/:sales_order_id/balance", get(handlers::order_balance))
}

/// Procurement project routes
fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_projects).post(handlers::create_project))
        .route("/:project_id", get(handlers::get_project))
        .route("/:project_id/vendors", post(handlers::link_project_vendor))
        .route("/:project_id/recompute", post(handlers::recompute_project))
}

/// Purchase order routes, including bills and the goods receipt note
fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_purchase_order))
        .route(
            "/:purchase_order_id",
            get(handlers::get_purchase_order)
                .put(handlers::update_purchase_order)
                .delete(handlers::delete_purchase_order),
        )
        .route(
            "/:purchase_order_id/transition",
            post(handlers::transition_purchase_order),
        )
        .route(
            "/:purchase_order_id/bills",
            get(handlers::list_bills).post(handlers::create_bill),
        )
        .route(
            "/:purchase_order_id/grn",
            get(handlers::get_grn).post(handlers::create_grn),
        )
}

fn shipment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_shipments).post(handlers::create_shipment))
        .route("/:shipment_id/deliver", post(handlers::deliver_shipment))
}

fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:invoice_id",
            get(handlers::get_invoice).delete(handlers::delete_invoice),
        )
        .route("/:invoice_id/payments", post(handlers::record_invoice_payment))
}

fn bill_routes() -> Router<AppState> {
    Router::new()
        .route("/:bill_id", get(handlers::get_bill).delete(handlers::delete_bill))
        .route("/:bill_id/approve", post(handlers::approve_bill))
        .route("/:bill_id/payments", post(handlers::record_bill_payment))
}

/// Ledger routes
fn ledger_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::record_transaction),
        )
        .route("/summary", get(handlers::ledger_summary))
}
