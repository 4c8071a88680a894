//! HTTP handlers for invoices, bills and their payments

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::CurrentActor,
    services::reconciliation::{
        CreateBillInput, CreateInvoiceInput, PaymentReceipt, RecordPaymentInput,
        ReconciliationService,
    },
    AppState,
};
use shared::{Bill, Invoice};

// ============================================================================
// Invoices
// ============================================================================

/// Raise an invoice against a sales order
pub async fn create_invoice(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(sales_order_id): Path<Uuid>,
    Json(input): Json<CreateInvoiceInput>,
) -> AppResult<impl IntoResponse> {
    let service = ReconciliationService::new(state.db);
    let invoice = service.create_invoice(actor, sales_order_id, input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Path(sales_order_id): Path<Uuid>,
) -> AppResult<Json<Vec<Invoice>>> {
    let service = ReconciliationService::new(state.db);
    let invoices = service.list_invoices(sales_order_id).await?;
    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    let service = ReconciliationService::new(state.db);
    let invoice = service.get_invoice(invoice_id).await?;
    Ok(Json(invoice))
}

/// Apply a client payment and post the matching CREDIT
pub async fn record_invoice_payment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<impl IntoResponse> {
    let service = ReconciliationService::new(state.db);
    let receipt: PaymentReceipt<Invoice> =
        service.record_invoice_payment(actor, invoice_id, input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = ReconciliationService::new(state.db);
    service.delete_invoice(actor, invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Bills
// ============================================================================

/// Record a vendor bill against a purchase order
pub async fn create_bill(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(purchase_order_id): Path<Uuid>,
    Json(input): Json<CreateBillInput>,
) -> AppResult<impl IntoResponse> {
    let service = ReconciliationService::new(state.db);
    let bill = service.create_bill(actor, purchase_order_id, input).await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

pub async fn list_bills(
    State(state): State<AppState>,
    Path(purchase_order_id): Path<Uuid>,
) -> AppResult<Json<Vec<Bill>>> {
    let service = ReconciliationService::new(state.db);
    let bills = service.list_bills(purchase_order_id).await?;
    Ok(Json(bills))
}

pub async fn get_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<Uuid>,
) -> AppResult<Json<Bill>> {
    let service = ReconciliationService::new(state.db);
    let bill = service.get_bill(bill_id).await?;
    Ok(Json(bill))
}

pub async fn approve_bill(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(bill_id): Path<Uuid>,
) -> AppResult<Json<Bill>> {
    let service = ReconciliationService::new(state.db);
    let bill = service.approve_bill(actor, bill_id).await?;
    Ok(Json(bill))
}

/// Pay a vendor bill and post the matching DEBIT
pub async fn record_bill_payment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(bill_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<impl IntoResponse> {
    let service = ReconciliationService::new(state.db);
    let receipt: PaymentReceipt<Bill> = service.record_bill_payment(actor, bill_id, input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn delete_bill(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(bill_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = ReconciliationService::new(state.db);
    service.delete_bill(actor, bill_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
