//! HTTP handlers for the transaction ledger

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::CurrentActor,
    services::ledger::{LedgerService, RecordTransactionInput, TransactionFilter},
    AppState,
};
use shared::{LedgerSummary, OrderBalance, Transaction};

/// Record a manual ledger entry
pub async fn record_transaction(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<RecordTransactionInput>,
) -> AppResult<impl IntoResponse> {
    let service = LedgerService::new(state.db);
    let transaction = service.record_transaction(actor, input).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<Json<Vec<Transaction>>> {
    let service = LedgerService::new(state.db);
    let transactions = service.list(filter).await?;
    Ok(Json(transactions))
}

/// Income, expenses and net over an optional date range
pub async fn ledger_summary(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<Json<LedgerSummary>> {
    let service = LedgerService::new(state.db);
    let summary = service.summary(filter).await?;
    Ok(Json(summary))
}

pub async fn order_balance(
    State(state): State<AppState>,
    Path(sales_order_id): Path<Uuid>,
) -> AppResult<Json<OrderBalance>> {
    let service = LedgerService::new(state.db);
    let balance = service.order_balance(sales_order_id).await?;
    Ok(Json(balance))
}
