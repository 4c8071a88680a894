//! HTTP handlers for purchase orders

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
    services::purchase_order::{
        CreatePurchaseOrderInput, PurchaseOrderService, TransitionPurchaseOrderInput,
        UpdatePurchaseOrderInput,
    },
    AppState,
};
use shared::PurchaseOrder;

fn service(state: AppState) -> PurchaseOrderService {
    let tolerances = state.config.reconciliation.tolerances();
    PurchaseOrderService::new(state.db, tolerances)
}

/// Raise a draft purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<impl IntoResponse> {
    let order = service(state).create(actor, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(purchase_order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = service(state).get(purchase_order_id).await?;
    Ok(Json(order))
}

pub async fn update_purchase_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(purchase_order_id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = service(state).update(actor, purchase_order_id, input).await?;
    Ok(Json(order))
}

/// Request a status transition
pub async fn transition_purchase_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(purchase_order_id): Path<Uuid>,
    Json(input): Json<TransitionPurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = service(state).transition(actor, purchase_order_id, input).await?;
    Ok(Json(order))
}

pub async fn delete_purchase_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(purchase_order_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(state).delete(actor, purchase_order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
