//! HTTP handlers for sales orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::CurrentActor,
    services::sales_order::{
        CreateSalesOrderInput, SalesOrderService, TransitionSalesOrderInput,
    },
    AppState,
};
use shared::{SalesOrder, SalesOrderStatus};

#[derive(Debug, Deserialize)]
pub struct ListSalesOrdersQuery {
    pub status: Option<SalesOrderStatus>,
}

/// Convert an opportunity into a sales order
pub async fn create_sales_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<CreateSalesOrderInput>,
) -> AppResult<impl IntoResponse> {
    let service = SalesOrderService::new(state.db, &state.config);
    let order = service.create_from_opportunity(actor, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_sales_orders(
    State(state): State<AppState>,
    Query(query): Query<ListSalesOrdersQuery>,
) -> AppResult<Json<Vec<SalesOrder>>> {
    let service = SalesOrderService::new(state.db, &state.config);
    let orders = service.list(query.status).await?;
    Ok(Json(orders))
}

pub async fn get_sales_order(
    State(state): State<AppState>,
    Path(sales_order_id): Path<Uuid>,
) -> AppResult<Json<SalesOrder>> {
    let service = SalesOrderService::new(state.db, &state.config);
    let order = service.get(sales_order_id).await?;
    Ok(Json(order))
}

/// Request a status transition
pub async fn transition_sales_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(sales_order_id): Path<Uuid>,
    Json(input): Json<TransitionSalesOrderInput>,
) -> AppResult<Json<SalesOrder>> {
    let service = SalesOrderService::new(state.db, &state.config);
    let order = service.transition(actor, sales_order_id, input).await?;
    Ok(Json(order))
}
