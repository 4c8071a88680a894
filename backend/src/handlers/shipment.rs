//! HTTP handlers for shipments and goods receipt

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::CurrentActor,
    services::shipment::{CreateGrnInput, CreateShipmentInput, ShipmentService},
    AppState,
};
use shared::{Grn, Shipment, ShipmentParty};

/// Exactly one of the two order IDs selects the shipments
#[derive(Debug, Deserialize)]
pub struct ListShipmentsQuery {
    pub purchase_order_id: Option<Uuid>,
    pub sales_order_id: Option<Uuid>,
}

impl ListShipmentsQuery {
    fn party(&self) -> AppResult<ShipmentParty> {
        match (self.purchase_order_id, self.sales_order_id) {
            (Some(purchase_order_id), None) => Ok(ShipmentParty::Inbound { purchase_order_id }),
            (None, Some(sales_order_id)) => Ok(ShipmentParty::Outbound { sales_order_id }),
            _ => Err(AppError::validation(
                "purchase_order_id",
                "Provide either purchase_order_id or sales_order_id",
            )),
        }
    }
}

pub async fn create_shipment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<CreateShipmentInput>,
) -> AppResult<impl IntoResponse> {
    let service = ShipmentService::new(state.db);
    let shipment = service.create(actor, input).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

pub async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ListShipmentsQuery>,
) -> AppResult<Json<Vec<Shipment>>> {
    let party = query.party()?;
    let service = ShipmentService::new(state.db);
    let shipments = service.list(party).await?;
    Ok(Json(shipments))
}

/// Mark a shipment delivered
pub async fn deliver_shipment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(shipment_id): Path<Uuid>,
) -> AppResult<Json<Shipment>> {
    let service = ShipmentService::new(state.db);
    let shipment = service.mark_delivered(actor, shipment_id).await?;
    Ok(Json(shipment))
}

/// Record the goods receipt note of a purchase order
pub async fn create_grn(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(purchase_order_id): Path<Uuid>,
    Json(input): Json<CreateGrnInput>,
) -> AppResult<impl IntoResponse> {
    let service = ShipmentService::new(state.db);
    let grn = service.create_grn(actor, purchase_order_id, input).await?;
    Ok((StatusCode::CREATED, Json(grn)))
}

pub async fn get_grn(
    State(state): State<AppState>,
    Path(purchase_order_id): Path<Uuid>,
) -> AppResult<Json<Grn>> {
    let service = ShipmentService::new(state.db);
    let grn = service.get_grn(purchase_order_id).await?;
    Ok(Json(grn))
}
