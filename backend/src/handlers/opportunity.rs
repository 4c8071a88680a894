//! HTTP handlers for sales opportunities and sample submissions

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
    services::opportunity::{
        AddSampleInput, CreateOpportunityInput, LinkProjectInput, OpportunityService,
        SetOpportunityStatusInput, SetSampleStatusInput, UpdateOpportunityInput,
    },
    AppState,
};
use shared::{OpportunityStatus, SalesOpportunity, SampleSubmission};

#[derive(Debug, Deserialize)]
pub struct ListOpportunitiesQuery {
    pub status: Option<OpportunityStatus>,
}

/// Create an opportunity
pub async fn create_opportunity(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<CreateOpportunityInput>,
) -> AppResult<impl IntoResponse> {
    let service = OpportunityService::new(state.db);
    let opportunity = service.create(actor, input).await?;
    Ok((StatusCode::CREATED, Json(opportunity)))
}

/// List opportunities, optionally by status
pub async fn list_opportunities(
    State(state): State<AppState>,
    Query(query): Query<ListOpportunitiesQuery>,
) -> AppResult<Json<Vec<SalesOpportunity>>> {
    let service = OpportunityService::new(state.db);
    let opportunities = service.list(query.status).await?;
    Ok(Json(opportunities))
}

/// Get an opportunity by ID
pub async fn get_opportunity(
    State(state): State<AppState>,
    Path(opportunity_id): Path<Uuid>,
) -> AppResult<Json<SalesOpportunity>> {
    let service = OpportunityService::new(state.db);
    let opportunity = service.get(opportunity_id).await?;
    Ok(Json(opportunity))
}

/// Update quantity, pricing or commodity selection
pub async fn update_opportunity(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(opportunity_id): Path<Uuid>,
    Json(input): Json<UpdateOpportunityInput>,
) -> AppResult<Json<SalesOpportunity>> {
    let service = OpportunityService::new(state.db);
    let opportunity = service.update(actor, opportunity_id, input).await?;
    Ok(Json(opportunity))
}

/// Change pipeline status
pub async fn set_opportunity_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(opportunity_id): Path<Uuid>,
    Json(input): Json<SetOpportunityStatusInput>,
) -> AppResult<Json<SalesOpportunity>> {
    let service = OpportunityService::new(state.db);
    let opportunity = service.set_status(actor, opportunity_id, input).await?;
    Ok(Json(opportunity))
}

/// Link an opportunity to a procurement project
pub async fn link_opportunity_project(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(opportunity_id): Path<Uuid>,
    Json(input): Json<LinkProjectInput>,
) -> AppResult<Json<SalesOpportunity>> {
    let service = OpportunityService::new(state.db);
    let opportunity = service.link_to_project(actor, opportunity_id, input).await?;
    Ok(Json(opportunity))
}

/// Record a vendor sample
pub async fn add_sample(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(opportunity_id): Path<Uuid>,
    Json(input): Json<AddSampleInput>,
) -> AppResult<impl IntoResponse> {
    let service = OpportunityService::new(state.db);
    let sample = service.add_sample(actor, opportunity_id, input).await?;
    Ok((StatusCode::CREATED, Json(sample)))
}

/// List samples of an opportunity
pub async fn list_samples(
    State(state): State<AppState>,
    Path(opportunity_id): Path<Uuid>,
) -> AppResult<Json<Vec<SampleSubmission>>> {
    let service = OpportunityService::new(state.db);
    let samples = service.list_samples(opportunity_id).await?;
    Ok(Json(samples))
}

/// Record the client's verdict on a sample
pub async fn set_sample_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(sample_id): Path<Uuid>,
    Json(input): Json<SetSampleStatusInput>,
) -> AppResult<Json<SampleSubmission>> {
    let service = OpportunityService::new(state.db);
    let sample = service.set_sample_status(actor, sample_id, input).await?;
    Ok(Json(sample))
}
