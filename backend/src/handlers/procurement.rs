//! HTTP handlers for procurement projects

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
    services::procurement::{
        CreateProjectInput, LinkVendorInput, ProcurementService, ProjectOverview,
    },
    AppState,
};
use shared::{ProcurementProject, ProjectStatus, ProjectVendor};

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub status: Option<ProjectStatus>,
}

pub async fn create_project(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<CreateProjectInput>,
) -> AppResult<impl IntoResponse> {
    let service = ProcurementService::new(state.db);
    let project = service.create_project(actor, input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> AppResult<Json<Vec<ProcurementProject>>> {
    let service = ProcurementService::new(state.db);
    let projects = service.list_projects(query.status).await?;
    Ok(Json(projects))
}

/// Project with vendors, purchase orders and demand/supply
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<ProjectOverview>> {
    let service = ProcurementService::new(state.db);
    let overview = service.get_project(project_id).await?;
    Ok(Json(overview))
}

pub async fn link_project_vendor(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(project_id): Path<Uuid>,
    Json(input): Json<LinkVendorInput>,
) -> AppResult<Json<Vec<ProjectVendor>>> {
    let service = ProcurementService::new(state.db);
    let vendors = service.link_vendor(actor, project_id, input).await?;
    Ok(Json(vendors))
}

/// Re-evaluate auto-completion
pub async fn recompute_project(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<ProcurementProject>> {
    let service = ProcurementService::new(state.db);
    let project = service.recompute(actor, project_id).await?;
    Ok(Json(project))
}
