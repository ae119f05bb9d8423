//! Adopted tree routes. Owner routes answer 404 for trees of other users.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::db::trees::{NewGalleryImage, NewTimelineEvent, TreeMetrics};
use crate::error::Result;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::tree::{ForestStats, GalleryImage, TimelineEvent, TreeDetail, TreeSummary};
use crate::services::ecosystem::{EcosystemService, NicknameUpdate};
use crate::state::AppState;

/// GET /api/ecosystems/trees
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<TreeSummary>>> {
    Ok(Json(EcosystemService::new(state.pool()).list(user.id).await?))
}

/// GET /api/ecosystems/trees/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ForestStats>> {
    Ok(Json(EcosystemService::new(state.pool()).stats(user.id).await?))
}

/// GET /api/ecosystems/trees/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<TreeDetail>> {
    Ok(Json(
        EcosystemService::new(state.pool())
            .detail(id, user.id)
            .await?,
    ))
}

/// Rename a tree.
///
/// PATCH /api/ecosystems/trees/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<NicknameUpdate>,
) -> Result<Json<TreeDetail>> {
    Ok(Json(
        EcosystemService::new(state.pool())
            .update_nickname(id, user.id, &body.nickname)
            .await?,
    ))
}

/// GET /api/ecosystems/trees/{id}/timeline
pub async fn timeline(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimelineEvent>>> {
    Ok(Json(
        EcosystemService::new(state.pool())
            .timeline(id, user.id)
            .await?,
    ))
}

/// GET /api/ecosystems/trees/{id}/gallery
pub async fn gallery(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GalleryImage>>> {
    Ok(Json(
        EcosystemService::new(state.pool())
            .gallery(id, user.id)
            .await?,
    ))
}

/// POST /api/ecosystems/trees/{id}/events (staff)
pub async fn add_event(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
    Json(body): Json<NewTimelineEvent>,
) -> Result<(StatusCode, Json<TimelineEvent>)> {
    let event = EcosystemService::new(state.pool())
        .add_event(id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// POST /api/ecosystems/trees/{id}/images (staff)
pub async fn add_image(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
    Json(body): Json<NewGalleryImage>,
) -> Result<(StatusCode, Json<GalleryImage>)> {
    let image = EcosystemService::new(state.pool())
        .add_image(id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(image)))
}

/// PATCH /api/ecosystems/trees/{id}/metrics (staff)
pub async fn update_metrics(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
    Json(body): Json<TreeMetrics>,
) -> Result<Json<TreeDetail>> {
    Ok(Json(
        EcosystemService::new(state.pool())
            .update_metrics(id, &body)
            .await?,
    ))
}
