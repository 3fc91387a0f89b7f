use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::repo::User,
    auth::services::AuthUser,
    error::ApiError,
    properties::{dto::Pagination, dto::PropertyResponse, repo as properties_repo},
    state::AppState,
};

use super::dto::{
    CreateRecommendationRequest, ReceivedRecommendation, RecommendationResponse,
    SentRecommendation,
};
use super::repo;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations", post(create_recommendation))
        .route("/recommendations/received", get(received_recommendations))
        .route("/recommendations/sent", get(sent_recommendations))
        .route("/recommendations/:id/read", put(mark_recommendation_read))
        .route("/recommendations/:id", delete(delete_recommendation))
}

#[instrument(skip(state, payload))]
pub async fn create_recommendation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateRecommendationRequest>,
) -> Result<(StatusCode, Json<RecommendationResponse>), ApiError> {
    let recipient_email = payload.recipient_email.trim().to_lowercase();
    let property_id = payload.property_id.trim();
    if recipient_email.is_empty() || property_id.is_empty() {
        return Err(ApiError::bad_request(
            "Recipient email and property ID are required",
        ));
    }

    let property = properties_repo::find_by_display_id(&state.db, property_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;

    let recipient = User::find_by_email(&state.db, &recipient_email)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Recipient user not found"))?;

    if recipient.id == user.user_id {
        warn!(user_id = %user.user_id, "self-recommendation rejected");
        return Err(ApiError::bad_request(
            "Cannot recommend a property to yourself",
        ));
    }

    let message = payload.message.unwrap_or_default();
    let recommendation = repo::create(
        &state.db,
        user.user_id,
        recipient.id,
        property.id,
        &message,
    )
    .await
    .map_err(ApiError::internal)?;

    info!(
        sender = %user.user_id,
        recipient = %recipient.id,
        property = %property.display_id,
        "recommendation created"
    );
    Ok((
        StatusCode::CREATED,
        Json(RecommendationResponse {
            id: recommendation.id,
            sender: recommendation.sender_id,
            recipient: recommendation.recipient_id,
            property: property.display_id,
            message: recommendation.message,
            is_read: recommendation.is_read,
            created_at: recommendation.created_at,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn received_recommendations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let page = Pagination::from_query(&params);

    let rows = repo::list_received(&state.db, user.user_id, page.limit, page.offset())
        .await
        .map_err(ApiError::internal)?;
    let total = repo::count_received(&state.db, user.user_id)
        .await
        .map_err(ApiError::internal)?;

    let items: Vec<ReceivedRecommendation> = rows
        .into_iter()
        .map(|(r, sender, property)| ReceivedRecommendation {
            id: r.id,
            sender,
            property: PropertyResponse::from(property),
            message: r.message,
            is_read: r.is_read,
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(json!({
        "items": items,
        "page": page.page,
        "pages": page.pages(total),
        "total": total,
    })))
}

#[instrument(skip(state))]
pub async fn sent_recommendations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let page = Pagination::from_query(&params);

    let rows = repo::list_sent(&state.db, user.user_id, page.limit, page.offset())
        .await
        .map_err(ApiError::internal)?;
    let total = repo::count_sent(&state.db, user.user_id)
        .await
        .map_err(ApiError::internal)?;

    let items: Vec<SentRecommendation> = rows
        .into_iter()
        .map(|(r, recipient, property)| SentRecommendation {
            id: r.id,
            recipient,
            property: PropertyResponse::from(property),
            message: r.message,
            is_read: r.is_read,
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(json!({
        "items": items,
        "page": page.page,
        "pages": page.pages(total),
        "total": total,
    })))
}

#[instrument(skip(state))]
pub async fn mark_recommendation_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let recommendation = repo::find(&state.db, id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Recommendation not found"))?;

    // Only the recipient may flip the read flag.
    if recommendation.recipient_id != user.user_id {
        return Err(ApiError::forbidden(
            "Not authorized to update this recommendation",
        ));
    }

    repo::mark_read(&state.db, recommendation.id)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(json!({ "message": "Recommendation marked as read" })))
}

#[instrument(skip(state))]
pub async fn delete_recommendation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let recommendation = repo::find(&state.db, id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Recommendation not found"))?;

    // Either end of the edge may remove it.
    if recommendation.sender_id != user.user_id && recommendation.recipient_id != user.user_id {
        return Err(ApiError::forbidden(
            "Not authorized to delete this recommendation",
        ));
    }

    repo::delete(&state.db, recommendation.id)
        .await
        .map_err(ApiError::internal)?;

    info!(recommendation = %id, user_id = %user.user_id, "recommendation deleted");
    Ok(Json(json!({ "message": "Recommendation removed" })))
}
