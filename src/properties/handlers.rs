use std::collections::HashMap;

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::{
    auth::services::AuthUser,
    cache::{self, COLLECTION_TTL_SECS, RESOURCE_TTL_SECS},
    error::ApiError,
    state::AppState,
};

use super::dto::{CreatePropertyRequest, Pagination, PropertyResponse, UpdatePropertyRequest};
use super::filter::PropertyFilter;
use super::repo;

const SEARCH_LIMIT: i64 = 20;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/properties", get(list_properties))
        .route("/properties/search", get(search_properties))
        .route("/properties/:id", get(get_property))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/properties", post(create_property))
        .route(
            "/properties/:id",
            put(update_property).delete(delete_property),
        )
}

#[instrument(skip(state))]
pub async fn list_properties(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let key = cache::request_key(uri.path(), uri.query());
    if let Some(hit) = state.cache.get_json(&key).await {
        return Ok(Json(cache::mark_cached(hit)));
    }

    let filter = PropertyFilter::from_query(&params)?;
    let page = Pagination::from_query(&params);

    let items = repo::list(&state.db, &filter, page.limit, page.offset())
        .await
        .map_err(ApiError::internal)?;
    let total = repo::count(&state.db, &filter)
        .await
        .map_err(ApiError::internal)?;

    let body = json!({
        "items": items.into_iter().map(PropertyResponse::from).collect::<Vec<_>>(),
        "page": page.page,
        "pages": page.pages(total),
        "total": total,
    });
    state.cache.put_json(&key, &body, COLLECTION_TTL_SECS).await;
    Ok(Json(body))
}

#[instrument(skip(state))]
pub async fn search_properties(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let query = params
        .get("query")
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Search query is required"))?;

    let key = cache::request_key(uri.path(), uri.query());
    if let Some(hit) = state.cache.get_json(&key).await {
        return Ok(Json(cache::mark_cached(hit)));
    }

    let items = repo::search(&state.db, query, SEARCH_LIMIT)
        .await
        .map_err(ApiError::internal)?;

    let body = json!({
        "items": items.into_iter().map(PropertyResponse::from).collect::<Vec<_>>(),
    });
    state.cache.put_json(&key, &body, COLLECTION_TTL_SECS).await;
    Ok(Json(body))
}

#[instrument(skip(state))]
pub async fn get_property(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let key = cache::request_key(uri.path(), uri.query());
    if let Some(hit) = state.cache.get_json(&key).await {
        return Ok(Json(cache::mark_cached(hit)));
    }

    let property = repo::find_by_display_id(&state.db, &id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;

    let body =
        serde_json::to_value(PropertyResponse::from(property)).map_err(ApiError::internal)?;
    state.cache.put_json(&key, &body, RESOURCE_TTL_SECS).await;
    Ok(Json(body))
}

#[instrument(skip(state, payload))]
pub async fn create_property(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<PropertyResponse>), ApiError> {
    let data = payload.validate()?;

    let property = repo::create(&state.db, &data, user.user_id)
        .await
        .map_err(ApiError::internal)?;

    state.cache.invalidate("api:/api/properties*").await;

    info!(property = %property.display_id, user_id = %user.user_id, "property created");
    Ok((StatusCode::CREATED, Json(property.into())))
}

#[instrument(skip(state, payload))]
pub async fn update_property(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePropertyRequest>,
) -> Result<Json<PropertyResponse>, ApiError> {
    let property = repo::find_by_display_id(&state.db, &id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;

    if property.created_by != user.user_id {
        return Err(ApiError::forbidden(
            "Not authorized to update this property",
        ));
    }

    let changes = payload.validate()?;
    let updated = repo::update(&state.db, property.id, &changes)
        .await
        .map_err(ApiError::internal)?;

    state
        .cache
        .invalidate(&format!("api:/api/properties/{id}"))
        .await;
    state.cache.invalidate("api:/api/properties*").await;

    info!(property = %id, user_id = %user.user_id, "property updated");
    Ok(Json(updated.into()))
}

#[instrument(skip(state))]
pub async fn delete_property(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let property = repo::find_by_display_id(&state.db, &id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;

    if property.created_by != user.user_id {
        return Err(ApiError::forbidden(
            "Not authorized to delete this property",
        ));
    }

    repo::delete(&state.db, property.id)
        .await
        .map_err(ApiError::internal)?;

    state
        .cache
        .invalidate(&format!("api:/api/properties/{id}"))
        .await;
    state.cache.invalidate("api:/api/properties*").await;

    info!(property = %id, user_id = %user.user_id, "property deleted");
    Ok(Json(json!({ "message": "Property removed" })))
}
