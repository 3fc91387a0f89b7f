use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    cache::COLLECTION_TTL_SECS,
    error::ApiError,
    properties::{dto::PropertyResponse, dto::Pagination, repo as properties_repo},
    state::AppState,
};

use super::dto::{AddFavoriteRequest, FavoriteItem, FavoriteResponse};
use super::repo;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/favorites", post(add_favorite).get(list_favorites))
        .route("/favorites/:propertyId", delete(remove_favorite))
        .route("/favorites/check/:propertyId", get(check_favorite))
}

// Favorites responses are per-user, so their cache keys carry the user id and
// invalidation only ever touches that user's entries.
fn list_key(user_id: Uuid, page: &Pagination) -> String {
    format!(
        "api:/api/favorites/user/{user_id}?page={}&limit={}",
        page.page, page.limit
    )
}

fn check_key(user_id: Uuid, property_id: &str) -> String {
    format!("api:/api/favorites/user/{user_id}/check/{property_id}")
}

fn user_pattern(user_id: Uuid) -> String {
    format!("api:/api/favorites/user/{user_id}*")
}

#[instrument(skip(state, payload))]
pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddFavoriteRequest>,
) -> Result<(StatusCode, Json<FavoriteResponse>), ApiError> {
    let property_id = payload.property_id.trim();
    if property_id.is_empty() {
        return Err(ApiError::bad_request("Property ID is required"));
    }

    let property = properties_repo::find_by_display_id(&state.db, property_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;

    if repo::exists(&state.db, user.user_id, property.id)
        .await
        .map_err(ApiError::internal)?
    {
        return Err(ApiError::conflict("Property is already in favorites"));
    }

    let favorite = match repo::add(&state.db, user.user_id, property.id).await {
        Ok(favorite) => favorite,
        // The pre-check raced a concurrent insert; surface it the same way.
        Err(e) if repo::is_unique_violation(&e) => {
            return Err(ApiError::conflict("Property is already in favorites"));
        }
        Err(e) => return Err(ApiError::internal(e)),
    };

    state.cache.invalidate(&user_pattern(user.user_id)).await;

    info!(user_id = %user.user_id, property = %property.display_id, "favorite added");
    Ok((
        StatusCode::CREATED,
        Json(FavoriteResponse {
            id: favorite.id,
            user: favorite.user_id,
            property: property.display_id,
            created_at: favorite.created_at,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(property_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let property = properties_repo::find_by_display_id(&state.db, &property_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Favorite not found"))?;

    let removed = repo::remove(&state.db, user.user_id, property.id)
        .await
        .map_err(ApiError::internal)?;
    if !removed {
        return Err(ApiError::not_found("Favorite not found"));
    }

    state.cache.invalidate(&user_pattern(user.user_id)).await;

    info!(user_id = %user.user_id, property = %property_id, "favorite removed");
    Ok(Json(json!({ "message": "Property removed from favorites" })))
}

#[instrument(skip(state))]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let page = Pagination::from_query(&params);

    let key = list_key(user.user_id, &page);
    if let Some(hit) = state.cache.get_json(&key).await {
        return Ok(Json(crate::cache::mark_cached(hit)));
    }

    let favorites = repo::list_for_user(&state.db, user.user_id, page.limit, page.offset())
        .await
        .map_err(ApiError::internal)?;
    let total = repo::count_for_user(&state.db, user.user_id)
        .await
        .map_err(ApiError::internal)?;

    let items: Vec<FavoriteItem> = favorites
        .into_iter()
        .map(|(favorite, property)| FavoriteItem {
            id: favorite.id,
            property: PropertyResponse::from(property),
            created_at: favorite.created_at,
        })
        .collect();

    let body = json!({
        "items": items,
        "page": page.page,
        "pages": page.pages(total),
        "total": total,
    });
    state.cache.put_json(&key, &body, COLLECTION_TTL_SECS).await;
    Ok(Json(body))
}

#[instrument(skip(state))]
pub async fn check_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(property_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let key = check_key(user.user_id, &property_id);
    if let Some(hit) = state.cache.get_json(&key).await {
        return Ok(Json(crate::cache::mark_cached(hit)));
    }

    let property = properties_repo::find_by_display_id(&state.db, &property_id)
        .await
        .map_err(ApiError::internal)?;

    let is_favorite = match property {
        Some(property) => repo::exists(&state.db, user.user_id, property.id)
            .await
            .map_err(ApiError::internal)?,
        None => false,
    };

    let body = json!({ "isFavorite": is_favorite });
    state.cache.put_json(&key, &body, COLLECTION_TTL_SECS).await;
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_are_scoped_to_the_user() {
        let user_id = Uuid::new_v4();
        let page = Pagination { page: 2, limit: 10 };

        let key = list_key(user_id, &page);
        assert_eq!(
            key,
            format!("api:/api/favorites/user/{user_id}?page=2&limit=10")
        );

        let check = check_key(user_id, "PROP1001");
        assert_eq!(
            check,
            format!("api:/api/favorites/user/{user_id}/check/PROP1001")
        );

        // The invalidation pattern covers both shapes, for this user only.
        let pattern = user_pattern(user_id);
        assert!(key.starts_with(pattern.trim_end_matches('*')));
        assert!(check.starts_with(pattern.trim_end_matches('*')));
    }
}
