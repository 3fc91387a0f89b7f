use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::properties::repo::{self as properties_repo, Property};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub property_id: Uuid,
    pub created_at: OffsetDateTime,
}

/// The `(user_id, property_id)` uniqueness constraint firing.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

/// Insert a bookmark. Returns the raw sqlx error so the handler can map a
/// unique violation (lost check-then-insert race) to the conflict message.
pub async fn add(db: &PgPool, user_id: Uuid, property_id: Uuid) -> Result<Favorite, sqlx::Error> {
    sqlx::query_as::<_, Favorite>(
        r#"
        INSERT INTO favorites (user_id, property_id)
        VALUES ($1, $2)
        RETURNING id, user_id, property_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(property_id)
    .fetch_one(db)
    .await
}

pub async fn exists(db: &PgPool, user_id: Uuid, property_id: Uuid) -> anyhow::Result<bool> {
    let found: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = $1 AND property_id = $2)",
    )
    .bind(user_id)
    .bind(property_id)
    .fetch_one(db)
    .await?;
    Ok(found)
}

/// Delete a bookmark; `false` when there was none.
pub async fn remove(db: &PgPool, user_id: Uuid, property_id: Uuid) -> anyhow::Result<bool> {
    let deleted: Option<Uuid> = sqlx::query_scalar(
        "DELETE FROM favorites WHERE user_id = $1 AND property_id = $2 RETURNING id",
    )
    .bind(user_id)
    .bind(property_id)
    .fetch_optional(db)
    .await?;
    Ok(deleted.is_some())
}

pub async fn list_for_user(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<(Favorite, Property)>> {
    let favorites = sqlx::query_as::<_, Favorite>(
        r#"
        SELECT id, user_id, property_id, created_at
        FROM favorites
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    let ids: Vec<Uuid> = favorites.iter().map(|f| f.property_id).collect();
    let mut by_id: HashMap<Uuid, Property> = properties_repo::find_by_ids(db, &ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(favorites
        .into_iter()
        .filter_map(|f| by_id.remove(&f.property_id).map(|p| (f, p)))
        .collect())
}

pub async fn count_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(total)
}
