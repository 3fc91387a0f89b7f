use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::properties::repo::{self as properties_repo, Property};

use super::dto::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recommendation {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub property_id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub created_at: OffsetDateTime,
}

pub async fn create(
    db: &PgPool,
    sender_id: Uuid,
    recipient_id: Uuid,
    property_id: Uuid,
    message: &str,
) -> anyhow::Result<Recommendation> {
    let recommendation = sqlx::query_as::<_, Recommendation>(
        r#"
        INSERT INTO recommendations (sender_id, recipient_id, property_id, message)
        VALUES ($1, $2, $3, $4)
        RETURNING id, sender_id, recipient_id, property_id, message, is_read, created_at
        "#,
    )
    .bind(sender_id)
    .bind(recipient_id)
    .bind(property_id)
    .bind(message)
    .fetch_one(db)
    .await?;
    Ok(recommendation)
}

pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Recommendation>> {
    let recommendation = sqlx::query_as::<_, Recommendation>(
        r#"
        SELECT id, sender_id, recipient_id, property_id, message, is_read, created_at
        FROM recommendations
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(recommendation)
}

pub async fn mark_read(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("UPDATE recommendations SET is_read = TRUE WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recommendations WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn list_received(
    db: &PgPool,
    recipient_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<(Recommendation, UserSummary, Property)>> {
    let recommendations = sqlx::query_as::<_, Recommendation>(
        r#"
        SELECT id, sender_id, recipient_id, property_id, message, is_read, created_at
        FROM recommendations
        WHERE recipient_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(recipient_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    attach(db, recommendations, |r| r.sender_id).await
}

pub async fn list_sent(
    db: &PgPool,
    sender_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<(Recommendation, UserSummary, Property)>> {
    let recommendations = sqlx::query_as::<_, Recommendation>(
        r#"
        SELECT id, sender_id, recipient_id, property_id, message, is_read, created_at
        FROM recommendations
        WHERE sender_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(sender_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    attach(db, recommendations, |r| r.recipient_id).await
}

pub async fn count_received(db: &PgPool, recipient_id: Uuid) -> anyhow::Result<i64> {
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM recommendations WHERE recipient_id = $1")
            .bind(recipient_id)
            .fetch_one(db)
            .await?;
    Ok(total)
}

pub async fn count_sent(db: &PgPool, sender_id: Uuid) -> anyhow::Result<i64> {
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM recommendations WHERE sender_id = $1")
            .bind(sender_id)
            .fetch_one(db)
            .await?;
    Ok(total)
}

/// Batch-load the counterpart user and the property for one page of
/// recommendations.
async fn attach(
    db: &PgPool,
    recommendations: Vec<Recommendation>,
    counterpart: fn(&Recommendation) -> Uuid,
) -> anyhow::Result<Vec<(Recommendation, UserSummary, Property)>> {
    let user_ids: Vec<Uuid> = recommendations.iter().map(counterpart).collect();
    let users: HashMap<Uuid, UserSummary> = sqlx::query_as::<_, UserSummary>(
        "SELECT id, first_name, last_name, email FROM users WHERE id = ANY($1)",
    )
    .bind(&user_ids)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(|u| (u.id, u))
    .collect();

    let property_ids: Vec<Uuid> = recommendations.iter().map(|r| r.property_id).collect();
    let mut properties: HashMap<Uuid, Property> = properties_repo::find_by_ids(db, &property_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(recommendations
        .into_iter()
        .filter_map(|r| {
            let user = users.get(&counterpart(&r)).cloned()?;
            let property = properties.remove(&r.property_id)?;
            Some((r, user, property))
        })
        .collect())
}
