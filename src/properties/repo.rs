use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::filter::PropertyFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "PascalCase")]
pub enum Furnished {
    Furnished,
    Unfurnished,
    Semi,
}

impl FromStr for Furnished {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Furnished" => Ok(Self::Furnished),
            "Unfurnished" => Ok(Self::Unfurnished),
            "Semi" => Ok(Self::Semi),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "PascalCase")]
pub enum ListedBy {
    Builder,
    Owner,
    Agent,
}

impl FromStr for ListedBy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Builder" => Ok(Self::Builder),
            "Owner" => Ok(Self::Owner),
            "Agent" => Ok(Self::Agent),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ListingType {
    Rent,
    Sale,
}

impl FromStr for ListingType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rent" => Ok(Self::Rent),
            "sale" => Ok(Self::Sale),
            _ => Err(()),
        }
    }
}

/// A listing row. `id` stays inside the database layer; everything public
/// refers to properties by `display_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub id: Uuid,
    pub display_id: String,
    pub title: String,
    pub property_type: String,
    pub price: f64,
    pub state: String,
    pub city: String,
    pub area_sq_ft: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub amenities: String,
    pub furnished: Furnished,
    pub available_from: OffsetDateTime,
    pub listed_by: ListedBy,
    pub tags: String,
    pub color_theme: String,
    pub rating: f64,
    pub is_verified: bool,
    pub listing_type: ListingType,
    pub created_by: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated data for an insert. The display id comes from the database
/// sequence, not from here.
#[derive(Debug, Clone)]
pub struct NewProperty {
    pub title: String,
    pub property_type: String,
    pub price: f64,
    pub state: String,
    pub city: String,
    pub area_sq_ft: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub amenities: String,
    pub furnished: Furnished,
    pub available_from: OffsetDateTime,
    pub listed_by: ListedBy,
    pub tags: String,
    pub color_theme: String,
    pub rating: f64,
    pub is_verified: bool,
    pub listing_type: ListingType,
}

/// Validated partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PropertyChanges {
    pub title: Option<String>,
    pub property_type: Option<String>,
    pub price: Option<f64>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub area_sq_ft: Option<f64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub amenities: Option<String>,
    pub furnished: Option<Furnished>,
    pub available_from: Option<OffsetDateTime>,
    pub listed_by: Option<ListedBy>,
    pub tags: Option<String>,
    pub color_theme: Option<String>,
    pub rating: Option<f64>,
    pub is_verified: Option<bool>,
    pub listing_type: Option<ListingType>,
}

const PROPERTY_COLUMNS: &str = "id, display_id, title, property_type, price, state, city, \
     area_sq_ft, bedrooms, bathrooms, amenities, furnished, available_from, listed_by, tags, \
     color_theme, rating, is_verified, listing_type, created_by, created_at, updated_at";

pub async fn create(db: &PgPool, data: &NewProperty, created_by: Uuid) -> anyhow::Result<Property> {
    let property = sqlx::query_as::<_, Property>(&format!(
        r#"
        INSERT INTO properties (
            title, property_type, price, state, city, area_sq_ft, bedrooms, bathrooms,
            amenities, furnished, available_from, listed_by, tags, color_theme, rating,
            is_verified, listing_type, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING {PROPERTY_COLUMNS}
        "#
    ))
    .bind(&data.title)
    .bind(&data.property_type)
    .bind(data.price)
    .bind(&data.state)
    .bind(&data.city)
    .bind(data.area_sq_ft)
    .bind(data.bedrooms)
    .bind(data.bathrooms)
    .bind(&data.amenities)
    .bind(data.furnished)
    .bind(data.available_from)
    .bind(data.listed_by)
    .bind(&data.tags)
    .bind(&data.color_theme)
    .bind(data.rating)
    .bind(data.is_verified)
    .bind(data.listing_type)
    .bind(created_by)
    .fetch_one(db)
    .await?;
    Ok(property)
}

pub async fn find_by_display_id(db: &PgPool, display_id: &str) -> anyhow::Result<Option<Property>> {
    let property = sqlx::query_as::<_, Property>(&format!(
        "SELECT {PROPERTY_COLUMNS} FROM properties WHERE display_id = $1"
    ))
    .bind(display_id)
    .fetch_optional(db)
    .await?;
    Ok(property)
}

pub async fn find_by_ids(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<Property>> {
    let properties = sqlx::query_as::<_, Property>(&format!(
        "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(db)
    .await?;
    Ok(properties)
}

pub async fn list(
    db: &PgPool,
    filter: &PropertyFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Property>> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {PROPERTY_COLUMNS} FROM properties WHERE 1=1"
    ));
    filter.push_predicates(&mut qb);
    qb.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<Property>().fetch_all(db).await?;
    Ok(rows)
}

pub async fn count(db: &PgPool, filter: &PropertyFilter) -> anyhow::Result<i64> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM properties WHERE 1=1");
    filter.push_predicates(&mut qb);
    let total: i64 = qb.build_query_scalar().fetch_one(db).await?;
    Ok(total)
}

/// Case-insensitive substring search over the text columns, newest first.
pub async fn search(db: &PgPool, query: &str, limit: i64) -> anyhow::Result<Vec<Property>> {
    let pattern = format!("%{}%", like_escape(query));
    let rows = sqlx::query_as::<_, Property>(&format!(
        r#"
        SELECT {PROPERTY_COLUMNS} FROM properties
        WHERE title ILIKE $1
           OR property_type ILIKE $1
           OR state ILIKE $1
           OR city ILIKE $1
           OR amenities ILIKE $1
           OR tags ILIKE $1
        ORDER BY created_at DESC
        LIMIT $2
        "#
    ))
    .bind(pattern)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn update(db: &PgPool, id: Uuid, changes: &PropertyChanges) -> anyhow::Result<Property> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE properties SET updated_at = now()");
    if let Some(v) = &changes.title {
        qb.push(", title = ").push_bind(v);
    }
    if let Some(v) = &changes.property_type {
        qb.push(", property_type = ").push_bind(v);
    }
    if let Some(v) = changes.price {
        qb.push(", price = ").push_bind(v);
    }
    if let Some(v) = &changes.state {
        qb.push(", state = ").push_bind(v);
    }
    if let Some(v) = &changes.city {
        qb.push(", city = ").push_bind(v);
    }
    if let Some(v) = changes.area_sq_ft {
        qb.push(", area_sq_ft = ").push_bind(v);
    }
    if let Some(v) = changes.bedrooms {
        qb.push(", bedrooms = ").push_bind(v);
    }
    if let Some(v) = changes.bathrooms {
        qb.push(", bathrooms = ").push_bind(v);
    }
    if let Some(v) = &changes.amenities {
        qb.push(", amenities = ").push_bind(v);
    }
    if let Some(v) = changes.furnished {
        qb.push(", furnished = ").push_bind(v);
    }
    if let Some(v) = changes.available_from {
        qb.push(", available_from = ").push_bind(v);
    }
    if let Some(v) = changes.listed_by {
        qb.push(", listed_by = ").push_bind(v);
    }
    if let Some(v) = &changes.tags {
        qb.push(", tags = ").push_bind(v);
    }
    if let Some(v) = &changes.color_theme {
        qb.push(", color_theme = ").push_bind(v);
    }
    if let Some(v) = changes.rating {
        qb.push(", rating = ").push_bind(v);
    }
    if let Some(v) = changes.is_verified {
        qb.push(", is_verified = ").push_bind(v);
    }
    if let Some(v) = changes.listing_type {
        qb.push(", listing_type = ").push_bind(v);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(format!(" RETURNING {PROPERTY_COLUMNS}"));
    let property = qb.build_query_as::<Property>().fetch_one(db).await?;
    Ok(property)
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM properties WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

fn like_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_values_match_their_wire_form() {
        assert_eq!("Furnished".parse::<Furnished>(), Ok(Furnished::Furnished));
        assert_eq!("Semi".parse::<Furnished>(), Ok(Furnished::Semi));
        assert!("semi".parse::<Furnished>().is_err());

        assert_eq!("Agent".parse::<ListedBy>(), Ok(ListedBy::Agent));
        assert!("agent".parse::<ListedBy>().is_err());

        assert_eq!("rent".parse::<ListingType>(), Ok(ListingType::Rent));
        assert_eq!("sale".parse::<ListingType>(), Ok(ListingType::Sale));
        assert!("Rent".parse::<ListingType>().is_err());

        assert_eq!(
            serde_json::to_string(&ListingType::Rent).unwrap(),
            "\"rent\""
        );
        assert_eq!(
            serde_json::to_string(&Furnished::Unfurnished).unwrap(),
            "\"Unfurnished\""
        );
    }

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(like_escape("100%_sure"), "100\\%\\_sure");
        assert_eq!(like_escape(r"back\slash"), r"back\\slash");
        assert_eq!(like_escape("plain"), "plain");
    }
}
