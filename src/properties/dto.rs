use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Furnished, ListedBy, ListingType, NewProperty, Property, PropertyChanges};
use crate::error::{ApiError, FieldError};

/// A listing as clients see it: `id` is the display id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResponse {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub property_type: String,
    pub price: f64,
    pub state: String,
    pub city: String,
    pub area_sq_ft: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub amenities: String,
    pub furnished: Furnished,
    #[serde(with = "time::serde::rfc3339")]
    pub available_from: OffsetDateTime,
    pub listed_by: ListedBy,
    pub tags: String,
    pub color_theme: String,
    pub rating: f64,
    pub is_verified: bool,
    pub listing_type: ListingType,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Property> for PropertyResponse {
    fn from(p: Property) -> Self {
        Self {
            id: p.display_id,
            title: p.title,
            property_type: p.property_type,
            price: p.price,
            state: p.state,
            city: p.city,
            area_sq_ft: p.area_sq_ft,
            bedrooms: p.bedrooms,
            bathrooms: p.bathrooms,
            amenities: p.amenities,
            furnished: p.furnished,
            available_from: p.available_from,
            listed_by: p.listed_by,
            tags: p.tags,
            color_theme: p.color_theme,
            rating: p.rating,
            is_verified: p.is_verified,
            listing_type: p.listing_type,
            created_by: p.created_by,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Creation payload. Fields are optional so missing ones collect into the
/// `errors` array instead of failing deserialization one at a time.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub price: Option<f64>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub area_sq_ft: Option<f64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub amenities: Option<String>,
    pub furnished: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub available_from: Option<OffsetDateTime>,
    pub listed_by: Option<String>,
    pub tags: Option<String>,
    pub color_theme: Option<String>,
    pub rating: Option<f64>,
    pub is_verified: Option<bool>,
    pub listing_type: Option<String>,
}

impl CreatePropertyRequest {
    pub fn validate(self) -> Result<NewProperty, ApiError> {
        let mut errors = Vec::new();

        let title = self.title.unwrap_or_default();
        if title.trim().is_empty() {
            errors.push(FieldError::new("title", "Title is required"));
        }
        let property_type = self.property_type.unwrap_or_default();
        if property_type.trim().is_empty() {
            errors.push(FieldError::new("type", "Property type is required"));
        }
        if self.price.is_none() {
            errors.push(FieldError::new("price", "Price must be a number"));
        }
        let state = self.state.unwrap_or_default();
        if state.trim().is_empty() {
            errors.push(FieldError::new("state", "State is required"));
        }
        let city = self.city.unwrap_or_default();
        if city.trim().is_empty() {
            errors.push(FieldError::new("city", "City is required"));
        }
        if self.area_sq_ft.is_none() {
            errors.push(FieldError::new("areaSqFt", "Area must be a number"));
        }
        if self.bedrooms.is_none() {
            errors.push(FieldError::new("bedrooms", "Bedrooms must be an integer"));
        }
        if self.bathrooms.is_none() {
            errors.push(FieldError::new("bathrooms", "Bathrooms must be a number"));
        }
        let furnished = match self.furnished.as_deref().map(str::parse::<Furnished>) {
            Some(Ok(v)) => Some(v),
            _ => {
                errors.push(FieldError::new("furnished", "Invalid furnished status"));
                None
            }
        };
        if self.available_from.is_none() {
            errors.push(FieldError::new(
                "availableFrom",
                "Available date must be valid date",
            ));
        }
        let listed_by = match self.listed_by.as_deref().map(str::parse::<ListedBy>) {
            Some(Ok(v)) => Some(v),
            _ => {
                errors.push(FieldError::new("listedBy", "Invalid listed by value"));
                None
            }
        };
        let listing_type = match self.listing_type.as_deref().map(str::parse::<ListingType>) {
            Some(Ok(v)) => Some(v),
            _ => {
                errors.push(FieldError::new("listingType", "Invalid listing type"));
                None
            }
        };
        let rating = self.rating.unwrap_or(3.0);
        if !(1.0..=5.0).contains(&rating) {
            errors.push(FieldError::new("rating", "Rating must be between 1 and 5"));
        }

        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }

        Ok(NewProperty {
            title,
            property_type,
            price: self.price.unwrap_or_default(),
            state,
            city,
            area_sq_ft: self.area_sq_ft.unwrap_or_default(),
            bedrooms: self.bedrooms.unwrap_or_default(),
            bathrooms: self.bathrooms.unwrap_or_default(),
            amenities: self.amenities.unwrap_or_default(),
            furnished: furnished.unwrap_or(Furnished::Unfurnished),
            available_from: self.available_from.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            listed_by: listed_by.unwrap_or(ListedBy::Owner),
            tags: self.tags.unwrap_or_default(),
            color_theme: self.color_theme.unwrap_or_else(|| "#6ab45e".to_string()),
            rating,
            is_verified: self.is_verified.unwrap_or(false),
            listing_type: listing_type.unwrap_or(ListingType::Rent),
        })
    }
}

/// Partial-update payload; only the provided fields are validated and written.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePropertyRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub price: Option<f64>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub area_sq_ft: Option<f64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub amenities: Option<String>,
    pub furnished: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub available_from: Option<OffsetDateTime>,
    pub listed_by: Option<String>,
    pub tags: Option<String>,
    pub color_theme: Option<String>,
    pub rating: Option<f64>,
    pub is_verified: Option<bool>,
    pub listing_type: Option<String>,
}

impl UpdatePropertyRequest {
    pub fn validate(self) -> Result<PropertyChanges, ApiError> {
        let mut errors = Vec::new();

        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                errors.push(FieldError::new("title", "Title cannot be empty"));
            }
        }
        let furnished = match self.furnished.as_deref().map(str::parse::<Furnished>) {
            Some(Ok(v)) => Some(v),
            Some(Err(())) => {
                errors.push(FieldError::new("furnished", "Invalid furnished status"));
                None
            }
            None => None,
        };
        let listed_by = match self.listed_by.as_deref().map(str::parse::<ListedBy>) {
            Some(Ok(v)) => Some(v),
            Some(Err(())) => {
                errors.push(FieldError::new("listedBy", "Invalid listed by value"));
                None
            }
            None => None,
        };
        let listing_type = match self.listing_type.as_deref().map(str::parse::<ListingType>) {
            Some(Ok(v)) => Some(v),
            Some(Err(())) => {
                errors.push(FieldError::new("listingType", "Invalid listing type"));
                None
            }
            None => None,
        };
        if let Some(rating) = self.rating {
            if !(1.0..=5.0).contains(&rating) {
                errors.push(FieldError::new("rating", "Rating must be between 1 and 5"));
            }
        }

        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }

        Ok(PropertyChanges {
            title: self.title,
            property_type: self.property_type,
            price: self.price,
            state: self.state,
            city: self.city,
            area_sq_ft: self.area_sq_ft,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            amenities: self.amenities,
            furnished,
            available_from: self.available_from,
            listed_by,
            tags: self.tags,
            color_theme: self.color_theme,
            rating: self.rating,
            is_verified: self.is_verified,
            listing_type,
        })
    }
}

/// Page selection for list endpoints. Out-of-range or unparseable values fall
/// back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let page = params
            .get("page")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = params
            .get("limit")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(10);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn pages(&self, total: i64) -> i64 {
        if total == 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn full_request() -> CreatePropertyRequest {
        CreatePropertyRequest {
            title: Some("Sunlit 2BHK".into()),
            property_type: Some("Apartment".into()),
            price: Some(25000.0),
            state: Some("Karnataka".into()),
            city: Some("Bangalore".into()),
            area_sq_ft: Some(1150.0),
            bedrooms: Some(2),
            bathrooms: Some(2),
            amenities: Some("lift|gym|pool".into()),
            furnished: Some("Semi".into()),
            available_from: Some(datetime!(2025-09-01 00:00 UTC)),
            listed_by: Some("Owner".into()),
            tags: Some("gated-community".into()),
            color_theme: None,
            rating: None,
            is_verified: None,
            listing_type: Some("rent".into()),
        }
    }

    #[test]
    fn valid_payload_fills_defaults() {
        let data = full_request().validate().unwrap();
        assert_eq!(data.rating, 3.0);
        assert!(!data.is_verified);
        assert_eq!(data.color_theme, "#6ab45e");
        assert_eq!(data.furnished, Furnished::Semi);
        assert_eq!(data.listing_type, ListingType::Rent);
    }

    #[test]
    fn missing_fields_are_collected_not_short_circuited() {
        let mut request = full_request();
        request.title = None;
        request.price = None;
        request.furnished = Some("Partly".into());
        let err = request.validate().unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["title", "price", "furnished"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rating_out_of_range_is_rejected() {
        let mut request = full_request();
        request.rating = Some(5.5);
        assert!(request.validate().is_err());
    }

    #[test]
    fn update_accepts_any_subset() {
        let request = UpdatePropertyRequest {
            title: None,
            property_type: None,
            price: Some(30000.0),
            state: None,
            city: None,
            area_sq_ft: None,
            bedrooms: None,
            bathrooms: None,
            amenities: None,
            furnished: None,
            available_from: None,
            listed_by: None,
            tags: None,
            color_theme: None,
            rating: None,
            is_verified: None,
            listing_type: None,
        };
        let changes = request.validate().unwrap();
        assert_eq!(changes.price, Some(30000.0));
        assert!(changes.title.is_none());
    }

    #[test]
    fn update_rejects_blank_title() {
        let request = UpdatePropertyRequest {
            title: Some("  ".into()),
            property_type: None,
            price: None,
            state: None,
            city: None,
            area_sq_ft: None,
            bedrooms: None,
            bathrooms: None,
            amenities: None,
            furnished: None,
            available_from: None,
            listed_by: None,
            tags: None,
            color_theme: None,
            rating: None,
            is_verified: None,
            listing_type: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        let mut params = HashMap::new();
        assert_eq!(
            Pagination::from_query(&params),
            Pagination { page: 1, limit: 10 }
        );

        params.insert("page".to_string(), "abc".to_string());
        params.insert("limit".to_string(), "0".to_string());
        assert_eq!(
            Pagination::from_query(&params),
            Pagination { page: 1, limit: 10 }
        );

        params.insert("page".to_string(), "3".to_string());
        params.insert("limit".to_string(), "25".to_string());
        let p = Pagination::from_query(&params);
        assert_eq!(p.offset(), 50);
        assert_eq!(p.pages(51), 3);
        assert_eq!(p.pages(50), 2);
        assert_eq!(p.pages(0), 0);
    }

    #[test]
    fn responses_use_the_original_wire_names() {
        let response = PropertyResponse {
            id: "PROP1001".into(),
            title: "t".into(),
            property_type: "Apartment".into(),
            price: 1.0,
            state: "s".into(),
            city: "c".into(),
            area_sq_ft: 2.0,
            bedrooms: 1,
            bathrooms: 1,
            amenities: String::new(),
            furnished: Furnished::Furnished,
            available_from: datetime!(2025-09-01 00:00 UTC),
            listed_by: ListedBy::Agent,
            tags: String::new(),
            color_theme: "#6ab45e".into(),
            rating: 3.0,
            is_verified: false,
            listing_type: ListingType::Sale,
            created_by: Uuid::new_v4(),
            created_at: datetime!(2025-09-01 00:00 UTC),
            updated_at: datetime!(2025-09-01 00:00 UTC),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"id\":\"PROP1001\""));
        assert!(json.contains("\"type\":\"Apartment\""));
        assert!(json.contains("\"areaSqFt\":2.0"));
        assert!(json.contains("\"listedBy\":\"Agent\""));
        assert!(json.contains("\"isVerified\":false"));
        assert!(json.contains("\"listingType\":\"sale\""));
    }
}
