//! Translates the flat listing query parameters into a typed filter and from
//! there into SQL predicates.
//!
//! Every recognized parameter contributes exactly one predicate; anything
//! absent from the request constrains nothing. Malformed numeric values are
//! rejected up front with the offending field named, never coerced.

use std::collections::HashMap;

use sqlx::{Postgres, QueryBuilder};

use crate::error::{ApiError, FieldError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilter {
    pub property_type: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub furnished: Option<String>,
    pub listed_by: Option<String>,
    pub listing_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_bedrooms: Option<i32>,
    pub max_bedrooms: Option<i32>,
    pub min_bathrooms: Option<i32>,
    pub max_bathrooms: Option<i32>,
    pub min_rating: Option<f64>,
    pub is_verified: Option<bool>,
    pub amenities: Vec<String>,
    pub tags: Vec<String>,
}

impl PropertyFilter {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ApiError> {
        let mut errors = Vec::new();

        let filter = Self {
            property_type: text(params, "type"),
            state: text(params, "state"),
            city: text(params, "city"),
            furnished: text(params, "furnished"),
            listed_by: text(params, "listedBy"),
            listing_type: text(params, "listingType"),
            min_price: float(params, "minPrice", &mut errors),
            max_price: float(params, "maxPrice", &mut errors),
            min_bedrooms: int(params, "minBedrooms", &mut errors),
            max_bedrooms: int(params, "maxBedrooms", &mut errors),
            min_bathrooms: int(params, "minBathrooms", &mut errors),
            max_bathrooms: int(params, "maxBathrooms", &mut errors),
            min_rating: float(params, "minRating", &mut errors),
            is_verified: text(params, "isVerified").map(|v| v == "true"),
            amenities: list(params, "amenities"),
            tags: list(params, "tags"),
        };

        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }
        Ok(filter)
    }

    /// Append `AND ...` predicates for every set field. The caller's query
    /// must already contain a `WHERE` clause to extend (e.g. `WHERE 1=1`).
    pub fn push_predicates<'args>(&'args self, qb: &mut QueryBuilder<'args, Postgres>) {
        if let Some(v) = &self.property_type {
            qb.push(" AND property_type = ").push_bind(v);
        }
        if let Some(v) = &self.state {
            qb.push(" AND state = ").push_bind(v);
        }
        if let Some(v) = &self.city {
            qb.push(" AND city = ").push_bind(v);
        }
        if let Some(v) = &self.furnished {
            qb.push(" AND furnished = ").push_bind(v);
        }
        if let Some(v) = &self.listed_by {
            qb.push(" AND listed_by = ").push_bind(v);
        }
        if let Some(v) = &self.listing_type {
            qb.push(" AND listing_type = ").push_bind(v);
        }
        if let Some(v) = self.min_price {
            qb.push(" AND price >= ").push_bind(v);
        }
        if let Some(v) = self.max_price {
            qb.push(" AND price <= ").push_bind(v);
        }
        if let Some(v) = self.min_bedrooms {
            qb.push(" AND bedrooms >= ").push_bind(v);
        }
        if let Some(v) = self.max_bedrooms {
            qb.push(" AND bedrooms <= ").push_bind(v);
        }
        if let Some(v) = self.min_bathrooms {
            qb.push(" AND bathrooms >= ").push_bind(v);
        }
        if let Some(v) = self.max_bathrooms {
            qb.push(" AND bathrooms <= ").push_bind(v);
        }
        if let Some(v) = self.min_rating {
            qb.push(" AND rating >= ").push_bind(v);
        }
        if let Some(v) = self.is_verified {
            qb.push(" AND is_verified = ").push_bind(v);
        }
        // Every listed item must appear as a delimited token in the stored
        // pipe-separated field.
        for item in &self.amenities {
            qb.push(" AND amenities ~* ").push_bind(token_pattern(item));
        }
        for item in &self.tags {
            qb.push(" AND tags ~* ").push_bind(token_pattern(item));
        }
    }
}

/// Regex requiring `item` to appear bounded by pipes or string edges within a
/// pipe-delimited field. User input is escaped, so metacharacters match
/// literally.
fn token_pattern(item: &str) -> String {
    format!(r"(^|\|){}(\||$)", regex::escape(item))
}

fn text(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).filter(|v| !v.is_empty()).cloned()
}

fn list(params: &HashMap<String, String>, key: &str) -> Vec<String> {
    match params.get(key).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .split(',')
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect(),
        None => Vec::new(),
    }
}

fn float(
    params: &HashMap<String, String>,
    key: &str,
    errors: &mut Vec<FieldError>,
) -> Option<f64> {
    let raw = params.get(key).filter(|v| !v.is_empty())?;
    match raw.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(FieldError::new(key, "must be a number"));
            None
        }
    }
}

fn int(params: &HashMap<String, String>, key: &str, errors: &mut Vec<FieldError>) -> Option<i32> {
    let raw = params.get(key).filter(|v| !v.is_empty())?;
    match raw.parse::<i32>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(FieldError::new(key, "must be an integer"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_query_builds_an_empty_filter() {
        let filter = PropertyFilter::from_query(&HashMap::new()).unwrap();
        assert_eq!(filter, PropertyFilter::default());
    }

    #[test]
    fn every_recognized_parameter_is_mapped() {
        let filter = PropertyFilter::from_query(&params(&[
            ("type", "Apartment"),
            ("state", "Karnataka"),
            ("city", "Bangalore"),
            ("furnished", "Semi"),
            ("listedBy", "Owner"),
            ("listingType", "rent"),
            ("minPrice", "1000"),
            ("maxPrice", "2500.5"),
            ("minBedrooms", "2"),
            ("maxBedrooms", "4"),
            ("minBathrooms", "1"),
            ("maxBathrooms", "3"),
            ("minRating", "3.5"),
            ("isVerified", "true"),
            ("amenities", "lift,gym"),
            ("tags", "gated-community"),
        ]))
        .unwrap();

        assert_eq!(filter.property_type.as_deref(), Some("Apartment"));
        assert_eq!(filter.state.as_deref(), Some("Karnataka"));
        assert_eq!(filter.city.as_deref(), Some("Bangalore"));
        assert_eq!(filter.furnished.as_deref(), Some("Semi"));
        assert_eq!(filter.listed_by.as_deref(), Some("Owner"));
        assert_eq!(filter.listing_type.as_deref(), Some("rent"));
        assert_eq!(filter.min_price, Some(1000.0));
        assert_eq!(filter.max_price, Some(2500.5));
        assert_eq!(filter.min_bedrooms, Some(2));
        assert_eq!(filter.max_bedrooms, Some(4));
        assert_eq!(filter.min_bathrooms, Some(1));
        assert_eq!(filter.max_bathrooms, Some(3));
        assert_eq!(filter.min_rating, Some(3.5));
        assert_eq!(filter.is_verified, Some(true));
        assert_eq!(filter.amenities, vec!["lift", "gym"]);
        assert_eq!(filter.tags, vec!["gated-community"]);
    }

    #[test]
    fn is_verified_is_true_only_for_the_literal_string() {
        let filter = PropertyFilter::from_query(&params(&[("isVerified", "yes")])).unwrap();
        assert_eq!(filter.is_verified, Some(false));

        let filter = PropertyFilter::from_query(&HashMap::new()).unwrap();
        assert_eq!(filter.is_verified, None);
    }

    #[test]
    fn malformed_numbers_are_rejected_with_the_field_named() {
        let err = PropertyFilter::from_query(&params(&[
            ("minPrice", "abc"),
            ("maxBedrooms", "many"),
        ]))
        .unwrap_err();

        match err {
            ApiError::Validation(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"minPrice"));
                assert!(fields.contains(&"maxBedrooms"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_values_constrain_nothing() {
        let filter =
            PropertyFilter::from_query(&params(&[("minPrice", ""), ("type", "")])).unwrap();
        assert_eq!(filter, PropertyFilter::default());
    }

    #[test]
    fn token_patterns_bound_items_with_pipes() {
        assert_eq!(token_pattern("gym"), r"(^|\|)gym(\||$)");
        // Metacharacters in user input match literally.
        assert_eq!(token_pattern("a+b"), r"(^|\|)a\+b(\||$)");

        let re = regex::RegexBuilder::new(&token_pattern("gym"))
            .case_insensitive(true)
            .build()
            .unwrap();
        assert!(re.is_match("pool|GYM|lift"));
        assert!(re.is_match("gym"));
        assert!(!re.is_match("mini-gymnasium"));
    }

    #[test]
    fn predicates_cover_only_the_set_fields() {
        let filter = PropertyFilter {
            min_price: Some(100.0),
            max_price: Some(200.0),
            amenities: vec!["gym".into()],
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM properties WHERE 1=1");
        filter.push_predicates(&mut qb);
        let sql = qb.sql();
        assert!(sql.contains("price >= $1"));
        assert!(sql.contains("price <= $2"));
        assert!(sql.contains("amenities ~* $3"));
        assert!(!sql.contains("bedrooms"));
        assert!(!sql.contains("is_verified"));
    }
}
