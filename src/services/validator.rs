//! Search payload validation.
//!
//! Turns a decoded JSON body into a typed [`SearchRequest`]. Fields are checked in a
//! fixed order and the first failing rule is reported:
//!
//! 1. `limit` is an integer between 1 and 100
//! 2. `minPrice` is an integer
//! 3. `maxPrice` is an integer
//! 4. `includeCategories` is a list of strings (may be empty)
//! 5. `sort` is a string
//! 6. `region` is one of the supported region codes
//!
//! Missing fields fail their own rule. Unknown fields are ignored.

use serde_json::Value;

use crate::{
    models::search::{Region, SearchRequest},
    services::query_builder::to_minor_units,
};

const MAX_LIMIT: i64 = 100;

/// Reason a search payload was rejected. The message is shown to the caller as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("limit must be Integer between 1-100")]
    Limit,

    #[error("minPrice must be Integer")]
    MinPrice,

    #[error("maxPrice must be Integer")]
    MaxPrice,

    #[error("includeCategories must be List of Strings")]
    IncludeCategories,

    #[error("sort must be String")]
    Sort,

    #[error("region must be String. Valid regions are {}.", valid_regions())]
    Region,
}

fn valid_regions() -> String {
    Region::ALL
        .iter()
        .map(Region::code)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a search payload.
///
/// Pure and deterministic: the same payload always yields the same result.
pub fn validate(payload: &Value) -> Result<SearchRequest, ValidationError> {
    let limit = payload
        .get("limit")
        .and_then(Value::as_i64)
        .filter(|limit| (1..=MAX_LIMIT).contains(limit))
        .ok_or(ValidationError::Limit)?;

    let min_price = integer(payload, "minPrice").ok_or(ValidationError::MinPrice)?;
    let max_price = integer(payload, "maxPrice").ok_or(ValidationError::MaxPrice)?;

    let include_categories = payload
        .get("includeCategories")
        .and_then(Value::as_array)
        .and_then(|categories| {
            categories
                .iter()
                .map(|category| category.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or(ValidationError::IncludeCategories)?;

    let sort = payload
        .get("sort")
        .and_then(Value::as_str)
        .ok_or(ValidationError::Sort)?
        .to_string();

    let region = payload
        .get("region")
        .and_then(Value::as_str)
        .and_then(|code| code.parse::<Region>().ok())
        .ok_or(ValidationError::Region)?;

    Ok(SearchRequest {
        // Range checked above
        limit: limit as u8,
        min_price,
        max_price,
        include_categories,
        sort,
        region,
    })
}

/// JSON integers only; floats such as `10.0` and booleans are rejected, and so are
/// prices whose minor-unit value would not fit in an `i64`.
fn integer(payload: &Value, field: &str) -> Option<i64> {
    payload
        .get(field)
        .and_then(Value::as_i64)
        .filter(|price| to_minor_units(*price).is_some())
}
