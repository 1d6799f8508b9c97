//! Translation of a validated search into the upstream GraphQL request.
//!
//! The upstream schema is an external contract: everything except the caller's
//! filters, limit, sort and marketplace is fixed.

use serde::Serialize;

use crate::{models::search::SearchRequest, services::validator::ValidationError};

/// Upstream prices are expressed in minor units (cents).
const MINOR_UNITS_PER_UNIT: i64 = 100;

const OPERATION_NAME: &str = "Search";

/// Modifiers the upstream applies to results unless told otherwise.
const DISABLED_MODIFIERS: [&str; 1] = ["DELPHI"];

const SEARCH_QUERY: &str = r#"query Search($siteID: Long!, $query: String!, $offset: Int!, $limit: Int!, $sort: SortType!, $reverse: Boolean!, $filters: SearchFiltersInput, $includeCategoryHits: Boolean!, $includeManufacturerHits: Boolean!, $includeSearchFilterGroups: Boolean!, $includeItemStateHits: Boolean!) {
  search(siteId: $siteID, query: $query, offset: $offset, limit: $limit, sort: $sort, reverse: $reverse, filters: $filters) {
    count
    categoryHits @include(if: $includeCategoryHits) {
      categoryId
      categoryName
      categoryType
      amount
    }
    manufacturerHits @include(if: $includeManufacturerHits) {
      manufacturerId
      searchFilterId
      manufacturerName
      amount
    }
    searchFilterGroups @include(if: $includeSearchFilterGroups) {
      name
      attributeId
      combinationStrategy
      orderPos
      filters {
        amount
        orderPos
        filterId
        content
        categoryId
        ownClicks
        productClicks
      }
    }
    itemStateHits @include(if: $includeItemStateHits) {
      itemState
      amount
    }
    items {
      ...searchItemFields
    }
    queryUsed {
      query
      filters {
        minPrice
        maxPrice
        availableOnly
        bargainsOnly
        excludeUsed
        includeCategories
        includeSearchFilters
        includeManufacturers
        promotedShops
        disableModifiers
      }
    }
  }
}
fragment searchItemFields on Item {
  ...itemFields
  url
}
fragment itemFields on Item {
  itemId
  name
  images {
    images350x350
  }
}"#;

/// Request body sent to the upstream search API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    pub operation_name: &'static str,
    pub query: &'static str,
    pub variables: SearchVariables,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchVariables {
    pub filters: SearchFilters,
    pub include_category_hits: bool,
    pub include_item_state_hits: bool,
    pub include_manufacturer_hits: bool,
    pub include_search_filter_groups: bool,
    pub limit: u8,
    pub offset: u32,
    pub query: String,
    pub reverse: bool,
    #[serde(rename = "siteID")]
    pub site_id: u32,
    pub sort: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub bargains_only: bool,
    pub disable_modifiers: Vec<&'static str>,
    pub include_categories: Vec<String>,
    pub max_price: i64,
    pub min_price: i64,
    pub promoted_shops: Vec<String>,
}

/// Build the upstream request for a validated search. Performs no I/O.
///
/// Fails only if a price has no minor-unit representation, which [`validate`]
/// already rules out.
///
/// [`validate`]: crate::services::validator::validate
pub fn build(request: &SearchRequest) -> Result<WireRequest, ValidationError> {
    let min_price = to_minor_units(request.min_price).ok_or(ValidationError::MinPrice)?;
    let max_price = to_minor_units(request.max_price).ok_or(ValidationError::MaxPrice)?;

    Ok(WireRequest {
        operation_name: OPERATION_NAME,
        query: SEARCH_QUERY,
        variables: SearchVariables {
            filters: SearchFilters {
                bargains_only: true,
                disable_modifiers: DISABLED_MODIFIERS.to_vec(),
                include_categories: request.include_categories.clone(),
                max_price,
                min_price,
                promoted_shops: Vec::new(),
            },
            include_category_hits: false,
            include_item_state_hits: false,
            include_manufacturer_hits: false,
            include_search_filter_groups: false,
            limit: request.limit,
            offset: 0,
            query: String::new(),
            reverse: false,
            site_id: request.region.site_id(),
            sort: request.sort.clone(),
        },
    })
}

/// Price in minor units, or `None` if it does not fit in an `i64`.
pub fn to_minor_units(price: i64) -> Option<i64> {
    price.checked_mul(MINOR_UNITS_PER_UNIT)
}
