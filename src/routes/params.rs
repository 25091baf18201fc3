use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Clone, PartialEq, Deserialize, ToSchema, IntoParams)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Returns `(page, limit, offset)`.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(limit);
        (page, limit, offset)
    }
}

#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
pub struct SubscriptionQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Maximum number of recipes shown per author.
    pub recipes_limit: Option<u64>,
}

impl SubscriptionQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Only `recipes_limit`; used by the subscribe toggle.
#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
pub struct RecipesLimit {
    pub recipes_limit: Option<u64>,
}

/// Tri-state boolean query flag: `1`/`true`, `0`/`false`, or ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipFilter {
    Only,
    Exclude,
}

impl MembershipFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1" | "true" => Some(Self::Only),
            "0" | "false" => Some(Self::Exclude),
            _ => None,
        }
    }
}

/// Recipe list filters. Built from raw pairs because `tags` repeats.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecipeQuery {
    pub pagination: Pagination,
    pub tags: Vec<String>,
    pub author: Option<i64>,
    pub is_favorited: Option<MembershipFilter>,
    pub is_in_shopping_cart: Option<MembershipFilter>,
}

impl RecipeQuery {
    /// Unparseable numbers are ignored rather than rejected.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => query.pagination.page = value.parse().ok(),
                "limit" => query.pagination.limit = value.parse().ok(),
                "tags" if !value.is_empty() => query.tags.push(value.clone()),
                "author" => query.author = value.parse().ok(),
                "is_favorited" => query.is_favorited = MembershipFilter::parse(value),
                "is_in_shopping_cart" => {
                    query.is_in_shopping_cart = MembershipFilter::parse(value)
                }
                _ => {}
            }
        }
        query
    }
}
