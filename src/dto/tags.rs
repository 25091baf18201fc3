use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Tag;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTagRequest {
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TagList {
    #[schema(value_type = Vec<Tag>)]
    pub items: Vec<Tag>,
}
