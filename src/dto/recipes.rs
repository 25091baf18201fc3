use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Recipe;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i32,
}

/// Body of both recipe create and update. On update a missing `image`
/// keeps the current one.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecipeWriteRequest {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<i64>,
    /// `data:image/<type>;base64,<payload>`
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct RecipeList {
    #[schema(value_type = Vec<Recipe>)]
    pub items: Vec<Recipe>,
}
