use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::Ingredient;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UpdateIngredientRequest {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

#[derive(Debug, Deserialize, Default, IntoParams)]
pub struct IngredientQuery {
    /// Case-insensitive prefix or substring of the ingredient name.
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct IngredientList {
    #[schema(value_type = Vec<Ingredient>)]
    pub items: Vec<Ingredient>,
}
