use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, SetPasswordRequest, TokenResponse},
        ingredients::{CreateIngredientRequest, IngredientList, UpdateIngredientRequest},
        recipes::{IngredientAmount, RecipeList, RecipeWriteRequest},
        tags::{CreateTagRequest, TagList, UpdateTagRequest},
        users::{RegisterRequest, SubscriptionList, UpdateUserRequest, UserList},
    },
    error::ErrorData,
    models::{Ingredient, Recipe, RecipeIngredient, ShortRecipe, Subscription, Tag, User},
    response::{ApiResponse, Meta},
    routes::{auth, health, ingredients, params, recipes, tags, users},
    validation::FieldErrors,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("`Token <jwt>` is accepted as well"))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::logout,
        users::list_users,
        users::register,
        users::me,
        users::set_password,
        users::list_subscriptions,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::subscribe,
        tags::list_tags,
        tags::get_tag,
        tags::create_tag,
        tags::update_tag,
        tags::delete_tag,
        ingredients::list_ingredients,
        ingredients::get_ingredient,
        ingredients::create_ingredient,
        ingredients::update_ingredient,
        ingredients::delete_ingredient,
        recipes::list_recipes,
        recipes::create_recipe,
        recipes::download_shopping_cart,
        recipes::get_recipe,
        recipes::update_recipe,
        recipes::delete_recipe,
        recipes::favorite,
        recipes::shopping_cart
    ),
    components(
        schemas(
            User,
            Tag,
            Ingredient,
            Recipe,
            RecipeIngredient,
            ShortRecipe,
            Subscription,
            LoginRequest,
            TokenResponse,
            SetPasswordRequest,
            RegisterRequest,
            UpdateUserRequest,
            UserList,
            SubscriptionList,
            CreateTagRequest,
            UpdateTagRequest,
            TagList,
            CreateIngredientRequest,
            UpdateIngredientRequest,
            IngredientList,
            IngredientAmount,
            RecipeWriteRequest,
            RecipeList,
            ErrorData,
            FieldErrors,
            params::Pagination,
            params::SubscriptionQuery,
            params::RecipesLimit,
            Meta,
            ApiResponse<User>,
            ApiResponse<Recipe>,
            ApiResponse<RecipeList>,
            ApiResponse<Subscription>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Token login and logout"),
        (name = "Users", description = "Accounts, profiles and subscriptions"),
        (name = "Tags", description = "Recipe tags"),
        (name = "Ingredients", description = "Ingredient catalogue"),
        (name = "Recipes", description = "Recipes, favorites and the shopping cart"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
