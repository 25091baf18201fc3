pub mod audit_logs;
pub mod favorites;
pub mod ingredients;
pub mod recipe_ingredients;
pub mod recipe_tags;
pub mod recipes;
pub mod revoked_tokens;
pub mod shopping_cart;
pub mod subscriptions;
pub mod tags;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use favorites::Entity as Favorites;
pub use ingredients::Entity as Ingredients;
pub use recipe_ingredients::Entity as RecipeIngredients;
pub use recipe_tags::Entity as RecipeTags;
pub use recipes::Entity as Recipes;
pub use revoked_tokens::Entity as RevokedTokens;
pub use shopping_cart::Entity as ShoppingCart;
pub use subscriptions::Entity as Subscriptions;
pub use tags::Entity as Tags;
pub use users::Entity as Users;
