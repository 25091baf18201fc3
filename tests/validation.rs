use std::collections::HashSet;

use axum::http::StatusCode;
use foodgram_api::{
    dto::recipes::{IngredientAmount, RecipeWriteRequest},
    error::AppError,
    validation::{
        FieldErrors, normalize_hex_color, validate_email, validate_recipe, validate_slug,
        validate_username,
    },
};

fn payload() -> RecipeWriteRequest {
    RecipeWriteRequest {
        ingredients: vec![
            IngredientAmount { id: 1, amount: 100 },
            IngredientAmount { id: 2, amount: 3 },
        ],
        tags: vec![10],
        image: Some("data:image/png;base64,iVBORw0KGgo=".into()),
        name: "Tomato soup".into(),
        text: "Boil, blend, serve.".into(),
        cooking_time: 25,
    }
}

fn known() -> (HashSet<i64>, HashSet<i64>) {
    (HashSet::from([1, 2, 3]), HashSet::from([10, 11]))
}

fn field_errors(result: Result<(), AppError>) -> FieldErrors {
    match result {
        Err(AppError::Validation(fields)) => fields,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn hex_color_accepts_both_lengths_and_normalises_case() {
    assert_eq!(normalize_hex_color("#ABC123").unwrap(), "#ABC123");
    assert_eq!(normalize_hex_color("#abc123").unwrap(), "#ABC123");
    assert_eq!(normalize_hex_color(" #fa0 ").unwrap(), "#FA0");
    assert_eq!(normalize_hex_color("49b64e").unwrap(), "#49B64E");
}

#[test]
fn hex_color_rejects_bad_length_and_digits() {
    assert!(normalize_hex_color("#12").is_err());
    assert!(normalize_hex_color("#1234").is_err());
    assert!(normalize_hex_color("#GGGGGG").is_err());
    assert!(normalize_hex_color("").is_err());
}

#[test]
fn hex_color_takes_at_most_one_hash() {
    assert!(normalize_hex_color("##ABC123").is_err());
    assert!(normalize_hex_color("##ABC").is_err());
    assert!(normalize_hex_color("##AB").is_err());
}

#[test]
fn slug_allows_only_url_safe_characters() {
    assert!(validate_slug("breakfast").is_ok());
    assert!(validate_slug("late-night_snack2").is_ok());
    assert!(validate_slug("").is_err());
    assert!(validate_slug("two words").is_err());
    assert!(validate_slug("ужин").is_err());
}

#[test]
fn username_rules() {
    assert!(validate_username("cook").is_ok());
    assert!(validate_username("chef.anna+1@home").is_ok());
    assert!(validate_username("ab").is_err());
    assert!(validate_username("has space").is_err());
    assert!(validate_username(&"a".repeat(151)).is_err());
}

#[test]
fn email_needs_a_domain() {
    assert!(validate_email("cook@example.com").is_ok());
    assert!(validate_email("cook@localhost").is_err());
    assert!(validate_email("cook.example.com").is_err());
}

#[test]
fn valid_recipe_passes() {
    let (ingredients, tags) = known();
    assert!(validate_recipe(&payload(), &ingredients, &tags, true).is_ok());
}

#[test]
fn duplicate_ingredient_is_rejected() {
    let (ingredients, tags) = known();
    let mut recipe = payload();
    recipe.ingredients.push(IngredientAmount { id: 1, amount: 5 });

    let fields = field_errors(validate_recipe(&recipe, &ingredients, &tags, true));
    assert!(fields.has("ingredients"));
    assert!(!fields.has("tags"));
}

#[test]
fn empty_tags_and_empty_ingredients_are_rejected() {
    let (ingredients, tags) = known();
    let mut recipe = payload();
    recipe.tags.clear();
    recipe.ingredients.clear();

    let fields = field_errors(validate_recipe(&recipe, &ingredients, &tags, true));
    assert!(fields.has("tags"));
    assert!(fields.has("ingredients"));
}

#[test]
fn duplicate_and_unknown_tags_are_rejected() {
    let (ingredients, tags) = known();
    let mut recipe = payload();
    recipe.tags = vec![10, 10, 99];

    let fields = field_errors(validate_recipe(&recipe, &ingredients, &tags, true));
    assert_eq!(fields.get("tags").map(<[String]>::len), Some(2));
}

#[test]
fn non_positive_amount_and_cooking_time_are_rejected() {
    let (ingredients, tags) = known();
    let mut recipe = payload();
    recipe.ingredients[0].amount = 0;
    recipe.cooking_time = 0;

    let fields = field_errors(validate_recipe(&recipe, &ingredients, &tags, true));
    assert!(fields.has("ingredients"));
    assert!(fields.has("cooking_time"));
}

#[test]
fn unknown_ingredient_is_rejected() {
    let (ingredients, tags) = known();
    let mut recipe = payload();
    recipe.ingredients.push(IngredientAmount { id: 42, amount: 1 });

    let fields = field_errors(validate_recipe(&recipe, &ingredients, &tags, true));
    assert!(fields.has("ingredients"));
}

#[test]
fn image_is_required_only_on_create() {
    let (ingredients, tags) = known();
    let mut recipe = payload();
    recipe.image = None;

    let fields = field_errors(validate_recipe(&recipe, &ingredients, &tags, true));
    assert!(fields.has("image"));
    assert!(validate_recipe(&recipe, &ingredients, &tags, false).is_ok());
}

#[test]
fn all_problems_are_reported_together() {
    let (ingredients, tags) = known();
    let recipe = RecipeWriteRequest {
        ingredients: vec![],
        tags: vec![],
        image: None,
        name: "  ".into(),
        text: String::new(),
        cooking_time: -1,
    };

    let err = validate_recipe(&recipe, &ingredients, &tags, true).unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    let fields = field_errors(Err(err));
    for field in ["ingredients", "tags", "image", "name", "text", "cooking_time"] {
        assert!(fields.has(field), "missing error for {field}");
    }
}
