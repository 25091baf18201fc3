//! Field-level validation for request payloads.
//!
//! Checks here are pure: anything that needs the database (does this
//! ingredient exist?) is looked up by the service first and passed in.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use utoipa::ToSchema;

use crate::{dto::recipes::RecipeWriteRequest, error::AppError};

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").expect("valid regex"));
static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid regex"));
static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

pub const USERNAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 150;
pub const TAG_NAME_MAX_LEN: usize = 30;
pub const SLUG_MAX_LEN: usize = 200;
pub const RECIPE_NAME_MAX_LEN: usize = 200;
pub const INGREDIENT_NAME_MAX_LEN: usize = 200;
pub const MEASUREMENT_UNIT_MAX_LEN: usize = 30;
pub const MIN_AMOUNT: i32 = 1;
pub const MIN_COOKING_TIME: i32 = 1;

/// Validation messages keyed by the offending field.
#[derive(Debug, Default, Clone, PartialEq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

/// Normalise a tag colour to upper-case `#RGB` / `#RRGGBB`.
///
/// Surrounding spaces are ignored and a missing leading `#` is added back.
/// At most one `#` is accepted.
pub fn normalize_hex_color(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let candidate = format!("#{digits}");
    if !matches!(digits.len(), 3 | 6) {
        return Err(format!(
            "{value} has the wrong length ({}), expected #RGB or #RRGGBB",
            digits.len()
        ));
    }
    if !HEX_COLOR.is_match(&candidate) {
        return Err(format!("{value} is not a hexadecimal colour"));
    }
    Ok(candidate.to_uppercase())
}

pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() || slug.len() > SLUG_MAX_LEN {
        return Err(format!("slug must be 1..={SLUG_MAX_LEN} characters"));
    }
    if !SLUG.is_match(slug) {
        return Err("slug may only contain letters, digits, hyphens and underscores".into());
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return Err(format!(
            "username must be at least {USERNAME_MIN_LEN} characters"
        ));
    }
    if len > NAME_MAX_LEN {
        return Err(format!("username must be at most {NAME_MAX_LEN} characters"));
    }
    if !USERNAME.is_match(username) {
        return Err("username may only contain letters, digits and @/./+/-/_".into());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.len() > 254 || !EMAIL.is_match(email) {
        return Err(format!("{email} is not a valid email address"));
    }
    Ok(())
}

/// Check a bounded, non-blank text field and record problems under `field`.
pub fn check_text(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    if value.trim().is_empty() {
        errors.add(field, "this field may not be blank");
    } else if value.chars().count() > max_len {
        errors.add(field, format!("ensure this field has at most {max_len} characters"));
    }
}

/// Validate a recipe create/update payload.
///
/// `known_ingredients` and `known_tags` hold the ids from the payload that
/// exist in the database. Every problem is collected before returning.
pub fn validate_recipe(
    payload: &RecipeWriteRequest,
    known_ingredients: &HashSet<i64>,
    known_tags: &HashSet<i64>,
    image_required: bool,
) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();

    if payload.ingredients.is_empty() {
        errors.add("ingredients", "at least one ingredient is required");
    }
    let mut seen = HashSet::new();
    for item in &payload.ingredients {
        if !known_ingredients.contains(&item.id) {
            errors.add("ingredients", format!("ingredient {} does not exist", item.id));
        }
        if item.amount < MIN_AMOUNT {
            errors.add(
                "ingredients",
                format!("amount for ingredient {} must be at least {MIN_AMOUNT}", item.id),
            );
        }
        if !seen.insert(item.id) {
            errors.add("ingredients", format!("ingredient {} is listed twice", item.id));
        }
    }

    if payload.tags.is_empty() {
        errors.add("tags", "at least one tag is required");
    }
    let mut seen = HashSet::new();
    for tag_id in &payload.tags {
        if !known_tags.contains(tag_id) {
            errors.add("tags", format!("tag {tag_id} does not exist"));
        }
        if !seen.insert(*tag_id) {
            errors.add("tags", format!("tag {tag_id} is listed twice"));
        }
    }

    if payload.cooking_time < MIN_COOKING_TIME {
        errors.add(
            "cooking_time",
            format!("cooking time must be at least {MIN_COOKING_TIME} minute"),
        );
    }
    check_text(&mut errors, "name", &payload.name, RECIPE_NAME_MAX_LEN);
    if payload.text.trim().is_empty() {
        errors.add("text", "this field may not be blank");
    }
    if image_required && payload.image.as_deref().is_none_or(str::is_empty) {
        errors.add("image", "an image is required");
    }

    errors.into_result()
}
