//! Request validation. Everything here is pure: a write request goes in, either a
//! normalized value or a field-scoped error map comes out. Checks that need the
//! database (unknown ids, uniqueness) live in the data-access services.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::services::media_service::{ImageUpload, parse_image_data_uri};
use crate::web::models::{
    IngredientCreateRequest, RecipeWriteRequest, RegisterRequest, TagCreateRequest,
    UserUpdateRequest,
};

pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = 600;
pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 32767;
pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_USER_FIELD_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 8;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

/// Field name -> messages. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

/// Required (when `required`), non-blank, bounded text. Returns the trimmed value.
fn check_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&String>,
    required: bool,
    max_len: Option<usize>,
) -> Option<String> {
    let Some(value) = value else {
        if required {
            errors.add(field, REQUIRED);
        }
        return None;
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if let Some(max) = max_len {
        if trimmed.chars().count() > max {
            errors.add(field, too_long(max));
            return None;
        }
    }
    Some(trimmed.to_string())
}

fn check_id(id: i64) -> Option<i32> {
    i32::try_from(id).ok().filter(|id| *id > 0)
}

// --- Recipes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientLine {
    pub ingredient_id: i32,
    pub amount: i32,
}

/// A validated recipe write. On create every field is `Some`; on update `None` means "leave as is".
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<ImageUpload>,
    pub tags: Option<Vec<i32>>,
    pub ingredients: Option<Vec<IngredientLine>>,
}

pub fn validate_recipe_create(req: &RecipeWriteRequest) -> Result<RecipeChanges, FieldErrors> {
    validate_recipe(req, true)
}

pub fn validate_recipe_update(req: &RecipeWriteRequest) -> Result<RecipeChanges, FieldErrors> {
    validate_recipe(req, false)
}

fn validate_recipe(req: &RecipeWriteRequest, required: bool) -> Result<RecipeChanges, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = check_text(&mut errors, "name", req.name.as_ref(), required, Some(MAX_NAME_LENGTH));
    let text = check_text(&mut errors, "text", req.text.as_ref(), required, None);

    let cooking_time = match req.cooking_time {
        None => {
            if required {
                errors.add("cooking_time", REQUIRED);
            }
            None
        }
        Some(t) if t < MIN_COOKING_TIME => {
            errors.add(
                "cooking_time",
                format!("Ensure this value is greater than or equal to {MIN_COOKING_TIME}."),
            );
            None
        }
        Some(t) if t > MAX_COOKING_TIME => {
            errors.add(
                "cooking_time",
                format!("Ensure this value is less than or equal to {MAX_COOKING_TIME}."),
            );
            None
        }
        Some(t) => i32::try_from(t).ok(),
    };

    let image = match req.image.as_deref() {
        None => {
            if required {
                errors.add("image", REQUIRED);
            }
            None
        }
        Some(raw) if raw.trim().is_empty() => {
            errors.add("image", BLANK);
            None
        }
        Some(raw) => match parse_image_data_uri(raw) {
            Ok(upload) => Some(upload),
            Err(e) => {
                errors.add("image", e.to_string());
                None
            }
        },
    };

    let tags = match req.tags.as_ref() {
        None => {
            if required {
                errors.add("tags", REQUIRED);
            }
            None
        }
        Some(ids) => validate_tag_ids(&mut errors, ids),
    };

    let ingredients = match req.ingredients.as_ref() {
        None => {
            if required {
                errors.add("ingredients", REQUIRED);
            }
            None
        }
        Some(lines) => validate_ingredient_lines(&mut errors, lines),
    };

    errors.into_result(RecipeChanges {
        name,
        text,
        cooking_time,
        image,
        tags,
        ingredients,
    })
}

fn validate_tag_ids(errors: &mut FieldErrors, ids: &[i64]) -> Option<Vec<i32>> {
    if ids.is_empty() {
        errors.add("tags", "At least one tag is required.");
        return None;
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(ids.len());
    let mut ok = true;
    for &raw in ids {
        let Some(id) = check_id(raw) else {
            errors.add("tags", format!("Invalid pk \"{raw}\" - object does not exist."));
            ok = false;
            continue;
        };
        if !seen.insert(id) {
            errors.add("tags", format!("Tag {id} is listed more than once."));
            ok = false;
            continue;
        }
        out.push(id);
    }
    ok.then_some(out)
}

fn validate_ingredient_lines(
    errors: &mut FieldErrors,
    lines: &[crate::web::models::IngredientAmountRequest],
) -> Option<Vec<IngredientLine>> {
    if lines.is_empty() {
        errors.add("ingredients", "At least one ingredient is required.");
        return None;
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(lines.len());
    let mut ok = true;
    for line in lines {
        let Some(id) = check_id(line.id) else {
            errors.add(
                "ingredients",
                format!("Invalid pk \"{}\" - object does not exist.", line.id),
            );
            ok = false;
            continue;
        };
        if !seen.insert(id) {
            errors.add("ingredients", format!("Ingredient {id} is listed more than once."));
            ok = false;
            continue;
        }
        if line.amount < MIN_AMOUNT {
            errors.add(
                "ingredients",
                format!("Amount of ingredient {id} must be at least {MIN_AMOUNT}."),
            );
            ok = false;
            continue;
        }
        if line.amount > MAX_AMOUNT {
            errors.add(
                "ingredients",
                format!("Amount of ingredient {id} must be at most {MAX_AMOUNT}."),
            );
            ok = false;
            continue;
        }
        out.push(IngredientLine {
            ingredient_id: id,
            amount: line.amount as i32,
        });
    }
    ok.then_some(out)
}

// --- Reference data ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn validate_tag(req: &TagCreateRequest) -> Result<NewTag, FieldErrors> {
    let mut errors = FieldErrors::new();
    let name = check_text(&mut errors, "name", req.name.as_ref(), true, Some(MAX_NAME_LENGTH));
    let color = check_text(&mut errors, "color", req.color.as_ref(), true, None);
    let slug = check_text(&mut errors, "slug", req.slug.as_ref(), true, Some(MAX_NAME_LENGTH));

    if let Some(color) = color.as_deref() {
        if !is_hex_color(color) {
            errors.add("color", "Enter a valid hex color, e.g. #49B64E.");
        }
    }
    if let Some(slug) = slug.as_deref() {
        if !is_slug(slug) {
            errors.add(
                "slug",
                "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
            );
        }
    }

    match (name, color, slug) {
        (Some(name), Some(color), Some(slug)) if errors.is_empty() => Ok(NewTag {
            name,
            color: color.to_uppercase(),
            slug,
        }),
        _ => Err(errors),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

pub fn validate_ingredient(req: &IngredientCreateRequest) -> Result<NewIngredient, FieldErrors> {
    let mut errors = FieldErrors::new();
    let name = check_text(&mut errors, "name", req.name.as_ref(), true, Some(MAX_NAME_LENGTH));
    let measurement_unit = check_text(
        &mut errors,
        "measurement_unit",
        req.measurement_unit.as_ref(),
        true,
        Some(MAX_NAME_LENGTH),
    );
    match (name, measurement_unit) {
        (Some(name), Some(measurement_unit)) => Ok(NewIngredient {
            name,
            measurement_unit,
        }),
        _ => Err(errors),
    }
}

// --- Users ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn is_username(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
}

fn check_email(errors: &mut FieldErrors, value: Option<&String>, required: bool) -> Option<String> {
    let email = check_text(errors, "email", value, required, Some(MAX_EMAIL_LENGTH))?;
    if !is_email(&email) {
        errors.add("email", "Enter a valid email address.");
        return None;
    }
    Some(email.to_lowercase())
}

fn check_username(errors: &mut FieldErrors, value: Option<&String>, required: bool) -> Option<String> {
    let username = check_text(errors, "username", value, required, Some(MAX_USER_FIELD_LENGTH))?;
    if !is_username(&username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
        return None;
    }
    Some(username)
}

pub fn check_password(errors: &mut FieldErrors, field: &str, value: Option<&String>) -> Option<String> {
    let Some(password) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    if password.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            field,
            format!(
                "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
            ),
        );
        return None;
    }
    Some(password.clone())
}

pub fn validate_registration(req: &RegisterRequest) -> Result<NewUser, FieldErrors> {
    let mut errors = FieldErrors::new();
    let email = check_email(&mut errors, req.email.as_ref(), true);
    let username = check_username(&mut errors, req.username.as_ref(), true);
    let first_name = check_text(
        &mut errors,
        "first_name",
        req.first_name.as_ref(),
        true,
        Some(MAX_USER_FIELD_LENGTH),
    );
    let last_name = check_text(
        &mut errors,
        "last_name",
        req.last_name.as_ref(),
        true,
        Some(MAX_USER_FIELD_LENGTH),
    );
    let password = check_password(&mut errors, "password", req.password.as_ref());

    match (email, username, first_name, last_name, password) {
        (Some(email), Some(username), Some(first_name), Some(last_name), Some(password)) => {
            Ok(NewUser {
                email,
                username,
                first_name,
                last_name,
                password,
            })
        }
        _ => Err(errors),
    }
}

pub fn validate_user_update(req: &UserUpdateRequest) -> Result<UserChanges, FieldErrors> {
    let mut errors = FieldErrors::new();
    let changes = UserChanges {
        email: check_email(&mut errors, req.email.as_ref(), false),
        username: check_username(&mut errors, req.username.as_ref(), false),
        first_name: check_text(
            &mut errors,
            "first_name",
            req.first_name.as_ref(),
            false,
            Some(MAX_USER_FIELD_LENGTH),
        ),
        last_name: check_text(
            &mut errors,
            "last_name",
            req.last_name.as_ref(),
            false,
            Some(MAX_USER_FIELD_LENGTH),
        ),
    };
    errors.into_result(changes)
}

/// Parses an `is_favorited`-style query flag. `None` means the flag does not restrict.
pub fn parse_flag(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<bool> {
    match raw.map(str::trim) {
        None | Some("") => None,
        Some("1") | Some("true") | Some("True") => Some(true),
        Some("0") | Some("false") | Some("False") => Some(false),
        Some(other) => {
            errors.add(field, format!("\"{other}\" is not a valid boolean."));
            None
        }
    }
}
