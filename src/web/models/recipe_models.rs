use serde::{Deserialize, Serialize};

use crate::db::entities::{ingredient, tag};
use crate::db::services::recipe_service::RecipeDetails;
use crate::services::media_service::MediaStore;
use crate::web::models::UserResponse;

// --- Reference data ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<tag::Model> for TagResponse {
    fn from(tag: tag::Model) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TagCreateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientResponse {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

impl From<ingredient::Model> for IngredientResponse {
    fn from(ingredient: ingredient::Model) -> Self {
        Self {
            id: ingredient.id,
            name: ingredient.name,
            measurement_unit: ingredient.measurement_unit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientCreateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub measurement_unit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearchQuery {
    pub name: Option<String>,
}

// --- Recipes: read shapes ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientAmountResponse {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: i32,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<IngredientAmountResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeResponse {
    pub fn from_details(details: RecipeDetails, media: &MediaStore) -> Self {
        let RecipeDetails {
            recipe,
            author,
            author_is_subscribed,
            tags,
            ingredients,
            is_favorited,
            is_in_shopping_cart,
        } = details;
        Self {
            id: recipe.id,
            tags: tags.into_iter().map(TagResponse::from).collect(),
            author: UserResponse::new(author, author_is_subscribed),
            ingredients: ingredients
                .into_iter()
                .map(|line| IngredientAmountResponse {
                    id: line.ingredient.id,
                    name: line.ingredient.name,
                    measurement_unit: line.ingredient.measurement_unit,
                    amount: line.amount,
                })
                .collect(),
            is_favorited,
            is_in_shopping_cart,
            image: media.url_for(&recipe.image),
            name: recipe.name,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        }
    }
}

/// Compact form used by membership toggles and subscription listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortRecipeResponse {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl ShortRecipeResponse {
    pub fn new(recipe: &crate::db::entities::recipe::Model, media: &MediaStore) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: media.url_for(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

// --- Recipes: write shape ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientAmountRequest {
    pub id: i64,
    pub amount: i64,
}

/// Body of `POST /recipes/` and `PATCH /recipes/{id}/`.
/// Every field is optional here; which ones are required depends on the operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeWriteRequest {
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientAmountRequest>>,
    #[serde(default)]
    pub tags: Option<Vec<i64>>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub author: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}
