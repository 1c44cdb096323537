//! Viewer-dependent flags, the shopping list and ingredient search ranking.
//!
//! Nothing here touches the database. Callers load the rows and pass the
//! viewer explicitly, so every function can be exercised with plain values.

use std::collections::{HashMap, HashSet};

/// Who is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(i32),
}

impl Viewer {
    pub fn user_id(&self) -> Option<i32> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(*id),
        }
    }
}

/// Ids the viewer has favorited / put in the cart / subscribed to.
/// Always empty for anonymous viewers.
#[derive(Debug, Clone, Default)]
pub struct ViewerMarks {
    pub favorited: HashSet<i32>,
    pub in_cart: HashSet<i32>,
    pub subscribed_authors: HashSet<i32>,
}

impl ViewerMarks {
    pub fn is_favorited(&self, viewer: Viewer, recipe_id: i32) -> bool {
        viewer.user_id().is_some() && self.favorited.contains(&recipe_id)
    }

    pub fn is_in_shopping_cart(&self, viewer: Viewer, recipe_id: i32) -> bool {
        viewer.user_id().is_some() && self.in_cart.contains(&recipe_id)
    }

    pub fn is_subscribed(&self, viewer: Viewer, author_id: i32) -> bool {
        viewer.user_id().is_some() && self.subscribed_authors.contains(&author_id)
    }
}

/// How an `is_favorited` / `is_in_shopping_cart` filter applies to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagScope {
    /// The flag is absent or false.
    Unrestricted,
    /// Keep only recipes marked by this user.
    MarkedBy(i32),
    /// The flag was requested by an anonymous viewer: nothing can match.
    Nothing,
}

pub fn flag_scope(viewer: Viewer, requested: Option<bool>) -> FlagScope {
    match (requested, viewer) {
        (None | Some(false), _) => FlagScope::Unrestricted,
        (Some(true), Viewer::User(id)) => FlagScope::MarkedBy(id),
        (Some(true), Viewer::Anonymous) => FlagScope::Nothing,
    }
}

// --- Shopping list ---

/// One ingredient line of a recipe in the cart, joined with its ingredient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub ingredient_id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub ingredient_id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Groups lines by ingredient id and sums amounts. Ingredients that share a name
/// but differ in unit stay separate. Sorted by name, then unit, then id.
pub fn aggregate_shopping_list(lines: impl IntoIterator<Item = CartLine>) -> Vec<ShoppingListItem> {
    let mut totals: HashMap<i32, ShoppingListItem> = HashMap::new();
    for line in lines {
        totals
            .entry(line.ingredient_id)
            .and_modify(|item| item.total += i64::from(line.amount))
            .or_insert_with(|| ShoppingListItem {
                ingredient_id: line.ingredient_id,
                total: i64::from(line.amount),
                name: line.name,
                measurement_unit: line.measurement_unit,
            });
    }
    let mut items: Vec<ShoppingListItem> = totals.into_values().collect();
    items.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.measurement_unit.cmp(&b.measurement_unit))
            .then_with(|| a.ingredient_id.cmp(&b.ingredient_id))
    });
    items
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} ({}) - {}\n", item.name, item.measurement_unit, item.total))
        .collect()
}

// --- Ingredient search ---

/// Prefix matches first, then substring matches, each group in input order.
/// Matching is case-insensitive and Unicode aware. Each item appears at most once.
pub fn rank_by_name<T, F>(items: Vec<T>, query: &str, name_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return items;
    }
    let mut prefix = Vec::new();
    let mut contains = Vec::new();
    for item in items {
        let name = name_of(&item).to_lowercase();
        if name.starts_with(&query) {
            prefix.push(item);
        } else if name.contains(&query) {
            contains.push(item);
        }
    }
    prefix.extend(contains);
    prefix
}
