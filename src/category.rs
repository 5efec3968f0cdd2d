/// Categories: model, name validation, and select-or-create resolution
use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_NAME_LEN: usize = 50;

/// A user-defined label grouping saved links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// What the user picked in the category select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySelection {
    /// "No category" — the saved link carries a null category reference.
    None,
    /// An entry from the loaded list.
    Existing(String),
    /// The "+ new category" option, with whatever was typed into the name box.
    New(String),
}

/// The decision the save workflow acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryAction {
    None,
    /// Attach an already-known category id.
    Use(String),
    /// Insert a category with this (trimmed) name, then attach it.
    Create(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryNameError {
    Empty,
    TooLong,
}

impl fmt::Display for CategoryNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryNameError::Empty => write!(f, "Enter a category name."),
            CategoryNameError::TooLong => {
                write!(f, "Category names are limited to {} characters.", MAX_NAME_LEN)
            }
        }
    }
}

/// Trim and bounds-check a new category name.
pub fn validate_new_name(raw: &str) -> Result<String, CategoryNameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(CategoryNameError::Empty);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CategoryNameError::TooLong);
    }
    Ok(name.to_string())
}

/// Case-insensitive exact match against the loaded list.
pub fn find_by_name<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    let needle = name.to_lowercase();
    categories.iter().find(|c| c.name.to_lowercase() == needle)
}

/// Turn the user's selection into an action.
///
/// Invariant: one owner never ends up with two categories whose names differ
/// only by case — a "new" name that matches a loaded category reuses its id
/// and no insert happens.
pub fn resolve_selection(
    selection: &CategorySelection,
    categories: &[Category],
) -> Result<CategoryAction, CategoryNameError> {
    match selection {
        CategorySelection::None => Ok(CategoryAction::None),
        CategorySelection::Existing(id) => Ok(CategoryAction::Use(id.clone())),
        CategorySelection::New(raw) => {
            let name = validate_new_name(raw)?;
            match find_by_name(categories, &name) {
                Some(existing) => Ok(CategoryAction::Use(existing.id.clone())),
                None => Ok(CategoryAction::Create(name)),
            }
        }
    }
}
