use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use adboard_core::DomainError;

/// Catalog category a listing is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Vehicles,
    Furniture,
    Clothing,
    Books,
    Services,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Vehicles => "vehicles",
            Category::Furniture => "furniture",
            Category::Clothing => "clothing",
            Category::Books => "books",
            Category::Services => "services",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "electronics" => Ok(Category::Electronics),
            "vehicles" => Ok(Category::Vehicles),
            "furniture" => Ok(Category::Furniture),
            "clothing" => Ok(Category::Clothing),
            "books" => Ok(Category::Books),
            "services" => Ok(Category::Services),
            "other" => Ok(Category::Other),
            other => Err(DomainError::validation(format!(
                "unknown category: {other}"
            ))),
        }
    }
}
