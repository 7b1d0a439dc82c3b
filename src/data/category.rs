use crate::MapError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level classification partitioning the dataset into independently
/// queried subsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Vegetation,
    Furniture,
    Zones,
}

impl Category {
    /// Every category, in the order dense views list them
    pub const ALL: [Category; 3] = [Category::Vegetation, Category::Furniture, Category::Zones];

    /// Code sent as the `type` query parameter and used inside tile keys
    pub fn code(&self) -> &'static str {
        match self {
            Category::Vegetation => "vegetation",
            Category::Furniture => "furniture",
            Category::Zones => "zones",
        }
    }

    /// Sparse, point-of-interest-like categories are queried with a small radius
    pub fn is_point_like(&self) -> bool {
        matches!(self, Category::Furniture)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MapError::UnknownCategory(s.to_string()))
    }
}
