//! Static per-city attraction data
//!
//! The table ships inside the binary as JSON and can be swapped for an
//! external file. Cities and categories are stored as ordered lists so the
//! fallback planner sees attractions in table order.

use crate::PlannerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BUNDLED_TABLE: &str = include_str!("attraction_table.json");

/// A single sight, tour or restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttractionRecord {
    pub name: String,
    pub description: String,
    /// Flat cost per person
    pub cost: f64,
    /// Filled from the enclosing category when the file omits it
    #[serde(default)]
    pub category: String,
    /// Nominal visit length, e.g. "2小时"
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttractionCategory {
    pub category: String,
    pub attractions: Vec<AttractionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityAttractions {
    pub city: String,
    pub categories: Vec<AttractionCategory>,
}

impl CityAttractions {
    /// Attractions of one interest category, in table order
    pub fn category(&self, interest: InterestCategory) -> &[AttractionRecord] {
        self.categories
            .iter()
            .find(|c| c.category == interest.key())
            .map(|c| c.attractions.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_food_category(&self) -> bool {
        !self.category(InterestCategory::Food).is_empty()
    }

    /// Every attraction across all categories, in table order
    pub fn all_attractions(&self) -> impl Iterator<Item = &AttractionRecord> {
        self.categories.iter().flat_map(|c| c.attractions.iter())
    }
}

/// Read-only city -> category -> attractions table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttractionTable {
    cities: Vec<CityAttractions>,
}

impl AttractionTable {
    /// The table compiled into the crate
    pub fn bundled() -> Result<Self, PlannerError> {
        Self::from_json(BUNDLED_TABLE)
    }

    pub fn from_path(path: &Path) -> Result<Self, PlannerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlannerError::AttractionTableError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let table = Self::from_json(&content)?;
        info!(path = %path.display(), cities = table.cities.len(), "Loaded attraction table");
        Ok(table)
    }

    pub fn from_json(json: &str) -> Result<Self, PlannerError> {
        let mut table: AttractionTable = serde_json::from_str(json)?;
        table.validate_and_tag()?;
        debug!(cities = table.cities.len(), "Parsed attraction table");
        Ok(table)
    }

    /// Look up a city, ignoring a trailing "市" on either side
    pub fn city(&self, name: &str) -> Option<&CityAttractions> {
        let wanted = normalize_city(name);
        if wanted.is_empty() {
            return None;
        }
        self.cities.iter().find(|c| normalize_city(&c.city) == wanted)
    }

    pub fn cities(&self) -> impl Iterator<Item = &CityAttractions> {
        self.cities.iter()
    }

    fn validate_and_tag(&mut self) -> Result<(), PlannerError> {
        for city in &mut self.cities {
            if city.city.trim().is_empty() {
                return Err(PlannerError::AttractionTableError("City with empty name".to_string()));
            }
            for category in &mut city.categories {
                for attraction in &mut category.attractions {
                    if attraction.cost.is_nan() || attraction.cost < 0.0 {
                        return Err(PlannerError::AttractionTableError(format!(
                            "Invalid cost {} for {} in {}",
                            attraction.cost, attraction.name, city.city
                        )));
                    }
                    if attraction.category.is_empty() {
                        attraction.category = category.category.clone();
                    }
                }
            }
        }
        Ok(())
    }
}

fn normalize_city(name: &str) -> &str {
    let trimmed = name.trim();
    trimmed.strip_suffix('市').unwrap_or(trimmed)
}

/// Where the fallback planner reads its table from
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AttractionSource {
    #[default]
    Bundled,
    File(PathBuf),
}

impl AttractionSource {
    pub fn load(&self) -> Result<AttractionTable, PlannerError> {
        match self {
            AttractionSource::Bundled => AttractionTable::bundled(),
            AttractionSource::File(path) => AttractionTable::from_path(path),
        }
    }
}

/// Interest groups recognised in the free-text interests field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestCategory {
    History,
    Nature,
    Entertainment,
    Food,
}

impl InterestCategory {
    /// Matching order when several groups hit
    pub const ALL: [InterestCategory; 4] = [
        InterestCategory::History,
        InterestCategory::Nature,
        InterestCategory::Entertainment,
        InterestCategory::Food,
    ];

    /// Category name used in the attraction table
    pub fn key(self) -> &'static str {
        match self {
            InterestCategory::History => "history",
            InterestCategory::Nature => "nature",
            InterestCategory::Entertainment => "entertainment",
            InterestCategory::Food => "food",
        }
    }

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            InterestCategory::History => {
                &["历史", "文化", "古迹", "博物", "history", "culture", "heritage", "museum"]
            }
            // bare "海" would also catch "海鲜"
            InterestCategory::Nature => &[
                "自然", "风景", "山水", "海边", "海滨", "大海", "看海", "海岛", "nature", "scenery",
                "seaside", "ocean", "beach",
            ],
            InterestCategory::Entertainment => &[
                "娱乐", "游玩", "好玩", "乐园", "购物", "夜生活", "entertainment", "play",
                "shopping", "nightlife", "theme park",
            ],
            InterestCategory::Food => &[
                "美食", "吃", "小吃", "海鲜", "餐", "food", "eating", "cuisine", "seafood",
            ],
        }
    }

    /// Groups whose keywords occur in the interests text, in `ALL` order
    pub fn matching(interests: &str) -> Vec<InterestCategory> {
        let lowered = interests.to_lowercase();
        Self::ALL
            .into_iter()
            .filter(|category| category.keywords().iter().any(|k| lowered.contains(k)))
            .collect()
    }
}
