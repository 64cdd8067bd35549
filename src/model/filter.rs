//! Where-filter templates.
//!
//! A filter is SQL-ish text with element references embedded as
//! `{{ Dimension('listing__country_latest') }}`,
//! `{{ TimeDimension('metric_time', 'month') }}` or `{{ Entity('listing') }}`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static ITEM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{\s*(Dimension|TimeDimension|Entity)\(\s*'([^']+)'\s*(?:,\s*'([^']+)'\s*)?\)\s*\}\}",
    )
    .unwrap()
});

/// A where-filter template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhereFilter {
    pub template: String,
}

/// Kind of element referenced inside a filter template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterItemKind {
    Dimension,
    TimeDimension,
    Entity,
}

/// One `{{ ... }}` reference found in a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterItemReference {
    pub kind: FilterItemKind,
    pub name: String,
    /// Second argument of `TimeDimension(...)`, a granularity or `extract_<part>`.
    pub grain: Option<String>,
}

impl FilterItemReference {
    /// The reference written as a group-by item name, e.g. `booking__ds__month`.
    pub fn to_group_by_name(&self) -> String {
        match &self.grain {
            Some(grain) => format!("{}__{}", self.name, grain.to_ascii_lowercase()),
            None => self.name.clone(),
        }
    }
}

impl WhereFilter {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Element references in order of appearance, duplicates removed.
    pub fn item_references(&self) -> Vec<FilterItemReference> {
        let mut refs: Vec<FilterItemReference> = Vec::new();
        for caps in ITEM_PATTERN.captures_iter(&self.template) {
            let kind = match &caps[1] {
                "Dimension" => FilterItemKind::Dimension,
                "TimeDimension" => FilterItemKind::TimeDimension,
                _ => FilterItemKind::Entity,
            };
            let item = FilterItemReference {
                kind,
                name: caps[2].trim().to_string(),
                grain: caps.get(3).map(|m| m.as_str().trim().to_string()),
            };
            if !refs.contains(&item) {
                refs.push(item);
            }
        }
        refs
    }
}

impl std::fmt::Display for WhereFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}
