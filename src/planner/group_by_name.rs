//! Group-by item names as written in a query.
//!
//! `listing__country_latest`, `metric_time__month`, `booking__ds__extract_dow`:
//! entity links and the element name separated by `__`, optionally followed by
//! a granularity or `extract_<date part>`.

use crate::model::{DatePart, EntityReference, FilterItemKind, TimeGranularity};
use crate::semantic::linkable::{ElementPathKey, LinkableElementType};
use crate::semantic::linkable::types::DUNDER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupByItemName {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
    pub time_granularity: Option<TimeGranularity>,
    pub date_part: Option<DatePart>,
}

impl GroupByItemName {
    /// Split a name into its parts. `None` for empty names and empty segments.
    pub fn parse(input: &str) -> Option<Self> {
        let lower = input.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }
        let mut parts: Vec<&str> = lower.split(DUNDER).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        let mut time_granularity = None;
        let mut date_part = None;
        if parts.len() > 1 {
            let last = parts[parts.len() - 1];
            if let Some(part) = last.strip_prefix("extract_").and_then(DatePart::parse) {
                date_part = Some(part);
                parts.pop();
            } else if let Some(granularity) = TimeGranularity::parse(last) {
                time_granularity = Some(granularity);
                parts.pop();
            }
        }

        let element_name = parts.pop()?.to_string();
        Some(Self {
            element_name,
            entity_links: parts.into_iter().map(|p| EntityReference::new(p)).collect(),
            time_granularity,
            date_part,
        })
    }

    /// Whether `key` answers this name. A name without granularity matches
    /// every granularity of the key.
    pub fn matches(&self, key: &ElementPathKey) -> bool {
        key.element_name == self.element_name
            && key.entity_links == self.entity_links
            && key.date_part == self.date_part
            && (self.time_granularity.is_none() || key.time_granularity == self.time_granularity)
    }
}

/// Find the path key a name refers to.
///
/// An exact qualified-name match wins. Otherwise the name is parsed and
/// matched without its granularity. Among several matches the finest
/// granularity is taken. `kind` restricts the element types considered.
pub fn match_path_key<'k>(
    input: &str,
    keys: impl IntoIterator<Item = &'k ElementPathKey>,
    kind: Option<FilterItemKind>,
) -> Option<ElementPathKey> {
    let wanted = input.trim().to_ascii_lowercase();
    let candidates: Vec<&ElementPathKey> = keys
        .into_iter()
        .filter(|k| kind_accepts(kind, k.element_type))
        .collect();

    let finest = |matches: Vec<&ElementPathKey>| {
        matches
            .into_iter()
            .min_by(|a, b| (a.time_granularity, *a).cmp(&(b.time_granularity, *b)))
            .cloned()
    };

    let exact: Vec<&ElementPathKey> = candidates
        .iter()
        .copied()
        .filter(|k| k.qualified_name().to_ascii_lowercase() == wanted)
        .collect();
    if !exact.is_empty() {
        return finest(exact);
    }

    let name = GroupByItemName::parse(&wanted)?;
    finest(candidates.into_iter().filter(|k| name.matches(k)).collect())
}

fn kind_accepts(kind: Option<FilterItemKind>, element_type: LinkableElementType) -> bool {
    match kind {
        None => true,
        Some(FilterItemKind::Dimension) => matches!(
            element_type,
            LinkableElementType::Dimension | LinkableElementType::TimeDimension
        ),
        Some(FilterItemKind::TimeDimension) => element_type == LinkableElementType::TimeDimension,
        Some(FilterItemKind::Entity) => element_type == LinkableElementType::Entity,
    }
}
