//! `LinkableElementSet`: path key to same-keyed linkable elements.
//!
//! Values are immutable: every operation builds a new set. Under one key the
//! elements are sorted and distinct by provenance, so more than one element
//! means the key is ambiguous.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use super::types::{
    ElementPathKey, LinkableDimension, LinkableElement, LinkableElementProperty, LinkableEntity,
    LinkableMetric,
};
use crate::semantic::specs::LinkableSpecSet;

/// Property-based selection applied by [`LinkableElementSet::filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkableElementFilter {
    /// Keep elements carrying at least one of these.
    pub with_any_of: BTreeSet<LinkableElementProperty>,
    /// Drop elements carrying any of these.
    pub without_any_of: BTreeSet<LinkableElementProperty>,
    /// Drop elements carrying all of these. Ignored when empty.
    pub without_all_of: BTreeSet<LinkableElementProperty>,
}

impl Default for LinkableElementFilter {
    fn default() -> Self {
        Self {
            with_any_of: LinkableElementProperty::all(),
            without_any_of: BTreeSet::new(),
            without_all_of: BTreeSet::new(),
        }
    }
}

impl LinkableElementFilter {
    pub fn new(
        with_any_of: &[LinkableElementProperty],
        without_any_of: &[LinkableElementProperty],
    ) -> Self {
        Self {
            with_any_of: with_any_of.iter().copied().collect(),
            without_any_of: without_any_of.iter().copied().collect(),
            without_all_of: BTreeSet::new(),
        }
    }

    pub fn without_all_of(mut self, properties: &[LinkableElementProperty]) -> Self {
        self.without_all_of = properties.iter().copied().collect();
        self
    }

    pub fn accepts(&self, properties: &BTreeSet<LinkableElementProperty>) -> bool {
        if self.with_any_of.is_disjoint(properties) {
            return false;
        }
        if !self.without_any_of.is_disjoint(properties) {
            return false;
        }
        if !self.without_all_of.is_empty() && self.without_all_of.is_subset(properties) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkableElementSet {
    dimensions: BTreeMap<ElementPathKey, Vec<LinkableDimension>>,
    entities: BTreeMap<ElementPathKey, Vec<LinkableEntity>>,
    metrics: BTreeMap<ElementPathKey, Vec<LinkableMetric>>,
}

impl LinkableElementSet {
    pub fn from_elements(
        dimensions: impl IntoIterator<Item = LinkableDimension>,
        entities: impl IntoIterator<Item = LinkableEntity>,
        metrics: impl IntoIterator<Item = LinkableMetric>,
    ) -> Self {
        let mut set = LinkableElementSet::default();
        for dimension in dimensions {
            insert_element(&mut set.dimensions, dimension);
        }
        for entity in entities {
            insert_element(&mut set.entities, entity);
        }
        for metric in metrics {
            insert_element(&mut set.metrics, metric);
        }
        set
    }

    pub fn path_key_to_linkable_dimensions(&self) -> &BTreeMap<ElementPathKey, Vec<LinkableDimension>> {
        &self.dimensions
    }

    pub fn path_key_to_linkable_entities(&self) -> &BTreeMap<ElementPathKey, Vec<LinkableEntity>> {
        &self.entities
    }

    pub fn path_key_to_linkable_metrics(&self) -> &BTreeMap<ElementPathKey, Vec<LinkableMetric>> {
        &self.metrics
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty() && self.entities.is_empty() && self.metrics.is_empty()
    }

    /// Number of distinct path keys.
    pub fn len(&self) -> usize {
        self.dimensions.len() + self.entities.len() + self.metrics.len()
    }

    pub fn path_keys(&self) -> BTreeSet<ElementPathKey> {
        self.dimensions
            .keys()
            .chain(self.entities.keys())
            .chain(self.metrics.keys())
            .cloned()
            .collect()
    }

    pub fn contains_key(&self, key: &ElementPathKey) -> bool {
        self.dimensions.contains_key(key)
            || self.entities.contains_key(key)
            || self.metrics.contains_key(key)
    }

    /// Number of distinct elements under `key`; 0 when absent.
    pub fn element_count(&self, key: &ElementPathKey) -> usize {
        self.dimensions
            .get(key)
            .map(Vec::len)
            .or_else(|| self.entities.get(key).map(Vec::len))
            .or_else(|| self.metrics.get(key).map(Vec::len))
            .unwrap_or(0)
    }

    /// Models defining the elements under `key`, for ambiguity reporting.
    pub fn origins(&self, key: &ElementPathKey) -> Vec<String> {
        fn describe<T: LinkableElement>(elements: &[T]) -> Vec<String> {
            elements
                .iter()
                .map(|e| {
                    let mut origin = e
                        .defined_in()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "<virtual>".to_string());
                    if let Some(path) = e.join_path() {
                        let _ = write!(origin, " via {}", path);
                    }
                    origin
                })
                .collect()
        }
        if let Some(elements) = self.dimensions.get(key) {
            return describe(elements);
        }
        if let Some(elements) = self.entities.get(key) {
            return describe(elements);
        }
        self.metrics.get(key).map(|e| describe(e)).unwrap_or_default()
    }

    /// Union of `sets`. Colliding keys keep every distinct element.
    pub fn merge_by_path_key<'a>(sets: impl IntoIterator<Item = &'a LinkableElementSet>) -> Self {
        let mut merged = LinkableElementSet::default();
        for set in sets {
            merge_maps(&mut merged.dimensions, &set.dimensions);
            merge_maps(&mut merged.entities, &set.entities);
            merge_maps(&mut merged.metrics, &set.metrics);
        }
        merged
    }

    /// Keys present in every set, each mapped to the union of its elements.
    /// An empty input gives an empty set.
    pub fn intersection_by_path_key(sets: &[LinkableElementSet]) -> Self {
        let Some((first, rest)) = sets.split_first() else {
            return LinkableElementSet::default();
        };
        if rest.is_empty() {
            return first.clone();
        }
        LinkableElementSet {
            dimensions: intersect_maps(first, rest, |s| &s.dimensions),
            entities: intersect_maps(first, rest, |s| &s.entities),
            metrics: intersect_maps(first, rest, |s| &s.metrics),
        }
    }

    /// Elements accepted by `filter`. Keys left without elements are dropped.
    pub fn filter(&self, filter: &LinkableElementFilter) -> Self {
        LinkableElementSet {
            dimensions: filter_map(&self.dimensions, filter),
            entities: filter_map(&self.entities, filter),
            metrics: filter_map(&self.metrics, filter),
        }
    }

    /// Only keys with exactly one element.
    pub fn only_unique_path_keys(&self) -> Self {
        fn unique<T: Clone>(map: &BTreeMap<ElementPathKey, Vec<T>>) -> BTreeMap<ElementPathKey, Vec<T>> {
            map.iter()
                .filter(|(_, elements)| elements.len() == 1)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        }
        LinkableElementSet {
            dimensions: unique(&self.dimensions),
            entities: unique(&self.entities),
            metrics: unique(&self.metrics),
        }
    }

    /// Flatten into typed spec lists sorted by qualified name.
    pub fn as_spec_set(&self) -> LinkableSpecSet {
        LinkableSpecSet::from_path_keys(
            self.dimensions
                .keys()
                .chain(self.entities.keys())
                .chain(self.metrics.keys()),
        )
    }

    /// Tabular rendering, one row per element, ordered by qualified name.
    pub fn dump(&self) -> String {
        let mut rows: Vec<[String; 5]> = Vec::new();
        push_rows(&mut rows, &self.dimensions);
        push_rows(&mut rows, &self.entities);
        push_rows(&mut rows, &self.metrics);
        rows.sort();

        let header = [
            "qualified_name".to_string(),
            "type".to_string(),
            "defined_in".to_string(),
            "join_path".to_string(),
            "properties".to_string(),
        ];
        let mut widths = header.clone().map(|h| h.len());
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        let mut out = String::new();
        for row in std::iter::once(&header).chain(rows.iter()) {
            let line = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:width$}", cell, width = widths[i]))
                .collect::<Vec<_>>()
                .join(" | ");
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

fn push_rows<T: LinkableElement>(rows: &mut Vec<[String; 5]>, map: &BTreeMap<ElementPathKey, Vec<T>>) {
    for (key, elements) in map {
        for element in elements {
            let element_type = match key.element_type {
                super::types::LinkableElementType::Dimension => "dimension",
                super::types::LinkableElementType::TimeDimension => "time_dimension",
                super::types::LinkableElementType::Entity => "entity",
                super::types::LinkableElementType::Metric => "metric",
            };
            let properties: Vec<&str> = element.properties().iter().map(|p| p.as_str()).collect();
            rows.push([
                key.qualified_name(),
                element_type.to_string(),
                element
                    .defined_in()
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
                element
                    .join_path()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                properties.join(","),
            ]);
        }
    }
}

/// Insert keeping elements sorted and distinct by provenance.
///
/// Elements sharing a provenance collapse into one carrying the union of
/// their properties. The kept element is the one with the longer join path,
/// then the smaller one, so the result does not depend on insertion order.
fn insert_element<T: LinkableElement>(map: &mut BTreeMap<ElementPathKey, Vec<T>>, element: T) {
    let elements = map.entry(element.path_key()).or_default();
    let provenance = element.provenance();
    match elements.iter().position(|e| e.provenance() == provenance) {
        Some(i) => {
            let mut properties = elements[i].properties().clone();
            properties.extend(element.properties().iter().copied());
            let mut candidate = element;
            *candidate.properties_mut() = properties.clone();
            *elements[i].properties_mut() = properties;
            if (collapse_rank(&candidate), &candidate) < (collapse_rank(&elements[i]), &elements[i]) {
                elements[i] = candidate;
            }
        }
        None => elements.push(element),
    }
    elements.sort();
}

/// Lower ranks win when same-provenance elements collapse.
fn collapse_rank<T: LinkableElement>(element: &T) -> std::cmp::Reverse<usize> {
    std::cmp::Reverse(element.join_path().map(|p| p.len()).unwrap_or(0))
}

fn merge_maps<T: LinkableElement>(
    into: &mut BTreeMap<ElementPathKey, Vec<T>>,
    from: &BTreeMap<ElementPathKey, Vec<T>>,
) {
    for elements in from.values() {
        for element in elements {
            insert_element(into, element.clone());
        }
    }
}

fn intersect_maps<T: LinkableElement>(
    first: &LinkableElementSet,
    rest: &[LinkableElementSet],
    select: impl Fn(&LinkableElementSet) -> &BTreeMap<ElementPathKey, Vec<T>>,
) -> BTreeMap<ElementPathKey, Vec<T>> {
    let mut out = BTreeMap::new();
    for (key, elements) in select(first) {
        if !rest.iter().all(|s| select(s).contains_key(key)) {
            continue;
        }
        for element in elements
            .iter()
            .chain(rest.iter().flat_map(|s| select(s)[key].iter()))
        {
            insert_element(&mut out, element.clone());
        }
    }
    out
}

fn filter_map<T: LinkableElement>(
    map: &BTreeMap<ElementPathKey, Vec<T>>,
    filter: &LinkableElementFilter,
) -> BTreeMap<ElementPathKey, Vec<T>> {
    map.iter()
        .filter_map(|(key, elements)| {
            let kept: Vec<T> = elements
                .iter()
                .filter(|e| filter.accepts(e.properties()))
                .cloned()
                .collect();
            (!kept.is_empty()).then(|| (key.clone(), kept))
        })
        .collect()
}
