//! Resolve a [`MetricQuery`] by name into typed specs.
//!
//! Group-by items, filter references and order-by items are looked up in the
//! element set the requested metrics share. Names that do not resolve are
//! collected, classified and returned together with ranked suggestions.

use tracing::debug;

use crate::model::{FilterItemKind, MetricReference, WhereFilter};
use crate::semantic::linkable::{ElementPathKey, LinkableElementSet};
use crate::semantic::metric_lookup::{MetricAccessor, MetricLookup};
use crate::semantic::specs::GroupBySpec;

use super::group_by_name::match_path_key;
use super::query::{
    MetricQuery, OrderBySpec, OrderByTarget, OutputTarget, ResolvedQuery, ResolvedWhereFilter,
};
use super::suggestions::{rank_suggestions, SuggestionConfig};
use super::PlanResult;

/// Why a name could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    UnknownMetric,
    UnknownElement,
    /// More than one element answers the name.
    AmbiguousElement { origins: Vec<String> },
    /// Some requested metrics offer the element, these do not.
    InvalidForMetrics { metrics: Vec<String> },
    /// The requested metrics share no group-by items.
    EmptyIntersection,
    /// An order-by name that is neither a requested metric nor a group-by item.
    NotInQuery,
}

/// One unresolved input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionIssue {
    pub input: String,
    pub kind: IssueKind,
    pub suggestions: Vec<String>,
}

impl std::fmt::Display for ResolutionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            IssueKind::UnknownMetric => write!(f, "Unknown metric '{}'", self.input)?,
            IssueKind::UnknownElement => write!(f, "Unknown group-by item '{}'", self.input)?,
            IssueKind::AmbiguousElement { origins } => write!(
                f,
                "'{}' is ambiguous, it matches elements from: {}",
                self.input,
                origins.join("; ")
            )?,
            IssueKind::InvalidForMetrics { metrics } => write!(
                f,
                "'{}' is not available for metric(s): {}",
                self.input,
                metrics.join(", ")
            )?,
            IssueKind::EmptyIntersection => write!(
                f,
                "Metrics {} have no group-by items in common",
                self.input
            )?,
            IssueKind::NotInQuery => write!(
                f,
                "Order-by item '{}' is neither a requested metric nor a group-by item",
                self.input
            )?,
        }
        if !self.suggestions.is_empty() {
            write!(f, ". Suggestions: {}", self.suggestions.join(", "))?;
        }
        Ok(())
    }
}

/// Every unresolved input of one query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct QueryResolutionError {
    pub issues: Vec<ResolutionIssue>,
}

impl std::fmt::Display for QueryResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unable to satisfy query:")?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

impl QueryResolutionError {
    /// Issues about `input`, in reporting order.
    pub fn issues_for(&self, input: &str) -> Vec<&ResolutionIssue> {
        self.issues.iter().filter(|i| i.input == input).collect()
    }
}

pub struct QueryParser<'a> {
    lookup: &'a MetricLookup,
    suggestions: SuggestionConfig,
}

impl<'a> QueryParser<'a> {
    pub fn new(lookup: &'a MetricLookup) -> Self {
        Self {
            lookup,
            suggestions: SuggestionConfig::default(),
        }
    }

    pub fn with_suggestion_config(mut self, config: SuggestionConfig) -> Self {
        self.suggestions = config;
        self
    }

    pub fn parse(&self, query: &MetricQuery) -> PlanResult<ResolvedQuery> {
        let metrics = self.resolve_metrics(&query.metrics)?;
        let available = self.available_elements(&metrics)?;

        let mut issues = Vec::new();
        if metrics.len() > 1 && available.is_empty() && !query.group_by.is_empty() {
            let names: Vec<&str> = metrics.iter().map(|m| m.as_str()).collect();
            issues.push(ResolutionIssue {
                input: names.join(", "),
                kind: IssueKind::EmptyIntersection,
                suggestions: Vec::new(),
            });
            return Err(QueryResolutionError { issues }.into());
        }

        let mut group_by: Vec<GroupBySpec> = Vec::new();
        for input in &query.group_by {
            match self.resolve_element(input, None, &available, &metrics)? {
                Ok(key) => {
                    let spec = GroupBySpec::from_path_key(&key);
                    if !group_by.contains(&spec) {
                        group_by.push(spec);
                    }
                }
                Err(issue) => issues.push(issue),
            }
        }

        let mut where_filters = Vec::new();
        for template in &query.where_filters {
            let filter = WhereFilter::new(template.as_str());
            let mut items = Vec::new();
            for reference in filter.item_references() {
                let name = reference.to_group_by_name();
                match self.resolve_element(&name, Some(reference.kind), &available, &metrics)? {
                    Ok(key) => items.push(GroupBySpec::from_path_key(&key)),
                    Err(issue) => issues.push(issue),
                }
            }
            where_filters.push(ResolvedWhereFilter { filter, items });
        }

        let mut order_by = Vec::new();
        for input in &query.order_by {
            let trimmed = input.trim();
            let (descending, name) = match trimmed.strip_prefix('-') {
                Some(rest) => (true, rest.trim()),
                None => (false, trimmed),
            };
            let metric = MetricReference::new(name);
            if metrics.contains(&metric) {
                order_by.push(OrderBySpec {
                    target: OrderByTarget::Metric(metric),
                    descending,
                });
                continue;
            }
            match self.resolve_element(name, None, &available, &metrics)? {
                Ok(key) => {
                    let spec = GroupBySpec::from_path_key(&key);
                    if group_by.contains(&spec) {
                        order_by.push(OrderBySpec {
                            target: OrderByTarget::GroupBy(spec),
                            descending,
                        });
                    } else {
                        issues.push(ResolutionIssue {
                            input: name.to_string(),
                            kind: IssueKind::NotInQuery,
                            suggestions: self.order_by_candidates(&metrics, &group_by, name),
                        });
                    }
                }
                Err(issue) => issues.push(issue),
            }
        }

        if !issues.is_empty() {
            return Err(QueryResolutionError { issues }.into());
        }

        debug!(
            metrics = metrics.len(),
            group_by = group_by.len(),
            where_filters = where_filters.len(),
            "resolved query"
        );
        Ok(ResolvedQuery {
            metrics,
            group_by,
            where_filters,
            order_by,
            limit: query.limit,
            output: match &query.output_table {
                Some(table) => OutputTarget::Table(table.clone()),
                None => OutputTarget::Dataframe,
            },
        })
    }

    /// Registered metrics in request order, duplicates dropped.
    fn resolve_metrics(&self, names: &[String]) -> PlanResult<Vec<MetricReference>> {
        let mut metrics = Vec::new();
        let mut issues = Vec::new();
        for name in names {
            let reference = MetricReference::new(name.trim());
            match self.lookup.get_metric(&reference) {
                Ok(_) => {
                    if !metrics.contains(&reference) {
                        metrics.push(reference);
                    }
                }
                Err(e) if e.is_not_found() => {
                    let known = self.lookup.metric_references();
                    issues.push(ResolutionIssue {
                        input: name.clone(),
                        kind: IssueKind::UnknownMetric,
                        suggestions: rank_suggestions(
                            name,
                            known.iter().map(|m| m.as_str()),
                            &self.suggestions,
                        ),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        if !issues.is_empty() {
            return Err(QueryResolutionError { issues }.into());
        }
        Ok(metrics)
    }

    fn available_elements(&self, metrics: &[MetricReference]) -> PlanResult<LinkableElementSet> {
        if metrics.is_empty() {
            return Ok(self
                .lookup
                .linkable_elements_for_no_metrics_query(None)
                .only_unique_path_keys());
        }
        Ok(self.lookup.linkable_elements_for_metrics(metrics, None)?)
    }

    /// The path key `input` names, or the issue explaining why there is none.
    fn resolve_element(
        &self,
        input: &str,
        kind: Option<FilterItemKind>,
        available: &LinkableElementSet,
        metrics: &[MetricReference],
    ) -> PlanResult<Result<ElementPathKey, ResolutionIssue>> {
        let keys = available.path_keys();
        if let Some(key) = match_path_key(input, &keys, kind) {
            return Ok(Ok(key));
        }
        let kind = self.classify_unresolved(input, kind, metrics)?;
        let suggestions = rank_suggestions(
            input,
            available.as_spec_set().qualified_names(),
            &self.suggestions,
        );
        Ok(Err(ResolutionIssue {
            input: input.to_string(),
            kind,
            suggestions,
        }))
    }

    fn classify_unresolved(
        &self,
        input: &str,
        kind: Option<FilterItemKind>,
        metrics: &[MetricReference],
    ) -> PlanResult<IssueKind> {
        if metrics.is_empty() {
            let all = self.lookup.linkable_elements_for_no_metrics_query(None);
            if let Some(key) = match_path_key(input, &all.path_keys(), kind) {
                if all.element_count(&key) > 1 {
                    return Ok(IssueKind::AmbiguousElement {
                        origins: all.origins(&key),
                    });
                }
            }
            return Ok(IssueKind::UnknownElement);
        }

        let mut lacking = Vec::new();
        for metric in metrics {
            let set = self.lookup.resolver().metric_element_set(metric)?;
            match match_path_key(input, &set.path_keys(), kind) {
                Some(key) if set.element_count(&key) > 1 => {
                    return Ok(IssueKind::AmbiguousElement {
                        origins: set.origins(&key),
                    });
                }
                Some(_) => {}
                None => lacking.push(metric.to_string()),
            }
        }
        if lacking.is_empty() || lacking.len() == metrics.len() {
            Ok(IssueKind::UnknownElement)
        } else {
            Ok(IssueKind::InvalidForMetrics { metrics: lacking })
        }
    }

    fn order_by_candidates(
        &self,
        metrics: &[MetricReference],
        group_by: &[GroupBySpec],
        input: &str,
    ) -> Vec<String> {
        let names = metrics
            .iter()
            .map(|m| m.to_string())
            .chain(group_by.iter().map(|g| g.qualified_name()));
        rank_suggestions(input, names, &self.suggestions)
    }
}
