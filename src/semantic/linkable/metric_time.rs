//! Granularity and date-part expansion of time dimensions, and the virtual
//! `metric_time` dimension built from it.

use std::collections::BTreeSet;

use crate::model::{DatePart, DimensionType, TimeGranularity};

use super::element_set::LinkableElementSet;
use super::types::{LinkableDimension, LinkableElementProperty, METRIC_TIME_ELEMENT_NAME};

/// One queryable form of a time dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeVariant {
    pub granularity: TimeGranularity,
    pub date_part: Option<DatePart>,
    /// Anything but the declared granularity without a date part.
    pub derived: bool,
}

/// Every granularity at or above `base`, each bare and with every date part
/// no finer than it.
pub fn time_variants(base: TimeGranularity) -> Vec<TimeVariant> {
    let mut variants = Vec::new();
    for granularity in base.and_coarser() {
        let parts = std::iter::once(None).chain(
            DatePart::ALL
                .into_iter()
                .filter(move |part| part.is_compatible_with(granularity))
                .map(Some),
        );
        for date_part in parts {
            variants.push(TimeVariant {
                granularity,
                date_part,
                derived: granularity != base || date_part.is_some(),
            });
        }
    }
    variants
}

/// `metric_time` at every variant of `base`.
pub fn metric_time_elements(base: TimeGranularity) -> LinkableElementSet {
    let dimensions = time_variants(base).into_iter().map(|variant| {
        let mut properties = BTreeSet::from([LinkableElementProperty::MetricTime]);
        if variant.derived {
            properties.insert(LinkableElementProperty::DerivedTimeGranularity);
        }
        LinkableDimension {
            element_name: METRIC_TIME_ELEMENT_NAME.to_string(),
            defined_in: None,
            dimension_type: DimensionType::Time,
            entity_links: Vec::new(),
            join_path: None,
            properties,
            time_granularity: Some(variant.granularity),
            date_part: variant.date_part,
        }
    });
    LinkableElementSet::from_elements(dimensions, Vec::new(), Vec::new())
}
