//! Shared manifests for unit and integration tests.
//!
//! The booking manifest:
//!
//! ```text
//! bookings_source --listing--> listings_latest --user--> users
//! views_source    --listing--> listings_latest
//! ```

use crate::model::{
    Dimension, Entity, Manifest, Measure, Metric, MetricInput, MetricTimeWindow, SemanticModel,
    TimeGranularity,
};
use crate::semantic::error::SemanticResult;
use crate::semantic::linkable::ResolverConfig;
use crate::semantic::metric_lookup::MetricLookup;

pub fn bookings_source() -> SemanticModel {
    SemanticModel::new("bookings_source")
        .with_node_relation("main.fct_bookings")
        .with_default_agg_time_dimension("ds")
        .with_entity(Entity::primary("booking"))
        .with_entity(Entity::foreign("listing"))
        .with_entity(Entity::foreign("guest"))
        .with_entity(Entity::foreign("host"))
        .with_dimension(Dimension::time("ds", TimeGranularity::Day))
        .with_dimension(Dimension::categorical("is_instant"))
        .with_measure(Measure::sum("bookings"))
        .with_measure(Measure::sum("booking_value"))
}

pub fn listings_latest() -> SemanticModel {
    SemanticModel::new("listings_latest")
        .with_node_relation("main.dim_listings")
        .with_entity(Entity::primary("listing"))
        .with_entity(Entity::foreign("user"))
        .with_dimension(Dimension::time("created_at", TimeGranularity::Day))
        .with_dimension(Dimension::categorical("country_latest"))
        .with_dimension(Dimension::categorical("capacity_latest"))
        .with_measure(Measure::sum("listings").with_agg_time_dimension("created_at"))
}

pub fn users() -> SemanticModel {
    SemanticModel::new("users")
        .with_entity(Entity::primary("user"))
        .with_dimension(Dimension::categorical("home_state"))
}

pub fn views_source() -> SemanticModel {
    SemanticModel::new("views_source")
        .with_default_agg_time_dimension("ds")
        .with_entity(Entity::primary("view"))
        .with_entity(Entity::foreign("listing"))
        .with_dimension(Dimension::time("ds", TimeGranularity::Day))
        .with_measure(Measure::sum("views"))
}

pub fn booking_metrics() -> Vec<Metric> {
    vec![
        Metric::simple("bookings", "bookings"),
        Metric::simple("booking_value", "booking_value"),
        Metric::simple("views", "views"),
        Metric::simple("listings", "listings"),
        Metric::ratio("bookings_per_view", "bookings", "views"),
        Metric::cumulative(
            "bookings_7d",
            "bookings",
            Some(MetricTimeWindow {
                count: 7,
                granularity: TimeGranularity::Day,
            }),
        ),
        Metric::derived(
            "average_booking_value",
            "booking_value / bookings",
            vec![MetricInput::new("booking_value"), MetricInput::new("bookings")],
        ),
        Metric::conversion("view_to_booking", "views", "bookings", "listing"),
    ]
}

pub fn booking_manifest() -> Manifest {
    Manifest::new(
        vec![bookings_source(), listings_latest(), users(), views_source()],
        booking_metrics(),
    )
}

pub fn booking_lookup() -> SemanticResult<MetricLookup> {
    booking_lookup_with(ResolverConfig::default())
}

pub fn booking_lookup_with(config: ResolverConfig) -> SemanticResult<MetricLookup> {
    MetricLookup::from_manifest(&booking_manifest(), config)
}
