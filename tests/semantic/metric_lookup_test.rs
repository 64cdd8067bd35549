use metrica::model::{
    EntityReference, Manifest, Metric, MetricInput, MetricReference, TimeGranularity,
};
use metrica::semantic::{
    MetricAccessor, MetricLookup, MetricLookupBuilder, ResolverConfig, SemanticError,
    SemanticModelIndex,
};
use metrica::test_fixtures::{
    booking_lookup, booking_manifest, bookings_source, listings_latest, users, views_source,
};

fn manifest_with(metrics: Vec<Metric>) -> Manifest {
    let mut manifest = booking_manifest();
    manifest.metrics = metrics;
    manifest
}

fn build(manifest: &Manifest) -> Result<MetricLookup, SemanticError> {
    MetricLookup::from_manifest(manifest, ResolverConfig::default())
}

#[test]
fn test_metrics_registered_in_name_order() {
    let lookup = booking_lookup().unwrap();
    let names: Vec<String> = lookup
        .metric_references()
        .into_iter()
        .map(|m| m.to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "average_booking_value",
            "booking_value",
            "bookings",
            "bookings_7d",
            "bookings_per_view",
            "listings",
            "view_to_booking",
            "views",
        ]
    );
}

#[test]
fn test_duplicate_metric_rejected() {
    let err = build(&manifest_with(vec![
        Metric::simple("bookings", "bookings"),
        Metric::simple("bookings", "booking_value"),
    ]))
    .unwrap_err();
    assert_eq!(err, SemanticError::DuplicateMetric("bookings".to_string()));
}

#[test]
fn test_metric_on_missing_measure_rejected() {
    let err = build(&manifest_with(vec![Metric::simple("clicks", "clicks")])).unwrap_err();
    assert_eq!(
        err,
        SemanticError::NonExistentMeasure {
            metric: "clicks".to_string(),
            measure: "clicks".to_string(),
        }
    );
}

#[test]
fn test_unknown_input_metric_rejected() {
    let err = build(&manifest_with(vec![
        Metric::simple("bookings", "bookings"),
        Metric::derived(
            "bookings_growth",
            "bookings - bookings_last_week",
            vec![
                MetricInput::new("bookings"),
                MetricInput::new("bookings_last_week"),
            ],
        ),
    ]))
    .unwrap_err();
    assert_eq!(
        err,
        SemanticError::UnknownMetricInput {
            metric: "bookings_growth".to_string(),
            input: "bookings_last_week".to_string(),
        }
    );
}

#[test]
fn test_manifest_order_does_not_matter() {
    let lookup = build(&manifest_with(vec![
        Metric::ratio("bookings_per_view", "bookings", "views"),
        Metric::simple("views", "views"),
        Metric::simple("bookings", "bookings"),
    ]))
    .unwrap();
    assert_eq!(lookup.metric_references().len(), 3);
}

#[test]
fn test_builder_requires_inputs_first() {
    let index =
        SemanticModelIndex::new(&[bookings_source(), listings_latest(), users(), views_source()])
            .unwrap();
    let mut builder = MetricLookupBuilder::new(index);
    let err = builder
        .add_metric(Metric::ratio("bookings_per_view", "bookings", "views"))
        .unwrap_err();
    assert!(matches!(err, SemanticError::UnknownMetricInput { ref input, .. } if input == "bookings"));

    builder.add_metric(Metric::simple("bookings", "bookings")).unwrap();
    builder.add_metric(Metric::simple("views", "views")).unwrap();
    builder
        .add_metric(Metric::ratio("bookings_per_view", "bookings", "views"))
        .unwrap();
    assert_eq!(
        builder.add_metric(Metric::simple("views", "views")).unwrap_err(),
        SemanticError::DuplicateMetric("views".to_string())
    );

    let lookup = builder.build(ResolverConfig::default()).unwrap();
    assert!(lookup
        .linkable_elements_for_metrics(&[MetricReference::new("bookings_per_view")], None)
        .is_ok());
}

#[test]
fn test_metric_cycle_rejected() {
    let err = build(&manifest_with(vec![
        Metric::simple("bookings", "bookings"),
        Metric::derived(
            "a",
            "b + bookings",
            vec![MetricInput::new("b"), MetricInput::new("bookings")],
        ),
        Metric::derived("b", "a * 2", vec![MetricInput::new("a")]),
    ]))
    .unwrap_err();
    assert_eq!(
        err,
        SemanticError::MetricCycle(vec!["a".to_string(), "b".to_string()])
    );
    assert!(err.to_string().contains("a, b"));
}

#[test]
fn test_input_measures_follow_nested_metrics() {
    let lookup = booking_lookup().unwrap();
    let measures = |metric: &str| -> Vec<String> {
        lookup
            .input_measures(&MetricReference::new(metric))
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect()
    };
    assert_eq!(measures("average_booking_value"), vec!["booking_value", "bookings"]);
    assert_eq!(measures("bookings_per_view"), vec!["bookings", "views"]);
    assert_eq!(measures("bookings_7d"), vec!["bookings"]);
    assert_eq!(measures("view_to_booking"), vec!["views", "bookings"]);
}

#[test]
fn test_get_metrics_reports_first_missing() {
    let lookup = booking_lookup().unwrap();
    let found = lookup
        .get_metrics(&[MetricReference::new("bookings"), MetricReference::new("views")])
        .unwrap();
    assert_eq!(found.len(), 2);

    let err = lookup
        .get_metrics(&[MetricReference::new("bookings"), MetricReference::new("revenue")])
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Unknown metric 'revenue'");
}

#[test]
fn test_valid_agg_time_dimensions() {
    let lookup = booking_lookup().unwrap();

    let specs = lookup
        .get_valid_agg_time_dimensions_for_metric(&MetricReference::new("bookings"))
        .unwrap();
    let granularities: Vec<Option<TimeGranularity>> =
        specs.iter().map(|s| s.time_granularity).collect();
    assert_eq!(
        granularities,
        vec![
            Some(TimeGranularity::Day),
            Some(TimeGranularity::Week),
            Some(TimeGranularity::Month),
            Some(TimeGranularity::Quarter),
            Some(TimeGranularity::Year),
        ]
    );
    for spec in &specs {
        assert_eq!(spec.element_name, "ds");
        assert_eq!(spec.entity_links, vec![EntityReference::new("booking")]);
    }

    let listings = lookup
        .get_valid_agg_time_dimensions_for_metric(&MetricReference::new("listings"))
        .unwrap();
    assert_eq!(listings[0].element_name, "created_at");
    assert_eq!(listings[0].entity_links, vec![EntityReference::new("listing")]);

    // bookings and views aggregate by different models' ds.
    assert!(lookup
        .get_valid_agg_time_dimensions_for_metric(&MetricReference::new("bookings_per_view"))
        .unwrap()
        .is_empty());
    assert!(lookup
        .get_valid_agg_time_dimensions_for_metric(&MetricReference::new("nope"))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_lookup_from_json_manifest() {
    let json = r#"{
        "semantic_models": [
            {
                "name": "orders",
                "node_relation": "shop.fct_orders",
                "defaults": {"agg_time_dimension": "ordered_at"},
                "entities": [
                    {"name": "order", "type": "primary"},
                    {"name": "customer", "type": "foreign"}
                ],
                "dimensions": [
                    {"name": "ordered_at", "type": "time", "type_params": {"time_granularity": "day"}},
                    {"name": "status", "type": "categorical"}
                ],
                "measures": [
                    {"name": "order_total", "agg": "sum"},
                    {"name": "order_count", "agg": "count", "expr": "1"}
                ]
            },
            {
                "name": "customers",
                "entities": [{"name": "customer", "type": "primary"}],
                "dimensions": [{"name": "region", "type": "categorical"}]
            }
        ],
        "metrics": [
            {"name": "revenue", "type": "simple", "measure": {"name": "order_total"}},
            {"name": "orders", "type": "simple", "measure": {"name": "order_count"}},
            {
                "name": "average_order_value",
                "type": "ratio",
                "numerator": {"name": "revenue"},
                "denominator": {"name": "orders"}
            }
        ]
    }"#;

    let manifest = Manifest::from_json_str(json).unwrap();
    assert_eq!(manifest.content_hash().unwrap().len(), 64);

    let lookup = build(&manifest).unwrap();
    let set = lookup
        .linkable_elements_for_metrics(&[MetricReference::new("average_order_value")], None)
        .unwrap();
    let names = set.as_spec_set().qualified_names();
    assert!(names.contains(&"customer__region".to_string()));
    assert!(names.contains(&"metric_time__month".to_string()));
    assert!(names.contains(&"status".to_string()));
    assert_eq!(lookup.join_evaluator().edge_count(), 1);
}
