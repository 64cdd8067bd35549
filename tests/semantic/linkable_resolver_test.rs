use std::collections::BTreeSet;

use metrica::model::{
    Entity, EntityReference, Manifest, MeasureReference, Metric, MetricReference,
    SemanticModelReference, TimeGranularity,
};
use metrica::semantic::linkable::{
    ElementPathKey, LinkableElement, LinkableElementFilter, LinkableElementProperty,
    LinkableElementSet, LinkableElementType, ResolverConfig,
};
use metrica::semantic::{MetricLookup, SemanticModelAccessor};
use metrica::test_fixtures::{
    booking_lookup, booking_lookup_with, booking_metrics, bookings_source, listings_latest, users,
    views_source,
};

use LinkableElementProperty::*;

fn links(names: &[&str]) -> Vec<EntityReference> {
    names.iter().map(|n| EntityReference::new(*n)).collect()
}

fn dimension_key(name: &str, entity_links: &[&str]) -> ElementPathKey {
    ElementPathKey::new(name, LinkableElementType::Dimension, links(entity_links))
}

fn time_key(name: &str, entity_links: &[&str], granularity: TimeGranularity) -> ElementPathKey {
    ElementPathKey::new(name, LinkableElementType::TimeDimension, links(entity_links))
        .with_time(Some(granularity), None)
}

fn metric_key(name: &str, entity_links: &[&str]) -> ElementPathKey {
    ElementPathKey::new(name, LinkableElementType::Metric, links(entity_links))
}

fn metric_set(lookup: &MetricLookup, metric: &str) -> LinkableElementSet {
    lookup
        .linkable_elements_for_metrics(&[MetricReference::new(metric)], None)
        .unwrap()
}

fn properties_of(set: &LinkableElementSet, key: &ElementPathKey) -> BTreeSet<LinkableElementProperty> {
    let dimensions = set.path_key_to_linkable_dimensions();
    let elements = dimensions.get(key).unwrap_or_else(|| panic!("no element {}", key));
    assert_eq!(elements.len(), 1);
    elements[0].properties().clone()
}

#[test]
fn test_single_hop_join_reaches_listing_dimensions() {
    let lookup = booking_lookup().unwrap();
    let set = metric_set(&lookup, "bookings");

    let country = dimension_key("country_latest", &["listing"]);
    let dimensions = set.path_key_to_linkable_dimensions();
    let element = &dimensions[&country][0];
    assert_eq!(element.properties, BTreeSet::from([Joined]));
    assert_eq!(
        element.defined_in,
        Some(SemanticModelReference::new("listings_latest"))
    );
    assert_eq!(
        element.join_path.as_ref().map(|p| p.to_string()),
        Some("listings_latest(listing)".to_string())
    );

    let local = dimension_key("is_instant", &[]);
    assert_eq!(properties_of(&set, &local), BTreeSet::from([Local]));
    assert!(dimensions[&local][0].join_path.is_none());
    assert_eq!(
        properties_of(&set, &dimension_key("is_instant", &["booking"])),
        BTreeSet::from([Local, LocalLinked])
    );
}

#[test]
fn test_fan_out_join_is_not_offered() {
    // listing is no longer unique in listings_latest.
    let mut listings = listings_latest();
    listings.entities = vec![
        Entity::primary("listing_row"),
        Entity::foreign("listing"),
        Entity::foreign("user"),
    ];
    let manifest = Manifest::new(
        vec![bookings_source(), listings, users(), views_source()],
        booking_metrics(),
    );
    let lookup = MetricLookup::from_manifest(&manifest, ResolverConfig::default()).unwrap();
    let set = metric_set(&lookup, "bookings");
    assert!(!set.contains_key(&dimension_key("country_latest", &["listing"])));
    assert!(!set.contains_key(&dimension_key("home_state", &["listing", "user"])));
}

#[test]
fn test_multi_hop_depends_on_max_entity_links() {
    let home_state = dimension_key("home_state", &["listing", "user"]);

    let lookup = booking_lookup().unwrap();
    let set = metric_set(&lookup, "bookings");
    assert_eq!(properties_of(&set, &home_state), BTreeSet::from([Joined, MultiHop]));
    assert_eq!(
        set.path_key_to_linkable_dimensions()[&home_state][0]
            .join_path
            .as_ref()
            .map(|p| p.to_string()),
        Some("listings_latest(listing) -> users(user)".to_string())
    );

    let single = booking_lookup_with(ResolverConfig {
        max_entity_links: 1,
        ..ResolverConfig::default()
    })
    .unwrap();
    let set = metric_set(&single, "bookings");
    assert!(!set.contains_key(&home_state));
    assert!(set.contains_key(&dimension_key("country_latest", &["listing"])));
}

#[test]
fn test_zero_entity_links_leaves_local_elements_only() {
    let lookup = booking_lookup_with(ResolverConfig {
        max_entity_links: 0,
        ..ResolverConfig::default()
    })
    .unwrap();
    let set = metric_set(&lookup, "bookings");
    assert!(set.contains_key(&dimension_key("is_instant", &[])));
    assert!(!set.contains_key(&dimension_key("country_latest", &["listing"])));
    assert!(set.path_key_to_linkable_metrics().is_empty());
}

#[test]
fn test_metric_time_granularities() {
    let lookup = booking_lookup().unwrap();
    let set = metric_set(&lookup, "bookings");

    assert_eq!(
        properties_of(&set, &time_key("metric_time", &[], TimeGranularity::Day)),
        BTreeSet::from([MetricTime])
    );
    for granularity in [
        TimeGranularity::Week,
        TimeGranularity::Month,
        TimeGranularity::Quarter,
        TimeGranularity::Year,
    ] {
        assert_eq!(
            properties_of(&set, &time_key("metric_time", &[], granularity)),
            BTreeSet::from([MetricTime, DerivedTimeGranularity])
        );
    }
}

#[test]
fn test_cumulative_metric_drops_derived_metric_time() {
    let lookup = booking_lookup().unwrap();
    let set = metric_set(&lookup, "bookings_7d");
    assert!(set.contains_key(&time_key("metric_time", &[], TimeGranularity::Day)));
    assert!(!set.contains_key(&time_key("metric_time", &[], TimeGranularity::Week)));
    assert!(!set.contains_key(&time_key("metric_time", &[], TimeGranularity::Month)));
    // Only metric_time is restricted.
    assert!(set.contains_key(&time_key("ds", &[], TimeGranularity::Month)));
}

#[test]
fn test_ambiguous_key_dropped_for_ratio_metric() {
    let lookup = booking_lookup().unwrap();
    let metric = MetricReference::new("bookings_per_view");
    let ds = time_key("ds", &[], TimeGranularity::Day);

    let combined = lookup.resolver().metric_element_set(&metric).unwrap();
    assert_eq!(combined.element_count(&ds), 2);
    assert_eq!(
        combined.origins(&ds),
        vec!["bookings_source".to_string(), "views_source".to_string()]
    );

    let set = metric_set(&lookup, "bookings_per_view");
    assert!(!set.contains_key(&ds));
    // Both inputs reach the same listings column.
    assert_eq!(
        set.element_count(&dimension_key("country_latest", &["listing"])),
        1
    );
    assert!(!set.contains_key(&dimension_key("is_instant", &[])));
}

#[test]
fn test_shared_element_keeps_properties_of_every_input() {
    // country_latest is joined for bookings but local for listings.
    let mut metrics = booking_metrics();
    metrics.push(Metric::ratio("bookings_per_listing", "bookings", "listings"));
    let manifest = Manifest::new(
        vec![bookings_source(), listings_latest(), users(), views_source()],
        metrics,
    );
    let lookup = MetricLookup::from_manifest(&manifest, ResolverConfig::default()).unwrap();
    let metric = [MetricReference::new("bookings_per_listing")];
    let country = dimension_key("country_latest", &["listing"]);

    let combined = lookup.resolver().metric_element_set(&metric[0]).unwrap();
    let elements = &combined.path_key_to_linkable_dimensions()[&country];
    assert_eq!(elements.len(), 1);
    assert_eq!(
        elements[0].properties,
        BTreeSet::from([Local, LocalLinked, Joined])
    );
    assert_eq!(
        elements[0].join_path.as_ref().map(|p| p.to_string()),
        Some("listings_latest(listing)".to_string())
    );

    let joined = lookup
        .linkable_elements_for_metrics(&metric, Some(&LinkableElementFilter::new(&[Joined], &[])))
        .unwrap();
    assert!(joined.contains_key(&country));
    let without_joins = lookup
        .linkable_elements_for_metrics(
            &metric,
            Some(&LinkableElementFilter::new(&LinkableElementProperty::ALL, &[Joined])),
        )
        .unwrap();
    assert!(!without_joins.contains_key(&country));
}

#[test]
fn test_merge_key_set_is_order_independent() {
    let lookup = booking_lookup().unwrap();
    let bookings = metric_set(&lookup, "bookings");
    let views = metric_set(&lookup, "views");
    let listings = metric_set(&lookup, "listings");
    let forward = LinkableElementSet::merge_by_path_key([&bookings, &views, &listings]);
    let backward = LinkableElementSet::merge_by_path_key([&listings, &views, &bookings]);
    assert_eq!(forward.path_keys(), backward.path_keys());
    assert_eq!(forward, backward);
}

#[test]
fn test_metrics_usable_as_group_by_items() {
    let lookup = booking_lookup().unwrap();
    let set = metric_set(&lookup, "bookings");

    let views = metric_key("views", &["listing"]);
    let metrics = set.path_key_to_linkable_metrics();
    assert_eq!(metrics[&views].len(), 1);
    assert!(metrics[&views][0].join_path.is_none());
    assert_eq!(metrics[&views][0].properties, BTreeSet::from([Metric]));

    // Joined through listings_latest and grouped by its user entity.
    let listings = metric_key("listings", &["listing", "user"]);
    assert_eq!(metrics[&listings][0].properties, BTreeSet::from([Joined, Metric]));

    // Cumulative and conversion metrics are never group-by items.
    assert!(!set.contains_key(&metric_key("bookings_7d", &["listing"])));
    assert!(!set.contains_key(&metric_key("view_to_booking", &["listing"])));
}

#[test]
fn test_listings_measure_joined_elements_snapshot() {
    let lookup = booking_lookup().unwrap();
    let set = lookup
        .linkable_elements_for_measure(
            &MeasureReference::new("listings"),
            Some(&LinkableElementFilter::new(&[Joined], &[])),
        )
        .unwrap();
    insta::assert_snapshot!(set.dump(), @r"
    qualified_name   | type      | defined_in | join_path   | properties
    user__home_state | dimension | users      | users(user) | joined
    ");
}

#[test]
fn test_unknown_measure_and_metric() {
    let lookup = booking_lookup().unwrap();
    assert!(lookup
        .linkable_elements_for_measure(&MeasureReference::new("clicks"), None)
        .unwrap_err()
        .is_not_found());
    assert!(lookup
        .linkable_elements_for_metrics(&[MetricReference::new("clicks")], None)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_no_metric_query_elements() {
    let lookup = booking_lookup().unwrap();
    let set = lookup.linkable_elements_for_no_metrics_query(None);

    assert!(set.contains_key(&time_key("metric_time", &[], TimeGranularity::Day)));
    assert!(set.contains_key(&dimension_key("country_latest", &["listing"])));
    assert!(set.contains_key(&dimension_key("home_state", &[])));
    // Local only.
    assert!(!set.contains_key(&dimension_key("home_state", &["listing", "user"])));
    assert_eq!(set.element_count(&time_key("ds", &[], TimeGranularity::Day)), 2);
}

#[test]
fn test_join_paths_never_revisit_a_model() {
    let lookup = booking_lookup().unwrap();
    let index = lookup.semantic_model_index();
    for measure in index.measure_references() {
        let origin = index.get_semantic_model_for_measure(&measure).unwrap().reference();
        let set = lookup.linkable_elements_for_measure(&measure, None).unwrap();
        let paths = set
            .path_key_to_linkable_dimensions()
            .values()
            .flatten()
            .filter_map(|e| e.join_path.clone())
            .chain(
                set.path_key_to_linkable_entities()
                    .values()
                    .flatten()
                    .filter_map(|e| e.join_path.clone()),
            )
            .chain(
                set.path_key_to_linkable_metrics()
                    .values()
                    .flatten()
                    .filter_map(|e| e.join_path.clone()),
            );
        for path in paths {
            let models = path.semantic_models();
            let distinct: BTreeSet<_> = models.iter().collect();
            assert_eq!(distinct.len(), models.len(), "{}", path);
            assert!(!path.contains_model(&origin), "{} from {}", path, origin);
            assert!(path.len() <= ResolverConfig::default().max_entity_links);
        }
    }
}

#[test]
fn test_merge_with_itself_is_identity() {
    let lookup = booking_lookup().unwrap();
    let set = metric_set(&lookup, "bookings");
    assert_eq!(LinkableElementSet::merge_by_path_key([&set, &set]), set);
    assert_eq!(
        LinkableElementSet::merge_by_path_key([&set, &LinkableElementSet::default()]),
        set
    );
}

#[test]
fn test_multi_metric_result_is_subset_of_each() {
    let lookup = booking_lookup().unwrap();
    let names = ["bookings", "views", "listings"];
    let references: Vec<MetricReference> = names.iter().map(|n| MetricReference::new(*n)).collect();
    let both = lookup
        .linkable_elements_for_metrics(&references, None)
        .unwrap();
    assert!(!both.is_empty());
    for name in names {
        let keys = metric_set(&lookup, name).path_keys();
        assert!(both.path_keys().is_subset(&keys), "not a subset of {}", name);
    }
}

#[test]
fn test_filters_only_remove_keys() {
    let lookup = booking_lookup().unwrap();
    let bookings = [MetricReference::new("bookings")];
    let all = lookup.linkable_elements_for_metrics(&bookings, None).unwrap();
    for property in LinkableElementProperty::ALL {
        for filter in [
            LinkableElementFilter::new(&[property], &[]),
            LinkableElementFilter::default().without_all_of(&[property]),
            LinkableElementFilter::new(&LinkableElementProperty::ALL, &[property]),
        ] {
            let filtered = lookup
                .linkable_elements_for_metrics(&bookings, Some(&filter))
                .unwrap();
            assert!(filtered.path_keys().is_subset(&all.path_keys()));
        }
    }
    let no_multi_hop = lookup
        .linkable_elements_for_metrics(
            &bookings,
            Some(&LinkableElementFilter::new(&LinkableElementProperty::ALL, &[MultiHop])),
        )
        .unwrap();
    assert!(!no_multi_hop.contains_key(&dimension_key("home_state", &["listing", "user"])));
}

#[test]
fn test_time_dimensions_offer_every_coarser_granularity() {
    let lookup = booking_lookup().unwrap();
    let set = metric_set(&lookup, "bookings");
    for granularity in TimeGranularity::Day.and_coarser() {
        assert!(set.contains_key(&time_key("ds", &[], granularity)));
        assert!(set.contains_key(&time_key("created_at", &["listing"], granularity)));
    }
    assert!(!set.contains_key(&time_key("ds", &[], TimeGranularity::Hour)));
}

#[test]
fn test_resolution_is_deterministic() {
    let first = booking_lookup().unwrap();
    let second = booking_lookup().unwrap();
    for metric in ["bookings", "bookings_per_view", "average_booking_value"] {
        assert_eq!(
            metric_set(&first, metric).dump(),
            metric_set(&second, metric).dump()
        );
    }
    assert_eq!(
        first.linkable_elements_for_no_metrics_query(None).dump(),
        second.linkable_elements_for_no_metrics_query(None).dump()
    );
}
