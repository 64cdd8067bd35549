use metrica::model::{
    Dimension, Entity, EntityReference, EntityType, SemanticModel, SemanticModelReference,
    TimeGranularity,
};
use metrica::semantic::join_evaluator::{entity_pair_rule, EntityPairRule, MAX_JOIN_HOPS};
use metrica::semantic::{Cardinality, JoinEvaluator, SemanticModelIndex};
use metrica::test_fixtures::{bookings_source, listings_latest, users, views_source};

fn model(name: &str) -> SemanticModelReference {
    SemanticModelReference::new(name)
}

fn entity(name: &str) -> EntityReference {
    EntityReference::new(name)
}

fn booking_evaluator() -> JoinEvaluator {
    let index =
        SemanticModelIndex::new(&[bookings_source(), listings_latest(), users(), views_source()])
            .unwrap();
    JoinEvaluator::new(&index)
}

#[test]
fn test_fan_out_table_is_exhaustive() {
    let mut valid = 0;
    let mut invalid = 0;
    for left in EntityType::ALL {
        for right in EntityType::ALL {
            match entity_pair_rule(left, right) {
                EntityPairRule::Valid(_) | EntityPairRule::RequiresRightValidityWindow(_) => {
                    valid += 1
                }
                EntityPairRule::Invalid(cardinality) => {
                    assert!(cardinality.causes_fanout());
                    invalid += 1
                }
            }
        }
    }
    assert_eq!(valid + invalid, 16);
    // Foreign right side (4) plus natural to natural.
    assert_eq!(invalid, 5);
}

#[test]
fn test_foreign_to_primary_is_many_to_one() {
    let evaluator = booking_evaluator();
    assert_eq!(
        evaluator.semantic_model_join_type(
            &model("bookings_source"),
            &model("listings_latest"),
            &entity("listing")
        ),
        Some(Cardinality::ManyToOne)
    );
}

#[test]
fn test_joining_into_foreign_is_rejected() {
    let evaluator = booking_evaluator();
    assert!(!evaluator.is_valid_semantic_model_join(
        &model("listings_latest"),
        &model("bookings_source"),
        &entity("listing")
    ));
    assert!(!evaluator.is_valid_semantic_model_join(
        &model("bookings_source"),
        &model("views_source"),
        &entity("listing")
    ));
}

#[test]
fn test_missing_entity_is_not_joinable() {
    let evaluator = booking_evaluator();
    assert_eq!(
        evaluator.semantic_model_join_type(
            &model("bookings_source"),
            &model("users"),
            &entity("guest")
        ),
        None
    );
    assert!(!evaluator.is_valid_semantic_model_join(
        &model("bookings_source"),
        &model("nowhere"),
        &entity("listing")
    ));
}

#[test]
fn test_natural_target_needs_validity_window() {
    let listings_scd = |with_window: bool| {
        let mut valid_from = Dimension::time("valid_from", TimeGranularity::Day);
        let mut valid_to = Dimension::time("valid_to", TimeGranularity::Day);
        if with_window {
            valid_from = valid_from.with_validity(true, false);
            valid_to = valid_to.with_validity(false, true);
        }
        SemanticModel::new("listings_scd")
            .with_primary_entity("listing_version")
            .with_entity(Entity::natural("listing"))
            .with_dimension(valid_from)
            .with_dimension(valid_to)
    };

    for (with_window, expected) in [(false, None), (true, Some(Cardinality::ManyToOne))] {
        let index = SemanticModelIndex::new(&[bookings_source(), listings_scd(with_window)])
            .unwrap();
        let evaluator = JoinEvaluator::new(&index);
        assert_eq!(
            evaluator.semantic_model_join_type(
                &model("bookings_source"),
                &model("listings_scd"),
                &entity("listing")
            ),
            expected
        );
    }
}

#[test]
fn test_two_validity_windows_never_join() {
    let scd = |name: &str, entity_type: EntityType| {
        SemanticModel::new(name)
            .with_primary_entity(format!("{}_version", name))
            .with_entity(Entity::new("listing", entity_type))
            .with_dimension(
                Dimension::time("valid_from", TimeGranularity::Day).with_validity(true, false),
            )
            .with_dimension(
                Dimension::time("valid_to", TimeGranularity::Day).with_validity(false, true),
            )
    };
    let index = SemanticModelIndex::new(&[
        scd("a_scd", EntityType::Unique),
        scd("b_scd", EntityType::Unique),
    ])
    .unwrap();
    let evaluator = JoinEvaluator::new(&index);
    assert!(!evaluator.is_valid_semantic_model_join(
        &model("a_scd"),
        &model("b_scd"),
        &entity("listing")
    ));
    assert_eq!(evaluator.edge_count(), 0);
}

#[test]
fn test_outgoing_joins_sorted() {
    let evaluator = booking_evaluator();
    let joins: Vec<(String, String)> = evaluator
        .outgoing_joins(&model("bookings_source"))
        .into_iter()
        .map(|(target, edge)| (target.to_string(), edge.entity.to_string()))
        .collect();
    assert_eq!(
        joins,
        vec![("listings_latest".to_string(), "listing".to_string())]
    );
    assert!(evaluator.outgoing_joins(&model("users")).is_empty());
}

#[test]
fn test_joinable_models_bfs() {
    let evaluator = booking_evaluator();

    let single = evaluator.get_joinable_semantic_models(&model("bookings_source"), false);
    assert_eq!(single.len(), 1);
    assert!(single.contains_key(&model("listings_latest")));

    let multi = evaluator.get_joinable_semantic_models(&model("bookings_source"), true);
    assert_eq!(multi.len(), 2);
    let path = &multi[&model("users")];
    assert_eq!(path.len(), MAX_JOIN_HOPS);
    assert_eq!(path.to_string(), "listings_latest(listing) -> users(user)");
    assert_eq!(path.entity_links(), vec![entity("listing"), entity("user")]);
}

fn evaluator_for(models: &[SemanticModel]) -> JoinEvaluator {
    JoinEvaluator::new(&SemanticModelIndex::new(models).unwrap())
}

#[test]
fn test_direct_join_beats_two_hop_path() {
    // orders reaches regions directly and through stores.
    let evaluator = evaluator_for(&[
        SemanticModel::new("orders")
            .with_entity(Entity::primary("order"))
            .with_entity(Entity::foreign("store"))
            .with_entity(Entity::foreign("region")),
        SemanticModel::new("stores")
            .with_entity(Entity::primary("store"))
            .with_entity(Entity::foreign("region")),
        SemanticModel::new("regions").with_entity(Entity::primary("region")),
    ]);

    let reachable = evaluator.get_joinable_semantic_models(&model("orders"), true);
    assert_eq!(reachable.len(), 2);
    assert_eq!(reachable[&model("regions")].to_string(), "regions(region)");
    assert_eq!(reachable[&model("stores")].to_string(), "stores(store)");
}

#[test]
fn test_equal_length_paths_prefer_smaller_names() {
    // Two hops to countries, through cities or through warehouses.
    let evaluator = evaluator_for(&[
        SemanticModel::new("shipments")
            .with_entity(Entity::primary("shipment"))
            .with_entity(Entity::foreign("warehouse"))
            .with_entity(Entity::foreign("city")),
        SemanticModel::new("warehouses")
            .with_entity(Entity::primary("warehouse"))
            .with_entity(Entity::foreign("country")),
        SemanticModel::new("cities")
            .with_entity(Entity::primary("city"))
            .with_entity(Entity::foreign("country")),
        SemanticModel::new("countries").with_entity(Entity::primary("country")),
    ]);

    let reachable = evaluator.get_joinable_semantic_models(&model("shipments"), true);
    assert_eq!(
        reachable[&model("countries")].to_string(),
        "cities(city) -> countries(country)"
    );

    // One hop to carriers on either of two entities.
    let evaluator = evaluator_for(&[
        SemanticModel::new("parcels")
            .with_entity(Entity::primary("parcel"))
            .with_entity(Entity::foreign("carrier_code"))
            .with_entity(Entity::foreign("carrier")),
        SemanticModel::new("carriers")
            .with_entity(Entity::primary("carrier_code"))
            .with_entity(Entity::unique("carrier")),
    ]);
    let reachable = evaluator.get_joinable_semantic_models(&model("parcels"), false);
    assert_eq!(reachable[&model("carriers")].to_string(), "carriers(carrier)");
    assert_eq!(
        evaluator
            .outgoing_joins(&model("parcels"))
            .into_iter()
            .map(|(_, edge)| edge.entity.to_string())
            .collect::<Vec<_>>(),
        vec!["carrier", "carrier_code"]
    );
}

#[test]
fn test_joinable_models_never_return_to_origin() {
    let evaluator = booking_evaluator();
    let reachable = evaluator.get_joinable_semantic_models(&model("views_source"), true);
    assert!(!reachable.contains_key(&model("views_source")));
    let names: Vec<String> = reachable.keys().map(|m| m.to_string()).collect();
    assert_eq!(names, vec!["listings_latest", "users"]);
}

#[test]
fn test_instance_set_join() {
    let evaluator = booking_evaluator();
    let listing = entity("listing");

    assert!(evaluator.is_valid_instance_set_join(
        &[model("bookings_source"), model("views_source")],
        &[model("listings_latest")],
        &listing
    ));
    // users does not carry listing, but bookings_source does.
    assert!(evaluator.is_valid_instance_set_join(
        &[model("users"), model("bookings_source")],
        &[model("listings_latest")],
        &listing
    ));
    assert!(!evaluator.is_valid_instance_set_join(
        &[model("users")],
        &[model("listings_latest")],
        &listing
    ));
    assert!(!evaluator.is_valid_instance_set_join(
        &[model("bookings_source")],
        &[model("listings_latest"), model("views_source")],
        &listing
    ));
    assert!(!evaluator.is_valid_instance_set_join(&[model("bookings_source")], &[], &listing));
}
