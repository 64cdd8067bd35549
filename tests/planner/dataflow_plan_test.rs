use metrica::planner::{DataflowPlan, MetricQuery, PlanError, QueryPlanner};
use metrica::semantic::MetricLookup;
use metrica::test_fixtures::booking_lookup;

fn plan(lookup: &MetricLookup, query: MetricQuery) -> DataflowPlan {
    QueryPlanner::new(lookup).plan(&query).unwrap()
}

#[test]
fn test_simple_metric_with_joined_dimension() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["bookings"])
            .group_by(["metric_time__day", "listing__country_latest"]),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_6)
      ComputeMetrics (cm_5): bookings
        AggregateMeasures (am_4): bookings
          FilterElements (fe_3): bookings, metric_time__day, listing__country_latest
            JoinOnEntities (jo_2): on listing
              ReadSqlSource (rss_0): bookings_source (main.fct_bookings)
              ReadSqlSource (rss_1): listings_latest (main.dim_listings)
    ");
}

#[test]
fn test_multi_hop_join_nests() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["bookings"])
            .group_by(["listing__user__home_state"]),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_8)
      ComputeMetrics (cm_7): bookings
        AggregateMeasures (am_6): bookings
          FilterElements (fe_5): bookings, listing__user__home_state
            JoinOnEntities (jo_4): on listing
              ReadSqlSource (rss_0): bookings_source (main.fct_bookings)
              JoinOnEntities (jo_3): on user
                ReadSqlSource (rss_1): listings_latest (main.dim_listings)
                ReadSqlSource (rss_2): users
    ");
}

#[test]
fn test_ratio_metric_with_order_and_limit() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["bookings_per_view"])
            .group_by(["listing__country_latest"])
            .order_by("-bookings_per_view")
            .limit(10),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_15)
      OrderByLimit (obl_14): order by -bookings_per_view limit 10
        ComputeMetrics (cm_13): bookings_per_view
          CombineAggregatedOutputs (cao_12)
            ComputeMetrics (cm_5): bookings
              AggregateMeasures (am_4): bookings
                FilterElements (fe_3): bookings, listing__country_latest
                  JoinOnEntities (jo_2): on listing
                    ReadSqlSource (rss_0): bookings_source (main.fct_bookings)
                    ReadSqlSource (rss_1): listings_latest (main.dim_listings)
            ComputeMetrics (cm_11): views
              AggregateMeasures (am_10): views
                FilterElements (fe_9): views, listing__country_latest
                  JoinOnEntities (jo_8): on listing
                    ReadSqlSource (rss_6): views_source
                    ReadSqlSource (rss_7): listings_latest (main.dim_listings)
    ");
}

#[test]
fn test_derived_metric_combines_inputs() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["average_booking_value"])
            .group_by(["metric_time__day"]),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_10)
      ComputeMetrics (cm_9): average_booking_value
        CombineAggregatedOutputs (cao_8)
          ComputeMetrics (cm_3): booking_value
            AggregateMeasures (am_2): booking_value
              FilterElements (fe_1): booking_value, metric_time__day
                ReadSqlSource (rss_0): bookings_source (main.fct_bookings)
          ComputeMetrics (cm_7): bookings
            AggregateMeasures (am_6): bookings
              FilterElements (fe_5): bookings, metric_time__day
                ReadSqlSource (rss_4): bookings_source (main.fct_bookings)
    ");
}

#[test]
fn test_where_filter_joins_its_elements() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["bookings"])
            .group_by(["metric_time__day"])
            .where_filter("{{ Dimension('listing__country_latest') }} = 'us'"),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_7)
      ComputeMetrics (cm_6): bookings
        AggregateMeasures (am_5): bookings
          FilterElements (fe_4): bookings, metric_time__day
            WhereConstraint (wc_3): {{ Dimension('listing__country_latest') }} = 'us'
              JoinOnEntities (jo_2): on listing
                ReadSqlSource (rss_0): bookings_source (main.fct_bookings)
                ReadSqlSource (rss_1): listings_latest (main.dim_listings)
    ");
}

#[test]
fn test_cumulative_metric_joins_over_time_range() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["bookings_7d"])
            .group_by(["metric_time__day"]),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_5)
      ComputeMetrics (cm_4): bookings_7d
        AggregateMeasures (am_3): bookings
          FilterElements (fe_2): bookings, metric_time__day
            JoinOverTimeRange (jotr_1): window 7 day
              ReadSqlSource (rss_0): bookings_source (main.fct_bookings)
    ");
}

#[test]
fn test_conversion_metric_joins_events() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["view_to_booking"])
            .group_by(["metric_time__day"]),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_6)
      ComputeMetrics (cm_5): view_to_booking
        AggregateMeasures (am_4): views, bookings
          FilterElements (fe_3): views, bookings, metric_time__day
            JoinConversionEvents (jce_2): on listing
              ReadSqlSource (rss_0): views_source
              ReadSqlSource (rss_1): bookings_source (main.fct_bookings)
    ");
}

#[test]
fn test_metric_as_group_by_item_plans_a_subquery() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["bookings"])
            .group_by(["listing__views"]),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_9)
      ComputeMetrics (cm_8): bookings
        AggregateMeasures (am_7): bookings
          FilterElements (fe_6): bookings, listing__views
            JoinOnEntities (jo_5): on listing
              ReadSqlSource (rss_0): bookings_source (main.fct_bookings)
              ComputeMetrics (cm_4): views
                AggregateMeasures (am_3): views
                  FilterElements (fe_2): views, listing
                    ReadSqlSource (rss_1): views_source
    ");
}

#[test]
fn test_distinct_values_read_from_defining_model() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new().group_by(["listing__country_latest"]),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_2)
      FilterElements (fe_1): listing__country_latest (distinct)
        ReadSqlSource (rss_0): listings_latest (main.dim_listings)
    ");
}

#[test]
fn test_distinct_metric_time_reads_time_spine() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(&lookup, MetricQuery::new().group_by(["metric_time__month"]));
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultDataframe (wrd_2)
      FilterElements (fe_1): metric_time__month (distinct)
        ReadTimeSpine (rts_0): month
    ");
}

#[test]
fn test_distinct_values_need_a_group_by_item() {
    let lookup = booking_lookup().unwrap();
    let err = QueryPlanner::new(&lookup)
        .plan(&MetricQuery::new())
        .unwrap_err();
    assert!(matches!(err, PlanError::UnsupportedQuery(_)));
}

#[test]
fn test_table_output() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["bookings"])
            .output_table("analytics.bookings"),
    );
    insta::assert_snapshot!(plan.text_structure(), @r"
    WriteToResultTable (wrt_4): analytics.bookings
      ComputeMetrics (cm_3): bookings
        AggregateMeasures (am_2): bookings
          FilterElements (fe_1): bookings
            ReadSqlSource (rss_0): bookings_source (main.fct_bookings)
    ");
}

#[test]
fn test_multiple_metrics_combine_at_the_top() {
    let lookup = booking_lookup().unwrap();
    let plan = plan(
        &lookup,
        MetricQuery::new()
            .metrics(["bookings", "views"])
            .group_by(["metric_time__day"]),
    );
    assert_eq!(plan.nodes_of_type("CombineAggregatedOutputs").len(), 1);
    assert_eq!(plan.nodes_of_type("ReadSqlSource").len(), 2);
    assert_eq!(plan.sink().children()[0].node_type(), "CombineAggregatedOutputs");
}

#[test]
fn test_planning_is_repeatable() {
    let lookup = booking_lookup().unwrap();
    let query = MetricQuery::new()
        .metrics(["bookings_per_view", "bookings_7d"])
        .group_by(["metric_time__day"]);
    let first = plan(&lookup, query.clone());
    let second = plan(&lookup, query);
    assert_eq!(first, second);
    assert_eq!(first.text_structure(), second.text_structure());
}
