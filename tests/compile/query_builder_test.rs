//! Integration tests for metric query → SQL compilation.

#[path = "../common/mod.rs"]
mod common;

use chrono::{DateTime, TimeZone, Utc};
use quarry::compile::{build_query, CompileError, FieldKind};
use quarry::model::{
    CompiledMetricQuery, DateFilterSettings, FilterGroup, FilterOperator, FilterRule, SortField,
    UnitOfTime, WeekDay,
};
use quarry::sql::Dialect;
use serde_json::json;
use sqlparser::dialect::{
    BigQueryDialect, DatabricksDialect, DuckDbDialect, PostgreSqlDialect, RedshiftSqlDialect,
    SnowflakeDialect,
};
use sqlparser::parser::Parser;

use common::orders_explore;

fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

fn assert_parses(sql: &str, dialect: Dialect) {
    let parser: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::Redshift => Box::new(RedshiftSqlDialect {}),
        Dialect::BigQuery => Box::new(BigQueryDialect {}),
        Dialect::Snowflake => Box::new(SnowflakeDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::Databricks => Box::new(DatabricksDialect {}),
    };
    if let Err(e) = Parser::parse_sql(&*parser, sql) {
        panic!("Invalid SQL for {}: {}\nSQL:\n{}", dialect, e, sql);
    }
}

/// Top statuses by country over the last week, complete orders only.
fn top_statuses() -> CompiledMetricQuery {
    CompiledMetricQuery::new()
        .with_dimension("orders_status")
        .with_dimension("customers_country")
        .with_metric("orders_count")
        .with_metric("orders_p90_amount")
        .with_dimension_filters(FilterGroup::and(vec![
            FilterRule::new("orders_status", FilterOperator::Equals, vec![json!("complete")])
                .into(),
            FilterGroup::or(vec![
                FilterRule::new("orders_amount", FilterOperator::GreaterThan, vec![json!(100)])
                    .into(),
                FilterRule::new("orders_is_gift", FilterOperator::Equals, vec![json!(true)])
                    .into(),
            ])
            .into(),
            FilterRule::new("orders_created", FilterOperator::InThePast, vec![json!(7)])
                .with_settings(DateFilterSettings {
                    unit_of_time: UnitOfTime::Days,
                    completed: false,
                })
                .into(),
        ]))
        .with_metric_filters(FilterGroup::and(vec![FilterRule::new(
            "orders_count",
            FilterOperator::GreaterThan,
            vec![json!(5)],
        )
        .into()]))
        .with_sort(SortField::desc("orders_count"))
        .with_limit(100)
        .with_reference_time(reference_time())
}

// ============================================================================
// Full Statement Tests
// ============================================================================

#[test]
fn test_full_query_postgres() {
    let dialect = Dialect::Postgres.build(None);
    let compiled = build_query(&orders_explore(), &top_statuses(), dialect.as_ref()).unwrap();

    insta::assert_snapshot!(compiled.query, @r#"
    SELECT
      "orders".status AS "orders_status",
      "customers".country AS "customers_country",
      COUNT("orders".order_id) AS "orders_count",
      PERCENTILE_CONT(0.9) WITHIN GROUP (ORDER BY "orders".amount) AS "orders_p90_amount"
    FROM "analytics"."public"."orders" AS "orders"
    LEFT OUTER JOIN "analytics"."public"."customers" AS "customers"
      ON "orders".customer_id = "customers".customer_id
    WHERE (("orders".status) = 'complete' AND (("orders".amount) > (100) OR ("orders".is_gift) = true) AND (("orders".created_at) >= '2024-03-08 12:00:00' AND ("orders".created_at) <= '2024-03-15 12:00:00'))
    GROUP BY 1, 2
    HAVING ((COUNT("orders".order_id)) > (5))
    ORDER BY "orders_count" DESC
    LIMIT 100
    "#);
    assert_parses(&compiled.query, Dialect::Postgres);
}

#[test]
fn test_compilation_is_deterministic() {
    for d in Dialect::ALL {
        let dialect = d.build(None);
        let first = build_query(&orders_explore(), &top_statuses(), dialect.as_ref()).unwrap();
        let second = build_query(&orders_explore(), &top_statuses(), dialect.as_ref()).unwrap();
        assert_eq!(first.query, second.query, "{} output differs", d);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }
}

#[test]
fn test_every_dialect_emits_parseable_sql() {
    let query = CompiledMetricQuery::new()
        .with_dimension("orders_status")
        .with_dimension("customers_country")
        .with_metric("orders_count")
        .with_metric("orders_total_amount")
        .with_dimension_filters(FilterGroup::and(vec![
            FilterRule::new("orders_status", FilterOperator::NotEquals, vec![json!("pending")])
                .into(),
            FilterRule::new(
                "orders_amount",
                FilterOperator::InBetween,
                vec![json!(10), json!(20.5)],
            )
            .into(),
        ]))
        .with_sort(SortField::asc("customers_country"));

    for d in Dialect::ALL {
        let dialect = d.build(None);
        let compiled = build_query(&orders_explore(), &query, dialect.as_ref()).unwrap();
        assert!(compiled.query.contains("GROUP BY 1, 2"), "{}", d);
        assert!(compiled.query.ends_with("LIMIT 500"), "{}", d);
        assert_parses(&compiled.query, d);
    }
}

#[test]
fn test_string_literals_use_dialect_escape() {
    let query = CompiledMetricQuery::new()
        .with_metric("orders_count")
        .with_dimension_filters(FilterGroup::and(vec![FilterRule::new(
            "orders_status",
            FilterOperator::Equals,
            vec![json!("it's")],
        )
        .into()]));

    let pg = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref()).unwrap();
    assert!(pg.query.contains("(\"orders\".status) = 'it''s'"));

    let bq = build_query(&orders_explore(), &query, Dialect::BigQuery.build(None).as_ref()).unwrap();
    assert!(bq.query.contains("(`orders`.status) = 'it\\'s'"));
}

#[test]
fn test_percentile_forms_per_dialect() {
    let query = CompiledMetricQuery::new()
        .with_metric("orders_p90_amount")
        .with_metric("orders_median_amount");

    let cases = [
        (
            Dialect::Snowflake,
            "PERCENTILE_CONT(0.9) WITHIN GROUP (ORDER BY \"orders\".amount) AS \"orders_p90_amount\"",
            "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY \"orders\".amount) AS \"orders_median_amount\"",
        ),
        (
            Dialect::DuckDb,
            "QUANTILE_CONT(\"orders\".amount, 0.9) AS \"orders_p90_amount\"",
            "QUANTILE_CONT(\"orders\".amount, 0.5) AS \"orders_median_amount\"",
        ),
        (
            Dialect::BigQuery,
            "APPROX_QUANTILES(`orders`.amount, 100)[OFFSET(90)] AS `orders_p90_amount`",
            "APPROX_QUANTILES(`orders`.amount, 100)[OFFSET(50)] AS `orders_median_amount`",
        ),
        (
            Dialect::Databricks,
            "PERCENTILE(`orders`.amount, 0.9) AS `orders_p90_amount`",
            "PERCENTILE(`orders`.amount, 0.5) AS `orders_median_amount`",
        ),
    ];

    for (d, p90, median) in cases {
        let compiled = build_query(&orders_explore(), &query, d.build(None).as_ref()).unwrap();
        assert!(compiled.query.contains(p90), "{}:\n{}", d, compiled.query);
        assert!(compiled.query.contains(median), "{}:\n{}", d, compiled.query);
        assert!(!compiled.query.contains("GROUP BY"), "{}", d);
    }
}

// ============================================================================
// Relative Dates
// ============================================================================

#[test]
fn test_current_week_follows_start_of_week() {
    let query = CompiledMetricQuery::new()
        .with_metric("orders_count")
        .with_dimension_filters(FilterGroup::and(vec![FilterRule::new(
            "orders_created",
            FilterOperator::InTheCurrent,
            vec![],
        )
        .with_settings(DateFilterSettings {
            unit_of_time: UnitOfTime::Weeks,
            completed: false,
        })
        .into()]))
        .with_reference_time(reference_time());

    let monday = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref())
        .unwrap();
    assert!(monday.query.contains(
        "((\"orders\".created_at) >= '2024-03-11 00:00:00' AND (\"orders\".created_at) < '2024-03-18 00:00:00')"
    ));

    let sunday = Dialect::Postgres.build(Some(WeekDay::Sunday));
    let sunday = build_query(&orders_explore(), &query, sunday.as_ref()).unwrap();
    assert!(sunday.query.contains(
        "((\"orders\".created_at) >= '2024-03-10 00:00:00' AND (\"orders\".created_at) < '2024-03-17 00:00:00')"
    ));
}

#[test]
fn test_relative_filter_without_reference_time() {
    let mut query = top_statuses();
    query.reference_time = None;

    let err = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref())
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::MissingReferenceTime {
            field_id: "orders_created".to_string(),
            operator: "inThePast",
        }
    );
}

// ============================================================================
// Error Tests
// ============================================================================

#[test]
fn test_unknown_dimension_names_the_id() {
    let query = CompiledMetricQuery::new()
        .with_dimension("orders_nope")
        .with_metric("orders_count");

    let err = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref())
        .unwrap_err();
    assert!(err.is_field_reference());
    assert_eq!(err.field_id(), Some("orders_nope"));
    assert_eq!(
        err,
        CompileError::unknown_field(FieldKind::Dimension, "orders_nope")
    );
}

#[test]
fn test_unknown_metric_names_the_id() {
    let query = CompiledMetricQuery::new().with_metric("orders_status");

    let err = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Tried to reference metric with unknown field id: orders_status"
    );
}

#[test]
fn test_nested_filter_with_unknown_field() {
    let query = CompiledMetricQuery::new()
        .with_metric("orders_count")
        .with_dimension_filters(FilterGroup::and(vec![FilterGroup::or(vec![
            FilterRule::new("orders_status", FilterOperator::IsNull, vec![]).into(),
            FilterRule::new("orders_missing", FilterOperator::IsNull, vec![]).into(),
        ])
        .into()]));

    let err = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref())
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::unknown_field(FieldKind::Dimension, "orders_missing")
    );
}

#[test]
fn test_operator_not_supported_for_type() {
    let query = CompiledMetricQuery::new()
        .with_metric("orders_count")
        .with_dimension_filters(FilterGroup::and(vec![FilterRule::new(
            "orders_is_gift",
            FilterOperator::StartsWith,
            vec![json!(true)],
        )
        .into()]));

    let err = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref())
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnsupportedOperator { ref field_id, operator: "startsWith", .. }
            if field_id == "orders_is_gift"
    ));
}

// ============================================================================
// Shape Tests
// ============================================================================

#[test]
fn test_dimensions_only_has_no_group_by() {
    let query = CompiledMetricQuery::new()
        .with_dimension("orders_status")
        .with_limit(25);

    let compiled = build_query(&orders_explore(), &query, Dialect::DuckDb.build(None).as_ref())
        .unwrap();
    insta::assert_snapshot!(compiled.query, @r#"
    SELECT
      "orders".status AS "orders_status"
    FROM "analytics"."public"."orders" AS "orders"
    LIMIT 25
    "#);
}

#[test]
fn test_disabled_filters_render_nothing() {
    let query = CompiledMetricQuery::new()
        .with_metric("orders_count")
        .with_dimension_filters(FilterGroup::and(vec![FilterRule::new(
            "orders_status",
            FilterOperator::Equals,
            vec![json!("complete")],
        )
        .disabled()
        .into()]))
        .with_metric_filters(FilterGroup::or(vec![]));

    let compiled = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref())
        .unwrap();
    assert!(!compiled.query.contains("WHERE"));
    assert!(!compiled.query.contains("HAVING"));
}

#[test]
fn test_join_pulled_in_by_filter_only() {
    let query = CompiledMetricQuery::new()
        .with_metric("orders_count")
        .with_dimension_filters(FilterGroup::and(vec![FilterRule::new(
            "customers_country",
            FilterOperator::Equals,
            vec![json!("NZ"), json!("AU")],
        )
        .into()]));

    let compiled = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref())
        .unwrap();
    assert!(compiled
        .query
        .contains("LEFT OUTER JOIN \"analytics\".\"public\".\"customers\" AS \"customers\""));
    assert!(compiled
        .query
        .contains("WHERE ((\"customers\".country) IN ('NZ', 'AU'))"));
    assert_parses(&compiled.query, Dialect::Postgres);
}

#[test]
fn test_duplicate_fields_selected_once() {
    let mut query = CompiledMetricQuery::new().with_metric("orders_count");
    query.dimensions = vec!["orders_status".to_string(), "orders_status".to_string()];

    let compiled = build_query(&orders_explore(), &query, Dialect::Postgres.build(None).as_ref())
        .unwrap();
    assert_eq!(compiled.query.matches("AS \"orders_status\"").count(), 1);
    assert!(compiled.query.contains("GROUP BY 1\n"));
}
