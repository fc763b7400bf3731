//! Native → canonical type mapping across every dialect.

use quarry::model::DimensionType;
use quarry::sql::Dialect;
use quarry::warehouse::{map_columns, NativeColumn};

use DimensionType::{Boolean, Date, Number, Timestamp};

#[test]
fn test_every_listed_type_maps_in_any_case() {
    for d in Dialect::ALL {
        let dialect = d.build(None);
        for (native, expected) in dialect.native_types() {
            for spelling in [native.to_string(), native.to_uppercase(), format!("  {}  ", native)] {
                assert_eq!(
                    dialect.map_native_type(&spelling),
                    *expected,
                    "{}: {:?}",
                    d,
                    spelling
                );
            }
        }
    }
}

#[test]
fn test_unknown_types_are_strings() {
    for d in Dialect::ALL {
        let dialect = d.build(None);
        for native in ["", "hyperloglog", "my_enum", "vector(3)"] {
            assert_eq!(dialect.map_native_type(native), DimensionType::String, "{}: {:?}", d, native);
        }
    }
}

#[test]
fn test_parameterized_types() {
    let cases: &[(Dialect, &str, DimensionType)] = &[
        (Dialect::Postgres, "numeric(10,2)", Number),
        (Dialect::Postgres, "character varying(255)", DimensionType::String),
        (Dialect::Postgres, "timestamp(3) with time zone", Timestamp),
        (Dialect::Redshift, "VARCHAR(65535)", DimensionType::String),
        (Dialect::Redshift, "DECIMAL(18, 4)", Number),
        (Dialect::BigQuery, "NUMERIC(38, 9)", Number),
        (Dialect::BigQuery, "ARRAY<INT64>", DimensionType::String),
        (Dialect::BigQuery, "STRUCT<a INT64, b STRING>", DimensionType::String),
        (Dialect::Snowflake, "NUMBER(38,0)", Number),
        (Dialect::Snowflake, "TIMESTAMP_NTZ(9)", Timestamp),
        (Dialect::DuckDb, "DECIMAL(18,3)", Number),
        (Dialect::DuckDb, "VARCHAR(10)", DimensionType::String),
        (Dialect::Databricks, "decimal(10,0)", Number),
        (Dialect::Databricks, "map<string,int>", DimensionType::String),
    ];

    for (d, native, expected) in cases {
        assert_eq!(
            d.build(None).map_native_type(native),
            *expected,
            "{}: {}",
            d,
            native
        );
    }
}

#[test]
fn test_core_kinds_per_dialect() {
    let cases: &[(Dialect, &[(&str, DimensionType)])] = &[
        (
            Dialect::Postgres,
            &[("int8", Number), ("bool", Boolean), ("date", Date), ("timestamptz", Timestamp), ("uuid", DimensionType::String)],
        ),
        (
            Dialect::Redshift,
            &[("float8", Number), ("boolean", Boolean), ("date", Date), ("timetz", Timestamp), ("super", DimensionType::String)],
        ),
        (
            Dialect::BigQuery,
            &[("INT64", Number), ("BOOL", Boolean), ("DATE", Date), ("DATETIME", Timestamp), ("GEOGRAPHY", DimensionType::String)],
        ),
        (
            Dialect::Snowflake,
            &[("FIXED", Number), ("BOOLEAN", Boolean), ("DATE", Date), ("TIMESTAMP_TZ", Timestamp), ("VARIANT", DimensionType::String)],
        ),
        (
            Dialect::DuckDb,
            &[("HUGEINT", Number), ("LOGICAL", Boolean), ("DATE", Date), ("TIMESTAMP_NS", Timestamp), ("BLOB", DimensionType::String)],
        ),
        (
            Dialect::Databricks,
            &[("LONG", Number), ("BOOLEAN", Boolean), ("DATE", Date), ("TIMESTAMP_NTZ", Timestamp), ("BINARY", DimensionType::String)],
        ),
    ];

    for (d, types) in cases {
        let dialect = d.build(None);
        for (native, expected) in *types {
            assert_eq!(dialect.map_native_type(native), *expected, "{}: {}", d, native);
        }
    }
}

#[test]
fn test_map_columns_keeps_every_column() {
    let dialect = Dialect::Snowflake.build(None);
    let columns = vec![
        NativeColumn::new("ID", "NUMBER(38,0)"),
        NativeColumn::new("PAYLOAD", "VARIANT"),
        NativeColumn::new("SHAPE", "GEOMETRY"),
        NativeColumn::new("LOADED_AT", "TIMESTAMP_LTZ"),
    ];

    let mapped = map_columns(dialect.as_ref(), &columns);
    assert_eq!(mapped.len(), 4);
    assert_eq!(mapped["ID"], Number);
    assert_eq!(mapped["PAYLOAD"], DimensionType::String);
    assert_eq!(mapped["SHAPE"], DimensionType::String);
    assert_eq!(mapped["LOADED_AT"], Timestamp);
}
