//! Explore definitions: tables, dimensions, metrics and joins.
//!
//! Explores are read-only inputs to the compiler. Maps are ordered: scanning
//! an Explore visits fields in a stable order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{DimensionType, MetricType};

/// Globally unique identifier of a dimension or metric.
pub type FieldId = String;

/// Derive the field id of a field from its table and name.
///
/// Dots in nested field names are replaced with `__`.
pub fn field_id(table: &str, name: &str) -> FieldId {
    format!("{}_{}", table, name.replace('.', "__"))
}

/// A groupable column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub name: String,
    pub table: String,
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
    /// SQL expression. `${TABLE}` refers to the owning table.
    pub sql: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

impl Dimension {
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        dimension_type: DimensionType,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            dimension_type,
            sql: sql.into(),
            label: None,
            hidden: false,
        }
    }

    pub fn field_id(&self) -> FieldId {
        field_id(&self.table, &self.name)
    }
}

/// An aggregate over a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub name: String,
    pub table: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// SQL expression being aggregated. `${TABLE}` refers to the owning table.
    pub sql: String,
    /// Percentile in `0..=100` for [`MetricType::Percentile`]; 50 when unset.
    #[serde(default)]
    pub percentile: Option<f64>,
    /// Placeholder metric generated for tables without declared metrics.
    #[serde(default)]
    pub is_auto_generated: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

impl Metric {
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        metric_type: MetricType,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            metric_type,
            sql: sql.into(),
            percentile: None,
            is_auto_generated: false,
            label: None,
            hidden: false,
        }
    }

    pub fn with_percentile(mut self, percentile: f64) -> Self {
        self.percentile = Some(percentile);
        self
    }

    pub fn auto_generated(mut self) -> Self {
        self.is_auto_generated = true;
        self
    }

    pub fn field_id(&self) -> FieldId {
        field_id(&self.table, &self.name)
    }
}

/// A physical table participating in an Explore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledTable {
    /// Table name inside the Explore, used as the SQL alias.
    pub name: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    /// Physical table name in the warehouse.
    pub sql_table: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, Dimension>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Metric>,
}

impl CompiledTable {
    pub fn new(name: impl Into<String>, sql_table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: None,
            schema: None,
            sql_table: sql_table.into(),
            dimensions: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.insert(dimension.name.clone(), dimension);
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.insert(metric.name.clone(), metric);
        self
    }
}

/// Join kind used when attaching a joined table to the base table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Left,
    Inner,
    Right,
    Full,
}

/// A table joined onto the Explore's base table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreJoin {
    pub table: String,
    /// Join condition. `${table}` placeholders refer to Explore tables.
    pub sql_on: String,
    #[serde(default, rename = "type")]
    pub join_type: JoinType,
}

/// A joined data model queried by metric queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explore {
    pub name: String,
    pub base_table: String,
    pub tables: BTreeMap<String, CompiledTable>,
    #[serde(default)]
    pub joined_tables: Vec<ExploreJoin>,
}

impl Explore {
    pub fn new(name: impl Into<String>, base_table: CompiledTable) -> Self {
        let base_name = base_table.name.clone();
        let mut tables = BTreeMap::new();
        tables.insert(base_name.clone(), base_table);
        Self {
            name: name.into(),
            base_table: base_name,
            tables,
            joined_tables: Vec::new(),
        }
    }

    pub fn with_join(mut self, table: CompiledTable, sql_on: impl Into<String>) -> Self {
        self.joined_tables.push(ExploreJoin {
            table: table.name.clone(),
            sql_on: sql_on.into(),
            join_type: JoinType::Left,
        });
        self.tables.insert(table.name.clone(), table);
        self
    }

    pub fn base(&self) -> Option<&CompiledTable> {
        self.tables.get(&self.base_table)
    }

    /// All declared dimensions, ordered by table then name.
    pub fn dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.tables.values().flat_map(|t| t.dimensions.values())
    }

    /// All declared metrics, ordered by table then name.
    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.tables.values().flat_map(|t| t.metrics.values())
    }

    pub fn find_dimension(&self, id: &str) -> Option<&Dimension> {
        self.dimensions().find(|d| d.field_id() == id)
    }

    pub fn find_metric(&self, id: &str) -> Option<&Metric> {
        self.metrics().find(|m| m.field_id() == id)
    }
}
