//! Read-only inputs of the compiler: Explores, metric queries and filters.

pub mod explore;
pub mod filter;
pub mod query;
pub mod types;

pub use explore::{
    field_id, CompiledTable, Dimension, Explore, ExploreJoin, FieldId, JoinType, Metric,
};
pub use filter::{
    AndFilterGroup, DateFilterSettings, FilterGroup, FilterGroupItem, FilterOperator, FilterRule,
    FilterTarget, OrFilterGroup, UnitOfTime,
};
pub use query::{CompiledMetricQuery, Filters, SortField};
pub use types::{DimensionType, MetricType, WeekDay};
