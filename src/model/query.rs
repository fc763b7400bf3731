//! Compiled metric queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::explore::{FieldId, Metric};
use super::filter::FilterGroup;

/// Ordering applied to one selected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortField {
    pub field_id: FieldId,
    #[serde(default)]
    pub descending: bool,
}

impl SortField {
    pub fn asc(field_id: impl Into<FieldId>) -> Self {
        Self {
            field_id: field_id.into(),
            descending: false,
        }
    }

    pub fn desc(field_id: impl Into<FieldId>) -> Self {
        Self {
            field_id: field_id.into(),
            descending: true,
        }
    }
}

/// Dimension and metric filter trees of a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub dimensions: Option<FilterGroup>,
    #[serde(default)]
    pub metrics: Option<FilterGroup>,
}

/// A metric query whose field references are ready for resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledMetricQuery {
    #[serde(default)]
    pub dimensions: Vec<FieldId>,
    #[serde(default)]
    pub metrics: Vec<FieldId>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub sorts: Vec<SortField>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Metrics defined on the query rather than the Explore.
    #[serde(default)]
    pub compiled_additional_metrics: Vec<Metric>,
    /// "Now" for relative date filters.
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,
}

fn default_limit() -> u64 {
    500
}

impl Default for CompiledMetricQuery {
    fn default() -> Self {
        Self {
            dimensions: Vec::new(),
            metrics: Vec::new(),
            filters: Filters::default(),
            sorts: Vec::new(),
            limit: default_limit(),
            compiled_additional_metrics: Vec::new(),
            reference_time: None,
        }
    }
}

impl CompiledMetricQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, field_id: impl Into<FieldId>) -> Self {
        push_unique(&mut self.dimensions, field_id.into());
        self
    }

    pub fn with_metric(mut self, field_id: impl Into<FieldId>) -> Self {
        push_unique(&mut self.metrics, field_id.into());
        self
    }

    pub fn with_dimension_filters(mut self, group: FilterGroup) -> Self {
        self.filters.dimensions = Some(group);
        self
    }

    pub fn with_metric_filters(mut self, group: FilterGroup) -> Self {
        self.filters.metrics = Some(group);
        self
    }

    pub fn with_sort(mut self, sort: SortField) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_additional_metric(mut self, metric: Metric) -> Self {
        self.compiled_additional_metrics.push(metric);
        self
    }

    pub fn with_reference_time(mut self, at: DateTime<Utc>) -> Self {
        self.reference_time = Some(at);
        self
    }

    /// Dimension ids with duplicates removed, first occurrence wins.
    pub fn unique_dimensions(&self) -> Vec<&str> {
        unique(&self.dimensions)
    }

    /// Metric ids with duplicates removed, first occurrence wins.
    pub fn unique_metrics(&self) -> Vec<&str> {
        unique(&self.metrics)
    }
}

fn push_unique(ids: &mut Vec<FieldId>, id: FieldId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

fn unique(ids: &[FieldId]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id.as_str()) {
            out.push(id);
        }
    }
    out
}
